//! Handshake machinery: the crypto-stream conduit, the QUIC TLS
//! extension, and the capability traits the TLS library is driven
//! through.

pub mod crypto_stream;
pub mod extension;
pub mod extension_handler;
pub mod tls;
pub mod transport_parameters;

pub use crypto_stream::{CryptoStream, CryptoStreamConn};
pub use extension::{
    ClientHelloTransportParameters, EncryptedExtensionsTransportParameters, Extension,
    ExtensionList, HandshakeType, QUIC_EXTENSION_TYPE,
};
pub use extension_handler::ExtensionHandlerServer;
pub use tls::{Alert, TlsExtensionHandler, TlsHandshake, TlsState};
pub use transport_parameters::{TransportParameter, TransportParameters};
