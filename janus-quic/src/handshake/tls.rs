//! Capability traits for the TLS 1.3 library.
//!
//! The TLS stack is a black box to this crate. It is driven through
//! [`TlsHandshake`] and talks back through the extension callbacks of
//! [`TlsExtensionHandler`]; tests substitute scripted implementations.

use crate::error::Result;
use crate::handshake::extension::{ExtensionList, HandshakeType};
use crate::handshake::transport_parameters::TransportParameters;

/// Alert returned by a handshake round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// The round succeeded; output (if any) was written to the conduit.
    NoAlert,
    /// The library demands address validation: it wrote a cookie to the
    /// conduit and forgot the connection.
    StatelessRetry,
    /// Any other TLS alert, by code.
    Other(u8),
}

/// Coarse handshake state, observed between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsState {
    Start,
    /// The server has processed the ClientHello and produced its flight.
    ServerNegotiated,
    /// The server is waiting for the client's second flight.
    ServerWaitFlight2,
    Connected,
    Failed,
}

/// Handle to a TLS session driving its side of the handshake over a
/// crypto-stream conduit.
pub trait TlsHandshake: Send {
    /// Advance the handshake as far as the buffered input allows.
    fn handshake(&mut self) -> Alert;

    fn state(&self) -> TlsState;

    /// RFC 5705-style exporter over the session's master secret.
    fn compute_exporter(&self, label: &str, context: &[u8], length: usize) -> Result<Vec<u8>>;
}

/// The QUIC transport-parameter extension surface the TLS library calls
/// into while marshalling handshake messages.
pub trait TlsExtensionHandler: Send {
    /// Contribute extensions to an outgoing handshake message.
    fn send(&mut self, handshake_type: HandshakeType, extensions: &mut ExtensionList)
        -> Result<()>;

    /// Inspect extensions of a received handshake message.
    fn receive(&mut self, handshake_type: HandshakeType, extensions: &ExtensionList)
        -> Result<()>;

    /// The peer's transport parameters, once a ClientHello has been
    /// processed. `None` if no parameters have been published.
    fn peer_params(&mut self) -> Option<TransportParameters>;
}
