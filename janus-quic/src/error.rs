//! Error types for QUIC protocol operations.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the wire codec, the handshake machinery, and the
/// stateless server front-end.
///
/// Errors that reach a peer travel in a CONNECTION_CLOSE frame using the
/// legacy gQUIC numeric codes (see [`Error::to_wire`]); parse and
/// decryption failures never generate a reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("internal error: {0}")]
    Internal(&'static str),

    #[error("packet buffer too short")]
    BufferTooShort,

    #[error("received packet with invalid packet type: {0}")]
    InvalidPacketHeader(u8),

    #[error("invalid frame data")]
    InvalidFrameData,

    #[error("invalid version")]
    InvalidVersion,

    #[error("invalid version negotiation packet: {0}")]
    InvalidVersionNegotiationPacket(&'static str),

    #[error("version negotiation mismatch: {0}")]
    VersionNegotiationMismatch(&'static str),

    #[error("decryption failure")]
    DecryptionFailure,

    #[error("ClientHello didn't contain a QUIC extension")]
    MissingQuicExtension,

    #[error("unexpected QUIC extension in handshake message {0}")]
    UnexpectedQuicExtension(u8),

    #[error("client sent a stateless reset token")]
    StatelessResetTokenFromClient,

    #[error("malformed QUIC extension body: {0}")]
    MalformedExtension(&'static str),

    #[error("invalid transport parameters: {0}")]
    TransportParameter(String),

    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl Error {
    /// Convert to the legacy wire error code carried in CONNECTION_CLOSE.
    pub fn to_wire(&self) -> u64 {
        match self {
            Error::Internal(_) | Error::Io(_) => 1,
            Error::BufferTooShort | Error::InvalidPacketHeader(_) => 3,
            Error::InvalidFrameData => 4,
            Error::InvalidVersionNegotiationPacket(_) => 10,
            Error::DecryptionFailure => 12,
            Error::InvalidVersion => 20,
            Error::TransportParameter(_) => 23,
            Error::MissingQuicExtension
            | Error::UnexpectedQuicExtension(_)
            | Error::StatelessResetTokenFromClient
            | Error::MalformedExtension(_)
            | Error::HandshakeFailed(_) => 28,
            Error::VersionNegotiationMismatch(_) => 55,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
