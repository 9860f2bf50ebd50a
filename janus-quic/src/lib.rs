//! # janus-quic: dual-dialect QUIC transport core
//!
//! Wire-level and handshake machinery for a QUIC transport that speaks
//! two dialects in parallel: legacy gQUIC and the IETF-draft dialect
//! that multiplexes TLS 1.3 over crypto streams.
//!
//! ```text
//! janus-quic/
//! ├── types      - ConnectionId, packet numbers, perspectives
//! ├── error      - unified error type with legacy wire codes
//! ├── version    - version constants, GREASE, downgrade validation
//! ├── wire       - header/frame codecs, Version Negotiation packets
//! ├── crypto     - NullAEAD protection for the Initial exchange
//! ├── handshake  - crypto-stream conduit, TLS extension handling
//! └── server     - stateless per-Initial dispatch and session handoff
//! ```
//!
//! The crate is a state machine around a thin socket capability: it
//! never reads from the network itself, and its only I/O is the single
//! reply datagram a [`server::ServerTls`] may emit per Initial packet.
//! The TLS 1.3 library, the session and stream state machines, and the
//! datagram driver are external collaborators reached through traits.

#![forbid(unsafe_code)]

pub mod crypto;
pub mod error;
pub mod handshake;
pub mod server;
pub mod types;
pub mod version;
pub mod wire;

pub use error::{Error, Result};
pub use handshake::{CryptoStreamConn, TransportParameters};
pub use server::{PacketConn, PendingSession, ServerConfig, ServerTls};
pub use types::{ConnectionId, PacketNumber, PacketNumberLen, Perspective};
pub use version::{VersionNumber, VERSION_39, VERSION_TLS};
pub use wire::{Header, PacketType, ParsedPacket};
