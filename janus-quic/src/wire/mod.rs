//! Wire-format codecs: headers, the crypto-carrier STREAM frame, and
//! Version Negotiation packets.

pub mod coding;
pub mod frame;
pub mod header;
pub mod version_negotiation;

pub use frame::StreamFrame;
pub use header::{parse_packet, Header, PacketType, ParsedPacket};
pub use version_negotiation::{compose_gquic_version_negotiation, compose_version_negotiation};
