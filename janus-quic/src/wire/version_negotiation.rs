//! Version Negotiation packet composition for both dialects.

use crate::types::{ConnectionId, PacketNumber, PacketNumberLen, Perspective};
use crate::version::{versions_with_reserved, VersionNumber, VERSION_WHATEVER};
use crate::wire::header::{Header, PacketType};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::error;

/// Compose a Version Negotiation packet in the IETF dialect.
///
/// The rejected version is echoed in the header so the client can bind
/// the reply to its Initial; the advertised list carries one reserved
/// version at a random position.
pub fn compose_version_negotiation(
    connection_id: ConnectionId,
    packet_number: PacketNumber,
    version_offered: VersionNumber,
    versions: &[VersionNumber],
) -> Bytes {
    let header = Header {
        is_long_header: true,
        packet_type: PacketType::VersionNegotiation,
        connection_id,
        packet_number,
        version: version_offered,
        ..Default::default()
    };

    let mut buf = BytesMut::with_capacity(17 + (versions.len() + 1) * 4);
    if let Err(e) = header.write_long_header(&mut buf) {
        error!(error = %e, "error composing version negotiation packet");
        return Bytes::new();
    }
    write_versions(&mut buf, versions);
    buf.freeze()
}

/// Compose a Version Negotiation packet in the gQUIC dialect: a public
/// header with the version flag set, followed by the version list.
pub fn compose_gquic_version_negotiation(
    connection_id: ConnectionId,
    versions: &[VersionNumber],
) -> Bytes {
    let header = Header {
        connection_id,
        packet_number: 1,
        packet_number_len: PacketNumberLen::Len1,
        version_flag: true,
        ..Default::default()
    };

    let mut buf = BytesMut::with_capacity(9 + (versions.len() + 1) * 4);
    if let Err(e) = header.write(&mut buf, Perspective::Server, VERSION_WHATEVER) {
        error!(error = %e, "error composing gQUIC version negotiation packet");
        return Bytes::new();
    }
    write_versions(&mut buf, versions);
    buf.freeze()
}

fn write_versions(buf: &mut BytesMut, versions: &[VersionNumber]) {
    for version in versions_with_reserved(versions) {
        buf.put_u32(version);
    }
}
