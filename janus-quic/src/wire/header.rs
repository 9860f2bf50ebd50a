//! Packet header codec for both dialects.
//!
//! A single [`Header`] type covers the three framings that occur on the
//! wire: the IETF long header, the IETF short header, and Version
//! Negotiation. Exactly one framing flag is set on any parsed header.
//! The gQUIC public header is write-only here; it exists for composing
//! legacy Version Negotiation packets.
//!
//! Parsing is parametrised by the *sender's* perspective: the set of
//! packet types an endpoint may legally send depends on its role, and
//! Version Negotiation packets are only ever server-sent.

use crate::error::{Error, Result};
use crate::types::{ConnectionId, PacketNumber, PacketNumberLen, Perspective};
use crate::version::{uses_tls_dialect, VersionNumber, VERSION_NEGOTIATION};
use crate::wire::coding;
use bytes::{Buf, BufMut, Bytes};
use std::fmt;

/// Long-header packet types.
///
/// The wire encoding of a type `t` is the byte `(t - 1) ^ 0xFF`, which
/// always has the long-header bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Initial = 1,
    Retry = 2,
    Handshake = 3,
    ZeroRtt = 4,
    VersionNegotiation = 5,
}

impl PacketType {
    pub(crate) fn from_discriminant(d: u8) -> Option<Self> {
        match d {
            1 => Some(PacketType::Initial),
            2 => Some(PacketType::Retry),
            3 => Some(PacketType::Handshake),
            4 => Some(PacketType::ZeroRtt),
            5 => Some(PacketType::VersionNegotiation),
            _ => None,
        }
    }

    pub(crate) fn discriminant(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacketType::Initial => "Initial",
            PacketType::Retry => "Retry",
            PacketType::Handshake => "Handshake",
            PacketType::ZeroRtt => "0-RTT",
            PacketType::VersionNegotiation => "VersionNegotiation",
        };
        write!(f, "{s}")
    }
}

/// A parsed or to-be-serialised packet header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// The exact wire bytes this header was parsed from. Set by the
    /// parser, used verbatim as AEAD associated data. Callers treat it
    /// as read-only.
    pub raw: Bytes,

    pub connection_id: ConnectionId,
    pub packet_number: PacketNumber,
    pub packet_number_len: PacketNumberLen,
    pub version: VersionNumber,

    /// Long-header framing. `packet_type` is meaningful when set.
    pub is_long_header: bool,
    pub packet_type: PacketType,

    // short-header fields
    pub omit_connection_id: bool,
    pub key_phase: u8,
    pub spin_bit: bool,

    /// Version-negotiation framing.
    pub is_version_negotiation: bool,
    pub supported_versions: Vec<VersionNumber>,

    // gQUIC public-header fields
    pub version_flag: bool,
    pub reset_flag: bool,
    pub diversification_nonce: Bytes,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            raw: Bytes::new(),
            connection_id: ConnectionId(0),
            packet_number: 0,
            packet_number_len: PacketNumberLen::Len4,
            version: 0,
            is_long_header: false,
            packet_type: PacketType::Initial,
            omit_connection_id: false,
            key_phase: 0,
            spin_bit: false,
            is_version_negotiation: false,
            supported_versions: Vec::new(),
            version_flag: false,
            reset_flag: false,
            diversification_nonce: Bytes::new(),
        }
    }
}

/// A datagram split into its header and the (still protected) payload.
#[derive(Debug, Clone)]
pub struct ParsedPacket {
    pub header: Header,
    pub payload: Bytes,
}

/// Parse one IETF-dialect packet from the start of `data`.
///
/// `sent_by` is the perspective of the packet's sender. The returned
/// header's `raw` field holds exactly the bytes the parser consumed.
pub fn parse_packet(data: Bytes, sent_by: Perspective) -> Result<ParsedPacket> {
    let mut buf = data.clone();
    let type_byte = coding::read_u8(&mut buf)?;

    let mut header = if type_byte & 0x80 != 0 {
        parse_long_header(&mut buf, sent_by, type_byte)?
    } else {
        parse_short_header(&mut buf, type_byte)?
    };

    let consumed = data.len() - buf.remaining();
    header.raw = data.slice(..consumed);
    Ok(ParsedPacket {
        header,
        payload: data.slice(consumed..),
    })
}

fn parse_long_header(buf: &mut Bytes, sent_by: Perspective, type_byte: u8) -> Result<Header> {
    let connection_id = ConnectionId(coding::read_u64(buf)?);
    let version = coding::read_u32(buf)?;

    if version == VERSION_NEGOTIATION {
        // bare wire marker; clients never send Version Negotiation
        if sent_by == Perspective::Client {
            return Err(Error::InvalidVersion);
        }
        return Ok(Header {
            connection_id,
            version,
            is_version_negotiation: true,
            packet_type: PacketType::VersionNegotiation,
            supported_versions: parse_version_list(buf)?,
            ..Default::default()
        });
    }

    let packet_number = coding::read_u32(buf)? as PacketNumber;
    let discriminant = (type_byte ^ 0xFF).wrapping_add(1);
    let packet_type = PacketType::from_discriminant(discriminant)
        .ok_or(Error::InvalidPacketHeader(discriminant))?;

    if packet_type == PacketType::VersionNegotiation {
        // a server's reply echoes the rejected version instead of zero
        if sent_by == Perspective::Client {
            return Err(Error::InvalidPacketHeader(discriminant));
        }
        return Ok(Header {
            connection_id,
            version,
            packet_number,
            is_version_negotiation: true,
            packet_type,
            supported_versions: parse_version_list(buf)?,
            ..Default::default()
        });
    }

    let allowed = match sent_by {
        Perspective::Client => matches!(
            packet_type,
            PacketType::Initial | PacketType::Handshake | PacketType::ZeroRtt
        ),
        Perspective::Server => {
            matches!(packet_type, PacketType::Retry | PacketType::Handshake)
        }
    };
    if !allowed {
        return Err(Error::InvalidPacketHeader(discriminant));
    }

    Ok(Header {
        is_long_header: true,
        packet_type,
        connection_id,
        version,
        packet_number,
        packet_number_len: PacketNumberLen::Len4,
        ..Default::default()
    })
}

fn parse_version_list(buf: &mut Bytes) -> Result<Vec<VersionNumber>> {
    if !buf.has_remaining() {
        return Err(Error::InvalidVersionNegotiationPacket("empty version list"));
    }
    if buf.remaining() % 4 != 0 {
        return Err(Error::InvalidVersionNegotiationPacket(
            "version list not a multiple of 4 bytes",
        ));
    }
    let mut versions = Vec::with_capacity(buf.remaining() / 4);
    while buf.has_remaining() {
        versions.push(buf.get_u32());
    }
    Ok(versions)
}

fn parse_short_header(buf: &mut Bytes, type_byte: u8) -> Result<Header> {
    let omit_connection_id = type_byte & 0x40 == 0;
    let connection_id = if omit_connection_id {
        ConnectionId(0)
    } else {
        ConnectionId(coding::read_u64(buf)?)
    };

    let packet_number_len = PacketNumberLen::from_nibble(type_byte & 0x0F)
        .ok_or(Error::InvalidPacketHeader(type_byte))?;
    let packet_number = coding::read_uint(buf, packet_number_len.num_bytes())?;

    Ok(Header {
        connection_id,
        omit_connection_id,
        packet_number,
        packet_number_len,
        spin_bit: type_byte & 0x10 != 0,
        key_phase: (type_byte >> 5) & 1,
        ..Default::default()
    })
}

impl Header {
    /// Serialise the header. `version` selects the dialect: the TLS
    /// dialect uses the long/short layouts, everything else goes through
    /// the gQUIC public header.
    pub fn write<B: BufMut>(
        &self,
        buf: &mut B,
        perspective: Perspective,
        version: VersionNumber,
    ) -> Result<()> {
        if uses_tls_dialect(version) {
            if self.is_long_header {
                self.write_long_header(buf)
            } else {
                self.write_short_header(buf)
            }
        } else {
            self.write_public_header(buf, perspective)
        }
    }

    /// Long headers are a fixed 17 bytes: type, connection ID, version,
    /// packet number.
    pub(crate) fn write_long_header<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u8((self.packet_type.discriminant() - 1) ^ 0xFF);
        buf.put_u64(self.connection_id.0);
        buf.put_u32(self.version);
        buf.put_u32(self.packet_number as u32);
        Ok(())
    }

    fn write_short_header<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        let mut type_byte = self.key_phase << 5;
        if self.spin_bit {
            type_byte |= 0x10;
        }
        if !self.omit_connection_id {
            type_byte |= 0x40;
        }
        type_byte |= self.packet_number_len.to_nibble();
        buf.put_u8(type_byte);

        if !self.omit_connection_id {
            buf.put_u64(self.connection_id.0);
        }
        coding::write_uint(
            buf,
            self.packet_number,
            self.packet_number_len.num_bytes(),
        );
        Ok(())
    }

    /// Legacy gQUIC public header. Server-sent version-negotiation and
    /// reset packets end right after the connection ID.
    fn write_public_header<B: BufMut>(&self, buf: &mut B, perspective: Perspective) -> Result<()> {
        if self.version_flag && self.reset_flag {
            return Err(Error::Internal(
                "public header cannot be both a version negotiation and a reset",
            ));
        }

        let terminates_early =
            perspective == Perspective::Server && (self.version_flag || self.reset_flag);

        let mut flags = 0u8;
        if self.version_flag {
            flags |= 0x01;
        }
        if self.reset_flag {
            flags |= 0x02;
        }
        if !self.omit_connection_id {
            flags |= 0x08;
        }
        if !terminates_early {
            flags |= match self.packet_number_len {
                PacketNumberLen::Len1 => 0x00,
                PacketNumberLen::Len2 => 0x10,
                PacketNumberLen::Len4 => 0x20,
            };
        }
        buf.put_u8(flags);

        if !self.omit_connection_id {
            buf.put_u64(self.connection_id.0);
        }
        if terminates_early {
            return Ok(());
        }

        if perspective == Perspective::Client && self.version_flag {
            buf.put_u32(self.version);
        }
        if !self.diversification_nonce.is_empty() {
            if self.diversification_nonce.len() != 32 {
                return Err(Error::Internal("invalid diversification nonce length"));
            }
            buf.put_slice(&self.diversification_nonce);
        }
        coding::write_uint(
            buf,
            self.packet_number,
            self.packet_number_len.num_bytes(),
        );
        Ok(())
    }

    /// Serialised length of the IETF framings.
    pub fn header_len(&self) -> usize {
        if self.is_long_header || self.is_version_negotiation {
            return 1 + 8 + 4 + 4;
        }
        let mut len = 1;
        if !self.omit_connection_id {
            len += 8;
        }
        len + self.packet_number_len.num_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VERSION_TLS;
    use bytes::BytesMut;

    fn serialize(hdr: &Header, perspective: Perspective) -> Bytes {
        let mut buf = BytesMut::new();
        hdr.write(&mut buf, perspective, VERSION_TLS).unwrap();
        buf.freeze()
    }

    fn reparse(hdr: &Header, sent_by: Perspective) -> Header {
        let data = serialize(hdr, sent_by);
        let parsed = parse_packet(data.clone(), sent_by).unwrap();
        assert_eq!(parsed.header.raw, data);
        assert!(parsed.payload.is_empty());
        let mut header = parsed.header;
        header.raw = Bytes::new();
        header
    }

    #[test]
    fn test_type_byte_encoding_roundtrip() {
        for packet_type in [
            PacketType::Initial,
            PacketType::Retry,
            PacketType::Handshake,
            PacketType::ZeroRtt,
            PacketType::VersionNegotiation,
        ] {
            let wire = (packet_type.discriminant() - 1) ^ 0xFF;
            assert!(wire & 0x80 != 0);
            assert_eq!(
                PacketType::from_discriminant((wire ^ 0xFF).wrapping_add(1)),
                Some(packet_type)
            );
        }
    }

    #[test]
    fn test_long_header_roundtrip() {
        for (packet_type, sent_by) in [
            (PacketType::Initial, Perspective::Client),
            (PacketType::Handshake, Perspective::Client),
            (PacketType::ZeroRtt, Perspective::Client),
            (PacketType::Retry, Perspective::Server),
            (PacketType::Handshake, Perspective::Server),
        ] {
            let hdr = Header {
                is_long_header: true,
                packet_type,
                connection_id: ConnectionId(0xdeadbeefcafe1234),
                packet_number: 0x1337,
                version: VERSION_TLS,
                ..Default::default()
            };
            assert_eq!(serialize(&hdr, sent_by).len(), 17);
            assert_eq!(reparse(&hdr, sent_by), hdr);
        }
    }

    #[test]
    fn test_short_header_roundtrip() {
        for packet_number_len in [
            PacketNumberLen::Len1,
            PacketNumberLen::Len2,
            PacketNumberLen::Len4,
        ] {
            for omit_connection_id in [false, true] {
                let hdr = Header {
                    connection_id: if omit_connection_id {
                        ConnectionId(0)
                    } else {
                        ConnectionId(0x42)
                    },
                    omit_connection_id,
                    packet_number: 0x99,
                    packet_number_len,
                    key_phase: 1,
                    spin_bit: true,
                    ..Default::default()
                };
                let data = serialize(&hdr, Perspective::Server);
                let expected_len = 1
                    + if omit_connection_id { 0 } else { 8 }
                    + packet_number_len.num_bytes();
                assert_eq!(data.len(), expected_len);
                assert_eq!(hdr.header_len(), expected_len);
                assert_eq!(reparse(&hdr, Perspective::Server), hdr);
            }
        }
    }

    #[test]
    fn test_short_header_truncates_packet_number() {
        let hdr = Header {
            omit_connection_id: true,
            packet_number: 0x1_0037,
            packet_number_len: PacketNumberLen::Len2,
            ..Default::default()
        };
        let parsed = reparse(&hdr, Perspective::Client);
        assert_eq!(parsed.packet_number, 0x37);
    }

    #[test]
    fn test_short_header_rejects_bad_nibble() {
        // low nibble 0xC names no packet number length
        let data = Bytes::from_static(&[0x0C, 0x01]);
        assert_eq!(
            parse_packet(data, Perspective::Server).unwrap_err(),
            Error::InvalidPacketHeader(0x0C)
        );
    }

    #[test]
    fn test_version_negotiation_wire_marker_parse() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x80);
        buf.put_u64(0x1234);
        buf.put_u32(0); // version negotiation marker
        buf.put_u32(VERSION_TLS);
        buf.put_u32(0x5130_3339);
        let parsed = parse_packet(buf.freeze(), Perspective::Server).unwrap();
        assert!(parsed.header.is_version_negotiation);
        assert!(!parsed.header.is_long_header);
        assert_eq!(parsed.header.packet_type, PacketType::VersionNegotiation);
        assert_eq!(parsed.header.connection_id, ConnectionId(0x1234));
        assert_eq!(
            parsed.header.supported_versions,
            vec![VERSION_TLS, 0x5130_3339]
        );
    }

    #[test]
    fn test_version_negotiation_from_client_is_invalid() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x80);
        buf.put_u64(0x1234);
        buf.put_u32(0);
        buf.put_u32(VERSION_TLS);
        assert_eq!(
            parse_packet(buf.freeze(), Perspective::Client).unwrap_err(),
            Error::InvalidVersion
        );
    }

    #[test]
    fn test_version_negotiation_empty_list() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x80);
        buf.put_u64(0x1234);
        buf.put_u32(0);
        assert_eq!(
            parse_packet(buf.freeze(), Perspective::Server).unwrap_err(),
            Error::InvalidVersionNegotiationPacket("empty version list")
        );
    }

    #[test]
    fn test_version_negotiation_odd_length_list() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x80);
        buf.put_u64(0x1234);
        buf.put_u32(0);
        buf.put_u32(VERSION_TLS);
        buf.put_u8(0xAA);
        assert_eq!(
            parse_packet(buf.freeze(), Perspective::Server).unwrap_err(),
            Error::InvalidVersionNegotiationPacket("version list not a multiple of 4 bytes")
        );
    }

    #[test]
    fn test_perspective_validation() {
        // a client must not send Retry
        let retry = Header {
            is_long_header: true,
            packet_type: PacketType::Retry,
            version: VERSION_TLS,
            ..Default::default()
        };
        assert_eq!(
            parse_packet(serialize(&retry, Perspective::Client), Perspective::Client).unwrap_err(),
            Error::InvalidPacketHeader(PacketType::Retry.discriminant())
        );

        // a server must not send Initial
        let initial = Header {
            is_long_header: true,
            packet_type: PacketType::Initial,
            version: VERSION_TLS,
            ..Default::default()
        };
        assert_eq!(
            parse_packet(serialize(&initial, Perspective::Server), Perspective::Server)
                .unwrap_err(),
            Error::InvalidPacketHeader(PacketType::Initial.discriminant())
        );
    }

    #[test]
    fn test_unknown_long_type_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x80); // decodes to discriminant 0x80
        buf.put_u64(1);
        buf.put_u32(VERSION_TLS);
        buf.put_u32(1);
        assert_eq!(
            parse_packet(buf.freeze(), Perspective::Client).unwrap_err(),
            Error::InvalidPacketHeader(0x80)
        );
    }

    #[test]
    fn test_payload_split() {
        let hdr = Header {
            is_long_header: true,
            packet_type: PacketType::Initial,
            connection_id: ConnectionId(7),
            packet_number: 1,
            version: VERSION_TLS,
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        hdr.write(&mut buf, Perspective::Client, VERSION_TLS).unwrap();
        let header_len = buf.len();
        buf.put_slice(b"payload bytes");
        let parsed = parse_packet(buf.freeze(), Perspective::Client).unwrap();
        assert_eq!(parsed.header.raw.len(), header_len);
        assert_eq!(&parsed.payload[..], b"payload bytes");
    }

    #[test]
    fn test_public_header_version_negotiation_layout() {
        let hdr = Header {
            connection_id: ConnectionId(0x0102030405060708),
            packet_number: 1,
            version_flag: true,
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        hdr.write(&mut buf, Perspective::Server, crate::version::VERSION_WHATEVER)
            .unwrap();
        // flags (version | connection ID), then the connection ID, nothing else
        assert_eq!(
            &buf[..],
            &[0x09, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }
}
