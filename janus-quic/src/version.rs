//! # QUIC version numbers and version negotiation helpers
//!
//! The two dialects are told apart by the version tag a packet carries:
//! gQUIC versions use the ASCII `Q0xx` encoding, the IETF-draft dialect
//! uses a small integer. Version `0` never appears as a real version; on
//! the wire it marks a Version Negotiation packet.
//!
//! Reserved ("GREASE") versions have the nibble pattern `0x?a?a?a?a`.
//! They are spliced into every advertised version list at a random
//! position so that peers which fail to skip unknown versions break
//! early and loudly.

use crate::error::{Error, Result};
use ring::rand::{SecureRandom, SystemRandom};

pub type VersionNumber = u32;

/// Wire marker for Version Negotiation packets.
pub const VERSION_NEGOTIATION: VersionNumber = 0;

/// Internal sentinel for headers written before a version is agreed.
/// Never meaningful on the IETF wire.
pub const VERSION_WHATEVER: VersionNumber = 0;

/// Internal sentinel for "no version known yet" on the parse side.
pub const VERSION_UNKNOWN: VersionNumber = u32::MAX;

/// gQUIC version Q039, big-endian ASCII.
pub const VERSION_39: VersionNumber = 0x5130_3339;

/// The IETF-draft dialect that runs TLS 1.3 over crypto streams.
pub const VERSION_TLS: VersionNumber = 101;

/// Versions this implementation speaks, in preference order.
pub const SUPPORTED_VERSIONS: &[VersionNumber] = &[VERSION_39, VERSION_TLS];

/// Whether `version` selects the TLS-dialect header layout.
pub fn uses_tls_dialect(version: VersionNumber) -> bool {
    version == VERSION_TLS
}

pub fn is_supported_version(supported: &[VersionNumber], version: VersionNumber) -> bool {
    supported.contains(&version)
}

/// Whether a version matches the reserved `0x?a?a?a?a` pattern and must
/// be ignored on receipt.
pub fn is_reserved_version(version: VersionNumber) -> bool {
    version & 0x0f0f_0f0f == 0x0a0a_0a0a
}

/// Generate a reserved version of the form `0x?a?a?a?a`.
///
/// Entropy failure is tolerated: the fixed pattern `0x0a0a0a0a` is still
/// a valid reserved version.
pub fn generate_reserved_version() -> VersionNumber {
    let mut b = [0u8; 4];
    if SystemRandom::new().fill(&mut b).is_err() {
        return 0x0a0a_0a0a;
    }
    (u32::from_be_bytes(b) & 0xf0f0_f0f0) | 0x0a0a_0a0a
}

/// Copy `versions` with one freshly generated reserved version spliced in
/// at a position chosen from one byte of OS entropy. On entropy failure
/// the position degrades to 0; the list is still well-formed.
pub fn versions_with_reserved(versions: &[VersionNumber]) -> Vec<VersionNumber> {
    let mut b = [0u8; 1];
    let _ = SystemRandom::new().fill(&mut b);
    let pos = b[0] as usize % (versions.len() + 1);

    let mut out = Vec::with_capacity(versions.len() + 1);
    out.extend_from_slice(&versions[..pos]);
    out.push(generate_reserved_version());
    out.extend_from_slice(&versions[pos..]);
    out
}

/// Client-side check of a received Version Negotiation packet.
///
/// A server that advertises the very version the client offered is not
/// negotiating, it is downgrading: had it supported that version it
/// would have accepted the Initial instead of replying.
pub fn validate_version_negotiation(
    offered: VersionNumber,
    advertised: &[VersionNumber],
) -> Result<()> {
    if advertised.contains(&offered) {
        return Err(Error::InvalidVersionNegotiationPacket(
            "offered version advertised by the peer",
        ));
    }
    Ok(())
}

/// Pick the first of `ours` (in preference order) the peer advertises,
/// skipping reserved entries.
pub fn choose_supported_version(
    ours: &[VersionNumber],
    theirs: &[VersionNumber],
) -> Option<VersionNumber> {
    ours.iter()
        .copied()
        .find(|v| !is_reserved_version(*v) && theirs.contains(v))
}
