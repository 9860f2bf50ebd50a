//! Deterministic AEAD for packets sent before real keys exist.
//!
//! Keys are derived with HKDF-SHA256 from the connection ID and version
//! under a fixed handshake salt, then split per perspective. An instance
//! holds the traffic keys of the perspective it was created for: the
//! server opens a client's Initial with `NullAead::new(Client, ..)` and
//! seals its reply with `NullAead::new(Server, ..)`.

use crate::error::{Error, Result};
use crate::types::{ConnectionId, PacketNumber, Perspective};
use crate::version::VersionNumber;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::hmac;

const HANDSHAKE_SALT: [u8; 20] = [
    0x9c, 0x10, 0x8f, 0x98, 0x52, 0x0a, 0x5c, 0x5c, 0x32, 0x96, 0x8e, 0x95, 0x0e, 0x8a, 0x2c,
    0x5f, 0xe0, 0x6d, 0x6c, 0x38,
];

const KEY_LEN: usize = 16;
const IV_LEN: usize = 12;

pub struct NullAead {
    key: LessSafeKey,
    iv: [u8; IV_LEN],
}

impl NullAead {
    pub fn new(
        perspective: Perspective,
        connection_id: ConnectionId,
        version: VersionNumber,
    ) -> Result<Self> {
        // the IKM binds both inputs so keys differ across versions
        let mut ikm = [0u8; 12];
        ikm[..8].copy_from_slice(&connection_id.0.to_be_bytes());
        ikm[8..].copy_from_slice(&version.to_be_bytes());

        let handshake_secret = hkdf_extract(&HANDSHAKE_SALT, &ikm);
        let label = match perspective {
            Perspective::Client => "client hs",
            Perspective::Server => "server hs",
        };
        let secret = hkdf_expand(&handshake_secret, label, 32);

        let key_bytes = hkdf_expand(&secret, "key", KEY_LEN);
        let iv_bytes = hkdf_expand(&secret, "iv", IV_LEN);

        let unbound = UnboundKey::new(&aead::AES_128_GCM, &key_bytes)
            .map_err(|_| Error::Internal("AEAD key setup failed"))?;
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&iv_bytes);

        Ok(Self {
            key: LessSafeKey::new(unbound),
            iv,
        })
    }

    fn nonce(&self, packet_number: PacketNumber) -> Nonce {
        let mut nonce = self.iv;
        for (i, byte) in packet_number.to_be_bytes().iter().enumerate() {
            nonce[IV_LEN - 8 + i] ^= byte;
        }
        Nonce::assume_unique_for_key(nonce)
    }

    /// Seal `plaintext`; `associated_data` is the raw header bytes of
    /// the packet that will carry the result.
    pub fn seal(
        &self,
        plaintext: &[u8],
        packet_number: PacketNumber,
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                self.nonce(packet_number),
                Aad::from(associated_data),
                &mut in_out,
            )
            .map_err(|_| Error::Internal("AEAD seal failed"))?;
        Ok(in_out)
    }

    /// Open a sealed payload. Any mismatch of keys, packet number or
    /// associated data yields [`Error::DecryptionFailure`].
    pub fn open(
        &self,
        sealed: &[u8],
        packet_number: PacketNumber,
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(
                self.nonce(packet_number),
                Aad::from(associated_data),
                &mut in_out,
            )
            .map_err(|_| Error::DecryptionFailure)?;
        Ok(plaintext.to_vec())
    }

    /// Bytes the seal operation appends to a plaintext.
    pub fn overhead(&self) -> usize {
        aead::AES_128_GCM.tag_len()
    }
}

fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, salt);
    hmac::sign(&key, ikm).as_ref().to_vec()
}

fn hkdf_expand(prk: &[u8], label: &str, out_len: usize) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, prk);
    let mut out = Vec::with_capacity(out_len + 32);
    let mut block: Vec<u8> = Vec::new();
    let mut counter = 1u8;
    while out.len() < out_len {
        let mut data = block.clone();
        data.extend_from_slice(label.as_bytes());
        data.push(counter);
        block = hmac::sign(&key, &data).as_ref().to_vec();
        out.extend_from_slice(&block);
        counter += 1;
    }
    out.truncate(out_len);
    out
}
