//! The QUIC TLS extension: list plumbing and body codecs.
//!
//! Bodies use the TLS presentation-language framing: the supported-
//! versions list carries a one-byte length prefix (in bytes), parameter
//! lists a two-byte one, and each parameter is `(u16 id, u16 len, value)`.

use crate::error::{Error, Result};
use crate::handshake::transport_parameters::TransportParameter;
use crate::version::VersionNumber;
use crate::wire::coding;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Extension codepoint for QUIC transport parameters.
pub const QUIC_EXTENSION_TYPE: u16 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeType {
    ClientHello,
    ServerHello,
    EncryptedExtensions,
    Certificate,
    Finished,
    Other(u8),
}

impl HandshakeType {
    pub fn code(self) -> u8 {
        match self {
            HandshakeType::ClientHello => 1,
            HandshakeType::ServerHello => 2,
            HandshakeType::EncryptedExtensions => 8,
            HandshakeType::Certificate => 11,
            HandshakeType::Finished => 20,
            HandshakeType::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub extension_type: u16,
    pub data: Bytes,
}

/// The extension list of one handshake message.
#[derive(Debug, Clone, Default)]
pub struct ExtensionList {
    extensions: Vec<Extension>,
}

impl ExtensionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, extension: Extension) {
        self.extensions.push(extension);
    }

    pub fn find(&self, extension_type: u16) -> Option<&Extension> {
        self.extensions
            .iter()
            .find(|e| e.extension_type == extension_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Body of the extension the server places on EncryptedExtensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedExtensionsTransportParameters {
    pub supported_versions: Vec<VersionNumber>,
    pub parameters: Vec<TransportParameter>,
}

impl EncryptedExtensionsTransportParameters {
    pub fn encode(&self) -> Result<Bytes> {
        let versions_len = self.supported_versions.len() * 4;
        if versions_len > u8::MAX as usize {
            return Err(Error::Internal("supported versions list too long"));
        }
        let mut buf = BytesMut::new();
        buf.put_u8(versions_len as u8);
        for version in &self.supported_versions {
            buf.put_u32(*version);
        }
        encode_parameter_list(&mut buf, &self.parameters)?;
        Ok(buf.freeze())
    }

    pub fn decode(data: &Bytes) -> Result<Self> {
        let mut buf = data.clone();
        let versions_len = coding::read_u8(&mut buf)
            .map_err(|_| Error::MalformedExtension("truncated version list length"))?
            as usize;
        if versions_len % 4 != 0 || buf.remaining() < versions_len {
            return Err(Error::MalformedExtension("bad supported versions list"));
        }
        let mut supported_versions = Vec::with_capacity(versions_len / 4);
        for _ in 0..versions_len / 4 {
            supported_versions.push(buf.get_u32());
        }
        let parameters = decode_parameter_list(&mut buf)?;
        if buf.has_remaining() {
            return Err(Error::MalformedExtension("trailing bytes"));
        }
        Ok(Self {
            supported_versions,
            parameters,
        })
    }
}

/// Body of the extension a client places on its ClientHello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHelloTransportParameters {
    pub initial_version: VersionNumber,
    pub negotiated_version: VersionNumber,
    pub parameters: Vec<TransportParameter>,
}

impl ClientHelloTransportParameters {
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        buf.put_u32(self.initial_version);
        buf.put_u32(self.negotiated_version);
        encode_parameter_list(&mut buf, &self.parameters)?;
        Ok(buf.freeze())
    }

    pub fn decode(data: &Bytes) -> Result<Self> {
        let mut buf = data.clone();
        if buf.remaining() < 8 {
            return Err(Error::MalformedExtension("truncated version fields"));
        }
        let initial_version = buf.get_u32();
        let negotiated_version = buf.get_u32();
        let parameters = decode_parameter_list(&mut buf)?;
        if buf.has_remaining() {
            return Err(Error::MalformedExtension("trailing bytes"));
        }
        Ok(Self {
            initial_version,
            negotiated_version,
            parameters,
        })
    }
}

fn encode_parameter_list(buf: &mut BytesMut, parameters: &[TransportParameter]) -> Result<()> {
    let mut list = BytesMut::new();
    for p in parameters {
        if p.value.len() > u16::MAX as usize {
            return Err(Error::Internal("transport parameter value too long"));
        }
        list.put_u16(p.id);
        list.put_u16(p.value.len() as u16);
        list.put_slice(&p.value);
    }
    if list.len() > u16::MAX as usize {
        return Err(Error::Internal("transport parameter list too long"));
    }
    buf.put_u16(list.len() as u16);
    buf.put_slice(&list);
    Ok(())
}

fn decode_parameter_list(buf: &mut Bytes) -> Result<Vec<TransportParameter>> {
    let list_len = coding::read_u16(buf)
        .map_err(|_| Error::MalformedExtension("truncated parameter list length"))?
        as usize;
    if buf.remaining() < list_len {
        return Err(Error::MalformedExtension("truncated parameter list"));
    }
    let mut list = buf.copy_to_bytes(list_len);

    let mut parameters = Vec::new();
    while list.has_remaining() {
        if list.remaining() < 4 {
            return Err(Error::MalformedExtension("truncated parameter header"));
        }
        let id = list.get_u16();
        let value_len = list.get_u16() as usize;
        if list.remaining() < value_len {
            return Err(Error::MalformedExtension("truncated parameter value"));
        }
        parameters.push(TransportParameter {
            id,
            value: list.copy_to_bytes(value_len),
        });
    }
    Ok(parameters)
}
