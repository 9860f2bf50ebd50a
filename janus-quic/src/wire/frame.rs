//! STREAM frame codec.
//!
//! The handshake front-end only ever needs the one frame that carries
//! crypto-stream data, so this is not a general frame parser. The type
//! byte is `0x10` with flag bits: 0x04 offset present, 0x02 length
//! present, 0x01 FIN.

use crate::error::{Error, Result};
use crate::wire::coding;
use bytes::{Buf, BufMut, Bytes};

const STREAM_FRAME_TYPE: u8 = 0x10;
const FLAG_FIN: u8 = 0x01;
const FLAG_LEN: u8 = 0x02;
const FLAG_OFF: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub stream_id: u64,
    pub offset: u64,
    pub data: Bytes,
    pub fin: bool,
}

impl StreamFrame {
    pub fn parse(buf: &mut Bytes) -> Result<Self> {
        let type_byte = coding::read_u8(buf)?;
        if type_byte & !0x07 != STREAM_FRAME_TYPE {
            return Err(Error::InvalidFrameData);
        }

        let stream_id = coding::read_varint(buf)?;
        let offset = if type_byte & FLAG_OFF != 0 {
            coding::read_varint(buf)?
        } else {
            0
        };

        let data = if type_byte & FLAG_LEN != 0 {
            let len = coding::read_varint(buf)? as usize;
            if buf.remaining() < len {
                return Err(Error::InvalidFrameData);
            }
            buf.copy_to_bytes(len)
        } else {
            // without a length the frame extends to the end of the packet
            buf.copy_to_bytes(buf.remaining())
        };

        Ok(StreamFrame {
            stream_id,
            offset,
            data,
            fin: type_byte & FLAG_FIN != 0,
        })
    }

    /// Serialise with an explicit length so the frame can be followed by
    /// others in the same packet.
    pub fn write<B: BufMut>(&self, buf: &mut B) {
        let mut type_byte = STREAM_FRAME_TYPE | FLAG_LEN;
        if self.offset > 0 {
            type_byte |= FLAG_OFF;
        }
        if self.fin {
            type_byte |= FLAG_FIN;
        }
        buf.put_u8(type_byte);
        coding::write_varint(buf, self.stream_id);
        if self.offset > 0 {
            coding::write_varint(buf, self.offset);
        }
        coding::write_varint(buf, self.data.len() as u64);
        buf.put_slice(&self.data);
    }
}
