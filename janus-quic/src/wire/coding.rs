//! Big-endian and varint primitives over `bytes` buffers.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut};

pub fn read_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(Error::BufferTooShort);
    }
    Ok(buf.get_u8())
}

pub fn read_u16<B: Buf>(buf: &mut B) -> Result<u16> {
    if buf.remaining() < 2 {
        return Err(Error::BufferTooShort);
    }
    Ok(buf.get_u16())
}

pub fn read_u32<B: Buf>(buf: &mut B) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(Error::BufferTooShort);
    }
    Ok(buf.get_u32())
}

pub fn read_u64<B: Buf>(buf: &mut B) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(Error::BufferTooShort);
    }
    Ok(buf.get_u64())
}

/// Read an `n`-byte big-endian unsigned integer, 1 <= n <= 8.
pub fn read_uint<B: Buf>(buf: &mut B, n: usize) -> Result<u64> {
    debug_assert!((1..=8).contains(&n));
    if buf.remaining() < n {
        return Err(Error::BufferTooShort);
    }
    Ok(buf.get_uint(n))
}

/// Write the low `n` bytes of `val` big-endian.
pub fn write_uint<B: BufMut>(buf: &mut B, val: u64, n: usize) {
    debug_assert!((1..=8).contains(&n));
    buf.put_uint(val, n);
}

/// Read a QUIC variable-length integer (2-bit length prefix).
pub fn read_varint<B: Buf>(buf: &mut B) -> Result<u64> {
    if !buf.has_remaining() {
        return Err(Error::BufferTooShort);
    }
    let first = buf.chunk()[0];
    let len = 1 << (first >> 6);

    if buf.remaining() < len {
        return Err(Error::BufferTooShort);
    }

    let val = match len {
        1 => buf.get_u8() as u64,
        2 => (buf.get_u16() & 0x3FFF) as u64,
        4 => (buf.get_u32() & 0x3FFF_FFFF) as u64,
        8 => buf.get_u64() & 0x3FFF_FFFF_FFFF_FFFF,
        _ => unreachable!(),
    };
    Ok(val)
}

/// Write a QUIC variable-length integer in its minimal encoding.
pub fn write_varint<B: BufMut>(buf: &mut B, val: u64) {
    if val <= 63 {
        buf.put_u8(val as u8);
    } else if val <= 16383 {
        buf.put_u16((val as u16) | 0x4000);
    } else if val <= 1_073_741_823 {
        buf.put_u32((val as u32) | 0x8000_0000);
    } else {
        buf.put_u64(val | 0xC000_0000_0000_0000);
    }
}

pub fn varint_len(val: u64) -> usize {
    if val <= 63 {
        1
    } else if val <= 16383 {
        2
    } else if val <= 1_073_741_823 {
        4
    } else {
        8
    }
}
