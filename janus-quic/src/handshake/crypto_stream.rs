//! The byte conduit handed to the TLS library.
//!
//! A TLS stack expects a plain bidirectional connection, but before a
//! session exists there is no crypto stream yet — only per-packet byte
//! queues the front-end feeds and drains. [`CryptoStreamConn`] straddles
//! both phases: it starts out buffered and is switched over to a real
//! reliable stream exactly once, when the session is created.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug;

/// A reliable in-order byte stream the conduit can be switched onto.
pub trait CryptoStream: Read + Write + Send {}

impl<T: Read + Write + Send> CryptoStream for T {}

struct Inner {
    read_buf: BytesMut,
    write_buf: BytesMut,
    stream: Option<Box<dyn CryptoStream>>,
}

pub struct CryptoStreamConn {
    remote_addr: SocketAddr,
    inner: Mutex<Inner>,
}

impl CryptoStreamConn {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            inner: Mutex::new(Inner {
                read_buf: BytesMut::new(),
                write_buf: BytesMut::new(),
                stream: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append decrypted crypto-frame bytes for the TLS library to read.
    /// Never blocks.
    pub fn add_data_for_reading(&self, data: &[u8]) {
        self.lock().read_buf.put_slice(data);
    }

    /// Read handshake bytes. While buffered, a drained queue reads as
    /// zero bytes rather than end-of-stream: the next packet may refill
    /// it. Once a stream is attached, reads go to the stream and the
    /// buffer is never consulted again.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        if let Some(stream) = inner.stream.as_mut() {
            return stream.read(buf);
        }
        let n = buf.len().min(inner.read_buf.len());
        buf[..n].copy_from_slice(&inner.read_buf[..n]);
        inner.read_buf.advance(n);
        Ok(n)
    }

    /// Write handshake bytes: buffered before the session exists,
    /// straight to the stream afterwards.
    pub fn write(&self, data: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        match inner.stream.as_mut() {
            Some(stream) => stream.write(data),
            None => {
                inner.write_buf.put_slice(data);
                Ok(data.len())
            }
        }
    }

    /// Return everything written so far and reset the write queue.
    pub fn get_data_for_writing(&self) -> Bytes {
        self.lock().write_buf.split().freeze()
    }

    /// One-shot transition to the streaming phase. Residual buffered
    /// writes are not forwarded automatically; call [`Self::flush`].
    /// Repeated calls keep the first stream.
    pub fn set_stream(&self, stream: Box<dyn CryptoStream>) {
        let mut inner = self.lock();
        if inner.stream.is_some() {
            debug!("crypto stream already attached, ignoring replacement");
            return;
        }
        inner.stream = Some(stream);
    }

    /// Move all buffered writes into the attached stream, in write
    /// order. Returns the number of bytes moved.
    pub fn flush(&self) -> io::Result<usize> {
        let mut inner = self.lock();
        let buffered = inner.write_buf.split();
        match inner.stream.as_mut() {
            Some(stream) => {
                stream.write_all(&buffered)?;
                Ok(buffered.len())
            }
            None => {
                inner.write_buf.unsplit(buffered);
                Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no crypto stream attached",
                ))
            }
        }
    }

    pub fn close(&self) {}

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    // deadlines are enforced by the owning session, not the conduit
    pub fn set_read_deadline(&self, _deadline: Option<Instant>) {}
    pub fn set_write_deadline(&self, _deadline: Option<Instant>) {}
}

impl Read for &CryptoStreamConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        CryptoStreamConn::read(self, buf)
    }
}

impl Write for &CryptoStreamConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        CryptoStreamConn::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
