//! Stateless TLS-dialect server front-end.
//!
//! Every incoming Initial packet is handled from scratch: no state is
//! kept between packets before a session is materialised, so a
//! retransmitted Initial simply re-runs the whole pipeline and a Retry
//! carries everything it needs inside its cookie. Per packet, exactly
//! one of four things happens:
//!
//! - the offered version is unknown → a Version Negotiation packet
//! - the body fails to decrypt or parse → silent drop
//! - the TLS library demands a cookie → a Retry packet
//! - the ClientHello completes → a Handshake packet plus a session
//!   handed to the accept loop

use crate::crypto::NullAead;
use crate::error::{Error, Result};
use crate::handshake::{
    Alert, CryptoStreamConn, TlsExtensionHandler, TlsHandshake, TlsState, TransportParameters,
};
use crate::types::{ConnectionId, PacketNumber, Perspective};
use crate::version::{is_supported_version, VersionNumber, VERSION_TLS};
use crate::wire::{compose_version_negotiation, parse_packet, Header, PacketType, StreamFrame};
use bytes::{Bytes, BytesMut};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Packet number of the first (and only) reply the front-end sends; the
/// session owns numbering from then on.
const SERVER_REPLY_PACKET_NUMBER: PacketNumber = 1;

/// Accepted-session backlog. When the accept loop falls this far behind,
/// new ClientHellos are dropped rather than queued without bound.
const SESSION_QUEUE_CAPACITY: usize = 16;

/// Write side of the UDP socket. Implementations must keep concurrent
/// datagram writes intact.
pub trait PacketConn: Send + Sync {
    fn write_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

impl PacketConn for UdpSocket {
    fn write_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.send_to(data, addr)
    }
}

/// Server configuration. The supported-versions list is read-only after
/// construction.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Versions accepted in Initial packets, in preference order.
    pub supported_versions: Vec<VersionNumber>,

    /// Transport parameters advertised on EncryptedExtensions.
    pub transport_parameters: TransportParameters,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            supported_versions: vec![VERSION_TLS],
            transport_parameters: TransportParameters::default(),
        }
    }
}

/// Everything the session factory needs to take over an accepted
/// connection.
pub struct PendingSession {
    pub connection_id: ConnectionId,
    pub version: VersionNumber,
    pub peer_params: TransportParameters,
    /// The conduit the TLS library is already bound to; the session
    /// attaches its crypto stream via `set_stream` + `flush`.
    pub crypto_stream: Arc<CryptoStreamConn>,
    pub remote_addr: SocketAddr,
}

/// Creates a fresh TLS session and extension handler bound to a conduit.
/// Production wires up a real TLS 1.3 stack; tests script the returns.
pub type TlsFactory = Box<
    dyn Fn(
            Arc<CryptoStreamConn>,
            VersionNumber,
        ) -> Result<(Box<dyn TlsHandshake>, Box<dyn TlsExtensionHandler>)>
        + Send
        + Sync,
>;

pub struct ServerTls {
    conn: Arc<dyn PacketConn>,
    config: ServerConfig,
    session_tx: Sender<PendingSession>,
    new_tls: TlsFactory,
}

impl ServerTls {
    /// Returns the front-end and the receive side of the session
    /// channel, to be owned by the accept loop.
    pub fn new(
        conn: Arc<dyn PacketConn>,
        config: ServerConfig,
        new_tls: TlsFactory,
    ) -> (Self, Receiver<PendingSession>) {
        let (session_tx, session_rx) = bounded(SESSION_QUEUE_CAPACITY);
        (
            Self {
                conn,
                config,
                session_tx,
                new_tls,
            },
            session_rx,
        )
    }

    /// Parse a raw datagram and dispatch client Initials. Anything that
    /// is not a well-formed Initial is dropped without reply.
    pub fn handle_datagram(&self, remote_addr: SocketAddr, data: Bytes) {
        match parse_packet(data, Perspective::Client) {
            Ok(packet)
                if packet.header.is_long_header
                    && packet.header.packet_type == PacketType::Initial =>
            {
                self.handle_initial(remote_addr, &packet.header, packet.payload);
            }
            Ok(packet) => {
                debug!(
                    connection_id = %packet.header.connection_id,
                    "dropping non-Initial packet"
                );
            }
            Err(e) => {
                debug!(error = %e, "dropping unparseable datagram");
            }
        }
    }

    /// Run the per-packet state machine for one Initial. At most one
    /// datagram is emitted; errors mean the packet is dropped silently.
    pub fn handle_initial(&self, remote_addr: SocketAddr, header: &Header, data: Bytes) {
        match self.handle_initial_impl(remote_addr, header, data) {
            Ok(Some(session)) => self.deliver_session(session),
            Ok(None) => {}
            Err(e) => {
                debug!(
                    connection_id = %header.connection_id,
                    error = %e,
                    "dropping Initial packet"
                );
            }
        }
    }

    fn handle_initial_impl(
        &self,
        remote_addr: SocketAddr,
        header: &Header,
        data: Bytes,
    ) -> Result<Option<PendingSession>> {
        if !is_supported_version(&self.config.supported_versions, header.version) {
            self.send_version_negotiation(remote_addr, header)?;
            return Ok(None);
        }
        let version = header.version;

        let aead = NullAead::new(Perspective::Client, header.connection_id, version)?;
        let plaintext = aead.open(&data, header.packet_number, &header.raw)?;

        let mut plaintext = Bytes::from(plaintext);
        let frame = StreamFrame::parse(&mut plaintext)?;
        // the ClientHello rides at the very start of the crypto stream
        if frame.stream_id != 0 || frame.offset != 0 {
            return Err(Error::InvalidFrameData);
        }

        let crypto_stream = Arc::new(CryptoStreamConn::new(remote_addr));
        crypto_stream.add_data_for_reading(&frame.data);
        let (mut tls, mut extension_handler) = (self.new_tls)(crypto_stream.clone(), version)?;

        match tls.handshake() {
            Alert::StatelessRetry => {
                // the cookie demand sits in the conduit's write buffer
                self.send_reply(
                    remote_addr,
                    header.connection_id,
                    version,
                    PacketType::Retry,
                    &crypto_stream,
                )?;
                Ok(None)
            }
            Alert::NoAlert => {
                let state = tls.state();
                if state != TlsState::ServerNegotiated {
                    return Err(Error::HandshakeFailed(format!(
                        "unexpected TLS state after ClientHello: {state:?}"
                    )));
                }
                self.send_reply(
                    remote_addr,
                    header.connection_id,
                    version,
                    PacketType::Handshake,
                    &crypto_stream,
                )?;

                let alert = tls.handshake();
                if alert != Alert::NoAlert {
                    return Err(Error::HandshakeFailed(format!(
                        "unexpected TLS alert: {alert:?}"
                    )));
                }
                let state = tls.state();
                if state != TlsState::ServerWaitFlight2 {
                    return Err(Error::HandshakeFailed(format!(
                        "unexpected TLS state after server flight: {state:?}"
                    )));
                }

                let peer_params = extension_handler.peer_params().ok_or_else(|| {
                    Error::HandshakeFailed("no transport parameters received".into())
                })?;

                Ok(Some(PendingSession {
                    connection_id: header.connection_id,
                    version,
                    peer_params,
                    crypto_stream,
                    remote_addr,
                }))
            }
            Alert::Other(code) => Err(Error::HandshakeFailed(format!("TLS alert {code}"))),
        }
    }

    fn send_version_negotiation(&self, remote_addr: SocketAddr, header: &Header) -> Result<()> {
        debug!(
            connection_id = %header.connection_id,
            version = header.version,
            "client offered unsupported version, sending Version Negotiation"
        );
        let packet = compose_version_negotiation(
            header.connection_id,
            header.packet_number,
            header.version,
            &self.config.supported_versions,
        );
        self.conn.write_to(&packet, remote_addr)?;
        Ok(())
    }

    /// Wrap the bytes harvested from the conduit in a sealed long-header
    /// packet and send it.
    fn send_reply(
        &self,
        remote_addr: SocketAddr,
        connection_id: ConnectionId,
        version: VersionNumber,
        packet_type: PacketType,
        crypto_stream: &CryptoStreamConn,
    ) -> Result<()> {
        let payload = crypto_stream.get_data_for_writing();

        let reply_header = Header {
            is_long_header: true,
            packet_type,
            connection_id,
            packet_number: SERVER_REPLY_PACKET_NUMBER,
            version,
            ..Default::default()
        };

        let aead = NullAead::new(Perspective::Server, connection_id, version)?;
        let mut buf =
            BytesMut::with_capacity(reply_header.header_len() + payload.len() + aead.overhead());
        reply_header.write(&mut buf, Perspective::Server, version)?;
        let header_len = buf.len();
        let sealed = aead.seal(&payload, SERVER_REPLY_PACKET_NUMBER, &buf[..header_len])?;
        buf.extend_from_slice(&sealed);

        self.conn.write_to(&buf, remote_addr)?;
        Ok(())
    }

    fn deliver_session(&self, session: PendingSession) {
        let connection_id = session.connection_id;
        match self.session_tx.try_send(session) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    connection_id = %connection_id,
                    "session queue saturated, dropping accepted connection"
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                error!(
                    connection_id = %connection_id,
                    "accept loop has shut down, dropping accepted connection"
                );
            }
        }
    }
}
