//! Server side of the QUIC transport-parameter extension.

use crate::error::{Error, Result};
use crate::handshake::extension::{
    ClientHelloTransportParameters, EncryptedExtensionsTransportParameters, Extension,
    ExtensionList, HandshakeType, QUIC_EXTENSION_TYPE,
};
use crate::handshake::tls::TlsExtensionHandler;
use crate::handshake::transport_parameters::{
    TransportParameter, TransportParameters, STATELESS_RESET_TOKEN_PARAMETER_ID,
};
use crate::version::{is_supported_version, versions_with_reserved, VersionNumber};
use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

/// Handles the QUIC extension on the server: emits the server's
/// parameters and supported versions on EncryptedExtensions, and checks
/// the client's ClientHello extension for version downgrade.
///
/// Decoded peer parameters are published once on an internal channel and
/// picked up by the session factory through
/// [`TlsExtensionHandler::peer_params`].
pub struct ExtensionHandlerServer {
    params: TransportParameters,
    params_tx: Sender<TransportParameters>,
    params_rx: Receiver<TransportParameters>,

    version: VersionNumber,
    supported_versions: Vec<VersionNumber>,
}

impl ExtensionHandlerServer {
    pub fn new(
        params: TransportParameters,
        supported_versions: Vec<VersionNumber>,
        version: VersionNumber,
    ) -> Self {
        let (params_tx, params_rx) = bounded(1);
        Self {
            params,
            params_tx,
            params_rx,
            version,
            supported_versions,
        }
    }
}

impl TlsExtensionHandler for ExtensionHandlerServer {
    fn send(
        &mut self,
        handshake_type: HandshakeType,
        extensions: &mut ExtensionList,
    ) -> Result<()> {
        if handshake_type != HandshakeType::EncryptedExtensions {
            return Ok(());
        }

        let mut parameters = self.params.to_parameter_list();
        if !parameters
            .iter()
            .any(|p| p.id == STATELESS_RESET_TOKEN_PARAMETER_ID)
        {
            // fixed placeholder until the token is derived from a server secret
            parameters.push(TransportParameter {
                id: STATELESS_RESET_TOKEN_PARAMETER_ID,
                value: Bytes::from_static(&[42u8; 16]),
            });
        }

        let body = EncryptedExtensionsTransportParameters {
            supported_versions: versions_with_reserved(&self.supported_versions),
            parameters,
        }
        .encode()?;
        extensions.add(Extension {
            extension_type: QUIC_EXTENSION_TYPE,
            data: body,
        });
        Ok(())
    }

    fn receive(
        &mut self,
        handshake_type: HandshakeType,
        extensions: &ExtensionList,
    ) -> Result<()> {
        let extension = extensions.find(QUIC_EXTENSION_TYPE);

        if handshake_type != HandshakeType::ClientHello {
            return match extension {
                Some(_) => Err(Error::UnexpectedQuicExtension(handshake_type.code())),
                None => Ok(()),
            };
        }

        let extension = extension.ok_or(Error::MissingQuicExtension)?;
        let chtp = ClientHelloTransportParameters::decode(&extension.data)?;

        // the negotiated version must be the one this session is using
        if chtp.negotiated_version != self.version {
            return Err(Error::VersionNegotiationMismatch(
                "inconsistent negotiated version",
            ));
        }
        // Stateless downgrade check: had we supported the client's
        // initial version, we would have accepted it instead of sending
        // a Version Negotiation packet.
        if chtp.initial_version != chtp.negotiated_version
            && is_supported_version(&self.supported_versions, chtp.initial_version)
        {
            return Err(Error::VersionNegotiationMismatch(
                "client should have used the initial version",
            ));
        }

        if chtp
            .parameters
            .iter()
            .any(|p| p.id == STATELESS_RESET_TOKEN_PARAMETER_ID)
        {
            return Err(Error::StatelessResetTokenFromClient);
        }

        let mut params = TransportParameters::from_parameter_list(&chtp.parameters)
            .map_err(|e| Error::TransportParameter(e.to_string()))?;
        // stream count stays uncapped until a MAX_STREAM_ID equivalent exists
        params.max_streams = u32::MAX;

        if self.params_tx.try_send(params).is_err() {
            debug!("transport parameters already published for this session");
        }
        Ok(())
    }

    fn peer_params(&mut self) -> Option<TransportParameters> {
        self.params_rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{is_reserved_version, VERSION_39, VERSION_TLS};

    const SUPPORTED: &[VersionNumber] = &[VERSION_39, VERSION_TLS];

    fn handler() -> ExtensionHandlerServer {
        ExtensionHandlerServer::new(
            TransportParameters::default(),
            SUPPORTED.to_vec(),
            VERSION_TLS,
        )
    }

    fn client_hello_list(initial: VersionNumber, negotiated: VersionNumber) -> ExtensionList {
        client_hello_list_with(initial, negotiated, TransportParameters::default())
    }

    fn client_hello_list_with(
        initial: VersionNumber,
        negotiated: VersionNumber,
        params: TransportParameters,
    ) -> ExtensionList {
        let body = ClientHelloTransportParameters {
            initial_version: initial,
            negotiated_version: negotiated,
            parameters: params.to_parameter_list(),
        }
        .encode()
        .unwrap();
        let mut list = ExtensionList::new();
        list.add(Extension {
            extension_type: QUIC_EXTENSION_TYPE,
            data: body,
        });
        list
    }

    #[test]
    fn test_send_only_acts_on_encrypted_extensions() {
        let mut h = handler();
        let mut list = ExtensionList::new();
        h.send(HandshakeType::Certificate, &mut list).unwrap();
        assert!(list.is_empty());
        h.send(HandshakeType::EncryptedExtensions, &mut list)
            .unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_send_body_contents() {
        let mut h = handler();
        let mut list = ExtensionList::new();
        h.send(HandshakeType::EncryptedExtensions, &mut list)
            .unwrap();

        let ext = list.find(QUIC_EXTENSION_TYPE).unwrap();
        let body = EncryptedExtensionsTransportParameters::decode(&ext.data).unwrap();

        // the version list is ours plus one reserved entry
        assert_eq!(body.supported_versions.len(), SUPPORTED.len() + 1);
        for v in SUPPORTED {
            assert!(body.supported_versions.contains(v));
        }
        assert_eq!(
            body.supported_versions
                .iter()
                .filter(|v| is_reserved_version(**v))
                .count(),
            1
        );

        // the placeholder reset token rides along
        let token = body
            .parameters
            .iter()
            .find(|p| p.id == STATELESS_RESET_TOKEN_PARAMETER_ID)
            .unwrap();
        assert_eq!(&token.value[..], &[42u8; 16]);
    }

    #[test]
    fn test_receive_requires_extension_on_client_hello() {
        let mut h = handler();
        let err = h
            .receive(HandshakeType::ClientHello, &ExtensionList::new())
            .unwrap_err();
        assert_eq!(err, Error::MissingQuicExtension);
        assert_eq!(
            err.to_string(),
            "ClientHello didn't contain a QUIC extension"
        );
    }

    #[test]
    fn test_receive_rejects_extension_elsewhere() {
        let mut h = handler();
        let list = client_hello_list(VERSION_TLS, VERSION_TLS);
        assert_eq!(
            h.receive(HandshakeType::Finished, &list).unwrap_err(),
            Error::UnexpectedQuicExtension(20)
        );
        // absence elsewhere is fine
        assert!(h
            .receive(HandshakeType::Finished, &ExtensionList::new())
            .is_ok());
    }

    #[test]
    fn test_receive_publishes_params() {
        let mut h = handler();
        h.receive(
            HandshakeType::ClientHello,
            &client_hello_list(VERSION_TLS, VERSION_TLS),
        )
        .unwrap();
        let params = h.peer_params().unwrap();
        assert_eq!(params.max_streams, u32::MAX);
        assert_eq!(
            params.stream_flow_control_window,
            TransportParameters::default().stream_flow_control_window
        );
        // published exactly once
        assert!(h.peer_params().is_none());
    }

    #[test]
    fn test_receive_rejects_wrong_negotiated_version() {
        let mut h = handler();
        assert_eq!(
            h.receive(
                HandshakeType::ClientHello,
                &client_hello_list(VERSION_39, VERSION_39),
            )
            .unwrap_err(),
            Error::VersionNegotiationMismatch("inconsistent negotiated version")
        );
    }

    #[test]
    fn test_receive_detects_downgrade() {
        // the initial version is one we support, yet the client ended up
        // on a different negotiated version
        let mut h = handler();
        assert_eq!(
            h.receive(
                HandshakeType::ClientHello,
                &client_hello_list(VERSION_39, VERSION_TLS),
            )
            .unwrap_err(),
            Error::VersionNegotiationMismatch("client should have used the initial version")
        );
        assert!(h.peer_params().is_none());
    }

    #[test]
    fn test_receive_accepts_negotiated_from_unsupported_initial() {
        // a genuine negotiation: the initial version is unknown to us
        let mut h = handler();
        h.receive(
            HandshakeType::ClientHello,
            &client_hello_list(0x1337, VERSION_TLS),
        )
        .unwrap();
        assert!(h.peer_params().is_some());
    }

    #[test]
    fn test_receive_rejects_client_reset_token() {
        let mut h = handler();
        let list = client_hello_list_with(
            VERSION_TLS,
            VERSION_TLS,
            TransportParameters {
                stateless_reset_token: Some([7; 16]),
                ..Default::default()
            },
        );
        assert_eq!(
            h.receive(HandshakeType::ClientHello, &list).unwrap_err(),
            Error::StatelessResetTokenFromClient
        );
        // nothing was published
        assert!(h.peer_params().is_none());
    }
}
