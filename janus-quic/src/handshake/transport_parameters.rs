//! QUIC transport parameters and their TLS-extension value encoding.

use anyhow::{anyhow, bail, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;

pub type TransportParameterId = u16;

pub const INITIAL_MAX_STREAM_DATA_PARAMETER_ID: TransportParameterId = 0;
pub const INITIAL_MAX_DATA_PARAMETER_ID: TransportParameterId = 1;
pub const INITIAL_MAX_STREAM_ID_PARAMETER_ID: TransportParameterId = 2;
pub const IDLE_TIMEOUT_PARAMETER_ID: TransportParameterId = 3;
pub const OMIT_CONNECTION_ID_PARAMETER_ID: TransportParameterId = 4;
pub const MAX_PACKET_SIZE_PARAMETER_ID: TransportParameterId = 5;
pub const STATELESS_RESET_TOKEN_PARAMETER_ID: TransportParameterId = 6;

/// One `(id, value)` entry as it appears in the extension body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParameter {
    pub id: TransportParameterId,
    pub value: Bytes,
}

/// Decoded transport parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParameters {
    pub stream_flow_control_window: u32,
    pub connection_flow_control_window: u32,
    pub max_streams: u32,
    pub idle_timeout: Duration,
    pub omit_connection_id: bool,
    pub max_packet_size: u16,
    pub stateless_reset_token: Option<[u8; 16]>,
}

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            stream_flow_control_window: 1 << 20,
            connection_flow_control_window: 3 << 19,
            max_streams: 100,
            idle_timeout: Duration::from_secs(30),
            omit_connection_id: false,
            max_packet_size: 1350,
            stateless_reset_token: None,
        }
    }
}

impl TransportParameters {
    /// Serialise into the `(id, value)` list carried by the extension.
    /// The reset token is only present when one is set.
    pub fn to_parameter_list(&self) -> Vec<TransportParameter> {
        fn u32_param(id: TransportParameterId, val: u32) -> TransportParameter {
            let mut b = BytesMut::with_capacity(4);
            b.put_u32(val);
            TransportParameter {
                id,
                value: b.freeze(),
            }
        }
        fn u16_param(id: TransportParameterId, val: u16) -> TransportParameter {
            let mut b = BytesMut::with_capacity(2);
            b.put_u16(val);
            TransportParameter {
                id,
                value: b.freeze(),
            }
        }

        let mut params = vec![
            u32_param(
                INITIAL_MAX_STREAM_DATA_PARAMETER_ID,
                self.stream_flow_control_window,
            ),
            u32_param(
                INITIAL_MAX_DATA_PARAMETER_ID,
                self.connection_flow_control_window,
            ),
            u32_param(INITIAL_MAX_STREAM_ID_PARAMETER_ID, self.max_streams),
            u16_param(
                IDLE_TIMEOUT_PARAMETER_ID,
                self.idle_timeout.as_secs().min(u16::MAX as u64) as u16,
            ),
            u16_param(MAX_PACKET_SIZE_PARAMETER_ID, self.max_packet_size),
        ];
        if self.omit_connection_id {
            params.push(TransportParameter {
                id: OMIT_CONNECTION_ID_PARAMETER_ID,
                value: Bytes::new(),
            });
        }
        if let Some(token) = self.stateless_reset_token {
            params.push(TransportParameter {
                id: STATELESS_RESET_TOKEN_PARAMETER_ID,
                value: Bytes::copy_from_slice(&token),
            });
        }
        params
    }

    /// Decode a parameter list. The flow-control windows and the idle
    /// timeout are required; unknown ids are ignored.
    pub fn from_parameter_list(params: &[TransportParameter]) -> Result<Self> {
        let mut decoded = Self {
            stream_flow_control_window: 0,
            connection_flow_control_window: 0,
            max_streams: 0,
            idle_timeout: Duration::ZERO,
            omit_connection_id: false,
            max_packet_size: 0,
            stateless_reset_token: None,
        };
        let mut seen_stream_data = false;
        let mut seen_max_data = false;
        let mut seen_idle_timeout = false;

        fn u32_value(p: &TransportParameter) -> Result<u32> {
            let v: [u8; 4] = p.value.as_ref().try_into().map_err(|_| {
                anyhow!("parameter {:#06x} has wrong length {}", p.id, p.value.len())
            })?;
            Ok(u32::from_be_bytes(v))
        }
        fn u16_value(p: &TransportParameter) -> Result<u16> {
            let v: [u8; 2] = p.value.as_ref().try_into().map_err(|_| {
                anyhow!("parameter {:#06x} has wrong length {}", p.id, p.value.len())
            })?;
            Ok(u16::from_be_bytes(v))
        }

        for p in params {
            match p.id {
                INITIAL_MAX_STREAM_DATA_PARAMETER_ID => {
                    decoded.stream_flow_control_window = u32_value(p)?;
                    seen_stream_data = true;
                }
                INITIAL_MAX_DATA_PARAMETER_ID => {
                    decoded.connection_flow_control_window = u32_value(p)?;
                    seen_max_data = true;
                }
                INITIAL_MAX_STREAM_ID_PARAMETER_ID => {
                    decoded.max_streams = u32_value(p)?;
                }
                IDLE_TIMEOUT_PARAMETER_ID => {
                    decoded.idle_timeout = Duration::from_secs(u16_value(p)? as u64);
                    seen_idle_timeout = true;
                }
                OMIT_CONNECTION_ID_PARAMETER_ID => {
                    if !p.value.is_empty() {
                        bail!("parameter {:#06x} must be empty", p.id);
                    }
                    decoded.omit_connection_id = true;
                }
                MAX_PACKET_SIZE_PARAMETER_ID => {
                    decoded.max_packet_size = u16_value(p)?;
                }
                STATELESS_RESET_TOKEN_PARAMETER_ID => {
                    let token: [u8; 16] = p.value.as_ref().try_into().map_err(|_| {
                        anyhow!("stateless reset token has wrong length {}", p.value.len())
                    })?;
                    decoded.stateless_reset_token = Some(token);
                }
                _ => {} // ignore unknown parameters
            }
        }

        if !seen_stream_data {
            bail!("missing parameter {:#06x}", INITIAL_MAX_STREAM_DATA_PARAMETER_ID);
        }
        if !seen_max_data {
            bail!("missing parameter {:#06x}", INITIAL_MAX_DATA_PARAMETER_ID);
        }
        if !seen_idle_timeout {
            bail!("missing parameter {:#06x}", IDLE_TIMEOUT_PARAMETER_ID);
        }
        Ok(decoded)
    }
}
