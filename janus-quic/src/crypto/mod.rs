//! Cryptographic protection for the pre-handshake packet exchange.
//!
//! Real traffic keys only exist once the TLS handshake completes; until
//! then Initial, Retry and Handshake packets are protected by the
//! deterministic [`NullAead`], whose keys any observer can derive from
//! the connection ID and version. It provides integrity against
//! off-path corruption, not confidentiality.

pub mod null_aead;

pub use null_aead::NullAead;
