//! Interface to the LoRaWAN protocol engine
//!
//! The engine owns the MAC layer. This crate only moves its two persistence
//! blobs in and out and asks it to join.

use thiserror::Error;

use crate::band::Band;

/// Size of the blob needed to start a new session (DevNonce / JoinNonce state)
pub const NONCES_BUF_SIZE: usize = 16;

/// Size of the blob describing an established session (keys, DevAddr, frame counters)
pub const SESSION_BUF_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("buffer rejected: {0}")]
    InvalidBuffer(&'static str),

    #[error("join failed: {0}")]
    JoinFailed(String),

    #[error("not joined")]
    NotJoined,
}

/// OTAA credentials handed to the engine on join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaaKeys {
    pub join_eui: u64,
    pub dev_eui: u64,
    pub nwk_key: [u8; 16],
    pub app_key: [u8; 16],
}

pub trait ProtocolEngine: Sized {
    /// Handle to the radio the engine drives
    type Phy;

    /// Create an unjoined engine bound to a band and sub-band (0 if not applicable)
    fn new(phy: Self::Phy, band: &'static Band, sub_band: u8) -> Self;

    fn buffer_nonces(&self) -> &[u8; NONCES_BUF_SIZE];

    fn set_buffer_nonces(&mut self, buf: &[u8; NONCES_BUF_SIZE]) -> Result<(), EngineError>;

    fn buffer_session(&self) -> &[u8; SESSION_BUF_SIZE];

    fn set_buffer_session(&mut self, buf: &[u8; SESSION_BUF_SIZE]) -> Result<(), EngineError>;

    /// Activate over the air. Without `force` an installed session is reused
    /// if the engine accepts it; with `force`, or when there is nothing to
    /// reuse, a join is performed.
    fn begin_otaa(&mut self, keys: &OtaaKeys, force: bool) -> Result<(), EngineError>;

    fn is_joined(&self) -> bool;
}
