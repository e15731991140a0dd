//! Shared fixtures for unit tests

use crate::band::Band;
use crate::engine::{EngineError, OtaaKeys, ProtocolEngine, NONCES_BUF_SIZE, SESSION_BUF_SIZE};

/// How a [`RecordingEngine`] answers join attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinBehaviour {
    /// Reuse an installed session, join when forced
    Normal,
    /// Refuse installed sessions, join when forced
    RejectSession,
    /// Never join
    Offline,
}

/// Engine that records every call made on it
#[derive(Debug)]
pub struct RecordingEngine {
    pub band: &'static str,
    pub sub_band: u8,
    pub nonces: [u8; NONCES_BUF_SIZE],
    pub session: [u8; SESSION_BUF_SIZE],
    pub nonces_installed: bool,
    pub session_installed: bool,
    pub otaa_calls: Vec<bool>,
    pub joined: bool,
    /// Refuse every buffer handed in
    pub reject_buffers: bool,
    behaviour: JoinBehaviour,
}

impl ProtocolEngine for RecordingEngine {
    type Phy = JoinBehaviour;

    fn new(phy: JoinBehaviour, band: &'static Band, sub_band: u8) -> Self {
        Self {
            band: band.name,
            sub_band,
            nonces: [0; NONCES_BUF_SIZE],
            session: [0; SESSION_BUF_SIZE],
            nonces_installed: false,
            session_installed: false,
            otaa_calls: Vec::new(),
            joined: false,
            reject_buffers: false,
            behaviour: phy,
        }
    }

    fn buffer_nonces(&self) -> &[u8; NONCES_BUF_SIZE] {
        &self.nonces
    }

    fn set_buffer_nonces(&mut self, buf: &[u8; NONCES_BUF_SIZE]) -> Result<(), EngineError> {
        if self.reject_buffers {
            return Err(EngineError::InvalidBuffer("nonces refused"));
        }
        self.nonces = *buf;
        self.nonces_installed = true;
        Ok(())
    }

    fn buffer_session(&self) -> &[u8; SESSION_BUF_SIZE] {
        &self.session
    }

    fn set_buffer_session(&mut self, buf: &[u8; SESSION_BUF_SIZE]) -> Result<(), EngineError> {
        if self.reject_buffers {
            return Err(EngineError::InvalidBuffer("session refused"));
        }
        self.session = *buf;
        self.session_installed = true;
        Ok(())
    }

    fn begin_otaa(&mut self, _keys: &OtaaKeys, force: bool) -> Result<(), EngineError> {
        self.otaa_calls.push(force);
        self.joined = match (self.behaviour, force) {
            (JoinBehaviour::Offline, _) => false,
            (JoinBehaviour::RejectSession, false) => false,
            (JoinBehaviour::Normal, false) => self.session_installed,
            (_, true) => true,
        };
        if self.joined {
            Ok(())
        } else {
            Err(EngineError::NotJoined)
        }
    }

    fn is_joined(&self) -> bool {
        self.joined
    }
}

/// Engine on EU868 with the given behaviour
pub fn engine(behaviour: JoinBehaviour) -> RecordingEngine {
    let band = crate::band::resolve("EU868").expect("EU868 is supported");
    RecordingEngine::new(behaviour, band, 0)
}
