//! Simulated LoRaWAN end-device
//!
//! Stands in for the real MAC stack in tests and in the CLI. It models only
//! what persistence can observe from the outside: every join attempt
//! consumes a DevNonce, an accepted join opens a session with a DevAddr and
//! a zeroed frame counter, and each uplink advances that counter. The
//! "network" is just a flag on [`SimRadio`].
//!
//! Nonce buffer: DevNonce(2,LE) | JoinNonce(4,LE) | zero padding | checksum(2,LE)
//! Session buffer: active(1) | DevAddr(4,LE) | FCntUp(4,LE) | DevEUI(8,LE) |
//!                 zero padding | checksum(2,LE)

use tracing::{debug, info, warn};

use crate::band::Band;
use crate::engine::{EngineError, OtaaKeys, ProtocolEngine, NONCES_BUF_SIZE, SESSION_BUF_SIZE};

/// NetID the simulated network hands out addresses from (TTN's)
const SIM_NET_ID: u32 = 0x000013;

const SESSION_ACTIVE: u8 = 0x01;

/// The radio the simulated node transmits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimRadio {
    /// Whether a network in range answers JoinRequests
    pub accept_joins: bool,
}

impl Default for SimRadio {
    fn default() -> Self {
        Self { accept_joins: true }
    }
}

#[derive(Debug)]
pub struct SimNode {
    radio: SimRadio,
    band: &'static Band,
    sub_band: u8,
    nonces: [u8; NONCES_BUF_SIZE],
    session: [u8; SESSION_BUF_SIZE],
    joined: bool,
}

impl SimNode {
    pub fn band(&self) -> &'static Band {
        self.band
    }

    pub fn sub_band(&self) -> u8 {
        self.sub_band
    }

    pub fn dev_nonce(&self) -> u16 {
        u16::from_le_bytes([self.nonces[0], self.nonces[1]])
    }

    pub fn join_nonce(&self) -> u32 {
        u32::from_le_bytes(self.nonces[2..6].try_into().unwrap_or_default())
    }

    fn session_active(&self) -> bool {
        self.session[0] == SESSION_ACTIVE
    }

    pub fn dev_addr(&self) -> Option<u32> {
        self.session_active()
            .then(|| u32::from_le_bytes(self.session[1..5].try_into().unwrap_or_default()))
    }

    /// Uplink frame counter of the current session
    pub fn fcnt_up(&self) -> Option<u32> {
        self.session_active()
            .then(|| u32::from_le_bytes(self.session[5..9].try_into().unwrap_or_default()))
    }

    fn session_dev_eui(&self) -> u64 {
        u64::from_le_bytes(self.session[9..17].try_into().unwrap_or_default())
    }

    /// Send an uplink, returning the frame counter it went out with
    pub fn send_uplink(&mut self, f_port: u8, payload: &[u8]) -> Result<u32, EngineError> {
        if !self.joined {
            return Err(EngineError::NotJoined);
        }
        let (Some(dev_addr), Some(fcnt)) = (self.dev_addr(), self.fcnt_up()) else {
            return Err(EngineError::NotJoined);
        };

        debug!(
            "Uplink DevAddr={:08X} FCnt={} FPort={} ({} bytes)",
            dev_addr,
            fcnt,
            f_port,
            payload.len()
        );
        self.session[5..9].copy_from_slice(&fcnt.wrapping_add(1).to_le_bytes());
        seal(&mut self.session);
        Ok(fcnt)
    }

    fn join(&mut self, keys: &OtaaKeys) -> Result<(), EngineError> {
        // A DevNonce is spent whether or not the join is answered
        let dev_nonce = self.dev_nonce().wrapping_add(1);
        self.nonces[0..2].copy_from_slice(&dev_nonce.to_le_bytes());
        seal(&mut self.nonces);
        debug!(
            "JoinRequest DevEUI={:016X} DevNonce={} on {}",
            keys.dev_eui, dev_nonce, self.band.name
        );

        self.session = [0; SESSION_BUF_SIZE];
        if !self.radio.accept_joins {
            self.joined = false;
            return Err(EngineError::JoinFailed("no JoinAccept received".to_string()));
        }

        let join_nonce = self.join_nonce().wrapping_add(1) & 0x00FF_FFFF;
        self.nonces[2..6].copy_from_slice(&join_nonce.to_le_bytes());
        seal(&mut self.nonces);

        let dev_addr = assign_dev_addr(keys.dev_eui, join_nonce);
        self.session[0] = SESSION_ACTIVE;
        self.session[1..5].copy_from_slice(&dev_addr.to_le_bytes());
        self.session[5..9].copy_from_slice(&0u32.to_le_bytes());
        self.session[9..17].copy_from_slice(&keys.dev_eui.to_le_bytes());
        seal(&mut self.session);

        self.joined = true;
        info!("Joined as DevAddr {:08X}", dev_addr);
        Ok(())
    }
}

impl ProtocolEngine for SimNode {
    type Phy = SimRadio;

    fn new(phy: SimRadio, band: &'static Band, sub_band: u8) -> Self {
        Self {
            radio: phy,
            band,
            sub_band,
            nonces: [0; NONCES_BUF_SIZE],
            session: [0; SESSION_BUF_SIZE],
            joined: false,
        }
    }

    fn buffer_nonces(&self) -> &[u8; NONCES_BUF_SIZE] {
        &self.nonces
    }

    fn set_buffer_nonces(&mut self, buf: &[u8; NONCES_BUF_SIZE]) -> Result<(), EngineError> {
        if !is_sealed(buf) {
            return Err(EngineError::InvalidBuffer("nonce checksum mismatch"));
        }
        self.nonces = *buf;
        Ok(())
    }

    fn buffer_session(&self) -> &[u8; SESSION_BUF_SIZE] {
        &self.session
    }

    fn set_buffer_session(&mut self, buf: &[u8; SESSION_BUF_SIZE]) -> Result<(), EngineError> {
        if !is_sealed(buf) {
            return Err(EngineError::InvalidBuffer("session checksum mismatch"));
        }
        if buf[0] != SESSION_ACTIVE {
            return Err(EngineError::InvalidBuffer("no active session"));
        }
        self.session = *buf;
        Ok(())
    }

    fn begin_otaa(&mut self, keys: &OtaaKeys, force: bool) -> Result<(), EngineError> {
        if !force && self.session_active() {
            if self.session_dev_eui() == keys.dev_eui {
                self.joined = true;
                debug!("Resumed session for DevEUI {:016X}", keys.dev_eui);
                return Ok(());
            }
            warn!("Stored session belongs to another device, joining");
        }
        self.join(keys)
    }

    fn is_joined(&self) -> bool {
        self.joined
    }
}

/// NetID in the top 7 bits, the rest mixed from DevEUI and JoinNonce
fn assign_dev_addr(dev_eui: u64, join_nonce: u32) -> u32 {
    let folded = (dev_eui as u32) ^ ((dev_eui >> 32) as u32);
    let nwk_addr = folded.rotate_left(7) ^ join_nonce.wrapping_mul(0x9E37_79B9);
    ((SIM_NET_ID & 0x7F) << 25) | (nwk_addr & 0x01FF_FFFF)
}

fn checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16).rotate_left(1))
}

/// Write the trailing checksum
fn seal(buf: &mut [u8]) {
    let body = buf.len() - 2;
    let sum = checksum(&buf[..body]);
    buf[body..].copy_from_slice(&sum.to_le_bytes());
}

fn is_sealed(buf: &[u8]) -> bool {
    let body = buf.len() - 2;
    checksum(&buf[..body]).to_le_bytes() == buf[body..]
}
