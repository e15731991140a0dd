//! Fast retained memory
//!
//! On the device this is RTC RAM: it survives deep sleep but is lost on
//! reset or power loss, after which it reads as zeros. [`RamRetained`] models
//! that in-process; [`RetainedFile`] keeps it in a file so separate runs of
//! the CLI behave like successive wake-ups.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{NONCES_BUF_SIZE, SESSION_BUF_SIZE};

/// Contents of the retained region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedState {
    pub nonces: [u8; NONCES_BUF_SIZE],
    pub session: [u8; SESSION_BUF_SIZE],
    pub boot_count: u32,
}

impl Default for RetainedState {
    fn default() -> Self {
        Self {
            nonces: [0; NONCES_BUF_SIZE],
            session: [0; SESSION_BUF_SIZE],
            boot_count: 0,
        }
    }
}

pub trait RetainedMemory {
    fn state(&self) -> &RetainedState;

    fn state_mut(&mut self) -> &mut RetainedState;
}

/// Retained memory held in process RAM
#[derive(Debug, Default)]
pub struct RamRetained {
    state: RetainedState,
}

impl RamRetained {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate reset or power loss: everything reads as zero afterwards
    pub fn power_loss(&mut self) {
        self.state = RetainedState::default();
    }
}

impl RetainedMemory for RamRetained {
    fn state(&self) -> &RetainedState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RetainedState {
        &mut self.state
    }
}

#[derive(Serialize, Deserialize)]
struct RetainedImage {
    boot_count: u32,
    nonces: String,
    session: String,
}

/// Retained memory backed by a file; a missing or unreadable file is a power loss
#[derive(Debug)]
pub struct RetainedFile {
    path: PathBuf,
    state: RetainedState,
}

impl RetainedFile {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match Self::read_image(&path) {
            Ok(state) => state,
            Err(e) => {
                debug!("No retained memory at {:?} ({:#}), starting cold", path, e);
                RetainedState::default()
            }
        };
        Self { path, state }
    }

    fn read_image(path: &Path) -> anyhow::Result<RetainedState> {
        let b64 = base64::engine::general_purpose::STANDARD;
        let content = fs::read_to_string(path)?;
        let image: RetainedImage = serde_json::from_str(&content)?;
        let nonces = b64.decode(&image.nonces)?;
        let session = b64.decode(&image.session)?;
        Ok(RetainedState {
            nonces: nonces
                .as_slice()
                .try_into()
                .context("nonce image has wrong size")?,
            session: session
                .as_slice()
                .try_into()
                .context("session image has wrong size")?,
            boot_count: image.boot_count,
        })
    }

    /// Write the region out, as entering deep sleep would preserve it
    pub fn persist(&self) -> anyhow::Result<()> {
        let b64 = base64::engine::general_purpose::STANDARD;
        let image = RetainedImage {
            boot_count: self.state.boot_count,
            nonces: b64.encode(self.state.nonces),
            session: b64.encode(self.state.session),
        };
        fs::write(&self.path, serde_json::to_vec(&image)?)
            .with_context(|| format!("failed to write retained memory {:?}", self.path))?;
        Ok(())
    }

    /// Drop the retained region, as a reset or power loss would
    pub fn power_loss(path: impl AsRef<Path>) -> anyhow::Result<()> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {:?}", path.as_ref())),
        }
    }
}

impl RetainedMemory for RetainedFile {
    fn state(&self) -> &RetainedState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RetainedState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_loss_zeroes_region() {
        let mut mem = RamRetained::new();
        mem.state_mut().boot_count = 3;
        mem.state_mut().nonces[0] = 0xAA;
        mem.power_loss();
        assert_eq!(mem.state(), &RetainedState::default());
    }

    #[test]
    fn test_retained_file_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtc.json");

        let mut mem = RetainedFile::load(&path);
        assert_eq!(mem.state().boot_count, 0);
        mem.state_mut().boot_count = 5;
        mem.state_mut().session[255] = 0x42;
        mem.persist().unwrap();

        let mem = RetainedFile::load(&path);
        assert_eq!(mem.state().boot_count, 5);
        assert_eq!(mem.state().session[255], 0x42);

        RetainedFile::power_loss(&path).unwrap();
        RetainedFile::power_loss(&path).unwrap();
        assert_eq!(RetainedFile::load(&path).state(), &RetainedState::default());
    }

    #[test]
    fn test_garbled_retained_file_reads_cold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtc.json");
        fs::write(&path, "{\"boot_count\":1,\"nonces\":\"AAAA\",\"session\":\"\"}").unwrap();
        assert_eq!(RetainedFile::load(&path).state(), &RetainedState::default());
    }
}
