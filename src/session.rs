//! Session save/restore across deep sleep and power loss
//!
//! Retained memory is authoritative whenever it survived, which the boot
//! counter proves: it is zero only after a reset or power loss. The durable
//! store only ever holds the nonces, i.e. what is needed to start a session.
//! Session state (frame counters) never goes to flash, because restoring a
//! stale copy would replay counters.

use tracing::{debug, info, warn};

use crate::engine::{ProtocolEngine, NONCES_BUF_SIZE};
use crate::retained::RetainedMemory;
use crate::store::{DurableStore, Namespace, NAMESPACE};

const NONCES_KEY: &str = "nonces";

pub struct SessionRecovery<'a, S: DurableStore, R: RetainedMemory> {
    store: &'a mut S,
    retained: &'a mut R,
}

impl<'a, S: DurableStore, R: RetainedMemory> SessionRecovery<'a, S, R> {
    pub fn new(store: &'a mut S, retained: &'a mut R) -> Self {
        Self { store, retained }
    }

    /// Restore what survived into `engine`.
    ///
    /// Returns `true` if a session was restored from retained memory, `false`
    /// on a cold boot, where at most the nonces are restored from flash.
    /// Must be called exactly once per boot: it advances the boot counter.
    pub fn load_session<E: ProtocolEngine>(&mut self, engine: &mut E) -> bool {
        let state = self.retained.state_mut();
        let boot_count = state.boot_count;
        state.boot_count = boot_count.saturating_add(1);

        if boot_count == 0 {
            debug!("Boot count was 0, cold boot");
            match self.read_durable_nonces() {
                Some(nonces) => match engine.set_buffer_nonces(&nonces) {
                    Ok(()) => {
                        self.retained.state_mut().nonces = nonces;
                        info!("Nonces restored from durable store");
                    }
                    Err(e) => warn!("Engine rejected stored nonces: {}", e),
                },
                None => info!("No nonces found in durable store"),
            }
            return false;
        }

        let state = self.retained.state();
        if let Err(e) = engine.set_buffer_nonces(&state.nonces) {
            warn!("Engine rejected retained nonces: {}", e);
        }
        if let Err(e) = engine.set_buffer_session(&state.session) {
            warn!("Engine rejected retained session: {}", e);
        }
        info!(
            "Nonces and session restored from retained memory (boot {})",
            boot_count.saturating_add(1)
        );
        true
    }

    /// Save `engine`'s nonces and session to retained memory, and the nonces
    /// to the durable store.
    ///
    /// Returns `false` if the durable store did not accept the full nonce
    /// buffer. The retained copy is written regardless.
    pub fn save_session<E: ProtocolEngine>(&mut self, engine: &E) -> bool {
        let state = self.retained.state_mut();
        state.nonces = *engine.buffer_nonces();
        state.session = *engine.buffer_session();
        debug!("Nonces and session saved to retained memory");

        let nonces = state.nonces;
        match self.write_durable_nonces(&nonces) {
            Ok(n) if n == NONCES_BUF_SIZE => {
                debug!("Nonces saved to durable store (written only if changed)");
                true
            }
            Ok(n) => {
                warn!(
                    "Durable store accepted {} of {} nonce bytes",
                    n, NONCES_BUF_SIZE
                );
                false
            }
            Err(e) => {
                warn!("Failed to save nonces to durable store: {}", e);
                false
            }
        }
    }

    fn read_durable_nonces(&mut self) -> Option<[u8; NONCES_BUF_SIZE]> {
        let ns = match Namespace::open(&mut *self.store, NAMESPACE) {
            Ok(ns) => ns,
            Err(e) => {
                warn!("Failed to open durable store: {}", e);
                return None;
            }
        };
        ns.get_array::<NONCES_BUF_SIZE>(NONCES_KEY)
    }

    fn write_durable_nonces(
        &mut self,
        nonces: &[u8; NONCES_BUF_SIZE],
    ) -> Result<usize, crate::store::StoreError> {
        let mut ns = Namespace::open(&mut *self.store, NAMESPACE)?;
        let written = ns.put_bytes(NONCES_KEY, nonces)?;
        ns.close()?;
        Ok(written)
    }
}
