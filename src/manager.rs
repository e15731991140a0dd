//! Boot-time orchestration: provisioning, session restore and join
//!
//! `manage` always hands back an engine. Whether it ended up joined is for
//! the caller to check with [`ProtocolEngine::is_joined`].

use tracing::{debug, info, warn};

use crate::context::PersistenceContext;
use crate::engine::ProtocolEngine;
use crate::provision::ProvisionError;
use crate::retained::RetainedMemory;
use crate::store::DurableStore;

impl<S: DurableStore, R: RetainedMemory> PersistenceContext<S, R> {
    /// Produce a provisioned, and unless `auto_join` is false, joined engine.
    ///
    /// Without stored credentials this runs the provisioning dialog first,
    /// which blocks until an operator answers on the console. The only
    /// errors come from that dialog (console closed or attempts exhausted).
    ///
    /// A session restored from retained memory is reused if the engine
    /// accepts it; otherwise a join is forced.
    pub fn manage<E: ProtocolEngine>(
        &mut self,
        phy: E::Phy,
        auto_join: bool,
    ) -> Result<E, ProvisionError> {
        let creds = loop {
            if self.is_provisioned() {
                if let Some(creds) = self.record().complete() {
                    break creds;
                }
            }

            info!("No or incomplete provisioning, asking on console");
            if self.provision_interactive()? {
                if auto_join {
                    self.announce("Now joining network.");
                }
            } else {
                warn!("Provisioning data was not stored, asking again");
            }
        };
        debug!("Using {:?}", creds);

        let mut engine = E::new(phy, creds.band, creds.sub_band);
        let restored = self.load_session(&mut engine);

        if !auto_join {
            return Ok(engine);
        }

        let keys = creds.otaa_keys();
        if restored {
            info!("Session data found, resuming");
            if let Err(e) = engine.begin_otaa(&keys, false) {
                debug!("Resume failed: {}", e);
            }
        }
        if !restored || !engine.is_joined() {
            info!("No session data or resume failed, join forced");
            if let Err(e) = engine.begin_otaa(&keys, true) {
                warn!("Join failed: {}", e);
            }
        }

        Ok(engine)
    }
}
