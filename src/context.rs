//! Process-lifetime persistence state
//!
//! Owns the durable store, the retained memory region, the credential
//! record and the provisioning console. Create one per process and hand it
//! the storage backends for the target; tests use [`MemoryStore`] and
//! [`RamRetained`], the CLI the file-backed variants.
//!
//! [`MemoryStore`]: crate::store::MemoryStore
//! [`RamRetained`]: crate::retained::RamRetained

use tracing::info;

use crate::credentials::{CredentialRecord, CredentialStore};
use crate::engine::ProtocolEngine;
use crate::provision::{AttemptPolicy, Console, ProvisionError};
use crate::retained::RetainedMemory;
use crate::session::SessionRecovery;
use crate::store::{DurableStore, StoreError};

#[derive(Debug)]
pub struct PersistenceContext<S: DurableStore, R: RetainedMemory> {
    store: S,
    retained: R,
    record: CredentialRecord,
    console: Console,
    policy: AttemptPolicy,
}

impl<S: DurableStore, R: RetainedMemory> PersistenceContext<S, R> {
    /// New context provisioning over stdin/stdout
    pub fn new(store: S, retained: R) -> Self {
        Self {
            store,
            retained,
            record: CredentialRecord::default(),
            console: Console::stdio(),
            policy: AttemptPolicy::Forever,
        }
    }

    /// Run the provisioning dialog on a different console
    pub fn set_console(&mut self, console: Console) {
        self.console = console;
    }

    pub fn set_attempt_policy(&mut self, policy: AttemptPolicy) {
        self.policy = policy;
    }

    pub fn credentials(&mut self) -> CredentialStore<'_, S> {
        CredentialStore::new(&mut self.store, &mut self.record)
    }

    pub fn session(&mut self) -> SessionRecovery<'_, S, R> {
        SessionRecovery::new(&mut self.store, &mut self.retained)
    }

    /// Credential record as of the last [`Self::is_provisioned`] call
    pub fn record(&self) -> &CredentialRecord {
        &self.record
    }

    pub fn is_provisioned(&mut self) -> bool {
        self.credentials().is_provisioned()
    }

    pub fn provision(
        &mut self,
        band: &str,
        sub_band: u8,
        join_eui: u64,
        dev_eui: u64,
        app_key: &[u8; 16],
        nwk_key: &[u8; 16],
    ) -> bool {
        self.credentials()
            .provision(band, sub_band, join_eui, dev_eui, app_key, nwk_key)
    }

    /// Ask for provisioning data on the console and store it
    pub fn provision_interactive(&mut self) -> Result<bool, ProvisionError> {
        let mut creds = CredentialStore::new(&mut self.store, &mut self.record);
        self.console.dialog(self.policy).run(&mut creds)
    }

    pub fn wipe(&mut self) -> Result<(), StoreError> {
        self.credentials().wipe()
    }

    pub fn load_session<E: ProtocolEngine>(&mut self, engine: &mut E) -> bool {
        self.session().load_session(engine)
    }

    pub fn save_session<E: ProtocolEngine>(&mut self, engine: &E) -> bool {
        self.session().save_session(engine)
    }

    pub(crate) fn announce(&mut self, msg: &str) {
        if let Err(e) = self.console.println(msg) {
            info!("Console unavailable ({}): {}", e, msg);
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn retained(&self) -> &R {
        &self.retained
    }

    pub fn retained_mut(&mut self) -> &mut R {
        &mut self.retained
    }

    pub fn into_parts(self) -> (S, R) {
        (self.store, self.retained)
    }
}
