//! Node provisioning data: band, sub-band, EUIs and root keys
//!
//! The in-memory record is refreshed from the durable store on every
//! [`CredentialStore::is_provisioned`] call. Field accessors are only
//! meaningful after that call returned `true`.

use std::fmt;

use tracing::{debug, info, warn};

use crate::band::{self, Band, MAX_BAND_NAME_LEN};
use crate::engine::OtaaKeys;
use crate::store::{DurableStore, Namespace, StoreError, NAMESPACE};

const BAND_KEY: &str = "band";
const SUB_BAND_KEY: &str = "subBand";
const JOIN_EUI_KEY: &str = "joinEUI";
const DEV_EUI_KEY: &str = "devEUI";
const APP_KEY_KEY: &str = "appKey";
const NWK_KEY_KEY: &str = "nwkKey";

/// Provisioning fields as last read from the durable store; any may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    pub band: String,
    pub sub_band: u8,
    pub join_eui: Option<u64>,
    pub dev_eui: Option<u64>,
    pub app_key: Option<[u8; 16]>,
    pub nwk_key: Option<[u8; 16]>,
}

/// A complete, validated provisioning set
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub band: &'static Band,
    pub sub_band: u8,
    pub join_eui: u64,
    pub dev_eui: u64,
    pub app_key: [u8; 16],
    pub nwk_key: [u8; 16],
}

impl Credentials {
    pub fn otaa_keys(&self) -> OtaaKeys {
        OtaaKeys {
            join_eui: self.join_eui,
            dev_eui: self.dev_eui,
            nwk_key: self.nwk_key,
            app_key: self.app_key,
        }
    }
}

// Keys stay out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("band", &self.band.name)
            .field("sub_band", &self.sub_band)
            .field("join_eui", &format_args!("{:016X}", self.join_eui))
            .field("dev_eui", &format_args!("{:016X}", self.dev_eui))
            .finish_non_exhaustive()
    }
}

impl CredentialRecord {
    /// The record as a complete credential set, if it is one
    pub fn complete(&self) -> Option<Credentials> {
        Some(Credentials {
            band: band::resolve(&self.band)?,
            sub_band: self.sub_band,
            join_eui: self.join_eui?,
            dev_eui: self.dev_eui?,
            app_key: self.app_key?,
            nwk_key: self.nwk_key?,
        })
    }
}

pub struct CredentialStore<'a, S: DurableStore> {
    store: &'a mut S,
    record: &'a mut CredentialRecord,
}

impl<'a, S: DurableStore> CredentialStore<'a, S> {
    pub fn new(store: &'a mut S, record: &'a mut CredentialRecord) -> Self {
        Self { store, record }
    }

    /// Reload the record from the durable store and report whether it is complete
    pub fn is_provisioned(&mut self) -> bool {
        *self.record = match self.read_record() {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to read provisioning data: {}", e);
                CredentialRecord::default()
            }
        };
        self.record.complete().is_some()
    }

    fn read_record(&mut self) -> Result<CredentialRecord, StoreError> {
        let ns = Namespace::open(&mut *self.store, NAMESPACE)?;
        debug!("Reading provisioning data from durable store");

        let band = ns
            .get_string(BAND_KEY)
            .filter(|b| b.len() <= MAX_BAND_NAME_LEN)
            .unwrap_or_default();
        if !band.is_empty() {
            debug!("     band: {}", band);
        }
        let sub_band = ns.get_u8(SUB_BAND_KEY).unwrap_or(0);
        if sub_band != 0 {
            debug!("  subband: {}", sub_band);
        }
        let join_eui = ns.get_u64(JOIN_EUI_KEY);
        if let Some(eui) = join_eui {
            debug!("  joinEUI: {:016X}", eui);
        }
        let dev_eui = ns.get_u64(DEV_EUI_KEY);
        if let Some(eui) = dev_eui {
            debug!("   devEUI: {:016X}", eui);
        }
        let app_key = ns.get_array::<16>(APP_KEY_KEY);
        if app_key.is_some() {
            debug!("   appKey: present");
        }
        let nwk_key = ns.get_array::<16>(NWK_KEY_KEY);
        if nwk_key.is_some() {
            debug!("   nwkKey: present");
        }

        Ok(CredentialRecord {
            band,
            sub_band,
            join_eui,
            dev_eui,
            app_key,
            nwk_key,
        })
    }

    /// Write a provisioning set to the durable store.
    ///
    /// An unknown band is rejected before anything is written. Otherwise the
    /// result is that of re-reading the store with [`Self::is_provisioned`].
    pub fn provision(
        &mut self,
        band: &str,
        sub_band: u8,
        join_eui: u64,
        dev_eui: u64,
        app_key: &[u8; 16],
        nwk_key: &[u8; 16],
    ) -> bool {
        if band::resolve(band).is_none() {
            warn!("Refusing to provision unknown band {:?}", band);
            return false;
        }

        let written = (|| -> Result<(), StoreError> {
            let mut ns = Namespace::open(&mut *self.store, NAMESPACE)?;
            ns.put_string(BAND_KEY, band)?;
            ns.put_u8(SUB_BAND_KEY, sub_band)?;
            ns.put_u64(JOIN_EUI_KEY, join_eui)?;
            ns.put_u64(DEV_EUI_KEY, dev_eui)?;
            ns.put_bytes(APP_KEY_KEY, app_key)?;
            ns.put_bytes(NWK_KEY_KEY, nwk_key)?;
            ns.close()
        })();
        if let Err(e) = written {
            warn!("Failed to write provisioning data: {}", e);
        }

        let ok = self.is_provisioned();
        if ok {
            info!("Provisioned for {} (devEUI {:016X})", band, dev_eui);
        }
        ok
    }

    /// Remove all provisioning and session data from the durable store
    pub fn wipe(&mut self) -> Result<(), StoreError> {
        info!("Wiping all LoRaWAN parameters from durable store");
        let mut ns = Namespace::open(&mut *self.store, NAMESPACE)?;
        ns.clear()?;
        ns.close()
    }

    /// The complete credential set; `None` unless [`Self::is_provisioned`] returned `true`
    pub fn credentials(&self) -> Option<Credentials> {
        self.record.complete()
    }

    pub fn band(&self) -> &str {
        &self.record.band
    }

    pub fn sub_band(&self) -> u8 {
        self.record.sub_band
    }

    pub fn join_eui(&self) -> u64 {
        self.record.join_eui.unwrap_or_default()
    }

    pub fn dev_eui(&self) -> u64 {
        self.record.dev_eui.unwrap_or_default()
    }

    pub fn app_key(&self) -> [u8; 16] {
        self.record.app_key.unwrap_or_default()
    }

    pub fn nwk_key(&self) -> [u8; 16] {
        self.record.nwk_key.unwrap_or_default()
    }
}
