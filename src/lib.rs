//! Credential provisioning and session persistence for a LoRaWAN end-device
//!
//! Session state is split over two tiers: retained memory, which survives
//! deep sleep but not power loss, and a durable key-value store, which
//! survives everything but should not be written often. On every boot
//! [`PersistenceContext::manage`] decides whether the retained session can be
//! resumed or a fresh join is needed, provisioning the device over a console
//! first if it has no credentials.

pub mod band;
pub mod config;
pub mod context;
pub mod credentials;
pub mod engine;
pub mod hex_codec;
mod manager;
pub mod provision;
pub mod retained;
pub mod session;
#[cfg(feature = "sim")]
pub mod sim;
pub mod store;

#[cfg(test)]
mod test_support;

pub use context::PersistenceContext;
pub use credentials::{CredentialStore, Credentials};
pub use engine::{OtaaKeys, ProtocolEngine};
pub use provision::{AttemptPolicy, Console, ProvisioningDialog};
pub use retained::{RamRetained, RetainedFile, RetainedMemory};
pub use session::SessionRecovery;
pub use store::{DurableStore, FileStore, MemoryStore};
