//! Synchronization Orchestrator.
//!
//! The orchestrator is the only component that writes the local cache. It
//! resolves account settings, decrypts credentials, builds a fresh protocol
//! client per operation and keeps remote state and cache in step.

mod factory;
mod orchestrator;
mod phase;

pub use factory::{ClientFactory, NetworkClients};
pub use orchestrator::{SendReport, SyncOrchestrator, SyncReport};
pub use phase::{SyncPhase, SyncRun};
