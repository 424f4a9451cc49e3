//! Local Message Cache.
//!
//! Persisted mirror of remote messages keyed by `(account, uid, folder)`.
//! The synchronization orchestrator is its only writer.

mod model;
mod repository;

pub use model::{AttachmentMeta, CachedMessage, UpsertOutcome};
pub use repository::CacheRepository;
