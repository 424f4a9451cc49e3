//! Account settings and signatures.
//!
//! Settings hold both server endpoints with their passwords already
//! encrypted by the [`CredentialVault`](crate::CredentialVault).

mod model;
mod repository;

pub use model::{
    AccountContext, AccountId, AccountSettings, NewAccountSettings, ServerSettings, Signature,
};
pub use repository::SettingsRepository;
