//! Account management module.
//!
//! Provides account metadata storage, secret storage, and validation.

pub mod credentials;
mod model;
mod repository;
mod store;
mod validation;

pub use credentials::{
    CredentialError, CredentialResult, KeyringBackend, MemoryBackend, SecretBackend, SecretKind,
};
pub use model::{Account, AccountId, Vendor};
pub use repository::AccountRepository;
pub use store::CredentialStore;
pub use validation::{ValidationError, ValidationResult, validate_account};
