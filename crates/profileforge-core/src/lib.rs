//! # profileforge-core
//!
//! Accounts, credential storage, authentication and submission for
//! `profileforge`.
//!
//! This crate provides:
//! - Account management (`SQLite` metadata)
//! - Secure credential storage (system keyring)
//! - Per-account authentication with probe-first connects
//! - Session resume from stored tokens
//! - Profile submission with create-then-update fallback
//! - Persistent settings

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod auth;
pub mod config;
mod error;
pub mod submission;

pub use account::credentials;
pub use account::{
    Account, AccountId, AccountRepository, CredentialStore, KeyringBackend, MemoryBackend,
    SecretBackend, SecretKind, Vendor,
};
pub use account::{
    CredentialError, CredentialResult, ValidationError, ValidationResult, validate_account,
};
pub use auth::{AuthEngine, ConnectionState, Session};
pub use config::{Settings, SettingsBuilder};
pub use error::{Error, Result};
pub use submission::{SubmitOutcome, Submitter};
