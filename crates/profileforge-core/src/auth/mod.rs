//! Authentication: per-account connection state and sessions.
//!
//! [`AuthEngine`] drives probe, exchange and persistence for an account and
//! resumes sessions from stored tokens.

mod engine;
mod session;

pub use engine::AuthEngine;
pub use session::{ConnectionState, Session};
