//! # profileforge-auth
//!
//! Connectivity probing and bearer-token exchange for device-management
//! platform APIs.
//!
//! ## Features
//!
//! - **Probing**: Reachability checks across an ordered list of health paths,
//!   tolerant of modern and legacy API shapes
//! - **Exchange modes**: Client-credential (`client_id` + secret) and basic
//!   (username + password), both normalized to one [`Token`] shape
//! - **Endpoint fallback**: Candidate token endpoints are tried in order and
//!   the most specific failure is surfaced when all of them reject
//! - **Redaction**: Tokens and secrets never appear in `Debug` output
//!
//! ## Quick Start
//!
//! ```ignore
//! use profileforge_auth::{ApiSurface, ExchangeCredentials, Prober, TokenExchanger};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let surface = ApiSurface::jamf("https://acme.example.com")?;
//!
//!     // Reachability first: a 401 still proves the server is alive
//!     let report = Prober::new(Duration::from_secs(10))?.probe(&surface).await;
//!     report.into_result()?;
//!
//!     let credentials = ExchangeCredentials::client_credentials("x", "y");
//!     let exchanger = TokenExchanger::new(Duration::from_secs(30))?;
//!     let exchange = exchanger.exchange(&surface, &credentials).await?;
//!
//!     println!("Token expires at {}", exchange.token.expires_at);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod credentials;
pub mod endpoints;
mod error;
pub mod exchange;
pub mod http;
pub mod probe;
pub mod token;

pub use credentials::{ExchangeCredentials, ExchangeMode};
pub use endpoints::ApiSurface;
pub use error::{Error, NetworkFailure, Result};
pub use exchange::{Exchange, TokenExchanger};
pub use probe::{ProbeAttempt, ProbeReport, Prober, Reachability};
pub use token::{Token, TokenResponse};
