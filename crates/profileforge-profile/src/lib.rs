//! # profileforge-profile
//!
//! Configuration profile model, composition, validation and encoding.
//!
//! ## Features
//!
//! - **Typed settings**: a closed [`SettingValue`] union instead of untyped maps
//! - **Composition**: [`ProfileComposer`] with idempotent unit adds, template
//!   replacement and one privacy authorization per service
//! - **Validation**: structural, unit-level and compliance passes
//! - **Encoding**: XML and binary property lists, both directions
//!
//! ## Quick Start
//!
//! ```ignore
//! use profileforge_profile::{
//!     ConfigUnit, Encoding, PrivacyAuthorization, PrivacyService, ProfileComposer, validate,
//! };
//!
//! let mut composer = ProfileComposer::new("Acme Baseline", "com.acme.baseline")
//!     .with_organization("Acme");
//! composer.add_unit(
//!     ConfigUnit::new("com.apple.wifi.managed", "Office Wi-Fi").with_setting("SSID_STR", "acme"),
//! );
//! composer.set_privacy_authorization(PrivacyAuthorization::new(
//!     PrivacyService::Camera,
//!     "us.zoom.xos",
//!     true,
//! ));
//!
//! let document = composer.build();
//! assert!(validate(&document).is_valid());
//! let bytes = document.to_bytes(Encoding::Binary)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod composer;
pub mod document;
mod error;
pub mod export;
pub mod privacy;
pub mod unit;
pub mod validator;
pub mod value;

pub use composer::{ProfileComposer, ProfileTemplate};
pub use document::{Document, DocumentUnit, Encoding, PrivacyUnit, Scope};
pub use error::{Error, Result};
pub use export::export_document;
pub use privacy::{
    AppleEventsReceiver, CaptureScope, IdentifierKind, PrivacyAuthorization, PrivacyService,
};
pub use unit::{ConfigUnit, PRIVACY_UNIT_TYPE, Platform, UnitCategory};
pub use validator::{ValidationIssue, ValidationPass, ValidationReport, validate};
pub use value::{SettingValue, ValueKind};
