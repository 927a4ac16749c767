//! Keymint Core
//!
//! Domain types and error handling for Keymint licensing.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the codec and by the services that consume it.

pub mod error;
pub mod license;

pub use error::{Error, Result};
pub use license::{
    DEFAULT_FEATURE, LicenseKey, LicenseRecord, LicenseRecordBuilder, LicenseStatus, Tier,
};
