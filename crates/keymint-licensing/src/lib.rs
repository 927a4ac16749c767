//! Offline license key issuance and validation for Keymint.
//!
//! One codec, two operations: [`LicenseCodec::issue`] turns a license
//! record into a tamper-evident, dash-grouped key, and
//! [`LicenseCodec::validate`] turns a key back into a status record
//! without touching a database or the network. Services that issue or
//! check keys depend on this crate rather than carrying their own copy
//! of the signing scheme.

pub mod codec;
pub mod secret;

pub use codec::LicenseCodec;
pub use keymint_core::{LicenseKey, LicenseRecord, LicenseStatus, Tier};
pub use secret::{SECRET_ENV_VAR, SigningSecret};
