//! Signing secret provisioning.

use keymint_core::{Error, Result};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Environment variable consulted by [`SigningSecret::from_env`].
pub const SECRET_ENV_VAR: &str = "KEYMINT_SIGNING_SECRET";

/// Shared signing secret, injected into the codec at construction.
///
/// Loaded once per process and treated as immutable for the process
/// lifetime. Rotating the secret invalidates every previously issued key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::Config("signing secret must not be empty".into()));
        }
        Ok(Self(secret))
    }

    /// Load the secret from `KEYMINT_SIGNING_SECRET`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(SECRET_ENV_VAR) {
            Ok(value) => Self::new(value),
            Err(_) => Err(Error::Config(format!("{SECRET_ENV_VAR} is not set"))),
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// Secret material stays out of logs and panic output.
impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(****)")
    }
}
