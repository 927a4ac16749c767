//! License types and structures.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Capability tag granted to licenses that carry no explicit feature set.
pub const DEFAULT_FEATURE: &str = "core";

/// Entitlement tier embedded in the signed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Trial,
    #[default]
    Standard,
    Enterprise,
}

impl Tier {
    pub fn is_trial(&self) -> bool {
        matches!(self, Tier::Trial)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Trial => write!(f, "trial"),
            Tier::Standard => write!(f, "standard"),
            Tier::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// License data as signed into a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Licensee: company name or deployment id.
    pub subject: String,
    /// Creation timestamp.
    pub issued_at: DateTime<Utc>,
    /// Expiry; absence or a past value means the license is not active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Entitlement tier.
    #[serde(default)]
    pub tier: Tier,
    /// Seat limit.
    #[serde(default = "default_max_users")]
    pub max_users: u32,
    /// Capability tags. Duplicates collapse; order is irrelevant.
    #[serde(default)]
    pub features: BTreeSet<String>,
}

fn default_max_users() -> u32 {
    1
}

impl LicenseRecord {
    /// Create a new builder for a license record.
    pub fn builder(subject: impl Into<String>) -> LicenseRecordBuilder {
        LicenseRecordBuilder::new(subject)
    }
}

/// Builder for license records.
pub struct LicenseRecordBuilder {
    subject: String,
    tier: Tier,
    max_users: u32,
    features: BTreeSet<String>,
    validity: Duration,
}

impl LicenseRecordBuilder {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            tier: Tier::Standard,
            max_users: 1,
            features: BTreeSet::new(),
            validity: Duration::days(365),
        }
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn max_users(mut self, max_users: u32) -> Self {
        self.max_users = max_users;
        self
    }

    pub fn feature(mut self, tag: impl Into<String>) -> Self {
        self.features.insert(tag.into());
        self
    }

    pub fn features(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.features.extend(tags);
        self
    }

    /// Validity period from issuance to expiry. Negative periods produce
    /// already-expired records, which is supported for testing.
    pub fn validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn validity_days(self, days: i64) -> Self {
        self.validity(Duration::days(days))
    }

    /// Stamp the record at `now`.
    pub fn build(self, now: DateTime<Utc>) -> LicenseRecord {
        let mut features = self.features;
        if features.is_empty() {
            features.insert(DEFAULT_FEATURE.to_string());
        }

        LicenseRecord {
            subject: self.subject,
            issued_at: now,
            expires_at: Some(now + self.validity),
            tier: self.tier,
            max_users: self.max_users,
            features,
        }
    }
}

/// The dash-grouped encoded key distributed to end users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseKey(String);

impl LicenseKey {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable prefix for logs and display, never the whole key.
    pub fn fingerprint(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of validating a license key.
///
/// `is_valid` depends only on the key and the signing secret; `is_active`
/// also depends on the validation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseStatus {
    /// Signature and format are correct.
    pub is_valid: bool,
    /// Valid and unexpired at the validation time.
    pub is_active: bool,
    /// Whole days until expiry, clamped at zero.
    pub days_remaining: i64,
    /// Human-readable disposition.
    pub message: String,
    pub subject: Option<String>,
    pub tier: Option<Tier>,
    pub is_trial: bool,
    pub max_users: u32,
    #[serde(default)]
    pub features: BTreeSet<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LicenseStatus {
    /// Status for a key that failed format or signature checks.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            is_active: false,
            days_remaining: 0,
            message: message.into(),
            subject: None,
            tier: None,
            is_trial: false,
            max_users: 0,
            features: BTreeSet::new(),
            expires_at: None,
        }
    }

    /// Whether the license is active and grants a capability tag.
    pub fn has_feature(&self, tag: &str) -> bool {
        self.is_active && self.features.contains(tag)
    }

    /// Whether `seats` concurrent users fit within the licensed limit.
    pub fn allows_seats(&self, seats: u32) -> bool {
        self.is_active && seats <= self.max_users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let now = Utc::now();
        let record = LicenseRecord::builder("Acme Corp")
            .tier(Tier::Enterprise)
            .max_users(25)
            .feature("sso")
            .feature("audit-log")
            .validity_days(90)
            .build(now);

        assert_eq!(record.subject, "Acme Corp");
        assert_eq!(record.tier, Tier::Enterprise);
        assert_eq!(record.max_users, 25);
        assert_eq!(record.expires_at, Some(now + Duration::days(90)));
        assert!(record.features.contains("sso"));
        assert!(record.features.contains("audit-log"));
    }

    #[test]
    fn test_builder_defaults() {
        let record = LicenseRecord::builder("Acme Corp").build(Utc::now());

        assert_eq!(record.tier, Tier::Standard);
        assert_eq!(record.max_users, 1);
        assert_eq!(
            record.features,
            BTreeSet::from([DEFAULT_FEATURE.to_string()])
        );
    }

    #[test]
    fn test_duplicate_features_collapse() {
        let record = LicenseRecord::builder("Acme Corp")
            .feature("sso")
            .feature("sso")
            .build(Utc::now());

        assert_eq!(record.features.len(), 1);
    }

    #[test]
    fn test_key_fingerprint() {
        let key = LicenseKey::new("eyJz-dWJq-ZWN0-Ijoi");
        assert_eq!(key.fingerprint(), "eyJz-dWJ");

        let short = LicenseKey::new("abc");
        assert_eq!(short.fingerprint(), "abc");
    }

    #[test]
    fn test_invalid_status_grants_nothing() {
        let status = LicenseStatus::invalid("invalid license signature");
        assert!(!status.has_feature(DEFAULT_FEATURE));
        assert!(!status.allows_seats(1));
    }
}
