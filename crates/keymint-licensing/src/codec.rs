//! License key codec: canonical signing, encoding, and offline validation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chrono::{DateTime, Utc};
use keymint_core::{DEFAULT_FEATURE, Error, LicenseKey, LicenseRecord, LicenseStatus, Result, Tier};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::secret::SigningSecret;

/// Payload field carrying the signature; excluded from the signed content.
const SIGNATURE_FIELD: &str = "signature";

/// Hex characters of the SHA-256 digest kept as the signature. Truncation
/// is part of the key format; it trades collision resistance for key size.
const SIGNATURE_LEN: usize = 16;

/// Size of the dash-joined groups in the external key form.
const GROUP_LEN: usize = 4;

/// Signs license records into keys and verifies keys back into statuses.
///
/// Stateless apart from the signing secret; safe to share across threads
/// and call concurrently.
pub struct LicenseCodec {
    secret: SigningSecret,
}

impl LicenseCodec {
    pub fn new(secret: SigningSecret) -> Self {
        Self { secret }
    }

    /// Sign a record and encode it into a distributable key.
    ///
    /// Pure function of the record and the configured secret. The one
    /// precondition is a non-empty subject; issuance is operator-driven,
    /// so that failure is reported eagerly instead of folded into a status.
    pub fn issue(&self, record: &LicenseRecord) -> Result<LicenseKey> {
        if record.subject.trim().is_empty() {
            return Err(Error::EmptySubject);
        }

        let mut payload = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            other => {
                return Err(Error::Serialization(format!(
                    "license record serialized to {other:?}, expected an object"
                )));
            }
        };

        let signature = self.sign(&payload);
        payload.insert(SIGNATURE_FIELD.to_string(), Value::String(signature));

        let json = serde_json::to_string(&payload)?;
        let encoded = STANDARD_NO_PAD.encode(json.as_bytes());

        debug!(subject = %record.subject, tier = %record.tier, "issued license key");
        Ok(LicenseKey::new(group(&encoded)))
    }

    /// Validate a key against the configured secret at the current time.
    pub fn validate(&self, key: &str) -> LicenseStatus {
        self.validate_at(key, Utc::now())
    }

    /// Validate a key at an explicit point in time.
    ///
    /// Never fails: malformed input, tampered payloads, and expired
    /// licenses all come back as a [`LicenseStatus`] with a message.
    pub fn validate_at(&self, key: &str, now: DateTime<Utc>) -> LicenseStatus {
        match self.decode_and_verify(key) {
            Ok(payload) => status_from_payload(payload, now),
            Err(err) => {
                let prefix: String = key.chars().take(8).collect();
                warn!(key_prefix = %prefix, error = %err, "license validation failed");
                LicenseStatus::invalid(err.to_string())
            }
        }
    }

    /// Decode the key and check its signature, returning the payload with
    /// the signature field removed.
    fn decode_and_verify(&self, key: &str) -> Result<Map<String, Value>> {
        // Dashes and padding are cosmetic; legacy keys grouped only a
        // prefix of the encoding, so every dash position must be accepted.
        let normalized: String = key
            .chars()
            .filter(|c| !matches!(c, '-' | '=') && !c.is_whitespace())
            .collect();
        if normalized.is_empty() {
            return Err(Error::MalformedKey("empty key".into()));
        }

        let decoded = STANDARD_NO_PAD
            .decode(normalized.as_bytes())
            .map_err(|e| Error::MalformedKey(e.to_string()))?;

        let mut payload: Map<String, Value> = serde_json::from_slice(&decoded)
            .map_err(|e| Error::MalformedKey(e.to_string()))?;

        let presented = match payload.remove(SIGNATURE_FIELD) {
            Some(Value::String(signature)) => signature,
            _ => return Err(Error::MalformedKey("missing signature field".into())),
        };

        let expected = self.sign(&payload);
        if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
            Ok(payload)
        } else {
            Err(Error::SignatureMismatch)
        }
    }

    /// Truncated hex SHA-256 over the canonical payload and the secret.
    ///
    /// `serde_json` maps are key-sorted, so the serialization is canonical
    /// regardless of the field order the payload arrived with.
    fn sign(&self, payload: &Map<String, Value>) -> String {
        let canonical = Value::Object(payload.clone()).to_string();

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hasher.update(self.secret.as_bytes());
        let digest = hex::encode(hasher.finalize());

        digest[..SIGNATURE_LEN].to_string()
    }
}

/// Verified payload fields, tolerant of legacy keys that carry `is_trial`
/// instead of `tier`.
#[derive(Deserialize)]
struct WirePayload {
    subject: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tier: Option<Tier>,
    #[serde(default)]
    is_trial: Option<bool>,
    #[serde(default)]
    max_users: Option<u32>,
    #[serde(default)]
    features: Option<BTreeSet<String>>,
}

fn status_from_payload(payload: Map<String, Value>, now: DateTime<Utc>) -> LicenseStatus {
    let wire: WirePayload = match serde_json::from_value(Value::Object(payload)) {
        Ok(wire) => wire,
        Err(e) => return LicenseStatus::invalid(Error::MalformedKey(e.to_string()).to_string()),
    };

    let tier = wire.tier.unwrap_or(if wire.is_trial == Some(true) {
        Tier::Trial
    } else {
        Tier::Standard
    });

    let features = match wire.features {
        Some(features) if !features.is_empty() => features,
        _ => BTreeSet::from([DEFAULT_FEATURE.to_string()]),
    };

    let (is_active, days_remaining, message) = match wire.expires_at {
        Some(expires_at) => {
            let days = (expires_at - now).num_days();
            if days > 0 {
                (true, days, format!("license active, {days} days remaining"))
            } else if days == 0 {
                (false, 0, "license expires today".to_string())
            } else {
                (false, 0, format!("license expired {} days ago", -days))
            }
        }
        None => (false, 0, "license has no expiry date".to_string()),
    };

    debug!(subject = %wire.subject, active = is_active, "license validated");

    LicenseStatus {
        is_valid: true,
        is_active,
        days_remaining,
        message,
        subject: Some(wire.subject),
        tier: Some(tier),
        is_trial: tier.is_trial(),
        max_users: wire.max_users.unwrap_or(1),
        features,
        expires_at: wire.expires_at,
    }
}

/// Join the encoding into dash-separated chunks.
fn group(encoded: &str) -> String {
    let mut grouped = String::with_capacity(encoded.len() + encoded.len() / GROUP_LEN);
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % GROUP_LEN == 0 {
            grouped.push('-');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn codec() -> LicenseCodec {
        LicenseCodec::new(SigningSecret::new("test-signing-secret").unwrap())
    }

    #[test]
    fn test_issue_and_validate_roundtrip() {
        let codec = codec();
        let now = Utc::now();
        let record = LicenseRecord::builder("Acme Corp")
            .tier(Tier::Enterprise)
            .max_users(25)
            .feature("sso")
            .validity_days(365)
            .build(now);

        let key = codec.issue(&record).unwrap();
        let status = codec.validate_at(key.as_str(), now);

        assert!(status.is_valid, "{}", status.message);
        assert!(status.is_active);
        assert_eq!(status.subject.as_deref(), Some("Acme Corp"));
        assert_eq!(status.tier, Some(Tier::Enterprise));
        assert_eq!(status.max_users, 25);
        assert!(status.features.contains("sso"));
    }

    #[test]
    fn test_empty_subject_rejected() {
        let codec = codec();
        let record = LicenseRecord::builder("   ").build(Utc::now());

        assert!(matches!(codec.issue(&record), Err(Error::EmptySubject)));
    }

    #[test]
    fn test_keys_are_grouped() {
        let codec = codec();
        let record = LicenseRecord::builder("Acme Corp").build(Utc::now());
        let key = codec.issue(&record).unwrap();

        for (i, chunk) in key.as_str().split('-').enumerate() {
            assert!(chunk.len() <= GROUP_LEN, "chunk {i} too long: {chunk}");
        }
    }

    #[test]
    fn test_wrong_secret_fails_signature() {
        let issuer = codec();
        let verifier = LicenseCodec::new(SigningSecret::new("some-other-secret").unwrap());

        let record = LicenseRecord::builder("Acme Corp").build(Utc::now());
        let key = issuer.issue(&record).unwrap();
        let status = verifier.validate_at(key.as_str(), Utc::now());

        assert!(!status.is_valid);
        assert!(status.message.contains("signature"));
    }

    #[test]
    fn test_legacy_prefix_grouping_still_decodes() {
        let codec = codec();
        let now = Utc::now();
        let record = LicenseRecord::builder("Acme Corp")
            .validity_days(30)
            .build(now);
        let key = codec.issue(&record).unwrap();

        // Older issuers dash-grouped only the first 16 encoded characters
        // and appended the rest raw.
        let raw: String = key.as_str().chars().filter(|c| *c != '-').collect();
        let (head, tail) = raw.split_at(16);
        let legacy = format!("{}{}", group(head), tail);

        let status = codec.validate_at(&legacy, now);
        assert!(status.is_valid, "{}", status.message);
        assert!(status.is_active);
    }

    #[test]
    fn test_missing_expiry_is_valid_but_inactive() {
        let codec = codec();
        let now = Utc::now();
        let record = LicenseRecord {
            subject: "Acme Corp".to_string(),
            issued_at: now,
            expires_at: None,
            tier: Tier::Standard,
            max_users: 1,
            features: BTreeSet::new(),
        };

        let key = codec.issue(&record).unwrap();
        let status = codec.validate_at(key.as_str(), now);

        assert!(status.is_valid);
        assert!(!status.is_active);
        assert_eq!(status.days_remaining, 0);
        assert!(status.message.contains("no expiry"));
    }

    #[test]
    fn test_expiring_today_is_inactive() {
        let codec = codec();
        let now = Utc::now();
        let record = LicenseRecord::builder("Acme Corp")
            .validity(Duration::hours(12))
            .build(now);

        let key = codec.issue(&record).unwrap();
        let status = codec.validate_at(key.as_str(), now);

        assert!(status.is_valid);
        assert!(!status.is_active);
        assert_eq!(status.days_remaining, 0);
        assert!(status.message.contains("today"));
    }
}
