//! Canonical Certificate Encoding
//!
//! Serializes the semantic fields of a certificate into one deterministic
//! byte string. The field order is fixed and part of the fingerprint
//! contract; it never depends on how the caller built the structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::fingerprint::{keccak256, Fingerprint};

/// Semantic content of a certificate, in canonical field order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateContent {
    pub certificate_id: String,
    pub learner_email: String,
    pub learner_name: String,
    pub course_name: String,
    /// Completion date as an ISO-8601 date string.
    pub completion_date: String,
    pub issuer_org: String,
    /// Timestamp folded into the fingerprint. When `None`, the wall clock at
    /// call time is used and the fingerprint is NOT reproducible across
    /// calls. Callers that compare fingerprints later must set this.
    pub timestamp: Option<DateTime<Utc>>,
}

impl CertificateContent {
    /// Canonical string representation used as the hash pre-image.
    fn canonical_string(&self, timestamp: DateTime<Utc>) -> String {
        format!(
            "certificate_id:{}|learner_email:{}|learner_name:{}|course_name:{}|completion_date:{}|issuer_org:{}|timestamp:{}",
            self.certificate_id,
            self.learner_email,
            self.learner_name,
            self.course_name,
            self.completion_date,
            self.issuer_org,
            timestamp.to_rfc3339(),
        )
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.certificate_id.is_empty() {
            return Err(EngineError::Encoding {
                field: "certificate_id",
            });
        }
        if self.learner_email.is_empty() {
            return Err(EngineError::Encoding {
                field: "learner_email",
            });
        }
        if self.learner_name.is_empty() {
            return Err(EngineError::Encoding {
                field: "learner_name",
            });
        }
        if self.course_name.is_empty() {
            return Err(EngineError::Encoding {
                field: "course_name",
            });
        }
        if self.completion_date.is_empty() {
            return Err(EngineError::Encoding {
                field: "completion_date",
            });
        }
        if self.issuer_org.is_empty() {
            return Err(EngineError::Encoding { field: "issuer_org" });
        }
        Ok(())
    }
}

/// Compute the fingerprint of certificate content.
///
/// If `content.timestamp` is unset the current time is folded into the hash,
/// so two calls on the same content produce different fingerprints. Use
/// [`fingerprint_at`] whenever the result must be reproducible.
pub fn fingerprint(content: &CertificateContent) -> Result<Fingerprint, EngineError> {
    let timestamp = content.timestamp.unwrap_or_else(Utc::now);
    fingerprint_at(content, timestamp)
}

/// Compute the fingerprint with an explicit timestamp.
///
/// Same semantic input and timestamp always yield the same fingerprint.
pub fn fingerprint_at(
    content: &CertificateContent,
    timestamp: DateTime<Utc>,
) -> Result<Fingerprint, EngineError> {
    content.validate()?;
    let canonical = content.canonical_string(timestamp);
    Ok(keccak256(canonical.as_bytes()))
}
