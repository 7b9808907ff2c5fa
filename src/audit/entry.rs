//! Audit Entry Coercion
//!
//! Turns loosely-typed input from evolving call sites into a well-formed,
//! immutable audit entry. Coercion never rejects: unknown actions default to
//! a generic system error, unknown target types are dropped, and oversized
//! detail payloads are truncated to a bounded preview.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Serialized-size cap for free-form details.
pub const DETAILS_MAX_CHARS: usize = 10_000;

/// Characters kept when an oversized payload is truncated.
const TRUNCATED_PREVIEW_CHARS: usize = 500;

/// Known sensitive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CertificateIssued,
    CertificateVerified,
    CertificateRevoked,
    CertificateUpdated,
    BatchIssued,
    LedgerAnchored,
    UserLogin,
    UserCreated,
    RoleChanged,
    SystemError,
}

impl AuditAction {
    /// Map an action name, including legacy aliases from older call sites,
    /// to its canonical form.
    pub fn from_alias(name: &str) -> Option<Self> {
        match name {
            "certificate_issued" | "issue_certificate" | "certificateIssued" | "issue" => {
                Some(Self::CertificateIssued)
            }
            "certificate_verified" | "verify_certificate" | "certificateVerified" | "verify" => {
                Some(Self::CertificateVerified)
            }
            "certificate_revoked" | "revoke_certificate" | "certificateRevoked" | "revoke" => {
                Some(Self::CertificateRevoked)
            }
            "certificate_updated" | "update_certificate" | "certificateUpdated" => {
                Some(Self::CertificateUpdated)
            }
            "batch_issued" | "bulk_issue" | "batchIssued" => Some(Self::BatchIssued),
            "ledger_anchored" | "blockchain_anchor" | "anchor" => Some(Self::LedgerAnchored),
            "user_login" | "login" => Some(Self::UserLogin),
            "user_created" | "register" | "signup" => Some(Self::UserCreated),
            "role_changed" | "roleChanged" => Some(Self::RoleChanged),
            "system_error" | "error" => Some(Self::SystemError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failure,
    Pending,
    Warning,
}

impl AuditStatus {
    pub fn from_alias(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "success" | "ok" | "succeeded" => Some(Self::Success),
            "failure" | "failed" | "error" => Some(Self::Failure),
            "pending" | "in_progress" => Some(Self::Pending),
            "warning" | "warn" => Some(Self::Warning),
            _ => None,
        }
    }
}

/// Canonical target entity types. Legacy aliases map here; anything else is
/// dropped rather than rejected.
fn canonical_target_type(raw: &str) -> Option<&'static str> {
    match raw.to_ascii_lowercase().as_str() {
        "certificate" | "cert" | "certificates" => Some("certificate"),
        "user" | "account" | "users" => Some("user"),
        "batch" | "bulk" => Some("batch"),
        "verification" | "verifications" => Some("verification"),
        "system" => Some("system"),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditActor {
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTarget {
    pub target_type: String,
    pub target_id: Option<String>,
}

/// Free-form details, typed instead of an untyped blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AuditDetails {
    Json { value: Value },
    Text { text: String },
    Truncated { preview: String, original_len: usize },
}

/// Before/after snapshots for mutation actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditChanges {
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Loosely-typed ingestion surface. Everything is optional or stringly
/// typed; coercion produces the canonical entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditEntryInput {
    pub action: Option<String>,
    pub actor: Option<AuditActor>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub status: Option<String>,
    pub error_message: Option<String>,
    pub details: Option<Value>,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Immutable audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub actor: Option<AuditActor>,
    pub target: Option<AuditTarget>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub details: Option<AuditDetails>,
    pub changes: Option<AuditChanges>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Coerce raw input into a well-formed entry. This function cannot fail.
    ///
    /// Rules, in order: alias-map the action, defaulting to `system_error`;
    /// alias-map the target type, dropping the target on an unknown type;
    /// default a missing status to failure when an error message is present
    /// and success otherwise; truncate oversized details.
    pub fn coerce(input: AuditEntryInput) -> Self {
        let action = input
            .action
            .as_deref()
            .and_then(AuditAction::from_alias)
            .unwrap_or_else(|| {
                debug!(
                    "Unknown audit action {:?}, coercing to system_error",
                    input.action
                );
                AuditAction::SystemError
            });

        let target = match (input.target_type.as_deref(), input.target_id) {
            (Some(raw), id) => canonical_target_type(raw).map(|canonical| AuditTarget {
                target_type: canonical.to_string(),
                target_id: id.map(normalize_id),
            }),
            (None, Some(id)) => Some(AuditTarget {
                target_type: "system".to_string(),
                target_id: Some(normalize_id(id)),
            }),
            (None, None) => None,
        };

        let status = input
            .status
            .as_deref()
            .and_then(AuditStatus::from_alias)
            .unwrap_or(if input.error_message.is_some() {
                AuditStatus::Failure
            } else {
                AuditStatus::Success
            });

        let details = input.details.map(coerce_details);

        let changes = if input.before.is_some() || input.after.is_some() {
            Some(AuditChanges {
                before: input.before,
                after: input.after,
            })
        } else {
            None
        };

        AuditEntry {
            action,
            actor: input.actor.map(|mut actor| {
                actor.user_id = actor.user_id.map(normalize_id);
                actor
            }),
            target,
            status,
            error_message: input.error_message,
            details,
            changes,
            created_at: Utc::now(),
        }
    }
}

/// Normalize identifiers given as strings to the canonical id form.
fn normalize_id(raw: String) -> String {
    raw.trim().to_string()
}

fn coerce_details(value: Value) -> AuditDetails {
    let serialized = value.to_string();
    if serialized.chars().count() > DETAILS_MAX_CHARS {
        let preview: String = serialized.chars().take(TRUNCATED_PREVIEW_CHARS).collect();
        return AuditDetails::Truncated {
            preview,
            original_len: serialized.chars().count(),
        };
    }

    match value {
        Value::String(text) => AuditDetails::Text { text },
        other => AuditDetails::Json { value: other },
    }
}
