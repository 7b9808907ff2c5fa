//! Verification Ledger
//!
//! Local, append-only persistence of verification attempts, plus the narrow
//! read/update view of the certificate repository this engine is allowed to
//! touch. Records are never updated or deleted once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::EngineError;
use crate::fingerprint::Fingerprint;
use crate::ledger::LedgerRecord;
use crate::verification::classifier::{Badge, VerdictSummary};

/// Sentinel certificate id recorded when no local match was found.
pub const UNKNOWN_CERTIFICATE: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Pending,
    Issued,
    Revoked,
    Expired,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Issued => "issued",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "pending" => Ok(Self::Pending),
            "issued" => Ok(Self::Issued),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            other => Err(EngineError::Database(format!(
                "Unknown certificate status: {}",
                other
            ))),
        }
    }
}

/// The engine's read-mostly view of a certificate. Owned by the surrounding
/// CRUD layer; only `verification_count` and `last_verified_at` are ever
/// mutated from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub status: CertificateStatus,
    pub is_legacy: bool,
    pub is_on_chain: bool,
    pub fingerprint: Option<Fingerprint>,
    pub verification_count: u64,
    pub last_verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationChannel {
    Qr,
    Ledger,
    Manual,
    Api,
}

impl VerificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Ledger => "ledger",
            Self::Manual => "manual",
            Self::Api => "api",
        }
    }
}

/// One verification attempt. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: Uuid,
    pub certificate_id: String,
    pub fingerprint: Fingerprint,
    pub channel: VerificationChannel,
    /// Verifier identity; anonymous verification is permitted.
    pub verifier: Option<String>,
    pub badge: Badge,
    pub is_valid: bool,
    /// Snapshot of the ledger state at verification time.
    pub result: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl VerificationRecord {
    /// Build a record from classifier output. Construction cannot fail on
    /// valid classifier output; persistence is the only error path.
    pub fn new(
        certificate_id: Option<&str>,
        fingerprint: Fingerprint,
        channel: VerificationChannel,
        verifier: Option<String>,
        verdict: &VerdictSummary,
        ledger: &LedgerRecord,
    ) -> Self {
        VerificationRecord {
            id: Uuid::new_v4(),
            certificate_id: certificate_id.unwrap_or(UNKNOWN_CERTIFICATE).to_string(),
            fingerprint,
            channel,
            verifier,
            badge: verdict.badge,
            is_valid: verdict.is_valid,
            result: serde_json::json!({
                "exists": ledger.exists,
                "issuer": ledger.issuer,
                "issued_at": ledger.issued_at,
                "revoked": ledger.revoked,
                "status": ledger.status,
                "degraded": ledger.degraded,
                "blockchain_status": verdict.blockchain_status,
            }),
            created_at: Utc::now(),
        }
    }
}

/// Narrow view of the certificate repository owned by the surrounding CRUD
/// layer: find and update, never delete.
pub trait CertificateRepository: Send + Sync {
    fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> impl std::future::Future<Output = Result<Option<Certificate>, EngineError>> + Send;

    fn find_by_id(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Certificate>, EngineError>> + Send;

    fn save(
        &self,
        certificate: &Certificate,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;
}

/// Durable append sink for verification records.
pub trait VerificationSink: Send + Sync {
    fn record_verification(
        &self,
        record: &VerificationRecord,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;
}

/// Postgres-backed certificate repository.
pub struct CertificateStore {
    pool: PgPool,
}

impl CertificateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CertificateRepository for CertificateStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Certificate>, EngineError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, is_legacy, is_on_chain, fingerprint,
                   verification_count, last_verified_at
            FROM certificates
            WHERE fingerprint = $1
            "#,
        )
        .bind(fingerprint.to_hex_prefixed())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_certificate).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Certificate>, EngineError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, is_legacy, is_on_chain, fingerprint,
                   verification_count, last_verified_at
            FROM certificates
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_certificate).transpose()
    }

    /// Persist the engine-owned fields of a certificate.
    async fn save(&self, certificate: &Certificate) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            UPDATE certificates
            SET status = $2, is_on_chain = $3, fingerprint = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(&certificate.id)
        .bind(certificate.status.as_str())
        .bind(certificate.is_on_chain)
        .bind(certificate.fingerprint.map(|f| f.to_hex_prefixed()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_certificate(row: sqlx::postgres::PgRow) -> Result<Certificate, EngineError> {
    let status: String = row.get("status");
    let fingerprint: Option<String> = row.get("fingerprint");
    let verification_count: i64 = row.get("verification_count");

    Ok(Certificate {
        id: row.get("id"),
        status: CertificateStatus::parse(&status)?,
        is_legacy: row.get("is_legacy"),
        is_on_chain: row.get("is_on_chain"),
        fingerprint: fingerprint
            .map(|f| Fingerprint::from_hex(&f))
            .transpose()?,
        verification_count: verification_count.max(0) as u64,
        last_verified_at: row.get("last_verified_at"),
    })
}

/// Append-only store for verification records.
pub struct VerificationStore {
    pool: PgPool,
}

impl VerificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl VerificationSink for VerificationStore {
    /// Persist a verification attempt and, for a found certificate, bump its
    /// counter. The increment is done in SQL so concurrent verifications
    /// cannot lose updates.
    async fn record_verification(
        &self,
        record: &VerificationRecord,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO verification_records
                (id, certificate_id, fingerprint, channel, verifier,
                 badge, is_valid, result, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(&record.certificate_id)
        .bind(record.fingerprint.to_hex_prefixed())
        .bind(record.channel.as_str())
        .bind(&record.verifier)
        .bind(record.badge.as_str())
        .bind(record.is_valid)
        .bind(&record.result)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.to_string()))?;

        if record.certificate_id != UNKNOWN_CERTIFICATE {
            sqlx::query(
                r#"
                UPDATE certificates
                SET verification_count = verification_count + 1,
                    last_verified_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(&record.certificate_id)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Persistence(e.to_string()))?;

            debug!("Bumped verification count for {}", record.certificate_id);
        }

        info!(
            "Recorded {:?} verification of {} via {}",
            record.badge,
            record.fingerprint,
            record.channel.as_str()
        );
        Ok(())
    }
}

/// Apply the engine's schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), EngineError> {
    sqlx::query(include_str!("../../migrations/001_initial_schema.sql"))
        .execute(pool)
        .await?;
    Ok(())
}
