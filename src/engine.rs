//! Certificate Engine
//!
//! Orchestrates the primary flows: fingerprint the content, anchor or query
//! it on the ledger, classify the verdict, persist the verification record,
//! and audit the action. Audit recording runs after the primary result is
//! computed and can never fail the operation.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::audit::{AuditEntryInput, AuditRecorder};
use crate::error::EngineError;
use crate::fingerprint::{fingerprint_at, CertificateContent, Fingerprint};
use crate::ledger::rpc::LedgerClient;
use crate::ledger::{LedgerAdapter, LedgerRecord, TxResult};
use crate::verification::classifier::{classify, VerdictSummary};
use crate::verification::store::{
    CertificateRepository, CertificateStatus, VerificationChannel, VerificationRecord,
    VerificationSink,
};

/// Outcome of a verification request: the verdict plus the immutable record
/// that was persisted for it.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub verdict: VerdictSummary,
    pub ledger: LedgerRecord,
    pub record: VerificationRecord,
}

/// The engine facade. All collaborators are injected at construction.
pub struct CertificateEngine<C, R, S>
where
    C: LedgerClient,
    R: CertificateRepository,
    S: VerificationSink,
{
    adapter: LedgerAdapter<C>,
    certificates: R,
    verifications: S,
    audit: AuditRecorder,
}

impl<C, R, S> CertificateEngine<C, R, S>
where
    C: LedgerClient,
    R: CertificateRepository,
    S: VerificationSink,
{
    pub fn new(
        adapter: LedgerAdapter<C>,
        certificates: R,
        verifications: S,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            adapter,
            certificates,
            verifications,
            audit,
        }
    }

    pub fn adapter(&self) -> &LedgerAdapter<C> {
        &self.adapter
    }

    /// Fingerprint certificate content and anchor it on the ledger. The
    /// certificate record is updated with the fingerprint and marked
    /// on-chain; a degraded receipt still counts as issued so the product
    /// keeps working without a live ledger.
    pub async fn issue_certificate(
        &self,
        certificate_id: &str,
        content: &CertificateContent,
    ) -> Result<(Fingerprint, TxResult), EngineError> {
        let timestamp = content.timestamp.unwrap_or_else(Utc::now);
        let fingerprint = fingerprint_at(content, timestamp)?;

        let receipt = self.adapter.issue(&fingerprint).await;

        if let Some(mut certificate) = self.certificates.find_by_id(certificate_id).await? {
            certificate.status = CertificateStatus::Issued;
            certificate.is_on_chain = true;
            certificate.fingerprint = Some(fingerprint);
            self.certificates.save(&certificate).await?;
        }

        info!(
            "Issued certificate {} with fingerprint {} (degraded: {})",
            certificate_id, fingerprint, receipt.degraded
        );

        let audit_status = if receipt.confirmed { "success" } else { "warning" };
        self.audit
            .record(AuditEntryInput {
                action: Some("certificate_issued".to_string()),
                target_type: Some("certificate".to_string()),
                target_id: Some(certificate_id.to_string()),
                status: Some(audit_status.to_string()),
                details: Some(json!({
                    "fingerprint": fingerprint.to_hex_prefixed(),
                    "transaction_id": receipt.transaction_id,
                    "degraded": receipt.degraded,
                })),
                ..Default::default()
            })
            .await;

        Ok((fingerprint, receipt))
    }

    /// Anchor a batch of fingerprints as a single Merkle-root transaction.
    pub async fn batch_issue(&self, fingerprints: &[Fingerprint]) -> TxResult {
        let receipt = self.adapter.issue_batch(fingerprints).await;

        self.audit
            .record(AuditEntryInput {
                action: Some("batch_issued".to_string()),
                target_type: Some("batch".to_string()),
                details: Some(json!({
                    "count": fingerprints.len(),
                    "transaction_id": receipt.transaction_id,
                    "degraded": receipt.degraded,
                })),
                ..Default::default()
            })
            .await;

        receipt
    }

    /// Verify a fingerprint: look up the local record, query the ledger,
    /// classify, and persist the attempt. Persistence failure is the only
    /// error path; the attempt itself is never silently dropped.
    pub async fn verify_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        channel: VerificationChannel,
        verifier: Option<String>,
    ) -> Result<VerificationOutcome, EngineError> {
        let certificate = self.certificates.find_by_fingerprint(fingerprint).await?;
        let ledger = self.adapter.verify(fingerprint).await;
        let verdict = classify(certificate.as_ref(), &ledger);

        let record = VerificationRecord::new(
            certificate.as_ref().map(|c| c.id.as_str()),
            *fingerprint,
            channel,
            verifier.clone(),
            &verdict,
            &ledger,
        );
        self.verifications.record_verification(&record).await?;

        self.audit
            .record(AuditEntryInput {
                action: Some("certificate_verified".to_string()),
                target_type: Some("certificate".to_string()),
                target_id: Some(record.certificate_id.clone()),
                actor: verifier.map(|v| crate::audit::AuditActor {
                    user_id: Some(v),
                    role: None,
                    ip_address: None,
                    user_agent: None,
                }),
                details: Some(json!({
                    "badge": verdict.badge.as_str(),
                    "channel": channel.as_str(),
                    "degraded": ledger.degraded,
                })),
                ..Default::default()
            })
            .await;

        Ok(VerificationOutcome {
            verdict,
            ledger,
            record,
        })
    }

    /// Revoke a certificate locally and on the ledger. The local status
    /// change is authoritative; the ledger receipt may be degraded.
    pub async fn revoke_certificate(
        &self,
        certificate_id: &str,
        reason: &str,
    ) -> Result<TxResult, EngineError> {
        let Some(mut certificate) = self.certificates.find_by_id(certificate_id).await? else {
            return Err(EngineError::Database(format!(
                "Certificate {} not found",
                certificate_id
            )));
        };

        let receipt = match certificate.fingerprint {
            Some(fingerprint) => self.adapter.revoke(&fingerprint, reason).await,
            // Never anchored, so there is nothing to revoke on chain. The
            // local status change below is still authoritative.
            None => TxResult::synthetic(),
        };

        let before = json!({ "status": certificate.status.as_str() });
        certificate.status = CertificateStatus::Revoked;
        self.certificates.save(&certificate).await?;

        info!("Revoked certificate {}: {}", certificate_id, reason);

        self.audit
            .record(AuditEntryInput {
                action: Some("certificate_revoked".to_string()),
                target_type: Some("certificate".to_string()),
                target_id: Some(certificate_id.to_string()),
                details: Some(json!({ "reason": reason })),
                before: Some(before),
                after: Some(json!({ "status": "revoked" })),
                ..Default::default()
            })
            .await;

        Ok(receipt)
    }
}
