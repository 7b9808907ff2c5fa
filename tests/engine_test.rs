//! End-to-end engine flows over in-memory collaborators: issue, verify,
//! revoke, batch anchoring, and the audit trail they leave behind.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;
use tokio::sync::Mutex;

use certchain_engine::audit::{AuditAction, AuditRecorder};
use certchain_engine::engine::CertificateEngine;
use certchain_engine::error::EngineError;
use certchain_engine::fingerprint::{keccak256, CertificateContent, Fingerprint};
use certchain_engine::ledger::rpc::HttpLedgerClient;
use certchain_engine::ledger::LedgerAdapter;
use certchain_engine::verification::{
    Badge, Certificate, CertificateRepository, CertificateStatus, VerificationChannel,
    VerificationRecord, VerificationSink, UNKNOWN_CERTIFICATE,
};

type SharedCerts = Arc<Mutex<HashMap<String, Certificate>>>;

/// In-memory certificate repository.
#[derive(Clone)]
struct MemoryCerts {
    certs: SharedCerts,
}

impl CertificateRepository for MemoryCerts {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Certificate>, EngineError> {
        let certs = self.certs.lock().await;
        Ok(certs
            .values()
            .find(|c| c.fingerprint.as_ref() == Some(fingerprint))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Certificate>, EngineError> {
        Ok(self.certs.lock().await.get(id).cloned())
    }

    async fn save(&self, certificate: &Certificate) -> Result<(), EngineError> {
        self.certs
            .lock()
            .await
            .insert(certificate.id.clone(), certificate.clone());
        Ok(())
    }
}

/// In-memory verification sink sharing the certificate map so counter
/// updates are observable.
#[derive(Clone)]
struct MemorySink {
    certs: SharedCerts,
    records: Arc<Mutex<Vec<VerificationRecord>>>,
}

impl VerificationSink for MemorySink {
    async fn record_verification(&self, record: &VerificationRecord) -> Result<(), EngineError> {
        self.records.lock().await.push(record.clone());

        if record.certificate_id != UNKNOWN_CERTIFICATE {
            let mut certs = self.certs.lock().await;
            if let Some(cert) = certs.get_mut(&record.certificate_id) {
                cert.verification_count += 1;
                cert.last_verified_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

/// Sink whose persistence always fails, to show the error is fatal to the
/// verification request.
struct FailingSink;

impl VerificationSink for FailingSink {
    async fn record_verification(&self, _record: &VerificationRecord) -> Result<(), EngineError> {
        Err(EngineError::Persistence("disk full".to_string()))
    }
}

fn content(id: &str) -> CertificateContent {
    CertificateContent {
        certificate_id: id.to_string(),
        learner_email: "ada@example.com".to_string(),
        learner_name: "Ada Lovelace".to_string(),
        course_name: "Distributed Systems".to_string(),
        completion_date: "2025-06-01".to_string(),
        issuer_org: "CertChain Academy".to_string(),
        timestamp: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
    }
}

fn pending_certificate(id: &str) -> Certificate {
    Certificate {
        id: id.to_string(),
        status: CertificateStatus::Pending,
        is_legacy: false,
        is_on_chain: false,
        fingerprint: None,
        verification_count: 0,
        last_verified_at: None,
    }
}

struct Harness {
    engine: CertificateEngine<HttpLedgerClient, MemoryCerts, MemorySink>,
    certs: SharedCerts,
    records: Arc<Mutex<Vec<VerificationRecord>>>,
    audit: AuditRecorder,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certchain_engine=debug".into()),
        )
        .try_init();

    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let audit = AuditRecorder::new(audit_path.to_str().unwrap()).unwrap();

    let certs: SharedCerts = Arc::new(Mutex::new(HashMap::new()));
    let records = Arc::new(Mutex::new(Vec::new()));

    let engine = CertificateEngine::new(
        LedgerAdapter::mock(),
        MemoryCerts { certs: certs.clone() },
        MemorySink {
            certs: certs.clone(),
            records: records.clone(),
        },
        audit.clone(),
    );

    Harness {
        engine,
        certs,
        records,
        audit,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_issue_then_verify_goes_green() {
    let h = harness();
    h.certs
        .lock()
        .await
        .insert("CERT-1".to_string(), pending_certificate("CERT-1"));

    let (fingerprint, receipt) = h
        .engine
        .issue_certificate("CERT-1", &content("CERT-1"))
        .await
        .unwrap();
    assert!(receipt.degraded); // mock ledger
    assert!(receipt.confirmed);

    let outcome = h
        .engine
        .verify_by_fingerprint(&fingerprint, VerificationChannel::Qr, None)
        .await
        .unwrap();

    // Mock-mode ledger reports exists:true, the record is on-chain: green.
    assert_eq!(outcome.verdict.badge, Badge::Green);
    assert!(outcome.verdict.is_valid);
    assert!(outcome.ledger.degraded);
    assert_eq!(outcome.record.certificate_id, "CERT-1");

    let cert = h.certs.lock().await.get("CERT-1").cloned().unwrap();
    assert_eq!(cert.status, CertificateStatus::Issued);
    assert_eq!(cert.verification_count, 1);
    assert!(cert.last_verified_at.is_some());
}

#[tokio::test]
async fn test_verify_unknown_fingerprint_is_red_and_recorded() {
    let h = harness();

    let missing = keccak256(b"never issued");
    let outcome = h
        .engine
        .verify_by_fingerprint(&missing, VerificationChannel::Api, None)
        .await
        .unwrap();

    assert_eq!(outcome.verdict.badge, Badge::Red);
    assert!(!outcome.verdict.exists);
    assert_eq!(outcome.record.certificate_id, UNKNOWN_CERTIFICATE);

    let records = h.records.lock().await;
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_valid);
}

#[tokio::test]
async fn test_revoke_turns_verification_red() {
    let h = harness();
    h.certs
        .lock()
        .await
        .insert("CERT-2".to_string(), pending_certificate("CERT-2"));

    let (fingerprint, _) = h
        .engine
        .issue_certificate("CERT-2", &content("CERT-2"))
        .await
        .unwrap();

    let receipt = h.engine.revoke_certificate("CERT-2", "fraud").await.unwrap();
    assert!(receipt.degraded);

    let outcome = h
        .engine
        .verify_by_fingerprint(&fingerprint, VerificationChannel::Manual, None)
        .await
        .unwrap();
    assert_eq!(outcome.verdict.badge, Badge::Red);
    assert!(outcome.verdict.revoked);
    assert!(outcome.verdict.exists);
}

#[tokio::test]
async fn test_revoke_unknown_certificate_is_an_error() {
    let h = harness();
    assert!(h.engine.revoke_certificate("NOPE", "reason").await.is_err());
}

#[tokio::test]
async fn test_legacy_certificate_goes_amber() {
    let h = harness();
    let fingerprint = keccak256(b"legacy cert");

    let mut cert = pending_certificate("CERT-L");
    cert.status = CertificateStatus::Issued;
    cert.is_legacy = true;
    cert.fingerprint = Some(fingerprint);
    h.certs.lock().await.insert("CERT-L".to_string(), cert);

    let outcome = h
        .engine
        .verify_by_fingerprint(&fingerprint, VerificationChannel::Ledger, None)
        .await
        .unwrap();
    // is_on_chain is false, so mock-mode optimism cannot make it green.
    assert_eq!(outcome.verdict.badge, Badge::Amber);
    assert!(outcome.verdict.is_valid);
}

#[tokio::test]
async fn test_verification_count_accumulates() {
    let h = harness();
    h.certs
        .lock()
        .await
        .insert("CERT-3".to_string(), pending_certificate("CERT-3"));

    let (fingerprint, _) = h
        .engine
        .issue_certificate("CERT-3", &content("CERT-3"))
        .await
        .unwrap();

    for _ in 0..4 {
        h.engine
            .verify_by_fingerprint(&fingerprint, VerificationChannel::Api, None)
            .await
            .unwrap();
    }

    let cert = h.certs.lock().await.get("CERT-3").cloned().unwrap();
    assert_eq!(cert.verification_count, 4);
}

#[tokio::test]
async fn test_persistence_failure_is_fatal_to_verification() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let certs: SharedCerts = Arc::new(Mutex::new(HashMap::new()));

    let engine: CertificateEngine<HttpLedgerClient, _, _> = CertificateEngine::new(
        LedgerAdapter::mock(),
        MemoryCerts { certs },
        FailingSink,
        AuditRecorder::new(audit_path.to_str().unwrap()).unwrap(),
    );

    let result = engine
        .verify_by_fingerprint(&keccak256(b"x"), VerificationChannel::Api, None)
        .await;
    assert!(matches!(result, Err(EngineError::Persistence(_))));
}

#[tokio::test]
async fn test_batch_issue_audits_the_anchor() {
    let h = harness();

    let fingerprints: Vec<Fingerprint> =
        (0u8..5).map(|i| keccak256(&[i])).collect();
    let receipt = h.engine.batch_issue(&fingerprints).await;
    assert!(receipt.degraded);
    assert!(receipt.confirmed);

    let entries = h.audit.load_entries().await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.action == AuditAction::BatchIssued));
}

#[tokio::test]
async fn test_flows_leave_an_audit_trail() {
    let h = harness();
    h.certs
        .lock()
        .await
        .insert("CERT-4".to_string(), pending_certificate("CERT-4"));

    let (fingerprint, _) = h
        .engine
        .issue_certificate("CERT-4", &content("CERT-4"))
        .await
        .unwrap();
    h.engine
        .verify_by_fingerprint(&fingerprint, VerificationChannel::Qr, Some("inspector".to_string()))
        .await
        .unwrap();
    h.engine.revoke_certificate("CERT-4", "test").await.unwrap();

    let actions: Vec<AuditAction> = h
        .audit
        .load_entries()
        .await
        .unwrap()
        .iter()
        .map(|e| e.action)
        .collect();

    assert_eq!(
        actions,
        vec![
            AuditAction::CertificateIssued,
            AuditAction::CertificateVerified,
            AuditAction::CertificateRevoked,
        ]
    );
}
