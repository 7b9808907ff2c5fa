//! Badge Classification
//!
//! Pure decision table combining the local certificate record with the
//! ledger state. No I/O and no mutation, so the full table is unit-testable
//! without a network.

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerRecord;
use crate::verification::store::{Certificate, CertificateStatus};

/// The single user-facing trust verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    /// Found locally and confirmed on the ledger.
    Green,
    /// Legacy certificate, valid but never anchored.
    Amber,
    /// Database record only, no chain confirmation.
    Blue,
    /// Not found or revoked.
    Red,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Blue => "blue",
            Self::Red => "red",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictSummary {
    pub badge: Badge,
    pub is_valid: bool,
    pub exists: bool,
    pub revoked: bool,
    pub blockchain_status: String,
}

/// Classify a verification attempt. First matching rule wins:
///
/// 1. no local record        -> red, not found
/// 2. record revoked         -> red (ledger state recorded, never overrides)
/// 3. on-chain and on ledger -> green
/// 4. legacy                 -> amber
/// 5. otherwise              -> blue, database record only
pub fn classify(record: Option<&Certificate>, ledger: &LedgerRecord) -> VerdictSummary {
    let Some(record) = record else {
        return VerdictSummary {
            badge: Badge::Red,
            is_valid: false,
            exists: false,
            revoked: false,
            blockchain_status: "Not found".to_string(),
        };
    };

    if record.status == CertificateStatus::Revoked {
        return VerdictSummary {
            badge: Badge::Red,
            is_valid: false,
            exists: true,
            revoked: true,
            blockchain_status: ledger.status.clone(),
        };
    }

    if record.is_on_chain && ledger.exists {
        return VerdictSummary {
            badge: Badge::Green,
            is_valid: true,
            exists: true,
            revoked: false,
            blockchain_status: ledger.status.clone(),
        };
    }

    if record.is_legacy {
        return VerdictSummary {
            badge: Badge::Amber,
            is_valid: true,
            exists: true,
            revoked: false,
            blockchain_status: "Legacy certificate (not on blockchain)".to_string(),
        };
    }

    VerdictSummary {
        badge: Badge::Blue,
        is_valid: true,
        exists: true,
        revoked: false,
        blockchain_status: "Database record found".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::keccak256;

    fn certificate(
        status: CertificateStatus,
        is_on_chain: bool,
        is_legacy: bool,
    ) -> Certificate {
        Certificate {
            id: "CERT-1".to_string(),
            status,
            is_legacy,
            is_on_chain,
            fingerprint: Some(keccak256(b"cert")),
            verification_count: 0,
            last_verified_at: None,
        }
    }

    fn ledger(exists: bool, revoked: bool) -> LedgerRecord {
        LedgerRecord {
            exists,
            issuer: None,
            issued_at: None,
            revoked,
            status: "Verified on blockchain".to_string(),
            degraded: false,
        }
    }

    #[test]
    fn test_no_record_is_red_not_found() {
        let verdict = classify(None, &ledger(true, false));
        assert_eq!(verdict.badge, Badge::Red);
        assert!(!verdict.is_valid);
        assert!(!verdict.exists);
        assert_eq!(verdict.blockchain_status, "Not found");
    }

    #[test]
    fn test_revoked_is_red_regardless_of_ledger() {
        for ledger_exists in [true, false] {
            for ledger_revoked in [true, false] {
                let cert = certificate(CertificateStatus::Revoked, true, false);
                let verdict = classify(Some(&cert), &ledger(ledger_exists, ledger_revoked));
                assert_eq!(verdict.badge, Badge::Red);
                assert!(!verdict.is_valid);
                assert!(verdict.exists);
                assert!(verdict.revoked);
            }
        }
    }

    #[test]
    fn test_on_chain_and_ledger_exists_is_green() {
        let cert = certificate(CertificateStatus::Issued, true, false);
        let verdict = classify(Some(&cert), &ledger(true, false));
        assert_eq!(verdict.badge, Badge::Green);
        assert!(verdict.is_valid);
        assert_eq!(verdict.blockchain_status, "Verified on blockchain");
    }

    #[test]
    fn test_on_chain_but_ledger_missing_falls_through() {
        // Not legacy: falls to blue, not green.
        let cert = certificate(CertificateStatus::Issued, true, false);
        let verdict = classify(Some(&cert), &ledger(false, false));
        assert_eq!(verdict.badge, Badge::Blue);

        // Legacy flag wins over the blue fallthrough.
        let cert = certificate(CertificateStatus::Issued, true, true);
        let verdict = classify(Some(&cert), &ledger(false, false));
        assert_eq!(verdict.badge, Badge::Amber);
    }

    #[test]
    fn test_legacy_is_amber() {
        let cert = certificate(CertificateStatus::Issued, false, true);
        let verdict = classify(Some(&cert), &ledger(false, false));
        assert_eq!(verdict.badge, Badge::Amber);
        assert!(verdict.is_valid);
        assert_eq!(
            verdict.blockchain_status,
            "Legacy certificate (not on blockchain)"
        );
    }

    #[test]
    fn test_plain_database_record_is_blue() {
        let cert = certificate(CertificateStatus::Issued, false, false);
        let verdict = classify(Some(&cert), &ledger(false, false));
        assert_eq!(verdict.badge, Badge::Blue);
        assert!(verdict.is_valid);
        assert_eq!(verdict.blockchain_status, "Database record found");
    }

    #[test]
    fn test_green_beats_legacy_flag() {
        // Rule 3 fires before rule 4.
        let cert = certificate(CertificateStatus::Issued, true, true);
        let verdict = classify(Some(&cert), &ledger(true, false));
        assert_eq!(verdict.badge, Badge::Green);
    }

    #[test]
    fn test_totality_over_full_signal_space() {
        // Every combination of the raw signals yields exactly one badge and
        // a coherent verdict.
        for record_found in [true, false] {
            for revoked in [true, false] {
                for on_chain in [true, false] {
                    for legacy in [true, false] {
                        for ledger_exists in [true, false] {
                            let cert = certificate(
                                if revoked {
                                    CertificateStatus::Revoked
                                } else {
                                    CertificateStatus::Issued
                                },
                                on_chain,
                                legacy,
                            );
                            let record = record_found.then_some(&cert);
                            let verdict = classify(record, &ledger(ledger_exists, false));

                            let expected = if !record_found {
                                Badge::Red
                            } else if revoked {
                                Badge::Red
                            } else if on_chain && ledger_exists {
                                Badge::Green
                            } else if legacy {
                                Badge::Amber
                            } else {
                                Badge::Blue
                            };
                            assert_eq!(verdict.badge, expected);
                            assert_eq!(verdict.exists, record_found);
                            assert_eq!(verdict.is_valid, verdict.badge != Badge::Red);
                        }
                    }
                }
            }
        }
    }
}
