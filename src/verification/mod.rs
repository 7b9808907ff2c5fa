//! Verification
//!
//! The badge state machine that turns raw signals into a single trust
//! verdict, and the local ledger of verification attempts.

pub mod classifier;
pub mod store;

pub use classifier::{classify, Badge, VerdictSummary};
pub use store::{
    run_migrations, Certificate, CertificateRepository, CertificateStatus, CertificateStore,
    VerificationChannel, VerificationRecord, VerificationSink, VerificationStore,
    UNKNOWN_CERTIFICATE,
};
