//! Audit Recording
//!
//! Fail-open, schema-tolerant, append-only logging of sensitive actions.
//! Recording an audit entry must never abort the action it describes:
//! malformed input is coerced into a well-formed entry and persistence
//! failures are logged and swallowed.

pub mod entry;
pub mod recorder;

pub use entry::{
    AuditAction, AuditActor, AuditDetails, AuditEntry, AuditEntryInput, AuditStatus, AuditTarget,
};
pub use recorder::AuditRecorder;
