//! Fail-Open Audit Recorder
//!
//! Appends coerced audit entries to a JSONL sink. `record` never returns an
//! error and never blocks the caller's primary operation on failure; a
//! persistence problem is logged locally and yields `None`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::audit::entry::{AuditEntry, AuditEntryInput};

/// Append-only audit recorder over a JSONL file.
#[derive(Clone)]
pub struct AuditRecorder {
    log_path: String,
    file: Arc<Mutex<Option<File>>>,
}

impl AuditRecorder {
    /// Open (or create) the audit sink. This is the one place construction
    /// may fail; once built, recording is fail-open.
    pub fn new(log_path: &str) -> std::io::Result<Self> {
        if let Some(parent) = Path::new(log_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(log_path)?;

        Ok(Self {
            log_path: log_path.to_string(),
            file: Arc::new(Mutex::new(Some(file))),
        })
    }

    /// Recorder that drops every entry, for callers that run without an
    /// audit sink configured.
    pub fn disabled() -> Self {
        Self {
            log_path: String::new(),
            file: Arc::new(Mutex::new(None)),
        }
    }

    /// Coerce and persist an audit entry.
    ///
    /// Never returns an error: a validation problem is absorbed by coercion
    /// and a persistence problem is logged and reported as `None`. Losing an
    /// entry is preferable to aborting the user-facing action it describes.
    pub async fn record(&self, input: AuditEntryInput) -> Option<AuditEntry> {
        let entry = AuditEntry::coerce(input);

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize audit entry: {}", e);
                return None;
            }
        };

        let mut guard = self.file.lock().await;
        let Some(file) = guard.as_mut() else {
            debug!("Audit recording disabled, dropping entry");
            return None;
        };

        if let Err(e) = writeln!(file, "{}", json).and_then(|_| file.flush()) {
            error!("Failed to append audit entry to {}: {}", self.log_path, e);
            return None;
        }

        debug!("Recorded audit entry: {:?} {:?}", entry.action, entry.status);
        Some(entry)
    }

    /// Read the sink back, skipping lines that no longer parse. Used for
    /// inspection and tests.
    pub async fn load_entries(&self) -> std::io::Result<Vec<AuditEntry>> {
        let path = Path::new(&self.log_path);
        if self.log_path.is_empty() || !path.exists() {
            return Ok(vec![]);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => error!("Skipping unparseable audit line: {}", e),
            }
        }

        Ok(entries)
    }
}
