use rand::Rng;
use serde::{Deserialize, Serialize};

/// Receipt for an issue/revoke/batch transaction.
///
/// On the degraded path the receipt is synthetic but structurally valid,
/// and `degraded` is set so downstream consumers can tell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxResult {
    pub transaction_id: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub confirmed: bool,
    pub degraded: bool,
}

impl TxResult {
    /// Structurally valid receipt for the degraded path: a synthetic
    /// transaction id and a plausible block number, clearly flagged.
    pub fn synthetic() -> Self {
        let mut rng = rand::thread_rng();
        let tx_bytes: [u8; 32] = rng.gen();

        TxResult {
            transaction_id: format!("0x{}", hex::encode(tx_bytes)),
            block_number: rng.gen_range(1_000_000..9_000_000),
            gas_used: 0,
            confirmed: true,
            degraded: true,
        }
    }
}

/// Externally observed state of a fingerprint on the ledger.
///
/// Never persisted directly; always wrapped in a verification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub exists: bool,
    pub issuer: Option<String>,
    pub issued_at: Option<u64>,
    pub revoked: bool,
    pub status: String,
    pub degraded: bool,
}

impl LedgerRecord {
    /// Optimistic default for mock mode: the product stays demoable with no
    /// live chain, so a disabled ledger reports certificates as present.
    pub fn mock_valid() -> Self {
        LedgerRecord {
            exists: true,
            issuer: None,
            issued_at: None,
            revoked: false,
            status: "mock".to_string(),
            degraded: true,
        }
    }

    /// Pessimistic default for a transport failure on the real path.
    pub fn unavailable() -> Self {
        LedgerRecord {
            exists: false,
            issuer: None,
            issued_at: None,
            revoked: false,
            status: "degraded: unavailable".to_string(),
            degraded: true,
        }
    }
}
