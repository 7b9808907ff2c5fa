//! Ledger Adapter
//!
//! Single-attempt issue/verify/revoke operations against the registry
//! contract. Transport failures never reach the caller: write operations
//! fall back to a synthetic, clearly-flagged receipt and reads fall back to
//! the documented degraded defaults. Retry policy belongs to the caller.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::fingerprint::{merkle_root, Fingerprint};
use crate::ledger::rpc::{
    decode_verify_return, encode_issue, encode_issue_batch, encode_revoke, encode_verify,
    HttpLedgerClient, LedgerClient, TransactionRequest,
};
use crate::ledger::types::{LedgerRecord, TxResult};

/// Adapter over the default HTTP transport.
pub type HttpLedgerAdapter = LedgerAdapter<HttpLedgerClient>;

/// Ledger adapter with explicit construction-time configuration.
///
/// In mock mode no client exists at all and every operation takes the
/// degraded path.
pub struct LedgerAdapter<C: LedgerClient> {
    client: Option<C>,
    contract_address: String,
    gas_margin_percent: u64,
}

impl HttpLedgerAdapter {
    /// Build an adapter from configuration. A mock-mode config yields an
    /// adapter with no transport; a client construction failure (bad key,
    /// bad address) also degrades to mock rather than failing startup.
    pub fn from_config(config: &LedgerConfig) -> Self {
        if config.mock_mode {
            info!("Ledger adapter running in mock mode");
            return Self::mock();
        }

        match HttpLedgerClient::new(
            &config.rpc_url,
            &config.private_key,
            config.confirmation_poll_ms,
        ) {
            Ok(client) => LedgerAdapter {
                client: Some(client),
                contract_address: config.contract_address.clone(),
                gas_margin_percent: config.gas_margin_percent,
            },
            Err(e) => {
                warn!("Ledger client construction failed, degrading to mock: {}", e);
                Self::mock()
            }
        }
    }
}

impl<C: LedgerClient> LedgerAdapter<C> {
    /// Adapter with no transport; every call returns a degraded result.
    pub fn mock() -> Self {
        LedgerAdapter {
            client: None,
            contract_address: String::new(),
            gas_margin_percent: 20,
        }
    }

    /// Adapter over an explicit transport, for tests and custom clients.
    pub fn with_client(client: C, contract_address: String, gas_margin_percent: u64) -> Self {
        LedgerAdapter {
            client: Some(client),
            contract_address,
            gas_margin_percent,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.client.is_none()
    }

    /// Issue a single fingerprint on the ledger.
    pub async fn issue(&self, fingerprint: &Fingerprint) -> TxResult {
        self.submit("issue", encode_issue(fingerprint)).await
    }

    /// Anchor a batch of fingerprints as one Merkle root transaction.
    ///
    /// An empty batch cannot be anchored and yields a degraded receipt.
    pub async fn issue_batch(&self, fingerprints: &[Fingerprint]) -> TxResult {
        let root = match merkle_root(fingerprints) {
            Ok(root) => root,
            Err(e) => {
                warn!("Batch anchoring skipped: {}", e);
                return TxResult::synthetic();
            }
        };
        self.submit("issue_batch", encode_issue_batch(&root)).await
    }

    /// Revoke a fingerprint with a human-readable reason.
    pub async fn revoke(&self, fingerprint: &Fingerprint, reason: &str) -> TxResult {
        self.submit("revoke", encode_revoke(fingerprint, reason)).await
    }

    /// Query the ledger state of a fingerprint.
    ///
    /// Mock mode reports the certificate as present (optimistic default so
    /// the product stays demoable); a transport error on the real path
    /// reports it as absent (pessimistic default). The asymmetry is a
    /// deliberate business decision.
    pub async fn verify(&self, fingerprint: &Fingerprint) -> LedgerRecord {
        let Some(client) = &self.client else {
            debug!("Mock verify of {}", fingerprint);
            return LedgerRecord::mock_valid();
        };

        match self.verify_on_chain(client, fingerprint).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Ledger verify of {} failed: {}", fingerprint, e);
                LedgerRecord::unavailable()
            }
        }
    }

    async fn verify_on_chain(
        &self,
        client: &C,
        fingerprint: &Fingerprint,
    ) -> Result<LedgerRecord> {
        let tx = TransactionRequest {
            to: self.contract_address.clone(),
            data: encode_verify(fingerprint),
        };
        let returned = client.call(&tx).await?;
        let decoded = decode_verify_return(&returned)?;

        let status = if !decoded.exists {
            "Not found on chain"
        } else if decoded.revoked {
            "Revoked on chain"
        } else {
            "Verified on blockchain"
        };

        Ok(LedgerRecord {
            exists: decoded.exists,
            issuer: decoded.issuer,
            issued_at: decoded.issued_at,
            revoked: decoded.revoked,
            status: status.to_string(),
            degraded: false,
        })
    }

    /// Estimate, pad, submit, and wait for one confirmation. Any failure
    /// along the way produces a synthetic receipt instead of an error.
    async fn submit(&self, operation: &str, data: Vec<u8>) -> TxResult {
        let Some(client) = &self.client else {
            debug!("Mock {} transaction", operation);
            return TxResult::synthetic();
        };

        match self.submit_real(client, data).await {
            Ok(result) => {
                info!(
                    "Ledger {} confirmed in block {} ({} gas)",
                    operation, result.block_number, result.gas_used
                );
                result
            }
            Err(e) => {
                warn!("Ledger {} failed, returning degraded receipt: {}", operation, e);
                TxResult::synthetic()
            }
        }
    }

    async fn submit_real(&self, client: &C, data: Vec<u8>) -> Result<TxResult> {
        let tx = TransactionRequest {
            to: self.contract_address.clone(),
            data,
        };

        let estimate = client.estimate_gas(&tx).await?;
        let gas_limit = estimate + estimate * self.gas_margin_percent / 100;
        debug!("Gas estimate {} padded to {}", estimate, gas_limit);

        let tx_hash = client.send_transaction(&tx, gas_limit).await?;
        let receipt = client.wait_for_receipt(&tx_hash).await?;

        Ok(TxResult {
            transaction_id: tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            confirmed: receipt.succeeded,
            degraded: false,
        })
    }
}
