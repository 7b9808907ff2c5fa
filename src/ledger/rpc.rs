//! Certificate registry contract interaction over Ethereum JSON-RPC.
//!
//! The registry exposes three functions:
//!   issueCertificate(bytes32)
//!   revokeCertificate(bytes32,string)
//!   verifyCertificate(bytes32) returns (bool, address, uint256, bool)
//!
//! Calls are ABI-encoded by hand (selector + 32-byte words) and submitted
//! through a node that holds the configured signing key, which is the
//! standard dev-chain deployment for this product.

use anyhow::{anyhow, bail, Result};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::fingerprint::{keccak256, Fingerprint};

const RECEIPT_POLL_ATTEMPTS: u32 = 60;

/// An unsubmitted registry transaction.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub to: String,
    pub data: Vec<u8>,
}

/// Mined transaction receipt.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub block_number: u64,
    pub gas_used: u64,
    pub succeeded: bool,
}

/// Transport used by the adapter to reach the ledger.
///
/// Abstracted so tests can substitute a failing or scripted client without
/// a network.
pub trait LedgerClient: Send + Sync {
    fn estimate_gas(
        &self,
        tx: &TransactionRequest,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    fn send_transaction(
        &self,
        tx: &TransactionRequest,
        gas_limit: u64,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    fn wait_for_receipt(
        &self,
        tx_hash: &str,
    ) -> impl std::future::Future<Output = Result<Receipt>> + Send;

    fn call(
        &self,
        tx: &TransactionRequest,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// JSON-RPC client for an Ethereum-compatible node.
pub struct HttpLedgerClient {
    http: reqwest::Client,
    rpc_url: String,
    from_address: String,
    poll_interval: Duration,
}

impl HttpLedgerClient {
    pub fn new(rpc_url: &str, private_key: &str, poll_interval_ms: u64) -> Result<Self> {
        let from_address = derive_address(private_key)?;
        debug!("Ledger client sender address: {}", from_address);

        Ok(Self {
            http: reqwest::Client::new(),
            rpc_url: rpc_url.to_string(),
            from_address,
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: Value = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.get("error") {
            bail!("RPC error from {}: {}", method, err);
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("RPC response for {} has no result", method))
    }

    fn tx_object(&self, tx: &TransactionRequest, gas_limit: Option<u64>) -> Value {
        let mut obj = json!({
            "from": self.from_address,
            "to": tx.to,
            "data": format!("0x{}", hex::encode(&tx.data)),
        });
        if let Some(gas) = gas_limit {
            obj["gas"] = json!(format!("0x{:x}", gas));
        }
        obj
    }
}

impl LedgerClient for HttpLedgerClient {
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        let result = self
            .rpc("eth_estimateGas", json!([self.tx_object(tx, None)]))
            .await?;
        parse_quantity(&result)
    }

    async fn send_transaction(&self, tx: &TransactionRequest, gas_limit: u64) -> Result<String> {
        let result = self
            .rpc(
                "eth_sendTransaction",
                json!([self.tx_object(tx, Some(gas_limit))]),
            )
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("eth_sendTransaction returned a non-string hash"))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<Receipt> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let result = self
                .rpc("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if !result.is_null() {
                let block_number = result
                    .get("blockNumber")
                    .map(parse_quantity)
                    .transpose()?
                    .unwrap_or(0);
                let gas_used = result
                    .get("gasUsed")
                    .map(parse_quantity)
                    .transpose()?
                    .unwrap_or(0);
                let succeeded = result
                    .get("status")
                    .and_then(|s| s.as_str())
                    .map(|s| s == "0x1")
                    .unwrap_or(true);

                if !succeeded {
                    warn!("Transaction {} reverted", tx_hash);
                }

                return Ok(Receipt {
                    block_number,
                    gas_used,
                    succeeded,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        bail!("No receipt for {} after {} polls", tx_hash, RECEIPT_POLL_ATTEMPTS)
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Vec<u8>> {
        let result = self
            .rpc("eth_call", json!([self.tx_object(tx, None), "latest"]))
            .await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| anyhow!("eth_call returned non-string data"))?;
        Ok(hex::decode(hex_str.trim_start_matches("0x"))?)
    }
}

/// Derive the Ethereum address for a secp256k1 private key.
pub fn derive_address(private_key: &str) -> Result<String> {
    let key_bytes = hex::decode(private_key.trim_start_matches("0x"))
        .map_err(|e| anyhow!("Invalid private key hex: {}", e))?;

    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&key_bytes)
        .map_err(|e| anyhow!("Invalid private key: {}", e))?;
    let public = PublicKey::from_secret_key(&secp, &secret);

    // Address = last 20 bytes of keccak256 over the uncompressed point
    // without the 0x04 prefix byte.
    let uncompressed = public.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Ok(format!("0x{}", hex::encode(&hash.as_bytes()[12..])))
}

/// Parse a JSON-RPC hex quantity ("0x1a2b") into a u64.
fn parse_quantity(value: &Value) -> Result<u64> {
    let s = value
        .as_str()
        .ok_or_else(|| anyhow!("expected hex quantity, got {}", value))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| anyhow!("invalid hex quantity {}: {}", s, e))
}

/// First 4 bytes of keccak256 over the function signature.
fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&hash.as_bytes()[..4]);
    sel
}

/// ABI-encode `issueCertificate(bytes32)`.
pub fn encode_issue(fingerprint: &Fingerprint) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector("issueCertificate(bytes32)"));
    data.extend_from_slice(fingerprint.as_bytes());
    data
}

/// ABI-encode `issueBatch(bytes32)` anchoring a Merkle root.
pub fn encode_issue_batch(root: &Fingerprint) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector("issueBatch(bytes32)"));
    data.extend_from_slice(root.as_bytes());
    data
}

/// ABI-encode `revokeCertificate(bytes32,string)`.
///
/// The string argument is dynamic: its head word holds the offset of the
/// (length, padded bytes) tail relative to the start of the argument block.
pub fn encode_revoke(fingerprint: &Fingerprint, reason: &str) -> Vec<u8> {
    let reason_bytes = reason.as_bytes();
    let padded_len = (reason_bytes.len() + 31) / 32 * 32;

    let mut data = Vec::with_capacity(4 + 3 * 32 + padded_len);
    data.extend_from_slice(&selector("revokeCertificate(bytes32,string)"));

    // bytes32 fingerprint
    data.extend_from_slice(fingerprint.as_bytes());

    // offset of the string tail: two head words
    let mut offset = [0u8; 32];
    offset[24..32].copy_from_slice(&64u64.to_be_bytes());
    data.extend_from_slice(&offset);

    // string length
    let mut len = [0u8; 32];
    len[24..32].copy_from_slice(&(reason_bytes.len() as u64).to_be_bytes());
    data.extend_from_slice(&len);

    // string bytes, right-padded to a word boundary
    data.extend_from_slice(reason_bytes);
    data.resize(data.len() + padded_len - reason_bytes.len(), 0);

    data
}

/// ABI-encode `verifyCertificate(bytes32)`.
pub fn encode_verify(fingerprint: &Fingerprint) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector("verifyCertificate(bytes32)"));
    data.extend_from_slice(fingerprint.as_bytes());
    data
}

/// Decoded return of `verifyCertificate`.
#[derive(Debug, Clone)]
pub struct VerifyReturn {
    pub exists: bool,
    pub issuer: Option<String>,
    pub issued_at: Option<u64>,
    pub revoked: bool,
}

/// Decode `(bool exists, address issuer, uint256 issuedAt, bool revoked)`.
pub fn decode_verify_return(data: &[u8]) -> Result<VerifyReturn> {
    if data.len() < 4 * 32 {
        bail!(
            "verifyCertificate returned {} bytes, expected at least 128",
            data.len()
        );
    }

    let exists = data[31] != 0;

    let issuer_bytes = &data[44..64];
    let issuer = if issuer_bytes.iter().all(|b| *b == 0) {
        None
    } else {
        Some(format!("0x{}", hex::encode(issuer_bytes)))
    };

    let issued_at = u64::from_be_bytes(data[88..96].try_into()?);
    let issued_at = if issued_at == 0 { None } else { Some(issued_at) };

    let revoked = data[127] != 0;

    Ok(VerifyReturn {
        exists,
        issuer,
        issued_at,
        revoked,
    })
}
