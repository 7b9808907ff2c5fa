//! Ledger adapter against a mocked JSON-RPC endpoint.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use certchain_engine::fingerprint::Fingerprint;
use certchain_engine::ledger::rpc::HttpLedgerClient;
use certchain_engine::ledger::LedgerAdapter;

// Throwaway dev key, never used outside tests.
const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

fn fp(byte: u8) -> Fingerprint {
    Fingerprint::from_bytes([byte; 32])
}

async fn adapter_for(server: &MockServer) -> LedgerAdapter<HttpLedgerClient> {
    let client = HttpLedgerClient::new(&server.uri(), TEST_KEY, 10).unwrap();
    LedgerAdapter::with_client(client, CONTRACT.to_string(), 20)
}

fn rpc_result(value: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": value,
    }))
}

#[tokio::test]
async fn test_issue_submits_and_confirms() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "eth_estimateGas" })))
        .respond_with(rpc_result(json!("0x186a0"))) // 100 000
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .respond_with(rpc_result(json!(
            "0x1111111111111111111111111111111111111111111111111111111111111111"
        )))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt" })))
        .respond_with(rpc_result(json!({
            "blockNumber": "0x10",
            "gasUsed": "0x15f90",
            "status": "0x1",
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let receipt = adapter.issue(&fp(0x01)).await;

    assert!(!receipt.degraded);
    assert!(receipt.confirmed);
    assert_eq!(receipt.block_number, 16);
    assert_eq!(receipt.gas_used, 90_000);
    assert!(receipt.transaction_id.starts_with("0x1111"));
}

#[tokio::test]
async fn test_verify_decodes_eth_call_result() {
    let server = MockServer::start().await;

    // (exists=true, issuer=0, issuedAt=0x64, revoked=false)
    let mut words = vec![0u8; 128];
    words[31] = 1;
    words[95] = 0x64;
    let payload = format!("0x{}", hex::encode(&words));

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .respond_with(rpc_result(json!(payload)))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let record = adapter.verify(&fp(0x02)).await;

    assert!(!record.degraded);
    assert!(record.exists);
    assert!(!record.revoked);
    assert_eq!(record.issued_at, Some(0x64));
    assert_eq!(record.status, "Verified on blockchain");
}

#[tokio::test]
async fn test_rpc_error_degrades_write() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "insufficient funds" },
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let receipt = adapter.revoke(&fp(0x03), "compromised").await;

    assert!(receipt.degraded);
    assert!(receipt.confirmed);
    assert_eq!(receipt.transaction_id.len(), 66);
}

#[tokio::test]
async fn test_http_failure_degrades_verify_pessimistically() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server).await;
    let record = adapter.verify(&fp(0x04)).await;

    assert!(record.degraded);
    assert!(!record.exists);
    assert_eq!(record.status, "degraded: unavailable");
}
