use serde::{Deserialize, Serialize};
use std::env;

use crate::error::EngineError;

/// Ledger client configuration.
///
/// When `mock_mode` is set the adapter never opens a network connection and
/// every call takes the degraded path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub private_key: String,
    pub contract_address: String,
    pub mock_mode: bool,
    /// Safety margin applied on top of the node's gas estimate, in percent.
    pub gas_margin_percent: u64,
    /// Delay between receipt polls while waiting for confirmation.
    pub confirmation_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database_url: String,
    pub audit_log_path: String,
    pub ledger: LedgerConfig,
}

impl LedgerConfig {
    pub fn load() -> Result<Self, EngineError> {
        let rpc_url = env::var("LEDGER_RPC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());

        let private_key = env::var("LEDGER_PRIVATE_KEY").unwrap_or_default();

        let contract_address = env::var("LEDGER_CONTRACT_ADDRESS").unwrap_or_default();

        let mock_mode = env::var("LEDGER_MOCK_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        let gas_margin_percent = env::var("LEDGER_GAS_MARGIN_PERCENT")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|e| EngineError::Config(format!("Invalid gas margin: {}", e)))?;

        let confirmation_poll_ms = env::var("LEDGER_CONFIRMATION_POLL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|e| EngineError::Config(format!("Invalid poll interval: {}", e)))?;

        if !mock_mode && private_key.is_empty() {
            return Err(EngineError::Config(
                "LEDGER_PRIVATE_KEY is required when mock mode is disabled".to_string(),
            ));
        }

        Ok(LedgerConfig {
            rpc_url,
            private_key,
            contract_address,
            mock_mode,
            gas_margin_percent,
            confirmation_poll_ms,
        })
    }

    /// Configuration for a fully mocked ledger, used by tests and demos.
    pub fn mock() -> Self {
        LedgerConfig {
            rpc_url: String::new(),
            private_key: String::new(),
            contract_address: String::new(),
            mock_mode: true,
            gas_margin_percent: 20,
            confirmation_poll_ms: 1000,
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, EngineError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://certchain.db".to_string());

        let audit_log_path = env::var("AUDIT_LOG_PATH")
            .unwrap_or_else(|_| "logs/audit.jsonl".to_string());

        Ok(EngineConfig {
            database_url,
            audit_log_path,
            ledger: LedgerConfig::load()?,
        })
    }
}
