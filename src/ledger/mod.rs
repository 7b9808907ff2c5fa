//! Ledger Adapter
//!
//! Issues, verifies, and revokes certificate fingerprints against the
//! certificate registry contract on an Ethereum-compatible chain, degrading
//! to synthetic results whenever the chain is disabled or unreachable.

pub mod adapter;
pub mod rpc;
pub mod types;

pub use adapter::{HttpLedgerAdapter, LedgerAdapter};
pub use rpc::{HttpLedgerClient, LedgerClient};
pub use types::{LedgerRecord, TxResult};
