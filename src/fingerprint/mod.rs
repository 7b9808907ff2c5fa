//! Certificate Fingerprinting
//!
//! Deterministic fingerprinting of certificate content: canonical encoding
//! of semantic fields followed by an Ethereum-compatible Keccak-256 digest.

pub mod content;
pub mod merkle;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::EngineError;

pub use content::{fingerprint, fingerprint_at, CertificateContent};
pub use merkle::{merkle_proof, merkle_root, MerkleProof};

/// A 32-byte Keccak-256 fingerprint, rendered as 0x-prefixed hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
    #[serde(with = "fingerprint_serde")]
    bytes: [u8; 32],
}

mod fingerprint_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(d)?;
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(&hex_str);
        let bytes = hex::decode(hex_str).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("fingerprint must be 32 bytes"))
    }
}

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse from hex, with or without the 0x prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, EngineError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);

        let bytes = hex::decode(hex_str)
            .map_err(|e| EngineError::InvalidFingerprint(e.to_string()))?;

        if bytes.len() != 32 {
            return Err(EngineError::InvalidFingerprint(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_bytes(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn to_hex_prefixed(&self) -> String {
        format!("0x{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Compute the Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> Fingerprint {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Fingerprint::from_bytes(bytes)
}
