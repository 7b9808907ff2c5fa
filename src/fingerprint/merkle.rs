//! Merkle Aggregation of Fingerprints
//!
//! Combines a batch of certificate fingerprints into a single root digest
//! for on-chain anchoring, with proofs for individual leaves.
//!
//! Pairing is left-to-right over raw 32-byte digests; an unpaired trailing
//! fingerprint is promoted unchanged to the next level (no self-pairing, no
//! zero padding).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::fingerprint::{keccak256, Fingerprint};

/// Hash a left/right pair into its parent node.
fn hash_pair(left: &Fingerprint, right: &Fingerprint) -> Fingerprint {
    let mut combined = Vec::with_capacity(64);
    combined.extend_from_slice(left.as_bytes());
    combined.extend_from_slice(right.as_bytes());
    keccak256(&combined)
}

fn reduce_level(level: &[Fingerprint]) -> Vec<Fingerprint> {
    let mut next = Vec::with_capacity((level.len() + 1) / 2);
    for pair in level.chunks(2) {
        match pair {
            [left, right] => next.push(hash_pair(left, right)),
            // Odd count: promote the unpaired fingerprint unchanged.
            [single] => next.push(*single),
            _ => unreachable!(),
        }
    }
    next
}

/// Compute the Merkle root of a batch of fingerprints.
///
/// A single-element batch returns that fingerprint unchanged. The result is
/// order-sensitive: callers must agree on leaf ordering before interpreting
/// a root as the anchor for a specific batch.
pub fn merkle_root(fingerprints: &[Fingerprint]) -> Result<Fingerprint, EngineError> {
    if fingerprints.is_empty() {
        return Err(EngineError::EmptyBatch);
    }

    let mut level = fingerprints.to_vec();
    while level.len() > 1 {
        level = reduce_level(&level);
    }

    let root = level[0];
    debug!("Merkle root of {} fingerprints: {}", fingerprints.len(), root);
    Ok(root)
}

/// One step of a Merkle proof: the sibling digest and which side it sits on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Fingerprint,
    pub sibling_on_left: bool,
}

/// Inclusion proof for a single fingerprint within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Fingerprint,
    pub steps: Vec<ProofStep>,
    pub root: Fingerprint,
}

impl MerkleProof {
    /// Recompute the root from the leaf and check it matches.
    pub fn verify(&self) -> bool {
        let mut current = self.leaf;
        for step in &self.steps {
            current = if step.sibling_on_left {
                hash_pair(&step.sibling, &current)
            } else {
                hash_pair(&current, &step.sibling)
            };
        }
        current == self.root
    }
}

/// Generate an inclusion proof for the fingerprint at `index`.
pub fn merkle_proof(
    fingerprints: &[Fingerprint],
    index: usize,
) -> Result<MerkleProof, EngineError> {
    if fingerprints.is_empty() {
        return Err(EngineError::EmptyBatch);
    }
    if index >= fingerprints.len() {
        return Err(EngineError::InvalidFingerprint(format!(
            "proof index {} out of range for batch of {}",
            index,
            fingerprints.len()
        )));
    }

    let leaf = fingerprints[index];
    let mut steps = Vec::new();
    let mut level = fingerprints.to_vec();
    let mut pos = index;

    while level.len() > 1 {
        let sibling_pos = pos ^ 1;
        if sibling_pos < level.len() {
            steps.push(ProofStep {
                sibling: level[sibling_pos],
                sibling_on_left: sibling_pos < pos,
            });
        }
        // A promoted odd leaf keeps its position with no sibling step.
        pos /= 2;
        level = reduce_level(&level);
    }

    Ok(MerkleProof {
        leaf,
        steps,
        root: level[0],
    })
}
