//! BLAKE3 Merkle commitment over the campaign allowlist.
//!
//! Every allowlist entry is a *claim leaf*, [`derive_leaf`]`(identity, tier)`,
//! so the asserted tier is covered by the proof. Tree hashing is
//! domain-separated to prevent second-preimage attacks:
//! - Leaf hash: `BLAKE3(0x00 || leaf)`
//! - Internal node: `BLAKE3(0x01 || left || right)`
//!
//! Odd-length layers are padded by duplicating the last element.
//! Empty trees produce [`Hash256::ZERO`], which is never a valid campaign root.
//!
//! The campaign only *verifies* proofs. [`MerkleTree`] exists for operators
//! building an allowlist offline and for tests.

use serde::{Deserialize, Serialize};

use crate::constants::LEAF_DOMAIN;
use crate::error::VerifierFault;
use crate::traits::MerkleVerifier;
use crate::types::{Hash256, Identity, Tier};

/// Domain separation prefix for leaf hashes.
const LEAF_PREFIX: u8 = 0x00;

/// Domain separation prefix for internal node hashes.
const NODE_PREFIX: u8 = 0x01;

/// Derive the claim leaf committed in the allowlist for `identity` at `tier`.
///
/// `BLAKE3("airdrop-leaf-v1" || identity || tier as u32 LE)`.
pub fn derive_leaf(identity: &Identity, tier: Tier) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(LEAF_DOMAIN);
    hasher.update(identity.as_bytes());
    hasher.update(&tier.to_le_bytes());
    Hash256(hasher.finalize().into())
}

/// Compute a domain-separated leaf hash: `BLAKE3(0x00 || data)`.
pub fn leaf_hash(data: &Hash256) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[LEAF_PREFIX]);
    hasher.update(data.as_bytes());
    Hash256(hasher.finalize().into())
}

/// Compute a domain-separated internal node hash: `BLAKE3(0x01 || left || right)`.
pub fn node_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash256(hasher.finalize().into())
}

/// Compute the allowlist root from claim leaves.
///
/// Returns [`Hash256::ZERO`] for an empty slice.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    let mut current: Vec<Hash256> = leaves.iter().map(leaf_hash).collect();
    while current.len() > 1 {
        current = next_layer(&current);
    }
    current.first().copied().unwrap_or(Hash256::ZERO)
}

fn next_layer(layer: &[Hash256]) -> Vec<Hash256> {
    layer
        .chunks(2)
        .map(|pair| node_hash(&pair[0], pair.get(1).unwrap_or(&pair[0])))
        .collect()
}

/// Full allowlist tree supporting proof generation.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    leaves: Vec<Hash256>,
    /// `layers[0]` = leaf hashes, `layers[last]` = `[root]`.
    layers: Vec<Vec<Hash256>>,
}

impl MerkleTree {
    /// Build a tree from claim leaves.
    pub fn from_leaves(leaves: &[Hash256]) -> Self {
        let mut layers: Vec<Vec<Hash256>> = Vec::new();
        let mut current: Vec<Hash256> = leaves.iter().map(leaf_hash).collect();
        while current.len() > 1 {
            let next = next_layer(&current);
            layers.push(current);
            current = next;
        }
        if !current.is_empty() {
            layers.push(current);
        }
        Self {
            leaves: leaves.to_vec(),
            layers,
        }
    }

    /// Build a tree from `(identity, tier)` allowlist entries.
    pub fn from_allowlist(entries: &[(Identity, Tier)]) -> Self {
        let leaves: Vec<Hash256> = entries
            .iter()
            .map(|(identity, tier)| derive_leaf(identity, *tier))
            .collect();
        Self::from_leaves(&leaves)
    }

    /// The root. Returns [`Hash256::ZERO`] for an empty tree.
    pub fn root(&self) -> Hash256 {
        self.layers
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or(Hash256::ZERO)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Generate an inclusion proof for the leaf at `index`.
    ///
    /// Returns `None` if the index is out of bounds.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaf = *self.leaves.get(index)?;
        let mut path = Vec::with_capacity(self.layers.len().saturating_sub(1));
        let mut pos = index;

        for layer in &self.layers[..self.layers.len() - 1] {
            // Odd layer: the last node is paired with itself.
            let sibling = layer.get(pos ^ 1).copied().unwrap_or(layer[pos]);
            let side = if pos % 2 == 0 { Side::Right } else { Side::Left };
            path.push(ProofStep {
                hash: sibling,
                side,
            });
            pos /= 2;
        }

        Some(MerkleProof { leaf, path })
    }

    /// Proof for the first entry matching `(identity, tier)`, if present.
    pub fn proof_for(&self, identity: &Identity, tier: Tier) -> Option<MerkleProof> {
        let leaf = derive_leaf(identity, tier);
        let index = self.leaves.iter().position(|l| *l == leaf)?;
        self.proof(index)
    }
}

/// Which side a sibling hash is on relative to the current node.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum Side {
    /// Sibling is on the left (we are on the right).
    Left,
    /// Sibling is on the right (we are on the left).
    Right,
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ProofStep {
    pub hash: Hash256,
    pub side: Side,
}

/// Caller-supplied inclusion proof: the claimed leaf plus sibling hashes
/// from the leaf level up to the root.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct MerkleProof {
    pub leaf: Hash256,
    pub path: Vec<ProofStep>,
}

impl MerkleProof {
    /// Recompute the root from the leaf and sibling path, then compare.
    pub fn verify(&self, expected_root: &Hash256) -> bool {
        let computed = self.path.iter().fold(leaf_hash(&self.leaf), |current, step| {
            match step.side {
                Side::Left => node_hash(&step.hash, &current),
                Side::Right => node_hash(&current, &step.hash),
            }
        });
        computed == *expected_root
    }
}

/// In-process BLAKE3 verifier. Never faults.
///
/// A proof is accepted only when it commits to exactly the leaf derived from
/// the claimant's identity and asserted tier, and its path reaches the root.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Verifier;

impl MerkleVerifier for Blake3Verifier {
    fn verify(
        &self,
        proof: &MerkleProof,
        leaf: &Hash256,
        root: &Hash256,
    ) -> Result<bool, VerifierFault> {
        Ok(proof.leaf == *leaf && proof.verify(root))
    }
}
