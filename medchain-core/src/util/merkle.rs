//! Merkle Tree implementation for MedChain
//!
//! Leaves are the SHA-256 hex digests of each report's canonical encoding.
//! Interior nodes hash the concatenation of their children's hex strings; an
//! odd node at the end of a level is paired with itself. A tree with no leaves
//! has the empty string as its root. That value is a sentinel rather than a
//! commitment and blocks without transactions carry it as their `merkle_root`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::encoding::{sha256_hex, EncodingError};
use crate::types::report::HealthReport;

/// Root of a tree with no leaves
pub const EMPTY_MERKLE_ROOT: &str = "";

/// Errors that can occur when working with Merkle trees
#[derive(Error, Debug)]
pub enum MerkleError {
    /// Index is out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Empty tree
    #[error("Empty Merkle tree")]
    EmptyTree,

    /// A leaf could not be encoded
    #[error("Leaf encoding failed: {0}")]
    Encoding(#[from] EncodingError),
}

/// Result type for Merkle tree operations
pub type MerkleResult<T> = Result<T, MerkleError>;

/// Compute the Merkle root of an ordered report sequence.
pub fn compute_merkle_root(transactions: &[HealthReport]) -> Result<String, EncodingError> {
    let mut level = leaf_hashes(transactions)?;
    if level.is_empty() {
        return Ok(EMPTY_MERKLE_ROOT.to_string());
    }
    while level.len() > 1 {
        level = next_level(&level);
    }
    Ok(level.swap_remove(0))
}

fn leaf_hashes(transactions: &[HealthReport]) -> Result<Vec<String>, EncodingError> {
    transactions
        .iter()
        .map(|tx| tx.canonical_bytes().map(|bytes| sha256_hex(bytes)))
        .collect()
}

fn next_level(level: &[String]) -> Vec<String> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// Hash a pair of nodes
fn hash_pair(left: &str, right: &str) -> String {
    let mut combined = String::with_capacity(left.len() + right.len());
    combined.push_str(left);
    combined.push_str(right);
    sha256_hex(combined)
}

/// A Merkle Tree retaining every level, for inclusion proofs
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All nodes in the tree, level by level, leaves first
    nodes: Vec<Vec<String>>,
    /// The root hash of the tree
    pub root: String,
}

/// A proof of inclusion in a Merkle tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The hash of the leaf being proven
    pub leaf_hash: String,
    /// The lemma (sibling hashes along the path to the root)
    pub lemma: Vec<String>,
    /// The indices for traversing the tree (0 = left, 1 = right)
    pub path_indices: Vec<usize>,
    /// The root hash of the Merkle tree
    pub root_hash: String,
}

impl MerkleTree {
    /// Build the tree over an ordered report sequence
    pub fn new(transactions: &[HealthReport]) -> MerkleResult<Self> {
        Ok(Self::from_leaf_hashes(leaf_hashes(transactions)?))
    }

    /// Build the tree over precomputed leaf digests
    pub fn from_leaf_hashes(leaves: Vec<String>) -> Self {
        if leaves.is_empty() {
            return Self {
                nodes: Vec::new(),
                root: EMPTY_MERKLE_ROOT.to_string(),
            };
        }

        let mut nodes = vec![leaves];
        while let Some(current) = nodes.last().filter(|level| level.len() > 1) {
            let parent = next_level(current);
            nodes.push(parent);
        }

        let root = nodes
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_default();

        Self { nodes, root }
    }

    /// Create a proof for the leaf at the given index
    pub fn create_proof(&self, index: usize) -> MerkleResult<MerkleProof> {
        let leaves = self.nodes.first().ok_or(MerkleError::EmptyTree)?;
        if index >= leaves.len() {
            return Err(MerkleError::IndexOutOfBounds(index));
        }

        let mut lemma = Vec::new();
        let mut path_indices = Vec::new();
        let mut current_index = index;

        // Every level except the root contributes one sibling
        for level in &self.nodes[..self.nodes.len() - 1] {
            let sibling_index = current_index ^ 1;
            path_indices.push(current_index % 2);
            // Missing right sibling means this node was paired with itself
            let sibling = level.get(sibling_index).unwrap_or(&level[current_index]);
            lemma.push(sibling.clone());
            current_index /= 2;
        }

        Ok(MerkleProof {
            leaf_hash: leaves[index].clone(),
            lemma,
            path_indices,
            root_hash: self.root.clone(),
        })
    }

    /// Verify a proof
    pub fn verify_proof(proof: &MerkleProof) -> bool {
        if proof.lemma.len() != proof.path_indices.len() {
            return false;
        }

        let computed = proof
            .lemma
            .iter()
            .zip(&proof.path_indices)
            .fold(proof.leaf_hash.clone(), |current, (sibling, side)| {
                if *side == 0 {
                    hash_pair(&current, sibling)
                } else {
                    hash_pair(sibling, &current)
                }
            });

        computed == proof.root_hash
    }

    /// Get the root hash of the tree
    pub fn root_hash(&self) -> &str {
        &self.root
    }

    /// Get the number of leaves in the tree
    pub fn len(&self) -> usize {
        self.nodes.first().map_or(0, Vec::len)
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels, leaves included
    pub fn depth(&self) -> usize {
        self.nodes.len()
    }
}

impl fmt::Display for MerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MerkleTree {{")?;
        writeln!(f, "  leaves: {}", self.len())?;
        writeln!(f, "  levels: {}", self.depth())?;
        writeln!(f, "  root: {}", self.root)?;
        writeln!(f, "}}")
    }
}

impl fmt::Display for MerkleProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MerkleProof {{")?;
        writeln!(f, "  leaf_hash: {}", self.leaf_hash)?;
        writeln!(f, "  path_length: {}", self.lemma.len())?;
        writeln!(f, "  root_hash: {}", self.root_hash)?;
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::prelude::*;

    fn reports(n: usize) -> Vec<HealthReport> {
        (0..n).map(|i| sample_report(&format!("patient_{i}"))).collect()
    }

    fn leaf(report: &HealthReport) -> String {
        sha256_hex(report.canonical_bytes().unwrap())
    }

    #[test]
    fn test_empty_root_is_sentinel() {
        assert_eq!(compute_merkle_root(&[]).unwrap(), "");
        let tree = MerkleTree::new(&[]).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root, "");
        assert!(matches!(tree.create_proof(0), Err(MerkleError::EmptyTree)));
    }

    #[test]
    fn test_single_leaf() {
        let txs = reports(1);
        // For a single leaf, the leaf hash is the root hash
        assert_eq!(compute_merkle_root(&txs).unwrap(), leaf(&txs[0]));
    }

    #[test]
    fn test_odd_level_duplicates_last_hash() {
        let txs = reports(3);
        let (a, b, c) = (leaf(&txs[0]), leaf(&txs[1]), leaf(&txs[2]));
        let ab = sha256_hex(format!("{a}{b}"));
        let cc = sha256_hex(format!("{c}{c}"));
        let expected = sha256_hex(format!("{ab}{cc}"));
        assert_eq!(compute_merkle_root(&txs).unwrap(), expected);
    }

    #[test]
    fn test_reordering_changes_root() {
        let txs = reports(4);
        let mut swapped = txs.clone();
        swapped.swap(0, 1);
        assert_ne!(
            compute_merkle_root(&txs).unwrap(),
            compute_merkle_root(&swapped).unwrap()
        );
    }

    #[test]
    fn test_tree_root_matches_function() {
        for n in 1..=7 {
            let txs = reports(n);
            let tree = MerkleTree::new(&txs).unwrap();
            assert_eq!(tree.root, compute_merkle_root(&txs).unwrap(), "n = {n}");
            assert_eq!(tree.len(), n);
        }
        assert_eq!(MerkleTree::new(&reports(4)).unwrap().depth(), 3);
    }

    #[test]
    fn test_proof_creation_and_verification() {
        for n in [1usize, 2, 3, 5, 8] {
            let tree = MerkleTree::new(&reports(n)).unwrap();
            for i in 0..n {
                let proof = tree.create_proof(i).unwrap();
                assert!(MerkleTree::verify_proof(&proof), "n = {n}, i = {i}");
            }
        }
    }

    #[test]
    fn test_invalid_proof() {
        let tree = MerkleTree::new(&reports(4)).unwrap();
        let mut proof = tree.create_proof(2).unwrap();
        proof.leaf_hash = sha256_hex(b"forged");
        assert!(!MerkleTree::verify_proof(&proof));

        let mut proof = tree.create_proof(2).unwrap();
        proof.path_indices.pop();
        assert!(!MerkleTree::verify_proof(&proof));
    }

    #[test]
    fn test_proof_out_of_bounds() {
        let tree = MerkleTree::new(&reports(1)).unwrap();
        assert!(tree.create_proof(0).is_ok());
        assert!(matches!(
            tree.create_proof(1),
            Err(MerkleError::IndexOutOfBounds(1))
        ));
    }
}
