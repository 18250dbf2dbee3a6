pub mod merkle;

pub use merkle::{compute_merkle_root, MerkleError, MerkleProof, MerkleTree};
