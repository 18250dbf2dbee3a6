pub mod signature;

pub use signature::{Ed25519Scheme, Keypair, SignatureError, SignatureScheme, SignatureType};
