use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for signature operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The key is invalid or corrupted
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The signature is invalid or corrupted
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// A cryptographic operation failed
    #[error("Cryptographic operation failed: {0}")]
    CryptoOperationFailed(String),

    /// Missing signature
    #[error("Missing signature")]
    MissingSignature,

    /// Missing public key
    #[error("Missing public key")]
    MissingPublicKey,
}

/// Type of signature scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureType {
    /// Ed25519 curve
    Ed25519,
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureType::Ed25519 => write!(f, "Ed25519"),
        }
    }
}

/// Trait for signature schemes.
///
/// The ledger never touches key material directly; it signs and verifies the
/// canonical report encoding through this interface. Public keys travel inside
/// reports in the textual form produced by [`SignatureScheme::serialize_public_key`].
pub trait SignatureScheme: Send + Sync {
    /// Sign `message` with the raw private key bytes
    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, SignatureError>;

    /// Verify a single signature.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not match and
    /// `Err` when the key or signature cannot be parsed.
    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SignatureError>;

    /// Encode a public key for embedding in a report
    fn serialize_public_key(&self, public_key: &[u8]) -> String {
        hex::encode(public_key)
    }

    /// Decode a public key embedded in a report
    fn deserialize_public_key(&self, encoded: &str) -> Result<Vec<u8>, SignatureError> {
        hex::decode(encoded.trim()).map_err(|e| SignatureError::InvalidKey(e.to_string()))
    }

    /// Get the signature type
    fn signature_type(&self) -> SignatureType;
}

/// Raw Ed25519 key material
#[derive(Clone)]
pub struct Keypair {
    pub private_key: [u8; 32],
    pub public_key: [u8; 32],
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

/// Implementation of the Ed25519 signature scheme
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Scheme;

impl Ed25519Scheme {
    pub fn new() -> Self {
        Self
    }

    /// Generate a fresh keypair from a cryptographically secure RNG
    pub fn generate_keypair<R: RngCore + CryptoRng>(rng: &mut R) -> Keypair {
        let signing = SigningKey::generate(rng);
        Keypair {
            private_key: signing.to_bytes(),
            public_key: signing.verifying_key().to_bytes(),
        }
    }

    fn signing_key(private_key: &[u8]) -> Result<SigningKey, SignatureError> {
        let seed: [u8; 32] = private_key.try_into().map_err(|_| {
            SignatureError::InvalidKey(format!(
                "Invalid Ed25519 private key length: expected 32, got {}",
                private_key.len()
            ))
        })?;
        Ok(SigningKey::from_bytes(&seed))
    }

    fn verifying_key(public_key: &[u8]) -> Result<VerifyingKey, SignatureError> {
        let bytes: [u8; 32] = public_key.try_into().map_err(|_| {
            SignatureError::InvalidKey(format!(
                "Invalid Ed25519 public key length: expected 32, got {}",
                public_key.len()
            ))
        })?;
        VerifyingKey::from_bytes(&bytes).map_err(|e| SignatureError::InvalidKey(e.to_string()))
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn sign(&self, private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let signing = Self::signing_key(private_key)?;
        Ok(signing.sign(message).to_bytes().to_vec())
    }

    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SignatureError> {
        let verifying = Self::verifying_key(public_key)?;
        if signature.len() != 64 {
            return Err(SignatureError::InvalidSignature(format!(
                "Invalid Ed25519 signature length: expected 64, got {}",
                signature.len()
            )));
        }
        let signature = Signature::from_slice(signature)
            .map_err(|e| SignatureError::InvalidSignature(e.to_string()))?;

        Ok(verifying.verify(message, &signature).is_ok())
    }

    fn signature_type(&self) -> SignatureType {
        SignatureType::Ed25519
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_sign_and_verify() {
        let scheme = Ed25519Scheme::new();
        let keys = Ed25519Scheme::generate_keypair(&mut OsRng);

        let signature = scheme.sign(&keys.private_key, b"report").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(scheme.verify(&keys.public_key, b"report", &signature).unwrap());
        assert!(!scheme.verify(&keys.public_key, b"tampered", &signature).unwrap());
    }

    #[test]
    fn test_wrong_key_does_not_verify() {
        let scheme = Ed25519Scheme::new();
        let alice = Ed25519Scheme::generate_keypair(&mut OsRng);
        let bob = Ed25519Scheme::generate_keypair(&mut OsRng);

        let signature = scheme.sign(&alice.private_key, b"report").unwrap();
        assert!(!scheme.verify(&bob.public_key, b"report", &signature).unwrap());
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        let scheme = Ed25519Scheme::new();
        let keys = Ed25519Scheme::generate_keypair(&mut OsRng);

        assert!(matches!(
            scheme.verify(&keys.public_key[..31], b"m", &[0u8; 64]),
            Err(SignatureError::InvalidKey(_))
        ));
        assert!(matches!(
            scheme.verify(&keys.public_key, b"m", &[0u8; 12]),
            Err(SignatureError::InvalidSignature(_))
        ));
        assert!(matches!(
            scheme.sign(&[1u8; 5], b"m"),
            Err(SignatureError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_public_key_serialization_round_trip() {
        let scheme = Ed25519Scheme::new();
        let keys = Ed25519Scheme::generate_keypair(&mut OsRng);

        let encoded = scheme.serialize_public_key(&keys.public_key);
        assert_eq!(encoded.len(), 64);
        assert_eq!(
            scheme.deserialize_public_key(&encoded).unwrap(),
            keys.public_key.to_vec()
        );
        assert!(scheme.deserialize_public_key("not-hex").is_err());
    }
}
