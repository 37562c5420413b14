//! Hash-chain and signature primitives for the event log.

use anyhow::{anyhow, Result};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Chain hash of a record payload: `SHA-256(prev_hash || payload)`.
pub fn hash_record(prev_hash: &[u8; 32], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash);
    hasher.update(payload);
    hasher.finalize().into()
}

/// Ed25519 signature over a record's chain hash.
pub fn sign_record(signing_key: &SigningKey, record_hash: &[u8; 32]) -> [u8; 64] {
    signing_key.sign(record_hash).to_bytes()
}

pub fn verify_record_signature(
    verifying_key: &VerifyingKey,
    record_hash: &[u8; 32],
    signature: &[u8; 64],
) -> Result<()> {
    let sig = ed25519_dalek::Signature::from_bytes(signature);
    verifying_key
        .verify(record_hash, &sig)
        .map_err(|e| anyhow!("record signature verification failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_hash_depends_on_predecessor() {
        let a = hash_record(&[0u8; 32], b"payload");
        let b = hash_record(&[1u8; 32], b"payload");
        assert_ne!(a, b);
        assert_eq!(a, hash_record(&[0u8; 32], b"payload"));
    }

    #[test]
    fn signature_binds_to_hash() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let hash = hash_record(&[0u8; 32], b"event");
        let sig = sign_record(&key, &hash);
        assert!(verify_record_signature(&key.verifying_key(), &hash, &sig).is_ok());

        let other = hash_record(&hash, b"event");
        assert!(verify_record_signature(&key.verifying_key(), &other, &sig).is_err());
    }
}
