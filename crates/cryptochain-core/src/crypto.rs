//! Hashing and signing services.
//!
//! `crypto_hash` stringifies every input as JSON, sorts the strings and hashes
//! them joined by a single space, so argument order never changes the digest.

use crate::error::Result;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// JSON text of a single hash input.
pub fn stringify<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Raw SHA-256 over the sorted, space-joined inputs.
pub fn crypto_hash_bytes<S: AsRef<str>>(inputs: &[S]) -> [u8; 32] {
    let mut parts: Vec<&str> = inputs.iter().map(AsRef::as_ref).collect();
    parts.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(parts.join(" ").as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Hex digest over already-stringified inputs.
pub fn crypto_hash<S: AsRef<str>>(inputs: &[S]) -> String {
    hex::encode(crypto_hash_bytes(inputs))
}

/// Hex digest of a single serializable value.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(crypto_hash(&[stringify(value)?]))
}

fn message_for<T: Serialize + ?Sized>(data: &T) -> Result<Message> {
    let digest = crypto_hash_bytes(&[stringify(data)?]);
    Ok(Message::from_digest_slice(&digest)?)
}

/// A secp256k1 key pair. The public key doubles as the wallet address.
#[derive(Clone, Debug)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
        Self { secret, public }
    }

    /// Compressed public key, hex encoded.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    /// Signs the hash of `data`; the signature is returned as compact hex.
    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let secp = Secp256k1::new();
        let message = message_for(data)?;
        let signature = secp.sign_ecdsa(&message, &self.secret);
        Ok(hex::encode(signature.serialize_compact()))
    }
}

/// Checks `signature` over `data` against a hex public key. Any malformed
/// key or signature verifies as `false`.
pub fn verify_signature<T: Serialize + ?Sized>(public_key: &str, data: &T, signature: &str) -> bool {
    let check = || -> Result<bool> {
        let public = PublicKey::from_slice(&hex::decode(public_key)?)?;
        let signature = Signature::from_compact(&hex::decode(signature)?)?;
        let message = message_for(data)?;
        let secp = Secp256k1::verification_only();
        Ok(secp.verify_ecdsa(&message, &signature, &public).is_ok())
    };
    check().unwrap_or(false)
}
