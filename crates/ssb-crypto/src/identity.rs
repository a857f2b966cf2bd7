//! Ed25519 identity: keypair generation, canonical message signing and
//! verification, and the `@...ed25519` string form.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use ssb_types::canonical::render_unsigned;
use ssb_types::{Identity, MessageId};

use crate::error::{CryptoError, Result};
use crate::hash::sha256;

/// A local Ed25519 keypair capable of signing new messages.
///
/// The signing key's bytes are zeroized on drop; nothing in this crate logs
/// or serializes them except [`KeyPair::to_secret_bytes`] for the on-disk
/// secret file.
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generates a fresh random keypair.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self { signing }
    }

    /// Reconstructs a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// The 32-byte seed backing this keypair.
    pub fn to_secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    /// The 32-byte public key.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// The `ed25519-dalek` verifying key, for use by the handshake's
    /// Curve25519 conversion.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// The canonical `@base64(pubkey).ed25519` identity string.
    pub fn identity(&self) -> Identity {
        identity_from_public(&self.public_bytes())
    }

    /// Signs `unsigned_bytes` (the canonical-JSON rendering of a message
    /// without its `signature` field) and returns `base64(sig).sig.ed25519`.
    pub fn sign(&self, unsigned_bytes: &[u8]) -> String {
        let sig: Signature = self.signing.sign(unsigned_bytes);
        format!("{}.sig.ed25519", STANDARD.encode(sig.to_bytes()))
    }

    /// Convenience wrapper: signs the canonical rendering of a message's
    /// fields directly.
    pub fn sign_message(
        &self,
        previous: Option<&MessageId>,
        sequence: u64,
        timestamp: i64,
        content: &serde_json::Value,
    ) -> String {
        let author = self.identity();
        let unsigned = render_unsigned(previous, &author, sequence, timestamp, content);
        self.sign(unsigned.as_bytes())
    }

    /// Signs `msg` and returns the raw 64-byte signature, with none of the
    /// `base64(...).sig.ed25519` wrapping `sign` applies. Used by the
    /// handshake, which signs fixed-shape byte strings rather than canonical
    /// message renderings.
    pub fn sign_raw(&self, msg: &[u8]) -> [u8; 64] {
        let sig: Signature = self.signing.sign(msg);
        sig.to_bytes()
    }
}

/// Builds the `@...ed25519` identity string for a raw 32-byte public key.
pub fn identity_from_public(public: &[u8; 32]) -> Identity {
    Identity::from_raw(format!("@{}.ed25519", STANDARD.encode(public)))
}

/// Decodes an [`Identity`]'s base64 body into a raw 32-byte Ed25519 public key.
pub fn public_bytes_from_identity(id: &Identity) -> Result<[u8; 32]> {
    let body = id
        .base64_body()
        .ok_or_else(|| CryptoError::InvalidKey(format!("malformed identity: {id}")))?;
    let raw = STANDARD
        .decode(body)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    raw.try_into()
        .map_err(|_| CryptoError::InvalidKey("public key is not 32 bytes".into()))
}

/// Verifies `signature` (the `base64(sig).sig.ed25519` string stored on a
/// [`ssb_types::message::SignedMessage`]) against `unsigned_bytes` under `author`.
pub fn verify(author: &Identity, unsigned_bytes: &[u8], signature: &str) -> Result<()> {
    let sig_b64 = signature
        .strip_suffix(".sig.ed25519")
        .ok_or_else(|| CryptoError::MalformedSignature(signature.to_string()))?;
    let sig_bytes = STANDARD
        .decode(sig_b64)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::MalformedSignature("signature is not 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_array);

    let public = public_bytes_from_identity(author)?;
    let verifying = VerifyingKey::from_bytes(&public)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    verifying
        .verify(unsigned_bytes, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Verifies a raw 64-byte signature (as produced by [`KeyPair::sign_raw`])
/// against `msg` under a raw 32-byte Ed25519 public key.
pub fn verify_raw(public: &[u8; 32], msg: &[u8], sig: &[u8; 64]) -> Result<()> {
    let verifying = VerifyingKey::from_bytes(public).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let signature = Signature::from_bytes(sig);
    verifying
        .verify(msg, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// The `sha256(...)."sha256"` message-id hash, computed over the full signed
/// rendering of a message (see [`ssb_types::canonical::render_signed`]).
pub fn message_id_for(signed_json: &[u8]) -> MessageId {
    let digest = sha256(signed_json);
    MessageId::from_raw(format!("%{}.sha256", STANDARD.encode(digest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Testable Property S1: fixed seed -> fixed identity string.
    #[test]
    fn known_seed_produces_known_identity() {
        let seed_b64 = "Mz2qkNOP2K6upnqibWrR+z8pVUI1ReA1MLc7QMtF2qQ=";
        let seed_bytes = STANDARD.decode(seed_b64).unwrap();
        let seed: [u8; 32] = seed_bytes.try_into().unwrap();
        let kp = KeyPair::from_seed(&seed);
        assert_eq!(
            kp.identity().as_str(),
            "@I/4cyN/jPBbDsikbHzAEvmaYlaJK33lW3UhWjNXjyrU=.ed25519"
        );
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let kp = KeyPair::generate();
        let msg = b"hello tangle";
        let sig = kp.sign(msg);
        verify(&kp.identity(), msg, &sig).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"hello");
        assert!(verify(&kp.identity(), b"goodbye", &sig).is_err());
    }
}
