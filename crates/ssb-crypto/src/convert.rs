//! Ed25519 -> Curve25519 key conversion.
//!
//! The secret-handshake uses X25519 Diffie-Hellman for its long-term keys,
//! but identities in this system are Ed25519 signing keys. Every party
//! derives its handshake key pair from its signing key pair using the same
//! birational map `libsodium`'s `crypto_sign_ed25519_*_to_curve25519`
//! functions use, so two implementations with the same Ed25519 identity
//! always agree on the derived Curve25519 keys.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{CryptoError, Result};

/// Derives the X25519 static secret from an Ed25519 signing seed.
///
/// Matches libsodium: the scalar is the first 32 bytes of `SHA-512(seed)`.
/// `x25519_dalek::StaticSecret` clamps the bytes itself, so whether or not
/// this function's output is already clamped does not matter.
pub fn ed25519_seed_to_x25519_secret(seed: &[u8; 32]) -> StaticSecret {
    let digest = Sha512::digest(seed);
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&digest[..32]);
    StaticSecret::from(scalar)
}

/// Derives the X25519 public key from an Ed25519 verifying key's raw bytes,
/// via the standard Edwards -> Montgomery birational map.
pub fn ed25519_public_to_x25519(public: &[u8; 32]) -> Result<PublicKey> {
    let compressed = CompressedEdwardsY(*public);
    let point = compressed
        .decompress()
        .ok_or_else(|| CryptoError::InvalidKey("not a valid Ed25519 point".into()))?;
    let montgomery = point.to_montgomery();
    Ok(PublicKey::from(montgomery.to_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::KeyPair;

    #[test]
    fn conversion_is_deterministic() {
        let kp = KeyPair::generate();
        let seed = kp.to_secret_bytes();
        let a = ed25519_seed_to_x25519_secret(&seed);
        let b = ed25519_seed_to_x25519_secret(&seed);
        assert_eq!(a.to_bytes(), b.to_bytes());

        let pub_a = ed25519_public_to_x25519(&kp.public_bytes()).unwrap();
        let pub_b = ed25519_public_to_x25519(&kp.public_bytes()).unwrap();
        assert_eq!(pub_a.as_bytes(), pub_b.as_bytes());
    }

    #[test]
    fn derived_keypair_agrees_with_itself_on_a_shared_secret() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();

        let s1 = ed25519_seed_to_x25519_secret(&kp1.to_secret_bytes());
        let s2 = ed25519_seed_to_x25519_secret(&kp2.to_secret_bytes());
        let p1 = ed25519_public_to_x25519(&kp1.public_bytes()).unwrap();
        let p2 = ed25519_public_to_x25519(&kp2.public_bytes()).unwrap();

        let shared_1 = s1.diffie_hellman(&p2);
        let shared_2 = s2.diffie_hellman(&p1);
        assert_eq!(shared_1.as_bytes(), shared_2.as_bytes());
    }
}
