//! Hash and HMAC convenience functions used by message ids, the index
//! `_hthash`/`seq2key` derivations, and the handshake.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-1 digest of `data`, used only by `seq2key`'s legacy index key derivation.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// HMAC-SHA512 (full 64-byte MAC) truncated to the first 32 bytes, keyed by
/// `key`. The secret-handshake challenge messages use this truncated form,
/// not HMAC-SHA512/256 (a distinct, differently-initialized hash).
pub fn hmac_sha512_32(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let full = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&full[..32]);
    out
}

/// HMAC-SHA512, full 24-byte slice used to derive box-stream nonces.
pub fn hmac_sha512_24(key: &[u8], data: &[u8]) -> [u8; 24] {
    let full = hmac_sha512_32(key, data);
    let mut out = [0u8; 24];
    out.copy_from_slice(&full[..24]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_32_bytes_and_deterministic() {
        assert_eq!(sha256(b"abc"), sha256(b"abc"));
        assert_eq!(sha256(b"abc").len(), 32);
    }
}
