//! `crypto_secretbox`-compatible sealing on top of `xsalsa20poly1305`.
//!
//! `libsodium` (and thus the wire format this crate must interop with) puts
//! the 16-byte Poly1305 tag first, followed by ciphertext. The `RustCrypto`
//! AEAD convention used by the `xsalsa20poly1305` crate puts the tag last.
//! These two functions do the byte shuffle at the boundary so every other
//! module in this crate can work with the libsodium layout directly.

use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

use crate::error::{Result, TransportError};

/// Seals `plaintext` under `key`/`nonce`, returning `mac(16) || ciphertext`.
pub fn seal(key: &[u8; 32], nonce: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
    let nonce = Nonce::from_slice(nonce);
    let mut tag_last = cipher
        .encrypt(nonce, plaintext)
        .expect("xsalsa20poly1305 encryption does not fail");
    let tag_at = tag_last.len() - 16;
    let ciphertext = tag_last.split_off(tag_at);
    let mut out = Vec::with_capacity(sealed_len(plaintext.len()));
    out.extend_from_slice(&tag_last);
    out.extend_from_slice(&ciphertext);
    out
}

/// Opens a `mac(16) || ciphertext` blob sealed by [`seal`] (or by a
/// libsodium-compatible peer) under `key`/`nonce`.
pub fn open(key: &[u8; 32], nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < 16 {
        return Err(TransportError::Protocol("sealed box shorter than MAC".into()));
    }
    let (mac, ciphertext) = sealed.split_at(16);
    let mut tag_last = Vec::with_capacity(sealed.len());
    tag_last.extend_from_slice(ciphertext);
    tag_last.extend_from_slice(mac);

    let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
    let nonce = Nonce::from_slice(nonce);
    cipher
        .decrypt(nonce, tag_last.as_slice())
        .map_err(|_| TransportError::Protocol("secretbox authentication failed".into()))
}

fn sealed_len(plaintext_len: usize) -> usize {
    plaintext_len + 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = [7u8; 32];
        let nonce = [9u8; 24];
        let msg = b"hello box";
        let sealed = seal(&key, &nonce, msg);
        assert_eq!(sealed.len(), msg.len() + 16);
        let opened = open(&key, &nonce, &sealed).unwrap();
        assert_eq!(opened, msg);
    }

    #[test]
    fn open_rejects_tampered_ciphertext() {
        let key = [1u8; 32];
        let nonce = [2u8; 24];
        let mut sealed = seal(&key, &nonce, b"hello");
        let last = sealed.len() - 1;
        sealed[last] ^= 1;
        assert!(open(&key, &nonce, &sealed).is_err());
    }
}
