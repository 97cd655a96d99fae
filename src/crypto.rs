//! Cipher and MAC registry, and the encrypt-then-MAC construction used to
//! protect ticket contents.
//!
//! The original source resolves cipher and digest names through OpenSSL's
//! `EVP_get_cipherbyname`/`EVP_get_digestbyname`. This crate has no
//! dependency on OpenSSL, so it exposes a small closed registry instead —
//! the one pairing the specification names: AES-256-CBC for confidentiality,
//! SHA-256 for the keyed MAC.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac as _};
use sha2::Sha256;

use crate::error::ResumptionError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Symmetric cipher used for ticket confidentiality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cipher {
    /// AES-256 in CBC mode.
    Aes256Cbc,
}

impl Cipher {
    /// Key length in bytes.
    pub const fn key_len(self) -> usize {
        match self {
            Cipher::Aes256Cbc => 32,
        }
    }

    /// IV length in bytes.
    pub const fn iv_len(self) -> usize {
        match self {
            Cipher::Aes256Cbc => 16,
        }
    }

    /// OpenSSL-style canonical short name, as written to the wire.
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Cipher::Aes256Cbc => "AES-256-CBC",
        }
    }

    /// Resolve a cipher by its canonical short name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AES-256-CBC" | "aes-256-cbc" => Some(Cipher::Aes256Cbc),
            _ => None,
        }
    }
}

/// Keyed hash used for ticket integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mac {
    /// HMAC-SHA256.
    Sha256,
}

impl Mac {
    /// Block size in bytes (the spec calls this the MAC key length).
    pub const fn block_size(self) -> usize {
        match self {
            Mac::Sha256 => 64,
        }
    }

    /// Output (tag) length in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            Mac::Sha256 => 32,
        }
    }

    /// OpenSSL-style canonical short name.
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Mac::Sha256 => "SHA256",
        }
    }

    /// Resolve a MAC by its canonical short name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SHA256" | "sha256" | "SHA-256" => Some(Mac::Sha256),
            _ => None,
        }
    }
}

/// Encrypt `plaintext` with AES-256-CBC under `cipher_key`/`iv`, then append
/// an HMAC-SHA256 tag over `key_name || iv || ciphertext`, keyed by
/// `mac_key`. Returns `key_name || iv || ciphertext || tag`.
pub fn seal(
    key_name: &[u8],
    cipher_key: &[u8],
    mac_key: &[u8],
    iv: &[u8; 16],
    plaintext: &[u8],
) -> Result<Vec<u8>, ResumptionError> {
    let enc = Aes256CbcEnc::new_from_slices(cipher_key, iv)
        .map_err(|e| ResumptionError::Crypto(e.to_string()))?;
    let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut mac = HmacSha256::new_from_slice(mac_key)
        .map_err(|e| ResumptionError::Crypto(e.to_string()))?;
    mac.update(key_name);
    mac.update(iv);
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(key_name.len() + iv.len() + ciphertext.len() + tag.len());
    out.extend_from_slice(key_name);
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Verify the HMAC-SHA256 tag over `key_name || iv || ciphertext` and, if it
/// matches, decrypt `ciphertext` with AES-256-CBC under `cipher_key`/`iv`.
pub fn open(
    key_name: &[u8],
    cipher_key: &[u8],
    mac_key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, ResumptionError> {
    let mut mac = HmacSha256::new_from_slice(mac_key)
        .map_err(|e| ResumptionError::Crypto(e.to_string()))?;
    mac.update(key_name);
    mac.update(iv);
    mac.update(ciphertext);
    mac.verify_slice(tag)
        .map_err(|_| ResumptionError::Crypto("MAC verification failed".to_string()))?;

    let dec = Aes256CbcDec::new_from_slices(cipher_key, iv)
        .map_err(|e| ResumptionError::Crypto(e.to_string()))?;
    dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| ResumptionError::Crypto(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_and_mac_round_trip_names() {
        assert_eq!(Cipher::from_name("AES-256-CBC"), Some(Cipher::Aes256Cbc));
        assert_eq!(Cipher::Aes256Cbc.canonical_name(), "AES-256-CBC");
        assert_eq!(Mac::from_name("SHA256"), Some(Mac::Sha256));
        assert_eq!(Mac::Sha256.canonical_name(), "SHA256");
        assert_eq!(Cipher::from_name("bogus"), None);
        assert_eq!(Mac::from_name("bogus"), None);
    }

    #[test]
    fn seal_then_open_round_trips() {
        let key_name = [1u8; 16];
        let cipher_key = [2u8; 32];
        let mac_key = [3u8; 64];
        let iv = [4u8; 16];
        let plaintext = b"session state payload";

        let sealed = seal(&key_name, &cipher_key, &mac_key, &iv, plaintext).unwrap();
        let ciphertext_len = sealed.len() - key_name.len() - iv.len() - 32;
        let ciphertext = &sealed[key_name.len() + iv.len()..key_name.len() + iv.len() + ciphertext_len];
        let tag = &sealed[sealed.len() - 32..];

        let opened = open(&key_name, &cipher_key, &mac_key, &iv, ciphertext, tag).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let key_name = [1u8; 16];
        let cipher_key = [2u8; 32];
        let mac_key = [3u8; 64];
        let iv = [4u8; 16];
        let plaintext = b"session state payload";

        let sealed = seal(&key_name, &cipher_key, &mac_key, &iv, plaintext).unwrap();
        let ciphertext_len = sealed.len() - key_name.len() - iv.len() - 32;
        let ciphertext = &sealed[key_name.len() + iv.len()..key_name.len() + iv.len() + ciphertext_len];
        let mut tag = sealed[sealed.len() - 32..].to_vec();
        tag[0] ^= 0xff;

        assert!(open(&key_name, &cipher_key, &mac_key, &iv, ciphertext, &tag).is_err());
    }
}
