//! The per-handshake ticket-key encrypt/decrypt hook.
//!
//! Mirrors the shape of OpenSSL's `SSL_CTX_set_tlsext_ticket_key_cb`
//! contract: `(key_name, iv, cipher_ctx, mac_ctx, enc) -> status`. Since this
//! crate owns no TLS library, the "cipher/MAC context" parameters are
//! represented as out-parameters the caller initializes with the chosen
//! key's secrets, rather than opaque library handles.

use rand::RngCore;

use crate::crypto::{Cipher, Mac};
use crate::error::ResumptionError;
use crate::store::TicketStore;
use crate::ticket::{KeyName, TicketKey};

/// Result of a handshake-time ticket-key lookup, mirroring the TLS
/// library's four possible callback return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    /// Key found and used; no renewal requested.
    Ok,
    /// Key found, used, but not the newest — caller should request the TLS
    /// layer to issue a freshly encrypted ticket with the current newest
    /// key.
    OkRenew,
    /// Key name not found in the store; handshake proceeds as full
    /// handshake.
    NotFound,
}

/// Cipher/MAC material the callback hands back to the caller for this
/// handshake: the secrets to initialize the TLS library's cipher and MAC
/// contexts with, plus (on encrypt) the freshly generated IV and key name.
#[derive(Debug, Clone)]
pub struct HandshakeKeyMaterial {
    /// Key name written into the outgoing ticket (encrypt) or matched
    /// against the incoming one (decrypt).
    pub key_name: KeyName,
    /// IV to initialize the cipher context with.
    pub iv: Vec<u8>,
    /// Cipher secret to initialize the cipher context with.
    pub cipher_key: Vec<u8>,
    /// Cipher algorithm.
    pub cipher: Cipher,
    /// MAC secret to initialize the MAC context with.
    pub mac_key: Vec<u8>,
    /// MAC algorithm.
    pub mac: Mac,
}

/// The handshake callback, closing over the process-wide ticket store.
pub struct TicketCallback<'a> {
    store: &'a TicketStore,
}

impl<'a> TicketCallback<'a> {
    /// Bind the callback to a store.
    pub fn new(store: &'a TicketStore) -> Self {
        TicketCallback { store }
    }

    /// Encrypt path: find the encryption-eligible key, or synthesize a
    /// single-use ephemeral key if none is eligible. Holds the store's
    /// shared lock for the full call, including the ephemeral-key fallback
    /// (the ephemeral key is never installed in the store, so this is
    /// safe).
    pub fn encrypt(&self, now: u64) -> Result<HandshakeKeyMaterial, ResumptionError> {
        let mut iv = [0u8; 16];
        rand::rngs::OsRng
            .try_fill_bytes(&mut iv)
            .map_err(|e| ResumptionError::Rng(e.to_string()))?;

        self.store.read(|keys| -> Result<HandshakeKeyMaterial, ResumptionError> {
            if let Some(key) = find_encryption_eligible(keys, now) {
                return Ok(material_from_key(key, iv));
            }

            // No eligible key: synthesize a single-use ephemeral key.
            // Rationale (preserved from the original source): returning
            // failure from this callback crashes some TLS libraries, so we
            // keep the handshake working at the cost of issuing a ticket
            // only this process can ever decrypt.
            let ephemeral = TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, 0, u64::MAX)?;
            Ok(material_from_key(&ephemeral, iv))
        })
    }

    /// Decrypt path: linear search by key name.
    pub fn decrypt(&self, key_name: &KeyName) -> (CallbackStatus, Option<HandshakeKeyMaterial>) {
        self.store.read(|keys| {
            match keys.iter().position(|k| k.name() == key_name) {
                None => (CallbackStatus::NotFound, None),
                Some(idx) => {
                    let key = &keys[idx];
                    let material = HandshakeKeyMaterial {
                        key_name: *key.name(),
                        iv: Vec::new(),
                        cipher_key: key.cipher_key().to_vec(),
                        cipher: key.cipher(),
                        mac_key: key.mac_key().to_vec(),
                        mac: key.mac(),
                    };
                    let status = if idx == 0 { CallbackStatus::Ok } else { CallbackStatus::OkRenew };
                    (status, Some(material))
                }
            }
        })
    }
}

fn material_from_key(key: &TicketKey, iv: [u8; 16]) -> HandshakeKeyMaterial {
    HandshakeKeyMaterial {
        key_name: *key.name(),
        iv: iv.to_vec(),
        cipher_key: key.cipher_key().to_vec(),
        cipher: key.cipher(),
        mac_key: key.mac_key().to_vec(),
        mac: key.mac(),
    }
}

/// Scan the store newer-first for the first key whose `not_before <= now`.
/// If that key is still valid (`now <= not_after`), it is the answer;
/// otherwise there is no eligible key (a newer one would have already
/// matched, and this one has expired).
fn find_encryption_eligible(keys: &[TicketKey], now: u64) -> Option<&TicketKey> {
    for key in keys {
        if key.not_before() <= now {
            return if now <= key.not_after() { Some(key) } else { None };
        }
    }
    None
}
