//! The immutable ticket-key record and its hex/YAML codec.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{Cipher, Mac};
use crate::error::ResumptionError;

/// 16-byte public identifier of a ticket key, sent in the clear as the
/// ticket prefix so the decrypting node selects the right secret.
pub type KeyName = [u8; 16];

/// One symmetric secret used to encrypt/MAC outgoing tickets and
/// decrypt/verify incoming ones.
///
/// `cipher_key` and `mac_key` are held in a [`Zeroizing`] buffer so they are
/// overwritten with zeros when the record is dropped, matching the original
/// source's `h2o_mem_set_secure` call before `free()`.
#[derive(Debug, Clone)]
pub struct TicketKey {
    name: KeyName,
    cipher: Cipher,
    mac: Mac,
    cipher_key: Zeroizing<Vec<u8>>,
    mac_key: Zeroizing<Vec<u8>>,
    not_before: u64,
    not_after: u64,
}

impl TicketKey {
    /// Allocate a new ticket key. If `fill` is set, `name`, `cipher_key`, and
    /// `mac_key` are filled from a cryptographic RNG; otherwise they must be
    /// supplied via [`TicketKey::from_parts`].
    pub fn new(
        cipher: Cipher,
        mac: Mac,
        not_before: u64,
        not_after: u64,
    ) -> Result<Self, ResumptionError> {
        let mut name = [0u8; 16];
        let mut cipher_key = vec![0u8; cipher.key_len()];
        let mut mac_key = vec![0u8; mac.block_size()];

        let mut rng = rand::rngs::OsRng;
        rng.try_fill_bytes(&mut name)
            .map_err(|e| ResumptionError::Rng(e.to_string()))?;
        rng.try_fill_bytes(&mut cipher_key)
            .map_err(|e| ResumptionError::Rng(e.to_string()))?;
        rng.try_fill_bytes(&mut mac_key)
            .map_err(|e| ResumptionError::Rng(e.to_string()))?;

        Ok(TicketKey {
            name,
            cipher,
            mac,
            cipher_key: Zeroizing::new(cipher_key),
            mac_key: Zeroizing::new(mac_key),
            not_before,
            not_after,
        })
    }

    /// Construct a ticket key from caller-supplied secret material (used by
    /// the deserializer, which reads secrets off the wire rather than
    /// generating them).
    pub fn from_parts(
        name: KeyName,
        cipher: Cipher,
        cipher_key: Vec<u8>,
        mac: Mac,
        mac_key: Vec<u8>,
        not_before: u64,
        not_after: u64,
    ) -> Result<Self, ResumptionError> {
        if cipher_key.len() != cipher.key_len() {
            return Err(ResumptionError::MalformedDocument(format!(
                "cipher key length mismatch: expected {}, got {}",
                cipher.key_len(),
                cipher_key.len()
            )));
        }
        if mac_key.len() != mac.block_size() {
            return Err(ResumptionError::MalformedDocument(format!(
                "mac key length mismatch: expected {}, got {}",
                mac.block_size(),
                mac_key.len()
            )));
        }
        if not_before > not_after {
            return Err(ResumptionError::MalformedDocument(
                "not_after is not equal to or greater than not_before".to_string(),
            ));
        }
        Ok(TicketKey {
            name,
            cipher,
            mac,
            cipher_key: Zeroizing::new(cipher_key),
            mac_key: Zeroizing::new(mac_key),
            not_before,
            not_after,
        })
    }

    /// 16-byte public identifier.
    pub fn name(&self) -> &KeyName {
        &self.name
    }

    /// Configured cipher.
    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    /// Configured MAC.
    pub fn mac(&self) -> Mac {
        self.mac
    }

    /// Cipher secret.
    pub fn cipher_key(&self) -> &[u8] {
        &self.cipher_key
    }

    /// MAC secret.
    pub fn mac_key(&self) -> &[u8] {
        &self.mac_key
    }

    /// Start of the validity window (Unix epoch seconds).
    pub fn not_before(&self) -> u64 {
        self.not_before
    }

    /// End of the validity window (Unix epoch seconds).
    pub fn not_after(&self) -> u64 {
        self.not_after
    }

    /// True if `now` falls within `[not_before, not_after]`.
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Encrypt `plaintext` using this key's secrets, returning
    /// `name || iv || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, ResumptionError> {
        let mut iv = [0u8; 16];
        rand::rngs::OsRng
            .try_fill_bytes(&mut iv)
            .map_err(|e| ResumptionError::Rng(e.to_string()))?;
        crate::crypto::seal(&self.name, &self.cipher_key, &self.mac_key, &iv, plaintext)
    }

    /// Decrypt a blob produced by [`TicketKey::encrypt`] (or the handshake
    /// callback's MAC/cipher contexts), given the key name has already been
    /// matched against the store.
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, ResumptionError> {
        crate::crypto::open(&self.name, &self.cipher_key, &self.mac_key, iv, ciphertext, tag)
    }
}

/// Wire/file representation of one ticket key, matching the spec's YAML
/// mapping: `name`, `cipher`, `hash`, `key`, `not_before`, `not_after`.
#[derive(Debug, Serialize, Deserialize)]
struct TicketKeyWire {
    name: String,
    cipher: String,
    hash: String,
    key: String,
    not_before: u64,
    not_after: u64,
}

impl TicketKey {
    /// Serialize this key into its wire/YAML-mapping representation.
    fn to_wire(&self) -> TicketKeyWire {
        let mut key_hex = hex::encode(&*self.cipher_key);
        key_hex.push_str(&hex::encode(&*self.mac_key));
        TicketKeyWire {
            name: hex::encode(self.name),
            cipher: self.cipher.canonical_name().to_string(),
            hash: self.mac.canonical_name().to_string(),
            key: key_hex,
            not_before: self.not_before,
            not_after: self.not_after,
        }
    }

    fn from_wire(wire: &TicketKeyWire) -> Result<Self, String> {
        if wire.name.len() != 32 {
            return Err("length of `name` attribute is not 32 bytes".to_string());
        }
        let name_bytes =
            hex::decode(&wire.name).map_err(|_| "failed to decode the hex-encoded name".to_string())?;
        let mut name = [0u8; 16];
        name.copy_from_slice(&name_bytes);

        let cipher = Cipher::from_name(&wire.cipher)
            .ok_or_else(|| "cannot find the named cipher algorithm".to_string())?;
        let mac =
            Mac::from_name(&wire.hash).ok_or_else(|| "cannot find the named hash algorithm".to_string())?;

        let key_len = cipher.key_len() + mac.block_size();
        if wire.key.len() != key_len * 2 {
            return Err(format!(
                "length of the `key` attribute is incorrect (is {}, must be {})",
                wire.key.len(),
                key_len * 2
            ));
        }
        let key_bytes =
            hex::decode(&wire.key).map_err(|_| "failed to decode the hex-encoded key".to_string())?;
        let cipher_key = key_bytes[..cipher.key_len()].to_vec();
        let mac_key = key_bytes[cipher.key_len()..].to_vec();

        if wire.not_before > wire.not_after {
            return Err("`not_after` is not equal to or greater than `not_before`".to_string());
        }

        TicketKey::from_parts(name, cipher, cipher_key, mac, mac_key, wire.not_before, wire.not_after)
            .map_err(|e| e.to_string())
    }
}

/// Serialize a sequence of ticket keys into the YAML document format.
pub fn serialize_store(keys: &[TicketKey]) -> Result<String, ResumptionError> {
    let wire: Vec<TicketKeyWire> = keys.iter().map(TicketKey::to_wire).collect();
    serde_yaml::to_string(&wire).map_err(|e| ResumptionError::MalformedDocument(e.to_string()))
}

/// Parse a YAML document (a sequence of ticket-key mappings) into ticket
/// keys. Does not sort the result; callers apply the store's total order.
pub fn parse_store(document: &str) -> Result<Vec<TicketKey>, ResumptionError> {
    let wire: Vec<TicketKeyWire> = serde_yaml::from_str(document).map_err(|e| {
        ResumptionError::MalformedDocument(format!("root element is not a sequence of mappings: {e}"))
    })?;

    let mut keys = Vec::with_capacity(wire.len());
    for (index, entry) in wire.iter().enumerate() {
        let key = TicketKey::from_wire(entry).map_err(|reason| ResumptionError::Parse { index, reason })?;
        keys.push(key);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ticket_has_correct_secret_lengths() {
        let key = TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, 0, 100).unwrap();
        assert_eq!(key.cipher_key().len(), 32);
        assert_eq!(key.mac_key().len(), 64);
    }

    #[test]
    fn round_trip_serialize_parse() {
        let keys = vec![
            TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, 100, 200).unwrap(),
            TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, 50, 150).unwrap(),
        ];
        let doc = serialize_store(&keys).unwrap();
        let parsed = parse_store(&doc).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name(), keys[0].name());
        assert_eq!(parsed[0].cipher_key(), keys[0].cipher_key());
        assert_eq!(parsed[0].mac_key(), keys[0].mac_key());
        assert_eq!(parsed[1].not_before(), keys[1].not_before());
    }

    #[test]
    fn rejects_bad_name_length() {
        let doc = "- name: deadbeef\n  cipher: AES-256-CBC\n  hash: SHA256\n  key: aa\n  not_before: 0\n  not_after: 1\n";
        let err = parse_store(doc).unwrap_err();
        assert!(matches!(err, ResumptionError::Parse { index: 0, .. }));
    }

    #[test]
    fn rejects_unknown_cipher() {
        let key = TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, 0, 1).unwrap();
        let mut wire = key.to_wire();
        wire.cipher = "ROT13".to_string();
        let doc = serde_yaml::to_string(&vec![wire]).unwrap();
        let err = parse_store(&doc).unwrap_err();
        assert!(matches!(err, ResumptionError::Parse { .. }));
    }

    #[test]
    fn rejects_inverted_validity_window() {
        assert!(TicketKey::from_parts([0u8; 16], Cipher::Aes256Cbc, vec![0u8; 32], Mac::Sha256, vec![0u8; 64], 100, 50).is_err());
    }
}
