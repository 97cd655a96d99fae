//! Cluster rotator: CAS-coordinated rotation against a shared
//! memcached-protocol cache, so every node in a fleet issues tickets other
//! nodes can decrypt. Grounded on
//! `examples/original_source/src/ssl.c:445-538`
//! (`ticket_memcached_update_tickets`/`ticket_memcached_updater`).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::cache::{CacheClient, GetResult, McMemcachedClient};
use crate::crypto::{Cipher, Mac};
use crate::error::ResumptionError;
use crate::store::TicketStore;
use crate::ticket::{self, TicketKey};

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Scan newer-first for a currently encryption-eligible key (mirrors the
/// handshake callback's encrypt-path search, `SPEC_FULL.md` §4.C).
fn has_valid_encryption_key(keys: &[TicketKey], now: u64) -> Option<&TicketKey> {
    for key in keys {
        if key.not_before() <= now {
            return if now <= key.not_after() { Some(key) } else { None };
        }
    }
    None
}

/// One CAS round. Returns `Ok(true)` ("retry"): the caller should
/// immediately re-reconcile. Returns `Ok(false)`: rotation wasn't due, the
/// fetched sequence was installed locally, sleep before the next round.
pub fn reconcile(
    store: &TicketStore,
    cache: &dyn CacheClient,
    cache_key: &str,
    cipher: Cipher,
    mac: Mac,
    lifetime_s: u64,
    now: u64,
) -> Result<bool, ResumptionError> {
    let (mut fetched, cas) = match cache.get(cache_key)? {
        GetResult::NotFound => (Vec::new(), None),
        GetResult::Found(bytes, cas) => {
            let document = String::from_utf8(bytes)
                .map_err(|e| ResumptionError::MalformedDocument(e.to_string()))?;
            let keys = ticket::parse_store(&document)?;
            (keys, Some(cas))
        }
    };
    fetched.sort_by(|a, b| {
        b.not_before()
            .cmp(&a.not_before())
            .then_with(|| a.name().cmp(b.name()))
    });

    let has_valid = has_valid_encryption_key(&fetched, now);
    let rotation_due = match has_valid {
        Some(key) => key.not_before() + lifetime_s / 4 < now,
        None => true,
    };

    if !rotation_due {
        store.swap(fetched);
        return Ok(false);
    }

    // The 60-second offset prevents a newly minted key from immediately
    // supplanting a still-usable peer key during staggered fleet rotation
    // (spec.md §9, Open Question (b) — preserved from the original source
    // without further justification there).
    let not_before = if has_valid.is_some() { now + 60 } else { now };
    let new_key = TicketKey::new(cipher, mac, not_before, not_before + lifetime_s)?;
    fetched.insert(0, new_key);
    let serialized = ticket::serialize_store(&fetched)?;

    // The write's own success or failure is ignored at the local level —
    // we always return "retry" so the next round re-reads the
    // authoritative state, which is how a losing CAS converges.
    let write_result = match cas {
        None => cache.add(cache_key, serialized.as_bytes(), lifetime_s as u32),
        Some(token) => cache.set(cache_key, serialized.as_bytes(), token, lifetime_s as u32),
    };
    if let Err(e) = write_result {
        tracing::debug!(error = %e, "ticket-key cache write lost the race; will re-read");
    }

    Ok(true)
}

/// Run the cluster rotator forever against a live memcached connection at
/// `host:port`.
pub fn run(
    store: &TicketStore,
    cipher: Cipher,
    mac: Mac,
    lifetime_s: u64,
    host: &str,
    port: u16,
    prefix: &str,
) -> ! {
    let cache_key = super::cluster_cache_key(prefix);
    let mut logged_connect_failure = false;

    loop {
        let client = match McMemcachedClient::connect(host, port) {
            Ok(c) => {
                logged_connect_failure = false;
                c
            }
            Err(e) => {
                if !logged_connect_failure {
                    tracing::error!(host, port, error = %e, "failed to connect to ticket-key cache");
                    logged_connect_failure = true;
                }
                std::thread::sleep(Duration::from_secs(10));
                continue;
            }
        };

        loop {
            match reconcile(store, &client, &cache_key, cipher, mac, lifetime_s, now()) {
                Ok(true) => continue,
                Ok(false) => {
                    std::thread::sleep(Duration::from_secs(60));
                }
                Err(e) => {
                    tracing::error!(error = %e, "ticket-key cache protocol error; reconnecting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fake::FakeCache;

    #[test]
    fn first_reconcile_on_empty_cache_mints_and_requests_retry() {
        let store = TicketStore::new();
        let cache = FakeCache::new();
        let retry = reconcile(&store, &cache, "h2o:session-tickets", Cipher::Aes256Cbc, Mac::Sha256, 3600, 1_700_000_000).unwrap();
        assert!(retry);
        // Local store is not installed on the minting round; only on the
        // "not yet due" branch.
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn second_reconcile_installs_the_minted_key_locally() {
        let store = TicketStore::new();
        let cache = FakeCache::new();
        let now = 1_700_000_000;
        reconcile(&store, &cache, "h2o:session-tickets", Cipher::Aes256Cbc, Mac::Sha256, 3600, now).unwrap();
        let retry = reconcile(&store, &cache, "h2o:session-tickets", Cipher::Aes256Cbc, Mac::Sha256, 3600, now).unwrap();
        assert!(!retry);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn two_peers_converge_on_one_winning_key() {
        let cache = FakeCache::new();
        let store_a = TicketStore::new();
        let store_b = TicketStore::new();
        let now = 1_700_000_000;

        // A finds the cache empty, mints, and wins the ADD.
        reconcile(&store_a, &cache, "h2o:session-tickets", Cipher::Aes256Cbc, Mac::Sha256, 3600, now).unwrap();
        // B observes A's key via GET and installs it without minting of its own.
        reconcile(&store_b, &cache, "h2o:session-tickets", Cipher::Aes256Cbc, Mac::Sha256, 3600, now).unwrap();
        // A re-reads on its next round and installs its own winning key locally.
        reconcile(&store_a, &cache, "h2o:session-tickets", Cipher::Aes256Cbc, Mac::Sha256, 3600, now).unwrap();

        let name_a = store_a.read(|keys| *keys[0].name());
        let name_b = store_b.read(|keys| *keys[0].name());
        assert_eq!(name_a, name_b);
        assert_eq!(store_a.len(), 1);
        assert_eq!(store_b.len(), 1);
    }
}
