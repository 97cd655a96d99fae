//! Local rotator: periodically mints new keys and drops expired ones,
//! entirely in-process. Grounded on
//! `examples/original_source/src/ssl.c:228-277` (`ticket_internal_updater`).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::crypto::{Cipher, Mac};
use crate::store::TicketStore;
use crate::ticket::TicketKey;

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Run one maintenance cycle: mint a new key if the newest is due for
/// replacement, prune every expired key. Returns after a single pass so
/// tests can drive it deterministically; [`run`] loops this forever.
pub fn tick(store: &TicketStore, cipher: Cipher, mac: Mac, lifetime_s: u64, now: u64) {
    let (newest_not_before, oldest_not_after) = store.read(|keys| {
        (
            keys.first().map(|k| k.not_before()),
            keys.last().map(|k| k.not_after()),
        )
    });

    // Strictly less-than: at the exact cadence boundary (`not_before +
    // lifetime/4 == now`) the previous key is still considered current for
    // one more tick, matching the worked rotation-cadence example.
    let due = match newest_not_before {
        None => true,
        Some(nb) => nb + lifetime_s / 4 < now,
    };
    if due {
        match TicketKey::new(cipher, mac, now, now + lifetime_s - 1) {
            Ok(key) => store.insert(key),
            Err(e) => tracing::error!(error = %e, "failed to mint session ticket key"),
        }
    }

    if oldest_not_after.map(|na| na < now).unwrap_or(false) {
        while store.pop_expired(now).is_some() {}
    }
}

/// Run the local rotator forever: tick, then sleep ~120s minus 0-6s jitter
/// to stagger rotations among processes.
pub fn run(store: &TicketStore, cipher: Cipher, mac: Mac, lifetime_s: u64) -> ! {
    loop {
        tick(store, cipher, mac, lifetime_s, now());
        let jitter = rand::thread_rng().gen_range(0..7);
        std::thread::sleep(Duration::from_secs(120 - jitter));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_produces_one_key_with_expected_window() {
        let store = TicketStore::new();
        let now = 1_700_000_000u64;
        tick(&store, Cipher::Aes256Cbc, Mac::Sha256, 3600, now);

        store.read(|keys| {
            assert_eq!(keys.len(), 1);
            assert!(keys[0].not_before() <= now && now <= keys[0].not_before() + 1);
            assert_eq!(keys[0].not_after(), keys[0].not_before() + 3599);
        });
    }

    #[test]
    fn rotation_cadence_waits_for_quarter_lifetime() {
        let store = TicketStore::new();
        let now = 1_700_000_000u64;
        store.insert(TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, now - 900, now + 2699).unwrap());

        tick(&store, Cipher::Aes256Cbc, Mac::Sha256, 3600, now);
        assert_eq!(store.len(), 1, "not_before + lifetime/4 == now is not yet due");

        tick(&store, Cipher::Aes256Cbc, Mac::Sha256, 3600, now + 1);
        assert_eq!(store.len(), 2, "advancing past the cadence inserts at index 0");
        store.read(|keys| assert_eq!(keys[0].not_before(), now + 1));
    }

    #[test]
    fn prunes_every_expired_key_and_no_others() {
        let store = TicketStore::new();
        let now = 1_700_000_000u64;
        store.insert(TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, now - 5000, now - 100).unwrap());
        store.insert(TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, now - 4000, now - 50).unwrap());
        store.insert(TicketKey::new(Cipher::Aes256Cbc, Mac::Sha256, now - 100, now + 5000).unwrap());

        tick(&store, Cipher::Aes256Cbc, Mac::Sha256, 3600, now);

        store.read(|keys| {
            assert!(keys.iter().all(|k| k.not_after() >= now));
        });
    }
}
