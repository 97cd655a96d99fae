//! File rotator: reconciles against an operator-managed YAML file. Grounded
//! on `examples/original_source/src/ssl.c:540-600`
//! (`load_tickets_file`/`ticket_file_updater`).

use std::path::Path;
use std::time::Duration;

use crate::store::TicketStore;
use crate::ticket;

/// Sentinel meaning "never loaded".
const NEVER_LOADED: i64 = 1;
/// Sentinel meaning "file currently missing".
const MISSING: i64 = 0;

/// One reconciliation tick: stat the file, and if its mtime changed since
/// the last successful load, parse and swap in the new contents. Returns
/// the mtime to remember for the next tick. I/O and parse failures leave
/// the store untouched and are logged.
pub fn tick(store: &TicketStore, path: &Path, last_mtime: i64) -> i64 {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            if last_mtime != MISSING {
                tracing::error!(path = %path.display(), error = %e, "cannot load session ticket secrets from file");
            }
            return MISSING;
        }
    };

    let mtime = mtime_seconds(&metadata);
    if mtime == last_mtime {
        return last_mtime;
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "cannot load session ticket secrets from file");
            return last_mtime;
        }
    };

    match ticket::parse_store(&contents) {
        Ok(keys) => {
            store.swap(keys);
            tracing::info!(path = %path.display(), "session ticket secrets have been (re)loaded");
            mtime
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "cannot load session ticket secrets from file");
            last_mtime
        }
    }
}

fn mtime_seconds(metadata: &std::fs::Metadata) -> i64 {
    use std::time::UNIX_EPOCH;
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Run the file rotator forever: poll every `interval`.
pub fn run(store: &TicketStore, path: &Path, interval: Duration) -> ! {
    let mut last_mtime = NEVER_LOADED;
    loop {
        last_mtime = tick(store, path, last_mtime);
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reload_on_mtime_change_replaces_store_entirely() {
        let dir = std::env::temp_dir().join(format!("tls-resumption-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tickets.yaml");

        let one_key = vec![crate::ticket::TicketKey::new(
            crate::crypto::Cipher::Aes256Cbc,
            crate::crypto::Mac::Sha256,
            100,
            200,
        )
        .unwrap()];
        std::fs::write(&path, ticket::serialize_store(&one_key).unwrap()).unwrap();

        let store = TicketStore::new();
        let mtime1 = tick(&store, &path, NEVER_LOADED);
        assert_eq!(store.len(), 1);
        assert_ne!(mtime1, NEVER_LOADED);

        // Unchanged mtime: no reload even if contents somehow differ.
        let mtime_same = tick(&store, &path, mtime1);
        assert_eq!(mtime_same, mtime1);
        assert_eq!(store.len(), 1);

        // Force mtime forward and rewrite with two keys.
        std::thread::sleep(Duration::from_millis(1100));
        let two_keys = vec![
            crate::ticket::TicketKey::new(crate::crypto::Cipher::Aes256Cbc, crate::crypto::Mac::Sha256, 300, 400).unwrap(),
            crate::ticket::TicketKey::new(crate::crypto::Cipher::Aes256Cbc, crate::crypto::Mac::Sha256, 500, 600).unwrap(),
        ];
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(ticket::serialize_store(&two_keys).unwrap().as_bytes()).unwrap();
        drop(f);

        let mtime2 = tick(&store, &path, mtime1);
        assert_ne!(mtime2, mtime1);
        assert_eq!(store.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_leaves_store_untouched() {
        let store = TicketStore::new();
        store.insert(crate::ticket::TicketKey::new(crate::crypto::Cipher::Aes256Cbc, crate::crypto::Mac::Sha256, 0, 100).unwrap());
        let missing = std::env::temp_dir().join("tls-resumption-definitely-missing.yaml");
        let mtime = tick(&store, &missing, NEVER_LOADED);
        assert_eq!(mtime, MISSING);
        assert_eq!(store.len(), 1);
    }
}
