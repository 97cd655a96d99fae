//! The three ticket-key maintainer state machines: local, file, and
//! cluster. Exactly one runs per process, chosen at startup by
//! [`crate::config::ResumptionConfig`].
//!
//! Modeled as a sealed set of variants dispatched by pattern match, per
//! `SPEC_FULL.md` §9 — each variant owns its own parameters and exposes one
//! non-returning `run` method, matching the original source's function
//! pointer plus tagged-union-of-parameters design
//! (`examples/original_source/src/ssl.c:48-66`).

pub mod cluster;
pub mod file;
pub mod local;

use std::sync::Arc;
use std::time::Duration;

use crate::crypto::{Cipher, Mac};
use crate::store::TicketStore;

/// Which maintainer to run, and its parameters.
#[derive(Debug)]
pub enum Maintainer {
    /// Periodically mints new keys and drops expired ones, entirely
    /// in-process.
    Local {
        /// Cipher used for newly minted keys.
        cipher: Cipher,
        /// MAC used for newly minted keys.
        mac: Mac,
        /// Key lifetime in seconds.
        lifetime_s: u64,
    },
    /// Watches an operator-managed YAML file and swaps the store in on
    /// change.
    File {
        /// Path to the ticket-key YAML file.
        path: std::path::PathBuf,
    },
    /// Coordinates rotation against a shared memcached-protocol cache so
    /// every node in a fleet issues tickets other nodes can decrypt.
    Cluster {
        /// Cipher used for newly minted keys.
        cipher: Cipher,
        /// MAC used for newly minted keys.
        mac: Mac,
        /// Key lifetime in seconds.
        lifetime_s: u64,
        /// Cache host.
        host: String,
        /// Cache port.
        port: u16,
        /// Key prefix, e.g. `:h2o:ssl-resumption:`.
        prefix: String,
    },
}

impl Maintainer {
    /// Spawn the configured maintainer as a detached thread. Returns
    /// immediately; the thread runs for the lifetime of the process (there
    /// is no graceful shutdown protocol, per `SPEC_FULL.md` §5).
    pub fn spawn(self, store: Arc<TicketStore>) -> std::thread::JoinHandle<()> {
        match self {
            Maintainer::Local { cipher, mac, lifetime_s } => {
                std::thread::spawn(move || local::run(&store, cipher, mac, lifetime_s))
            }
            Maintainer::File { path } => std::thread::spawn(move || file::run(&store, &path, Duration::from_secs(10))),
            Maintainer::Cluster { cipher, mac, lifetime_s, host, port, prefix } => std::thread::spawn(move || {
                cluster::run(&store, cipher, mac, lifetime_s, &host, port, &prefix)
            }),
        }
    }
}

/// Construct the cache key used by the cluster rotator: `<prefix>session-tickets`.
pub(crate) fn cluster_cache_key(prefix: &str) -> String {
    format!("{prefix}session-tickets")
}
