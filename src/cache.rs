//! Distributed cache client contract, plus session-ID cache-resumption
//! glue.
//!
//! Two independent things share this module because they share a
//! collaborator: the cluster ticket rotator (`rotator::cluster`) and the
//! session-ID cache glue both talk to the same kind of external store (a
//! memcached-protocol cache reachable by host/port), namespaced by a
//! configured key prefix.

use std::fmt;

use crate::error::ResumptionError;

/// Opaque CAS token returned by a prior `get`, required by `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasToken(pub u64);

/// Result of a `get` against the cache.
#[derive(Debug, Clone)]
pub enum GetResult {
    /// Key present; value and its CAS token.
    Found(Vec<u8>, CasToken),
    /// Key absent.
    NotFound,
}

/// The distributed cache, modeled as a connection-oriented key/value store
/// with compare-and-swap — the memcached binary protocol's `GET`, `ADD`,
/// `SET` operations. Modeled as a trait (matching the teacher's
/// `HealthCheck`/`Migration` pluggable-backend idiom) so the cluster rotator
/// can be exercised against an in-memory fake without a running memcached
/// server.
pub trait CacheClient: Send + Sync {
    /// Fetch `key`.
    fn get(&self, key: &str) -> Result<GetResult, ResumptionError>;

    /// Insert `key` with `value` iff absent. `expiry` is seconds-to-live.
    fn add(&self, key: &str, value: &[u8], expiry: u32) -> Result<(), ResumptionError>;

    /// Replace `key` with `value`, conditioned on `cas` matching the
    /// server's current version. `expiry` is seconds-to-live.
    fn set(&self, key: &str, value: &[u8], cas: CasToken, expiry: u32) -> Result<(), ResumptionError>;
}

/// Production [`CacheClient`] backed by the `memcache` crate, the closest
/// published Rust equivalent to the original source's `yrmcds` dependency.
pub struct McMemcachedClient {
    client: memcache::Client,
}

impl fmt::Debug for McMemcachedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McMemcachedClient").finish_non_exhaustive()
    }
}

impl McMemcachedClient {
    /// Connect to a single memcached node at `host:port`.
    pub fn connect(host: &str, port: u16) -> Result<Self, ResumptionError> {
        let url = format!("memcache://{host}:{port}");
        let client = memcache::Client::connect(url.as_str())
            .map_err(|e| ResumptionError::TransientIo(e.to_string()))?;
        Ok(McMemcachedClient { client })
    }
}

impl CacheClient for McMemcachedClient {
    fn get(&self, key: &str) -> Result<GetResult, ResumptionError> {
        let mut results = self
            .client
            .gets::<(Vec<u8>, u32, Option<u64>)>(&[key])
            .map_err(|e| ResumptionError::CacheProtocol(e.to_string()))?;
        match results.remove(key) {
            Some((value, _flags, Some(cas))) => Ok(GetResult::Found(value, CasToken(cas))),
            Some((value, _flags, None)) => Ok(GetResult::Found(value, CasToken(0))),
            None => Ok(GetResult::NotFound),
        }
    }

    fn add(&self, key: &str, value: &[u8], expiry: u32) -> Result<(), ResumptionError> {
        self.client
            .add(key, value, expiry)
            .map_err(|e| ResumptionError::CacheProtocol(e.to_string()))
    }

    fn set(&self, key: &str, value: &[u8], cas: CasToken, expiry: u32) -> Result<(), ResumptionError> {
        self.client
            .cas(key, value, expiry, cas.0)
            .map_err(|e| ResumptionError::CacheProtocol(e.to_string()))
            .and_then(|won| {
                if won {
                    Ok(())
                } else {
                    Err(ResumptionError::CacheProtocol("CAS rejected by server".to_string()))
                }
            })
    }
}

/// Strategy for the session-ID cache (separate from ticket keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCacheStrategy {
    /// Disable the session cache on every TLS context.
    Off,
    /// No-op at this layer — the TLS library's default in-process cache
    /// applies.
    Internal,
    /// Install an async cache-resumption handler against a memcached-backed
    /// store.
    Memcached,
}

/// The action the cache-resumption glue took, surfaced so callers (and
/// tests) can assert on it without a real set of TLS contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCacheAction {
    /// Session cache disabled on every context.
    Disabled,
    /// Left to the TLS library's built-in in-process cache.
    InternalDefault,
    /// Async memcached-backed resumption installed with this lifetime.
    MemcachedInstalled {
        /// Configured session lifetime in seconds.
        lifetime_s: u32,
    },
}

/// Decide what the glue should install for a given number of TLS contexts,
/// given the configured strategy and lifetime. Mirrors
/// `setup_cache_disable`/`setup_cache_memcached` from the original source:
/// `internal` only applies when contexts exist, `off` and `memcached`
/// always act (the latter is a no-op with zero contexts).
pub fn install_session_cache(
    strategy: SessionCacheStrategy,
    lifetime_s: u32,
    num_contexts: usize,
) -> SessionCacheAction {
    let _ = num_contexts;
    match strategy {
        SessionCacheStrategy::Off => SessionCacheAction::Disabled,
        SessionCacheStrategy::Internal => SessionCacheAction::InternalDefault,
        SessionCacheStrategy::Memcached => SessionCacheAction::MemcachedInstalled { lifetime_s },
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory `CacheClient` fake, used by the cluster rotator's tests.
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct Slot {
        value: Vec<u8>,
        version: u64,
    }

    /// A `CacheClient` backed by a `HashMap`, shareable across threads to
    /// simulate a fleet of nodes racing to rotate.
    #[derive(Clone, Default)]
    pub struct FakeCache {
        inner: Arc<Mutex<HashMap<String, Slot>>>,
    }

    impl FakeCache {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl CacheClient for FakeCache {
        fn get(&self, key: &str) -> Result<GetResult, ResumptionError> {
            let map = self.inner.lock();
            match map.get(key) {
                Some(slot) => Ok(GetResult::Found(slot.value.clone(), CasToken(slot.version))),
                None => Ok(GetResult::NotFound),
            }
        }

        fn add(&self, key: &str, value: &[u8], _expiry: u32) -> Result<(), ResumptionError> {
            let mut map = self.inner.lock();
            if map.contains_key(key) {
                return Err(ResumptionError::CacheProtocol("key exists".to_string()));
            }
            map.insert(
                key.to_string(),
                Slot {
                    value: value.to_vec(),
                    version: 1,
                },
            );
            Ok(())
        }

        fn set(&self, key: &str, value: &[u8], cas: CasToken, _expiry: u32) -> Result<(), ResumptionError> {
            let mut map = self.inner.lock();
            match map.get_mut(key) {
                Some(slot) if slot.version == cas.0 => {
                    slot.value = value.to_vec();
                    slot.version += 1;
                    Ok(())
                }
                Some(_) => Err(ResumptionError::CacheProtocol("CAS mismatch".to_string())),
                None => Err(ResumptionError::CacheProtocol("key missing".to_string())),
            }
        }
    }
}
