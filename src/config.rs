//! The operator-facing configuration surface and its resolver.
//!
//! Mirrors the teacher's config-struct idiom (`AuthConfig` in
//! `examples/harborgrid-justin-caddy/src/auth/mod.rs`: a `serde`-derived
//! struct with a hand-written `Default`), and the original source's
//! validation order in
//! `examples/original_source/src/ssl.c::ssl_session_resumption_on_config`.

use serde::Deserialize;

use crate::cache::SessionCacheStrategy;
use crate::crypto::{Cipher, Mac};
use crate::error::ResumptionError;
use crate::rotator::Maintainer;

/// Raw YAML shape accepted from the operator. Field names use the
/// hyphenated spelling from the specification (`cache-store`,
/// `ticket-lifetime`, ...); `serde(rename)` bridges to idiomatic Rust
/// field names.
#[derive(Debug, Deserialize)]
struct RawConfig {
    mode: String,
    #[serde(rename = "cache-store")]
    cache_store: Option<String>,
    #[serde(rename = "cache-lifetime")]
    cache_lifetime: Option<u32>,
    #[serde(rename = "ticket-store")]
    ticket_store: Option<String>,
    #[serde(rename = "ticket-cipher")]
    ticket_cipher: Option<String>,
    #[serde(rename = "ticket-hash")]
    ticket_hash: Option<String>,
    #[serde(rename = "ticket-lifetime")]
    ticket_lifetime: Option<u32>,
    #[serde(rename = "ticket-file")]
    ticket_file: Option<String>,
    memcached: Option<RawMemcached>,
}

#[derive(Debug, Deserialize)]
struct RawMemcached {
    host: Option<String>,
    port: Option<u16>,
    #[serde(rename = "num-threads")]
    num_threads: Option<usize>,
    prefix: Option<String>,
}

/// Which subsystems are enabled, decoded from `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Modes {
    cache: bool,
    ticket: bool,
}

fn parse_mode(raw: &str) -> Result<Modes, ResumptionError> {
    match raw.to_ascii_lowercase().as_str() {
        "off" => Ok(Modes { cache: false, ticket: false }),
        "all" => Ok(Modes { cache: true, ticket: true }),
        "cache" => Ok(Modes { cache: true, ticket: false }),
        "ticket" => Ok(Modes { cache: false, ticket: true }),
        other => Err(ResumptionError::Config {
            node: "mode".to_string(),
            reason: format!("value of `mode` must be one of: off | all | cache | ticket (got `{other}`)"),
        }),
    }
}

/// Memcached connection parameters, required iff any subsystem selects the
/// `memcached` backend.
#[derive(Debug, Clone)]
pub struct MemcachedConfig {
    /// Cache host.
    pub host: String,
    /// Cache port (default 11211).
    pub port: u16,
    /// Number of client worker threads (default 1; owned by the cache
    /// client, opaque to this crate).
    pub num_threads: usize,
    /// Key prefix (default `:h2o:ssl-resumption:`).
    pub prefix: String,
}

/// Fully resolved configuration: one cache strategy, one ticket strategy
/// (as a ready-to-spawn [`Maintainer`], if enabled), and the shared
/// memcached parameters if either needs them.
#[derive(Debug)]
pub struct ResumptionConfig {
    /// Session-ID cache strategy.
    pub cache_strategy: SessionCacheStrategy,
    /// Session-ID cache lifetime in seconds.
    pub cache_lifetime_s: u32,
    /// The ticket maintainer to spawn, or `None` if tickets are disabled.
    pub ticket_maintainer: Option<Maintainer>,
    /// Memcached parameters, present iff required by the selected
    /// strategies.
    pub memcached: Option<MemcachedConfig>,
}

impl ResumptionConfig {
    /// Parse and validate a YAML document against the configuration
    /// surface described in `SPEC_FULL.md` §4.H.
    pub fn parse(yaml: &str) -> Result<Self, ResumptionError> {
        let raw: RawConfig = serde_yaml::from_str(yaml).map_err(|e| ResumptionError::Config {
            node: "<root>".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ResumptionError> {
        let modes = parse_mode(&raw.mode)?;

        let (cache_strategy, cache_lifetime_s) = if modes.cache {
            resolve_cache(&raw)?
        } else {
            (SessionCacheStrategy::Off, 3600)
        };

        let ticket_maintainer = if modes.ticket {
            Some(resolve_ticket(&raw)?)
        } else {
            None
        };

        let uses_memcached = cache_strategy == SessionCacheStrategy::Memcached
            || matches!(ticket_maintainer, Some(Maintainer::Cluster { .. }));

        let memcached = match &raw.memcached {
            Some(m) => Some(resolve_memcached(m)?),
            None => None,
        };

        if uses_memcached && memcached.is_none() {
            return Err(ResumptionError::Config {
                node: "memcached".to_string(),
                reason: "configuration of the memcached is missing".to_string(),
            });
        }

        // Fold the resolved host/port/prefix into the ticket maintainer
        // now that memcached config is known.
        let ticket_maintainer = match (ticket_maintainer, &memcached) {
            (
                Some(Maintainer::Cluster { cipher, mac, lifetime_s, .. }),
                Some(mc),
            ) => Some(Maintainer::Cluster {
                cipher,
                mac,
                lifetime_s,
                host: mc.host.clone(),
                port: mc.port,
                prefix: mc.prefix.clone(),
            }),
            (other, _) => other,
        };

        Ok(ResumptionConfig {
            cache_strategy,
            cache_lifetime_s,
            ticket_maintainer,
            memcached,
        })
    }
}

fn resolve_cache(raw: &RawConfig) -> Result<(SessionCacheStrategy, u32), ResumptionError> {
    let strategy = match raw.cache_store.as_deref() {
        None | Some("internal") => SessionCacheStrategy::Internal,
        Some("memcached") => SessionCacheStrategy::Memcached,
        Some(other) => {
            return Err(ResumptionError::Config {
                node: "cache-store".to_string(),
                reason: format!("value of `cache-store` must be one of: internal | memcached (got `{other}`)"),
            })
        }
    };

    let lifetime_s = match raw.cache_lifetime {
        None => 3600,
        Some(0) => {
            return Err(ResumptionError::Config {
                node: "cache-lifetime".to_string(),
                reason: "value of `cache-lifetime` must be a positive number".to_string(),
            })
        }
        Some(n) => {
            if strategy != SessionCacheStrategy::Memcached {
                tracing::warn!("`cache-lifetime` has no effect for the `internal` cache-store");
            }
            n
        }
    };

    Ok((strategy, lifetime_s))
}

fn resolve_ticket(raw: &RawConfig) -> Result<Maintainer, ResumptionError> {
    let store = raw.ticket_store.as_deref().unwrap_or("internal");

    if store == "file" {
        let path = raw.ticket_file.as_ref().ok_or_else(|| ResumptionError::Config {
            node: "ticket-file".to_string(),
            reason: "mandatory attribute `ticket-file` is missing".to_string(),
        })?;
        return Ok(Maintainer::File { path: path.into() });
    }

    if store != "internal" && store != "memcached" {
        return Err(ResumptionError::Config {
            node: "ticket-store".to_string(),
            reason: format!("value of `ticket-store` must be one of: internal | file | memcached (got `{store}`)"),
        });
    }

    let cipher = match &raw.ticket_cipher {
        None => Cipher::Aes256Cbc,
        Some(name) => Cipher::from_name(name).ok_or_else(|| ResumptionError::Config {
            node: "ticket-cipher".to_string(),
            reason: "unknown cipher algorithm".to_string(),
        })?,
    };
    let mac = match &raw.ticket_hash {
        None => Mac::Sha256,
        Some(name) => Mac::from_name(name).ok_or_else(|| ResumptionError::Config {
            node: "ticket-hash".to_string(),
            reason: "unknown hash algorithm".to_string(),
        })?,
    };
    let lifetime_s = match raw.ticket_lifetime {
        None => 3600,
        Some(0) => {
            return Err(ResumptionError::Config {
                node: "ticket-lifetime".to_string(),
                reason: "`ticket-lifetime` must be a positive number (in seconds)".to_string(),
            })
        }
        Some(n) => n as u64,
    };

    if store == "memcached" {
        // Host/port/prefix are filled in by `from_raw` once the
        // `memcached` sub-mapping has been resolved.
        Ok(Maintainer::Cluster {
            cipher,
            mac,
            lifetime_s,
            host: String::new(),
            port: 11211,
            prefix: String::new(),
        })
    } else {
        Ok(Maintainer::Local { cipher, mac, lifetime_s })
    }
}

fn resolve_memcached(raw: &RawMemcached) -> Result<MemcachedConfig, ResumptionError> {
    let host = raw
        .host
        .clone()
        .ok_or_else(|| ResumptionError::Config {
            node: "memcached.host".to_string(),
            reason: "mandatory attribute `host` is missing".to_string(),
        })?;
    let port = raw.port.unwrap_or(11211);
    let num_threads = match raw.num_threads {
        None => 1,
        Some(0) => {
            return Err(ResumptionError::Config {
                node: "memcached.num-threads".to_string(),
                reason: "`num-threads` must be a positive number".to_string(),
            })
        }
        Some(n) => n,
    };
    let prefix = raw.prefix.clone().unwrap_or_else(|| ":h2o:ssl-resumption:".to_string());

    Ok(MemcachedConfig { host, port, num_threads, prefix })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_off_disables_everything() {
        let cfg = ResumptionConfig::parse("mode: off\n").unwrap();
        assert_eq!(cfg.cache_strategy, SessionCacheStrategy::Off);
        assert!(cfg.ticket_maintainer.is_none());
    }

    #[test]
    fn mode_all_with_internal_defaults() {
        let cfg = ResumptionConfig::parse("mode: all\n").unwrap();
        assert_eq!(cfg.cache_strategy, SessionCacheStrategy::Internal);
        assert!(matches!(cfg.ticket_maintainer, Some(Maintainer::Local { lifetime_s: 3600, .. })));
    }

    #[test]
    fn ticket_file_requires_ticket_file_attribute() {
        let err = ResumptionConfig::parse("mode: ticket\nticket-store: file\n").unwrap_err();
        assert!(matches!(err, ResumptionError::Config { node, .. } if node == "ticket-file"));
    }

    #[test]
    fn memcached_strategy_requires_host() {
        let err = ResumptionConfig::parse("mode: ticket\nticket-store: memcached\n").unwrap_err();
        assert!(matches!(err, ResumptionError::Config { node, .. } if node == "memcached"));
    }

    #[test]
    fn memcached_strategy_resolves_host_port_prefix_into_maintainer() {
        let yaml = "mode: ticket\nticket-store: memcached\nmemcached:\n  host: cache.local\n  port: 11222\n";
        let cfg = ResumptionConfig::parse(yaml).unwrap();
        match cfg.ticket_maintainer.unwrap() {
            Maintainer::Cluster { host, port, prefix, .. } => {
                assert_eq!(host, "cache.local");
                assert_eq!(port, 11222);
                assert_eq!(prefix, ":h2o:ssl-resumption:");
            }
            other => panic!("expected Cluster, got {other:?}"),
        }
    }

    #[test]
    fn unknown_cipher_is_rejected() {
        let err = ResumptionConfig::parse("mode: ticket\nticket-cipher: ROT13\n").unwrap_err();
        assert!(matches!(err, ResumptionError::Config { node, .. } if node == "ticket-cipher"));
    }
}
