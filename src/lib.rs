//! # TLS Session-Resumption Subsystem
//!
//! The machinery that lets a returning TLS client skip a full handshake:
//! session-ID cache glue for the external distributed cache, and the
//! session-ticket key lifecycle (generation, rotation, aging-out, and
//! concurrent lookup from handshake callbacks).
//!
//! ## Architecture
//!
//! - `crypto`: the cipher/MAC registry and the AES-256-CBC + HMAC-SHA256
//!   encrypt-then-MAC construction used to protect ticket contents.
//! - `ticket`: the immutable ticket-key record and its hex/YAML codec.
//! - `store`: the ordered, lock-protected collection of ticket keys shared
//!   by every handshake thread and the single maintainer thread.
//! - `callback`: the per-handshake encrypt/decrypt hook.
//! - `rotator`: the three maintainer state machines (local, file, cluster).
//! - `cache`: session-ID cache-resumption glue and the memcached client
//!   contract used by both the cache glue and the cluster rotator.
//! - `config`: the operator-facing configuration surface and its resolver.

#![warn(missing_docs)]

pub mod cache;
pub mod callback;
pub mod config;
pub mod crypto;
pub mod error;
pub mod rotator;
pub mod store;
pub mod ticket;

pub use callback::TicketCallback;
pub use config::ResumptionConfig;
pub use error::ResumptionError;
pub use store::TicketStore;
pub use ticket::TicketKey;

/// Re-export version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
