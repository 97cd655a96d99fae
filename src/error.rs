//! Error taxonomy for the session-resumption subsystem.

use thiserror::Error;

/// Errors produced by the session-resumption subsystem.
#[derive(Debug, Error)]
pub enum ResumptionError {
    /// Startup configuration is invalid; the YAML node name identifies the
    /// offending attribute.
    #[error("configuration error at `{node}`: {reason}")]
    Config {
        /// Dotted path of the offending YAML node (e.g. `ticket.memcached.host`).
        node: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A ticket-key document (file or cache value) failed to parse.
    #[error("failed to parse ticket-key document at element {index}: {reason}")]
    Parse {
        /// Index of the offending sequence element.
        index: usize,
        /// Human-readable reason.
        reason: String,
    },

    /// The root of a ticket-key document was not a YAML sequence of mappings.
    #[error("ticket-key document is malformed: {0}")]
    MalformedDocument(String),

    /// Transient I/O failure reading a ticket-key file or reaching the cache.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// The distributed cache reported a protocol-level error.
    #[error("cache protocol error: {0}")]
    CacheProtocol(String),

    /// Random number generation failed while minting or using a ticket key.
    #[error("RNG failure: {0}")]
    Rng(String),

    /// Underlying block-cipher or MAC operation failed.
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ResumptionError>;
