//! tls-resumption daemon entry point.
//!
//! Loads the resumption configuration, starts the configured ticket-key
//! maintainer, and installs the session-ID cache strategy. This binary
//! models what a TLS server host process wires up at startup; it does not
//! itself terminate TLS connections.

use std::panic;
use std::sync::Arc;

use tls_resumption::config::ResumptionConfig;
use tls_resumption::store::TicketStore;

fn main() {
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("tls-resumption fatal error: {panic_info}");
    }));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!(version = tls_resumption::VERSION, "starting {}", tls_resumption::NAME);

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "resumption.yaml".to_string());
    let yaml = match std::fs::read_to_string(&config_path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!(path = %config_path, error = %e, "failed to read configuration file");
            std::process::exit(1);
        }
    };

    let config = match ResumptionConfig::parse(&yaml) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid session-resumption configuration");
            std::process::exit(1);
        }
    };

    let action = tls_resumption::cache::install_session_cache(config.cache_strategy, config.cache_lifetime_s, 1);
    tracing::info!(?action, "session-ID cache installed");

    match config.ticket_maintainer {
        Some(maintainer) => {
            tracing::info!(?maintainer, "starting session-ticket key maintainer");
            let store = Arc::new(TicketStore::new());
            let handle = maintainer.spawn(store);
            let _ = handle.join();
        }
        None => {
            tracing::info!("session tickets disabled; nothing further to do");
        }
    }
}
