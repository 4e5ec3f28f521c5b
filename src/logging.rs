//! # Logging
//!
//! Environment-aware structured logging for the ingestion actors. Console
//! output is human-readable by default and JSON when
//! `INGESTION_LOG_FORMAT=json`.

use crate::constants::env_vars;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once; later calls are no-ops
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if json_output_requested() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Embedding hosts may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("tracing subscriber already installed, keeping it");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "logging initialized"
        );
    });
}

/// `INGESTION_ENV`, then `APP_ENV`, lowercased
fn get_environment() -> String {
    std::env::var(env_vars::ENVIRONMENT)
        .or_else(|_| std::env::var(env_vars::ENVIRONMENT_FALLBACK))
        .map(|env| env.to_lowercase())
        .unwrap_or_else(|_| "development".to_string())
}

/// Default filter directive when `RUST_LOG` is unset
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" | "staging" => "raster_ingestion=info,warn",
        _ => "raster_ingestion=debug,info",
    }
}

fn json_output_requested() -> bool {
    std::env::var(env_vars::LOG_FORMAT).is_ok_and(|format| format.eq_ignore_ascii_case("json"))
}

/// Log a state machine transition
pub fn log_transition(actor: &str, from: &str, to: &str, trigger: &str) {
    tracing::info!(
        actor = %actor,
        from = %from,
        to = %to,
        trigger = %trigger,
        "🔀 TRANSITION"
    );
}

/// Log the start of a service invocation
pub fn log_service_call(actor: &str, operation: &str, target: Option<&str>, epoch: Option<u64>) {
    tracing::debug!(
        actor = %actor,
        operation = %operation,
        target = target,
        epoch = epoch,
        "📡 SERVICE_CALL"
    );
}

/// Log a failure together with the component and operation that hit it
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_levels_for_deployed_environments() {
        for environment in ["production", "staging"] {
            assert_eq!(get_log_level(environment), "raster_ingestion=info,warn");
        }
        for environment in ["test", "development", "ci"] {
            assert_eq!(get_log_level(environment), "raster_ingestion=debug,info");
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
    }
}
