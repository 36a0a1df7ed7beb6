//! Tracing subscriber setup shared by the binaries

use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `observability.log_level`. Output is JSON when
/// `observability.json_logging` is set. Fails if a subscriber is already
/// installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_logging {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| AppError::Internal {
        message: format!("failed to install tracing subscriber: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_rejected() {
        let config = ObservabilityConfig {
            json_logging: false,
            ..ObservabilityConfig::default()
        };

        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(AppError::Internal { .. })));
    }
}
