//! Tracing subscriber setup

use crate::error::{AudienceError, AudienceResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// `default_filter` applies when `RUST_LOG` is unset. Fails if a global
/// subscriber is already installed.
pub fn init(default_filter: &str) -> AudienceResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| AudienceError::Telemetry(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| AudienceError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        // Another test binary may already own the global subscriber.
        let _ = init("debug");
        assert!(matches!(init("info"), Err(AudienceError::Telemetry(_))));
    }
}
