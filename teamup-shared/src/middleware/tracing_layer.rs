use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format, chosen by `TEAMUP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable with file and line, for local runs.
    Pretty,
    /// One JSON object per line, for log shipping.
    Json,
}

impl LogFormat {
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("production") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }

    fn from_env() -> Self {
        Self::from_env_value(std::env::var("TEAMUP_ENV").ok().as_deref())
    }
}

/// Directives used when `RUST_LOG` is unset. `teamup` is a target prefix, so
/// it covers the shared crate, the service library and its binaries.
fn default_directives() -> &'static str {
    "info,teamup=debug,tower_http=debug"
}

/// Installs the global subscriber. Safe to call once per process; a second
/// call is logged and ignored, which keeps tests that share a process quiet.
pub fn init_tracing(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives()));

    let format = LogFormat::from_env();
    let installed = match format {
        LogFormat::Json => {
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    match installed {
        Ok(()) => tracing::info!(service = service_name, format = ?format, "tracing initialized"),
        Err(e) => tracing::debug!(service = service_name, error = %e, "tracing already initialized"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_switches_to_json() {
        assert_eq!(LogFormat::from_env_value(Some("production")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("staging")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Pretty);
    }

    #[test]
    fn default_directives_parse() {
        assert!(EnvFilter::try_new(default_directives()).is_ok());
    }
}
