use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// `[log]` section of the agent config file.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_level() -> String {
    "info".into()
}

/// Built once by each binary from `[log]` and `--log-level`, then handed
/// to [`LogConfig::init`]. Components only emit events; the installed
/// filter is the single place verbosity is decided.
impl LogConfig {
    /// `RUST_LOG` when it is set and parses, else the configured level.
    pub fn filter(&self) -> EnvFilter {
        self.filter_with(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
    }

    fn filter_with(&self, env: Option<&str>) -> EnvFilter {
        env.and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(&self.level))
    }

    /// Install the global subscriber. Logs go to stderr so the consumer
    /// can keep stdout for payloads. Call once, before building agents.
    pub fn init(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr)
            .init();
    }
}
