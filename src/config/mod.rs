use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::observability::LogFormat;
use crate::policy::DEFAULT_REFDATA_ENV_PREFIX;

/// Decision service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "actiongate")]
#[command(about = "Allow/deny decision engine for a tool and action gateway")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8181", env = "ACTIONGATE_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Path to policy YAML file
    #[arg(long, default_value = "policy.yaml", env = "ACTIONGATE_POLICY_PATH")]
    pub policy_path: PathBuf,

    /// Path to reference data YAML file
    #[arg(long, default_value = "refdata.yaml", env = "ACTIONGATE_REFDATA_PATH")]
    pub refdata_path: PathBuf,

    /// Prefix of environment variables overlaid onto reference data (empty disables)
    #[arg(long, default_value = DEFAULT_REFDATA_ENV_PREFIX, env = "ACTIONGATE_REFDATA_ENV_PREFIX")]
    pub refdata_env_prefix: String,

    /// Policy reload check interval in seconds (at least 1)
    #[arg(
        long,
        default_value = "30",
        env = "ACTIONGATE_POLICY_RELOAD_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub policy_reload_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "ACTIONGATE_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "ACTIONGATE_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value = "1000", env = "ACTIONGATE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,
}

impl Config {
    /// Get policy reload interval as Duration.
    pub fn policy_reload_interval(&self) -> Duration {
        Duration::from_secs(self.policy_reload_secs)
    }

    /// Get request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8181".to_string(),
            policy_path: PathBuf::from("policy.yaml"),
            refdata_path: PathBuf::from("refdata.yaml"),
            refdata_env_prefix: DEFAULT_REFDATA_ENV_PREFIX.to_string(),
            policy_reload_secs: 30,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            graceful_shutdown: true,
            request_timeout_ms: 1000,
        }
    }
}
