//! Agent configuration

use anyhow::Result;
use serde::Deserialize;

/// Agent configuration, overridable via AGENT_* environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Docker daemon endpoint (unix socket path or tcp address)
    #[serde(default = "default_docker_endpoint")]
    pub docker_endpoint: String,

    /// Host identity attached to every record
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Run a single poll cycle and exit (cron-style invocation)
    #[serde(default)]
    pub oneshot: bool,
}

fn default_docker_endpoint() -> String {
    std::env::var("DOCKER_HOST").unwrap_or_else(|_| "unix:///var/run/docker.sock".to_string())
}

fn default_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn default_poll_interval() -> u64 {
    30
}

fn default_api_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid AGENT_* environment values, using defaults");
            AgentConfig {
                docker_endpoint: default_docker_endpoint(),
                hostname: default_hostname(),
                poll_interval_secs: default_poll_interval(),
                api_port: default_api_port(),
                oneshot: false,
            }
        }))
    }
}
