//! Raw stats acquisition from the container runtime
//!
//! The derivation core is pure; everything that talks to the runtime
//! socket lives here behind the [`StatsSource`] trait. The poll loop fans
//! out one sampling task per container and joins them with individual
//! error capture, so one container's failure never aborts the cycle.

mod docker;
mod poll;

pub use docker::DockerStatsSource;
pub use poll::{CycleResults, PollConfig, PollLoop};

use crate::models::{RawStatsSample, RuntimeContainer};
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for runtime stats acquisition implementations
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Version string of the container runtime
    async fn runtime_version(&self) -> Result<String>;

    /// List running containers
    async fn list_containers(&self) -> Result<Vec<RuntimeContainer>>;

    /// Take one raw stats sample (current + previous tick) for a container
    async fn sample(&self, container_id: &str) -> Result<RawStatsSample>;
}
