//! Docker stats source backed by bollard
//!
//! One-shot queries against the Docker API: version, running containers,
//! and the two-tick stats reply used for CPU rate derivation. The
//! endpoint is injected at construction, never read from a module-level
//! constant.

use super::StatsSource;
use crate::derive::DeriveError;
use crate::models::{RawCpuSample, RawMemorySample, RawStatsSample, RuntimeContainer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::models::ContainerStatsResponse;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use bollard::Docker;
use futures::StreamExt;

const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Stats source talking to a Docker daemon socket
pub struct DockerStatsSource {
    docker: Docker,
    endpoint: String,
}

impl DockerStatsSource {
    /// Connect to the daemon at an explicit endpoint
    ///
    /// Accepts `unix:///path/to/docker.sock`, a bare socket path, or a
    /// `tcp://` / `http://` address.
    pub fn connect(endpoint: &str) -> Result<Self> {
        let docker = if let Some(path) = endpoint.strip_prefix("unix://") {
            Docker::connect_with_socket(path, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
                .with_context(|| format!("failed to connect to Docker socket {}", path))?
        } else if endpoint.starts_with("tcp://") || endpoint.starts_with("http") {
            Docker::connect_with_http(endpoint, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
                .with_context(|| format!("failed to connect to Docker host {}", endpoint))?
        } else {
            Docker::connect_with_socket(
                endpoint,
                CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
            .with_context(|| format!("failed to connect to Docker socket {}", endpoint))?
        };

        Ok(Self {
            docker,
            endpoint: endpoint.to_string(),
        })
    }

    /// Endpoint this source was constructed with
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StatsSource for DockerStatsSource {
    async fn runtime_version(&self) -> Result<String> {
        let version = self
            .docker
            .version()
            .await
            .context("failed to query Docker version")?;

        version
            .version
            .ok_or_else(|| anyhow::anyhow!("Docker version reply had no version field"))
    }

    async fn list_containers(&self) -> Result<Vec<RuntimeContainer>> {
        // Running containers only, matching the list endpoint default
        let options = ListContainersOptions {
            all: false,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .context("failed to list containers")?;

        let mut result = Vec::with_capacity(containers.len());
        for container in containers {
            let Some(id) = container.id else {
                tracing::warn!("skipping container with no id in list reply");
                continue;
            };

            let name = container
                .names
                .and_then(|names| names.into_iter().next())
                .unwrap_or_else(|| format!("/{}", id));

            result.push(RuntimeContainer {
                id,
                name,
                image: container.image.unwrap_or_default(),
            });
        }

        Ok(result)
    }

    async fn sample(&self, container_id: &str) -> Result<RawStatsSample> {
        let options = StatsOptions {
            stream: false,
            ..Default::default()
        };

        let mut stats_stream = self.docker.stats(container_id, Some(options));
        let stats = stats_stream
            .next()
            .await
            .ok_or_else(|| anyhow::anyhow!("no stats reply for container {}", container_id))?
            .with_context(|| format!("failed to read stats for container {}", container_id))?;

        Ok(raw_sample_from_response(&stats)?)
    }
}

/// Convert a Docker stats reply into the raw counter sample
///
/// Missing counter fields surface as [`DeriveError::MissingData`] so a
/// partial reply marks that container unavailable instead of panicking.
pub fn raw_sample_from_response(
    stats: &ContainerStatsResponse,
) -> Result<RawStatsSample, DeriveError> {
    let cpu_stats = stats.cpu_stats.as_ref().ok_or(DeriveError::MissingData {
        field: "cpu_stats",
    })?;
    let precpu_stats = stats.precpu_stats.as_ref().ok_or(DeriveError::MissingData {
        field: "precpu_stats",
    })?;
    let memory_stats = stats.memory_stats.as_ref().ok_or(DeriveError::MissingData {
        field: "memory_stats",
    })?;

    let cpu = RawCpuSample {
        total_usage: cpu_stats
            .cpu_usage
            .as_ref()
            .and_then(|usage| usage.total_usage)
            .ok_or(DeriveError::MissingData {
                field: "cpu_stats.cpu_usage.total_usage",
            })?,
        system_usage: cpu_stats.system_cpu_usage.ok_or(DeriveError::MissingData {
            field: "cpu_stats.system_cpu_usage",
        })?,
    };

    // The previous tick may legitimately be all zeros right after start;
    // absent fields default to zero and derivation flags the degenerate
    // delta downstream.
    let precpu = RawCpuSample {
        total_usage: precpu_stats
            .cpu_usage
            .as_ref()
            .and_then(|usage| usage.total_usage)
            .unwrap_or(0),
        system_usage: precpu_stats.system_cpu_usage.unwrap_or(0),
    };

    let memory = RawMemorySample {
        usage_bytes: memory_stats.usage.ok_or(DeriveError::MissingData {
            field: "memory_stats.usage",
        })?,
        limit_bytes: memory_stats.limit.unwrap_or(0),
        swap_bytes: memory_stats
            .stats
            .as_ref()
            .and_then(|detail| detail.get("swap").copied())
            .unwrap_or(0),
    };

    Ok(RawStatsSample {
        cpu,
        precpu,
        memory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerCpuStats, ContainerCpuUsage, ContainerMemoryStats};
    use std::collections::HashMap;

    fn full_response() -> ContainerStatsResponse {
        ContainerStatsResponse {
            cpu_stats: Some(ContainerCpuStats {
                cpu_usage: Some(ContainerCpuUsage {
                    total_usage: Some(2000),
                    ..Default::default()
                }),
                system_cpu_usage: Some(100_000),
                ..Default::default()
            }),
            precpu_stats: Some(ContainerCpuStats {
                cpu_usage: Some(ContainerCpuUsage {
                    total_usage: Some(1000),
                    ..Default::default()
                }),
                system_cpu_usage: Some(90_000),
                ..Default::default()
            }),
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(52_428_800),
                limit: Some(104_857_600),
                stats: Some(HashMap::from([("swap".to_string(), 1_048_576)])),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_connect_keeps_configured_endpoint() {
        // Client construction is lazy, no daemon needed
        let source = DockerStatsSource::connect("unix:///var/run/docker.sock").unwrap();
        assert_eq!(source.endpoint(), "unix:///var/run/docker.sock");

        let source = DockerStatsSource::connect("/var/run/docker.sock").unwrap();
        assert_eq!(source.endpoint(), "/var/run/docker.sock");
    }

    #[test]
    fn test_raw_sample_from_full_response() {
        let sample = raw_sample_from_response(&full_response()).unwrap();

        assert_eq!(sample.cpu.total_usage, 2000);
        assert_eq!(sample.cpu.system_usage, 100_000);
        assert_eq!(sample.precpu.total_usage, 1000);
        assert_eq!(sample.precpu.system_usage, 90_000);
        assert_eq!(sample.memory.usage_bytes, 52_428_800);
        assert_eq!(sample.memory.limit_bytes, 104_857_600);
        assert_eq!(sample.memory.swap_bytes, 1_048_576);
    }

    #[test]
    fn test_raw_sample_missing_cpu_stats() {
        let mut response = full_response();
        response.cpu_stats = None;

        assert_eq!(
            raw_sample_from_response(&response),
            Err(DeriveError::MissingData { field: "cpu_stats" })
        );
    }

    #[test]
    fn test_raw_sample_missing_memory_usage() {
        let mut response = full_response();
        response.memory_stats.as_mut().unwrap().usage = None;

        assert_eq!(
            raw_sample_from_response(&response),
            Err(DeriveError::MissingData {
                field: "memory_stats.usage"
            })
        );
    }

    #[test]
    fn test_raw_sample_tolerates_absent_precpu_and_swap() {
        let mut response = full_response();
        response.precpu_stats = Some(ContainerCpuStats::default());
        response.memory_stats.as_mut().unwrap().stats = None;
        response.memory_stats.as_mut().unwrap().limit = None;

        let sample = raw_sample_from_response(&response).unwrap();
        assert_eq!(sample.precpu.total_usage, 0);
        assert_eq!(sample.precpu.system_usage, 0);
        assert_eq!(sample.memory.swap_bytes, 0);
        // Absent limit becomes zero, flagged later as undefined
        assert_eq!(sample.memory.limit_bytes, 0);
    }
}
