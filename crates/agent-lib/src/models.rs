//! Core data models for the metrics agent

use serde::{Deserialize, Serialize};

/// A container as reported by the runtime's list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeContainer {
    pub id: String,
    /// First reported name, leading slash included (Docker convention)
    pub name: String,
    pub image: String,
}

/// Identity of a container for one poll cycle
///
/// Built once per cycle from the container list and the agent hostname,
/// then attached unchanged to the emitted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerIdentity {
    pub id: String,
    pub name: String,
    pub image: String,
    pub hostname: String,
    /// Normalized hostname + container name, safe for text indexing
    pub composite_name: String,
}

/// Cumulative CPU counters at one sampling tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCpuSample {
    pub total_usage: u64,
    pub system_usage: u64,
}

/// Memory counters at one sampling tick, all in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMemorySample {
    pub usage_bytes: u64,
    pub limit_bytes: u64,
    pub swap_bytes: u64,
}

/// One raw stats reply from the runtime
///
/// The Docker stats endpoint returns the current tick and the previous
/// tick in a single response, which gives us the counter pair needed for
/// rate derivation without holding state across polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStatsSample {
    pub cpu: RawCpuSample,
    pub precpu: RawCpuSample,
    pub memory: RawMemorySample,
}

/// Derived CPU metrics
///
/// `usage_percentage` is host-normalized (share of total host CPU between
/// the two ticks), not per-core. `None` marks a degenerate sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage_percentage: Option<i64>,
}

/// Derived memory metrics, MB fields keep fractional precision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    #[serde(rename = "limit")]
    pub limit_mb: f64,
    #[serde(rename = "used")]
    pub used_mb: f64,
    #[serde(rename = "swap")]
    pub swap_mb: f64,
    /// `None` when the container has no memory limit configured
    pub usage_percentage: Option<i64>,
}

/// Derived per-container stats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
}

/// Final per-container record, serialized as one JSON object per line
///
/// `stats` is `null` when the stats fetch for this container failed; the
/// record is still emitted so the failure stays visible downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub hostname: String,
    pub metrics_type: String,
    pub id: String,
    pub name: String,
    pub image: String,
    pub container_full_name: String,
    pub runtime_version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub stats: Option<ContainerStats>,
}
