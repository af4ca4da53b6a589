//! Metrics derivation engine
//!
//! Turns raw runtime counters into stable, comparable percentage and
//! byte-unit metrics. Every operation here is a pure function over its
//! inputs: no I/O, no state across poll cycles. Degenerate inputs (zero
//! system delta, missing memory limit) are surfaced as typed errors so
//! callers can mark the metric unavailable instead of emitting NaN,
//! Infinity, or a negative percentage.

use crate::models::{
    ContainerIdentity, ContainerRecord, ContainerStats, CpuMetrics, MemoryMetrics, RawCpuSample,
    RawMemorySample, RawStatsSample, RuntimeContainer,
};
use thiserror::Error;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Errors from metric derivation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeriveError {
    /// System CPU delta between the two ticks is zero (first sample after
    /// container start, or clock/counter anomaly)
    #[error("degenerate CPU sample: system delta is zero")]
    DegenerateSample,

    /// Container has no memory limit configured, usage ratio is undefined
    #[error("memory limit is zero, usage percentage undefined")]
    UndefinedLimit,

    /// Runtime reply was missing a counter field (partial or failed fetch)
    #[error("missing field in runtime stats reply: {field}")]
    MissingData { field: &'static str },
}

/// Percentage of total host CPU consumed between the two ticks
///
/// `previous` must have been captured strictly before `current` for the
/// same container; the Docker stats endpoint guarantees this by returning
/// both ticks in one reply. Counter deltas use saturating subtraction so
/// a counter reset never underflows.
pub fn cpu_usage_percentage(
    current: &RawCpuSample,
    previous: &RawCpuSample,
) -> Result<i64, DeriveError> {
    let cpu_delta = current.total_usage.saturating_sub(previous.total_usage);
    let system_delta = current.system_usage.saturating_sub(previous.system_usage);

    if system_delta == 0 {
        return Err(DeriveError::DegenerateSample);
    }

    Ok((cpu_delta as f64 / system_delta as f64 * 100.0).round() as i64)
}

/// Exact linear byte-to-megabyte scaling, fractional precision preserved
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Derive memory metrics from one raw sample
///
/// Only the percentage is rounded; MB fields keep their fraction. Usage
/// above the limit yields a percentage above 100, deliberately unclamped.
pub fn memory_metrics(sample: &RawMemorySample) -> Result<MemoryMetrics, DeriveError> {
    if sample.limit_bytes == 0 {
        return Err(DeriveError::UndefinedLimit);
    }

    let percentage =
        (sample.usage_bytes as f64 / sample.limit_bytes as f64 * 100.0).round() as i64;

    Ok(MemoryMetrics {
        limit_mb: bytes_to_mb(sample.limit_bytes),
        used_mb: bytes_to_mb(sample.usage_bytes),
        swap_mb: bytes_to_mb(sample.swap_bytes),
        usage_percentage: Some(percentage),
    })
}

/// Normalize free-form text into an index-safe token
///
/// Lowercases and keeps only `[a-z0-9_-]`; everything else (slashes,
/// whitespace, reserved characters) is dropped. Deterministic.
pub fn normalize_index_text(input: &str) -> String {
    input
        .chars()
        .flat_map(|c| c.to_lowercase())
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Build the per-cycle identity for a container
pub fn build_identity(container: &RuntimeContainer, hostname: &str) -> ContainerIdentity {
    let hostname = normalize_index_text(hostname);
    let composite_name = format!("{}{}", hostname, normalize_index_text(&container.name));

    ContainerIdentity {
        id: container.id.clone(),
        name: container.name.clone(),
        image: container.image.clone(),
        hostname,
        composite_name,
    }
}

/// Derive full container stats with local recovery
///
/// A degenerate CPU sample or an undefined memory limit does not fail the
/// container: the affected percentage becomes `None` and the rest of the
/// metrics are kept.
pub fn derive_stats(sample: &RawStatsSample) -> ContainerStats {
    let cpu = CpuMetrics {
        usage_percentage: cpu_usage_percentage(&sample.cpu, &sample.precpu).ok(),
    };

    let memory = match memory_metrics(&sample.memory) {
        Ok(metrics) => metrics,
        // Keep the byte-derived fields, only the ratio is undefined
        Err(_) => MemoryMetrics {
            limit_mb: bytes_to_mb(sample.memory.limit_bytes),
            used_mb: bytes_to_mb(sample.memory.usage_bytes),
            swap_mb: bytes_to_mb(sample.memory.swap_bytes),
            usage_percentage: None,
        },
    };

    ContainerStats { cpu, memory }
}

/// Combine identity and derived stats into the final record
///
/// Pure assembly, no I/O. `stats: None` marks a container whose stats
/// fetch failed entirely.
pub fn assemble_record(
    identity: ContainerIdentity,
    runtime_version: &str,
    stats: Option<ContainerStats>,
) -> ContainerRecord {
    ContainerRecord {
        hostname: identity.hostname,
        metrics_type: "docker".to_string(),
        id: identity.id,
        name: identity.name,
        image: identity.image,
        container_full_name: identity.composite_name,
        runtime_version: runtime_version.to_string(),
        timestamp: chrono::Utc::now(),
        stats,
    }
}
