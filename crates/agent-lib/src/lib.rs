//! Agent library for container metrics collection
//!
//! This crate provides the core functionality for:
//! - Pure derivation of normalized metrics from raw runtime counters
//! - Raw stats acquisition from the Docker socket
//! - The periodic poll loop with per-container failure isolation
//! - JSON-line record emission and Prometheus observability

pub mod collector;
pub mod derive;
pub mod models;
pub mod observability;
pub mod output;

pub use collector::{DockerStatsSource, PollConfig, PollLoop, StatsSource};
pub use derive::DeriveError;
pub use models::*;
pub use observability::AgentMetrics;
pub use output::JsonLineEmitter;
