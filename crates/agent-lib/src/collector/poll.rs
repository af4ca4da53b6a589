//! Periodic poll loop
//!
//! Each cycle fetches the runtime version once, lists containers, then
//! fans out one sampling task per container and joins them with
//! individual error capture. Failed containers still produce a record
//! with an unavailable-stats marker.

use super::StatsSource;
use crate::derive::{assemble_record, build_identity, derive_stats};
use crate::models::ContainerRecord;
use crate::observability::AgentMetrics;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval between poll cycles (default: 30 seconds)
    pub interval: Duration,
    /// Channel buffer size for emitted records
    pub buffer_size: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            buffer_size: 256,
        }
    }
}

/// Results from one poll cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleResults {
    /// Records emitted with derived stats
    pub sampled: usize,
    /// Records emitted with an unavailable-stats marker
    pub unavailable: usize,
}

/// Poll loop producing one record per container per cycle
pub struct PollLoop {
    source: Arc<dyn StatsSource>,
    hostname: String,
    config: PollConfig,
    records_tx: mpsc::Sender<ContainerRecord>,
    metrics: AgentMetrics,
}

impl PollLoop {
    /// Create a new poll loop and the receiving end of its record channel
    pub fn new(
        source: Arc<dyn StatsSource>,
        hostname: impl Into<String>,
        config: PollConfig,
    ) -> (Self, mpsc::Receiver<ContainerRecord>) {
        let (records_tx, records_rx) = mpsc::channel(config.buffer_size);

        let poll_loop = Self {
            source,
            hostname: hostname.into(),
            config,
            records_tx,
            metrics: AgentMetrics::new(),
        };

        (poll_loop, records_rx)
    }

    /// Run cycles until the shutdown signal fires
    ///
    /// Consumes the loop so the record channel closes on exit and the
    /// emitter drains cleanly.
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "starting poll loop"
        );

        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();

                    match self.run_once().await {
                        Ok(results) => {
                            self.metrics.observe_poll_latency(start.elapsed().as_secs_f64());
                            debug!(
                                sampled = results.sampled,
                                unavailable = results.unavailable,
                                elapsed_ms = start.elapsed().as_millis(),
                                "poll cycle complete"
                            );
                        }
                        Err(e) => {
                            self.metrics.inc_poll_errors();
                            warn!(error = %e, "poll cycle failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("shutting down poll loop");
                    break;
                }
            }
        }
    }

    /// Execute a single poll cycle
    ///
    /// Fails only when the runtime itself is unreachable (version or list
    /// call); per-container sampling failures are captured individually.
    pub async fn run_once(&self) -> Result<CycleResults> {
        let runtime_version = self.source.runtime_version().await?;
        let containers = self.source.list_containers().await?;

        self.metrics.set_containers_monitored(containers.len() as i64);

        let mut tasks = JoinSet::new();
        for container in containers {
            let source = Arc::clone(&self.source);
            let identity = build_identity(&container, &self.hostname);
            let runtime_version = runtime_version.clone();

            tasks.spawn(async move {
                let stats = match source.sample(&identity.id).await {
                    Ok(sample) => Some(derive_stats(&sample)),
                    Err(e) => {
                        debug!(
                            container_id = %identity.id,
                            error = %e,
                            "stats sample failed, emitting unavailable marker"
                        );
                        None
                    }
                };

                assemble_record(identity, &runtime_version, stats)
            });
        }

        let mut results = CycleResults::default();
        while let Some(joined) = tasks.join_next().await {
            let record = match joined {
                Ok(record) => record,
                Err(e) => {
                    // Task panicked; drop this container, keep the cycle
                    warn!(error = %e, "sampling task failed to join");
                    self.metrics.inc_sample_errors();
                    continue;
                }
            };

            if record.stats.is_some() {
                results.sampled += 1;
            } else {
                results.unavailable += 1;
                self.metrics.inc_sample_errors();
            }

            if let Err(e) = self.records_tx.send(record).await {
                warn!(error = %e, "record channel closed, dropping record");
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::async_trait;
    use crate::models::{RawCpuSample, RawMemorySample, RawStatsSample, RuntimeContainer};
    use std::collections::HashSet;

    /// Mock source with a configurable set of failing containers
    struct MockSource {
        containers: Vec<RuntimeContainer>,
        failing: HashSet<String>,
    }

    impl MockSource {
        fn new(containers: Vec<RuntimeContainer>) -> Self {
            Self {
                containers,
                failing: HashSet::new(),
            }
        }

        fn failing(mut self, id: &str) -> Self {
            self.failing.insert(id.to_string());
            self
        }
    }

    #[async_trait]
    impl StatsSource for MockSource {
        async fn runtime_version(&self) -> Result<String> {
            Ok("24.0.7".to_string())
        }

        async fn list_containers(&self) -> Result<Vec<RuntimeContainer>> {
            Ok(self.containers.clone())
        }

        async fn sample(&self, container_id: &str) -> Result<RawStatsSample> {
            if self.failing.contains(container_id) {
                anyhow::bail!("connection reset while reading stats");
            }

            Ok(RawStatsSample {
                cpu: RawCpuSample {
                    total_usage: 2000,
                    system_usage: 100_000,
                },
                precpu: RawCpuSample {
                    total_usage: 1000,
                    system_usage: 90_000,
                },
                memory: RawMemorySample {
                    usage_bytes: 52_428_800,
                    limit_bytes: 104_857_600,
                    swap_bytes: 0,
                },
            })
        }
    }

    fn container(id: &str) -> RuntimeContainer {
        RuntimeContainer {
            id: id.to_string(),
            name: format!("/{}", id),
            image: "nginx:latest".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cycle_emits_record_per_container() {
        let source = Arc::new(MockSource::new(vec![container("web"), container("db")]));
        let (poll_loop, mut rx) = PollLoop::new(source, "host1", PollConfig::default());

        let results = poll_loop.run_once().await.unwrap();
        assert_eq!(results.sampled, 2);
        assert_eq!(results.unavailable, 0);

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());

        for record in [first, second] {
            assert_eq!(record.runtime_version, "24.0.7");
            assert_eq!(record.hostname, "host1");
            let stats = record.stats.expect("stats should be derived");
            assert_eq!(stats.cpu.usage_percentage, Some(10));
            assert_eq!(stats.memory.usage_percentage, Some(50));
        }
    }

    #[tokio::test]
    async fn test_failed_container_does_not_abort_cycle() {
        let source = Arc::new(
            MockSource::new(vec![container("web"), container("db"), container("cache")])
                .failing("db"),
        );
        let (poll_loop, mut rx) = PollLoop::new(source, "host1", PollConfig::default());

        let results = poll_loop.run_once().await.unwrap();
        assert_eq!(results.sampled, 2);
        assert_eq!(results.unavailable, 1);

        let mut records = Vec::new();
        while let Ok(record) = rx.try_recv() {
            records.push(record);
        }
        assert_eq!(records.len(), 3);

        // The failed container is still reported, with a null marker
        let failed = records.iter().find(|r| r.id == "db").unwrap();
        assert!(failed.stats.is_none());
        assert_eq!(failed.container_full_name, "host1db");
    }

    #[tokio::test]
    async fn test_empty_container_list() {
        let source = Arc::new(MockSource::new(vec![]));
        let (poll_loop, mut rx) = PollLoop::new(source, "host1", PollConfig::default());

        let results = poll_loop.run_once().await.unwrap();
        assert_eq!(results, CycleResults::default());
        assert!(rx.try_recv().is_err());
    }
}
