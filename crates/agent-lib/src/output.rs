//! JSON-line record emitter
//!
//! Drains the record channel and writes one JSON object per line to any
//! async writer (stdout in production). Serialization failures are logged
//! and skipped; a write failure terminates the emitter.

use crate::models::ContainerRecord;
use crate::observability::AgentMetrics;
use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Writes container records as newline-delimited JSON
pub struct JsonLineEmitter<W> {
    writer: W,
    metrics: AgentMetrics,
}

impl<W: AsyncWrite + Unpin> JsonLineEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            metrics: AgentMetrics::new(),
        }
    }

    /// Drain records until the channel closes
    pub async fn run(mut self, mut records_rx: mpsc::Receiver<ContainerRecord>) -> Result<()> {
        while let Some(record) = records_rx.recv().await {
            let mut line = match serde_json::to_vec(&record) {
                Ok(line) => line,
                Err(e) => {
                    error!(container_id = %record.id, error = %e, "failed to serialize record");
                    continue;
                }
            };
            line.push(b'\n');

            self.writer
                .write_all(&line)
                .await
                .context("failed to write record to output stream")?;
            self.writer
                .flush()
                .await
                .context("failed to flush output stream")?;

            self.metrics.inc_records_emitted();
        }

        info!("record channel closed, emitter stopping");
        Ok(())
    }
}
