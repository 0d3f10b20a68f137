//! Failure detection
//!
//! The sweeper periodically evicts nodes that stopped heartbeating and strips
//! their chunk records from every file. It never copies data: a file that
//! lost chunks while other nodes are still alive produces a
//! [`ReplicationNeeded`] event on a broadcast channel, and whoever wants to
//! repair the file has to subscribe to it.

use crate::common::METRICS;
use crate::coordinator::metadata::MetadataStore;
use crate::coordinator::registry::NodeRegistry;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the re-replication event channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// A file lost chunk records to dead nodes while other nodes remain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationNeeded {
    pub file_name: String,
    pub dead_nodes: Vec<String>,
    pub chunks_lost: usize,
    pub chunks_remaining: usize,
    pub timestamp: i64,
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: Vec<String>,
    pub files_affected: usize,
    pub chunks_dropped: usize,
    pub events: Vec<ReplicationNeeded>,
}

pub struct FailureSweeper {
    registry: Arc<NodeRegistry>,
    metadata: Arc<MetadataStore>,
    interval: Duration,
    timeout: Duration,
    events: broadcast::Sender<ReplicationNeeded>,
}

impl FailureSweeper {
    pub fn new(
        registry: Arc<NodeRegistry>,
        metadata: Arc<MetadataStore>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            metadata,
            interval,
            timeout,
            events,
        }
    }

    /// Subscribe to re-replication signals
    pub fn subscribe(&self) -> broadcast::Receiver<ReplicationNeeded> {
        self.events.subscribe()
    }

    /// Run one sweep as of `now`
    pub fn tick(&self, now: Instant) -> SweepReport {
        // Registry lock is released when evict_stale returns, before the
        // metadata lock is taken below.
        let evicted = self.registry.evict_stale(now, self.timeout);
        METRICS.active_nodes.set(self.registry.len() as u64);
        if evicted.is_empty() {
            return SweepReport::default();
        }

        for node in &evicted {
            tracing::warn!(node = %node, timeout = ?self.timeout, "Storage node is inactive, evicting");
        }
        METRICS.nodes_evicted.add(evicted.len() as u64);

        let dead: HashSet<String> = evicted.iter().cloned().collect();
        let losses = self.metadata.drop_chunks_on(&dead);
        let survivors = self.registry.len();

        let mut report = SweepReport {
            evicted: evicted.clone(),
            files_affected: losses.len(),
            ..Default::default()
        };

        for loss in losses {
            report.chunks_dropped += loss.removed.len();
            METRICS.chunk_records_dropped.add(loss.removed.len() as u64);

            let mut dead_nodes: Vec<String> = loss
                .removed
                .iter()
                .map(|chunk| chunk.node.clone())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            dead_nodes.sort();

            if survivors == 0 {
                tracing::error!(
                    file = %loss.file_name,
                    chunks_lost = loss.removed.len(),
                    "File lost chunks and no storage nodes remain"
                );
                continue;
            }

            let event = ReplicationNeeded {
                file_name: loss.file_name,
                dead_nodes,
                chunks_lost: loss.removed.len(),
                chunks_remaining: loss.remaining,
                timestamp: crate::common::timestamp_now(),
            };
            tracing::warn!(
                file = %event.file_name,
                chunks_lost = event.chunks_lost,
                chunks_remaining = event.chunks_remaining,
                "Need to re-replicate file"
            );
            METRICS.replication_needed.inc();
            // No subscriber is not an error
            let _ = self.events.send(event.clone());
            report.events.push(event);
        }

        report
    }

    /// Sweep every interval, forever
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let report = self.tick(Instant::now());
            if !report.evicted.is_empty() {
                tracing::info!(
                    evicted = report.evicted.len(),
                    files_affected = report.files_affected,
                    chunks_dropped = report.chunks_dropped,
                    "Sweep complete"
                );
            }
        }
    }

    /// Spawn the periodic sweep loop
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
