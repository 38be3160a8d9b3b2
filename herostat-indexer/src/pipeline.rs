//! The pipelined driver.
//!
//! Up to `engine.prefetch_window` upcoming events are prefetched in parallel
//! on tokio's blocking pool while the head of the queue is applied. Apply
//! order is always arrival order; a prefetch that went stale in the meantime
//! is caught by the engine's revision check, and a transient apply failure
//! re-runs prefetch inside [`Engine::process_prefetched`].

use std::collections::VecDeque;
use std::sync::Arc;

use herostat_core::metrics::spans;
use herostat_core::{ApplyStatus, Engine, EntityStore, EventEnvelope, Prefetched};
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::error::{IndexerError, Result};
use crate::source::EventSource;

/// Totals for one [`Pipeline::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Events committed.
    pub applied: u64,
    /// Events absorbed as duplicate deliveries.
    pub duplicates: u64,
    /// Events refused as ordering violations.
    pub failed: u64,
    /// Counter updates clamped across all applied events.
    pub clamps: u64,
}

impl PipelineReport {
    /// Events taken from the source.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.applied + self.duplicates + self.failed
    }
}

type PendingPrefetch = (EventEnvelope, JoinHandle<herostat_core::Result<Prefetched>>);

/// Feeds an [`EventSource`] through an [`Engine`].
#[derive(Debug)]
pub struct Pipeline<S> {
    engine: Arc<Engine<S>>,
    window: usize,
}

impl<S: EntityStore + 'static> Pipeline<S> {
    /// A pipeline over `engine`, windowed by its configured prefetch window.
    #[must_use]
    pub fn new(engine: Arc<Engine<S>>) -> Self {
        let window = engine.config().engine.prefetch_window.max(1);
        Self { engine, window }
    }

    /// Override the prefetch window.
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// The engine being fed.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine<S>> {
        &self.engine
    }

    /// Drain `source`, applying every event in order.
    ///
    /// Ordering violations are counted and skipped. Any other engine error
    /// stops the run, since later events would be applied over a gap.
    ///
    /// # Errors
    /// Returns source errors, join errors, and non-ordering engine errors.
    pub async fn run<E: EventSource>(&self, source: &mut E) -> Result<PipelineReport> {
        let span = span!(Level::INFO, spans::PIPELINE, window = self.window);
        self.drain(source).instrument(span).await
    }

    async fn drain<E: EventSource>(&self, source: &mut E) -> Result<PipelineReport> {
        info!("Pipeline started");
        let mut report = PipelineReport::default();
        let mut pending: VecDeque<PendingPrefetch> = VecDeque::with_capacity(self.window);
        let mut drained = false;

        loop {
            while !drained && pending.len() < self.window {
                match source.next_event()? {
                    Some(envelope) => {
                        let handle = self.spawn_prefetch(envelope.clone());
                        pending.push_back((envelope, handle));
                    }
                    None => drained = true,
                }
            }
            let Some((envelope, handle)) = pending.pop_front() else {
                break;
            };

            let prefetched = match handle.await? {
                Ok(prefetched) => Some(prefetched),
                Err(err) => {
                    debug!(event = %envelope.id, error = %err, "Prefetch failed, apply will prefetch again");
                    None
                }
            };

            let engine = Arc::clone(&self.engine);
            let id = envelope.id;
            let result =
                tokio::task::spawn_blocking(move || engine.process_prefetched(&envelope, prefetched))
                    .await?;
            match result {
                Ok(outcome) => match outcome.status {
                    ApplyStatus::Applied => {
                        report.applied += 1;
                        report.clamps += u64::from(outcome.clamps);
                    }
                    ApplyStatus::Duplicate => report.duplicates += 1,
                },
                Err(err) if err.is_ordering_violation() => {
                    report.failed += 1;
                }
                Err(err) => {
                    warn!(event = %id, error = %err, "Pipeline stopped");
                    return Err(IndexerError::Engine(err));
                }
            }
        }

        let latency = self.engine.latency().percentiles();
        info!(
            applied = report.applied,
            duplicates = report.duplicates,
            failed = report.failed,
            clamps = report.clamps,
            latency = %latency.summary(),
            "Pipeline finished"
        );
        Ok(report)
    }

    fn spawn_prefetch(&self, envelope: EventEnvelope) -> JoinHandle<herostat_core::Result<Prefetched>> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.prefetch(&envelope))
    }
}
