//! The two-phase event engine.
//!
//! Each event moves through **Prefetch → Apply → Committed**:
//!
//! 1. [`Engine::prefetch`] resolves every referenced record, creating the
//!    ones the event is allowed to create. It only reads otherwise, so many
//!    upcoming events may prefetch in parallel.
//! 2. [`Engine::apply`] re-validates each snapshot against the store
//!    (refetching stale ones), runs the event's rule inside an
//!    [`ApplyContext`], and commits every write in one revision-checked
//!    batch together with the event's audit records and applied-marker.
//!
//! A conflicting commit writes nothing; [`Engine::process`] discards the
//! prefetch and starts over, up to `engine.max_attempts` times.

pub mod context;
pub mod prefetch;

pub use context::ApplyContext;
pub use prefetch::{Prefetched, prefetch};

use tracing::{Level, debug, error, span, warn};

use crate::config::HerostatConfig;
use crate::error::{HerostatError, Result};
use crate::events::EventEnvelope;
use crate::metrics::{EngineCounters, LatencyMonitor, spans};
use crate::rules;
use crate::store::EntityStore;
use crate::types::EventId;

/// How an event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    /// Effects committed.
    Applied,
    /// Already committed earlier; nothing written.
    Duplicate,
}

/// Summary of one committed (or absorbed) event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// The event.
    pub event: EventId,
    /// Applied or duplicate.
    pub status: ApplyStatus,
    /// Entity and aggregate records written.
    pub records_written: usize,
    /// Audit records written.
    pub audits: usize,
    /// Counter updates clamped under the saturate policy.
    pub clamps: u32,
    /// Bucket updates skipped.
    pub skipped_buckets: u32,
    /// Prefetch snapshots found stale and refetched.
    pub stale_refetches: usize,
}

impl ApplyOutcome {
    fn duplicate(event: EventId, stale_refetches: usize) -> Self {
        Self {
            event,
            status: ApplyStatus::Duplicate,
            records_written: 0,
            audits: 0,
            clamps: 0,
            skipped_buckets: 0,
            stale_refetches,
        }
    }
}

/// Applies events to an [`EntityStore`].
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    config: HerostatConfig,
    counters: EngineCounters,
    latency: LatencyMonitor,
}

impl<S: EntityStore> Engine<S> {
    /// An engine over `store`.
    #[must_use]
    pub fn new(store: S, config: HerostatConfig) -> Self {
        Self {
            store,
            config,
            counters: EngineCounters::new(),
            latency: LatencyMonitor::new(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &HerostatConfig {
        &self.config
    }

    /// Runtime counters.
    #[must_use]
    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    /// Apply latency history.
    #[must_use]
    pub fn latency(&self) -> &LatencyMonitor {
        &self.latency
    }

    /// Prefetch phase for `envelope`.
    ///
    /// # Errors
    /// Returns storage or decode errors.
    pub fn prefetch(&self, envelope: &EventEnvelope) -> Result<Prefetched> {
        let span = span!(Level::TRACE, spans::PREFETCH, event = %envelope.id);
        let _enter = span.enter();
        prefetch(&self.store, envelope)
    }

    /// Apply phase for `envelope` using `prefetched` snapshots.
    ///
    /// # Errors
    /// - [`HerostatError::MissingEntity`] when a required record is absent
    /// - [`HerostatError::CounterUnderflow`] under the `reject` clamp policy
    /// - [`HerostatError::Conflict`] when a record moved before commit
    ///
    /// Nothing is written when an error is returned.
    pub fn apply(&self, envelope: &EventEnvelope, prefetched: Prefetched) -> Result<ApplyOutcome> {
        let span = span!(Level::DEBUG, spans::APPLY, event = %envelope.id, kind = envelope.event.name());
        let _enter = span.enter();
        let _latency = self.latency.start();

        let mut snapshots = prefetched.into_snapshots();
        let mut stale = 0;
        for (key, snapshot) in &mut snapshots {
            let current = self.store.revision(key)?;
            if current != snapshot.as_ref().map(|s| s.revision) {
                debug!(%key, "Prefetched snapshot is stale, refetching");
                *snapshot = self.store.get(key)?;
                stale += 1;
            }
        }
        EngineCounters::add(&self.counters.stale_refetches, stale as u64);

        let mut ctx = ApplyContext::new(&self.store, envelope, &self.config, snapshots);
        if ctx.already_applied()? {
            debug!("Event already applied, duplicate delivery absorbed");
            EngineCounters::add(&self.counters.duplicates, 1);
            return Ok(ApplyOutcome::duplicate(envelope.id, stale));
        }

        rules::dispatch(&mut ctx, &envelope.event)?;
        ctx.guard.finish()?;
        let clamps = ctx.guard.clamps();
        let skipped_buckets = ctx.guard.skips();

        let (batch, audits) = ctx.into_batch()?;
        let records_written = batch.ops.len().saturating_sub(audits + 1);
        {
            let span = span!(Level::TRACE, spans::COMMIT, ops = batch.ops.len());
            let _enter = span.enter();
            self.store.commit(batch)?;
        }

        let c = &self.counters;
        EngineCounters::add(&c.events_applied, 1);
        EngineCounters::add(&c.records_written, records_written as u64);
        EngineCounters::add(&c.audits_written, audits as u64);
        EngineCounters::add(&c.clamped_decrements, u64::from(clamps));
        EngineCounters::add(&c.skipped_buckets, u64::from(skipped_buckets));
        debug!(records_written, audits, clamps, "Event committed");

        Ok(ApplyOutcome {
            event: envelope.id,
            status: ApplyStatus::Applied,
            records_written,
            audits,
            clamps,
            skipped_buckets,
            stale_refetches: stale,
        })
    }

    /// Prefetch and apply `envelope`, retrying from scratch on transient
    /// failures.
    ///
    /// # Errors
    /// Returns the first non-transient error, or
    /// [`HerostatError::RetriesExhausted`].
    pub fn process(&self, envelope: &EventEnvelope) -> Result<ApplyOutcome> {
        self.process_prefetched(envelope, None)
    }

    /// Like [`Engine::process`], using `prefetched` for the first attempt
    /// when given. Later attempts always prefetch again.
    ///
    /// # Errors
    /// Returns the first non-transient error, or
    /// [`HerostatError::RetriesExhausted`].
    pub fn process_prefetched(
        &self,
        envelope: &EventEnvelope,
        prefetched: Option<Prefetched>,
    ) -> Result<ApplyOutcome> {
        let span = span!(Level::DEBUG, spans::PROCESS, event = %envelope.id);
        let _enter = span.enter();

        let max_attempts = self.config.engine.max_attempts.max(1);
        let mut prefetched = prefetched.filter(|p| p.event() == envelope.id);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match prefetched.take() {
                Some(p) => self.apply(envelope, p),
                None => self.prefetch(envelope).and_then(|p| self.apply(envelope, p)),
            };
            match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    EngineCounters::add(&self.counters.transient_retries, 1);
                    debug!(attempt, error = %err, "Transient failure, retrying from prefetch");
                }
                Err(err) if err.is_transient() => {
                    EngineCounters::add(&self.counters.retries_exhausted, 1);
                    warn!(attempts = attempt, error = %err, "Giving up on event");
                    return Err(HerostatError::RetriesExhausted {
                        event: envelope.id,
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }
                Err(err) => {
                    if err.is_ordering_violation() {
                        EngineCounters::add(&self.counters.ordering_violations, 1);
                        error!(
                            event = %envelope.id,
                            kind = envelope.event.name(),
                            contract = %envelope.contract,
                            error = %err,
                            "Ordering violation, event not applied"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}
