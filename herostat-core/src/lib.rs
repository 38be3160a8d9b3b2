//! # herostat core
//!
//! Incremental aggregation engine for hero staking, weapon crafting and gacha
//! game contracts.
//!
//! An ordered stream of typed [`events::DomainEvent`]s is folded into:
//!
//! - **Entities**: [`entity::Player`], [`entity::Hero`], [`entity::Weapon`]
//!   and the ephemeral [`entity::WeaponRequest`]
//! - **Aggregates**: [`stats::GlobalStats`], [`stats::UserStats`],
//!   [`stats::ZoneStats`] and [`stats::LevelStats`], whose distribution arrays
//!   always sum to their scalar totals and to each other across tiers
//! - **Audit records**: one [`audit::AuditRecord`] per meaningful action
//!
//! Every event runs through the two-phase protocol in [`engine`]: a
//! parallel-safe prefetch, then an apply step that commits all of its writes
//! in a single revision-checked batch.
//!
//! ## Failure classes
//!
//! - Missing required record: the event fails, nothing is written
//! - Counter underflow: clamped to zero (or rejected, see [`tally::ClampPolicy`])
//! - Unknown bucket index: that bucket is skipped with a warning
//! - Duplicate delivery: absorbed by the applied-event marker

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod config;
pub mod consistency;
pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod footprint;
pub mod formula;
pub mod metrics;
pub mod rules;
pub mod stats;
pub mod store;
pub mod tally;
pub mod types;

pub use config::HerostatConfig;
pub use engine::{ApplyOutcome, ApplyStatus, Engine, Prefetched};
pub use error::{HerostatError, Result};
pub use events::{DomainEvent, EventEnvelope};
pub use store::{EntityStore, MemoryStore, RecordStoreExt, SqliteStore, open_store};
pub use types::*;
