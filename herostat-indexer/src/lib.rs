//! # herostat indexer
//!
//! Drives ordered event streams through a [`herostat_core::Engine`].
//!
//! - [`source`]: where events come from ([`VecSource`], [`JsonLinesSource`])
//! - [`pipeline`]: prefetch ahead on the blocking pool, apply strictly in
//!   arrival order
//! - [`telemetry`]: `tracing-subscriber` setup from [`herostat_core::config::GeneralConfig`]

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod pipeline;
pub mod source;
pub mod telemetry;

pub use error::{IndexerError, Result};
pub use pipeline::{Pipeline, PipelineReport};
pub use source::{EventSource, JsonLinesSource, VecSource};
