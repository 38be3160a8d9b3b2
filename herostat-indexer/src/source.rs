//! Ordered event sources.
//!
//! A source yields envelopes in the order the chain emitted them. The
//! pipeline never reorders, so a source that is out of order produces
//! ordering violations downstream rather than silently wrong aggregates.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use herostat_core::EventEnvelope;
use tracing::{debug, info};

use crate::error::{IndexerError, Result};

/// A stream of events in chain order.
pub trait EventSource: Send {
    /// The next event, or `None` when the source is drained.
    ///
    /// # Errors
    /// Returns I/O or decode errors; the source may not be resumable after.
    fn next_event(&mut self) -> Result<Option<EventEnvelope>>;
}

/// Events held in memory.
#[derive(Debug, Default)]
pub struct VecSource {
    events: std::vec::IntoIter<EventEnvelope>,
}

impl VecSource {
    /// A source yielding `events` front to back.
    #[must_use]
    pub fn new(events: Vec<EventEnvelope>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }

    /// Events not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for VecSource {
    fn next_event(&mut self) -> Result<Option<EventEnvelope>> {
        Ok(self.events.next())
    }
}

/// Newline-delimited JSON envelopes, one per line.
///
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead + Send> JsonLinesSource<R> {
    /// Read envelopes from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Lines consumed so far.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }
}

impl JsonLinesSource<BufReader<File>> {
    /// Open an NDJSON file.
    ///
    /// # Errors
    /// Returns `IndexerError::Io` if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened event file");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + Send> EventSource for JsonLinesSource<R> {
    fn next_event(&mut self) -> Result<Option<EventEnvelope>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                debug!(lines = self.line, "Event file drained");
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return serde_json::from_str(text)
                .map(Some)
                .map_err(|source| IndexerError::Decode {
                    line: self.line,
                    source,
                });
        }
    }
}
