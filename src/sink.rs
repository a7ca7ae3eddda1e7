// AgriSim - Record sinks
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Record sinks
//!
//! A sink receives records one at a time as the engine produces them. The
//! CSV sink writes one record per row, the JSON Lines sink one record per
//! line (one message per record). Both write absent measurements as nulls.

use crate::error::{Result, SinkError};
use crate::record::{SensorRecord, SCHEMA};
use crate::summary::RunSummary;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Destination for generated records
pub trait RecordSink {
    /// Accept one record
    fn write(&mut self, record: &SensorRecord) -> std::result::Result<(), SinkError>;

    /// Flush buffered output once the run is over
    fn finish(&mut self) -> std::result::Result<(), SinkError> {
        Ok(())
    }
}

/// Pull every record from `records` into `sink`.
///
/// Stops at the first engine or sink error and returns it. On success the
/// sink has been finished and the summary covers every record written.
pub fn drive<I, S>(records: I, sink: &mut S) -> Result<RunSummary>
where
    I: IntoIterator<Item = Result<SensorRecord>>,
    S: RecordSink + ?Sized,
{
    let mut summary = RunSummary::new();
    for record in records {
        let record = record?;
        sink.write(&record)?;
        summary.observe(&record);
    }
    sink.finish()?;

    info!(
        "Wrote {} records for {} farms",
        summary.total_records,
        summary.records_per_farm.len()
    );
    Ok(summary)
}

/// CSV sink; empty cells mark absent measurements
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    written: u64,
}

impl<W: Write> CsvSink<W> {
    /// Wrap a writer and emit the header row
    pub fn new(inner: W) -> std::result::Result<Self, SinkError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(SCHEMA)?;
        Ok(Self { writer, written: 0 })
    }

    /// Records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> std::result::Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) a CSV file
    pub fn create(path: impl AsRef<Path>) -> std::result::Result<Self, SinkError> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write(&mut self, record: &SensorRecord) -> std::result::Result<(), SinkError> {
        self.writer.serialize(record)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> std::result::Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// JSON Lines sink; `null` marks absent measurements
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (or truncate) a JSON Lines file
    pub fn create(path: impl AsRef<Path>) -> std::result::Result<Self, SinkError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, record: &SensorRecord) -> std::result::Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> std::result::Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink for tests and small runs
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<SensorRecord>,
    limit: Option<usize>,
}

impl MemorySink {
    /// Create an unbounded sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that rejects records beyond `limit`
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Records collected so far
    pub fn records(&self) -> &[SensorRecord] {
        &self.records
    }

    /// Take the collected records
    pub fn into_records(self) -> Vec<SensorRecord> {
        self.records
    }
}

impl RecordSink for MemorySink {
    fn write(&mut self, record: &SensorRecord) -> std::result::Result<(), SinkError> {
        if let Some(limit) = self.limit {
            if self.records.len() >= limit {
                return Err(SinkError::Closed {
                    written: self.records.len() as u64,
                });
            }
        }
        self.records.push(record.clone());
        Ok(())
    }
}
