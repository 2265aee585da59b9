//! CSV ingestion run
//!
//! Rows are processed strictly in order: each one is checked against the
//! dataset schema, turned into a record and inserted (splits included)
//! before the next row is read. The first fatal error stops the run and the
//! caller learns how many rows made it in.
//!
//! Exports: `BuildContext`, `IngestSummary`, `IngestFailure`, `ingest_rows`,
//! `ingest_csv`, `convert_csv_to_mmdb`.

use crate::error::IngestError;
use crate::file_reader;
use crate::mmdb_writer::{MmdbWriter, WriterOptions};
use crate::record::DatasetKind;
use crate::sink::Sink;
use crate::splitter::insert_record;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;
use tracing::{info, warn};

/// Read buffer for the CSV parser
const CSV_BUFFER_SIZE: usize = 64 * 1024;

/// Per-run state handed to every row
///
/// Owns the sink, which is only created once the first row has produced a
/// record, so an input that fails immediately never allocates one.
pub struct BuildContext<S, F> {
    sink: Option<S>,
    make_sink: F,
}

impl<S, F> BuildContext<S, F>
where
    S: Sink,
    F: FnMut() -> S,
{
    /// Context whose sink will come from `make_sink`
    pub fn new(make_sink: F) -> Self {
        Self {
            sink: None,
            make_sink,
        }
    }

    /// The run's sink, created on first use
    pub fn sink(&mut self) -> &mut S {
        let make_sink = &mut self.make_sink;
        self.sink.get_or_insert_with(make_sink)
    }

    /// The sink, if any row got far enough to create it
    pub fn into_sink(self) -> Option<S> {
        self.sink
    }
}

/// Result of a run that read its whole input
pub struct IngestSummary<S> {
    /// Rows fully inserted
    pub rows_ingested: u64,
    /// `None` when the input had no rows
    pub sink: Option<S>,
}

impl<S> fmt::Debug for IngestSummary<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestSummary")
            .field("rows_ingested", &self.rows_ingested)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// A run stopped by a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    /// Rows fully inserted before the failing one
    pub rows_ingested: u64,
    /// What stopped the run
    pub error: IngestError,
}

impl IngestFailure {
    fn new(rows_ingested: u64, error: impl Into<IngestError>) -> Self {
        Self {
            rows_ingested,
            error: error.into(),
        }
    }
}

impl fmt::Display for IngestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} rows)", self.error, self.rows_ingested)
    }
}

impl std::error::Error for IngestFailure {}

/// Insert every row into a lazily created sink
///
/// Rows must already be split into fields; the first two are the decimal
/// range endpoints.
pub fn ingest_rows<I, S, F>(
    rows: I,
    kind: DatasetKind,
    make_sink: F,
) -> Result<IngestSummary<S>, IngestFailure>
where
    I: IntoIterator<Item = Result<Vec<String>, IngestError>>,
    S: Sink,
    F: FnMut() -> S,
{
    let mut ctx = BuildContext::new(make_sink);
    let mut rows_ingested = 0u64;

    for row in rows {
        let fields = row.map_err(|e| IngestFailure::new(rows_ingested, e))?;
        let record = kind
            .build_record(&fields)
            .map_err(|e| IngestFailure::new(rows_ingested, e))?;

        insert_record(&fields[0], &fields[1], &record, ctx.sink())
            .map_err(|e| IngestFailure::new(rows_ingested, e))?;
        rows_ingested += 1;
    }

    Ok(IngestSummary {
        rows_ingested,
        sink: ctx.into_sink(),
    })
}

/// Parse headerless CSV and ingest it
///
/// Column counts are not enforced by the parser; a row of the wrong width
/// fails the schema check instead.
pub fn ingest_csv<R, S, F>(
    reader: R,
    kind: DatasetKind,
    make_sink: F,
) -> Result<IngestSummary<S>, IngestFailure>
where
    R: Read,
    S: Sink,
    F: FnMut() -> S,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .buffer_capacity(CSV_BUFFER_SIZE)
        .from_reader(reader);

    let rows = csv_reader.records().map(|record| {
        record
            .map(|r| r.iter().map(str::to_string).collect())
            .map_err(IngestError::from)
    });
    ingest_rows(rows, kind, make_sink)
}

/// Convert a CSV dataset file into an MMDB file
///
/// `input` may be `-` for stdin or a `.gz` file. The output file is only
/// created once every row has been ingested. Returns the number of rows
/// written.
pub fn convert_csv_to_mmdb(
    input: &Path,
    output: &Path,
    kind: DatasetKind,
    options: WriterOptions,
) -> Result<u64, IngestFailure> {
    info!(input = %input.display(), kind = %kind, "importing CSV");

    let reader = file_reader::open(input).map_err(|e| IngestFailure::new(0, e))?;
    let summary = ingest_csv(reader, kind, || MmdbWriter::new(options.clone()))?;

    let rows = summary.rows_ingested;
    let Some(mut writer) = summary.sink else {
        warn!(input = %input.display(), "input contains no rows");
        return Err(IngestFailure::new(0, IngestError::Empty));
    };

    info!("writing {} entries to {}", rows, output.display());
    let file = File::create(output).map_err(|e| IngestFailure::new(rows, e))?;
    let mut out = BufWriter::new(file);
    writer
        .finalize(&mut out)
        .map_err(|e| IngestFailure::new(rows, e))?;

    info!(
        rows,
        ranges = writer.range_count(),
        nodes = writer.node_count(),
        "import complete"
    );
    Ok(rows)
}
