//! Destination for decoded ranges
//!
//! A sink owns the prefix trie and its serialization. The ingestion pipeline
//! only ever inserts ranges and, once every row is in, asks the sink to
//! write itself out.

use crate::decimal::Address;
use crate::error::SinkError;
use crate::record::GeoRecord;
use std::io::{self, Write};

/// Insert/finalize contract between the pipeline and the database writer
pub trait Sink {
    /// Insert every address in `[start, end]` with the given record
    ///
    /// Returns [`SinkError::Boundary`] when the endpoints are of different
    /// address families in the sink's representation, and
    /// [`SinkError::Aliased`] when (part of) the range lies inside a network
    /// that aliases IPv4 space.
    fn insert_range(
        &mut self,
        start: &Address,
        end: &Address,
        record: &GeoRecord,
    ) -> Result<(), SinkError>;

    /// Serialize the finished database
    fn finalize(&mut self, output: &mut dyn Write) -> io::Result<()>;
}
