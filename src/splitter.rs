//! Range insertion with IPv4-mapped boundary splitting
//!
//! IPv6 datasets describe IPv4 space as the IPv4-mapped block
//! `::ffff:0:0/96`, i.e. decimal values up to 2^48 - 1. The sink treats those
//! addresses as plain IPv4, so a range that starts inside the mapped block
//! and ends past it has endpoints of two different families. The sink
//! rejects such a range with [`SinkError::Boundary`]; this module splits it
//! at the block edge and inserts both halves.
//!
//! ```text
//!   start ............ 2^48-1 | 2^48 ............ end
//!   [start, 2^48-1] (IPv4)    | [2^48, end] (IPv6)
//! ```

use crate::decimal::{
    DecimalValue, MAPPED_BOUNDARY_FIRST, MAPPED_BOUNDARY_FIRST_VALUE, MAPPED_BOUNDARY_LAST,
    MAPPED_BOUNDARY_LAST_VALUE,
};
use crate::error::{IngestError, Result, SinkError};
use crate::record::GeoRecord;
use crate::sink::Sink;
use tracing::debug;

/// Decode a decimal range and insert it into the sink
///
/// Boundary rejections are split and retried, aliased ranges are skipped,
/// anything else aborts.
pub fn insert_record<S: Sink + ?Sized>(
    start: &str,
    end: &str,
    record: &GeoRecord,
    sink: &mut S,
) -> Result<()> {
    let start_value: DecimalValue = start.parse()?;
    let end_value: DecimalValue = end.parse()?;
    let start_addr = start_value.to_address()?;
    let end_addr = end_value.to_address()?;

    match sink.insert_range(&start_addr, &end_addr, record) {
        Ok(()) => Ok(()),
        Err(SinkError::Boundary(msg)) => {
            // Only a split that shrinks the span is allowed, so recursion ends
            if !straddles_mapped_boundary(&start_value, &end_value) {
                return Err(IngestError::Sink(format!(
                    "{}; range {}-{} does not cross the IPv4-mapped boundary",
                    msg, start, end
                )));
            }
            debug!(start = %start, end = %end, "splitting range at IPv4-mapped boundary");
            insert_record(start, MAPPED_BOUNDARY_LAST, record, sink)?;
            insert_record(MAPPED_BOUNDARY_FIRST, end, record, sink)
        }
        Err(SinkError::Aliased(msg)) => {
            debug!(start = %start, end = %end, "skipping aliased range: {}", msg);
            Ok(())
        }
        Err(SinkError::Other(msg)) => Err(IngestError::Sink(msg)),
    }
}

fn straddles_mapped_boundary(start: &DecimalValue, end: &DecimalValue) -> bool {
    *start <= DecimalValue::from(MAPPED_BOUNDARY_LAST_VALUE)
        && *end >= DecimalValue::from(MAPPED_BOUNDARY_FIRST_VALUE)
}
