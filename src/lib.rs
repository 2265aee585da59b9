//! ip2mmdb - Decimal-range geolocation CSV to MaxMind DB
//!
//! Geolocation vendors publish their IPv4 and IPv6 ranges as CSV rows whose
//! first two columns are the range endpoints written as base-10 integers.
//! This crate decodes those endpoints, builds a Country or City record from
//! the remaining columns and inserts the range into an MMDB v2.0 database
//! that any MaxMind reader can open.
//!
//! # Quick Start
//!
//! ```rust
//! use ip2mmdb::{ingest_csv, DatasetKind, MmdbWriter, Sink, WriterOptions};
//!
//! let csv = "\"16777216\",\"16777471\",\"AU\",\"Australia\"\n";
//! let summary = ingest_csv(csv.as_bytes(), DatasetKind::Country, || {
//!     MmdbWriter::new(WriterOptions::for_dataset(DatasetKind::Country))
//! })?;
//! assert_eq!(summary.rows_ingested, 1);
//!
//! let mut database = Vec::new();
//! if let Some(mut writer) = summary.sink {
//!     writer.finalize(&mut database)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//!  CSV row ──▶ record ──▶ GeoRecord ─┐
//!     │                              ▼
//!     └──▶ decimal ──▶ Address ──▶ splitter ──▶ Sink (MmdbWriter)
//!                                    ▲   │          │
//!                                    └───┘          ▼
//!                          split at 2^48 on     search tree +
//!                          SinkError::Boundary  data section
//! ```
//!
//! IPv6 datasets cover IPv4 space through the IPv4-mapped block
//! `::ffff:0:0/96`. The writer stores those addresses as plain IPv4, so a
//! range running from the mapped block into real IPv6 space is split at the
//! block edge and inserted as two ranges.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Data section encoding for MMDB
pub mod data_section;
/// Decimal address decoding
pub mod decimal;
/// Error types for ingestion
pub mod error;
/// Gzip-aware input opening
pub mod file_reader;
/// CSV ingestion run
pub mod ingest;
/// IP tree builder for MMDB format
pub mod ip_tree_builder;
/// MMDB writer sink
pub mod mmdb_writer;
/// Dataset schemas and records
pub mod record;
/// Sink contract
pub mod sink;
/// Range splitting at the IPv4-mapped boundary
pub mod splitter;

// Re-exports for Rust consumers

pub use crate::data_section::DataValue;
pub use crate::decimal::{decode, Address, DecimalValue};
pub use crate::error::{DecodeError, IngestError, SinkError};
pub use crate::ingest::{
    convert_csv_to_mmdb, ingest_csv, ingest_rows, BuildContext, IngestFailure, IngestSummary,
};
pub use crate::ip_tree_builder::RecordSize;
pub use crate::mmdb_writer::{MmdbWriter, WriterOptions};
pub use crate::record::{DatasetKind, GeoRecord};
pub use crate::sink::Sink;
pub use crate::splitter::insert_record;

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
