//! MaxMind DB writer
//!
//! The [`Sink`] used by the ingestion pipeline. Ranges go into an IPv6 search
//! tree, records into a de-duplicated data section, and `finalize` lays the
//! file out as MMDB v2.0:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  1. Search tree (node_count nodes)   │
//! │  2. 16 zero bytes                    │
//! │  3. Data section                     │
//! │  4. "\xAB\xCD\xEFMaxMind.com"        │
//! │  5. Metadata map                     │
//! └──────────────────────────────────────┘
//! ```

use crate::data_section::{DataEncoder, DataValue};
use crate::decimal::Address;
use crate::error::SinkError;
use crate::ip_tree_builder::{InsertOutcome, IpTreeBuilder, RecordSize};
use crate::record::{DatasetKind, GeoRecord};
use crate::sink::Sink;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Separator between the search tree and the data section
const DATA_SECTION_SEPARATOR: [u8; 16] = [0; 16];

/// Database-level settings written to the metadata
#[derive(Debug, Clone)]
pub struct WriterOptions {
    database_type: String,
    description: BTreeMap<String, String>,
    languages: Vec<String>,
    record_size: RecordSize,
    ipv4_aliasing: bool,
}

impl WriterOptions {
    /// Options with the given database type and defaults for the rest
    ///
    /// The English description defaults to the database type.
    pub fn new(database_type: impl Into<String>) -> Self {
        Self {
            database_type: database_type.into(),
            description: BTreeMap::new(),
            languages: vec!["en".to_string()],
            record_size: RecordSize::Bits28,
            ipv4_aliasing: true,
        }
    }

    /// Defaults for a dataset schema
    pub fn for_dataset(kind: DatasetKind) -> Self {
        Self::new(kind.database_type())
    }

    /// Override the database type
    pub fn with_database_type(mut self, database_type: impl Into<String>) -> Self {
        self.database_type = database_type.into();
        self
    }

    /// Add a description in a specific language
    ///
    /// Can be called multiple times for different languages.
    pub fn with_description(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.description.insert(language.into(), text.into());
        self
    }

    /// Languages the record names are available in
    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    /// Bits per search tree record
    pub fn with_record_size(mut self, record_size: RecordSize) -> Self {
        self.record_size = record_size;
        self
    }

    /// Whether `::ffff:0:0/96` and `2002::/16` alias the IPv4 subtree
    pub fn with_ipv4_aliasing(mut self, enabled: bool) -> Self {
        self.ipv4_aliasing = enabled;
        self
    }

    /// Database type written to the metadata
    pub fn database_type(&self) -> &str {
        &self.database_type
    }

    /// Bits per search tree record
    pub fn record_size(&self) -> RecordSize {
        self.record_size
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::for_dataset(DatasetKind::Country)
    }
}

/// Address family as the tree sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

/// IPv4-mapped addresses count as IPv4. Returns the family and the position
/// in the 128-bit tree, where IPv4 lives under `::/96`.
fn canonical(addr: &Address) -> (Family, u128) {
    match addr {
        Address::V4(octets) => (Family::V4, u32::from_be_bytes(*octets) as u128),
        Address::V6(_) => {
            let value = addr.to_u128();
            if value >> 32 == 0xFFFF {
                (Family::V4, value & 0xFFFF_FFFF)
            } else {
                (Family::V6, value)
            }
        }
    }
}

/// MMDB database writer
pub struct MmdbWriter {
    options: WriterOptions,
    tree: IpTreeBuilder,
    data: DataEncoder,
    ranges: usize,
}

impl MmdbWriter {
    /// Create an empty database
    pub fn new(options: WriterOptions) -> Self {
        let tree = IpTreeBuilder::new(options.ipv4_aliasing);
        Self {
            options,
            tree,
            data: DataEncoder::new(),
            ranges: 0,
        }
    }

    /// Number of ranges with at least one network stored
    pub fn range_count(&self) -> usize {
        self.ranges
    }

    /// Number of search tree nodes so far
    pub fn node_count(&self) -> u32 {
        self.tree.node_count()
    }

    /// Serialize the whole database
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let tree = self.tree.build(self.options.record_size)?;
        let metadata = DataEncoder::encode_standalone(&self.metadata());

        let mut database = Vec::with_capacity(
            tree.len() + DATA_SECTION_SEPARATOR.len() + self.data.len() + METADATA_MARKER.len() + metadata.len(),
        );
        database.extend_from_slice(&tree);
        database.extend_from_slice(&DATA_SECTION_SEPARATOR);
        database.extend_from_slice(self.data.as_bytes());
        database.extend_from_slice(METADATA_MARKER);
        database.extend_from_slice(&metadata);
        Ok(database)
    }

    fn metadata(&self) -> DataValue {
        let build_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let description = if self.options.description.is_empty() {
            BTreeMap::from([(
                "en".to_string(),
                DataValue::String(self.options.database_type.clone()),
            )])
        } else {
            self.options
                .description
                .iter()
                .map(|(k, v)| (k.clone(), DataValue::String(v.clone())))
                .collect()
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("binary_format_major_version".to_string(), DataValue::Uint16(2));
        metadata.insert("binary_format_minor_version".to_string(), DataValue::Uint16(0));
        metadata.insert("build_epoch".to_string(), DataValue::Uint64(build_epoch));
        metadata.insert(
            "database_type".to_string(),
            DataValue::String(self.options.database_type.clone()),
        );
        metadata.insert("description".to_string(), DataValue::Map(description));
        metadata.insert(
            "languages".to_string(),
            DataValue::Array(
                self.options
                    .languages
                    .iter()
                    .map(|l| DataValue::String(l.clone()))
                    .collect(),
            ),
        );
        metadata.insert("ip_version".to_string(), DataValue::Uint16(6));
        metadata.insert("node_count".to_string(), DataValue::Uint32(self.tree.node_count()));
        metadata.insert(
            "record_size".to_string(),
            DataValue::Uint16(self.options.record_size.bits()),
        );
        DataValue::Map(metadata)
    }
}

impl Sink for MmdbWriter {
    fn insert_range(
        &mut self,
        start: &Address,
        end: &Address,
        record: &GeoRecord,
    ) -> Result<(), SinkError> {
        let (start_family, start_bits) = canonical(start);
        let (end_family, end_bits) = canonical(end);

        if start_family != end_family {
            return Err(SinkError::Boundary(format!(
                "start & end IPs did not give valid range: {} - {}",
                start, end
            )));
        }
        if start_bits > end_bits {
            return Err(SinkError::Other(format!(
                "start IP {} is after end IP {}",
                start, end
            )));
        }

        // Records of fully aliased ranges never reach the data section
        let data = &mut self.data;
        let outcome = self
            .tree
            .insert_range_with(start_bits, end_bits, || data.encode(&record.to_data_value()));

        match outcome {
            InsertOutcome::Inserted => {
                self.ranges += 1;
                Ok(())
            }
            InsertOutcome::PartiallyAliased => {
                self.ranges += 1;
                Err(SinkError::Aliased(format!(
                    "{} - {} is partly in an aliased network",
                    start, end
                )))
            }
            InsertOutcome::Aliased => Err(SinkError::Aliased(format!(
                "{} - {} is in an aliased network",
                start, end
            ))),
        }
    }

    fn finalize(&mut self, output: &mut dyn Write) -> io::Result<()> {
        let database = self.to_bytes()?;
        debug!(
            nodes = self.tree.node_count(),
            data_bytes = self.data.len(),
            total_bytes = database.len(),
            "writing MMDB database"
        );
        output.write_all(&database)?;
        output.flush()
    }
}
