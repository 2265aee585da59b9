//! MMDB data section encoding
//!
//! Geolocation records are stored once in the data section and referenced by
//! offset from the search tree. Identical records (every split half of a
//! range, every range of the same city) share a single encoded copy.
//!
//! # Format
//!
//! Each value starts with a control byte: the top 3 bits are the type, the
//! low 5 bits the payload size. Type 0 means "extended": the real type minus
//! 7 follows in the next byte. Sizes of 29 and above spill into 1 to 3
//! additional bytes.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

const TYPE_STRING: u8 = 2;
const TYPE_DOUBLE: u8 = 3;
const TYPE_UINT16: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_MAP: u8 = 7;
const TYPE_UINT64: u8 = 9;
const TYPE_ARRAY: u8 = 11;

/// Value that can be stored in the data section
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Key-value map, keys written in sorted order
    Map(BTreeMap<String, DataValue>),
    /// Ordered list of values
    Array(Vec<DataValue>),
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

/// Data section encoder
///
/// Builds a data section by encoding values and tracking offsets.
/// Identical values get the same offset.
#[derive(Default)]
pub struct DataEncoder {
    buffer: Vec<u8>,
    dedup: FxHashMap<Vec<u8>, u32>,
}

impl DataEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a value and return its offset in the data section
    pub fn encode(&mut self, value: &DataValue) -> u32 {
        let mut encoded = Vec::new();
        write_value(value, &mut encoded);

        if let Some(&offset) = self.dedup.get(&encoded) {
            return offset;
        }

        let offset = self.buffer.len() as u32;
        self.buffer.extend_from_slice(&encoded);
        self.dedup.insert(encoded, offset);
        offset
    }

    /// Current size of the data section in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been encoded yet
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Encoded data section
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Encode a single value without de-duplication (used for metadata)
    pub fn encode_standalone(value: &DataValue) -> Vec<u8> {
        let mut out = Vec::new();
        write_value(value, &mut out);
        out
    }
}

fn write_value(value: &DataValue, out: &mut Vec<u8>) {
    match value {
        DataValue::String(s) => {
            write_control(TYPE_STRING, s.len(), out);
            out.extend_from_slice(s.as_bytes());
        }
        DataValue::Double(d) => {
            write_control(TYPE_DOUBLE, 8, out);
            out.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Uint16(n) => write_uint(TYPE_UINT16, &n.to_be_bytes(), out),
        DataValue::Uint32(n) => write_uint(TYPE_UINT32, &n.to_be_bytes(), out),
        DataValue::Uint64(n) => write_uint(TYPE_UINT64, &n.to_be_bytes(), out),
        DataValue::Map(map) => {
            write_control(TYPE_MAP, map.len(), out);
            for (key, value) in map {
                write_control(TYPE_STRING, key.len(), out);
                out.extend_from_slice(key.as_bytes());
                write_value(value, out);
            }
        }
        DataValue::Array(items) => {
            write_control(TYPE_ARRAY, items.len(), out);
            for item in items {
                write_value(item, out);
            }
        }
    }
}

/// Unsigned integers are stored without leading zero bytes
fn write_uint(type_id: u8, be_bytes: &[u8], out: &mut Vec<u8>) {
    let skip = be_bytes.iter().take_while(|&&b| b == 0).count();
    let payload = &be_bytes[skip..];
    write_control(type_id, payload.len(), out);
    out.extend_from_slice(payload);
}

fn write_control(type_id: u8, size: usize, out: &mut Vec<u8>) {
    let (type_bits, extended) = if type_id > 7 {
        (0u8, Some(type_id - 7))
    } else {
        (type_id << 5, None)
    };

    let (size_bits, spill): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 29 + 256 {
        (29, vec![(size - 29) as u8])
    } else if size < 29 + 256 + 65536 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65821) as u32).to_be_bytes()[1..].to_vec())
    };

    out.push(type_bits | size_bits);
    if let Some(ext) = extended {
        out.push(ext);
    }
    out.extend_from_slice(&spill);
}
