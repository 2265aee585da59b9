//! Decimal address decoding
//!
//! Geolocation CSV datasets encode range endpoints as base-10 integers. This
//! module turns such a literal into a fixed-width big-endian address: four
//! bytes when the value fits in 32 bits, sixteen bytes when it fits in 128.
//!
//! ```
//! use ip2mmdb::decimal::{decode, Address};
//!
//! assert_eq!(decode("16777216")?, Address::V4([1, 0, 0, 0]));
//! assert_eq!(decode("281474976710656")?.octets().len(), 16);
//! # Ok::<(), ip2mmdb::error::DecodeError>(())
//! ```

use crate::error::DecodeError;
use num_bigint::BigUint;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Largest value with a 4-byte encoding
pub const IPV4_MAX: &str = "4294967295";

/// Largest value with a 16-byte encoding (2^128 - 1)
pub const IPV6_MAX: &str = "340282366920938463463374607431768211455";

/// Last decimal value inside the IPv4-mapped block `::ffff:0:0/96` (2^48 - 1)
pub const MAPPED_BOUNDARY_LAST: &str = "281474976710655";

/// First decimal value past the IPv4-mapped block (2^48)
pub const MAPPED_BOUNDARY_FIRST: &str = "281474976710656";

/// [`MAPPED_BOUNDARY_LAST`] as an integer
pub const MAPPED_BOUNDARY_LAST_VALUE: u128 = (1 << 48) - 1;

/// [`MAPPED_BOUNDARY_FIRST`] as an integer
pub const MAPPED_BOUNDARY_FIRST_VALUE: u128 = 1 << 48;

/// Non-negative integer of unbounded size parsed from a base-10 literal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecimalValue(BigUint);

impl DecimalValue {
    /// Encode as an address, choosing the narrowest width that holds the value
    pub fn to_address(&self) -> Result<Address, DecodeError> {
        if let Some(octets) = self.to_fixed_width::<4>() {
            return Ok(Address::V4(octets));
        }
        if let Some(octets) = self.to_fixed_width::<16>() {
            return Ok(Address::V6(octets));
        }
        Err(DecodeError::Range(format!(
            "{} exceeds the IPv6 maximum {}",
            self.0, IPV6_MAX
        )))
    }

    /// Big-endian export into exactly `N` bytes, `None` if high-order bits
    /// would be lost
    fn to_fixed_width<const N: usize>(&self) -> Option<[u8; N]> {
        if self.0.bits() > (N as u64) * 8 {
            return None;
        }
        let bytes = self.0.to_bytes_be();
        let mut out = [0u8; N];
        out[N - bytes.len()..].copy_from_slice(&bytes);
        Some(out)
    }
}

impl FromStr for DecimalValue {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = value.strip_prefix('-') {
            if is_decimal_digits(digits) {
                return Err(DecodeError::Range(format!("{} is negative", value)));
            }
        }
        if !is_decimal_digits(value) {
            return Err(DecodeError::Parse(format!(
                "{:?} is not a base-10 integer",
                value
            )));
        }
        BigUint::parse_bytes(value.as_bytes(), 10)
            .map(DecimalValue)
            .ok_or_else(|| DecodeError::Parse(format!("{:?} is not a base-10 integer", value)))
    }
}

impl From<u128> for DecimalValue {
    fn from(value: u128) -> Self {
        DecimalValue(BigUint::from(value))
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// num-bigint accepts `_` separators, which no dataset should contain
fn is_decimal_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Fixed-width big-endian address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// 4-byte encoding
    V4([u8; 4]),
    /// 16-byte encoding
    V6([u8; 16]),
}

impl Address {
    /// Raw big-endian bytes
    pub fn octets(&self) -> &[u8] {
        match self {
            Address::V4(octets) => octets,
            Address::V6(octets) => octets,
        }
    }

    /// The encoded bytes read back as an integer
    pub fn to_u128(&self) -> u128 {
        match self {
            Address::V4(octets) => u32::from_be_bytes(*octets) as u128,
            Address::V6(octets) => u128::from_be_bytes(*octets),
        }
    }

    /// Standard library view of the address
    pub fn to_ip_addr(&self) -> IpAddr {
        match self {
            Address::V4(octets) => IpAddr::V4(Ipv4Addr::from(*octets)),
            Address::V6(octets) => IpAddr::V6(Ipv6Addr::from(*octets)),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ip_addr())
    }
}

/// Decode a decimal literal into an address
///
/// IPv4 width is tried first; values above 4294967295 get the IPv6 width.
pub fn decode(value: &str) -> Result<Address, DecodeError> {
    value.parse::<DecimalValue>()?.to_address()
}
