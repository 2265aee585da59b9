//! Geolocation records built from CSV rows
//!
//! Two dataset shapes are supported, both starting with the decimal
//! start/end columns:
//!
//! ```text
//! Country (4 columns): start, end, country_code, country_name
//! City    (9 columns): start, end, country_code, country_name,
//!                      region, city, latitude, longitude, zip_code
//! ```

use crate::data_section::DataValue;
use crate::error::{IngestError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Columns of a Country row
pub const COUNTRY_COLUMNS: usize = 4;

/// Columns of a City row
pub const CITY_COLUMNS: usize = 9;

/// Which dataset schema the input follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Country-level dataset
    Country,
    /// City-level dataset with coordinates and postal code
    City,
}

impl DatasetKind {
    /// Exact number of columns every row must have
    pub fn column_count(self) -> usize {
        match self {
            DatasetKind::Country => COUNTRY_COLUMNS,
            DatasetKind::City => CITY_COLUMNS,
        }
    }

    /// Database type written to the metadata. Readers built on the MaxMind
    /// API dispatch on these exact names.
    pub fn database_type(self) -> &'static str {
        match self {
            DatasetKind::Country => "GeoLite2Country database",
            DatasetKind::City => "GeoLite2City database",
        }
    }

    /// Check the column count and build the record for this schema
    pub fn build_record(self, fields: &[String]) -> Result<GeoRecord> {
        match self {
            DatasetKind::Country => Ok(build_country_record(columns(self, fields)?)),
            DatasetKind::City => build_city_record(columns(self, fields)?),
        }
    }
}

fn columns<'a, const N: usize>(kind: DatasetKind, fields: &'a [String]) -> Result<&'a [String; N]> {
    fields.try_into().map_err(|_| {
        IngestError::Schema(format!(
            "{} CSV should have {} columns, found {}",
            kind,
            kind.column_count(),
            fields.len()
        ))
    })
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Country => write!(f, "country"),
            DatasetKind::City => write!(f, "city"),
        }
    }
}

impl FromStr for DatasetKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" => Ok(DatasetKind::Country),
            "city" => Ok(DatasetKind::City),
            other => Err(IngestError::Schema(format!("Invalid MMDB type: {}", other))),
        }
    }
}

/// Country identity
#[derive(Debug, Clone, PartialEq)]
pub struct CountryInfo {
    /// ISO 3166-1 alpha-2 code
    pub iso_code: String,
    /// English name
    pub name: String,
}

/// Coordinates of a city
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

/// City-level record
#[derive(Debug, Clone, PartialEq)]
pub struct CityInfo {
    /// Country the city is in
    pub country: CountryInfo,
    /// Region / state name
    pub subdivision: String,
    /// City name
    pub city: String,
    /// Coordinates
    pub location: Location,
    /// Postal code, possibly empty or "-"
    pub postal_code: String,
}

/// Geolocation payload attached to an address range
#[derive(Debug, Clone, PartialEq)]
pub enum GeoRecord {
    /// Country dataset record
    Country(CountryInfo),
    /// City dataset record
    City(CityInfo),
}

impl GeoRecord {
    /// Shape stored in the database, the layout GeoIP2 readers expect
    pub fn to_data_value(&self) -> DataValue {
        match self {
            GeoRecord::Country(country) => {
                map([("country", country_value(country))])
            }
            GeoRecord::City(info) => map([
                ("country", country_value(&info.country)),
                (
                    "subdivisions",
                    DataValue::Array(vec![names_value(&info.subdivision)]),
                ),
                ("city", names_value(&info.city)),
                (
                    "location",
                    map([
                        ("latitude", DataValue::Double(info.location.latitude)),
                        ("longitude", DataValue::Double(info.location.longitude)),
                    ]),
                ),
                ("postal", map([("code", DataValue::from(info.postal_code.as_str()))])),
            ]),
        }
    }
}

fn country_value(country: &CountryInfo) -> DataValue {
    map([
        ("iso_code", DataValue::from(country.iso_code.as_str())),
        ("names", map([("en", DataValue::from(country.name.as_str()))])),
    ])
}

fn names_value(name: &str) -> DataValue {
    map([("names", map([("en", DataValue::from(name))]))])
}

fn map<const N: usize>(entries: [(&str, DataValue); N]) -> DataValue {
    DataValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>(),
    )
}

/// Build a record from a Country row
pub fn build_country_record(fields: &[String; COUNTRY_COLUMNS]) -> GeoRecord {
    GeoRecord::Country(CountryInfo {
        iso_code: fields[2].clone(),
        name: fields[3].clone(),
    })
}

/// Build a record from a City row
///
/// Fails if the latitude or longitude column is not a number.
pub fn build_city_record(fields: &[String; CITY_COLUMNS]) -> Result<GeoRecord> {
    let latitude = parse_coordinate("latitude", &fields[6])?;
    let longitude = parse_coordinate("longitude", &fields[7])?;

    Ok(GeoRecord::City(CityInfo {
        country: CountryInfo {
            iso_code: fields[2].clone(),
            name: fields[3].clone(),
        },
        subdivision: fields[4].clone(),
        city: fields[5].clone(),
        location: Location {
            latitude,
            longitude,
        },
        postal_code: fields[8].clone(),
    }))
}

fn parse_coordinate(column: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| IngestError::Parse(format!("{} {:?} is not a number", column, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn city_row() -> Vec<String> {
        row(&[
            "16777216",
            "16777471",
            "AU",
            "Australia",
            "Queensland",
            "Brisbane",
            "-27.467940",
            "153.028090",
            "4000",
        ])
    }

    #[test]
    fn test_build_country_record() {
        let fields = row(&["16777216", "16777471", "US", "United States"]);
        let record = DatasetKind::Country.build_record(&fields).unwrap();
        assert_eq!(
            record,
            GeoRecord::Country(CountryInfo {
                iso_code: "US".to_string(),
                name: "United States".to_string(),
            })
        );
    }

    #[test]
    fn test_build_city_record() {
        let record = DatasetKind::City.build_record(&city_row()).unwrap();
        let GeoRecord::City(info) = record else {
            panic!("Expected city record");
        };
        assert_eq!(info.country.iso_code, "AU");
        assert_eq!(info.country.name, "Australia");
        assert_eq!(info.subdivision, "Queensland");
        assert_eq!(info.city, "Brisbane");
        assert_eq!(info.location.latitude, -27.46794);
        assert_eq!(info.location.longitude, 153.02809);
        assert_eq!(info.postal_code, "4000");
    }

    #[test]
    fn test_city_rejects_bad_coordinates() {
        let mut fields = city_row();
        fields[6] = "north".to_string();
        let err = DatasetKind::City.build_record(&fields).unwrap_err();
        assert!(matches!(err, IngestError::Parse(ref msg) if msg.contains("latitude")));

        let mut fields = city_row();
        fields[7] = String::new();
        let err = DatasetKind::City.build_record(&fields).unwrap_err();
        assert!(matches!(err, IngestError::Parse(ref msg) if msg.contains("longitude")));
    }

    #[test]
    fn test_column_count_enforced() {
        let short = row(&["1", "2", "US"]);
        assert!(matches!(
            DatasetKind::Country.build_record(&short),
            Err(IngestError::Schema(_))
        ));

        // A valid country row is not a valid city row
        let country = row(&["1", "2", "US", "United States"]);
        assert!(matches!(
            DatasetKind::City.build_record(&country),
            Err(IngestError::Schema(_))
        ));
    }

    #[test]
    fn test_dataset_kind_from_str() {
        assert_eq!("country".parse::<DatasetKind>().unwrap(), DatasetKind::Country);
        assert_eq!(" City ".parse::<DatasetKind>().unwrap(), DatasetKind::City);
        assert!("asn".parse::<DatasetKind>().is_err());
    }

    #[test]
    fn test_country_data_value_shape() {
        let record = build_country_record(&[
            "0".to_string(),
            "0".to_string(),
            "US".to_string(),
            "United States".to_string(),
        ]);
        let DataValue::Map(top) = record.to_data_value() else {
            panic!("Expected map");
        };
        assert_eq!(top.len(), 1);
        let Some(DataValue::Map(country)) = top.get("country") else {
            panic!("Expected country map");
        };
        assert_eq!(country.get("iso_code"), Some(&DataValue::from("US")));
        let Some(DataValue::Map(names)) = country.get("names") else {
            panic!("Expected names map");
        };
        assert_eq!(names.get("en"), Some(&DataValue::from("United States")));
    }

    #[test]
    fn test_city_data_value_shape() {
        let record = DatasetKind::City.build_record(&city_row()).unwrap();
        let DataValue::Map(top) = record.to_data_value() else {
            panic!("Expected map");
        };
        let keys: Vec<_> = top.keys().map(String::as_str).collect();
        assert_eq!(keys, ["city", "country", "location", "postal", "subdivisions"]);

        let Some(DataValue::Array(subdivisions)) = top.get("subdivisions") else {
            panic!("Expected subdivisions array");
        };
        assert_eq!(subdivisions.len(), 1);

        let Some(DataValue::Map(location)) = top.get("location") else {
            panic!("Expected location map");
        };
        assert_eq!(location.get("latitude"), Some(&DataValue::Double(-27.46794)));
    }
}
