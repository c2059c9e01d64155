use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ErrorCode;

/// Administrative-boundary tier requested for geocoding.
///
/// Selects the provider route, the mapset and the key under which the
/// provider returns its positional code array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Admin,
    Estat,
    Jarl,
}

impl Granularity {
    /// Unknown or missing values fall back to `admin`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("estat") => Granularity::Estat,
            Some("jarl") => Granularity::Jarl,
            _ => Granularity::Admin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Admin => "admin",
            Granularity::Estat => "estat",
            Granularity::Jarl => "jarl",
        }
    }

    pub fn provider_path(self) -> &'static str {
        match self {
            Granularity::Admin => "/raacs",
            Granularity::Estat => "/resareas",
            Granularity::Jarl => "/rjccs",
        }
    }

    /// Response key holding the positional code array.
    pub fn codes_key(self) -> &'static str {
        match self {
            Granularity::Estat => "scodes",
            Granularity::Admin | Granularity::Jarl => "aacodes",
        }
    }
}

/// Client-supplied opaque identifier.
///
/// Tri-state so that "key absent" and "key explicitly null" both round-trip
/// to the output unchanged. `Raw` holds a non-string `ref` exactly as sent and
/// only appears on rejected items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PointRef {
    #[default]
    Absent,
    Null,
    Value(String),
    Raw(Value),
}

impl PointRef {
    pub fn is_absent(&self) -> bool {
        matches!(self, PointRef::Absent)
    }

    pub(crate) fn echo(raw: Option<&Value>) -> Self {
        match raw {
            None => PointRef::Absent,
            Some(Value::String(value)) => PointRef::Value(value.clone()),
            Some(Value::Null) => PointRef::Null,
            Some(other) => PointRef::Raw(other.clone()),
        }
    }
}

impl Serialize for PointRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PointRef::Absent | PointRef::Null => serializer.serialize_none(),
            PointRef::Value(value) => serializer.serialize_str(value),
            PointRef::Raw(value) => value.serialize(serializer),
        }
    }
}

/// A validated input point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Position in the original input array
    pub index: usize,
    pub lat: f64,
    pub lon: f64,
    pub point_ref: PointRef,
    pub t: Option<DateTime<FixedOffset>>,
}

/// A validated trajectory sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Position in the original input array
    pub index: usize,
    /// Unix seconds
    pub timestamp: i64,
    pub lat: f64,
    pub lon: f64,
}

/// An input item that failed validation, echoed as received.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RejectedPoint {
    pub index: usize,
    #[serde(rename = "ref", skip_serializing_if = "PointRef::is_absent")]
    /// String as sent, or the raw value when it was rejected as `INVALID_REF`
    #[schema(value_type = Option<Value>)]
    pub point_ref: PointRef,
    pub lat: Value,
    pub lon: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    pub reason: ErrorCode,
}

/// Provider answer for one point. `code == None` means no coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GeocodeResult {
    pub code: Option<String>,
    pub address: Option<String>,
}

impl GeocodeResult {
    pub fn uncovered() -> Self {
        Self::default()
    }

    pub fn is_covered(&self) -> bool {
        self.code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_granularity_falls_back_to_admin() {
        assert_eq!(Granularity::parse_lenient(None), Granularity::Admin);
        assert_eq!(Granularity::parse_lenient(Some("city")), Granularity::Admin);
        assert_eq!(Granularity::parse_lenient(Some("ESTAT")), Granularity::Estat);
        assert_eq!(Granularity::parse_lenient(Some("jarl")), Granularity::Jarl);
    }

    #[test]
    fn estat_uses_scodes_key() {
        assert_eq!(Granularity::Estat.codes_key(), "scodes");
        assert_eq!(Granularity::Admin.codes_key(), "aacodes");
        assert_eq!(Granularity::Jarl.codes_key(), "aacodes");
        assert_eq!(Granularity::Jarl.provider_path(), "/rjccs");
    }

    #[test]
    fn rejected_point_preserves_ref_presence() {
        let absent = RejectedPoint {
            index: 0,
            point_ref: PointRef::Absent,
            lat: json!("x"),
            lon: json!(1.0),
            timestamp: None,
            reason: ErrorCode::InvalidCoord,
        };
        let null = RejectedPoint {
            point_ref: PointRef::Null,
            ..absent.clone()
        };

        let absent = serde_json::to_value(absent).unwrap();
        let null = serde_json::to_value(null).unwrap();
        assert!(absent.get("ref").is_none());
        assert_eq!(null.get("ref"), Some(&Value::Null));
        assert_eq!(null["reason"], "INVALID_COORD");
    }

    #[test]
    fn non_string_ref_is_echoed_verbatim() {
        let rejected = RejectedPoint {
            index: 2,
            point_ref: PointRef::echo(Some(&json!(42))),
            lat: json!(0.0),
            lon: json!(0.0),
            timestamp: None,
            reason: ErrorCode::InvalidRef,
        };
        let value = serde_json::to_value(rejected).unwrap();
        assert_eq!(value["ref"], json!(42));
        assert!(value["ref"].is_number());
    }
}
