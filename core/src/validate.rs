//! Per-item screening of raw tool input.
//!
//! Batch entry points never fail: every malformed item becomes a
//! [`RejectedPoint`] and the rest of the batch goes through. The `_strict`
//! wrappers turn the first rejection into an [`InvalidInput`] for callers that
//! want fail-fast behaviour.

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use serde_json::{Value, json};

use crate::error::{ErrorCode, InvalidInput};
use crate::points::{Point, PointRef, Position, RejectedPoint};

static REF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._:-]{1,128}$").expect("ref pattern is valid"));

/// Largest accepted timestamp magnitude; keeps `end_ts - start_ts` within `i64`.
pub const MAX_ABS_TIMESTAMP: i64 = i64::MAX / 2;

static T_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})$")
        .expect("timestamp pattern is valid")
});

/// Screen raw points for `resolve_points`.
///
/// Rules, first match wins: coordinates, then `ref`, then `t`.
/// `valid` and `rejected` together hold every input index exactly once, each
/// list in ascending index order.
pub fn validate_points(raw: &[Value]) -> (Vec<Point>, Vec<RejectedPoint>) {
    let mut valid = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for (index, item) in raw.iter().enumerate() {
        let lat_raw = item.get("lat");
        let lon_raw = item.get("lon");
        let ref_raw = item.get("ref");
        let reject = |reason| RejectedPoint {
            index,
            point_ref: PointRef::echo(ref_raw),
            lat: lat_raw.cloned().unwrap_or(Value::Null),
            lon: lon_raw.cloned().unwrap_or(Value::Null),
            timestamp: None,
            reason,
        };

        let Some((lat, lon)) = coerce_coordinates(lat_raw, lon_raw) else {
            rejected.push(reject(ErrorCode::InvalidCoord));
            continue;
        };

        let point_ref = match ref_raw {
            None => PointRef::Absent,
            Some(Value::Null) => PointRef::Null,
            Some(Value::String(value)) if value.is_empty() || REF_PATTERN.is_match(value) => {
                PointRef::Value(value.clone())
            }
            Some(_) => {
                rejected.push(reject(ErrorCode::InvalidRef));
                continue;
            }
        };

        let t = match item.get("t") {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) if T_PATTERN.is_match(value) => {
                match DateTime::parse_from_rfc3339(value) {
                    Ok(parsed) => Some(parsed),
                    Err(_) => {
                        rejected.push(reject(ErrorCode::InvalidT));
                        continue;
                    }
                }
            }
            Some(_) => {
                rejected.push(reject(ErrorCode::InvalidT));
                continue;
            }
        };

        valid.push(Point {
            index,
            lat,
            lon,
            point_ref,
            t,
        });
    }

    (valid, rejected)
}

/// Screen raw trajectory samples for `summarize_stays`.
///
/// Timestamps must be integers within `±MAX_ABS_TIMESTAMP` and
/// non-decreasing relative to the last accepted sample; a decrease rejects the sample rather than reordering.
pub fn validate_positions(raw: &[Value]) -> (Vec<Position>, Vec<RejectedPoint>) {
    let mut valid: Vec<Position> = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for (index, item) in raw.iter().enumerate() {
        let lat_raw = item.get("lat");
        let lon_raw = item.get("lon");
        let ts_raw = item.get("timestamp");
        let reject = |reason| RejectedPoint {
            index,
            point_ref: PointRef::Absent,
            lat: lat_raw.cloned().unwrap_or(Value::Null),
            lon: lon_raw.cloned().unwrap_or(Value::Null),
            timestamp: Some(ts_raw.cloned().unwrap_or(Value::Null)),
            reason,
        };

        let Some((lat, lon)) = coerce_coordinates(lat_raw, lon_raw) else {
            rejected.push(reject(ErrorCode::InvalidCoord));
            continue;
        };

        let Some(timestamp) = ts_raw.and_then(integer_timestamp) else {
            rejected.push(reject(ErrorCode::InvalidTimestamp));
            continue;
        };

        if valid.last().is_some_and(|prev| timestamp < prev.timestamp) {
            rejected.push(reject(ErrorCode::InvalidTimestamp));
            continue;
        }

        valid.push(Position {
            index,
            timestamp,
            lat,
            lon,
        });
    }

    (valid, rejected)
}

/// Fail-fast variant of [`validate_points`].
pub fn validate_points_strict(raw: &[Value]) -> Result<Vec<Point>, InvalidInput> {
    let (valid, rejected) = validate_points(raw);
    first_rejection(rejected).map_or(Ok(valid), Err)
}

/// Fail-fast variant of [`validate_positions`].
pub fn validate_positions_strict(raw: &[Value]) -> Result<Vec<Position>, InvalidInput> {
    let (valid, rejected) = validate_positions(raw);
    first_rejection(rejected).map_or(Ok(valid), Err)
}

fn first_rejection(rejected: Vec<RejectedPoint>) -> Option<InvalidInput> {
    rejected.into_iter().next().map(InvalidInput::from)
}

impl From<RejectedPoint> for InvalidInput {
    fn from(rejected: RejectedPoint) -> Self {
        let mut location = json!({
            "index": rejected.index,
            "reason": rejected.reason,
        });
        if !rejected.point_ref.is_absent() {
            location["ref"] = serde_json::to_value(&rejected.point_ref).unwrap_or(Value::Null);
        }
        InvalidInput::Item {
            reason: rejected.reason,
            index: rejected.index,
            location,
        }
    }
}

fn coerce_coordinates(lat: Option<&Value>, lon: Option<&Value>) -> Option<(f64, f64)> {
    let lat = coerce_number(lat?)?;
    let lon = coerce_number(lon?)?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some((lat, lon))
}

/// JSON numbers and numeric strings are accepted; NaN and infinities are not.
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn integer_timestamp(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    let int = match number.as_i64() {
        Some(int) => int,
        None => {
            let float = number.as_f64()?;
            if float.fract() != 0.0 || float.abs() >= i64::MAX as f64 {
                return None;
            }
            float as i64
        }
    };
    (-MAX_ABS_TIMESTAMP..=MAX_ABS_TIMESTAMP)
        .contains(&int)
        .then_some(int)
}
