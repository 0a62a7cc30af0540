//! Lenient field extraction for legacy (untyped JSON) records.
//!
//! Legacy records are loosely typed: numbers sometimes arrive as strings, and several fields
//! have historical aliases. Extractors here return `None` instead of failing so callers can
//! drop the record and keep going.

use serde_json::{Map, Value};

use crate::types::{Food, GlucoseValue, SourceSensor, TrendArrow};

/// Read a number, accepting numeric strings.
pub fn lenient_f64(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    value_as_f64(obj.get(key)?)
}

/// Read an integer, accepting numeric strings and truncating fractional numbers.
pub fn lenient_i64(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    value_as_i64(obj.get(key)?)
}

pub fn lenient_i32(obj: &Map<String, Value>, key: &str) -> Option<i32> {
    lenient_i64(obj, key).and_then(|v| i32::try_from(v).ok())
}

/// Read a string; `null` and non-string values are treated as absent.
pub fn string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Read a boolean, accepting `"true"`/`"false"` strings.
pub fn lenient_bool(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

pub(crate) fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

/// Normalize a legacy glucose record.
///
/// Timestamp comes from `mills`, falling back to `date`; the value from `mgdl`, falling back to
/// `sgv`. Returns `None` when either is missing or unparseable, or when the record is not an
/// object.
pub fn glucose_value(record: &Value) -> Option<GlucoseValue> {
    let obj = record.as_object()?;
    let timestamp = lenient_i64(obj, "mills").or_else(|| lenient_i64(obj, "date"))?;
    let value = lenient_f64(obj, "mgdl").or_else(|| lenient_f64(obj, "sgv"))?;

    Some(GlucoseValue {
        timestamp,
        value,
        raw: lenient_f64(obj, "filtered"),
        noise: None,
        trend_arrow: TrendArrow::from_direction(obj.get("direction").and_then(Value::as_str)),
        source_sensor: SourceSensor::from_device(obj.get("device").and_then(Value::as_str)),
        remote_id: string(obj, "_id"),
    })
}

/// Type tag of a legacy record (`"food"`, `"quickpick"`, ...).
pub fn record_type(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("type").and_then(Value::as_str)
}

/// Action tag of a legacy record (`"remove"`, `"update"`, ...).
pub fn record_action(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("action").and_then(Value::as_str)
}

/// Parse a legacy food record into a full catalog entry.
///
/// `name`, `portion`, `carbs` and `_id` are required.
pub fn food(obj: &Map<String, Value>) -> Option<Food> {
    let name = string(obj, "name")?;
    let portion = lenient_f64(obj, "portion")?;
    let carbs = lenient_i32(obj, "carbs")?;
    let remote_id = string(obj, "_id")?;

    Some(Food {
        name,
        category: string(obj, "category"),
        subcategory: string(obj, "subcategory"),
        portion,
        carbs,
        fat: lenient_i32(obj, "fat"),
        protein: lenient_i32(obj, "protein"),
        energy: lenient_i32(obj, "energy"),
        unit: string(obj, "unit").unwrap_or_default(),
        gi: lenient_i32(obj, "gi"),
        is_valid: lenient_bool(obj, "isValid").unwrap_or(true),
        remote_id: Some(remote_id),
    })
}
