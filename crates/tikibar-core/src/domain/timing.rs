//! Navigation-timing snapshot filtering.
//!
//! Browsers expose the navigation-timing record as an object whose entries are
//! mostly millisecond timestamps.  Some runtimes also expose non-numeric
//! introspection entries (Firefox's `toJSON`, for instance), and those must
//! not reach the frame.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Keeps only the numeric entries of a navigation-timing record.
///
/// An entry is numeric when it is a JSON number, or a string that parses as a
/// finite number (the string is reported as its numeric value).  Returns
/// `None` when no numeric entry survives, in which case no snapshot is sent.
pub fn numeric_timing(record: &Map<String, Value>) -> Option<BTreeMap<String, f64>> {
    let numeric: BTreeMap<String, f64> = record
        .iter()
        .filter_map(|(name, value)| numeric_value(value).map(|v| (name.clone(), v)))
        .collect();

    if numeric.is_empty() {
        None
    } else {
        Some(numeric)
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
