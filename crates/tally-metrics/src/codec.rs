//! JSON wire format for snapshots.
//!
//! ```text
//! [{"type":"counter","name":"a.b","value":3,"rate":0.5},
//!  {"type":"gauge","name":"c","value":1.25},
//!  {"type":"basiccounter","name":"d","value":7},
//!  {"type":"statstimer","name":"e","percentiles":[{"percentile":"50.000000","value":12.0}]}]
//! ```

use crate::error::CodecError;
use crate::snapshot::{Snapshot, SnapshotEntry};
use serde_json::{Map, Value};

pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(snapshot).map_err(CodecError::Encode)
}

/// Decodes a peer's snapshot.
///
/// Only a payload that is not a JSON array is an error. Elements are decoded
/// one by one; an element that matches neither the typed format nor the
/// legacy untyped shapes is logged and skipped.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, CodecError> {
    let items: Vec<Value> = serde_json::from_slice(bytes).map_err(CodecError::Malformed)?;
    let entries = items.into_iter().filter_map(decode_entry).collect();
    Ok(Snapshot::new(entries))
}

fn decode_entry(item: Value) -> Option<SnapshotEntry> {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string();

    if item.get("type").is_some() {
        return match serde_json::from_value::<SnapshotEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(metric = %name, error = %e, "Skipping malformed metric entry");
                None
            }
        };
    }

    let entry = match (item.get("name").and_then(Value::as_str), item.get("value")) {
        (Some(name), Some(Value::Number(n))) => n.as_f64().map(|value| SnapshotEntry::Gauge {
            name: name.to_string(),
            value,
        }),
        (Some(name), Some(Value::Object(fields))) => legacy_counter(name, fields),
        _ => None,
    };
    if entry.is_none() {
        tracing::warn!(metric = %name, value = %item, "Skipping metric with unrecognized shape");
    }
    entry
}

/// `{"name": ..., "value": {"current": <n>, "rate": <f>}}` from older producers.
fn legacy_counter(name: &str, fields: &Map<String, Value>) -> Option<SnapshotEntry> {
    let current = fields.get("current")?.as_f64()?;
    if current < 0.0 || current.fract() != 0.0 || current > u64::MAX as f64 {
        return None;
    }
    let rate = fields
        .get("rate")
        .and_then(Value::as_f64)
        .unwrap_or(f64::NAN);
    Some(SnapshotEntry::Counter {
        name: name.to_string(),
        value: current as u64,
        rate,
    })
}
