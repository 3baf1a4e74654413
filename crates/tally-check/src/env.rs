//! Turns a snapshot into the bindings check expressions read.
//!
//! For a metric named `svc.latency_ms` the base name is `svc_latency_ms`:
//!
//! | kind         | bindings                                              |
//! |--------------|-------------------------------------------------------|
//! | gauge        | `svc_latency_ms_value` (+ `_value_string` when local)  |
//! | basiccounter | `svc_latency_ms_value`                                |
//! | counter      | `_current`, `_rate` (+ `_current_string` when local)  |
//! | statstimer   | `_p50`, `_p75`, `_p95`, `_p99`, `_p99_9`, ...         |

use crate::source::Origin;
use tally_expr::{Bindings, Value};
use tally_metrics::{Snapshot, SnapshotEntry};

/// Constants first, then one or more bindings per snapshot entry. A metric
/// binding replaces a constant of the same name.
pub fn build_bindings(snapshot: &Snapshot, constants: &Bindings, origin: Origin) -> Bindings {
    let mut env = constants.clone();
    for entry in snapshot {
        bind_entry(&mut env, entry, origin);
    }
    env
}

fn bind_entry(env: &mut Bindings, entry: &SnapshotEntry, origin: Origin) {
    let base = entry.name().replace('.', "_");
    match entry {
        SnapshotEntry::Gauge { value, .. } => {
            env.insert(format!("{base}_value"), *value);
            if origin == Origin::Local {
                env.insert(format!("{base}_value_string"), format!("{value:.2}"));
            }
        }
        SnapshotEntry::BasicCounter { value, .. } => {
            env.insert(format!("{base}_value"), *value);
        }
        SnapshotEntry::Counter { value, rate, .. } => {
            env.insert(format!("{base}_current"), *value);
            env.insert(format!("{base}_rate"), *rate);
            if origin == Origin::Local {
                env.insert(format!("{base}_current_string"), value.to_string());
            }
        }
        SnapshotEntry::StatsTimer { percentiles, .. } => {
            for p in percentiles {
                let name = format!("{base}_p{}", percentile_suffix(&p.percentile));
                env.insert(name, Value::Float(p.value));
            }
        }
    }
}

/// `"99.900000"` -> `"99_9"`, `"50.000000"` -> `"50"`.
pub fn percentile_suffix(label: &str) -> String {
    let minimal = match label.parse::<f64>() {
        Ok(p) => p.to_string(),
        Err(_) => label.to_string(),
    };
    minimal.replace('.', "_")
}
