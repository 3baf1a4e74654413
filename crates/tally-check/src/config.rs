use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tally_expr::{Bindings, Value};
use toml::{Table, Value as TomlValue};

/// Section names that never describe a check.
pub const RESERVED_SECTIONS: [&str; 3] = ["default", "constants", "transport"];

/// Owner reported when a section does not name one.
pub const DEFAULT_OWNER: &str = "unknown";

/// `[transport]`: where and how to fetch a remote snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// When false the peer is asked to drop NaN gauges and NaN counter rates.
    #[serde(default = "default_allow_nan")]
    pub allow_nan: bool,
}

fn default_address() -> String {
    "localhost:12345".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_allow_nan() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout_secs: default_timeout_secs(),
            allow_nan: default_allow_nan(),
        }
    }
}

impl TransportConfig {
    /// Fetch timeout; a configured `0` is raised to one second.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// One check section.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckSpec {
    pub section: String,
    pub expr: String,
    /// Message template used when `expr` is true.
    pub on_true: Option<String>,
    /// Message template used when `expr` is false.
    pub on_false: Option<String>,
    pub owner: String,
    /// Expression whose float result is reported alongside the message.
    pub val: Option<String>,
}

impl CheckSpec {
    /// Reads a section table. Returns `None`, after logging, when the section
    /// has no string `expr`.
    fn from_table(section: &str, table: &Table) -> Option<Self> {
        let expr = match table.get("expr") {
            Some(TomlValue::String(expr)) => expr.clone(),
            Some(other) => {
                tracing::warn!(section, found = other.type_str(), "Skipping section: expr is not a string");
                return None;
            }
            None => {
                tracing::warn!(section, "Skipping section without expr");
                return None;
            }
        };

        for key in table.keys() {
            if !matches!(key.as_str(), "expr" | "true" | "false" | "owner" | "val") {
                tracing::debug!(section, key = %key, "Ignoring unknown key");
            }
        }

        Some(Self {
            section: section.to_string(),
            expr,
            on_true: optional_string(section, table, "true"),
            on_false: optional_string(section, table, "false"),
            owner: optional_string(section, table, "owner")
                .unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            val: optional_string(section, table, "val"),
        })
    }
}

fn optional_string(section: &str, table: &Table, key: &str) -> Option<String> {
    match table.get(key)? {
        TomlValue::String(s) => Some(s.clone()),
        other => {
            tracing::warn!(section, key, found = other.type_str(), "Ignoring non-string value");
            None
        }
    }
}

/// A parsed check configuration. Checks keep the order their sections were
/// declared in.
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    pub transport: TransportConfig,
    /// `[constants]`, bound before any metric value.
    pub constants: Bindings,
    pub checks: Vec<CheckSpec>,
}

impl CheckConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read check config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid check config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let root: Table = toml::from_str(content)?;
        let mut config = Self::default();

        for (section, value) in root {
            match section.as_str() {
                "default" => continue,
                "transport" => {
                    config.transport = value
                        .try_into()
                        .context("invalid [transport] section")?;
                }
                "constants" => {
                    let TomlValue::Table(table) = value else {
                        bail!("[constants] must be a table");
                    };
                    config.constants = constants(&table);
                }
                _ => {
                    let TomlValue::Table(table) = value else {
                        bail!("section '{section}' must be a table");
                    };
                    config.checks.extend(CheckSpec::from_table(&section, &table));
                }
            }
        }

        tracing::debug!(
            checks = config.checks.len(),
            constants = config.constants.len(),
            "Check config parsed"
        );
        Ok(config)
    }
}

fn constants(table: &Table) -> Bindings {
    let mut bindings = Bindings::new();
    for (name, value) in table {
        let value = match value {
            TomlValue::Integer(i) => Value::Float(*i as f64),
            TomlValue::Float(f) => Value::Float(*f),
            TomlValue::String(s) => Value::Str(s.clone()),
            TomlValue::Boolean(b) => Value::Bool(*b),
            other => {
                tracing::warn!(constant = %name, found = other.type_str(), "Ignoring constant of unsupported type");
                continue;
            }
        };
        bindings.insert(name.as_str(), value);
    }
    bindings
}
