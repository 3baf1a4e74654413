use crate::config::{CheckConfig, CheckSpec};
use crate::env::build_bindings;
use crate::error::Result;
use crate::source::{Origin, SnapshotSource};
use serde::Serialize;
use tally_expr::{compile, Bindings, CompiledExpr, ExprError, Value};
use tally_metrics::Snapshot;
use tokio::sync::Mutex;

/// Outcome of one section that evaluated and had a message for its branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub section: String,
    pub owner: String,
    /// Value of the section's `expr`.
    pub outcome: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// A message template. If the text is itself an expression that yields a
/// string, that string is the message; otherwise the text is used as is.
struct Template {
    text: String,
    expr: Option<CompiledExpr>,
}

impl Template {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            expr: compile(text).ok(),
        }
    }

    fn render(&self, env: &Bindings) -> String {
        match self.expr.as_ref().map(|expr| expr.evaluate(env)) {
            Some(Ok(Value::Str(message))) => message,
            _ => self.text.clone(),
        }
    }
}

struct CompiledCheck {
    section: String,
    owner: String,
    expr: std::result::Result<CompiledExpr, ExprError>,
    on_true: Option<Template>,
    on_false: Option<Template>,
    val: Option<CompiledExpr>,
}

impl CompiledCheck {
    fn new(spec: &CheckSpec) -> Self {
        let expr = compile(&spec.expr);
        if let Err(e) = &expr {
            tracing::warn!(section = %spec.section, expr = %spec.expr, error = %e, "Check expression does not compile");
        }
        let val = spec.val.as_deref().and_then(|text| match compile(text) {
            Ok(expr) => Some(expr),
            Err(e) => {
                tracing::warn!(section = %spec.section, val = text, error = %e, "Value expression does not compile");
                None
            }
        });
        Self {
            section: spec.section.clone(),
            owner: spec.owner.clone(),
            expr,
            on_true: spec.on_true.as_deref().map(Template::new),
            on_false: spec.on_false.as_deref().map(Template::new),
            val,
        }
    }

    fn evaluate(&self, env: &Bindings) -> Option<CheckResult> {
        let section = self.section.as_str();
        let expr = match &self.expr {
            Ok(expr) => expr,
            Err(e) => {
                tracing::warn!(section, error = %e, "Skipping check with invalid expression");
                return None;
            }
        };

        let outcome = match expr.evaluate(env) {
            Ok(Value::Bool(outcome)) => outcome,
            Ok(other) => {
                tracing::warn!(section, result = other.type_name(), "Skipping check: expression is not boolean");
                return None;
            }
            Err(e) => {
                tracing::warn!(section, error = %e, "Skipping check: evaluation failed");
                return None;
            }
        };

        let template = if outcome {
            self.on_true.as_ref()
        } else {
            self.on_false.as_ref()
        };
        let Some(template) = template else {
            tracing::debug!(section, outcome, "No message for outcome");
            return None;
        };

        Some(CheckResult {
            section: self.section.clone(),
            owner: self.owner.clone(),
            outcome,
            message: template.render(env),
            value: self.value(env),
        })
    }

    fn value(&self, env: &Bindings) -> Option<f64> {
        let section = self.section.as_str();
        match self.val.as_ref()?.evaluate(env) {
            Ok(Value::Float(v)) => Some(v),
            Ok(other) => {
                tracing::debug!(section, result = other.type_name(), "Ignoring non-numeric val");
                None
            }
            Err(e) => {
                tracing::debug!(section, error = %e, "Ignoring val that failed to evaluate");
                None
            }
        }
    }
}

/// Evaluates every configured check against a snapshot.
///
/// Expressions are compiled once in [`CheckEngine::new`]. Cycles started
/// through [`CheckEngine::run_cycle`] never overlap; a second caller waits
/// for the running cycle to finish.
pub struct CheckEngine {
    checks: Vec<CompiledCheck>,
    constants: Bindings,
    cycle_lock: Mutex<()>,
}

impl CheckEngine {
    pub fn new(config: &CheckConfig) -> Self {
        Self {
            checks: config.checks.iter().map(CompiledCheck::new).collect(),
            constants: config.constants.clone(),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Section names in evaluation order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|c| c.section.as_str())
    }

    /// Sections whose `expr` failed to compile.
    pub fn invalid_sections(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .filter(|c| c.expr.is_err())
            .map(|c| c.section.as_str())
    }

    /// Binds `snapshot` and evaluates all checks in configuration order.
    pub fn evaluate(&self, snapshot: &Snapshot, origin: Origin) -> Vec<CheckResult> {
        let env = build_bindings(snapshot, &self.constants, origin);
        self.evaluate_bindings(&env)
    }

    pub fn evaluate_bindings(&self, env: &Bindings) -> Vec<CheckResult> {
        self.checks
            .iter()
            .filter_map(|check| check.evaluate(env))
            .collect()
    }

    /// One full cycle: acquire a snapshot from `source`, then evaluate.
    ///
    /// # Errors
    ///
    /// Fails only when the snapshot cannot be acquired.
    pub async fn run_cycle(&self, source: &dyn SnapshotSource) -> Result<Vec<CheckResult>> {
        let _cycle = self.cycle_lock.lock().await;
        let snapshot = source.acquire().await?;
        let results = self.evaluate(&snapshot, source.origin());
        tracing::debug!(
            source = %source.describe(),
            metrics = snapshot.len(),
            checks = self.checks.len(),
            results = results.len(),
            "Check cycle complete"
        );
        Ok(results)
    }
}
