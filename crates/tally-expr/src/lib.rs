//! Expression language for threshold checks.
//!
//! Expressions are compiled once and evaluated many times against a
//! [`Bindings`] environment:
//!
//! ```rust
//! use tally_expr::{compile, Bindings, Value};
//!
//! let check = compile("svc.latency.Value > limit && !maintenance").unwrap();
//!
//! let mut env = Bindings::new();
//! env.insert("svc_latency_value", 250.0);
//! env.insert("limit", 200.0);
//! env.insert("maintenance", false);
//! assert_eq!(check.evaluate(&env).unwrap(), Value::Bool(true));
//! ```
//!
//! Values are `f64`, strings and booleans. There are no implicit
//! conversions: applying an operator to mismatched types is an
//! [`ExprError::TypeMismatch`] at evaluation time.

pub mod ast;
pub mod bindings;
pub mod error;
mod eval;
mod lexer;
mod parser;
pub mod value;

#[cfg(test)]
mod tests;

pub use bindings::Bindings;
pub use error::{ExprError, Result};
pub use value::Value;

use ast::Expr;
use std::str::FromStr;

/// A parsed expression together with its source text.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    root: Expr,
}

/// Parses `text` into a reusable expression.
pub fn compile(text: &str) -> Result<CompiledExpr> {
    let root = parser::parse(text)?;
    Ok(CompiledExpr {
        source: text.to_string(),
        root,
    })
}

impl CompiledExpr {
    /// Evaluates against `env`. Evaluation has no side effects.
    pub fn evaluate(&self, env: &Bindings) -> Result<Value> {
        self.root.eval(env)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Binding names the expression reads, in source order and without
    /// duplicates. Selectors are reported in their joined form.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.root.collect_identifiers(&mut names);
        let mut seen = std::collections::HashSet::new();
        names.retain(|name| seen.insert(*name));
        names
    }
}

impl FromStr for CompiledExpr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self> {
        compile(s)
    }
}
