/// Errors raised while compiling or evaluating an expression.
///
/// Positions are byte offsets into the expression text.
///
/// # Examples
///
/// ```rust
/// use tally_expr::ExprError;
///
/// let err = tally_expr::compile("2 +").unwrap_err();
/// assert!(matches!(err, ExprError::Syntax { pos: 3, .. }));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("syntax error at {pos}: {message}")]
    Syntax { pos: usize, message: String },

    /// The name is not present in the bindings the expression was
    /// evaluated against.
    #[error("undefined: {name} (at {pos})")]
    UnknownIdentifier { name: String, pos: usize },

    /// An operator was applied to operands it is not defined on,
    /// e.g. `"a" + true`.
    #[error("operator {op} not defined on {operands} (at {pos})")]
    TypeMismatch {
        op: String,
        operands: String,
        pos: usize,
    },
}

pub type Result<T> = std::result::Result<T, ExprError>;
