use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::bindings::Bindings;
use crate::error::{ExprError, Result};
use crate::value::Value;
use std::cmp::Ordering;

impl Expr {
    pub(crate) fn eval(&self, env: &Bindings) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident { name, folded, pos } => env
                .get(name)
                .or_else(|| folded.as_deref().and_then(|f| env.get(f)))
                .cloned()
                .ok_or_else(|| ExprError::UnknownIdentifier {
                    name: name.clone(),
                    pos: *pos,
                }),
            Expr::Unary { op, operand, pos } => match (op, operand.eval(env)?) {
                (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
                (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
                (op, v) => Err(mismatch(op, v.type_name().to_string(), *pos)),
            },
            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                lhs,
                rhs,
                pos,
            } => logical(*op, lhs, rhs, *pos, env),
            Expr::Binary { op, lhs, rhs, pos } => {
                let lhs = lhs.eval(env)?;
                let rhs = rhs.eval(env)?;
                binary(*op, lhs, rhs, *pos)
            }
        }
    }
}

/// Both sides of `&&` and `||` are always evaluated so that an unbound name
/// or a non-bool operand is reported whatever the left side yields.
fn logical(op: BinaryOp, lhs: &Expr, rhs: &Expr, pos: usize, env: &Bindings) -> Result<Value> {
    let left = lhs.eval(env)?;
    let right = rhs.eval(env)?;
    match (op, &left, &right) {
        (BinaryOp::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
        (BinaryOp::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
        _ => Err(mismatch(op, pair_of(&left, &right), pos)),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value, pos: usize) -> Result<Value> {
    let value = match (&lhs, &rhs) {
        (Value::Float(a), Value::Float(b)) => match op {
            BinaryOp::Add => Value::Float(a + b),
            BinaryOp::Sub => Value::Float(a - b),
            BinaryOp::Mul => Value::Float(a * b),
            BinaryOp::Div => Value::Float(a / b),
            // IEEE 754: every ordered comparison against NaN is false
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Ge => Value::Bool(a >= b),
            BinaryOp::Eq => Value::Bool(a == b),
            BinaryOp::Ne => Value::Bool(a != b),
            BinaryOp::And | BinaryOp::Or => return Err(mismatch(op, pair_of(&lhs, &rhs), pos)),
        },
        (Value::Str(a), Value::Str(b)) if op.is_comparison() => {
            Value::Bool(compare(op, a.cmp(b)))
        }
        (Value::Bool(a), Value::Bool(b)) if matches!(op, BinaryOp::Eq | BinaryOp::Ne) => {
            Value::Bool((a == b) == (op == BinaryOp::Eq))
        }
        _ => return Err(mismatch(op, pair_of(&lhs, &rhs), pos)),
    };
    Ok(value)
}

fn compare(op: BinaryOp, ordering: Ordering) -> bool {
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        BinaryOp::Eq => ordering.is_eq(),
        BinaryOp::Ne => ordering.is_ne(),
        _ => false,
    }
}

fn pair(lhs: &str, rhs: &Value) -> String {
    format!("{lhs} and {}", rhs.type_name())
}

fn pair_of(lhs: &Value, rhs: &Value) -> String {
    pair(lhs.type_name(), rhs)
}

fn mismatch(op: impl ToString, operands: String, pos: usize) -> ExprError {
    ExprError::TypeMismatch {
        op: op.to_string(),
        operands,
        pos,
    }
}
