use crate::{compile, Bindings, ExprError, Value};

fn eval(text: &str, env: &Bindings) -> Result<Value, ExprError> {
    compile(text)?.evaluate(env)
}

fn eval_empty(text: &str) -> Value {
    eval(text, &Bindings::new()).unwrap()
}

#[test]
fn arithmetic_and_comparison() {
    assert_eq!(eval_empty("2 + 3 == 5"), Value::Bool(true));
    assert_eq!(eval_empty("2 + 3 * 4"), Value::Float(14.0));
    assert_eq!(eval_empty("(2 + 3) * 4"), Value::Float(20.0));
    assert_eq!(eval_empty("10 - 4 - 3"), Value::Float(3.0));
    assert_eq!(eval_empty("-2 * -3"), Value::Float(6.0));
    assert_eq!(eval_empty("1.5e2 >= 150"), Value::Bool(true));
    assert_eq!(eval_empty("!(1 < 2) || 3 != 3"), Value::Bool(false));
}

#[test]
fn strings_and_bools() {
    assert_eq!(eval_empty(r#""abc" < "abd""#), Value::Bool(true));
    assert_eq!(eval_empty(r#""ops" == "ops""#), Value::Bool(true));
    assert_eq!(eval_empty("true != false"), Value::Bool(true));
    assert_eq!(eval_empty(r#""line\n""#), Value::Str("line\n".into()));
}

#[test]
fn selector_falls_back_to_lowercase_binding() {
    let env: Bindings = [("a_value", 12.0)].into_iter().collect();
    assert_eq!(eval("a.Value > 10", &env).unwrap(), Value::Bool(true));

    let mut exact = env.clone();
    exact.insert("a_Value", 1.0);
    assert_eq!(eval("a.Value > 10", &exact).unwrap(), Value::Bool(false));
}

#[test]
fn unknown_identifier_reports_name_and_position() {
    let env: Bindings = [("known", 1.0)].into_iter().collect();
    assert_eq!(
        eval("known + missing", &env),
        Err(ExprError::UnknownIdentifier {
            name: "missing".into(),
            pos: 8
        })
    );
}

#[test]
fn mismatched_operands_are_type_errors() {
    let err = eval_empty_err(r#""x" + true"#);
    assert_eq!(
        err,
        ExprError::TypeMismatch {
            op: "+".into(),
            operands: "string and bool".into(),
            pos: 4
        }
    );
    assert!(matches!(eval_empty_err("1 < true"), ExprError::TypeMismatch { .. }));
    assert!(matches!(eval_empty_err("!1"), ExprError::TypeMismatch { .. }));
    assert!(matches!(eval_empty_err("-\"a\""), ExprError::TypeMismatch { .. }));
    assert!(matches!(eval_empty_err("1 && true"), ExprError::TypeMismatch { .. }));
    assert!(matches!(eval_empty_err("true < false"), ExprError::TypeMismatch { .. }));
}

fn eval_empty_err(text: &str) -> ExprError {
    eval(text, &Bindings::new()).unwrap_err()
}

#[test]
fn syntax_errors_carry_position() {
    match compile("rate > ") {
        Err(ExprError::Syntax { pos, .. }) => assert_eq!(pos, 7),
        other => panic!("expected syntax error, got {other:?}"),
    }
    assert!(matches!(compile("a >> b"), Err(ExprError::Syntax { pos: 3, .. })));
    assert!("2 +".parse::<crate::CompiledExpr>().is_err());
}

#[test]
fn ieee_semantics_for_nan_and_division() {
    let env: Bindings = [("x", f64::NAN)].into_iter().collect();
    assert_eq!(eval("x > 1", &env).unwrap(), Value::Bool(false));
    assert_eq!(eval("x <= 1", &env).unwrap(), Value::Bool(false));
    assert_eq!(eval("x == x", &env).unwrap(), Value::Bool(false));
    assert_eq!(eval("x != x", &env).unwrap(), Value::Bool(true));

    assert_eq!(eval_empty("1 / 0"), Value::Float(f64::INFINITY));
    assert!(eval_empty("0 / 0").as_f64().unwrap().is_nan());
}

#[test]
fn logical_operators_check_both_sides() {
    let env: Bindings = [("load", 0.5)].into_iter().collect();
    assert_eq!(eval("load > 1 && load < 2", &env).unwrap(), Value::Bool(false));
    assert_eq!(eval("load < 1 || load > 2", &env).unwrap(), Value::Bool(true));

    // The left side alone decides these, but the right side is still checked.
    assert!(matches!(
        eval("false && missing", &env),
        Err(ExprError::UnknownIdentifier { ref name, pos: 9 }) if name == "missing"
    ));
    assert!(matches!(
        eval("true || missing > 1", &env),
        Err(ExprError::UnknownIdentifier { .. })
    ));
    assert!(matches!(
        eval("true || \"str\"", &env),
        Err(ExprError::TypeMismatch { ref operands, .. }) if operands == "bool and string"
    ));
    assert!(matches!(
        eval("false && 1", &env),
        Err(ExprError::TypeMismatch { .. })
    ));
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    for src in [
        format!("{}1", "-".repeat(200_000)),
        format!("{}true", "!".repeat(200_000)),
        format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000)),
        format!("1{}", " + 1".repeat(200_000)),
    ] {
        assert!(matches!(compile(&src), Err(ExprError::Syntax { .. })));
    }

    let nested = format!("{}1{} > 0", "(".repeat(100), ")".repeat(100));
    assert_eq!(eval_empty(&nested), Value::Bool(true));
    assert_eq!(eval_empty(&format!("{}1", "-".repeat(100))), Value::Float(1.0));
}

#[test]
fn compiled_expression_is_reusable() {
    let expr = compile("load * 2 > limit").unwrap();
    let low: Bindings = [("load", 1.0), ("limit", 5.0)].into_iter().collect();
    let high: Bindings = [("load", 4.0), ("limit", 5.0)].into_iter().collect();

    assert_eq!(expr.evaluate(&low).unwrap(), Value::Bool(false));
    assert_eq!(expr.evaluate(&high).unwrap(), Value::Bool(true));
    assert_eq!(expr.evaluate(&low).unwrap(), Value::Bool(false));
    assert_eq!(expr.source(), "load * 2 > limit");
}

#[test]
fn identifiers_are_listed_once_in_order() {
    let expr = compile("svc.Hits.rate > 5 && limit < svc.Hits.rate || other").unwrap();
    assert_eq!(expr.identifiers(), vec!["svc_Hits_rate", "limit", "other"]);
}
