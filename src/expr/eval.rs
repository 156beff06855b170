//! Tree-walking evaluator over `serde_json::Value`.
//!
//! The namespace is a closed allow-list: `test_case`, `results`, the two
//! range helpers, and a small math function table. Every fault is split
//! into "referenced something that does not exist" versus "blew up some
//! other way", because the two are reported differently upstream.

use serde_json::Value;
use thiserror::Error;

use super::ast::{BinOp, Expr, UnOp};

#[derive(Debug, Error, PartialEq)]
pub enum EvalFault {
    /// Unknown name/function, or a mapping key/field that is absent.
    #[error("{0}")]
    Undefined(String),

    /// Everything else: type errors, division faults, bad indices.
    #[error("{0}")]
    Fault(String),
}

/// The complete set of variable bindings visible to an expression.
pub struct Bindings<'a> {
    pub test_case: &'a Value,
    pub results: &'a Value,
}

pub fn evaluate(expr: &Expr, env: &Bindings<'_>) -> Result<Value, EvalFault> {
    match expr {
        Expr::Number(n) => number(*n),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),

        Expr::Ident(name) => match name.as_str() {
            "test_case" => Ok(env.test_case.clone()),
            "results" => Ok(env.results.clone()),
            other => Err(EvalFault::Undefined(format!("name '{other}' is not defined"))),
        },

        Expr::Index(base, index) => {
            let base = evaluate(base, env)?;
            let index = evaluate(index, env)?;
            subscript(&base, &index)
        }

        Expr::Field(base, field) => {
            let base = evaluate(base, env)?;
            subscript(&base, &Value::String(field.clone()))
        }

        Expr::Call { path, args } => {
            let args: Vec<Value> = args
                .iter()
                .map(|a| evaluate(a, env))
                .collect::<Result<_, _>>()?;
            call(path, &args)
        }

        Expr::Unary(op, operand) => {
            let operand = evaluate(operand, env)?;
            match op {
                UnOp::Neg => number(-as_number(&operand)?),
                UnOp::Not => Ok(Value::Bool(!is_truthy(&operand))),
            }
        }

        Expr::Binary(op, lhs, rhs) => binary(*op, lhs, rhs, env),
    }
}

fn binary(op: BinOp, lhs: &Expr, rhs: &Expr, env: &Bindings<'_>) -> Result<Value, EvalFault> {
    // Short-circuit connectives evaluate the right side lazily.
    match op {
        BinOp::And => {
            let lhs = evaluate(lhs, env)?;
            if !is_truthy(&lhs) {
                return Ok(Value::Bool(false));
            }
            let rhs = evaluate(rhs, env)?;
            return Ok(Value::Bool(is_truthy(&rhs)));
        }
        BinOp::Or => {
            let lhs = evaluate(lhs, env)?;
            if is_truthy(&lhs) {
                return Ok(Value::Bool(true));
            }
            let rhs = evaluate(rhs, env)?;
            return Ok(Value::Bool(is_truthy(&rhs)));
        }
        _ => {}
    }

    let lhs = evaluate(lhs, env)?;
    let rhs = evaluate(rhs, env)?;

    match op {
        BinOp::Add => number(as_number(&lhs)? + as_number(&rhs)?),
        BinOp::Sub => number(as_number(&lhs)? - as_number(&rhs)?),
        BinOp::Mul => number(as_number(&lhs)? * as_number(&rhs)?),
        BinOp::Div => {
            let divisor = as_number(&rhs)?;
            if divisor == 0.0 {
                return Err(EvalFault::Fault("division by zero".into()));
            }
            number(as_number(&lhs)? / divisor)
        }
        BinOp::Rem => {
            let divisor = as_number(&rhs)?;
            if divisor == 0.0 {
                return Err(EvalFault::Fault("modulo by zero".into()));
            }
            number(as_number(&lhs)? % divisor)
        }

        BinOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare(&lhs, &rhs, op)?;
            Ok(Value::Bool(ordering))
        }

        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn compare(lhs: &Value, rhs: &Value, op: BinOp) -> Result<bool, EvalFault> {
    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        return Ok(match op {
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!("ordering operators only"),
        });
    }
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return Ok(match op {
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!("ordering operators only"),
        });
    }
    Err(EvalFault::Fault(format!(
        "'{}' is not supported between {} and {}",
        op.symbol(),
        type_name(lhs),
        type_name(rhs)
    )))
}

/// Equality with numeric normalization (1 == 1.0); otherwise structural.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        return a == b;
    }
    lhs == rhs
}

fn subscript(base: &Value, index: &Value) -> Result<Value, EvalFault> {
    match (base, index) {
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().ok_or_else(|| {
            EvalFault::Undefined(format!("key '{key}' not found"))
        }),
        (Value::Object(_), other) => Err(EvalFault::Fault(format!(
            "mapping keys must be strings, got {}",
            type_name(other)
        ))),
        (Value::Array(items), index) => {
            let idx = as_number(index)?;
            if idx.fract() != 0.0 {
                return Err(EvalFault::Fault(format!("sequence index must be an integer, got {idx}")));
            }
            // Negative indices count from the end.
            let len = items.len() as i64;
            let idx = idx as i64;
            let resolved = if idx < 0 { idx + len } else { idx };
            if resolved < 0 || resolved >= len {
                return Err(EvalFault::Fault(format!(
                    "sequence index {idx} out of range (len {len})"
                )));
            }
            Ok(items[resolved as usize].clone())
        }
        (other, _) => Err(EvalFault::Fault(format!(
            "{} is not subscriptable",
            type_name(other)
        ))),
    }
}

fn call(path: &[String], args: &[Value]) -> Result<Value, EvalFault> {
    // `math.sqrt` and bare `sqrt` resolve identically.
    let name = match path {
        [one] => one.as_str(),
        [ns, func] if ns == "math" => func.as_str(),
        _ => {
            return Err(EvalFault::Undefined(format!(
                "function '{}' is not defined",
                path.join(".")
            )));
        }
    };

    match name {
        "within_range" => {
            let [value, low, high] = numeric_args::<3>(name, args)?;
            Ok(Value::Bool(low <= value && value <= high))
        }
        "within_percent" => {
            let [actual, reference, delta] = numeric_args::<3>(name, args)?;
            if reference == 0.0 {
                return Err(EvalFault::Fault(
                    "within_percent reference value is zero".into(),
                ));
            }
            Ok(Value::Bool(((actual - reference) / reference).abs() <= delta / 100.0))
        }
        "abs" | "fabs" => {
            let [v] = numeric_args::<1>(name, args)?;
            number(v.abs())
        }
        "sqrt" => {
            let [v] = numeric_args::<1>(name, args)?;
            if v < 0.0 {
                return Err(EvalFault::Fault("sqrt of a negative value".into()));
            }
            number(v.sqrt())
        }
        "floor" => {
            let [v] = numeric_args::<1>(name, args)?;
            number(v.floor())
        }
        "ceil" => {
            let [v] = numeric_args::<1>(name, args)?;
            number(v.ceil())
        }
        "round" => {
            let [v] = numeric_args::<1>(name, args)?;
            number(v.round())
        }
        "trunc" => {
            let [v] = numeric_args::<1>(name, args)?;
            number(v.trunc())
        }
        "pow" => {
            let [base, exp] = numeric_args::<2>(name, args)?;
            number(base.powf(exp))
        }
        "min" => fold_numeric(name, args, f64::min),
        "max" => fold_numeric(name, args, f64::max),
        other => Err(EvalFault::Undefined(format!(
            "function '{other}' is not defined"
        ))),
    }
}

fn numeric_args<const N: usize>(name: &str, args: &[Value]) -> Result<[f64; N], EvalFault> {
    if args.len() != N {
        return Err(EvalFault::Fault(format!(
            "{name}() expects {N} argument(s), got {}",
            args.len()
        )));
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = as_number(arg)?;
    }
    Ok(out)
}

fn fold_numeric(name: &str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, EvalFault> {
    if args.is_empty() {
        return Err(EvalFault::Fault(format!("{name}() expects at least 1 argument")));
    }
    let mut acc = as_number(&args[0])?;
    for arg in &args[1..] {
        acc = f(acc, as_number(arg)?);
    }
    number(acc)
}

fn as_number(value: &Value) -> Result<f64, EvalFault> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EvalFault::Fault(format!("number {n} is not representable"))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(EvalFault::Fault(format!(
            "expected a number, got {}",
            type_name(other)
        ))),
    }
}

fn number(value: f64) -> Result<Value, EvalFault> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| EvalFault::Fault("arithmetic produced a non-finite value".into()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Host truthiness: null, false, zero, and empty strings/containers are
/// falsy, everything else truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
