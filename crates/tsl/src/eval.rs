//! Evaluation over a variable-lookup callback.

use std::cmp::Ordering;

use kubeql_core::reduce::Reducer;
use kubeql_core::value::{compare, equals, Value};

use crate::ast::{CmpOp, Expr, Func, Pattern};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum EvalError {
    #[error("expected a boolean, got {found}")]
    NotBoolean { found: &'static str },
    #[error("{func}() cannot be applied to {found}")]
    BadArgument { func: Func, found: &'static str },
    #[error("lookup of {ident:?} failed: {reason}")]
    Lookup { ident: String, reason: String },
}

/// Resolves identifiers to values. `Ok(None)` means the identifier is absent.
pub trait Lookup {
    fn lookup(&self, ident: &str) -> Result<Option<Value>, EvalError>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Result<Option<Value>, EvalError>,
{
    fn lookup(&self, ident: &str) -> Result<Option<Value>, EvalError> {
        self(ident)
    }
}

impl Expr {
    pub fn eval(&self, env: &dyn Lookup) -> Result<Option<Value>, EvalError> {
        match self {
            Expr::Literal(v) => Ok(Some(v.clone())),
            Expr::Null => Ok(None),
            Expr::Ident(name) => env.lookup(name),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for e in items {
                    out.push(e.eval(env)?.unwrap_or(Value::Null));
                }
                Ok(Some(Value::List(out)))
            }
            Expr::Not(e) => Ok(Some(Value::Bool(!truthy(e.eval(env)?)?))),
            Expr::And(a, b) => {
                let ok = truthy(a.eval(env)?)? && truthy(b.eval(env)?)?;
                Ok(Some(Value::Bool(ok)))
            }
            Expr::Or(a, b) => {
                let ok = truthy(a.eval(env)?)? || truthy(b.eval(env)?)?;
                Ok(Some(Value::Bool(ok)))
            }
            Expr::Compare { op, lhs, rhs } => {
                let (l, r) = (lhs.eval(env)?, rhs.eval(env)?);
                Ok(Some(broadcast(l, |x| compare_op(*op, x, r.as_ref()))))
            }
            Expr::Match { lhs, pattern, negated } => {
                let l = lhs.eval(env)?;
                Ok(Some(broadcast(l, |x| matches_pattern(pattern, x) != *negated)))
            }
            Expr::In { lhs, set, negated } => {
                let l = lhs.eval(env)?;
                let members = match set.eval(env)? {
                    Some(Value::List(items)) => items,
                    Some(single) => vec![single],
                    None => Vec::new(),
                };
                Ok(Some(broadcast(l, |x| contains(&members, x) != *negated)))
            }
            Expr::Between { operand, low, high, negated } => {
                let v = operand.eval(env)?;
                let (lo, hi) = (low.eval(env)?, high.eval(env)?);
                Ok(Some(broadcast(v, |x| {
                    let inside = compare_op(CmpOp::Ge, x, lo.as_ref()) && compare_op(CmpOp::Le, x, hi.as_ref());
                    match x {
                        None => *negated,
                        Some(_) => inside != *negated,
                    }
                })))
            }
            Expr::IsNull { operand, negated } => {
                let v = operand.eval(env)?;
                let is_null = matches!(v, None | Some(Value::Null));
                Ok(Some(Value::Bool(is_null != *negated)))
            }
            Expr::Call { func, arg } => call(*func, arg.eval(env)?),
        }
    }
}

/// Truthiness of a predicate result: absent is false, non-booleans are errors.
pub fn truthy(v: Option<Value>) -> Result<bool, EvalError> {
    match v {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(EvalError::NotBoolean { found: other.type_name() }),
    }
}

// A list on the left evaluates element-wise into a list of booleans.
fn broadcast(lhs: Option<Value>, f: impl Fn(Option<&Value>) -> bool) -> Value {
    match lhs {
        Some(Value::List(items)) => Value::List(items.iter().map(|x| Value::Bool(f(present(x)))).collect()),
        other => Value::Bool(f(other.as_ref())),
    }
}

fn present(v: &Value) -> Option<&Value> {
    match v {
        Value::Null => None,
        v => Some(v),
    }
}

fn compare_op(op: CmpOp, l: Option<&Value>, r: Option<&Value>) -> bool {
    let (Some(l), Some(r)) = (l.and_then(present), r.and_then(present)) else {
        return op == CmpOp::Ne;
    };
    let Some(ord) = compare(l, r) else {
        return op == CmpOp::Ne;
    };
    match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
    }
}

fn matches_pattern(p: &Pattern, v: Option<&Value>) -> bool {
    match v {
        None => false,
        Some(v) => p.is_match(&v.to_string()),
    }
}

fn contains(members: &[Value], v: Option<&Value>) -> bool {
    match v {
        None => false,
        Some(v) => members.iter().any(|m| equals(m, v)),
    }
}

fn call(func: Func, v: Option<Value>) -> Result<Option<Value>, EvalError> {
    let Some(v) = v else {
        return Ok(match func {
            Func::Len => None,
            Func::Any | Func::All => Some(Value::Bool(false)),
        });
    };
    let out = match (func, v) {
        (Func::Len, Value::List(items)) => Value::Int(items.len() as i64),
        (Func::Len, Value::Map(m)) => Value::Int(m.len() as i64),
        (Func::Len, Value::Str(s)) => Value::Int(s.chars().count() as i64),
        (Func::Any, Value::List(items)) => Reducer::Any.reduce(&items),
        (Func::All, Value::List(items)) => Reducer::All.reduce(&items),
        (Func::Any | Func::All, Value::Bool(b)) => Value::Bool(b),
        (func, other) => return Err(EvalError::BadArgument { func, found: other.type_name() }),
    };
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use kubeql_core::scalar::parse_scalar;

    fn env(ident: &str) -> Result<Option<Value>, EvalError> {
        let v = match ident {
            "phase" => Value::Str("Running".into()),
            "replicas" => Value::Int(3),
            "ratio" => Value::Float(3.0),
            "mem" => parse_scalar("150Mi"),
            "created" => parse_scalar("2024-01-02T10:00:00Z"),
            "images" => Value::List(vec![Value::Str("redis:7".into()), Value::Str("nginx:1.25".into())]),
            "ready" => Value::List(vec![Value::Bool(true), Value::Bool(false)]),
            "empty" => Value::List(vec![]),
            "labels" => Value::Map(serde_json::Map::new()),
            "broken" => return Err(EvalError::Lookup { ident: ident.into(), reason: "boom".into() }),
            _ => return Ok(None),
        };
        Ok(Some(v))
    }

    fn check(src: &str) -> bool {
        let e = parse(src).unwrap();
        truthy(e.eval(&env).unwrap()).unwrap()
    }

    #[test]
    fn scalar_comparisons() {
        assert!(check("phase = 'Running'"));
        assert!(check("replicas = ratio"));
        assert!(check("replicas = '3'"));
        assert!(check("replicas >= 2 and replicas < 4"));
        assert!(check("mem <= 200Mi"));
        assert!(!check("mem > 200Mi"));
        assert!(check("created > 2024-01-01"));
        assert!(check("created < '2024-01-03T00:00:00Z'"));
    }

    #[test]
    fn absent_values() {
        assert!(!check("missing = 'x'"));
        assert!(check("missing != 'x'"));
        assert!(!check("missing < 3"));
        assert!(check("missing is null"));
        assert!(!check("phase is null"));
        assert!(!check("missing in ('a')"));
        assert!(check("missing not in ('a')"));
        assert!(!check("missing"));
    }

    #[test]
    fn patterns() {
        assert!(check("phase like 'Run%'"));
        assert!(check("phase ilike 'run%'"));
        assert!(check("phase not like 'Pend%'"));
        assert!(check("phase ~= '^Run'"));
        assert!(check("phase ~! 'Pending'"));
        assert!(check("replicas ~= '^3$'"));
    }

    #[test]
    fn quantifiers_over_lists() {
        assert!(check("any(images ~= 'nginx.*')"));
        assert!(!check("all(images ~= 'nginx.*')"));
        assert!(check("any(ready)"));
        assert!(!check("all(ready)"));
        assert!(!check("any(empty)"));
        assert!(!check("all(empty)"));
        assert!(check("len(images) = 2"));
        assert!(check("len(labels) = 0"));
        assert!(check("len(phase) = 7"));
        assert!(check("'redis:7' in images"));
        assert!(check("any(images in ['nginx:1.25', 'busybox'])"));
    }

    #[test]
    fn sets_and_ranges() {
        assert!(check("phase in ('Running', 'Pending')"));
        assert!(check("phase not in ['Failed']"));
        assert!(check("replicas in (1, 2, 3.0)"));
        assert!(check("replicas between 1 and 3"));
        assert!(!check("replicas not between 1 and 3"));
    }

    #[test]
    fn type_errors_surface() {
        let e = parse("phase").unwrap();
        assert_eq!(truthy(e.eval(&env).unwrap()), Err(EvalError::NotBoolean { found: "string" }));
        let e = parse("images = 'x'").unwrap();
        assert!(truthy(e.eval(&env).unwrap()).is_err());
        let e = parse("len(replicas) > 1").unwrap();
        assert!(matches!(e.eval(&env), Err(EvalError::BadArgument { func: Func::Len, .. })));
        let e = parse("broken = 1").unwrap();
        assert!(matches!(e.eval(&env), Err(EvalError::Lookup { .. })));
    }
}
