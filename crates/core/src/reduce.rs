//! List reducers: `len`, `sum`, `any`, `all`.

use std::fmt;
use std::str::FromStr;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reducer {
    #[default]
    None,
    Len,
    Sum,
    Any,
    All,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReduceError {
    #[error("unknown reducer {0:?}: must be one of 'len', 'sum', 'any', 'all'")]
    Unknown(String),
    #[error("reducer {reducer} can only be applied to list values, got {found}")]
    NotAList { reducer: Reducer, found: &'static str },
}

impl Reducer {
    pub fn is_none(self) -> bool {
        self == Reducer::None
    }

    pub fn name(self) -> &'static str {
        match self {
            Reducer::None => "",
            Reducer::Len => "len",
            Reducer::Sum => "sum",
            Reducer::Any => "any",
            Reducer::All => "all",
        }
    }

    /// Collapse an extracted value. Absent stays absent.
    pub fn apply(self, value: Option<Value>) -> Result<Option<Value>, ReduceError> {
        if self.is_none() {
            return Ok(value);
        }
        let items = match value {
            None => return Ok(None),
            Some(Value::List(items)) => items,
            Some(other) => return Err(ReduceError::NotAList { reducer: self, found: other.type_name() }),
        };
        Ok(Some(self.reduce(&items)))
    }

    pub fn reduce(self, items: &[Value]) -> Value {
        match self {
            Reducer::None | Reducer::Len => Value::Int(items.len() as i64),
            Reducer::Sum => sum(items),
            Reducer::Any => Value::Bool(items.iter().any(|v| v.as_bool() == Some(true))),
            Reducer::All => Value::Bool(!items.is_empty() && items.iter().all(|v| v.as_bool() == Some(true))),
        }
    }
}

// Integer sum while every addend is an integer and nothing overflows.
fn sum(items: &[Value]) -> Value {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0f64;
    for v in items {
        match v {
            Value::Int(i) => {
                int_total = int_total.and_then(|t| t.checked_add(*i));
                float_total += *i as f64;
            }
            Value::Float(f) => {
                int_total = None;
                float_total += f;
            }
            _ => {}
        }
    }
    match int_total {
        Some(t) => Value::Int(t),
        None => Value::Float(float_total),
    }
}

impl FromStr for Reducer {
    type Err = ReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "len" => Ok(Reducer::Len),
            "sum" => Ok(Reducer::Sum),
            "any" => Ok(Reducer::Any),
            "all" => Ok(Reducer::All),
            _ => Err(ReduceError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(xs: &[i64]) -> Vec<Value> {
        xs.iter().map(|i| Value::Int(*i)).collect()
    }

    #[test]
    fn empty_list_laws() {
        assert_eq!(Reducer::Len.reduce(&[]), Value::Int(0));
        assert_eq!(Reducer::Any.reduce(&[]), Value::Bool(false));
        assert_eq!(Reducer::All.reduce(&[]), Value::Bool(false));
        assert_eq!(Reducer::Sum.reduce(&[]), Value::Int(0));
    }

    #[test]
    fn sum_is_additive_and_skips_non_numbers() {
        let xs = ints(&[1, 2, 3]);
        let ys = vec![Value::Float(0.5), Value::Str("x".into()), Value::Int(4)];
        let joined: Vec<Value> = xs.iter().chain(ys.iter()).cloned().collect();
        let total = Reducer::Sum.reduce(&joined).as_f64().unwrap();
        let parts = Reducer::Sum.reduce(&xs).as_f64().unwrap() + Reducer::Sum.reduce(&ys).as_f64().unwrap();
        assert_eq!(total, parts);
        assert_eq!(Reducer::Sum.reduce(&xs), Value::Int(6));
    }

    #[test]
    fn any_and_all_need_real_booleans() {
        let mixed = vec![Value::Bool(true), Value::Str("true-ish".into())];
        assert_eq!(Reducer::Any.reduce(&mixed), Value::Bool(true));
        assert_eq!(Reducer::All.reduce(&mixed), Value::Bool(false));
        assert_eq!(Reducer::All.reduce(&[Value::Bool(true), Value::Bool(true)]), Value::Bool(true));
    }

    #[test]
    fn apply_rejects_scalars_and_keeps_absent() {
        assert_eq!(Reducer::Len.apply(None), Ok(None));
        assert_eq!(
            Reducer::Sum.apply(Some(Value::Int(3))),
            Err(ReduceError::NotAList { reducer: Reducer::Sum, found: "int" })
        );
        assert_eq!(Reducer::None.apply(Some(Value::Int(3))), Ok(Some(Value::Int(3))));
    }

    #[test]
    fn parse_names() {
        assert_eq!("LEN".parse::<Reducer>(), Ok(Reducer::Len));
        assert!(matches!("count".parse::<Reducer>(), Err(ReduceError::Unknown(_))));
    }
}
