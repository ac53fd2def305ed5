//! Typed values produced by the extractor and consumed by predicates, sorting and output.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::scalar::parse_scalar;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A JSON `null` that sits inside a list. A top-level null is reported as absent.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    /// Nested mapping, kept as raw JSON.
    Map(serde_json::Map<String, serde_json::Value>),
}

impl Value {
    /// Convert a JSON leaf, inferring types of string leaves. `null` is absent.
    pub fn from_json(v: &serde_json::Value) -> Option<Value> {
        match v {
            serde_json::Value::Null => None,
            other => Some(Self::from_json_inner(other)),
        }
    }

    fn from_json_inner(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => parse_scalar(s),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Self::from_json_inner).collect()),
            serde_json::Value::Object(m) => Value::Map(m.clone()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(render_date(d)),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(m) => serde_json::Value::Object(m.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Date(_) => "date",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Strings re-enter type inference; everything else is returned as is.
    fn coerced(&self) -> Cow<'_, Value> {
        match self {
            Value::Str(s) => Cow::Owned(parse_scalar(s)),
            other => Cow::Borrowed(other),
        }
    }
}

/// Ordering used by predicates and ORDER BY.
///
/// Numbers compare numerically (including numeric strings), dates temporally,
/// booleans false < true; any other pairing compares the rendered text.
/// `None` means the pair is unordered (NaN).
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    let (ca, cb) = (a.coerced(), b.coerced());
    match (ca.as_ref(), cb.as_ref()) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (x, y) if x.is_number() && y.is_number() => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => Some(a.to_string().cmp(&b.to_string())),
    }
}

pub fn equals(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

/// Normalized ORDER BY key with a total order.
///
/// Keys rank by class first: absent, null, bool, number (numeric strings
/// included), date (date strings included), then everything else by its text.
/// Values only compare within their class.
#[derive(Debug, Clone)]
pub enum SortKey {
    Absent,
    Null,
    Bool(bool),
    Number(f64),
    Date(DateTime<Utc>),
    Text(String),
}

impl SortKey {
    pub fn new(v: Option<&Value>) -> Self {
        let Some(v) = v else {
            return SortKey::Absent;
        };
        match v.coerced().as_ref() {
            Value::Null => SortKey::Null,
            Value::Bool(b) => SortKey::Bool(*b),
            Value::Int(i) => SortKey::Number(*i as f64),
            Value::Float(f) => SortKey::Number(*f),
            Value::Date(d) => SortKey::Date(*d),
            other => SortKey::Text(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Absent => 0,
            SortKey::Null => 1,
            SortKey::Bool(_) => 2,
            SortKey::Number(_) => 3,
            SortKey::Date(_) => 4,
            SortKey::Text(_) => 5,
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

pub fn render_date(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Display rendering used for table cells and lexicographic comparison.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => f.write_str(&render_date(d)),
            Value::List(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_leaves_are_typed() {
        assert_eq!(Value::from_json(&json!(null)), None);
        assert_eq!(Value::from_json(&json!("3")), Some(Value::Int(3)));
        assert_eq!(Value::from_json(&json!(["1", "x"])), Some(Value::List(vec![Value::Int(1), Value::Str("x".into())])));
        assert_eq!(Value::from_json(&json!(2.5)), Some(Value::Float(2.5)));
    }

    #[test]
    fn int_float_compare_numerically() {
        assert!(equals(&Value::Int(3), &Value::Float(3.0)));
        assert_eq!(compare(&Value::Int(2), &Value::Float(2.5)), Some(Ordering::Less));
    }

    #[test]
    fn numeric_strings_coerce() {
        assert!(equals(&Value::Str("10".into()), &Value::Int(10)));
        assert_eq!(compare(&Value::Str("9".into()), &Value::Str("10".into())), Some(Ordering::Less));
        assert_eq!(compare(&Value::Str("b".into()), &Value::Str("a".into())), Some(Ordering::Greater));
    }

    #[test]
    fn dates_against_date_strings() {
        let d = crate::scalar::parse_scalar("2024-01-02T00:00:00Z");
        assert_eq!(compare(&d, &Value::Str("2024-01-01".into())), Some(Ordering::Greater));
    }

    #[test]
    fn absent_sorts_first() {
        assert!(SortKey::new(None) < SortKey::new(Some(&Value::Int(0))));
        assert_eq!(SortKey::new(None), SortKey::new(None));
    }

    #[test]
    fn sort_keys_rank_by_class() {
        let key = |v: Value| SortKey::new(Some(&v));
        let two = key(Value::Int(2));
        let ten = key(Value::Str("10".into()));
        let text = key(Value::Str("1a".into()));
        assert!(two < ten && ten < text && two < text);
        assert_eq!(key(Value::Int(3)), key(Value::Float(3.0)));
        assert!(key(Value::Bool(true)) < key(Value::Int(-5)));
        assert!(key(Value::Str("2024-01-01".into())) < key(Value::Str("v3".into())));
        assert!(key(Value::Float(f64::NAN)) > key(Value::Float(f64::INFINITY)));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
        assert_eq!(crate::scalar::parse_scalar("2024-01-02T00:00:00Z").to_string(), "2024-01-02T00:00:00Z");
        assert_eq!(Value::List(vec![Value::Int(1), Value::Str("a".into())]).to_string(), r#"[1,"a"]"#);
        assert_eq!(Value::Null.to_string(), "");
    }
}
