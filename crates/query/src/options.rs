//! Parsed query model and its canonical rendering.

use std::fmt;

use kubeql_core::extract::extract;
use kubeql_core::path::CanonicalPath;
use kubeql_core::reduce::{ReduceError, Reducer};
use kubeql_core::value::Value;
use kubeql_core::Document;

/// One projected column.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub field: CanonicalPath,
    /// Display name: the `AS` alias, or the trimmed source text.
    pub alias: String,
    pub reducer: Reducer,
    /// True when the alias was written with `AS` (or came from a table-fields title).
    pub explicit: bool,
}

impl SelectItem {
    pub fn implicit(field: CanonicalPath, reducer: Reducer, source: &str) -> Self {
        Self { field, alias: source.trim().to_string(), reducer, explicit: false }
    }

    /// Extract the field from `doc` and apply the reducer.
    pub fn value(&self, doc: &Document) -> Result<Option<Value>, ReduceError> {
        self.reducer.apply(extract(doc, &self.field))
    }

    /// `field` or `reducer(field)`, canonical paths only.
    pub fn expression(&self) -> String {
        if self.reducer.is_none() {
            self.field.to_string()
        } else {
            format!("{}({})", self.reducer, self.field)
        }
    }

    pub(crate) fn same_source(&self, other: &SelectItem) -> bool {
        self.field == other.field && self.reducer == other.reducer
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explicit {
            write!(f, "{} AS {}", self.expression(), self.alias)
        } else {
            f.write_str(&self.alias)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    /// The select item this key reuses, or an implicit one used only for ordering.
    pub select_ref: SelectItem,
    pub descending: bool,
}

impl fmt::Display for OrderItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{} {}", self.select_ref.alias, dir)
    }
}

/// The `FROM` target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FromClause {
    pub name: String,
    pub namespace: Option<String>,
    pub all_namespaces: bool,
}

impl FromClause {
    /// Apply the command-line namespace flags.
    ///
    /// `-A` beats anything written in the query; `-n` only fills a missing namespace.
    pub fn with_overrides(mut self, namespace: Option<&str>, all_namespaces: bool) -> Self {
        if all_namespaces {
            self.all_namespaces = true;
            self.namespace = None;
        } else if self.namespace.is_none() && !self.all_namespaces {
            self.namespace = namespace.map(str::to_string);
        }
        self
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.namespace, self.all_namespaces) {
            (_, true) => write!(f, "*/{}", self.name),
            (Some(ns), false) => write!(f, "{}/{}", ns, self.name),
            (None, false) => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Explicit items; empty when `select_all` is set.
    pub select: Vec<SelectItem>,
    /// `SELECT *` or no SELECT clause: the kind's default projection.
    pub select_all: bool,
    pub from: FromClause,
    /// Raw predicate text, handed to the predicate engine unchanged.
    pub filter: Option<String>,
    pub order_by: Vec<OrderItem>,
    /// `None` means unlimited.
    pub limit: Option<usize>,
    pub debug_level: u8,
}

impl QueryOptions {
    pub fn has_select(&self) -> bool {
        self.select_all || !self.select.is_empty()
    }

    pub fn has_from(&self) -> bool {
        !self.from.name.is_empty()
    }

    pub fn has_where(&self) -> bool {
        self.filter.is_some()
    }

    pub fn has_order(&self) -> bool {
        !self.order_by.is_empty()
    }

    pub fn has_limit(&self) -> bool {
        self.limit.is_some()
    }
}

impl fmt::Display for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.select_all {
            f.write_str("*")?;
        } else {
            write_joined(f, &self.select)?;
        }
        write!(f, " FROM {}", self.from)?;
        if let Some(w) = &self.filter {
            write!(f, " WHERE {}", w)?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            write_joined(f, &self.order_by)?;
        }
        if let Some(n) = self.limit {
            write!(f, " LIMIT {}", n)?;
        }
        Ok(())
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from(name: &str, ns: Option<&str>, all: bool) -> FromClause {
        FromClause { name: name.into(), namespace: ns.map(str::to_string), all_namespaces: all }
    }

    #[test]
    fn namespace_overrides() {
        assert_eq!(from("pods", None, false).with_overrides(Some("dev"), false), from("pods", Some("dev"), false));
        assert_eq!(from("pods", Some("prod"), false).with_overrides(Some("dev"), false), from("pods", Some("prod"), false));
        assert_eq!(from("pods", Some("prod"), false).with_overrides(Some("dev"), true), from("pods", None, true));
        assert_eq!(from("pods", None, true).with_overrides(Some("dev"), false), from("pods", None, true));
    }

    #[test]
    fn renders_from_forms() {
        assert_eq!(from("pods", None, false).to_string(), "pods");
        assert_eq!(from("pods", Some("kube-system"), false).to_string(), "kube-system/pods");
        assert_eq!(from("pods", None, true).to_string(), "*/pods");
    }

    #[test]
    fn select_item_value_applies_reducer() {
        let doc = serde_json::json!({ "spec": { "containers": [ { "name": "a" }, { "name": "b" } ] } });
        let item = SelectItem {
            field: CanonicalPath::parse("spec.containers").unwrap(),
            alias: "n".into(),
            reducer: Reducer::Len,
            explicit: true,
        };
        assert_eq!(item.value(&doc).unwrap(), Some(Value::Int(2)));
        assert_eq!(item.to_string(), "len(spec.containers) AS n");
    }
}
