//! Identifier bindings for WHERE evaluation.
//!
//! Every identifier in the predicate is resolved once, before any document is
//! touched: per-query `AS` aliases first, then the alias table. Evaluation is a
//! map lookup followed by extract + reduce.

use kubeql_core::aliases::AliasTable;
use kubeql_core::extract::extract;
use kubeql_core::path::CanonicalPath;
use kubeql_core::reduce::Reducer;
use kubeql_core::value::Value;
use kubeql_core::Document;
use kubeql_tsl::{EvalError, Predicate};
use rustc_hash::FxHashMap;

use crate::options::SelectItem;
use crate::parse::parse_field_expr;
use crate::QueryError;

#[derive(Debug, Clone, PartialEq)]
struct Binding {
    field: CanonicalPath,
    reducer: Reducer,
}

#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: FxHashMap<String, Binding>,
}

impl Bindings {
    pub fn resolve(pred: &Predicate, select: &[SelectItem], aliases: &AliasTable) -> Result<Self, QueryError> {
        let mut map = FxHashMap::default();
        for ident in pred.identifiers() {
            let binding = match select.iter().find(|s| s.alias == ident) {
                Some(item) => Binding { field: item.field.clone(), reducer: item.reducer },
                None => {
                    let (field, reducer, _) = parse_field_expr(ident, aliases)?;
                    Binding { field, reducer }
                }
            };
            map.insert(ident.to_string(), binding);
        }
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Value of `ident` in `doc`. Reducer failures are per-document errors.
    pub fn lookup(&self, doc: &Document, ident: &str) -> Result<Option<Value>, EvalError> {
        let Some(b) = self.map.get(ident) else {
            return Err(EvalError::Lookup { ident: ident.to_string(), reason: "unbound identifier".into() });
        };
        b.reducer
            .apply(extract(doc, &b.field))
            .map_err(|e| EvalError::Lookup { ident: ident.to_string(), reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(path: &str, alias: &str, reducer: Reducer) -> SelectItem {
        SelectItem { field: CanonicalPath::parse(path).unwrap(), alias: alias.into(), reducer, explicit: true }
    }

    #[test]
    fn select_aliases_shadow_the_alias_table() {
        let doc = json!({
            "metadata": { "name": "web-1" },
            "status": { "phase": "Running", "reason": "Evicted" },
            "spec": { "containers": [ {}, {}, {} ] }
        });
        let pred = Predicate::parse("phase = 'Evicted' and n = 3 and name = 'web-1'").unwrap();
        let select = [item("status.reason", "phase", Reducer::None), item("spec.containers", "n", Reducer::Len)];
        let b = Bindings::resolve(&pred, &select, &AliasTable::builtin()).unwrap();
        assert_eq!(b.len(), 3);
        assert!(pred.matches(&|i: &str| b.lookup(&doc, i)).unwrap());
    }

    #[test]
    fn reducer_on_scalar_is_a_lookup_error() {
        let doc = json!({ "status": { "phase": "Running" } });
        let pred = Predicate::parse("p > 1").unwrap();
        let select = [item("status.phase", "p", Reducer::Len)];
        let b = Bindings::resolve(&pred, &select, &AliasTable::builtin()).unwrap();
        assert!(matches!(b.lookup(&doc, "p"), Err(EvalError::Lookup { .. })));
        assert!(matches!(b.lookup(&doc, "other"), Err(EvalError::Lookup { .. })));
    }

    #[test]
    fn invalid_identifier_paths_fail_up_front() {
        let pred = Predicate::parse("spec..name = 'x'").unwrap();
        assert!(matches!(Bindings::resolve(&pred, &[], &AliasTable::builtin()), Err(QueryError::Syntax(_))));
    }
}
