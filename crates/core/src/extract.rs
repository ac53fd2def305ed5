//! Evaluate a canonical path against a decoded document.

use serde_json::Value as Json;

use crate::path::{CanonicalPath, Step};
use crate::value::Value;

enum Walked<'a> {
    Absent,
    One(&'a Json),
    Many(Vec<Value>),
}

/// Extract the value at `path`. `None` means absent.
///
/// Wildcards collect one result per list element, skipping absent ones, and
/// splice list results in one level deep. String leaves are typed through
/// [`crate::scalar::parse_scalar`]. An empty label or annotation value reads as `true`.
pub fn extract(doc: &Json, path: &CanonicalPath) -> Option<Value> {
    match walk(doc, path.steps()) {
        Walked::Absent => None,
        Walked::Many(items) => Some(Value::List(items)),
        Walked::One(Json::String(s)) if s.is_empty() && path.is_metadata_map_entry() => Some(Value::Bool(true)),
        Walked::One(j) => Value::from_json(j),
    }
}

fn walk<'a>(cur: &'a Json, steps: &[Step]) -> Walked<'a> {
    let Some((step, rest)) = steps.split_first() else {
        return Walked::One(cur);
    };
    let next = match (step, cur) {
        (Step::Key(k) | Step::MapKey(k), Json::Object(m)) => m.get(k),
        (Step::Index(i), Json::Array(items)) => items.get(*i),
        (Step::Nth(n), Json::Array(items)) => n.checked_sub(1).and_then(|i| items.get(i)),
        (Step::Nth(n), Json::Object(m)) => m.get(&n.to_string()),
        (Step::Wildcard, Json::Array(items)) => return fan_out(items, rest),
        _ => None,
    };
    match next {
        None | Some(Json::Null) => Walked::Absent,
        Some(v) => walk(v, rest),
    }
}

fn fan_out<'a>(items: &'a [Json], rest: &[Step]) -> Walked<'a> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match walk(item, rest) {
            Walked::Absent => {}
            Walked::Many(inner) => out.extend(inner),
            Walked::One(j) => match Value::from_json(j) {
                Some(Value::List(inner)) => out.extend(inner),
                Some(v) => out.push(v),
                None => {}
            },
        }
    }
    Walked::Many(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(doc: &Json, path: &str) -> Option<Value> {
        extract(doc, &CanonicalPath::parse(path).unwrap())
    }

    fn pod() -> Json {
        json!({
            "metadata": {
                "name": "web-1",
                "labels": { "app.kubernetes.io/name": "web", "canary": "" },
                "annotations": { "team": "core" }
            },
            "spec": {
                "replicas": "3",
                "containers": [
                    { "name": "app", "image": "nginx:1.25", "ports": [{ "containerPort": 80 }, { "containerPort": 443 }] },
                    { "name": "sidecar", "image": "envoy", "ports": [{ "containerPort": 9901 }] },
                    { "name": "init" }
                ]
            },
            "status": { "addresses": [{ "address": "10.0.0.1" }, { "address": "10.0.0.2" }] }
        })
    }

    #[test]
    fn keys_and_indices() {
        let d = pod();
        assert_eq!(at(&d, "metadata.name"), Some(Value::Str("web-1".into())));
        assert_eq!(at(&d, "spec.replicas"), Some(Value::Int(3)));
        assert_eq!(at(&d, "spec.containers[1].name"), Some(Value::Str("sidecar".into())));
        assert_eq!(at(&d, "spec.containers[9].name"), None);
        assert_eq!(at(&d, "metadata.name.first"), None);
        assert_eq!(at(&d, "spec.missing.deeper"), None);
    }

    #[test]
    fn legacy_positions_are_one_based() {
        let d = pod();
        assert_eq!(at(&d, "status.addresses.1.address"), Some(Value::Str("10.0.0.1".into())));
        assert_eq!(at(&d, "status.addresses.2.address"), at(&d, "status.addresses[1].address"));
        assert_eq!(at(&d, "status.addresses.0.address"), None);
    }

    #[test]
    fn wildcard_preserves_order_and_skips_absent() {
        let d = pod();
        let images = at(&d, "spec.containers[*].image").unwrap();
        assert_eq!(images, Value::List(vec![Value::Str("nginx:1.25".into()), Value::Str("envoy".into())]));
    }

    #[test]
    fn wildcard_flattens_one_level() {
        let d = pod();
        let ports = at(&d, "spec.containers[*].ports[*].containerPort").unwrap();
        assert_eq!(ports, Value::List(vec![Value::Int(80), Value::Int(443), Value::Int(9901)]));

        let nested = json!({ "m": [[[1, 2]], [[3]]] });
        assert_eq!(
            at(&nested, "m[*]").unwrap(),
            Value::List(vec![Value::List(vec![Value::Int(1), Value::Int(2)]), Value::List(vec![Value::Int(3)])])
        );
    }

    #[test]
    fn label_entries() {
        let d = pod();
        assert_eq!(at(&d, r#"metadata.labels["app.kubernetes.io/name"]"#), Some(Value::Str("web".into())));
        assert_eq!(at(&d, "metadata.labels.canary"), Some(Value::Bool(true)));
        assert_eq!(at(&d, "metadata.labels.absent"), None);
        assert_eq!(at(&d, "metadata.annotations.team"), Some(Value::Str("core".into())));
    }

    #[test]
    fn wildcard_on_non_list_is_empty_or_absent() {
        let d = pod();
        assert_eq!(at(&d, "metadata.name[*]"), None);
        assert_eq!(at(&d, "spec.none[*].x"), None);
    }
}
