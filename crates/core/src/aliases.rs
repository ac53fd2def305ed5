//! Default field aliases (`name` -> `metadata.name`, ...).

use rustc_hash::FxHashMap;

const BUILTIN: &[(&str, &str)] = &[
    ("name", "metadata.name"),
    ("namespace", "metadata.namespace"),
    ("labels", "metadata.labels"),
    ("annotations", "metadata.annotations"),
    ("created", "metadata.creationTimestamp"),
    ("deleted", "metadata.deletionTimestamp"),
    ("phase", "status.phase"),
    ("replicas", "spec.replicas"),
    ("conditions", "status.conditions"),
    ("uid", "metadata.uid"),
];

/// Prefixes whose remainder is one map key, dots included.
const MAP_PREFIXES: &[(&str, &str)] = &[("labels.", "metadata.labels"), ("annotations.", "metadata.annotations")];

#[derive(Debug, Clone)]
pub struct AliasTable {
    map: FxHashMap<String, String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AliasTable {
    pub fn builtin() -> Self {
        let map = BUILTIN.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        Self { map }
    }

    /// Later entries win over built-ins.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in entries {
            self.map.insert(k.into(), v.into());
        }
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.map.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Rewrite a user-visible field into its canonical text.
    ///
    /// `f(expr)` recurses into `expr`; trailing `[...]` subscripts are kept and re-appended.
    /// Unknown names pass through unchanged, so canonical paths resolve to themselves.
    pub fn resolve(&self, field: &str) -> String {
        let field = field.trim();
        if let Some((func, inner)) = split_call(field) {
            return format!("{}({})", func, self.resolve(inner));
        }
        let (base, subs) = match field.find('[') {
            Some(at) => field.split_at(at),
            None => (field, ""),
        };
        let base = base.trim_matches(|c| c == ' ' || c == '.');
        if let Some(target) = self.map.get(base) {
            return format!("{}{}", target, subs);
        }
        for (prefix, target) in MAP_PREFIXES {
            if let Some(key) = base.strip_prefix(prefix).filter(|k| !k.is_empty()) {
                return format!("{}[\"{}\"]{}", target, key, subs);
            }
        }
        format!("{}{}", base, subs)
    }
}

/// `name(inner)` where `name` is a word and the parentheses wrap the whole rest.
pub fn split_call(s: &str) -> Option<(&str, &str)> {
    let open = s.find('(')?;
    let func = s[..open].trim();
    if func.is_empty() || !func.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let inner = s[open + 1..].strip_suffix(')')?;
    Some((func, inner))
}
