//! Optional JSON config file: extra aliases and per-kind table fields.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aliases::AliasTable;
use crate::columns::{ProjectionTable, TableField};

/// Default file name under `$HOME/.kube`.
pub const CONFIG_FILE_NAME: &str = "kubectl-sql.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default, rename = "table-fields")]
    pub table_fields: BTreeMap<String, Vec<TableField>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parsing config {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

impl Config {
    /// `$HOME/.kube/kubectl-sql.json`, if `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube").join(CONFIG_FILE_NAME))
    }

    /// Load `path`. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
        };
        let cfg: Config =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        debug!(path = %path.display(), aliases = cfg.aliases.len(), kinds = cfg.table_fields.len(), "config loaded");
        Ok(cfg)
    }

    /// Built-in aliases with this file's entries layered on top.
    pub fn alias_table(&self) -> AliasTable {
        let mut t = AliasTable::builtin();
        t.extend(self.aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        t
    }

    /// Built-in projections with this file's kinds layered on top.
    pub fn projection_table(&self) -> ProjectionTable {
        let mut t = ProjectionTable::builtin();
        t.extend(self.table_fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kubeql-config-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        let p = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn missing_file_is_empty() {
        let cfg = Config::load(Path::new("/definitely/not/here/kubectl-sql.json")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn file_entries_layer_over_builtins() {
        let p = scratch(
            "layer",
            r#"{
                "aliases": { "node": "spec.nodeName", "phase": "status.reason" },
                "table-fields": { "Pod": [ { "title": "NAME", "name": "name" }, { "title": "NODE", "name": "node" } ] }
            }"#,
        );
        let cfg = Config::load(&p).unwrap();
        let aliases = cfg.alias_table();
        assert_eq!(aliases.resolve("node"), "spec.nodeName");
        assert_eq!(aliases.resolve("phase"), "status.reason");
        assert_eq!(aliases.resolve("name"), "metadata.name");

        let proj = cfg.projection_table();
        let titles: Vec<_> = proj.columns_for("pods").iter().map(|c| c.title.clone()).collect();
        assert_eq!(titles, vec!["NAME", "NODE"]);
        assert!(proj.get("Service").is_some());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let p = scratch("bad", "{ not json");
        assert!(matches!(Config::load(&p), Err(ConfigError::Parse { .. })));
    }
}
