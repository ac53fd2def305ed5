//! kubeql core types: documents, typed values, paths, aliases and projections.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub mod aliases;
pub mod columns;
pub mod config;
pub mod extract;
pub mod path;
pub mod reduce;
pub mod scalar;
pub mod value;

/// One decoded cluster object (`apiVersion`, `kind`, `metadata`, `spec`, `status`, ...).
pub type Document = serde_json::Value;

pub mod prelude {
    pub use super::aliases::AliasTable;
    pub use super::columns::{ProjectionTable, TableField};
    pub use super::config::Config;
    pub use super::extract::extract;
    pub use super::path::{CanonicalPath, PathError, Step};
    pub use super::reduce::{ReduceError, Reducer};
    pub use super::scalar::parse_scalar;
    pub use super::value::Value;
    pub use super::{Document, ListRequest, ResourceLister};
}

/// What the executor asks the cluster collaborator for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    /// Plural, singular, short name or kind as typed by the user.
    pub resource: String,
    /// `None` means "the client's current namespace".
    pub namespace: Option<String>,
    pub all_namespaces: bool,
}

/// Cluster collaborator: resolves a resource name and lists its objects.
///
/// Implementations must stop waiting on the network once `cancel` fires.
#[async_trait::async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list(&self, req: &ListRequest, cancel: &CancellationToken) -> anyhow::Result<Vec<Document>>;
}
