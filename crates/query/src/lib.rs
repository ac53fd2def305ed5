//! kubeql query: the SQL-shaped surface over cluster documents.
//!
//! `parse_query` turns text into [`QueryOptions`]; [`Engine::run`] fetches
//! through a [`kubeql_core::ResourceLister`] and applies filter, sort and limit.

#![forbid(unsafe_code)]

mod bindings;
pub mod exec;
pub mod options;
pub mod parse;

use kubeql_core::reduce::ReduceError;
use kubeql_tsl::TslError;

pub use bindings::Bindings;
pub use exec::{batch_size, sort_documents, Column, Engine, QueryResult};
pub use options::{FromClause, OrderItem, QueryOptions, SelectItem};
pub use parse::parse_query;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query syntax error: {0}")]
    Syntax(String),
    #[error("invalid reducer {0:?}: must be one of 'sum', 'len', 'any', 'all'")]
    UnknownReducer(String),
    #[error("failed to parse where clause: {0}")]
    Predicate(#[from] TslError),
    #[error("failed to list {resource}")]
    Fetch {
        resource: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error(transparent)]
    Reducer(#[from] ReduceError),
    #[error("query cancelled")]
    Cancelled,
}
