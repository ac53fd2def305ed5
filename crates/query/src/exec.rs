//! Query executor: expand, fetch, filter, sort, limit, materialize.

use std::sync::Arc;
use std::time::Instant;

use kubeql_core::aliases::AliasTable;
use kubeql_core::columns::ProjectionTable;
use kubeql_core::value::{SortKey, Value};
use kubeql_core::{Document, ListRequest, ResourceLister};
use kubeql_tsl::Predicate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bindings::Bindings;
use crate::options::{OrderItem, QueryOptions, SelectItem};
use crate::parse::{parse_field_expr, parse_query};
use crate::QueryError;

/// Rows never batch below this size once there are enough of them.
const MIN_BATCH: usize = 100;
const BATCHES_PER_CPU: usize = 4;

/// One output column: header text plus the item that fills it.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub title: String,
    pub item: SelectItem,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    /// One entry per column, in column order. `None` is an absent value.
    pub rows: Vec<Vec<Option<Value>>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.title.as_str())
    }

    /// Value of the column titled `title` in row `row`.
    pub fn get(&self, row: usize, title: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c.title == title)?;
        self.rows.get(row)?.get(col)?.as_ref()
    }
}

/// Read-only tables shared by every query of one invocation.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    aliases: AliasTable,
    projections: ProjectionTable,
    batch_size: Option<usize>,
}

impl Engine {
    pub fn new(aliases: AliasTable, projections: ProjectionTable) -> Self {
        Self { aliases, projections, batch_size: None }
    }

    /// Fixed filter batch size instead of the CPU-derived one.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size.max(1));
        self
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn parse(&self, query: &str) -> Result<QueryOptions, QueryError> {
        parse_query(query, &self.aliases)
    }

    /// Run a parsed query against `lister`.
    ///
    /// Everything that can fail without the network (projection expansion,
    /// predicate parsing, identifier binding) happens before the fetch.
    pub async fn run(
        &self,
        opts: &QueryOptions,
        lister: &dyn ResourceLister,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        let columns = self.columns(opts)?;
        let order_by = rebind_order(&opts.order_by, &columns);
        let filter = match &opts.filter {
            Some(text) => {
                let pred = Predicate::parse(text)?;
                let bindings = Bindings::resolve(&pred, &opts.select, &self.aliases)?;
                debug!(idents = bindings.len(), "predicate bound");
                Some((Arc::new(pred), Arc::new(bindings)))
            }
            None => None,
        };
        if opts.debug_level > 0 {
            info!(query = %opts, columns = columns.len(), "executing");
        }

        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        let req = ListRequest {
            resource: opts.from.name.clone(),
            namespace: opts.from.namespace.clone(),
            all_namespaces: opts.from.all_namespaces,
        };
        let started = Instant::now();
        let docs = lister.list(&req, cancel).await.map_err(|e| {
            if cancel.is_cancelled() {
                QueryError::Cancelled
            } else {
                QueryError::Fetch { resource: req.resource.clone(), source: e.into() }
            }
        })?;
        let took = started.elapsed();
        metrics::histogram!("query_fetch_ms", took.as_secs_f64() * 1_000.0);
        metrics::counter!("query_docs_fetched", docs.len() as u64);
        info!(resource = %req.resource, ns = ?req.namespace, all = req.all_namespaces, docs = docs.len(), took_ms = took.as_millis() as u64, "fetched");
        if docs.is_empty() {
            return Ok(QueryResult { columns, rows: Vec::new() });
        }

        let mut docs = match filter {
            Some((pred, bindings)) => {
                let started = Instant::now();
                let kept = self.filter(docs, pred, bindings, opts.debug_level, cancel).await?;
                metrics::histogram!("query_filter_ms", started.elapsed().as_secs_f64() * 1_000.0);
                kept
            }
            None => docs,
        };

        if !order_by.is_empty() {
            let started = Instant::now();
            docs = sort_documents(docs, &order_by);
            metrics::histogram!("query_sort_ms", started.elapsed().as_secs_f64() * 1_000.0);
        }

        if let Some(limit) = opts.limit {
            docs.truncate(limit);
        }

        let mut rows = Vec::with_capacity(docs.len());
        for doc in &docs {
            let row = columns.iter().map(|c| c.item.value(doc)).collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        metrics::counter!("query_rows_emitted", rows.len() as u64);
        debug!(rows = rows.len(), "materialized");
        Ok(QueryResult { columns, rows })
    }

    /// Output columns: the explicit select list, or the kind's default projection.
    pub fn columns(&self, opts: &QueryOptions) -> Result<Vec<Column>, QueryError> {
        let columns: Vec<Column> = if opts.select_all {
            let fields = self.projections.columns_for(&opts.from.name);
            let mut out = Vec::with_capacity(fields.len());
            for f in fields {
                let (field, reducer, _) = parse_field_expr(&f.name, &self.aliases)?;
                let item = SelectItem { field, alias: f.title.clone(), reducer, explicit: true };
                out.push(Column { title: f.title.clone(), item });
            }
            out
        } else {
            opts.select.iter().map(|s| Column { title: s.alias.clone(), item: s.clone() }).collect()
        };
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].iter().any(|p| p.title == c.title) {
                return Err(QueryError::Syntax(format!("duplicate column name {:?}", c.title)));
            }
        }
        Ok(columns)
    }

    async fn filter(
        &self,
        docs: Vec<Document>,
        pred: Arc<Predicate>,
        bindings: Arc<Bindings>,
        debug_level: u8,
        cancel: &CancellationToken,
    ) -> Result<Vec<Document>, QueryError> {
        let total = docs.len();
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let size = self.batch_size.unwrap_or_else(|| batch_size(total, cpus));

        // One wave of at most `cpus` batches at a time; the token is checked between waves.
        let mut kept = Vec::new();
        let mut batches = 0usize;
        let mut rest = docs.into_iter().peekable();
        while rest.peek().is_some() {
            if cancel.is_cancelled() {
                debug!(total, batches, "filter cancelled");
                return Err(QueryError::Cancelled);
            }
            let mut wave = Vec::with_capacity(cpus);
            while wave.len() < cpus {
                let batch: Vec<Document> = rest.by_ref().take(size).collect();
                if batch.is_empty() {
                    break;
                }
                let (pred, bindings) = (Arc::clone(&pred), Arc::clone(&bindings));
                wave.push(tokio::task::spawn_blocking(move || filter_batch(batch, &pred, &bindings, debug_level)));
            }
            batches += wave.len();
            for h in wave {
                match h.await {
                    Ok(mut part) => kept.append(&mut part),
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(_) => return Err(QueryError::Cancelled),
                }
            }
        }
        debug!(total, kept = kept.len(), batch = size, batches, "filtered");
        Ok(kept)
    }
}

/// Filter batch size: `total / (cpus * 4)`, at least 100 when there are more
/// than 100 documents, and never below 1.
pub fn batch_size(total: usize, cpus: usize) -> usize {
    let size = total / (cpus.max(1) * BATCHES_PER_CPU);
    if size < MIN_BATCH && total > MIN_BATCH {
        MIN_BATCH
    } else {
        size.max(1)
    }
}

fn filter_batch(batch: Vec<Document>, pred: &Predicate, bindings: &Bindings, debug_level: u8) -> Vec<Document> {
    batch
        .into_iter()
        .filter(|doc| match pred.matches(&|ident: &str| bindings.lookup(doc, ident)) {
            Ok(hit) => hit,
            Err(e) => {
                let name = doc.pointer("/metadata/name").and_then(|v| v.as_str()).unwrap_or_default();
                if debug_level > 0 {
                    info!(%name, error = %e, "predicate failed, skipping document");
                } else {
                    debug!(%name, error = %e, "predicate failed, skipping document");
                }
                false
            }
        })
        .collect()
}

// ORDER BY items that name a default-projection title sort by that column.
fn rebind_order(order_by: &[OrderItem], columns: &[Column]) -> Vec<OrderItem> {
    order_by
        .iter()
        .map(|o| match columns.iter().find(|c| !o.select_ref.explicit && c.title == o.select_ref.alias) {
            Some(c) => OrderItem { select_ref: c.item.clone(), descending: o.descending },
            None => o.clone(),
        })
        .collect()
}

/// Stable sort on precomputed [`SortKey`]s. Absent sorts first; `DESC` inverts.
/// Documents whose key cannot be computed sort as absent.
pub fn sort_documents(docs: Vec<Document>, order_by: &[OrderItem]) -> Vec<Document> {
    let mut keyed: Vec<(Vec<SortKey>, Document)> = docs
        .into_iter()
        .map(|doc| {
            let keys = order_by
                .iter()
                .map(|o| {
                    let v = o.select_ref.value(&doc).unwrap_or_else(|e| {
                        debug!(key = %o.select_ref.alias, error = %e, "sort key unavailable");
                        None
                    });
                    SortKey::new(v.as_ref())
                })
                .collect();
            (keys, doc)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        for (i, o) in order_by.iter().enumerate() {
            let ord = a[i].cmp(&b[i]);
            let ord = if o.descending { ord.reverse() } else { ord };
            if ord.is_ne() {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    keyed.into_iter().map(|(_, doc)| doc).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_sizes() {
        assert_eq!(batch_size(0, 8), 1);
        assert_eq!(batch_size(10, 8), 1);
        assert_eq!(batch_size(100, 1), 25);
        assert_eq!(batch_size(101, 8), 100);
        assert_eq!(batch_size(10_000, 4), 625);
        assert_eq!(batch_size(50, 0), 12);
    }

    fn doc(name: &str, n: i64) -> Document {
        json!({ "metadata": { "name": name }, "spec": { "n": n } })
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d["metadata"]["name"].as_str().unwrap()).collect()
    }

    fn order(path: &str, descending: bool) -> OrderItem {
        let field = kubeql_core::path::CanonicalPath::parse(path).unwrap();
        OrderItem { select_ref: SelectItem::implicit(field, Default::default(), path), descending }
    }

    #[test]
    fn sort_is_stable_and_absent_first() {
        let docs = vec![doc("a", 2), doc("b", 1), doc("c", 2), json!({ "metadata": { "name": "d" } })];
        let asc = sort_documents(docs.clone(), &[order("spec.n", false)]);
        assert_eq!(names(&asc), vec!["d", "b", "a", "c"]);
        let desc = sort_documents(docs, &[order("spec.n", true)]);
        assert_eq!(names(&desc), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn sort_breaks_ties_with_later_keys() {
        let docs = vec![doc("b", 1), doc("a", 1), doc("c", 0)];
        let sorted = sort_documents(docs, &[order("spec.n", false), order("metadata.name", true)]);
        assert_eq!(names(&sorted), vec!["c", "b", "a"]);
    }

    #[test]
    fn mixed_type_keys_sort_by_class() {
        let docs: Vec<Document> = (0..600)
            .map(|i| {
                let v = match i % 3 {
                    0 => json!(i),
                    1 => json!(format!("{}a", i)),
                    _ => json!(i.to_string()),
                };
                json!({ "metadata": { "name": format!("d{i}") }, "spec": { "v": v } })
            })
            .collect();
        let sorted = sort_documents(docs, &[order("spec.v", false)]);
        assert_eq!(sorted.len(), 600);
        let keys: Vec<SortKey> =
            sorted.iter().map(|d| SortKey::new(Value::from_json(&d["spec"]["v"]).as_ref())).collect();
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        let first_text = sorted.iter().position(|d| d["spec"]["v"].as_str().is_some_and(|s| s.ends_with('a')));
        assert_eq!(first_text, Some(400));

        let desc = sort_documents(sorted, &[order("spec.v", true)]);
        assert_eq!(desc[0]["spec"]["v"], json!("97a"));
    }
}
