use std::path::PathBuf;
use std::time::Instant;

use crate::error::SourceError;
use crate::rows::Table;

/// Names the relation a table is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    relation: String,
}

impl QueryDescriptor {
    pub fn relation(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.relation
    }
}

/// Row source for the dashboard. The remote store and its transport live behind this.
pub trait QueryExecutor {
    fn execute(
        &self,
        query: &QueryDescriptor,
    ) -> impl std::future::Future<Output = Result<Table, SourceError>> + Send;
}

/// Serves tables from `<dir>/<relation>.json` exports of the store.
#[derive(Debug, Clone)]
pub struct SnapshotExecutor {
    dir: PathBuf,
}

impl SnapshotExecutor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn snapshot_path(&self, query: &QueryDescriptor) -> PathBuf {
        self.dir.join(format!("{}.json", query.name()))
    }
}

impl QueryExecutor for SnapshotExecutor {
    async fn execute(&self, query: &QueryDescriptor) -> Result<Table, SourceError> {
        let start = Instant::now();
        let path = self.snapshot_path(query);

        let res = match tokio::fs::read(&path).await {
            Ok(bytes) => Table::from_json_slice(&bytes).map_err(SourceError::from),
            Err(source) => Err(SourceError::Io { path, source }),
        };

        let ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("dashboard_query_latency_ms", "relation" => query.name().to_string())
            .record(ms);
        match &res {
            Ok(table) => {
                metrics::counter!("dashboard_queries_total", "status" => "ok").increment(1);
                tracing::debug!(relation = query.name(), rows = table.len(), "query executed");
            }
            Err(e) => {
                metrics::counter!(
                    "dashboard_queries_total",
                    "status" => "error",
                    "kind" => e.kind()
                )
                .increment(1);
                tracing::warn!(relation = query.name(), error = %e, "query failed");
            }
        }
        res
    }
}
