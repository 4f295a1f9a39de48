//! SQL tracing.
//!
//! When a datasource has SQL logging enabled, every statement runs inside a
//! `sql` span and emits two events under the `quickdao.sql` target: the
//! statement with its JSON rendered arguments before execution, and the
//! elapsed milliseconds after.

use std::future::Future;
use std::time::Instant;

use tracing::Instrument;

use crate::error::OrmResult;
use crate::value::Value;

pub(crate) async fn traced<F, R>(
    enabled: bool,
    trace_id: &str,
    sql: &str,
    args: &[Value],
    fut: F,
) -> OrmResult<R>
where
    F: Future<Output = OrmResult<R>>,
{
    if !enabled {
        return fut.await;
    }

    let args_json = serde_json::to_string(args).unwrap_or_else(|e| format!("<unserializable: {e}>"));
    let span = tracing::info_span!(target: "quickdao.sql", "sql", trace_id);
    tracing::info!(target: "quickdao.sql", parent: &span, sql, args = %args_json, "exec sql");

    let start = Instant::now();
    let result = fut.instrument(span.clone()).await;
    let cost_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => tracing::info!(target: "quickdao.sql", parent: &span, cost_ms, "sql done"),
        Err(e) => tracing::info!(target: "quickdao.sql", parent: &span, cost_ms, error = %e, "sql failed"),
    }
    result
}
