//! Driver abstraction.
//!
//! The core speaks to the database only through [`ConnectionPool`] and
//! [`Connection`]. SQL reaching a connection uses `?` placeholders and
//! `limit OFF,N` paging; a binding translates both to its dialect.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::TryStreamExt;

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// One result row: decoded cells plus the column names they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Cell of the first column named `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Take cell `idx` converted to `T`.
    pub fn try_get<T: crate::value::FromValue>(&self, idx: usize) -> OrmResult<T> {
        let column = self
            .columns
            .get(idx)
            .map(String::as_str)
            .unwrap_or("?");
        let value = self
            .values
            .get(idx)
            .cloned()
            .ok_or_else(|| OrmError::decode(column, format!("no cell at index {idx}")))?;
        value.into_field(column)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// A stream of rows.
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = OrmResult<Row>> + Send>>,
}

impl RowStream {
    /// Create a new `RowStream` from any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = OrmResult<Row>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for RowStream {
    type Item = OrmResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub affected: u64,
    /// Generated value of the auto column, when one was requested.
    pub last_insert_id: Option<i64>,
}

/// One pooled connection.
///
/// `close` hands the connection back to its pool; `discard` drops it without
/// returning it, which is what a context does when it is dropped with a
/// transaction possibly still open.
pub trait Connection: Send + Sync + 'static {
    /// Start a physical transaction.
    fn begin(&mut self, read_only: bool) -> impl Future<Output = OrmResult<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = OrmResult<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = OrmResult<()>> + Send;

    /// Execute a query and return its rows incrementally.
    fn query_stream(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = OrmResult<RowStream>> + Send;

    /// Execute a query and collect every row.
    fn query(&self, sql: &str, args: &[Value]) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        async move { self.query_stream(sql, args).await?.try_collect().await }
    }

    /// Execute a statement and return the affected row count.
    fn execute(&self, sql: &str, args: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute an insert, reporting the generated `auto_column` value if given.
    fn insert(
        &self,
        sql: &str,
        args: &[Value],
        auto_column: Option<&str>,
    ) -> impl Future<Output = OrmResult<ExecResult>> + Send;

    /// Return the connection to its pool.
    fn close(self) -> impl Future<Output = ()> + Send;

    /// Drop the connection without returning it to its pool.
    fn discard(self);
}

/// A source of connections.
pub trait ConnectionPool: Send + Sync + 'static {
    type Connection: Connection;

    fn acquire(&self) -> impl Future<Output = OrmResult<Self::Connection>> + Send;

    /// Stop handing out connections and release idle ones.
    fn close(&self);
}
