//! Transaction contexts.
//!
//! A [`TransContext`] owns one pooled connection and, unless its style is
//! [`RequestStyle::None`], one physical transaction. Every operation checks that
//! the context is still in [`TcStatus::Init`]; [`TransContext::complete`] commits
//! or rolls back, returns the connection and moves the context to
//! [`TcStatus::Invalid`]. A context dropped before completion discards its
//! connection instead of returning it to the pool.
//!
//! Prefer the wrappers, which complete on every exit path including panics:
//!
//! ```ignore
//! use quickdao::{auto_trans, insert, RequestStyle};
//!
//! let id = auto_trans(&ds, RequestStyle::Write, "req-1", async |tc| {
//!     insert(tc, &GROUP_INFO, &mut group).await?;
//!     Ok(group.id)
//! })
//! .await?;
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::datasource::Datasource;
use crate::driver::{Connection, ConnectionPool, ExecResult, Row, RowStream};
use crate::error::{OrmError, OrmResult};
use crate::interceptor::Interceptor;
use crate::log::traced;
use crate::scope::RequestScope;
use crate::value::Value;

/// Transaction requirement of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStyle {
    /// No physical transaction; every statement autocommits.
    None,
    /// Read-only transaction.
    ReadOnly,
    /// Read-write transaction.
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcStatus {
    Init,
    Committed,
    RolledBack,
    /// Commit or rollback reported an error.
    Failed,
    /// Connection released; no further operations.
    Invalid,
}

pub struct TransContext<C: Connection> {
    conn: Option<C>,
    style: RequestStyle,
    status: TcStatus,
    scope: RequestScope,
    log_sql: bool,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<C: Connection> std::fmt::Debug for TransContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransContext")
            .field("style", &self.style)
            .field("status", &self.status)
            .field("scope", &self.scope)
            .field("log_sql", &self.log_sql)
            .finish()
    }
}

impl<C: Connection> TransContext<C> {
    /// Create a context for a single datasource and unsharded tables.
    pub async fn new<P>(
        ds: &Datasource<P>,
        style: RequestStyle,
        trace_id: impl Into<String>,
    ) -> OrmResult<Self>
    where
        P: ConnectionPool<Connection = C>,
    {
        Self::with_scope(ds, style, RequestScope::new(trace_id)).await
    }

    /// Create a context carrying table and datasource sharding keys.
    /// `Value::Null` (or `None`) leaves a key unset.
    pub async fn new_with_sharding<P>(
        ds: &Datasource<P>,
        style: RequestStyle,
        trace_id: impl Into<String>,
        table_sharding_key: impl Into<Value>,
        datasource_sharding_key: impl Into<Value>,
    ) -> OrmResult<Self>
    where
        P: ConnectionPool<Connection = C>,
    {
        let scope = RequestScope::new(trace_id)
            .with_table_sharding_key(table_sharding_key)
            .with_datasource_sharding_key(datasource_sharding_key);
        Self::with_scope(ds, style, scope).await
    }

    /// Create a context from a fully built request scope.
    pub async fn with_scope<P>(
        ds: &Datasource<P>,
        style: RequestStyle,
        scope: RequestScope,
    ) -> OrmResult<Self>
    where
        P: ConnectionPool<Connection = C>,
    {
        let pool = ds.pool_for(&scope)?;
        let timeout = ds.get_acquire_timeout();

        let mut conn = match tokio::time::timeout(timeout, pool.acquire()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::error!(trace_id = scope.trace_id(), error = %e, "acquire connection failed");
                return Err(e);
            }
            Err(_) => {
                tracing::info!(trace_id = scope.trace_id(), "get connection timeout");
                return Err(OrmError::ConnectionTimeout);
            }
        };

        if style != RequestStyle::None {
            let read_only = style == RequestStyle::ReadOnly;
            let begun = tokio::time::timeout(timeout, conn.begin(read_only)).await;
            match begun {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(trace_id = scope.trace_id(), error = %e, "begin transaction failed");
                    conn.close().await;
                    return Err(e);
                }
                Err(_) => {
                    tracing::info!(trace_id = scope.trace_id(), "begin transaction timeout");
                    conn.discard();
                    return Err(OrmError::ConnectionTimeout);
                }
            }
        }

        let mut tc = Self {
            conn: Some(conn),
            style,
            status: TcStatus::Init,
            scope,
            log_sql: ds.is_log_sql(),
            interceptors: ds.interceptors().to_vec(),
        };

        let hooked = tc
            .interceptors
            .iter()
            .try_for_each(|h| h.after_trans_begin(&tc.scope));
        if let Err(e) = hooked {
            let _ = tc.complete(Some(&e)).await;
            return Err(e);
        }
        Ok(tc)
    }

    pub fn style(&self) -> RequestStyle {
        self.style
    }

    pub fn status(&self) -> TcStatus {
        self.status
    }

    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    pub fn trace_id(&self) -> &str {
        self.scope.trace_id()
    }

    pub fn is_log_sql(&self) -> bool {
        self.log_sql
    }

    pub(crate) fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// Fails with [`OrmError::InvalidState`] unless the context is still usable.
    pub fn check(&self) -> OrmResult<()> {
        if self.status != TcStatus::Init || self.conn.is_none() {
            return Err(OrmError::InvalidState);
        }
        Ok(())
    }

    fn conn(&self) -> OrmResult<&C> {
        self.check()?;
        self.conn.as_ref().ok_or(OrmError::InvalidState)
    }

    /// Finish the context: commit when `err` is `None`, roll back otherwise,
    /// then release the connection. A failed commit falls back to rollback and
    /// the commit error is returned; a failed rollback returns its error.
    /// Completing an already completed context does nothing.
    pub async fn complete(&mut self, err: Option<&OrmError>) -> OrmResult<()> {
        if self.status == TcStatus::Invalid {
            return Ok(());
        }
        let trace_id = self.scope.trace_id();
        if let Some(e) = err {
            tracing::error!(trace_id, error = %e, "transaction completed with error");
        }
        let Some(conn) = self.conn.as_mut() else {
            self.status = TcStatus::Invalid;
            return Ok(());
        };

        let mut outcome = Ok(());
        if self.style != RequestStyle::None {
            self.status = match err {
                None => match conn.commit().await {
                    Ok(()) => TcStatus::Committed,
                    Err(e) => {
                        tracing::error!(trace_id, error = %e, "commit failed, rolling back");
                        if let Err(e) = conn.rollback().await {
                            tracing::error!(trace_id, error = %e, "rollback failed");
                        }
                        outcome = Err(e);
                        TcStatus::Failed
                    }
                },
                Some(_) => match conn.rollback().await {
                    Ok(()) => TcStatus::RolledBack,
                    Err(e) => {
                        tracing::error!(trace_id, error = %e, "rollback failed");
                        outcome = Err(e);
                        TcStatus::Failed
                    }
                },
            };
        }

        if let Some(conn) = self.conn.take() {
            conn.close().await;
        }
        self.status = TcStatus::Invalid;
        outcome
    }

    /// Like [`complete`](Self::complete), but when `panic` carries a payload the
    /// transaction is rolled back and the unwind resumes with that payload.
    pub async fn complete_with_panic(
        &mut self,
        err: Option<&OrmError>,
        panic: Option<Box<dyn Any + Send>>,
    ) -> OrmResult<()> {
        if let Some(payload) = panic {
            let _ = self.complete(Some(&OrmError::Panicked)).await;
            std::panic::resume_unwind(payload);
        }
        self.complete(err).await
    }

    pub(crate) async fn query_stream(&self, sql: &str, args: &[Value]) -> OrmResult<RowStream> {
        let conn = self.conn()?;
        traced(self.log_sql, self.trace_id(), sql, args, conn.query_stream(sql, args)).await
    }

    pub(crate) async fn query_rows(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let conn = self.conn()?;
        traced(self.log_sql, self.trace_id(), sql, args, conn.query(sql, args)).await
    }

    pub(crate) async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let conn = self.conn()?;
        traced(self.log_sql, self.trace_id(), sql, args, conn.execute(sql, args)).await
    }

    pub(crate) async fn insert_row(
        &self,
        sql: &str,
        args: &[Value],
        auto_column: Option<&str>,
    ) -> OrmResult<ExecResult> {
        let conn = self.conn()?;
        traced(
            self.log_sql,
            self.trace_id(),
            sql,
            args,
            conn.insert(sql, args, auto_column),
        )
        .await
    }
}

impl<C: Connection> Drop for TransContext<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!(
                trace_id = self.scope.trace_id(),
                style = ?self.style,
                "transaction context dropped without completion, discarding connection"
            );
            conn.discard();
            self.status = TcStatus::Invalid;
        }
    }
}

/// Run `work` inside `tc` and complete it: commit on `Ok`, roll back on `Err`,
/// roll back and resume the unwind on panic. A failed commit turns an `Ok`
/// result into the commit error.
pub async fn wrap_trans<C, R, F>(mut tc: TransContext<C>, work: F) -> OrmResult<R>
where
    C: Connection,
    F: AsyncFnOnce(&mut TransContext<C>) -> OrmResult<R>,
{
    let (result, panic) = match AssertUnwindSafe(work(&mut tc)).catch_unwind().await {
        Ok(result) => (result, None),
        Err(payload) => (Err(OrmError::Panicked), Some(payload)),
    };
    let completed = tc.complete_with_panic(result.as_ref().err(), panic).await;
    let value = result?;
    completed?;
    Ok(value)
}

/// Create a context on `ds` and run `work` in it through [`wrap_trans`].
pub async fn auto_trans<P, R, F>(
    ds: &Datasource<P>,
    style: RequestStyle,
    trace_id: impl Into<String>,
    work: F,
) -> OrmResult<R>
where
    P: ConnectionPool,
    F: AsyncFnOnce(&mut TransContext<P::Connection>) -> OrmResult<R>,
{
    let tc = TransContext::new(ds, style, trace_id).await?;
    wrap_trans(tc, work).await
}

/// [`auto_trans`] with a caller built request scope (sharding keys, custom values).
pub async fn auto_trans_with_scope<P, R, F>(
    ds: &Datasource<P>,
    style: RequestStyle,
    scope: RequestScope,
    work: F,
) -> OrmResult<R>
where
    P: ConnectionPool,
    F: AsyncFnOnce(&mut TransContext<P::Connection>) -> OrmResult<R>,
{
    let tc = TransContext::with_scope(ds, style, scope).await?;
    wrap_trans(tc, work).await
}
