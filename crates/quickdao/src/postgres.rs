//! PostgreSQL binding over `deadpool-postgres`.
//!
//! SQL produced by the core uses `?` placeholders and `limit OFF,N` paging.
//! [`rewrite_sql`] turns both into PostgreSQL syntax before a statement is
//! prepared, and inserts that report a generated id get ` returning <auto>`.

use std::cell::Cell;
use std::fmt::Write as _;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures_core::Stream;
use futures_util::TryStreamExt;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;

use crate::datasource::{Datasource, DatasourceShardingPolicy, DbConf};
use crate::driver::{Connection, ConnectionPool, ExecResult, Row, RowStream};
use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// Rewrite `?` placeholders to `$1, $2, ..` and `limit OFF,N` to
/// `limit N offset OFF`. Quoted literals and identifiers are left untouched.
pub fn rewrite_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut n = 0usize;
    let mut rest = sql;

    while let Some(c) = rest.chars().next() {
        let step = c.len_utf8();
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            out.push(c);
            rest = &rest[step..];
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '?' => {
                n += 1;
                let _ = write!(out, "${n}");
            }
            'l' | 'L' if at_word_start(&out) => {
                if let Some((offset, size, consumed)) = split_limit(rest) {
                    let _ = write!(out, "limit {size} offset {offset}");
                    rest = &rest[consumed..];
                    continue;
                }
                out.push(c);
            }
            _ => out.push(c),
        }
        rest = &rest[step..];
    }
    out
}

fn at_word_start(out: &str) -> bool {
    out.chars()
        .next_back()
        .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
}

/// Match `limit <digits>\s*,\s*<digits>` at the start of `s`.
fn split_limit(s: &str) -> Option<(&str, &str, usize)> {
    if !s.get(..5)?.eq_ignore_ascii_case("limit") {
        return None;
    }
    let bytes = s.as_bytes();
    let skip_ws = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        i
    };
    let digits = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let start = skip_ws(5);
    if start == 5 {
        return None;
    }
    let end = digits(start);
    if end == start {
        return None;
    }
    let offset = &s[start..end];

    let comma = skip_ws(end);
    if bytes.get(comma) != Some(&b',') {
        return None;
    }
    let start = skip_ws(comma + 1);
    let end = digits(start);
    if end == start {
        return None;
    }
    if bytes
        .get(end)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        return None;
    }
    Some((offset, &s[start..end], end))
}

fn params(args: &[Value]) -> impl ExactSizeIterator<Item = &(dyn ToSql + Sync)> {
    args.iter().map(|a| a as &(dyn ToSql + Sync))
}

/// Maps `tokio_postgres` rows to [`Row`]s, resolving column names once.
struct PgRowStream<S> {
    inner: Pin<Box<S>>,
    columns: Option<Arc<[String]>>,
}

impl<S> PgRowStream<S> {
    fn new(stream: S) -> Self {
        Self {
            inner: Box::pin(stream),
            columns: None,
        }
    }
}

fn convert_row(row: &tokio_postgres::Row, columns: &Arc<[String]>) -> OrmResult<Row> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, name) in columns.iter().enumerate() {
        let value: Value = row
            .try_get(idx)
            .map_err(|e| OrmError::decode(name.as_str(), e.to_string()))?;
        values.push(value);
    }
    Ok(Row::new(columns.clone(), values))
}

impl<S> Stream for PgRowStream<S>
where
    S: Stream<Item = Result<tokio_postgres::Row, tokio_postgres::Error>> + Send + 'static,
{
    type Item = OrmResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => {
                let columns = self
                    .columns
                    .get_or_insert_with(|| {
                        row.columns()
                            .iter()
                            .map(|c| c.name().to_string())
                            .collect()
                    })
                    .clone();
                Poll::Ready(Some(convert_row(&row, &columns)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e.into()))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A pooled PostgreSQL connection.
pub struct PgConnection {
    client: Object,
}

impl PgConnection {
    async fn query_raw(&self, sql: &str, args: &[Value]) -> OrmResult<RowStream> {
        let stmt = self.client.prepare_cached(&rewrite_sql(sql)).await?;
        let stream = self.client.query_raw(&stmt, params(args)).await?;
        Ok(RowStream::new(PgRowStream::new(stream)))
    }
}

impl Connection for PgConnection {
    async fn begin(&mut self, read_only: bool) -> OrmResult<()> {
        let sql = if read_only { "BEGIN READ ONLY" } else { "BEGIN" };
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn commit(&mut self) -> OrmResult<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> OrmResult<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn query_stream(&self, sql: &str, args: &[Value]) -> OrmResult<RowStream> {
        self.query_raw(sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let stmt = self.client.prepare_cached(&rewrite_sql(sql)).await?;
        Ok(self.client.execute_raw(&stmt, params(args)).await?)
    }

    async fn insert(
        &self,
        sql: &str,
        args: &[Value],
        auto_column: Option<&str>,
    ) -> OrmResult<ExecResult> {
        let Some(auto) = auto_column else {
            let affected = self.execute(sql, args).await?;
            return Ok(ExecResult {
                affected,
                last_insert_id: None,
            });
        };
        let returning = format!("{sql} returning {auto}");
        let rows: Vec<Row> = self.query_raw(&returning, args).await?.try_collect().await?;
        let last_insert_id = match rows.first() {
            Some(row) => Some(row.try_get(0)?),
            None => None,
        };
        Ok(ExecResult {
            affected: rows.len() as u64,
            last_insert_id,
        })
    }

    async fn close(self) {
        drop(self.client);
    }

    fn discard(self) {
        drop(Object::take(self.client));
    }
}

/// A `deadpool-postgres` pool honoring the idle and lifetime limits of a [`DbConf`].
pub struct PgPool {
    pool: Pool,
    max_lifetime: Option<std::time::Duration>,
    max_idle_time: Option<std::time::Duration>,
    max_idle: Option<usize>,
}

impl PgPool {
    pub fn from_conf(conf: &DbConf) -> OrmResult<Self> {
        let pg_config: tokio_postgres::Config = conf
            .url
            .parse()
            .map_err(|e: tokio_postgres::Error| OrmError::Connection(e.to_string()))?;
        let mgr = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(mgr)
            .max_size(conf.size.max(1))
            .build()
            .map_err(|e| OrmError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            max_lifetime: conf.max_lifetime(),
            max_idle_time: conf.max_idle_time(),
            max_idle: conf.max_idle(),
        })
    }

    pub fn inner(&self) -> &Pool {
        &self.pool
    }

    /// Drop idle connections past their lifetime or idle time, and any idle
    /// connections beyond the configured idle count.
    fn evict(&self) {
        if self.max_lifetime.is_none() && self.max_idle_time.is_none() && self.max_idle.is_none() {
            return;
        }
        let kept = Cell::new(0usize);
        self.pool.retain(|_, metrics| {
            if self.max_lifetime.is_some_and(|max| metrics.age() > max) {
                return false;
            }
            if self.max_idle_time.is_some_and(|max| metrics.last_used() > max) {
                return false;
            }
            if self.max_idle.is_some_and(|max| kept.get() >= max) {
                return false;
            }
            kept.set(kept.get() + 1);
            true
        });
    }
}

impl ConnectionPool for PgPool {
    type Connection = PgConnection;

    async fn acquire(&self) -> OrmResult<PgConnection> {
        self.evict();
        let client = self.pool.get().await?;
        Ok(PgConnection { client })
    }

    fn close(&self) {
        self.pool.close();
    }
}

/// A single-pool datasource configured from `conf`.
pub fn new_datasource(conf: &DbConf) -> OrmResult<Datasource<PgPool>> {
    let pool = PgPool::from_conf(conf)?;
    Ok(Datasource::new(pool)
        .log_sql(conf.log_sql)
        .acquire_timeout(conf.acquire_timeout()))
}

/// A sharding datasource with one pool per entry of `confs`, in order.
///
/// SQL logging is on when any entry enables it; the acquire timeout is taken
/// from the first entry.
pub fn new_sharding_datasource(
    confs: &[DbConf],
    policy: impl DatasourceShardingPolicy + 'static,
) -> OrmResult<Datasource<PgPool>> {
    let mut pools = Vec::with_capacity(confs.len());
    for conf in confs {
        match PgPool::from_conf(conf) {
            Ok(pool) => pools.push(pool),
            Err(e) => {
                for pool in &pools {
                    pool.close();
                }
                return Err(e);
            }
        }
    }
    let log_sql = confs.iter().any(|c| c.log_sql);
    let timeout = confs
        .first()
        .map(DbConf::acquire_timeout)
        .unwrap_or(crate::datasource::DEFAULT_ACQUIRE_TIMEOUT);
    Ok(Datasource::sharding(pools, policy)?
        .log_sql(log_sql)
        .acquire_timeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::ModInt64ShardingPolicy;

    #[test]
    fn rewrites_placeholders_in_order() {
        assert_eq!(
            rewrite_sql("select id from t where a = ? and b in (?,?)"),
            "select id from t where a = $1 and b in ($2,$3)"
        );
    }

    #[test]
    fn leaves_quoted_question_marks() {
        assert_eq!(
            rewrite_sql("select '?' as q, \"we?rd\" from t where a = ?"),
            "select '?' as q, \"we?rd\" from t where a = $1"
        );
        assert_eq!(
            rewrite_sql("select 'it''s ?' from t where a = ?"),
            "select 'it''s ?' from t where a = $1"
        );
    }

    #[test]
    fn rewrites_offset_limit() {
        assert_eq!(
            rewrite_sql("select id from t order by id desc limit 20,10"),
            "select id from t order by id desc limit 10 offset 20"
        );
        assert_eq!(
            rewrite_sql("select id from t LIMIT 5 , 7 for update"),
            "select id from t limit 7 offset 5 for update"
        );
    }

    #[test]
    fn keeps_plain_limit_and_lookalikes() {
        assert_eq!(rewrite_sql("select id from t limit 10"), "select id from t limit 10");
        assert_eq!(
            rewrite_sql("select rate_limit from t where a = ?"),
            "select rate_limit from t where a = $1"
        );
        assert_eq!(
            rewrite_sql("select id from t where note = 'limit 1,2'"),
            "select id from t where note = 'limit 1,2'"
        );
    }

    #[test]
    fn rejects_unparseable_url() {
        assert!(matches!(
            PgPool::from_conf(&DbConf::new("postgres://app@localhost:notaport/app")),
            Err(OrmError::Connection(_))
        ));
    }

    #[test]
    fn sharding_datasource_needs_pools() {
        assert!(matches!(
            new_sharding_datasource(&[], ModInt64ShardingPolicy),
            Err(OrmError::NoDatasource)
        ));
    }

    #[test]
    fn datasource_takes_conf_knobs() {
        let mut conf = DbConf::new("postgres://app@localhost/app");
        conf.log_sql = true;
        conf.acquire_timeout_ms = 250;
        let ds = new_datasource(&conf).unwrap();
        assert!(ds.is_log_sql());
        assert_eq!(ds.get_acquire_timeout(), std::time::Duration::from_millis(250));
        assert_eq!(ds.pool_count(), 1);
    }
}
