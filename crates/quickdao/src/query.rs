//! Read operations.
//!
//! Every function runs on the connection of the given [`TransContext`] and
//! fails with [`OrmError::InvalidState`] once the context has completed.
//! Rows are bound into fresh `T::default()` instances unless a factory is given.

use futures_util::TryStreamExt;

use crate::condition::Matcher;
use crate::driver::{Connection, Row};
use crate::error::{OrmError, OrmResult};
use crate::meta::{Entity, TableMeta};
use crate::pager::{Order, Pager, View};
use crate::statement::{self, RowLock, SelectStatement};
use crate::transaction::TransContext;
use crate::value::Value;

fn materialize<T: Entity>(
    meta: &TableMeta<T>,
    columns: &[String],
    row: Row,
    factory: &mut impl FnMut() -> T,
) -> OrmResult<T> {
    let mut ins = factory();
    meta.bind_row(&mut ins, columns, row.into_values())?;
    Ok(ins)
}

async fn fetch_list<C, T, F>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    stmt: SelectStatement,
    mut factory: F,
) -> OrmResult<Vec<T>>
where
    C: Connection,
    T: Entity,
    F: FnMut() -> T,
{
    let rows = tc.query_rows(stmt.sql.as_str(), stmt.sql.args()).await?;
    rows.into_iter()
        .map(|row| materialize(meta, &stmt.columns, row, &mut factory))
        .collect()
}

async fn fetch_first<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    stmt: SelectStatement,
) -> OrmResult<Option<T>>
where
    C: Connection,
    T: Entity + Default,
{
    let mut stream = tc.query_stream(stmt.sql.as_str(), stmt.sql.args()).await?;
    match stream.try_next().await? {
        Some(row) => Ok(Some(materialize(meta, &stmt.columns, row, &mut T::default)?)),
        None => Ok(None),
    }
}

/// Every row of the table.
pub async fn get_all<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    view: Option<&View>,
) -> OrmResult<Vec<T>>
where
    C: Connection,
    T: Entity + Default,
{
    query_list(tc, meta, None, view, &[]).await
}

/// The row whose id column equals `id`.
pub async fn get_by_id<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    id: i64,
    view: Option<&View>,
) -> OrmResult<Option<T>>
where
    C: Connection,
    T: Entity + Default,
{
    let m = Matcher::new().eq(meta.id_column(), id);
    query_one(tc, meta, Some(&m), view).await
}

/// Rows whose id is in `ids`. An empty `ids` returns nothing without a query.
pub async fn get_by_ids<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    ids: &[i64],
    view: Option<&View>,
) -> OrmResult<Vec<T>>
where
    C: Connection,
    T: Entity + Default,
{
    tc.check()?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let m = Matcher::new().in_list(meta.id_column(), ids.iter().copied());
    query_list(tc, meta, Some(&m), view, &[]).await
}

pub async fn query_list<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: Option<&Matcher>,
    view: Option<&View>,
    orders: &[Order],
) -> OrmResult<Vec<T>>
where
    C: Connection,
    T: Entity + Default,
{
    query_page_list_with(tc, meta, matcher, view, None, orders, T::default).await
}

pub async fn query_page_list<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: Option<&Matcher>,
    view: Option<&View>,
    pager: &Pager,
    orders: &[Order],
) -> OrmResult<Vec<T>>
where
    C: Connection,
    T: Entity + Default,
{
    query_page_list_with(tc, meta, matcher, view, Some(pager), orders, T::default).await
}

/// General listing; each row is bound into an instance produced by `factory`.
pub async fn query_page_list_with<C, T, F>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: Option<&Matcher>,
    view: Option<&View>,
    pager: Option<&Pager>,
    orders: &[Order],
    factory: F,
) -> OrmResult<Vec<T>>
where
    C: Connection,
    T: Entity,
    F: FnMut() -> T,
{
    tc.check()?;
    let stmt = statement::select_query(meta, tc.scope(), matcher, view, pager, orders, None)?;
    fetch_list(tc, meta, stmt, factory).await
}

/// First matching row, if any.
pub async fn query_one<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: Option<&Matcher>,
    view: Option<&View>,
) -> OrmResult<Option<T>>
where
    C: Connection,
    T: Entity + Default,
{
    tc.check()?;
    let stmt = statement::select_query(meta, tc.scope(), matcher, view, None, &[], None)?;
    fetch_first(tc, meta, stmt).await
}

/// `select count(..)` over the matching rows.
pub async fn count<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: Option<&Matcher>,
) -> OrmResult<i64>
where
    C: Connection,
{
    tc.check()?;
    let sql = statement::count_query(meta, tc.scope(), matcher)?;
    let mut stream = tc.query_stream(sql.as_str(), sql.args()).await?;
    match stream.try_next().await? {
        Some(row) => row.try_get(0),
        None => Ok(0),
    }
}

/// Stream matching rows to `handler` in batches of at most `batch_size`.
///
/// `total_limit` caps the number of rows read; `None` or a non-positive
/// value reads every match. The handler's first error
/// stops the scan and is returned.
#[allow(clippy::too_many_arguments)]
pub async fn query_list_by_batch<C, T, H>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: Option<&Matcher>,
    view: Option<&View>,
    orders: &[Order],
    total_limit: Option<i64>,
    batch_size: usize,
    handler: H,
) -> OrmResult<()>
where
    C: Connection,
    T: Entity + Default,
    H: AsyncFnMut(Vec<T>) -> OrmResult<()>,
{
    tc.check()?;
    if batch_size == 0 {
        return Err(OrmError::InvalidBatchSize);
    }
    let pager = total_limit.filter(|n| *n > 0).map(Pager::limit);
    let stmt = statement::select_query(meta, tc.scope(), matcher, view, pager.as_ref(), orders, None)?;
    let columns = stmt.columns;
    let sql = stmt.sql;
    let mut factory = T::default;
    batch_rows(tc, sql.as_str(), sql.args(), batch_size, handler, |row| {
        materialize(meta, &columns, row, &mut factory)
    })
    .await
}

async fn batch_rows<C, T, H, M>(
    tc: &TransContext<C>,
    sql: &str,
    args: &[Value],
    batch_size: usize,
    mut handler: H,
    mut mapper: M,
) -> OrmResult<()>
where
    C: Connection,
    H: AsyncFnMut(Vec<T>) -> OrmResult<()>,
    M: FnMut(Row) -> OrmResult<T>,
{
    let mut stream = tc.query_stream(sql, args).await?;
    let mut batch = Vec::with_capacity(batch_size);
    while let Some(row) = stream.try_next().await? {
        batch.push(mapper(row)?);
        if batch.len() == batch_size {
            handler(std::mem::replace(&mut batch, Vec::with_capacity(batch_size))).await?;
        }
    }
    if !batch.is_empty() {
        handler(batch).await?;
    }
    Ok(())
}

/// Run a raw select written with `?` placeholders, mapping each row with `mapper`.
pub async fn query_raw_sql<C, T, M>(
    tc: &TransContext<C>,
    sql: &str,
    args: &[Value],
    mapper: M,
) -> OrmResult<Vec<T>>
where
    C: Connection,
    M: FnMut(Row) -> OrmResult<T>,
{
    let rows = tc.query_rows(sql, args).await?;
    rows.into_iter().map(mapper).collect()
}

/// [`query_raw_sql`] delivering the mapped rows to `handler` in batches.
pub async fn query_raw_sql_by_batch<C, T, M, H>(
    tc: &TransContext<C>,
    sql: &str,
    args: &[Value],
    batch_size: usize,
    mapper: M,
    handler: H,
) -> OrmResult<()>
where
    C: Connection,
    M: FnMut(Row) -> OrmResult<T>,
    H: AsyncFnMut(Vec<T>) -> OrmResult<()>,
{
    tc.check()?;
    if batch_size == 0 {
        return Err(OrmError::InvalidBatchSize);
    }
    batch_rows(tc, sql, args, batch_size, handler, mapper).await
}

/// Lock and return the row with the given id.
pub async fn get_by_id_for_update<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    id: i64,
    skip_locked: bool,
) -> OrmResult<Option<T>>
where
    C: Connection,
    T: Entity + Default,
{
    let m = Matcher::new().eq(meta.id_column(), id);
    query_one_for_update(tc, meta, Some(&m), None, skip_locked).await
}

/// Lock and return the rows with the given ids; empty `ids` returns nothing.
pub async fn get_by_ids_for_update<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    ids: &[i64],
    skip_locked: bool,
    orders: &[Order],
) -> OrmResult<Vec<T>>
where
    C: Connection,
    T: Entity + Default,
{
    tc.check()?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let m = Matcher::new().in_list(meta.id_column(), ids.iter().copied());
    query_list_for_update(tc, meta, Some(&m), None, None, orders, skip_locked).await
}

/// Lock and return the matching rows, optionally one page of them.
pub async fn query_list_for_update<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: Option<&Matcher>,
    view: Option<&View>,
    pager: Option<&Pager>,
    orders: &[Order],
    skip_locked: bool,
) -> OrmResult<Vec<T>>
where
    C: Connection,
    T: Entity + Default,
{
    tc.check()?;
    let stmt = statement::select_query(
        meta,
        tc.scope(),
        matcher,
        view,
        pager,
        orders,
        Some(RowLock::new(skip_locked)),
    )?;
    fetch_list(tc, meta, stmt, T::default).await
}

pub async fn query_one_for_update<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: Option<&Matcher>,
    view: Option<&View>,
    skip_locked: bool,
) -> OrmResult<Option<T>>
where
    C: Connection,
    T: Entity + Default,
{
    tc.check()?;
    let stmt = statement::select_query(
        meta,
        tc.scope(),
        matcher,
        view,
        None,
        &[],
        Some(RowLock::new(skip_locked)),
    )?;
    fetch_first(tc, meta, stmt).await
}
