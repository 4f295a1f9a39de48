use crate::condition::Matcher;
use crate::driver::Connection;
use crate::error::{OrmError, OrmResult};
use crate::meta::{Entity, TableMeta};
use crate::modifier::Modifier;
use crate::statement;
use crate::transaction::{RequestStyle, TransContext};
use crate::value::Value;

/// Write every non-auto column of `ins` to the row matching its id.
///
/// Returns the affected row count, 0 or 1.
pub async fn update<C, T>(tc: &TransContext<C>, meta: &TableMeta<T>, ins: &mut T) -> OrmResult<u64>
where
    C: Connection,
    T: Entity,
{
    tc.check()?;
    for hook in tc.interceptors() {
        hook.before_update(tc.scope(), meta.table, &mut *ins)?;
    }
    let sql = statement::update_instance(meta, tc.scope(), ins)?;
    tc.execute(sql.as_str(), sql.args()).await
}

/// [`update`] each instance in turn, summing affected rows.
///
/// Under [`RequestStyle::None`] rows written before a failure stay written, so
/// the error is an [`OrmError::PartialUpdate`] carrying that count. Inside a
/// transaction nothing survives the rollback and the underlying error is
/// returned as-is.
pub async fn update_list<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    list: &mut [T],
) -> OrmResult<u64>
where
    C: Connection,
    T: Entity,
{
    let mut affected = 0;
    for ins in list.iter_mut() {
        match update(tc, meta, ins).await {
            Ok(n) => affected += n,
            Err(e) if tc.style() == RequestStyle::None => {
                return Err(OrmError::PartialUpdate {
                    affected,
                    source: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(affected)
}

/// Apply `modifier` to the row with the given id.
pub async fn update_by_id<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    modifier: &Modifier,
    id: i64,
) -> OrmResult<u64>
where
    C: Connection,
{
    let m = Matcher::new().eq(meta.id_column(), id);
    update_by_modifier(tc, meta, modifier, &m).await
}

/// Apply `modifier` to the rows whose id is in `ids`; empty `ids` updates nothing.
pub async fn update_by_ids<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    modifier: &Modifier,
    ids: &[i64],
) -> OrmResult<u64>
where
    C: Connection,
{
    tc.check()?;
    if ids.is_empty() {
        return Ok(0);
    }
    let m = Matcher::new().in_list(meta.id_column(), ids.iter().copied());
    update_by_modifier(tc, meta, modifier, &m).await
}

/// `update <table> set <modifier> where <matcher>`.
///
/// An empty modifier (after `before_modify` interceptors) updates nothing and
/// returns 0. A matcher compiling to no condition is refused.
pub async fn update_by_modifier<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    modifier: &Modifier,
    matcher: &Matcher,
) -> OrmResult<u64>
where
    C: Connection,
{
    tc.check()?;
    let mut modifier = modifier.clone();
    for hook in tc.interceptors() {
        hook.before_modify(tc.scope(), meta.table, &mut modifier, meta.columns)?;
    }
    match statement::modifier_update(meta, tc.scope(), &modifier, Some(matcher))? {
        Some(sql) => tc.execute(sql.as_str(), sql.args()).await,
        None => Ok(0),
    }
}

/// Execute a raw statement written with `?` placeholders.
pub async fn exec_raw_sql<C>(tc: &TransContext<C>, sql: &str, args: &[Value]) -> OrmResult<u64>
where
    C: Connection,
{
    tc.execute(sql, args).await
}
