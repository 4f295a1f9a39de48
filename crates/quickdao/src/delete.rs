use crate::condition::Matcher;
use crate::driver::Connection;
use crate::error::OrmResult;
use crate::meta::TableMeta;
use crate::statement;
use crate::transaction::TransContext;

pub async fn delete_by_id<C, T>(tc: &TransContext<C>, meta: &TableMeta<T>, id: i64) -> OrmResult<u64>
where
    C: Connection,
{
    let m = Matcher::new().eq(meta.id_column(), id);
    delete_by_matcher(tc, meta, &m).await
}

/// Delete the rows whose id is in `ids`; empty `ids` deletes nothing.
pub async fn delete_by_ids<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
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
    delete_by_matcher(tc, meta, &m).await
}

/// `delete from <table> where <matcher>`.
///
/// A matcher compiling to no condition is refused with
/// [`OrmError::MissingCondition`](crate::OrmError::MissingCondition) and
/// nothing is executed.
pub async fn delete_by_matcher<C, T>(
    tc: &TransContext<C>,
    meta: &TableMeta<T>,
    matcher: &Matcher,
) -> OrmResult<u64>
where
    C: Connection,
{
    tc.check()?;
    let sql = statement::delete_statement(meta, tc.scope(), Some(matcher))?;
    tc.execute(sql.as_str(), sql.args()).await
}
