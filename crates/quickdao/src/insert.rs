use crate::driver::Connection;
use crate::error::OrmResult;
use crate::meta::{Entity, TableMeta};
use crate::statement;
use crate::transaction::TransContext;
use crate::value::Value;

/// Insert `ins` into its (possibly sharded) table and return the affected row
/// count. The generated id is written back into the auto column's field.
///
/// `before_insert` interceptors run first and may alter `ins`.
pub async fn insert<C, T>(tc: &TransContext<C>, meta: &TableMeta<T>, ins: &mut T) -> OrmResult<u64>
where
    C: Connection,
    T: Entity,
{
    tc.check()?;
    for hook in tc.interceptors() {
        hook.before_insert(tc.scope(), meta.table, &mut *ins)?;
    }
    let sql = statement::insert_statement(meta, tc.scope(), ins)?;
    let result = tc.insert_row(sql.as_str(), sql.args(), meta.auto_column).await?;
    if let (Some(auto), Some(id)) = (meta.auto_column, result.last_insert_id) {
        ins.set_field(auto, Value::Int(id))?;
    }
    Ok(result.affected)
}
