//! Statement assembly.
//!
//! Pure functions combining a [`TableMeta`], the request scope and the optional
//! matcher / view / pager / orders into one parameterized statement. Nothing
//! here touches a connection.

use crate::condition::{Matcher, SqlCond};
use crate::error::{OrmError, OrmResult};
use crate::meta::{Entity, TableMeta};
use crate::modifier::Modifier;
use crate::pager::{Order, Pager, View};
use crate::scope::RequestScope;
use crate::sql::{Sql, is_valid_ident};

/// Row lock appended to a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    ForUpdate,
    ForUpdateSkipLocked,
}

impl RowLock {
    pub fn new(skip_locked: bool) -> Self {
        if skip_locked {
            RowLock::ForUpdateSkipLocked
        } else {
            RowLock::ForUpdate
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RowLock::ForUpdate => " for update",
            RowLock::ForUpdateSkipLocked => " for update skip locked",
        }
    }
}

/// A select statement and the columns it projects, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub sql: Sql,
    pub columns: Vec<String>,
}

/// Physical table name, resolved through the table sharding function.
pub fn table_name<T>(meta: &TableMeta<T>, scope: &RequestScope) -> String {
    meta.physical_table(scope.table_sharding_key())
}

fn compile_where(matcher: Option<&Matcher>) -> OrmResult<Sql> {
    let Some(m) = matcher else {
        return Ok(Sql::empty());
    };
    let (text, args) = m.to_sql(Vec::new())?;
    if text.is_empty() {
        return Ok(Sql::empty());
    }
    Ok(Sql::from_parts(format!(" where {text}"), args))
}

/// Caller supplied column names are spliced into the text, so they must be
/// plain identifiers.
fn check_column(clause: &str, column: &str) -> OrmResult<()> {
    if !is_valid_ident(column) {
        return Err(OrmError::validation(format!(
            "{clause}: invalid column '{column}'"
        )));
    }
    Ok(())
}

/// ` order by c1[ desc],c2` followed by ` limit N` or ` limit OFF,N`.
pub fn query_suffix(pager: Option<&Pager>, orders: &[Order]) -> OrmResult<String> {
    let mut out = String::new();
    for (i, order) in orders.iter().enumerate() {
        check_column("order by", &order.column)?;
        out.push_str(if i == 0 { " order by " } else { "," });
        out.push_str(&order.column);
        if order.desc {
            out.push_str(" desc");
        }
    }
    if let Some(p) = pager {
        let offset = p.offset()?;
        if p.page_number == 1 {
            out.push_str(&format!(" limit {}", p.page_size));
        } else {
            out.push_str(&format!(" limit {offset},{}", p.page_size));
        }
    }
    Ok(out)
}

/// `select <cols> from <table>[ where ..][ order by ..][ limit ..][ for update[ skip locked]]`
pub fn select_query<T>(
    meta: &TableMeta<T>,
    scope: &RequestScope,
    matcher: Option<&Matcher>,
    view: Option<&View>,
    pager: Option<&Pager>,
    orders: &[Order],
    lock: Option<RowLock>,
) -> OrmResult<SelectStatement> {
    let columns = View::resolve(view, meta.columns);
    for c in &columns {
        check_column("select", c)?;
    }
    let mut q = Sql::new(format!(
        "select {} from {}",
        columns.join(","),
        table_name(meta, scope)
    ));
    q.push_sql(compile_where(matcher)?);
    q.push(&query_suffix(pager, orders)?);
    if let Some(lock) = lock {
        q.push(lock.as_str());
    }
    Ok(SelectStatement { sql: q, columns })
}

/// `select count(<auto>|*) from <table>[ where ..]`
pub fn count_query<T>(
    meta: &TableMeta<T>,
    scope: &RequestScope,
    matcher: Option<&Matcher>,
) -> OrmResult<Sql> {
    let mut q = Sql::new(format!(
        "select count({}) from {}",
        meta.auto_column.unwrap_or("*"),
        table_name(meta, scope)
    ));
    q.push_sql(compile_where(matcher)?);
    Ok(q)
}

/// `insert into <table>(<cols>) values(?,..)` over the non-auto columns.
pub fn insert_statement<T: Entity>(
    meta: &TableMeta<T>,
    scope: &RequestScope,
    ins: &T,
) -> OrmResult<Sql> {
    let columns: Vec<&str> = meta.writable_columns().collect();
    let mut q = Sql::new(format!(
        "insert into {}({}) values(",
        table_name(meta, scope),
        columns.join(",")
    ));
    q.push_bind_list(meta.extract_values(ins, true)?).push(")");
    Ok(q)
}

/// `update <table> set c1 = ?,c2 = ? where <id> = ?` for every non-auto column.
///
/// Fails when the entity exposes no field for the id column.
pub fn update_instance<T: Entity>(
    meta: &TableMeta<T>,
    scope: &RequestScope,
    ins: &T,
) -> OrmResult<Sql> {
    let id_column = meta.id_column();
    let id = ins.field(id_column).ok_or_else(|| {
        OrmError::validation(format!(
            "update of {} needs a field for id column '{id_column}'",
            meta.table
        ))
    })?;

    let assignments: Vec<String> = meta.writable_columns().map(|c| format!("{c} = ?")).collect();
    let mut q = Sql::from_parts(
        format!(
            "update {} set {}",
            table_name(meta, scope),
            assignments.join(",")
        ),
        meta.extract_values(ins, true)?,
    );
    let matcher = Matcher::new().eq(id_column, id);
    q.push_sql(compile_where(Some(&matcher))?);
    Ok(q)
}

/// `update <table> set <modifier>[ where ..]`.
///
/// Returns `None` when the modifier is empty. An update with no resolvable
/// condition is refused.
pub fn modifier_update<T>(
    meta: &TableMeta<T>,
    scope: &RequestScope,
    modifier: &Modifier,
    matcher: Option<&Matcher>,
) -> OrmResult<Option<Sql>> {
    if modifier.is_empty() {
        return Ok(None);
    }
    let cond = compile_where(matcher)?;
    if cond.is_empty() {
        tracing::info!(trace_id = scope.trace_id(), table = meta.table, "update must have condition");
        return Err(OrmError::MissingCondition("update"));
    }
    let mut q = Sql::new(format!("update {} ", table_name(meta, scope)));
    q.push_sql(modifier.to_sql());
    q.push_sql(cond);
    Ok(Some(q))
}

/// `delete from <table> where ..`; refused when the condition compiles to nothing.
pub fn delete_statement<T>(
    meta: &TableMeta<T>,
    scope: &RequestScope,
    matcher: Option<&Matcher>,
) -> OrmResult<Sql> {
    let cond = compile_where(matcher)?;
    if cond.is_empty() {
        tracing::info!(trace_id = scope.trace_id(), table = meta.table, "delete must have condition");
        return Err(OrmError::MissingCondition("delete"));
    }
    let mut q = Sql::new(format!("delete from {}", table_name(meta, scope)));
    q.push_sql(cond);
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[derive(Debug, Default)]
    struct Purchase {
        id: i64,
        uid: i64,
        amount: i64,
    }

    impl Entity for Purchase {
        fn field(&self, column: &str) -> Option<Value> {
            match column {
                "id" => Some(self.id.into()),
                "uid" => Some(self.uid.into()),
                "amount" => Some(self.amount.into()),
                _ => None,
            }
        }

        fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()> {
            match column {
                "id" => self.id = value.into_field(column)?,
                "uid" => self.uid = value.into_field(column)?,
                "amount" => self.amount = value.into_field(column)?,
                _ => {}
            }
            Ok(())
        }
    }

    static ORDERS: TableMeta<Purchase> =
        TableMeta::new("orders", &["id", "uid", "amount"], Some("id"));

    fn by_uid(table: &str, key: Option<&Value>) -> String {
        match key.and_then(Value::as_i64) {
            Some(k) => format!("{table}_{:02}", k % 8),
            None => table.to_string(),
        }
    }

    fn scope() -> RequestScope {
        RequestScope::new("trace")
    }

    #[test]
    fn pager_suffix() {
        assert_eq!(query_suffix(Some(&Pager::new(10, 1)), &[]).unwrap(), " limit 10");
        assert_eq!(query_suffix(Some(&Pager::new(10, 3)), &[]).unwrap(), " limit 20,10");
        assert!(query_suffix(Some(&Pager::new(i64::MAX / 2, 4)), &[]).is_err());
        assert!(query_suffix(Some(&Pager::new(10, 0)), &[]).is_err());
    }

    #[test]
    fn spliced_columns_must_be_identifiers() {
        let err = query_suffix(None, &[Order::asc("id; drop table t")]).unwrap_err();
        assert!(err.to_string().contains("invalid column 'id; drop table t'"));

        let view = View::include(&["name", "(select 1)"]);
        assert!(select_query(&ORDERS, &scope(), None, Some(&view), None, &[], None).is_err());
    }

    #[test]
    fn order_suffix() {
        let orders = vec![Order::desc("amount"), Order::asc("id")];
        assert_eq!(
            query_suffix(None, &orders).unwrap(),
            " order by amount desc,id"
        );
    }

    #[test]
    fn select_with_everything() {
        let m = Matcher::new().eq("uid", 5).gt("amount", 0);
        let stmt = select_query(
            &ORDERS,
            &scope(),
            Some(&m),
            Some(&View::exclude(&["uid"])),
            Some(&Pager::new(20, 2)),
            &[Order::desc("id")],
            None,
        )
        .unwrap();
        assert_eq!(
            stmt.sql.as_str(),
            "select id,amount from orders where uid = ? and amount > ? order by id desc limit 20,20"
        );
        assert_eq!(stmt.sql.args(), &[Value::Int(5), Value::Int(0)]);
        assert_eq!(stmt.columns, vec!["id", "amount"]);
    }

    #[test]
    fn select_without_condition_keeps_suffix() {
        let stmt = select_query(
            &ORDERS,
            &scope(),
            Some(&Matcher::new()),
            None,
            Some(&Pager::limit(5)),
            &[],
            Some(RowLock::new(true)),
        )
        .unwrap();
        assert_eq!(
            stmt.sql.as_str(),
            "select id,uid,amount from orders limit 5 for update skip locked"
        );
        assert!(stmt.sql.args().is_empty());
    }

    #[test]
    fn sharded_table_name_uses_scope_key() {
        let meta = ORDERS.with_sharding(by_uid);
        let scope = RequestScope::new("t").with_table_sharding_key(11);
        let q = count_query(&meta, &scope, None).unwrap();
        assert_eq!(q.as_str(), "select count(id) from orders_03");
    }

    #[test]
    fn count_without_auto_column() {
        let meta: TableMeta<Purchase> = TableMeta::new("orders", &["id", "uid", "amount"], None);
        let m = Matcher::new().eq("uid", 1);
        let q = count_query(&meta, &scope(), Some(&m)).unwrap();
        assert_eq!(q.as_str(), "select count(*) from orders where uid = ?");
    }

    #[test]
    fn insert_skips_auto_column() {
        let o = Purchase {
            id: 0,
            uid: 7,
            amount: 100,
        };
        let q = insert_statement(&ORDERS, &scope(), &o).unwrap();
        assert_eq!(q.as_str(), "insert into orders(uid,amount) values(?,?)");
        assert_eq!(q.args(), &[Value::Int(7), Value::Int(100)]);
    }

    #[test]
    fn update_instance_matches_on_id() {
        let o = Purchase {
            id: 42,
            uid: 7,
            amount: 100,
        };
        let q = update_instance(&ORDERS, &scope(), &o).unwrap();
        assert_eq!(q.as_str(), "update orders set uid = ?,amount = ? where id = ?");
        assert_eq!(q.args(), &[Value::Int(7), Value::Int(100), Value::Int(42)]);
        assert_eq!(q.placeholder_count(), q.args().len());
    }

    #[test]
    fn modifier_update_shapes() {
        let modifier = Modifier::new().add("uid", 3).self_add("amount", 10);
        let m = Matcher::new().in_list("id", vec![1, 2]);
        let q = modifier_update(&ORDERS, &scope(), &modifier, Some(&m))
            .unwrap()
            .unwrap();
        assert_eq!(
            q.as_str(),
            "update orders set uid=?,amount=amount+? where id in (?,?)"
        );
        assert_eq!(q.args().len(), 4);

        assert!(
            modifier_update(&ORDERS, &scope(), &Modifier::new(), Some(&m))
                .unwrap()
                .is_none()
        );
        let err = modifier_update(&ORDERS, &scope(), &modifier, None).unwrap_err();
        assert!(err.is_missing_condition());
    }

    #[test]
    fn delete_refuses_empty_condition() {
        let err = delete_statement(&ORDERS, &scope(), Some(&Matcher::new())).unwrap_err();
        assert!(err.is_missing_condition());
        assert!(delete_statement(&ORDERS, &scope(), None).is_err());

        let m = Matcher::new().eq("id", 1);
        let q = delete_statement(&ORDERS, &scope(), Some(&m)).unwrap();
        assert_eq!(q.as_str(), "delete from orders where id = ?");
    }
}
