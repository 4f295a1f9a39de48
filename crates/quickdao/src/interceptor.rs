//! Hooks run by transaction contexts and write operations.
//!
//! Interceptors are registered on a [`Datasource`](crate::Datasource) and
//! inherited by every context created from it. Each hook defaults to a no-op;
//! an `Err` aborts the operation it precedes.

use crate::error::OrmResult;
use crate::meta::Entity;
use crate::modifier::Modifier;
use crate::scope::RequestScope;

pub trait Interceptor: Send + Sync {
    /// After the context acquired its connection and began its transaction.
    /// A failure rolls the transaction back and releases the connection.
    fn after_trans_begin(&self, scope: &RequestScope) -> OrmResult<()> {
        let _ = scope;
        Ok(())
    }

    /// Before an entity is inserted into `table`.
    fn before_insert(&self, scope: &RequestScope, table: &str, ins: &mut dyn Entity) -> OrmResult<()> {
        let _ = (scope, table, ins);
        Ok(())
    }

    /// Before an entity is written back by an update-by-instance.
    fn before_update(&self, scope: &RequestScope, table: &str, ins: &mut dyn Entity) -> OrmResult<()> {
        let _ = (scope, table, ins);
        Ok(())
    }

    /// Before a modifier update runs. `columns` are the table's declared
    /// columns, so hooks only add assignments the table can take.
    fn before_modify(
        &self,
        scope: &RequestScope,
        table: &str,
        modifier: &mut Modifier,
        columns: &[&str],
    ) -> OrmResult<()> {
        let _ = (scope, table, modifier, columns);
        Ok(())
    }
}

/// Copies a request-scoped value into the named field before inserts and
/// updates, and into modifier updates of tables declaring the column.
///
/// Typical use is stamping an operator or tenant id from the scope.
#[derive(Debug, Clone)]
pub struct ScopeValueStamp {
    name: String,
}

impl ScopeValueStamp {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn stamp(&self, scope: &RequestScope, ins: &mut dyn Entity) -> OrmResult<()> {
        match scope.value(&self.name) {
            Some(v) if ins.field(&self.name).is_some() => ins.set_field(&self.name, v.clone()),
            _ => Ok(()),
        }
    }
}

impl Interceptor for ScopeValueStamp {
    fn before_insert(&self, scope: &RequestScope, _table: &str, ins: &mut dyn Entity) -> OrmResult<()> {
        self.stamp(scope, ins)
    }

    fn before_update(&self, scope: &RequestScope, _table: &str, ins: &mut dyn Entity) -> OrmResult<()> {
        self.stamp(scope, ins)
    }

    fn before_modify(
        &self,
        scope: &RequestScope,
        _table: &str,
        modifier: &mut Modifier,
        columns: &[&str],
    ) -> OrmResult<()> {
        let Some(v) = scope.value(&self.name) else {
            return Ok(());
        };
        if columns.contains(&self.name.as_str()) {
            *modifier = std::mem::take(modifier).add(&self.name, v.clone());
        }
        Ok(())
    }
}
