//! Per-table metadata and the field accessor contract.
//!
//! A table is described once, usually as a `static`, by a [`TableMeta`] and its
//! record type implements [`Entity`]:
//!
//! ```ignore
//! use quickdao::{Entity, OrmResult, TableMeta, Value};
//!
//! #[derive(Debug, Default)]
//! struct GroupInfo { id: i64, name: String }
//!
//! impl Entity for GroupInfo {
//!     fn field(&self, column: &str) -> Option<Value> {
//!         match column {
//!             "id" => Some(self.id.into()),
//!             "name" => Some(self.name.clone().into()),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()> {
//!         match column {
//!             "id" => self.id = value.into_field(column)?,
//!             "name" => self.name = value.into_field(column)?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! static GROUP_INFO: TableMeta<GroupInfo> =
//!     TableMeta::new("group_info", &["id", "name"], Some("id"));
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// Name of the id column for tables without an auto-increment column.
pub const TABLE_ID_COLUMN: &str = "id";

/// Field access by column name.
pub trait Entity: Send + Sync {
    /// Current value of the field mapped to `column`, `None` for unknown columns.
    fn field(&self, column: &str) -> Option<Value>;

    /// Assign a value read from the database to the field mapped to `column`.
    fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()>;
}

/// Maps a base table name and the table sharding key to a physical table name.
pub type TableShardingFn = fn(table: &str, key: Option<&Value>) -> String;

/// Immutable descriptor of one table.
pub struct TableMeta<T> {
    pub table: &'static str,
    /// Declared columns; their order is the SQL column order.
    pub columns: &'static [&'static str],
    pub auto_column: Option<&'static str>,
    pub sharding: Option<TableShardingFn>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TableMeta<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TableMeta<T> {}

impl<T> fmt::Debug for TableMeta<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMeta")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("auto_column", &self.auto_column)
            .field("sharding", &self.sharding.is_some())
            .finish()
    }
}

impl<T> TableMeta<T> {
    pub const fn new(
        table: &'static str,
        columns: &'static [&'static str],
        auto_column: Option<&'static str>,
    ) -> Self {
        Self {
            table,
            columns,
            auto_column,
            sharding: None,
            _marker: PhantomData,
        }
    }

    /// Attach a table sharding function.
    pub const fn with_sharding(mut self, sharding: TableShardingFn) -> Self {
        self.sharding = Some(sharding);
        self
    }

    /// Column matched by the id based operations: the auto column, else `id`.
    pub fn id_column(&self) -> &'static str {
        self.auto_column.unwrap_or(TABLE_ID_COLUMN)
    }

    pub fn is_auto_column(&self, column: &str) -> bool {
        self.auto_column == Some(column)
    }

    /// Declared columns without the auto column.
    pub fn writable_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .copied()
            .filter(|c| !self.is_auto_column(c))
    }

    /// Physical table name for the given table sharding key.
    pub fn physical_table(&self, key: Option<&Value>) -> String {
        match self.sharding {
            Some(shard) => shard(self.table, key),
            None => self.table.to_string(),
        }
    }
}

impl<T: Entity> TableMeta<T> {
    /// Field values in declared column order, optionally skipping the auto column.
    pub fn extract_values(&self, ins: &T, skip_auto: bool) -> OrmResult<Vec<Value>> {
        self.columns
            .iter()
            .filter(|c| !(skip_auto && self.is_auto_column(c)))
            .map(|c| field_of(ins, c))
            .collect()
    }

    /// Field values of the given columns, in the given order.
    pub fn extract_values_by_columns<S: AsRef<str>>(
        &self,
        ins: &T,
        columns: &[S],
    ) -> OrmResult<Vec<Value>> {
        columns.iter().map(|c| field_of(ins, c.as_ref())).collect()
    }

    /// Apply one row, projected as `columns`, onto `ins`.
    pub fn bind_row<S: AsRef<str>>(
        &self,
        ins: &mut T,
        columns: &[S],
        values: Vec<Value>,
    ) -> OrmResult<()> {
        if columns.len() != values.len() {
            return Err(OrmError::decode(
                self.table,
                format!(
                    "row has {} values for {} projected columns",
                    values.len(),
                    columns.len()
                ),
            ));
        }
        for (column, value) in columns.iter().zip(values) {
            ins.set_field(column.as_ref(), value)?;
        }
        Ok(())
    }
}

fn field_of<T: Entity>(ins: &T, column: &str) -> OrmResult<Value> {
    ins.field(column)
        .ok_or_else(|| OrmError::validation(format!("no field mapped to column '{column}'")))
}
