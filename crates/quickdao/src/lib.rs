//! # quickdao
//!
//! A metadata-driven data access layer with sharding-aware transaction contexts.
//!
//! ## Features
//!
//! - **No reflection**: each table is described once by a static [`TableMeta`] and
//!   entities expose their fields through the small [`Entity`] trait
//! - **Composable conditions**: [`Matcher`] trees of AND/OR groups compile to a
//!   `where` fragment plus bound values
//! - **Explicit transactions**: a [`TransContext`] owns one connection and
//!   commits or rolls back exactly once; [`auto_trans`] completes it on every
//!   exit path, panics included
//! - **Sharding**: tables by a per-request key, datasources by a pluggable policy
//! - **Safe defaults**: deletes and modifier updates require a condition
//! - **Tracing**: executed SQL and its arguments are logged under the
//!   `quickdao.sql` target when enabled on the datasource
//!
//! ## Example
//!
//! ```ignore
//! use quickdao::{auto_trans, Matcher, Modifier, QuickDao, RequestStyle, TableMeta};
//!
//! static GROUP_INFO: TableMeta<GroupInfo> =
//!     TableMeta::new("group_info", &["id", "name", "status"], Some("id"));
//! static GROUPS: QuickDao<GroupInfo> = QuickDao::new(&GROUP_INFO);
//!
//! let ds = quickdao::new_datasource(&conf)?;
//! let renamed = auto_trans(&ds, RequestStyle::Write, "req-42", async |tc| {
//!     let m = Matcher::new().eq("status", 1);
//!     GROUPS
//!         .update_by_modifier(tc, &Modifier::new().add("name", "renamed"), &m)
//!         .await
//! })
//! .await?;
//! ```

pub mod condition;
pub mod dao;
pub mod datasource;
pub mod delete;
pub mod driver;
pub mod error;
pub mod insert;
pub mod interceptor;
mod log;
pub mod meta;
pub mod modifier;
pub mod pager;
pub mod query;
pub mod scope;
pub mod sql;
pub mod statement;
pub mod transaction;
pub mod update;
pub mod value;

#[cfg(feature = "pool")]
pub mod postgres;

pub use condition::{CompareOp, LikeStyle, LogicOp, Matcher, Predicate, SqlCond};
pub use dao::QuickDao;
pub use datasource::{
    DEFAULT_ACQUIRE_TIMEOUT, Datasource, DatasourceShardingPolicy, DbConf, ModInt64ShardingPolicy,
};
pub use delete::{delete_by_id, delete_by_ids, delete_by_matcher};
pub use driver::{Connection, ConnectionPool, ExecResult, Row, RowStream};
pub use error::{OrmError, OrmResult};
pub use insert::insert;
pub use interceptor::{Interceptor, ScopeValueStamp};
pub use meta::{Entity, TABLE_ID_COLUMN, TableMeta, TableShardingFn};
pub use modifier::Modifier;
pub use pager::{Order, OrdersBuilder, Pager, View};
pub use query::{
    count, get_all, get_by_id, get_by_id_for_update, get_by_ids, get_by_ids_for_update,
    query_list, query_list_by_batch, query_list_for_update, query_one, query_one_for_update,
    query_page_list, query_page_list_with, query_raw_sql, query_raw_sql_by_batch,
};
pub use scope::RequestScope;
pub use sql::Sql;
pub use transaction::{
    RequestStyle, TcStatus, TransContext, auto_trans, auto_trans_with_scope, wrap_trans,
};
pub use update::{
    exec_raw_sql, update, update_by_id, update_by_ids, update_by_modifier, update_list,
};
pub use value::{FromValue, Value};

#[cfg(feature = "pool")]
pub use postgres::{PgConnection, PgPool, new_datasource, new_sharding_datasource, rewrite_sql};
