//! Per-table facade.
//!
//! ```ignore
//! static GROUP_INFO: TableMeta<GroupInfo> = TableMeta::new(
//!     "group_info",
//!     &["id", "name", "owner_id", "created_at"],
//!     Some("id"),
//! );
//! static GROUPS: QuickDao<GroupInfo> = QuickDao::new(&GROUP_INFO);
//!
//! let found = GROUPS.get_by_id(&tc, 7, None).await?;
//! ```

use crate::condition::Matcher;
use crate::delete;
use crate::driver::{Connection, Row};
use crate::error::OrmResult;
use crate::insert;
use crate::meta::{Entity, TableMeta};
use crate::modifier::Modifier;
use crate::pager::{Order, Pager, View};
use crate::query;
use crate::transaction::TransContext;
use crate::update;
use crate::value::Value;

/// Every operation of the crate, bound to one table's metadata.
pub struct QuickDao<T: 'static> {
    meta: &'static TableMeta<T>,
}

impl<T> Clone for QuickDao<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for QuickDao<T> {}

impl<T> std::fmt::Debug for QuickDao<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuickDao").field("table", &self.meta.table).finish()
    }
}

impl<T: Entity + Default> QuickDao<T> {
    pub const fn new(meta: &'static TableMeta<T>) -> Self {
        Self { meta }
    }

    pub fn meta(&self) -> &'static TableMeta<T> {
        self.meta
    }

    pub async fn insert<C: Connection>(&self, tc: &TransContext<C>, ins: &mut T) -> OrmResult<u64> {
        insert::insert(tc, self.meta, ins).await
    }

    pub async fn update<C: Connection>(&self, tc: &TransContext<C>, ins: &mut T) -> OrmResult<u64> {
        update::update(tc, self.meta, ins).await
    }

    pub async fn update_list<C: Connection>(
        &self,
        tc: &TransContext<C>,
        list: &mut [T],
    ) -> OrmResult<u64> {
        update::update_list(tc, self.meta, list).await
    }

    pub async fn update_by_id<C: Connection>(
        &self,
        tc: &TransContext<C>,
        modifier: &Modifier,
        id: i64,
    ) -> OrmResult<u64> {
        update::update_by_id(tc, self.meta, modifier, id).await
    }

    pub async fn update_by_ids<C: Connection>(
        &self,
        tc: &TransContext<C>,
        modifier: &Modifier,
        ids: &[i64],
    ) -> OrmResult<u64> {
        update::update_by_ids(tc, self.meta, modifier, ids).await
    }

    pub async fn update_by_modifier<C: Connection>(
        &self,
        tc: &TransContext<C>,
        modifier: &Modifier,
        matcher: &Matcher,
    ) -> OrmResult<u64> {
        update::update_by_modifier(tc, self.meta, modifier, matcher).await
    }

    pub async fn exec_raw_sql<C: Connection>(
        &self,
        tc: &TransContext<C>,
        sql: &str,
        args: &[Value],
    ) -> OrmResult<u64> {
        update::exec_raw_sql(tc, sql, args).await
    }

    pub async fn delete_by_id<C: Connection>(&self, tc: &TransContext<C>, id: i64) -> OrmResult<u64> {
        delete::delete_by_id(tc, self.meta, id).await
    }

    pub async fn delete_by_ids<C: Connection>(
        &self,
        tc: &TransContext<C>,
        ids: &[i64],
    ) -> OrmResult<u64> {
        delete::delete_by_ids(tc, self.meta, ids).await
    }

    pub async fn delete_by_matcher<C: Connection>(
        &self,
        tc: &TransContext<C>,
        matcher: &Matcher,
    ) -> OrmResult<u64> {
        delete::delete_by_matcher(tc, self.meta, matcher).await
    }

    pub async fn get_all<C: Connection>(
        &self,
        tc: &TransContext<C>,
        view: Option<&View>,
    ) -> OrmResult<Vec<T>> {
        query::get_all(tc, self.meta, view).await
    }

    pub async fn get_by_id<C: Connection>(
        &self,
        tc: &TransContext<C>,
        id: i64,
        view: Option<&View>,
    ) -> OrmResult<Option<T>> {
        query::get_by_id(tc, self.meta, id, view).await
    }

    pub async fn get_by_ids<C: Connection>(
        &self,
        tc: &TransContext<C>,
        ids: &[i64],
        view: Option<&View>,
    ) -> OrmResult<Vec<T>> {
        query::get_by_ids(tc, self.meta, ids, view).await
    }

    pub async fn query_list<C: Connection>(
        &self,
        tc: &TransContext<C>,
        matcher: Option<&Matcher>,
        view: Option<&View>,
        orders: &[Order],
    ) -> OrmResult<Vec<T>> {
        query::query_list(tc, self.meta, matcher, view, orders).await
    }

    pub async fn query_page_list<C: Connection>(
        &self,
        tc: &TransContext<C>,
        matcher: Option<&Matcher>,
        view: Option<&View>,
        pager: &Pager,
        orders: &[Order],
    ) -> OrmResult<Vec<T>> {
        query::query_page_list(tc, self.meta, matcher, view, pager, orders).await
    }

    pub async fn query_one<C: Connection>(
        &self,
        tc: &TransContext<C>,
        matcher: Option<&Matcher>,
        view: Option<&View>,
    ) -> OrmResult<Option<T>> {
        query::query_one(tc, self.meta, matcher, view).await
    }

    pub async fn count<C: Connection>(
        &self,
        tc: &TransContext<C>,
        matcher: Option<&Matcher>,
    ) -> OrmResult<i64> {
        query::count(tc, self.meta, matcher).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn query_list_by_batch<C, H>(
        &self,
        tc: &TransContext<C>,
        matcher: Option<&Matcher>,
        view: Option<&View>,
        orders: &[Order],
        total_limit: Option<i64>,
        batch_size: usize,
        handler: H,
    ) -> OrmResult<()>
    where
        C: Connection,
        H: AsyncFnMut(Vec<T>) -> OrmResult<()>,
    {
        query::query_list_by_batch(
            tc,
            self.meta,
            matcher,
            view,
            orders,
            total_limit,
            batch_size,
            handler,
        )
        .await
    }

    pub async fn query_raw_sql<C, R, M>(
        &self,
        tc: &TransContext<C>,
        sql: &str,
        args: &[Value],
        mapper: M,
    ) -> OrmResult<Vec<R>>
    where
        C: Connection,
        M: FnMut(Row) -> OrmResult<R>,
    {
        query::query_raw_sql(tc, sql, args, mapper).await
    }

    pub async fn query_raw_sql_by_batch<C, R, M, H>(
        &self,
        tc: &TransContext<C>,
        sql: &str,
        args: &[Value],
        batch_size: usize,
        mapper: M,
        handler: H,
    ) -> OrmResult<()>
    where
        C: Connection,
        M: FnMut(Row) -> OrmResult<R>,
        H: AsyncFnMut(Vec<R>) -> OrmResult<()>,
    {
        query::query_raw_sql_by_batch(tc, sql, args, batch_size, mapper, handler).await
    }

    pub async fn get_by_id_for_update<C: Connection>(
        &self,
        tc: &TransContext<C>,
        id: i64,
        skip_locked: bool,
    ) -> OrmResult<Option<T>> {
        query::get_by_id_for_update(tc, self.meta, id, skip_locked).await
    }

    pub async fn get_by_ids_for_update<C: Connection>(
        &self,
        tc: &TransContext<C>,
        ids: &[i64],
        skip_locked: bool,
        orders: &[Order],
    ) -> OrmResult<Vec<T>> {
        query::get_by_ids_for_update(tc, self.meta, ids, skip_locked, orders).await
    }

    pub async fn query_list_for_update<C: Connection>(
        &self,
        tc: &TransContext<C>,
        matcher: Option<&Matcher>,
        view: Option<&View>,
        pager: Option<&Pager>,
        orders: &[Order],
        skip_locked: bool,
    ) -> OrmResult<Vec<T>> {
        query::query_list_for_update(tc, self.meta, matcher, view, pager, orders, skip_locked)
            .await
    }

    pub async fn query_one_for_update<C: Connection>(
        &self,
        tc: &TransContext<C>,
        matcher: Option<&Matcher>,
        view: Option<&View>,
        skip_locked: bool,
    ) -> OrmResult<Option<T>> {
        query::query_one_for_update(tc, self.meta, matcher, view, skip_locked).await
    }
}
