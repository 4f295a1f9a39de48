//! In-memory recording driver shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use quickdao::{
    Connection, ConnectionPool, Datasource, Entity, ExecResult, OrmError, OrmResult, Row,
    RowStream, TableMeta, Value,
};

/// Everything the mock driver saw, in order.
#[derive(Debug, Default)]
pub struct Journal {
    pub events: Vec<String>,
    /// Arguments of every query / exec / insert, in execution order.
    pub args: Vec<Vec<Value>>,
    pub result_sets: VecDeque<Vec<Row>>,
    pub affected: u64,
    pub next_insert_id: i64,
    pub fail_begin: bool,
    pub fail_commit: bool,
    pub fail_exec: bool,
    pub acquire_delay: Option<Duration>,
    pub pool_closed: bool,
}

impl Journal {
    /// SQL text of every statement sent, without the transaction commands.
    pub fn statements(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| {
                e.strip_prefix("query: ")
                    .or_else(|| e.strip_prefix("exec: "))
                    .or_else(|| e.strip_prefix("insert: "))
            })
            .map(str::to_string)
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }
}

#[derive(Clone, Default)]
pub struct MockPool {
    journal: Arc<Mutex<Journal>>,
}

impl MockPool {
    pub fn new() -> Self {
        let pool = Self::default();
        pool.journal().affected = 1;
        pool.journal().next_insert_id = 100;
        pool
    }

    pub fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    /// Queue the rows returned by the next query.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.journal().result_sets.push_back(rows);
    }

    pub fn events(&self) -> Vec<String> {
        self.journal().events.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.journal().statements()
    }

    pub fn args(&self) -> Vec<Vec<Value>> {
        self.journal().args.clone()
    }
}

impl ConnectionPool for MockPool {
    type Connection = MockConnection;

    async fn acquire(&self) -> OrmResult<MockConnection> {
        let delay = self.journal().acquire_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.journal().events.push("acquire".into());
        Ok(MockConnection {
            journal: self.journal.clone(),
        })
    }

    fn close(&self) {
        self.journal().pool_closed = true;
    }
}

pub struct MockConnection {
    journal: Arc<Mutex<Journal>>,
}

impl MockConnection {
    fn record(&self, event: String, args: &[Value]) -> OrmResult<MutexGuard<'_, Journal>> {
        let mut j = self.journal.lock().unwrap();
        j.events.push(event);
        j.args.push(args.to_vec());
        if j.fail_exec {
            return Err(OrmError::Other("mock execution failure".into()));
        }
        Ok(j)
    }
}

impl Connection for MockConnection {
    async fn begin(&mut self, read_only: bool) -> OrmResult<()> {
        let mut j = self.journal.lock().unwrap();
        j.events.push(if read_only { "begin read only" } else { "begin" }.into());
        if j.fail_begin {
            return Err(OrmError::Connection("mock begin failure".into()));
        }
        Ok(())
    }

    async fn commit(&mut self) -> OrmResult<()> {
        let mut j = self.journal.lock().unwrap();
        j.events.push("commit".into());
        if j.fail_commit {
            return Err(OrmError::Connection("mock commit failure".into()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> OrmResult<()> {
        self.journal.lock().unwrap().events.push("rollback".into());
        Ok(())
    }

    async fn query_stream(&self, sql: &str, args: &[Value]) -> OrmResult<RowStream> {
        let rows = self
            .record(format!("query: {sql}"), args)?
            .result_sets
            .pop_front()
            .unwrap_or_default();
        Ok(RowStream::new(futures_util::stream::iter(
            rows.into_iter().map(Ok),
        )))
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        Ok(self.record(format!("exec: {sql}"), args)?.affected)
    }

    async fn insert(
        &self,
        sql: &str,
        args: &[Value],
        auto_column: Option<&str>,
    ) -> OrmResult<ExecResult> {
        let mut j = self.record(format!("insert: {sql}"), args)?;
        let last_insert_id = auto_column.map(|_| {
            let id = j.next_insert_id;
            j.next_insert_id += 1;
            id
        });
        Ok(ExecResult {
            affected: 1,
            last_insert_id,
        })
    }

    async fn close(self) {
        self.journal.lock().unwrap().events.push("close".into());
    }

    fn discard(self) {
        self.journal.lock().unwrap().events.push("discard".into());
    }
}

pub fn datasource() -> (MockPool, Datasource<MockPool>) {
    let pool = MockPool::new();
    (pool.clone(), Datasource::new(pool))
}

pub fn row(columns: &[&str], values: Vec<Value>) -> Row {
    let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
    Row::new(columns, values)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub balance: i64,
    pub operator_id: i64,
}

impl Entity for Account {
    fn field(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "balance" => Some(self.balance.into()),
            "operator_id" => Some(self.operator_id.into()),
            _ => None,
        }
    }

    fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()> {
        match column {
            "id" => self.id = value.into_field(column)?,
            "name" => self.name = value.into_field(column)?,
            "balance" => self.balance = value.into_field(column)?,
            "operator_id" => self.operator_id = value.into_field(column)?,
            _ => {}
        }
        Ok(())
    }
}

pub static ACCOUNTS: TableMeta<Account> = TableMeta::new(
    "accounts",
    &["id", "name", "balance", "operator_id"],
    Some("id"),
);

/// `accounts_<key mod 4>`.
fn account_shard(table: &str, key: Option<&Value>) -> String {
    match key.and_then(Value::as_i64) {
        Some(k) => format!("{table}_{}", k.rem_euclid(4)),
        None => table.to_string(),
    }
}

pub static SHARDED_ACCOUNTS: TableMeta<Account> = TableMeta::new(
    "accounts",
    &["id", "name", "balance", "operator_id"],
    Some("id"),
)
.with_sharding(account_shard);

pub fn account_row(id: i64, name: &str, balance: i64) -> Row {
    row(
        &["id", "name", "balance", "operator_id"],
        vec![id.into(), name.into(), balance.into(), 0.into()],
    )
}
