//! Datasources and datasource sharding.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::driver::ConnectionPool;
use crate::error::{OrmError, OrmResult};
use crate::interceptor::Interceptor;
use crate::scope::RequestScope;
use crate::value::Value;

/// Default bound on acquiring a connection and beginning its transaction.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings of one datasource.
///
/// Zero means "binding default" for every numeric knob.
///
/// ```ignore
/// let conf: DbConf = serde_json::from_str(r#"{"url": "postgres://app@localhost/app", "size": 20, "log_sql": true}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConf {
    pub url: String,
    /// Maximum open connections.
    pub size: usize,
    /// Maximum connection lifetime, in seconds.
    pub life: u64,
    /// Maximum idle connections kept by the pool.
    pub idle_cons: usize,
    /// Maximum idle time of a connection, in seconds.
    pub idle_time: u64,
    /// Emit executed SQL through `tracing`.
    pub log_sql: bool,
    /// Bound on acquiring a connection, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for DbConf {
    fn default() -> Self {
        Self {
            url: String::new(),
            size: 16,
            life: 0,
            idle_cons: 0,
            idle_time: 0,
            log_sql: false,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl DbConf {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        if self.acquire_timeout_ms == 0 {
            DEFAULT_ACQUIRE_TIMEOUT
        } else {
            Duration::from_millis(self.acquire_timeout_ms)
        }
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.life > 0).then(|| Duration::from_secs(self.life))
    }

    pub fn max_idle_time(&self) -> Option<Duration> {
        (self.idle_time > 0).then(|| Duration::from_secs(self.idle_time))
    }

    pub fn max_idle(&self) -> Option<usize> {
        (self.idle_cons > 0).then_some(self.idle_cons)
    }
}

/// Routes a datasource sharding key to one of `count` pools.
pub trait DatasourceShardingPolicy: Send + Sync {
    fn shard(&self, key: Option<&Value>, count: usize) -> OrmResult<usize>;
}

/// `key mod count` for integer keys; any other key is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModInt64ShardingPolicy;

impl DatasourceShardingPolicy for ModInt64ShardingPolicy {
    fn shard(&self, key: Option<&Value>, count: usize) -> OrmResult<usize> {
        if count == 0 {
            return Err(OrmError::NoDatasource);
        }
        match key {
            Some(Value::Int(k)) => Ok(k.rem_euclid(count as i64) as usize),
            _ => Err(OrmError::InvalidShardKey),
        }
    }
}

/// One pool, or several pools behind a sharding policy.
///
/// Owns its pools; [`Datasource::shutdown`] closes them. Share it across tasks
/// behind an `Arc` or a `static`.
pub struct Datasource<P: ConnectionPool> {
    pools: Vec<P>,
    policy: Option<Arc<dyn DatasourceShardingPolicy>>,
    log_sql: bool,
    acquire_timeout: Duration,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<P: ConnectionPool> fmt::Debug for Datasource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("pools", &self.pools.len())
            .field("sharding", &self.policy.is_some())
            .field("log_sql", &self.log_sql)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl<P: ConnectionPool> Datasource<P> {
    pub fn new(pool: P) -> Self {
        Self {
            pools: vec![pool],
            policy: None,
            log_sql: false,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            interceptors: Vec::new(),
        }
    }

    /// A datasource routing each context to one of `pools` by its datasource
    /// sharding key.
    pub fn sharding(
        pools: Vec<P>,
        policy: impl DatasourceShardingPolicy + 'static,
    ) -> OrmResult<Self> {
        if pools.is_empty() {
            return Err(OrmError::NoDatasource);
        }
        Ok(Self {
            pools,
            policy: Some(Arc::new(policy)),
            log_sql: false,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            interceptors: Vec::new(),
        })
    }

    pub fn log_sql(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Append an interceptor; hooks run in registration order.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn is_log_sql(&self) -> bool {
        self.log_sql
    }

    pub fn get_acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    pub fn is_sharding(&self) -> bool {
        self.policy.is_some()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub(crate) fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// Pool serving `scope`.
    pub fn pool_for(&self, scope: &RequestScope) -> OrmResult<&P> {
        let idx = match &self.policy {
            None => 0,
            Some(policy) => policy
                .shard(scope.datasource_sharding_key(), self.pools.len())
                .inspect_err(|e| {
                    tracing::error!(trace_id = scope.trace_id(), error = %e, "datasource sharding failed");
                })?,
        };
        self.pools.get(idx).ok_or(OrmError::InvalidShardKey)
    }

    /// Close every pool.
    pub fn shutdown(&self) {
        for pool in &self.pools {
            pool.close();
        }
    }
}
