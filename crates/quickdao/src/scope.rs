//! Request-scoped values carried by a transaction context.

use std::collections::HashMap;

use crate::value::Value;

/// Values attached to one unit of work: trace id, sharding keys and any
/// custom values interceptors want to read.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    trace_id: String,
    table_sharding_key: Option<Value>,
    datasource_sharding_key: Option<Value>,
    values: HashMap<String, Value>,
}

impl RequestScope {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            ..Self::default()
        }
    }

    pub fn with_table_sharding_key(mut self, key: impl Into<Value>) -> Self {
        self.table_sharding_key = non_null(key.into());
        self
    }

    pub fn with_datasource_sharding_key(mut self, key: impl Into<Value>) -> Self {
        self.datasource_sharding_key = non_null(key.into());
        self
    }

    /// Attach a custom value.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn table_sharding_key(&self) -> Option<&Value> {
        self.table_sharding_key.as_ref()
    }

    pub fn datasource_sharding_key(&self) -> Option<&Value> {
        self.datasource_sharding_key.as_ref()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }
}

fn non_null(v: Value) -> Option<Value> {
    if v.is_null() { None } else { Some(v) }
}
