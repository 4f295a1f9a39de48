//! Error types for quickdao

use thiserror::Error;

/// Result type alias for quickdao operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for data access operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// The transaction context is not in its initial state (already completed or reused).
    #[error("invalid tc status")]
    InvalidState,

    /// No connection could be acquired from the pool in time.
    #[error("get connection timeout")]
    ConnectionTimeout,

    /// The datasource sharding key is missing or has an unsupported type.
    #[error("invalid shard key")]
    InvalidShardKey,

    /// IN / NOT IN built with an empty value list.
    #[error("{column}: no param values")]
    NoParamValues { column: String },

    /// Batch size must be greater than zero.
    #[error("page size must be greater than 0")]
    InvalidBatchSize,

    /// Pager with a non-positive page size or page number.
    #[error("invalid pager: page size {page_size}, page number {page_number}")]
    InvalidPager { page_size: i64, page_number: i64 },

    /// A mutation that needs a condition was issued without one.
    #[error("{0} must have condition")]
    MissingCondition(&'static str),

    /// A sharding datasource was built from zero pools.
    #[error("no db confs")]
    NoDatasource,

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// An interceptor refused the operation.
    #[error("Interceptor error: {0}")]
    Interceptor(String),

    /// The business closure panicked; used as the rollback reason before the unwind resumes.
    #[error("met recover")]
    Panicked,

    /// A multi-row update failed after `affected` rows were already written
    /// outside of any transaction.
    #[error("update failed after {affected} rows: {source}")]
    PartialUpdate {
        affected: u64,
        #[source]
        source: Box<OrmError>,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn no_param_values(column: &str) -> Self {
        Self::NoParamValues {
            column: column.to_string(),
        }
    }

    /// Check if this error comes from using a completed transaction context
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState)
    }

    /// Check if this is a connection acquire timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout)
    }

    /// Check if this is a refused mutation without condition
    pub fn is_missing_condition(&self) -> bool {
        matches!(self, Self::MissingCondition(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
