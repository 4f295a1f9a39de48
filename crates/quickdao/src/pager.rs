//! Projection, pagination and ordering value objects.

use crate::error::{OrmError, OrmResult};

/// One page of a listing: `page_size` rows of the 1-based `page_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page_size: i64,
    pub page_number: i64,
}

impl Pager {
    pub fn new(page_size: i64, page_number: i64) -> Self {
        Self {
            page_size,
            page_number,
        }
    }

    /// First page of `limit` rows.
    pub fn limit(limit: i64) -> Self {
        Self::new(limit, 1)
    }

    /// Fails with [`OrmError::InvalidPager`] unless both fields are positive
    /// and the row offset fits in an `i64`.
    pub fn validate(&self) -> OrmResult<()> {
        self.offset().map(|_| ())
    }

    /// Row offset of the page, checked the same way as [`validate`](Self::validate).
    pub fn offset(&self) -> OrmResult<i64> {
        let invalid = || OrmError::InvalidPager {
            page_size: self.page_size,
            page_number: self.page_number,
        };
        if self.page_size <= 0 || self.page_number <= 0 {
            return Err(invalid());
        }
        (self.page_number - 1)
            .checked_mul(self.page_size)
            .ok_or_else(invalid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub desc: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            desc: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            desc: true,
        }
    }
}

/// Collects [`Order`]s in the order they are added.
#[derive(Debug, Clone, Default)]
pub struct OrdersBuilder {
    items: Vec<Order>,
}

impl OrdersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(mut self, column: &str) -> Self {
        self.items.push(Order::asc(column));
        self
    }

    pub fn desc(mut self, column: &str) -> Self {
        self.items.push(Order::desc(column));
        self
    }

    pub fn build(self) -> Vec<Order> {
        self.items
    }
}

/// Column projection of a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Exactly these columns, in this order.
    Include(Vec<String>),
    /// Every declared column except these, in declared order.
    Exclude(Vec<String>),
}

impl View {
    pub fn include<S: AsRef<str>>(columns: &[S]) -> Self {
        View::Include(columns.iter().map(|c| c.as_ref().to_string()).collect())
    }

    pub fn exclude<S: AsRef<str>>(columns: &[S]) -> Self {
        View::Exclude(columns.iter().map(|c| c.as_ref().to_string()).collect())
    }

    /// Projected columns for a table declaring `declared`.
    pub fn resolve(view: Option<&View>, declared: &[&str]) -> Vec<String> {
        match view {
            None => declared.iter().map(|c| c.to_string()).collect(),
            Some(View::Include(columns)) => columns.clone(),
            Some(View::Exclude(excluded)) => declared
                .iter()
                .filter(|c| !excluded.iter().any(|e| e == *c))
                .map(|c| c.to_string())
                .collect(),
        }
    }
}
