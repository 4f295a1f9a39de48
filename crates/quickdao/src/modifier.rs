//! SET clause builder for update statements.

use crate::sql::Sql;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelfOp {
    None,
    Add,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    column: String,
    value: Value,
    op: SelfOp,
}

/// Ordered column assignments compiling to `set c1=?,c2=c2+?`.
///
/// Assigning a column twice keeps its first position and takes the later
/// value and operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifier {
    assignments: Vec<Assignment>,
}

impl Modifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column=?`
    pub fn add(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(column, value.into(), SelfOp::None)
    }

    /// `column=column+?`
    pub fn self_add(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(column, value.into(), SelfOp::Add)
    }

    /// `column=column-?`
    pub fn self_minus(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(column, value.into(), SelfOp::Minus)
    }

    fn push(mut self, column: &str, value: Value, op: SelfOp) -> Self {
        if let Some(existing) = self.assignments.iter_mut().find(|a| a.column == column) {
            tracing::debug!(column, "modifier column assigned twice, last write wins");
            existing.value = value;
            existing.op = op;
            return self;
        }
        self.assignments.push(Assignment {
            column: column.to_string(),
            value,
            op,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Assigned columns in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|a| a.column.as_str())
    }

    /// Compile to `set ...`; an empty modifier yields an empty fragment.
    pub fn to_sql(&self) -> Sql {
        let mut q = Sql::empty();
        for (i, a) in self.assignments.iter().enumerate() {
            q.push(if i == 0 { "set " } else { "," });
            q.push(&a.column).push("=");
            match a.op {
                SelfOp::None => {}
                SelfOp::Add => {
                    q.push(&a.column).push("+");
                }
                SelfOp::Minus => {
                    q.push(&a.column).push("-");
                }
            }
            q.push_bind(a.value.clone());
        }
        q
    }
}
