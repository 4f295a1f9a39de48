//! Predicate tree compiled into WHERE fragments.
//!
//! A [`Matcher`] is an AND/OR group of [`SqlCond`] children. Leaves are
//! [`Predicate`]s built through the matcher's builder methods; any other type
//! implementing [`SqlCond`] can be attached with [`Matcher::add_cond`].
//!
//! # Example
//! ```ignore
//! use quickdao::{LikeStyle, Matcher};
//!
//! let m = Matcher::new()
//!     .eq("status", 1)
//!     .in_list("id", vec![1, 2, 3])
//!     .add(Matcher::or().like("name", "ab", LikeStyle::ALL).null("name", false));
//!
//! let (sql, args) = m.to_sql(Vec::new())?;
//! assert_eq!(sql, "status = ? and id in (?,?,?) and (name like ? or name is null)");
//! assert_eq!(args.len(), 5);
//! ```

use std::fmt;

use crate::error::{OrmError, OrmResult};
use crate::sql::Sql;
use crate::value::Value;

/// A node of the condition tree.
///
/// `to_sql` receives the arguments collected so far and returns the node's
/// fragment together with the extended argument list. An empty fragment means
/// "no constraint" and is skipped by the enclosing [`Matcher`].
pub trait SqlCond: fmt::Debug + Send + Sync {
    fn to_sql(&self, args: Vec<Value>) -> OrmResult<(String, Vec<Value>)>;
}

/// Comparison operator of a [`Predicate::Simple`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// Wildcard placement of a LIKE predicate.
///
/// Kept as an integer so that styles outside the known set can be expressed;
/// those compile to no constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeStyle(pub i32);

impl LikeStyle {
    /// `%value%`
    pub const ALL: LikeStyle = LikeStyle(0);
    /// `%value`
    pub const LEFT: LikeStyle = LikeStyle(1);
    /// `value%`
    pub const RIGHT: LikeStyle = LikeStyle(2);

    fn wrap(self, value: &str) -> Option<String> {
        match self {
            LikeStyle::ALL => Some(format!("%{value}%")),
            LikeStyle::LEFT => Some(format!("%{value}")),
            LikeStyle::RIGHT => Some(format!("{value}%")),
            _ => None,
        }
    }
}

impl From<i32> for LikeStyle {
    fn from(v: i32) -> Self {
        LikeStyle(v)
    }
}

/// Leaf predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <op> ?`
    Simple {
        op: CompareOp,
        column: String,
        value: Value,
    },
    /// `column [not ]in (?,...)`
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column like ?`
    Like {
        column: String,
        value: String,
        style: LikeStyle,
    },
    /// `column is [not ]null`
    Null { column: String, negated: bool },
    /// `column between ? and ?`, degrading to `>=` / `<=` with one bound.
    Between {
        column: String,
        start: Option<Value>,
        end: Option<Value>,
    },
    /// Raw condition text, no arguments.
    Scalar { raw: String },
    /// `column & ? = ?`
    BitwiseAnd {
        column: String,
        mask: Value,
        target: Value,
    },
}

fn non_null(v: Value) -> Option<Value> {
    if v.is_null() { None } else { Some(v) }
}

impl SqlCond for Predicate {
    fn to_sql(&self, args: Vec<Value>) -> OrmResult<(String, Vec<Value>)> {
        let mut q = Sql::from_parts(String::new(), args);
        match self {
            Predicate::Simple { op, column, value } => {
                q.push(column)
                    .push(" ")
                    .push(op.as_str())
                    .push(" ")
                    .push_bind(value.clone());
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Err(OrmError::no_param_values(column));
                }
                q.push(column)
                    .push(if *negated { " not in (" } else { " in (" })
                    .push_bind_list(values.iter().cloned())
                    .push(")");
            }
            Predicate::Like {
                column,
                value,
                style,
            } => {
                if value.is_empty() {
                    return Ok(q.into_parts());
                }
                let Some(pattern) = style.wrap(value) else {
                    return Ok(q.into_parts());
                };
                q.push(column).push(" like ").push_bind(pattern);
            }
            Predicate::Null { column, negated } => {
                q.push(column)
                    .push(if *negated { " is not null" } else { " is null" });
            }
            Predicate::Between { column, start, end } => match (start, end) {
                (None, None) => {}
                (Some(lo), None) => {
                    q.push(column).push(" >= ").push_bind(lo.clone());
                }
                (None, Some(hi)) => {
                    q.push(column).push(" <= ").push_bind(hi.clone());
                }
                (Some(lo), Some(hi)) => {
                    q.push(column)
                        .push(" between ")
                        .push_bind(lo.clone())
                        .push(" and ")
                        .push_bind(hi.clone());
                }
            },
            Predicate::Scalar { raw } => {
                q.push(raw);
            }
            Predicate::BitwiseAnd {
                column,
                mask,
                target,
            } => {
                q.push(column)
                    .push(" & ")
                    .push_bind(mask.clone())
                    .push(" = ")
                    .push_bind(target.clone());
            }
        }
        Ok(q.into_parts())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    fn separator(self) -> &'static str {
        match self {
            LogicOp::And => " and ",
            LogicOp::Or => " or ",
        }
    }
}

/// Composite condition: ordered children joined by one logic operator.
#[derive(Debug)]
pub struct Matcher {
    conds: Vec<Box<dyn SqlCond>>,
    logic: LogicOp,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::and()
    }
}

impl Matcher {
    /// An AND group.
    pub fn new() -> Self {
        Self::and()
    }

    pub fn and() -> Self {
        Self {
            conds: Vec::new(),
            logic: LogicOp::And,
        }
    }

    pub fn or() -> Self {
        Self {
            conds: Vec::new(),
            logic: LogicOp::Or,
        }
    }

    pub fn logic(&self) -> LogicOp {
        self.logic
    }

    /// True when no child has been added.
    pub fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conds.len()
    }

    /// Nest another matcher as a child group.
    pub fn add(self, matcher: Matcher) -> Self {
        self.add_cond(matcher)
    }

    /// Append any condition node.
    pub fn add_cond(mut self, cond: impl SqlCond + 'static) -> Self {
        self.conds.push(Box::new(cond));
        self
    }

    fn simple(self, op: CompareOp, column: &str, value: impl Into<Value>) -> Self {
        self.add_cond(Predicate::Simple {
            op,
            column: column.to_string(),
            value: value.into(),
        })
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.simple(CompareOp::Eq, column, value)
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.simple(CompareOp::Ne, column, value)
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.simple(CompareOp::Lt, column, value)
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.simple(CompareOp::Lte, column, value)
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.simple(CompareOp::Gt, column, value)
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.simple(CompareOp::Gte, column, value)
    }

    /// `column in (?,...)`. An empty list fails at compile time.
    pub fn in_list<T: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.add_cond(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    pub fn not_in<T: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.add_cond(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    pub fn like(self, column: &str, value: &str, style: impl Into<LikeStyle>) -> Self {
        self.add_cond(Predicate::Like {
            column: column.to_string(),
            value: value.to_string(),
            style: style.into(),
        })
    }

    /// `column is null`, or `column is not null` when `not` is set.
    pub fn null(self, column: &str, not: bool) -> Self {
        self.add_cond(Predicate::Null {
            column: column.to_string(),
            negated: not,
        })
    }

    /// Range condition; a [`Value::Null`] bound (e.g. `None::<i64>`) is open.
    pub fn between(self, column: &str, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        self.add_cond(Predicate::Between {
            column: column.to_string(),
            start: non_null(start.into()),
            end: non_null(end.into()),
        })
    }

    /// Raw condition text. The text is emitted as-is; never build it from user input.
    pub fn add_scalar(self, cond: &str) -> Self {
        self.add_cond(Predicate::Scalar {
            raw: cond.to_string(),
        })
    }

    /// `column & mask = target`
    pub fn bitwise_and(
        self,
        column: &str,
        mask: impl Into<Value>,
        target: impl Into<Value>,
    ) -> Self {
        self.add_cond(Predicate::BitwiseAnd {
            column: column.to_string(),
            mask: mask.into(),
            target: target.into(),
        })
    }

    /// Compile into a standalone [`Sql`] fragment.
    pub fn build(&self) -> OrmResult<Sql> {
        let (text, args) = self.to_sql(Vec::new())?;
        Ok(Sql::from_parts(text, args))
    }
}

impl SqlCond for Matcher {
    fn to_sql(&self, mut args: Vec<Value>) -> OrmResult<(String, Vec<Value>)> {
        let mut segments = Vec::with_capacity(self.conds.len());
        for cond in &self.conds {
            let (segment, next) = cond.to_sql(args)?;
            args = next;
            if !segment.is_empty() {
                segments.push(segment);
            }
        }

        if segments.is_empty() {
            return Ok((String::new(), args));
        }
        let joined = segments.join(self.logic.separator());
        if self.logic == LogicOp::Or && segments.len() > 1 {
            return Ok((format!("({joined})"), args));
        }
        Ok((joined, args))
    }
}
