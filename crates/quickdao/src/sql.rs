//! Parameter-safe SQL fragment builder.
//!
//! Every statement and condition in the crate is assembled through [`Sql`], which
//! keeps the `?` placeholders and their [`Value`]s in lockstep:
//!
//! ```ignore
//! use quickdao::Sql;
//!
//! let mut q = Sql::new("select id,name from user where ");
//! q.push("status = ").push_bind(1).push(" and id in (");
//! q.push_bind_list(vec![1, 2, 3]).push(")");
//!
//! assert_eq!(q.as_str(), "select id,name from user where status = ? and id in (?,?,?)");
//! assert_eq!(q.args().len(), 4);
//! ```

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// SQL text with `?` placeholders plus the arguments they bind, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    text: String,
    args: Vec<Value>,
}

impl Sql {
    /// Create a new builder with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            text: initial_sql.into(),
            args: Vec::new(),
        }
    }

    /// Create an empty builder.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap already rendered text and its arguments.
    pub fn from_parts(text: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            args,
        }
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.text.push_str(sql);
        self
    }

    /// Append a `?` placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.text.push('?');
        self.args.push(value.into());
        self
    }

    /// Append a comma-separated list of placeholders and bind all values.
    ///
    /// An empty list appends nothing; callers that need at least one value
    /// check for it before building.
    pub fn push_bind_list<T>(&mut self, values: impl IntoIterator<Item = T>) -> &mut Self
    where
        T: Into<Value>,
    {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.text.push(',');
            }
            self.push_bind(v);
        }
        self
    }

    /// Append another fragment, consuming it.
    pub fn push_sql(&mut self, other: Sql) -> &mut Self {
        self.text.push_str(&other.text);
        self.args.extend(other.args);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Number of `?` placeholders outside quoted literals.
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut quote: Option<char> = None;
        for c in self.text.chars() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == '?' => count += 1,
                None => {}
            }
        }
        count
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.text, self.args)
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*` per `.`-separated segment.
pub(crate) fn is_valid_ident(ident: &str) -> bool {
    !ident.is_empty()
        && ident.split('.').all(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(first) if first == '_' || first.is_ascii_alphabetic() => {
                    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
                }
                _ => false,
            }
        })
}
