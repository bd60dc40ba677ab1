//! Typed filter and eval expressions.
//!
//! Expressions are kept as trees until serialization and only rendered to
//! the remote grammar's string syntax by [`Expr::render`]. Field names are
//! validated on construction and string literals are escaped on render, so
//! caller-supplied ids and metadata values can never alter the shape of a
//! filter.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Maximum length of a field path.
const MAX_FIELD_PATH_LENGTH: usize = 128;

/// Errors that can occur when parsing a [`FieldPath`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldPathError {
    /// The input string is empty.
    #[error("field path cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("field path must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// A dot-separated segment is empty (e.g. `metadata..plan`).
    #[error("field path contains an empty segment")]
    EmptySegment,
    /// A character outside `[A-Za-z0-9_]` was found.
    #[error("field path contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A dotted field reference such as `metadata.auto.accountid`.
///
/// ## Constraints
///
/// - Length: 1-128 characters
/// - Segments separated by `.`, none empty
/// - Segment characters limited to ASCII letters, digits and `_`
///
/// ## Examples
///
/// ```
/// use pendo_insights_core::FieldPath;
///
/// assert!(FieldPath::parse("visitorId").is_ok());
/// assert!(FieldPath::parse("metadata.custom.plan_tier").is_ok());
///
/// assert!(FieldPath::parse("").is_err());
/// assert!(FieldPath::parse("metadata..plan").is_err());
/// assert!(FieldPath::parse("plan\" || true").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(String);

impl FieldPath {
    /// Parse a `FieldPath` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, has an empty
    /// segment, or contains a character outside `[A-Za-z0-9_.]`.
    pub fn parse(s: &str) -> Result<Self, FieldPathError> {
        if s.is_empty() {
            return Err(FieldPathError::Empty);
        }
        if s.len() > MAX_FIELD_PATH_LENGTH {
            return Err(FieldPathError::TooLong {
                max: MAX_FIELD_PATH_LENGTH,
            });
        }
        for segment in s.split('.') {
            if segment.is_empty() {
                return Err(FieldPathError::EmptySegment);
            }
            if let Some(c) = segment
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
            {
                return Err(FieldPathError::InvalidCharacter(c));
            }
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = FieldPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.0
    }
}

/// A literal value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// An instant `n` days before now, for recency predicates.
    DaysAgo(u32),
}

impl Literal {
    /// Render in the remote grammar.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => quote(s),
            Self::Int(i) => i.to_string(),
            Self::Float(f) if f.is_finite() => render_number(*f),
            Self::Float(_) | Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::DaysAgo(n) => format!("dateAdd(now(), -{n}, \"days\")"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

/// A boolean filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        field: FieldPath,
        op: CompareOp,
        value: Literal,
    },
    IsNull(FieldPath),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// `field <op> value`.
    #[must_use]
    pub fn compare(field: FieldPath, op: CompareOp, value: impl Into<Literal>) -> Self {
        Self::Compare {
            field,
            op,
            value: value.into(),
        }
    }

    /// `field == value`.
    #[must_use]
    pub fn equals(field: FieldPath, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Conjunction of `exprs`; `None` when there is nothing to join.
    #[must_use]
    pub fn all(mut exprs: Vec<Self>) -> Option<Self> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Self::And(exprs)),
        }
    }

    /// Disjunction of `exprs`; `None` when there is nothing to join.
    #[must_use]
    pub fn any(mut exprs: Vec<Self>) -> Option<Self> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Self::Or(exprs)),
        }
    }

    /// Logical negation.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Render to the remote grammar's string syntax.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Compare { field, op, value } => {
                format!("{field} {} {}", op.symbol(), value.render())
            }
            Self::IsNull(field) => format!("isNull({field})"),
            Self::And(children) => join(children, " && ", "true"),
            Self::Or(children) => join(children, " || ", "false"),
            Self::Not(inner) => format!("!({})", inner.render()),
        }
    }

    const fn is_compound(&self) -> bool {
        matches!(self, Self::And(_) | Self::Or(_))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn join(children: &[Expr], separator: &str, empty: &str) -> String {
    if children.is_empty() {
        return empty.to_string();
    }
    children
        .iter()
        .map(|child| {
            if child.is_compound() {
                format!("({})", child.render())
            } else {
                child.render()
            }
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// An arithmetic expression for `eval` stages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Field(FieldPath),
    Number(f64),
    Add(Box<ValueExpr>, Box<ValueExpr>),
    Sub(Box<ValueExpr>, Box<ValueExpr>),
    Mul(Box<ValueExpr>, Box<ValueExpr>),
    Div(Box<ValueExpr>, Box<ValueExpr>),
}

impl ValueExpr {
    /// `numerator / denominator`.
    #[must_use]
    pub fn ratio(numerator: FieldPath, denominator: FieldPath) -> Self {
        Self::Div(
            Box::new(Self::Field(numerator)),
            Box::new(Self::Field(denominator)),
        )
    }

    /// Render to the remote grammar.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Field(field) => field.to_string(),
            Self::Number(n) if n.is_finite() => render_number(*n),
            Self::Number(_) => "0".to_string(),
            Self::Add(a, b) => format!("({} + {})", a.render(), b.render()),
            Self::Sub(a, b) => format!("({} - {})", a.render(), b.render()),
            Self::Mul(a, b) => format!("({} * {})", a.render(), b.render()),
            Self::Div(a, b) => format!("({} / {})", a.render(), b.render()),
        }
    }
}

/// Quote a string literal, escaping backslashes, quotes and control characters.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[allow(clippy::cast_possible_truncation)]
fn render_number(n: f64) -> String {
    // Integral values stay integral on the wire (`3`, not `3.0`)
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
