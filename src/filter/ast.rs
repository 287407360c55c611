//! AST types for the SCIM filter and path grammars.
//!
//! The node kinds are closed and small, so both grammars are modelled as
//! plain sum types with exhaustive matching. Every node carries a canonical
//! `Display` rendering: printing an AST and re-parsing the output yields an
//! equal AST.

use std::fmt;
use std::fmt::Write as _;

/// A parsed SCIM filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Attribute comparison, including the valueless `pr` form
    Compare(Compare),
    /// `and` / `or` combination of two filters
    Logical {
        op: LogicalOp,
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },
    /// `not (…)`
    Not(Box<FilterExpr>),
    /// Parenthesized sub-expression, kept so printing round-trips
    Group(Box<FilterExpr>),
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Compare(cmp) => write!(f, "{}", cmp),
            FilterExpr::Logical { op, left, right } => write!(f, "{} {} {}", left, op, right),
            FilterExpr::Not(inner) => write!(f, "not ({})", inner),
            FilterExpr::Group(inner) => write!(f, "({})", inner),
        }
    }
}

/// A single comparison, e.g. `type eq "work"` or `value pr`.
#[derive(Debug, Clone, PartialEq)]
pub struct Compare {
    pub path: AttrPath,
    pub op: CompareOp,
    /// Absent exactly for the `pr` operator
    pub literal: Option<Literal>,
}

impl fmt::Display for Compare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.op)?;
        if let Some(literal) = &self.literal {
            write!(f, " {}", literal)?;
        }
        Ok(())
    }
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        })
    }
}

/// Comparison operators per RFC 7644 Section 3.4.2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Present (has a non-empty value); takes no literal
    Pr,
}

impl CompareOp {
    pub(crate) fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "co" => Some(CompareOp::Co),
            "sw" => Some(CompareOp::Sw),
            "ew" => Some(CompareOp::Ew),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            "pr" => Some(CompareOp::Pr),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Co => "co",
            CompareOp::Sw => "sw",
            CompareOp::Ew => "ew",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Pr => "pr",
        })
    }
}

/// Comparison literals: JSON tokens, typed against the target attribute at
/// evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(serde_json::Number),
    Boolean(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
                        c => f.write_char(c)?,
                    }
                }
                f.write_str("\"")
            }
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => f.write_str("null"),
        }
    }
}

/// The attribute operand of a comparison: `[uri:]name[.sub]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrPath {
    /// Schema URI prefix, when the name was fully qualified
    pub uri: Option<String>,
    /// Base attribute name
    pub name: String,
    /// Sub-attribute name
    pub sub: Option<String>,
}

impl AttrPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uri: None,
            name: name.into(),
            sub: None,
        }
    }

    pub fn with_sub(name: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            uri: None,
            name: name.into(),
            sub: Some(sub.into()),
        }
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uri) = &self.uri {
            write!(f, "{}:", uri)?;
        }
        f.write_str(&self.name)?;
        if let Some(sub) = &self.sub {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}

/// A parsed patch path: an optional schema URI prefix followed by dotted
/// segments, each optionally carrying a bracketed value filter.
///
/// The trailing sub-attribute of the grammar is simply the last segment
/// without a filter; semantic constraints (which segments may carry filters,
/// how deep a path may go) are enforced during resolution against the
/// schema registry, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    /// Schema URI prefix applying to the first segment
    pub uri: Option<String>,
    pub segments: Vec<PathSegment>,
}

impl PathExpr {
    /// The segment carrying a value filter, if any.
    pub fn filtered_segment(&self) -> Option<(usize, &PathSegment)> {
        self.segments
            .iter()
            .enumerate()
            .find(|(_, seg)| seg.filter.is_some())
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uri) = &self.uri {
            write!(f, "{}:", uri)?;
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// One dotted component of a [`PathExpr`].
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub name: String,
    pub filter: Option<FilterExpr>,
}

impl PathSegment {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(filter) = &self.filter {
            write!(f, "[{}]", filter)?;
        }
        Ok(())
    }
}
