//! SCIM filter and path expression parsing and evaluation.
//!
//! Implements the mini-language of RFC 7644 Section 3.4.2 used both for
//! search filters and for patch path targets such as
//! `emails[type eq "work"].value`.
//!
//! # Key Types
//!
//! - [`FilterExpr`] - Parsed filter expression tree
//! - [`PathExpr`] - Parsed patch path, possibly carrying a value filter
//! - [`parse_filter`] / [`parse_path`] - Entry points into the parser
//! - [`evaluate_filter`] - Index selection over a multi-valued attribute
//!
//! # Examples
//!
//! ```rust
//! use scim_patch::filter::{evaluate_filter, parse_filter};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let filter = parse_filter("type eq \"work\"")?;
//! let emails = vec![
//!     json!({"type": "work", "value": "a@example.com"}),
//!     json!({"type": "home", "value": "b@example.com"}),
//! ];
//! assert_eq!(evaluate_filter(&filter, &emails)?, vec![0]);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod eval;
pub mod parser;

// Re-export the main types for convenience
pub use ast::{AttrPath, Compare, CompareOp, FilterExpr, Literal, LogicalOp, PathExpr, PathSegment};
pub use eval::{evaluate_filter, evaluate_filter_with, matches};
pub use parser::{parse_filter, parse_path, MAX_EXPRESSION_DEPTH, MAX_EXPRESSION_LENGTH};
