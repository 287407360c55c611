//! Recursive-descent parser for the SCIM filter and path grammars.
//!
//! Implements the two related grammars of RFC 7644 Section 3.4.2 (filters)
//! and Section 3.5.2 (patch paths):
//!
//! ```text
//! filter   = orExpr
//! orExpr   = andExpr { "or" andExpr }
//! andExpr  = notExpr { "and" notExpr }
//! notExpr  = "not" "(" filter ")" | "(" filter ")" | compare
//! compare  = attrPath ("pr" | compareOp literal)
//! path     = segment { "." segment }
//! segment  = NAME [ "[" filter "]" ]
//! ```
//!
//! Attribute names may carry a schema URI prefix terminated by the final
//! `:` (e.g. `urn:ietf:params:scim:schemas:core:2.0:User:userName`).
//! Keywords are case-insensitive, string literals use double quotes with
//! backslash escapes, and whitespace outside literals is insignificant.
//!
//! Parse failures carry the byte position of the offending token and are
//! classified as `invalidFilter` or `invalidPath` depending on which entry
//! point was used.

use super::ast::{
    AttrPath, Compare, CompareOp, FilterExpr, Literal, LogicalOp, PathExpr, PathSegment,
};
use crate::error::{ScimError, ScimResult};

/// Maximum accepted length of a filter or path expression in bytes.
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Maximum nesting depth of parenthesized or bracketed sub-expressions.
pub const MAX_EXPRESSION_DEPTH: usize = 32;

/// Parse a SCIM filter expression.
///
/// # Examples
///
/// ```
/// use scim_patch::filter::parse_filter;
///
/// let filter = parse_filter("userName eq \"john\"").unwrap();
/// let filter = parse_filter("active eq true and emails pr").unwrap();
/// ```
pub fn parse_filter(input: &str) -> ScimResult<FilterExpr> {
    let mut parser = Parser::new(input).map_err(|e| e.into_filter_error())?;
    let filter = parser
        .parse_expr()
        .and_then(|f| parser.expect_end().map(|_| f))
        .map_err(|e| e.into_filter_error())?;
    Ok(filter)
}

/// Parse a SCIM patch path.
///
/// # Examples
///
/// ```
/// use scim_patch::filter::parse_path;
///
/// let path = parse_path("name.givenName").unwrap();
/// let path = parse_path("emails[type eq \"work\"].value").unwrap();
/// ```
pub fn parse_path(input: &str) -> ScimResult<PathExpr> {
    let mut parser = Parser::new(input).map_err(|e| e.into_path_error(input))?;
    let path = parser
        .parse_path()
        .and_then(|p| parser.expect_end().map(|_| p))
        .map_err(|e| e.into_path_error(input))?;
    Ok(path)
}

struct ParseError {
    message: String,
    position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    fn into_filter_error(self) -> ScimError {
        ScimError::invalid_filter(self.message, Some(self.position))
    }

    fn into_path_error(self, path: &str) -> ScimError {
        ScimError::invalid_path(
            path,
            format!("{} at position {}", self.message, self.position),
        )
    }
}

struct Parser<'a> {
    input: &'a str,
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        if input.len() > MAX_EXPRESSION_LENGTH {
            return Err(ParseError::new(
                format!(
                    "expression exceeds maximum length ({} bytes, max {})",
                    input.len(),
                    MAX_EXPRESSION_LENGTH
                ),
                0,
            ));
        }
        Ok(Self {
            input,
            position: 0,
            depth: 0,
        })
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.position < self.input.len() {
            return Err(ParseError::new(
                format!("unexpected input '{}'", &self.input[self.position..]),
                self.position,
            ));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Filter grammar
    // ---------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<FilterExpr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.try_keyword("or") {
            let right = self.parse_and_expr()?;
            left = FilterExpr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<FilterExpr, ParseError> {
        let mut left = self.parse_not_expr()?;
        while self.try_keyword("and") {
            let right = self.parse_not_expr()?;
            left = FilterExpr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<FilterExpr, ParseError> {
        self.skip_whitespace();

        if self.try_keyword("not") {
            self.skip_whitespace();
            if !self.try_char('(') {
                return Err(ParseError::new("expected '(' after 'not'", self.position));
            }
            let inner = self.parse_nested()?;
            return Ok(FilterExpr::Not(Box::new(inner)));
        }

        if self.try_char('(') {
            let inner = self.parse_nested()?;
            return Ok(FilterExpr::Group(Box::new(inner)));
        }

        self.parse_compare()
    }

    fn parse_nested(&mut self) -> Result<FilterExpr, ParseError> {
        self.enter_scope()?;
        let inner = self.parse_expr()?;
        self.exit_scope();
        self.skip_whitespace();
        if !self.try_char(')') {
            return Err(ParseError::new(
                "expected ')' to close expression",
                self.position,
            ));
        }
        Ok(inner)
    }

    fn parse_compare(&mut self) -> Result<FilterExpr, ParseError> {
        let path = self.parse_attr_path()?;

        self.skip_whitespace();
        let op_start = self.position;
        let op_word = self.take_word();
        let op = CompareOp::from_keyword(op_word)
            .ok_or_else(|| ParseError::new(format!("unknown operator '{}'", op_word), op_start))?;

        if op == CompareOp::Pr {
            return Ok(FilterExpr::Compare(Compare {
                path,
                op,
                literal: None,
            }));
        }

        self.skip_whitespace();
        let literal = self.parse_literal()?;
        Ok(FilterExpr::Compare(Compare {
            path,
            op,
            literal: Some(literal),
        }))
    }

    fn parse_attr_path(&mut self) -> Result<AttrPath, ParseError> {
        self.skip_whitespace();
        let start = self.position;
        let token = self.take_name_token();
        if token.is_empty() {
            return Err(ParseError::new("expected attribute name", start));
        }

        let (uri, local) = split_uri(token);
        let mut names = local.split('.');
        let name = names.next().unwrap_or_default();
        let sub = names.next();
        if names.next().is_some() {
            return Err(ParseError::new(
                format!("attribute path '{}' has too many components", local),
                start,
            ));
        }
        validate_name(name, start)?;
        if let Some(sub) = sub {
            validate_name(sub, start)?;
        }

        Ok(AttrPath {
            uri: uri.map(str::to_string),
            name: name.to_string(),
            sub: sub.map(str::to_string),
        })
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        self.skip_whitespace();

        if self.peek() == Some('"') {
            return self.parse_string_literal();
        }
        if self.try_keyword("true") {
            return Ok(Literal::Boolean(true));
        }
        if self.try_keyword("false") {
            return Ok(Literal::Boolean(false));
        }
        if self.try_keyword("null") {
            return Ok(Literal::Null);
        }
        if self.peek().is_some_and(|c| c.is_ascii_digit() || c == '-') {
            return self.parse_number_literal();
        }

        Err(ParseError::new(
            "expected literal (string, number, boolean, or null)",
            self.position,
        ))
    }

    fn parse_string_literal(&mut self) -> Result<Literal, ParseError> {
        // Caller checked the opening quote.
        self.advance();
        let mut value = String::new();

        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::new("unterminated string literal", self.position));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escape_pos = self.position;
                    match self.peek() {
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some('/') => value.push('/'),
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('b') => value.push('\u{0008}'),
                        Some('f') => value.push('\u{000c}'),
                        Some('u') => {
                            self.advance();
                            let hex = self.take_exact(4).ok_or_else(|| {
                                ParseError::new("incomplete unicode escape", escape_pos)
                            })?;
                            let code = u32::from_str_radix(hex, 16).map_err(|_| {
                                ParseError::new("invalid unicode escape", escape_pos)
                            })?;
                            let c = char::from_u32(code).ok_or_else(|| {
                                ParseError::new("invalid unicode escape", escape_pos)
                            })?;
                            value.push(c);
                            continue;
                        }
                        _ => {
                            return Err(ParseError::new("invalid escape sequence", escape_pos));
                        }
                    }
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(Literal::String(value))
    }

    fn parse_number_literal(&mut self) -> Result<Literal, ParseError> {
        let start = self.position;

        if self.peek() == Some('-') {
            self.advance();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.')
            && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[start..self.position];
        serde_json::from_str::<serde_json::Number>(text)
            .map(Literal::Number)
            .map_err(|_| ParseError::new(format!("invalid number '{}'", text), start))
    }

    // ---------------------------------------------------------------------
    // Path grammar
    // ---------------------------------------------------------------------

    fn parse_path(&mut self) -> Result<PathExpr, ParseError> {
        self.skip_whitespace();
        let start = self.position;
        let token = self.take_name_token();
        if token.is_empty() {
            return Err(ParseError::new("expected attribute path", start));
        }

        let (uri, local) = split_uri(token);
        let mut segments = Vec::new();
        self.push_segments(local, start, &mut segments)?;
        self.maybe_attach_filter(&mut segments)?;

        while self.try_char('.') {
            let seg_start = self.position;
            let token = self.take_name_token();
            if token.is_empty() {
                return Err(ParseError::new("expected attribute name after '.'", seg_start));
            }
            if token.contains(':') {
                return Err(ParseError::new(
                    "schema URI prefix is only allowed on the first segment",
                    seg_start,
                ));
            }
            self.push_segments(token, seg_start, &mut segments)?;
            self.maybe_attach_filter(&mut segments)?;
        }

        Ok(PathExpr {
            uri: uri.map(str::to_string),
            segments,
        })
    }

    fn push_segments(
        &mut self,
        dotted: &str,
        start: usize,
        segments: &mut Vec<PathSegment>,
    ) -> Result<(), ParseError> {
        for name in dotted.split('.') {
            validate_name(name, start)?;
            segments.push(PathSegment::plain(name));
        }
        Ok(())
    }

    /// Attach a bracketed value filter to the most recent segment.
    fn maybe_attach_filter(&mut self, segments: &mut Vec<PathSegment>) -> Result<(), ParseError> {
        if !self.try_char('[') {
            return Ok(());
        }
        self.enter_scope()?;
        let filter = self.parse_expr()?;
        self.exit_scope();
        self.skip_whitespace();
        if !self.try_char(']') {
            return Err(ParseError::new(
                "expected ']' to close value filter",
                self.position,
            ));
        }
        // take_name_token guarantees at least one segment exists here
        segments
            .last_mut()
            .expect("filter must follow a path segment")
            .filter = Some(filter);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lexical helpers
    // ---------------------------------------------------------------------

    fn enter_scope(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(ParseError::new(
                format!("expression exceeds maximum nesting depth ({})", MAX_EXPRESSION_DEPTH),
                self.position,
            ));
        }
        Ok(())
    }

    fn exit_scope(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input[self.position..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.position += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn try_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn try_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let remaining = &self.input[self.position..];
        if remaining.len() >= keyword.len()
            && remaining[..keyword.len()].eq_ignore_ascii_case(keyword)
        {
            // The keyword must not be a prefix of a longer identifier.
            let after = remaining[keyword.len()..].chars().next();
            if after.is_none_or(|c| !is_name_char(c)) {
                self.position += keyword.len();
                return true;
            }
        }
        false
    }

    /// Consume a run of plain identifier characters.
    fn take_word(&mut self) -> &'a str {
        let start = self.position;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.advance();
        }
        &self.input[start..self.position]
    }

    /// Consume a run of attribute-path characters (including `:` for URI
    /// prefixes and `.` for dotted names).
    fn take_name_token(&mut self) -> &'a str {
        let start = self.position;
        while self.peek().is_some_and(|c| is_name_char(c) || c == ':' || c == '.') {
            self.advance();
        }
        &self.input[start..self.position]
    }

    fn take_exact(&mut self, count: usize) -> Option<&'a str> {
        let start = self.position;
        for _ in 0..count {
            self.peek()?;
            self.advance();
        }
        Some(&self.input[start..self.position])
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '$'
}

/// Split a raw name token into an optional schema URI prefix and the local
/// dotted name, cutting at the final `:`.
fn split_uri(token: &str) -> (Option<&str>, &str) {
    match token.rfind(':') {
        Some(idx) => (Some(&token[..idx]), &token[idx + 1..]),
        None => (None, token),
    }
}

fn validate_name(name: &str, position: usize) -> Result<(), ParseError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '$' || first == '_')
                && chars.all(is_name_char)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ParseError::new(
            format!("invalid attribute name '{}'", name),
            position,
        ))
    }
}
