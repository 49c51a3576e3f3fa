//! IF comment expressions
//!
//! ```text
//! expression := clause (&& clause)*  |  clause (|| clause)*
//! clause     := term (operator term)?  |  ['!'] term
//! operator   := == | != | > | < | >= | <=
//! ```
//!
//! The grammar is checked when the template is parsed. Terms are resolved
//! lazily at evaluation time and connectors short-circuit.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use twoway_core::Value;

use crate::context::CommandContext;
use crate::error::{ErrorKind, Result};
use crate::loop_info::LoopInfo;
use crate::resolver::PropertyPath;

static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid regex"));

static DATE_LITERAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^date\s+'(.*)'$").expect("valid regex"));

static METHOD_CALL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\)|get\([^()]*\)").expect("valid regex"));

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Comparison operator between two terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Operator {
    /// Two-character operators first so `>=` is not read as `>`
    const ALL: [(&'static str, Operator); 6] = [
        ("==", Operator::Eq),
        ("!=", Operator::Ne),
        (">=", Operator::Ge),
        ("<=", Operator::Le),
        (">", Operator::Gt),
        ("<", Operator::Lt),
    ];

    fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering.is_eq(),
            Operator::Ne => ordering.is_ne(),
            Operator::Ge => ordering.is_ge(),
            Operator::Le => ordering.is_le(),
            Operator::Gt => ordering.is_gt(),
            Operator::Lt => ordering.is_lt(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

/// One side of a clause
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Null,
    Bool(bool),
    String(String),
    Date(NaiveDateTime),
    Number(Decimal),
    Path(PropertyPath),
}

impl Term {
    fn parse(source: &str) -> std::result::Result<Self, ErrorKind> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ErrorKind::EmptyTerm);
        }
        match source.to_ascii_lowercase().as_str() {
            "null" => return Ok(Term::Null),
            "true" => return Ok(Term::Bool(true)),
            "false" => return Ok(Term::Bool(false)),
            _ => {}
        }
        if source.starts_with('\'') {
            if source.len() < 2 || !source.ends_with('\'') {
                return Err(ErrorKind::UnterminatedLiteral {
                    literal: source.to_string(),
                });
            }
            return Ok(Term::String(source[1..source.len() - 1].replace("''", "'")));
        }
        if let Some(captures) = DATE_LITERAL_REGEX.captures(source) {
            let literal = captures.get(1).map_or("", |m| m.as_str());
            return parse_date_literal(literal).map(Term::Date);
        }
        if NUMBER_REGEX.is_match(source) {
            return Decimal::from_str(source)
                .map(Term::Number)
                .map_err(|_| ErrorKind::InvalidTerm {
                    term: source.to_string(),
                });
        }
        PropertyPath::parse(source)
            .map(Term::Path)
            .map_err(|_| ErrorKind::InvalidTerm {
                term: source.to_string(),
            })
    }

    fn evaluate(
        &self,
        expression: &str,
        ctx: &CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<Value> {
        Ok(match self {
            Term::Null => Value::Null,
            Term::Bool(b) => Value::Bool(*b),
            Term::String(s) => Value::String(s.clone()),
            Term::Date(dt) => Value::DateTime(*dt),
            Term::Number(n) => Value::Decimal(*n),
            Term::Path(path) => path.resolve(expression, ctx, loop_info)?.target_value,
        })
    }
}

fn parse_date_literal(literal: &str) -> std::result::Result<NaiveDateTime, ErrorKind> {
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(literal, format) {
            return Ok(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Some(dt) = NaiveDate::parse_from_str(literal, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(dt);
        }
    }
    Err(ErrorKind::InvalidDateLiteral {
        literal: literal.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq)]
enum ClauseKind {
    Comparison {
        left: Term,
        operator: Operator,
        right: Term,
    },
    Standalone {
        negated: bool,
        term: Term,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    source: String,
    kind: ClauseKind,
}

impl Clause {
    fn parse(source: &str, masked: &str) -> std::result::Result<Self, ErrorKind> {
        let kind = match find_operator(masked) {
            Some((at, operator)) => ClauseKind::Comparison {
                left: Term::parse(&source[..at])?,
                operator,
                right: Term::parse(&source[at + operator.symbol().len()..])?,
            },
            None => {
                let trimmed = source.trim();
                let (negated, term) = match trimmed.strip_prefix('!') {
                    Some(rest) => (true, rest),
                    None => (false, trimmed),
                };
                ClauseKind::Standalone {
                    negated,
                    term: Term::parse(term)?,
                }
            }
        };
        Ok(Self {
            source: source.trim().to_string(),
            kind,
        })
    }

    fn evaluate(
        &self,
        expression: &str,
        ctx: &CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<bool> {
        self.decide(expression, ctx, loop_info)
            .map_err(|err| err.with_clause(&self.source))
    }

    fn decide(
        &self,
        expression: &str,
        ctx: &CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<bool> {
        match &self.kind {
            ClauseKind::Comparison {
                left,
                operator,
                right,
            } => {
                let left = left.evaluate(expression, ctx, loop_info)?;
                let right = right.evaluate(expression, ctx, loop_info)?;
                compare(*operator, &left, &right).map_err(|kind| ctx.error(kind, expression))
            }
            ClauseKind::Standalone { negated, term } => {
                match term.evaluate(expression, ctx, loop_info)? {
                    Value::Bool(b) => Ok(b != *negated),
                    other => Err(ctx.error(
                        ErrorKind::NotBoolean {
                            type_name: type_label(&other),
                        },
                        expression,
                    )),
                }
            }
        }
    }

    fn uses_loop_variable(&self) -> bool {
        let uses = |term: &Term| matches!(term, Term::Path(path) if path.uses_loop_variable());
        match &self.kind {
            ClauseKind::Comparison { left, right, .. } => uses(left) || uses(right),
            ClauseKind::Standalone { term, .. } => uses(term),
        }
    }

    fn argument_names(&self) -> Vec<&str> {
        let terms: Vec<&Term> = match &self.kind {
            ClauseKind::Comparison { left, right, .. } => vec![left, right],
            ClauseKind::Standalone { term, .. } => vec![term],
        };
        terms
            .into_iter()
            .filter_map(|term| match term {
                Term::Path(path) => path.argument_name(),
                _ => None,
            })
            .collect()
    }
}

/// A parsed IF expression
#[derive(Debug, Clone, PartialEq)]
pub struct IfCommentExpression {
    expression: String,
    connector: Connector,
    clauses: Vec<Clause>,
}

impl IfCommentExpression {
    /// Validate and parse the text after `IF`
    pub fn parse(expression: &str) -> std::result::Result<Self, ErrorKind> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(ErrorKind::EmptyExpression);
        }
        let masked = mask_literals(expression)?;
        validate(&masked)?;

        let connector = if masked.contains("||") {
            Connector::Or
        } else {
            Connector::And
        };
        let separator = match connector {
            Connector::And => "&&",
            Connector::Or => "||",
        };

        let mut clauses = Vec::new();
        let mut start = 0;
        for (at, _) in masked.match_indices(separator) {
            clauses.push(Clause::parse(&expression[start..at], &masked[start..at])?);
            start = at + separator.len();
        }
        clauses.push(Clause::parse(&expression[start..], &masked[start..])?);

        Ok(Self {
            expression: expression.to_string(),
            connector,
            clauses,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether any clause refers to the loop variable
    pub fn uses_loop_variable(&self) -> bool {
        self.clauses.iter().any(Clause::uses_loop_variable)
    }

    /// Root argument names referenced by the clauses
    pub fn argument_names(&self) -> Vec<&str> {
        self.clauses
            .iter()
            .flat_map(Clause::argument_names)
            .collect()
    }

    /// Evaluate the expression, stopping at the first clause that decides it
    pub fn evaluate(
        &self,
        ctx: &CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<bool> {
        for clause in &self.clauses {
            let result = clause.evaluate(&self.expression, ctx, loop_info)?;
            tracing::trace!(clause = %clause.source, result, "evaluated IF clause");
            match (self.connector, result) {
                (Connector::And, false) => return Ok(false),
                (Connector::Or, true) => return Ok(true),
                _ => {}
            }
        }
        Ok(self.connector == Connector::And)
    }
}

/// Replace the contents of single-quoted literals so operators inside them
/// are ignored. Byte offsets are preserved.
fn mask_literals(expression: &str) -> std::result::Result<String, ErrorKind> {
    let mut masked = String::with_capacity(expression.len());
    let mut chars = expression.char_indices().peekable();
    let mut literal_start = None;

    while let Some((at, ch)) = chars.next() {
        match (literal_start, ch) {
            (None, '\'') => {
                literal_start = Some(at);
                masked.push(ch);
            }
            (Some(_), '\'') => {
                if chars.peek().is_some_and(|&(_, next)| next == '\'') {
                    chars.next();
                    masked.push_str("__");
                } else {
                    literal_start = None;
                    masked.push(ch);
                }
            }
            (Some(_), _) => masked.extend(std::iter::repeat_n('_', ch.len_utf8())),
            (None, _) => masked.push(ch),
        }
    }

    if let Some(start) = literal_start {
        return Err(ErrorKind::UnterminatedLiteral {
            literal: expression[start..].to_string(),
        });
    }
    Ok(masked)
}

fn validate(masked: &str) -> std::result::Result<(), ErrorKind> {
    if masked.contains('"') {
        return Err(ErrorKind::DoubleQuote);
    }
    let without_calls = METHOD_CALL_REGEX.replace_all(masked, "");
    if without_calls.contains(['(', ')']) {
        return Err(ErrorKind::ParenthesisNotSupported);
    }
    if masked.contains("&&") && masked.contains("||") {
        return Err(ErrorKind::MixedConnectors);
    }
    if masked.contains("<>") {
        return Err(ErrorKind::LessGreaterOperator);
    }

    let bytes = masked.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i + 1).copied();
        let paired = matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) || next == Some(b'=');
        if !paired {
            return Err(ErrorKind::SingleEquals);
        }
    }
    Ok(())
}

fn find_operator(masked: &str) -> Option<(usize, Operator)> {
    (0..masked.len()).find_map(|at| {
        let rest = masked.get(at..)?;
        Operator::ALL
            .iter()
            .find(|(symbol, _)| rest.starts_with(symbol))
            .map(|&(_, operator)| (at, operator))
    })
}

fn type_label(value: &Value) -> String {
    if value.is_null() {
        "null".to_string()
    } else {
        value.value_type().name().to_string()
    }
}

/// Compare two resolved terms
pub fn compare(operator: Operator, left: &Value, right: &Value) -> std::result::Result<bool, ErrorKind> {
    let mismatch = |check: fn(&Value) -> bool| {
        (check(left) && !right.is_null() && !check(right))
            || (check(right) && !left.is_null() && !check(left))
    };
    if mismatch(Value::is_number) || mismatch(Value::is_date) {
        return Err(ErrorKind::TypeMismatch {
            left: type_label(left),
            right: type_label(right),
        });
    }

    match operator {
        Operator::Eq => return Ok(equals(left, right)),
        Operator::Ne => return Ok(!equals(left, right)),
        _ => {}
    }

    // null sorts before everything
    let ordering = match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => ordering(left, right).ok_or_else(|| ErrorKind::UnsupportedComparison {
            operator: operator.to_string(),
            left: type_label(left),
            right: type_label(right),
        })?,
    };
    Ok(operator.accepts(ordering))
}

fn equals(left: &Value, right: &Value) -> bool {
    if left.is_number() && right.is_number() {
        if let (Some(l), Some(r)) = (left.to_decimal(), right.to_decimal()) {
            return l == r;
        }
    }
    if left.is_date() && right.is_date() {
        return left.to_datetime() == right.to_datetime();
    }
    left == right
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_number() && right.is_number() {
        return Some(left.to_decimal()?.cmp(&right.to_decimal()?));
    }
    if left.is_date() && right.is_date() {
        return Some(left.to_datetime()?.cmp(&right.to_datetime()?));
    }
    None
}
