//! Template errors
//!
//! Every failure is a template-authoring mistake, so each error carries the
//! offending expression, the template text and a view of the parameters.

use thiserror::Error;

/// Result type alias for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Broad grouping of error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed template or IF grammar, detected before evaluation where possible
    Structural,
    /// A dotted path could not be followed
    Resolution,
    /// A resolved value is not acceptable for the placeholder
    ValuePolicy,
    /// An IF comparison could not be evaluated
    Comparison,
}

/// What went wrong
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("comment starting at line {line}, column {column} is not closed with */")]
    UnterminatedComment { line: usize, column: usize },

    #[error("/*{directive}*/ at line {line}, column {column} has no matching /*END*/")]
    UnclosedBlock {
        directive: String,
        line: usize,
        column: usize,
    },

    #[error("unexpected /*{directive}*/ at line {line}, column {column}")]
    UnexpectedDirective {
        directive: String,
        line: usize,
        column: usize,
    },

    #[error("malformed directive at line {line}, column {column}: {reason}")]
    MalformedDirective {
        reason: String,
        line: usize,
        column: usize,
    },

    #[error("the loop variable #current can only be used inside a FOR block")]
    LoopVariableOutsideLoop,

    #[error("the IF expression is empty")]
    EmptyExpression,

    #[error("parentheses are not supported in IF expressions, use a boolean property instead")]
    ParenthesisNotSupported,

    #[error("'&&' and '||' cannot be mixed in one IF expression")]
    MixedConnectors,

    #[error("use '==' instead of '=' in IF expressions")]
    SingleEquals,

    #[error("use '!=' instead of '<>' in IF expressions")]
    LessGreaterOperator,

    #[error("double-quoted literals are not supported, use single quotes")]
    DoubleQuote,

    #[error("unterminated literal: {literal}")]
    UnterminatedLiteral { literal: String },

    #[error("a clause of the IF expression has an empty term")]
    EmptyTerm,

    #[error("invalid term in IF expression: {term}")]
    InvalidTerm { term: String },

    #[error("invalid date literal: {literal}")]
    InvalidDateLiteral { literal: String },

    #[error("argument '{name}' was not found in the parameters")]
    ArgumentNotFound { name: String },

    #[error("'{path}' is null, cannot read '{segment}'")]
    NullIntermediate { path: String, segment: String },

    #[error("{type_name} has no property '{property}'")]
    PropertyNotFound { type_name: String, property: String },

    #[error("{type_name} has no method '{method}()'")]
    MethodNotFound { type_name: String, method: String },

    #[error("index {index} is out of range for a list of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("list index must be a non-negative number: get({raw})")]
    NonNumericIndex { raw: String },

    #[error("{type_name} cannot be indexed with get(N)")]
    NotIndexable { type_name: String },

    #[error("the value is null and null parameters are blocked")]
    NullBlocked,

    #[error("the list value for an IN-scope placeholder is null")]
    ListValueNull,

    #[error("the list value for an IN-scope placeholder is empty")]
    EmptyList,

    #[error("the list value for an IN-scope placeholder contains only nulls")]
    NullOnlyList,

    #[error("a scalar placeholder cannot take a {type_name} value, use a parenthesized test value")]
    ScalarExpected { type_name: String },

    #[error("a parenthesized placeholder needs a list value, got {type_name}")]
    ListExpected { type_name: String },

    #[error("the FOR source must be a list, got {type_name}")]
    ForSourceNotList { type_name: String },

    #[error("embedded value contains the bind symbol '?': {value}")]
    BindSymbolInEmbedded { value: String },

    #[error("dynamic embedding is nested deeper than {max} levels")]
    DynamicDepthExceeded { max: usize },

    #[error("cannot compare {left} with {right}")]
    TypeMismatch { left: String, right: String },

    #[error("'{operator}' is not supported between {left} and {right}")]
    UnsupportedComparison {
        operator: String,
        left: String,
        right: String,
    },

    #[error("a standalone IF clause must be boolean, got {type_name}")]
    NotBoolean { type_name: String },
}

impl ErrorKind {
    /// The group this kind belongs to
    pub fn category(&self) -> ErrorCategory {
        use ErrorKind::*;
        match self {
            UnterminatedComment { .. }
            | UnclosedBlock { .. }
            | UnexpectedDirective { .. }
            | MalformedDirective { .. }
            | LoopVariableOutsideLoop
            | EmptyExpression
            | ParenthesisNotSupported
            | MixedConnectors
            | SingleEquals
            | LessGreaterOperator
            | DoubleQuote
            | UnterminatedLiteral { .. }
            | EmptyTerm
            | InvalidTerm { .. }
            | InvalidDateLiteral { .. } => ErrorCategory::Structural,
            ArgumentNotFound { .. }
            | NullIntermediate { .. }
            | PropertyNotFound { .. }
            | MethodNotFound { .. }
            | IndexOutOfRange { .. }
            | NonNumericIndex { .. }
            | NotIndexable { .. } => ErrorCategory::Resolution,
            NullBlocked
            | ListValueNull
            | EmptyList
            | NullOnlyList
            | ScalarExpected { .. }
            | ListExpected { .. }
            | ForSourceNotList { .. }
            | BindSymbolInEmbedded { .. }
            | DynamicDepthExceeded { .. } => ErrorCategory::ValuePolicy,
            TypeMismatch { .. } | UnsupportedComparison { .. } | NotBoolean { .. } => {
                ErrorCategory::Comparison
            }
        }
    }
}

/// Error raised while compiling or evaluating a template
#[derive(Debug, Error, Clone, PartialEq)]
#[error(
    "{kind}\n  expression: {expression}{}\n  template: {template}\n  parameters: {parameters}",
    clause_line(.clause)
)]
pub struct TemplateError {
    /// What went wrong
    pub kind: ErrorKind,
    /// The directive or path being processed
    pub expression: String,
    /// The sub-clause of an IF expression, when one is at fault
    pub clause: Option<String>,
    /// The template source
    pub template: String,
    /// Display of the parameters the template was evaluated against
    pub parameters: String,
}

fn clause_line(clause: &Option<String>) -> String {
    clause
        .as_ref()
        .map(|c| format!("\n  clause: {c}"))
        .unwrap_or_default()
}

impl TemplateError {
    /// Error found while parsing, before any parameters were involved
    pub fn structural(kind: ErrorKind, expression: impl Into<String>, template: &str) -> Self {
        Self {
            kind,
            expression: expression.into(),
            clause: None,
            template: template.to_string(),
            parameters: "(not evaluated)".to_string(),
        }
    }

    /// Attach the offending sub-clause
    pub fn with_clause(mut self, clause: impl Into<String>) -> Self {
        self.clause = Some(clause.into());
        self
    }

    /// Shorthand for `self.kind.category()`
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = TemplateError {
            kind: ErrorKind::NotBoolean {
                type_name: "string".into(),
            },
            expression: "pmb.name && pmb.flag".into(),
            clause: Some("pmb.name".into()),
            template: "/*IF pmb.name && pmb.flag*/X/*END*/".into(),
            parameters: "pmb={name: \"a\"}".into(),
        };

        let text = err.to_string();
        assert!(text.starts_with("a standalone IF clause must be boolean, got string"));
        assert!(text.contains("expression: pmb.name && pmb.flag"));
        assert!(text.contains("clause: pmb.name"));
        assert!(text.contains("template: /*IF pmb.name && pmb.flag*/X/*END*/"));
        assert!(text.contains("parameters: pmb={name: \"a\"}"));
    }

    #[test]
    fn test_structural_error_has_no_parameters() {
        let err = TemplateError::structural(ErrorKind::MixedConnectors, "a && b || c", "x");
        assert_eq!(err.category(), ErrorCategory::Structural);
        assert_eq!(err.parameters, "(not evaluated)");
        assert!(!err.to_string().contains("clause:"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            ErrorKind::ArgumentNotFound { name: "pmb".into() }.category(),
            ErrorCategory::Resolution
        );
        assert_eq!(ErrorKind::EmptyList.category(), ErrorCategory::ValuePolicy);
        assert_eq!(
            ErrorKind::TypeMismatch {
                left: "decimal".into(),
                right: "string".into()
            }
            .category(),
            ErrorCategory::Comparison
        );
    }
}
