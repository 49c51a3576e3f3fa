//! Directive parser
//!
//! Builds the node tree from template text. Block directives (IF, FOR,
//! BEGIN, FIRST, LAST) parse their bodies recursively up to the matching
//! `/*END*/`. Every structural problem is reported here, before evaluation.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{ErrorKind, Result, TemplateError};
use crate::if_comment::IfCommentExpression;
use crate::like_search::VariableOptions;
use crate::node::Node;
use crate::resolver::PropertyPath;
use crate::tokenizer::{PositionedToken, SqlTokenizer, TestValueExtent, Token};
use crate::variable::{EmbeddedMode, VariableNode};

static CONNECTOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(and|or)\s+").expect("valid regex"));

/// A comment body, classified
#[derive(Debug, Clone, PartialEq)]
enum Directive<'a> {
    If(&'a str),
    Else,
    End,
    For(&'a str),
    Begin,
    First,
    Last,
    Next(&'a str),
    Bind(&'a str),
    Embedded(EmbeddedMode, &'a str),
    /// An ordinary SQL comment or hint, kept as text
    Plain,
}

impl<'a> Directive<'a> {
    fn classify(body: &'a str) -> Self {
        match body.trim() {
            "ELSE" => return Directive::Else,
            "END" => return Directive::End,
            "BEGIN" => return Directive::Begin,
            "FIRST" => return Directive::First,
            "LAST" => return Directive::Last,
            _ => {}
        }
        if let Some(expression) = body.strip_prefix("IF ") {
            Directive::If(expression)
        } else if let Some(expression) = body.strip_prefix("FOR ") {
            Directive::For(expression)
        } else if let Some(text) = body.strip_prefix("NEXT ") {
            Directive::Next(text)
        } else if let Some(expression) = body.strip_prefix("$$") {
            Directive::Embedded(EmbeddedMode::ReplaceOnly, expression)
        } else if let Some(expression) = body.strip_prefix("$.") {
            Directive::Embedded(EmbeddedMode::TerminalDot, expression)
        } else if let Some(expression) = body.strip_prefix('$') {
            Directive::Embedded(EmbeddedMode::Normal, expression)
        } else if body.starts_with(|c: char| c.is_alphabetic() || c == '_' || c == '#') {
            Directive::Bind(body)
        } else {
            Directive::Plain
        }
    }
}

/// How a node sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Eof,
    End,
    Else,
}

/// The directive whose body is being parsed
struct OpenBlock<'a> {
    directive: &'a str,
    line: usize,
    column: usize,
    allow_else: bool,
}

/// Parser for one template source
pub struct TemplateParser<'a> {
    source: &'a str,
    tokenizer: SqlTokenizer<'a>,
    loop_depth: usize,
}

impl<'a> TemplateParser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokenizer: SqlTokenizer::new(source),
            loop_depth: 0,
        }
    }

    /// Treat the source as appearing inside a FOR body
    pub fn in_loop(mut self, in_loop: bool) -> Self {
        self.loop_depth = usize::from(in_loop);
        self
    }

    /// Parse the whole source into nodes
    pub fn parse(mut self) -> Result<Vec<Node>> {
        let (nodes, _) = self.parse_sequence(None)?;
        Ok(nodes)
    }

    fn structural(&self, kind: ErrorKind, expression: &str) -> TemplateError {
        TemplateError::structural(kind, expression, self.source)
    }

    fn malformed(&self, reason: String, body: &str, token: &PositionedToken) -> TemplateError {
        self.structural(
            ErrorKind::MalformedDirective {
                reason,
                line: token.line,
                column: token.column,
            },
            body,
        )
    }

    fn parse_sequence(&mut self, block: Option<&OpenBlock<'_>>) -> Result<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();
        loop {
            let token = self
                .tokenizer
                .next_token()
                .map_err(|kind| self.structural(kind, ""))?;
            let body = match &token.token {
                Token::Eof => {
                    if let Some(block) = block {
                        return Err(self.structural(
                            ErrorKind::UnclosedBlock {
                                directive: block.directive.to_string(),
                                line: block.line,
                                column: block.column,
                            },
                            block.directive,
                        ));
                    }
                    return Ok((nodes, Terminator::Eof));
                }
                Token::Text(text) => {
                    nodes.push(Node::Text(text.clone()));
                    continue;
                }
                Token::Comment(body) => body.clone(),
            };

            match Directive::classify(&body) {
                Directive::End if block.is_some() => return Ok((nodes, Terminator::End)),
                Directive::Else if block.is_some_and(|b| b.allow_else) => {
                    return Ok((nodes, Terminator::Else));
                }
                Directive::End | Directive::Else => {
                    return Err(self.structural(
                        ErrorKind::UnexpectedDirective {
                            directive: body.trim().to_string(),
                            line: token.line,
                            column: token.column,
                        },
                        &body,
                    ));
                }
                Directive::If(expression) => nodes.push(self.parse_if(expression, &body, &token)?),
                Directive::For(expression) => nodes.push(self.parse_for(expression, &body, &token)?),
                Directive::Begin => {
                    let children = self.parse_block(&body, &token)?;
                    nodes.push(Node::Begin(children));
                }
                Directive::First | Directive::Last | Directive::Next(_) if self.loop_depth == 0 => {
                    return Err(self.structural(
                        ErrorKind::UnexpectedDirective {
                            directive: body.trim().to_string(),
                            line: token.line,
                            column: token.column,
                        },
                        &body,
                    ));
                }
                Directive::First => nodes.push(Node::LoopFirst(self.parse_block(&body, &token)?)),
                Directive::Last => nodes.push(Node::LoopLast(self.parse_block(&body, &token)?)),
                Directive::Next(text) => {
                    let text = parse_quoted(text)
                        .ok_or_else(|| self.malformed("NEXT needs a quoted text".into(), &body, &token))?;
                    nodes.push(Node::LoopNext(text));
                }
                Directive::Bind(expression) => {
                    let variable = self.parse_variable(expression, TestValueExtent::Full, &body, &token)?;
                    tracing::trace!(expression = %variable.expression, test_value = %variable.test_value, "parsed bind variable");
                    nodes.push(Node::BindVariable(variable));
                }
                Directive::Embedded(mode, expression) => {
                    let extent = match mode {
                        EmbeddedMode::Normal => Some(TestValueExtent::Full),
                        EmbeddedMode::TerminalDot => Some(TestValueExtent::UntilDot),
                        EmbeddedMode::ReplaceOnly => None,
                    };
                    let variable = match extent {
                        Some(extent) => self.parse_variable(expression, extent, &body, &token)?,
                        None => self.parse_variable_without_test_value(expression, &body, &token)?,
                    };
                    nodes.push(Node::EmbeddedVariable { variable, mode });
                }
                Directive::Plain => nodes.push(Node::Text(format!("/*{body}*/"))),
            }
        }
    }

    /// Parse a body that must end with `/*END*/`
    fn parse_block(&mut self, body: &str, token: &PositionedToken) -> Result<Vec<Node>> {
        let block = OpenBlock {
            directive: body.trim(),
            line: token.line,
            column: token.column,
            allow_else: false,
        };
        let (children, _) = self.parse_sequence(Some(&block))?;
        Ok(children)
    }

    fn parse_if(&mut self, expression: &str, body: &str, token: &PositionedToken) -> Result<Node> {
        let condition = IfCommentExpression::parse(expression)
            .map_err(|kind| self.structural(kind, expression.trim()))?;
        if self.loop_depth == 0 && condition.uses_loop_variable() {
            return Err(self.structural(ErrorKind::LoopVariableOutsideLoop, expression.trim()));
        }

        let block = OpenBlock {
            directive: body.trim(),
            line: token.line,
            column: token.column,
            allow_else: true,
        };
        let (children, terminator) = self.parse_sequence(Some(&block))?;
        let else_children = if terminator == Terminator::Else {
            let else_block = OpenBlock {
                allow_else: false,
                ..block
            };
            let (children, _) = self.parse_sequence(Some(&else_block))?;
            Some(adjust_connector(children))
        } else {
            None
        };

        Ok(Node::If {
            condition,
            children: adjust_connector(children),
            else_children,
        })
    }

    fn parse_for(&mut self, expression: &str, body: &str, token: &PositionedToken) -> Result<Node> {
        let (path, options) = self.parse_path(expression, body, token)?;
        if options.not_like {
            return Err(self.malformed("notLike cannot be used on a FOR source".into(), body, token));
        }

        self.loop_depth += 1;
        let children = self.parse_block(body, token);
        self.loop_depth -= 1;

        Ok(Node::For {
            expression: expression.trim().to_string(),
            path,
            options,
            children: children?,
        })
    }

    fn parse_path(
        &self,
        expression: &str,
        body: &str,
        token: &PositionedToken,
    ) -> Result<(PropertyPath, VariableOptions)> {
        let (path, options) =
            VariableOptions::split(expression).map_err(|reason| self.malformed(reason, body, token))?;
        let path = PropertyPath::parse(path).map_err(|reason| self.malformed(reason, body, token))?;

        if self.loop_depth == 0 {
            if path.uses_loop_variable() {
                return Err(self.structural(ErrorKind::LoopVariableOutsideLoop, expression.trim()));
            }
            if options.not_like {
                return Err(self.malformed(
                    "notLike can only be used inside a FOR block".into(),
                    body,
                    token,
                ));
            }
        }
        Ok((path, options))
    }

    fn parse_variable(
        &mut self,
        expression: &str,
        extent: TestValueExtent,
        body: &str,
        token: &PositionedToken,
    ) -> Result<VariableNode> {
        let mut variable = self.parse_variable_without_test_value(expression, body, token)?;
        variable.test_value = self.tokenizer.skip_test_value(extent);
        Ok(variable)
    }

    fn parse_variable_without_test_value(
        &self,
        expression: &str,
        body: &str,
        token: &PositionedToken,
    ) -> Result<VariableNode> {
        let (path, options) = self.parse_path(expression, body, token)?;
        Ok(VariableNode {
            expression: expression.trim().to_string(),
            path,
            options,
            test_value: String::new(),
        })
    }
}

/// Split a leading `AND`/`OR` off the first text of an IF body
fn adjust_connector(mut children: Vec<Node>) -> Vec<Node> {
    if let Some(Node::Text(text)) = children.first() {
        if let Some(found) = CONNECTOR_REGEX.find(text) {
            let connector = text[..found.end()].to_string();
            let rest = text[found.end()..].to_string();
            children[0] = Node::Connector { connector, rest };
        }
    }
    children
}

/// `'text'` with `''` escapes
fn parse_quoted(text: &str) -> Option<String> {
    let inner = text.trim().strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::like_search::LikeSearchOption;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(source: &str) -> Result<Vec<Node>> {
        TemplateParser::new(source).parse()
    }

    #[test]
    fn test_bind_variable_captures_test_value() {
        let nodes = parse("where ID = /*pmb.id*/3 and NAME in /*pmb.names*/('a', 'b')").unwrap();
        let test_values: Vec<&str> = nodes
            .iter()
            .filter_map(|node| match node {
                Node::BindVariable(v) => Some(v.test_value.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(test_values, vec!["3", "('a', 'b')"]);
        assert_eq!(nodes.last(), Some(&Node::BindVariable(VariableNode {
            expression: "pmb.names".into(),
            path: PropertyPath::parse("pmb.names").unwrap(),
            options: VariableOptions::default(),
            test_value: "('a', 'b')".into(),
        })));
    }

    #[rstest]
    #[case("/*$pmb.col*/ID", EmbeddedMode::Normal, "ID", "")]
    #[case("/*$$pmb.schema*/MEMBER", EmbeddedMode::ReplaceOnly, "", "MEMBER")]
    #[case("/*$.pmb.schema*/dbo.MEMBER", EmbeddedMode::TerminalDot, "dbo", ".MEMBER")]
    fn test_embedded_modes(
        #[case] source: &str,
        #[case] expected_mode: EmbeddedMode,
        #[case] test_value: &str,
        #[case] trailing: &str,
    ) {
        let nodes = parse(source).unwrap();
        let Node::EmbeddedVariable { variable, mode } = &nodes[0] else {
            panic!("expected embedded variable, got {:?}", nodes[0]);
        };
        assert_eq!(*mode, expected_mode);
        assert_eq!(variable.test_value, test_value);
        let rest: Vec<&Node> = nodes[1..].iter().collect();
        if trailing.is_empty() {
            assert!(rest.is_empty());
        } else {
            assert_eq!(rest, vec![&Node::Text(trailing.into())]);
        }
    }

    #[test]
    fn test_if_else_blocks() {
        let nodes = parse("/*IF pmb.a*/A/*ELSE*/B/*END*/").unwrap();
        let Node::If {
            children,
            else_children,
            ..
        } = &nodes[0]
        else {
            panic!("expected IF");
        };
        assert_eq!(children, &vec![Node::Text("A".into())]);
        assert_eq!(else_children, &Some(vec![Node::Text("B".into())]));
    }

    #[test]
    fn test_connector_is_split_from_if_body() {
        let nodes = parse("/*BEGIN*//*IF pmb.a*/ and A = 1/*END*//*END*/").unwrap();
        let Node::Begin(children) = &nodes[0] else {
            panic!("expected BEGIN");
        };
        let Node::If { children, .. } = &children[0] else {
            panic!("expected IF");
        };
        assert_eq!(
            children[0],
            Node::Connector {
                connector: " and ".into(),
                rest: "A = 1".into()
            }
        );
    }

    #[test]
    fn test_plain_comments_are_text() {
        let nodes = parse("select /*+ INDEX(m) */ * from MEMBER /* note */").unwrap();
        assert!(nodes.iter().all(|node| matches!(node, Node::Text(_))));
        let sql: String = nodes
            .iter()
            .map(|node| match node {
                Node::Text(text) => text.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(sql, "select /*+ INDEX(m) */ * from MEMBER /* note */");
    }

    #[test]
    fn test_for_options_and_markers() {
        let nodes = parse("/*FOR pmb.names:likePrefix*//*NEXT 'or '*/N like /*#current*/'a'/*END*/").unwrap();
        let Node::For { options, children, .. } = &nodes[0] else {
            panic!("expected FOR");
        };
        assert_eq!(options.like, Some(LikeSearchOption::Prefix));
        assert_eq!(children[0], Node::LoopNext("or ".into()));
    }

    #[rstest]
    #[case("/*IF pmb.a*/A", "UnclosedBlock")]
    #[case("A/*END*/", "UnexpectedDirective")]
    #[case("/*BEGIN*/A/*ELSE*/B/*END*/", "UnexpectedDirective")]
    #[case("/*FIRST*/A/*END*/", "UnexpectedDirective")]
    #[case("/*NEXT 'a'*/", "UnexpectedDirective")]
    #[case("/*FOR pmb.list*//*NEXT a*//*END*/", "MalformedDirective")]
    #[case("where A = /*#current*/1", "LoopVariableOutsideLoop")]
    #[case("/*IF #current == 1*/A/*END*/", "LoopVariableOutsideLoop")]
    #[case("where A = /*pmb.a:notLike*/1", "MalformedDirective")]
    #[case("where A = /*pmb.a:likeAll*/1", "MalformedDirective")]
    #[case("where A = /*pmb..a*/1", "MalformedDirective")]
    #[case("where A = /*IF pmb.a = 1*/1/*END*/", "SingleEquals")]
    #[case("where A = /*pmb.a 1", "UnterminatedComment")]
    fn test_structural_errors(#[case] source: &str, #[case] expected: &str) {
        let err = parse(source).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structural);
        assert!(
            format!("{:?}", err.kind).starts_with(expected),
            "expected {expected}, got {:?}",
            err.kind
        );
        assert_eq!(err.template, source);
    }

    #[test]
    fn test_unclosed_block_reports_directive_position() {
        let err = parse("select *\n  /*IF pmb.a*/A").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UnclosedBlock {
                directive: "IF pmb.a".into(),
                line: 2,
                column: 3
            }
        );
    }

    #[test]
    fn test_loop_variable_allowed_in_nested_loops() {
        assert!(parse("/*FOR pmb.groups*//*FOR #current.names*//*#current*/'a'/*END*//*END*/").is_ok());
    }
}
