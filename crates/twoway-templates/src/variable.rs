//! Bind and embedded variable comments
//!
//! `/*pmb.memberId*/3` becomes a `?` placeholder with one bind value, while
//! `/*$pmb.orderBy*/MEMBER_ID` is replaced by the value's text. A test value
//! in parentheses, e.g. `/*pmb.ids*/(1, 2)`, expands a list.

use std::collections::HashMap;
use twoway_core::{ParameterMap, Value, ValueType};

use crate::context::CommandContext;
use crate::error::{ErrorKind, Result};
use crate::like_search::VariableOptions;
use crate::loop_info::LoopInfo;
use crate::parser::TemplateParser;
use crate::resolver::{PropertyPath, ValueAndType};

/// How an embedded value replaces the template text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedMode {
    /// `/*$path*/test`: the value replaces the comment and its test value
    Normal,
    /// `/*$$path*/`: the value is inserted, following text is kept
    ReplaceOnly,
    /// `/*$.path*/test.rest`: the test value is replaced up to its first dot
    TerminalDot,
}

/// A variable comment after parsing
#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    /// Comment body without the `$` prefix, options included
    pub expression: String,
    pub path: PropertyPath,
    pub options: VariableOptions,
    /// The literal that followed the comment in the template
    pub test_value: String,
}

impl VariableNode {
    /// Whether the test value asks for list expansion
    pub fn is_in_scope(&self) -> bool {
        self.test_value.trim_start().starts_with('(')
    }

    fn resolve(
        &self,
        ctx: &CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<ValueAndType> {
        let mut resolved = self.path.resolve(&self.expression, ctx, loop_info)?;
        let inherited = loop_info.and_then(LoopInfo::like_option);
        resolved.filter_by_like(self.options.effective(inherited), ctx.config().like_escape);
        Ok(resolved)
    }

    fn check_blocked(&self, value: &Value, ctx: &CommandContext<'_>) -> Result<()> {
        if value.is_null() && ctx.config().block_null_parameter {
            return Err(ctx.error(ErrorKind::NullBlocked, &self.expression));
        }
        Ok(())
    }

    /// Non-null elements of a list target, rejecting null, empty and null-only lists
    fn list_elements<'v>(&self, value: &'v Value, ctx: &CommandContext<'_>) -> Result<Vec<&'v Value>> {
        let items = match value {
            Value::List(items) => items,
            Value::Null => return Err(ctx.error(ErrorKind::ListValueNull, &self.expression)),
            other => {
                return Err(ctx.error(
                    ErrorKind::ListExpected {
                        type_name: other.value_type().name().to_string(),
                    },
                    &self.expression,
                ));
            }
        };
        if items.is_empty() {
            return Err(ctx.error(ErrorKind::EmptyList, &self.expression));
        }
        let present: Vec<&Value> = items.iter().filter(|item| !item.is_null()).collect();
        if present.is_empty() {
            return Err(ctx.error(ErrorKind::NullOnlyList, &self.expression));
        }
        Ok(present)
    }

    fn scalar_expected(&self, value: &Value, ctx: &CommandContext<'_>) -> Result<()> {
        if let Value::List(_) = value {
            return Err(ctx.error(
                ErrorKind::ScalarExpected {
                    type_name: value.value_type().name().to_string(),
                },
                &self.expression,
            ));
        }
        Ok(())
    }

    /// Emit `?` (or `(?, ?, ...)`) and the matching bind values
    pub fn evaluate_bind(
        &self,
        ctx: &mut CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<()> {
        let resolved = self.resolve(ctx, loop_info)?;
        self.check_blocked(&resolved.target_value, ctx)?;
        tracing::trace!(expression = %self.expression, value = %resolved.target_value, "binding variable");

        if self.is_in_scope() {
            let elements = self.list_elements(&resolved.target_value, ctx)?;
            let sql = format!("({})", vec!["?"; elements.len()].join(", "));
            let types = elements.iter().map(|v| v.value_type()).collect();
            let values = elements.into_iter().cloned().collect();
            ctx.add_sql_with_binds(&sql, values, types);
        } else {
            self.scalar_expected(&resolved.target_value, ctx)?;
            let escape = ctx.config().like_escape;
            let rear = resolved.rear_option(escape);
            ctx.add_sql_with_bind("?", resolved.target_value, resolved.target_type);
            if let Some(rear) = rear {
                ctx.add_sql(&rear);
            }
        }
        ctx.set_enabled(true);
        Ok(())
    }

    /// Replace the comment with the value's text
    pub fn evaluate_embedded(
        &self,
        mode: EmbeddedMode,
        ctx: &mut CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<()> {
        let resolved = self.resolve(ctx, loop_info)?;
        self.check_blocked(&resolved.target_value, ctx)?;
        tracing::trace!(expression = %self.expression, ?mode, value = %resolved.target_value, "embedding variable");

        if self.is_in_scope() {
            let elements = self.list_elements(&resolved.target_value, ctx)?;
            let quote = first_element(&self.test_value).is_some_and(is_quoted);
            let mut parts = Vec::with_capacity(elements.len());
            for element in elements {
                parts.push(self.embedded_text(element, quote && mode != EmbeddedMode::ReplaceOnly, ctx)?);
            }
            ctx.add_sql(&format!("({})", parts.join(", ")));
            ctx.set_enabled(true);
            return Ok(());
        }

        self.scalar_expected(&resolved.target_value, ctx)?;
        if let Value::String(text) = &resolved.target_value {
            if text.contains("/*") && text.contains("*/") {
                self.embed_dynamic(text, &resolved, ctx, loop_info)?;
                ctx.set_enabled(true);
                return Ok(());
            }
        }

        let quote = mode == EmbeddedMode::Normal && is_quoted(&self.test_value);
        let text = self.embedded_text(&resolved.target_value, quote, ctx)?;
        ctx.add_sql(&text);
        if let Some(rear) = resolved.rear_option(ctx.config().like_escape) {
            ctx.add_sql(&rear);
        }
        ctx.set_enabled(true);
        Ok(())
    }

    fn embedded_text(&self, value: &Value, quote: bool, ctx: &CommandContext<'_>) -> Result<String> {
        let text = value.to_string();
        if text.contains('?') {
            return Err(ctx.error(ErrorKind::BindSymbolInEmbedded { value: text }, &self.expression));
        }
        if quote && !value.is_null() {
            Ok(format!("'{}'", text.replace('\'', "''")))
        } else {
            Ok(text)
        }
    }

    /// Parse an embedded value that itself carries directives and evaluate
    /// it against the root object of this variable's path
    fn embed_dynamic(
        &self,
        text: &str,
        resolved: &ValueAndType,
        ctx: &mut CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<()> {
        let max = ctx.config().max_dynamic_depth;
        if ctx.depth() + 1 > max {
            tracing::warn!(expression = %self.expression, max, "dynamic embedding nested too deep");
            return Err(ctx.error(ErrorKind::DynamicDepthExceeded { max }, &self.expression));
        }

        let nodes = TemplateParser::new(text)
            .in_loop(loop_info.is_some())
            .parse()?;

        let mut args = ParameterMap::new();
        let mut arg_types: HashMap<String, ValueType> = HashMap::new();
        if let Some(name) = self.path.argument_name() {
            args.insert(name.to_string(), resolved.first_value.clone());
            arg_types.insert(name.to_string(), resolved.first_type.clone());
        }

        let mut nested = ctx.nested(&args, &arg_types, text);
        for node in &nodes {
            node.evaluate(&mut nested, loop_info)?;
        }
        let (sql, values, types) = nested.into_parts();
        tracing::debug!(expression = %self.expression, depth = ctx.depth() + 1, binds = values.len(), "embedded dynamic template");
        ctx.add_sql_with_binds(&sql, values, types);
        Ok(())
    }
}

/// A test value counts as quoted when it starts and ends with `'`
fn is_quoted(test_value: &str) -> bool {
    let trimmed = test_value.trim();
    trimmed.len() >= 2
        && trimmed.starts_with('\'')
        && trimmed.ends_with('\'')
        && trimmed.matches('\'').count() >= 2
}

fn first_element(test_value: &str) -> Option<&str> {
    let inner = test_value.trim().strip_prefix('(')?;
    let inner = inner.strip_suffix(')').unwrap_or(inner);
    inner.split(',').next().map(str::trim)
}
