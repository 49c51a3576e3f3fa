//! Template node tree

use twoway_core::Value;

use crate::context::CommandContext;
use crate::error::{ErrorKind, Result};
use crate::if_comment::IfCommentExpression;
use crate::like_search::VariableOptions;
use crate::loop_info::LoopInfo;
use crate::resolver::PropertyPath;
use crate::variable::{EmbeddedMode, VariableNode};

/// A parsed piece of a template
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal SQL
    Text(String),
    /// First text of an IF or ELSE body that starts with `AND` or `OR`
    Connector { connector: String, rest: String },
    /// `/*path*/?`
    BindVariable(VariableNode),
    /// `/*$path*/text`
    EmbeddedVariable {
        variable: VariableNode,
        mode: EmbeddedMode,
    },
    /// `/*IF expr*/ ... /*ELSE*/ ... /*END*/`
    If {
        condition: IfCommentExpression,
        children: Vec<Node>,
        else_children: Option<Vec<Node>>,
    },
    /// `/*FOR path*/ ... /*END*/`
    For {
        expression: String,
        path: PropertyPath,
        options: VariableOptions,
        children: Vec<Node>,
    },
    /// `/*BEGIN*/ ... /*END*/`
    Begin(Vec<Node>),
    /// `/*FIRST*/ ... /*END*/` inside a loop
    LoopFirst(Vec<Node>),
    /// `/*LAST*/ ... /*END*/` inside a loop
    LoopLast(Vec<Node>),
    /// `/*NEXT 'text'*/` inside a loop
    LoopNext(String),
}

impl Node {
    /// Evaluate this node into the context
    pub fn evaluate(
        &self,
        ctx: &mut CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<()> {
        match self {
            Node::Text(text) => ctx.add_sql(text),
            Node::Connector { connector, rest } => {
                if !ctx.is_enabled() && ctx.config().adjust_connector {
                    tracing::trace!(connector = %connector.trim(), "dropping leading connector");
                } else {
                    ctx.add_sql(connector);
                }
                ctx.add_sql(rest);
            }
            Node::BindVariable(variable) => variable.evaluate_bind(ctx, loop_info)?,
            Node::EmbeddedVariable { variable, mode } => {
                variable.evaluate_embedded(*mode, ctx, loop_info)?
            }
            Node::If {
                condition,
                children,
                else_children,
            } => {
                let taken = condition.evaluate(ctx, loop_info)?;
                tracing::trace!(expression = %condition.expression(), taken, "evaluated IF");
                let branch = if taken {
                    Some(children)
                } else {
                    else_children.as_ref()
                };
                if let Some(branch) = branch {
                    evaluate_all(branch, ctx, loop_info)?;
                    ctx.set_enabled(true);
                }
            }
            Node::For {
                expression,
                path,
                options,
                children,
            } => evaluate_for(expression, path, options, children, ctx, loop_info)?,
            Node::Begin(children) => {
                let mut child = ctx.child();
                evaluate_all(children, &mut child, loop_info)?;
                let enabled = child.is_enabled();
                tracing::trace!(enabled, "evaluated BEGIN");
                if enabled {
                    let (sql, values, types) = child.into_parts();
                    ctx.add_sql_with_binds(&sql, values, types);
                    ctx.set_enabled(true);
                }
            }
            Node::LoopFirst(children) => {
                if loop_info.is_some_and(LoopInfo::is_first) {
                    evaluate_all(children, ctx, loop_info)?;
                }
            }
            Node::LoopLast(children) => {
                if loop_info.is_some_and(LoopInfo::is_last) {
                    evaluate_all(children, ctx, loop_info)?;
                }
            }
            Node::LoopNext(text) => {
                if loop_info.is_some_and(|info| !info.is_first()) {
                    ctx.add_sql(text);
                }
            }
        }
        Ok(())
    }

    /// Root argument names referenced by this node and its children
    pub(crate) fn collect_argument_names<'n>(&'n self, names: &mut Vec<&'n str>) {
        let mut push = |name: Option<&'n str>| {
            if let Some(name) = name {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        };
        match self {
            Node::BindVariable(variable) | Node::EmbeddedVariable { variable, .. } => {
                push(variable.path.argument_name());
            }
            Node::If {
                condition,
                children,
                else_children,
            } => {
                for name in condition.argument_names() {
                    push(Some(name));
                }
                for child in children.iter().chain(else_children.iter().flatten()) {
                    child.collect_argument_names(names);
                }
            }
            Node::For { path, children, .. } => {
                push(path.argument_name());
                for child in children {
                    child.collect_argument_names(names);
                }
            }
            Node::Begin(children) | Node::LoopFirst(children) | Node::LoopLast(children) => {
                for child in children {
                    child.collect_argument_names(names);
                }
            }
            Node::Text(_) | Node::Connector { .. } | Node::LoopNext(_) => {}
        }
    }
}

/// Evaluate nodes in order
pub fn evaluate_all(
    nodes: &[Node],
    ctx: &mut CommandContext<'_>,
    loop_info: Option<&LoopInfo<'_>>,
) -> Result<()> {
    for node in nodes {
        node.evaluate(ctx, loop_info)?;
    }
    Ok(())
}

fn evaluate_for(
    expression: &str,
    path: &PropertyPath,
    options: &VariableOptions,
    children: &[Node],
    ctx: &mut CommandContext<'_>,
    loop_info: Option<&LoopInfo<'_>>,
) -> Result<()> {
    let resolved = path.resolve(expression, ctx, loop_info)?;
    let elements = match resolved.target_value {
        Value::List(items) => items,
        other => {
            let type_name = if other.is_null() {
                "null".to_string()
            } else {
                other.value_type().name().to_string()
            };
            return Err(ctx.error(ErrorKind::ForSourceNotList { type_name }, expression));
        }
    };

    let mut info = LoopInfo::new(expression, elements, options.like, loop_info);
    tracing::trace!(expression, size = info.size(), depth = info.depth(), "entering FOR");
    for index in 0..info.size() {
        info.set_index(index);
        evaluate_all(children, ctx, Some(&info))?;
    }
    Ok(())
}
