//! Runtime context for one template evaluation

use std::collections::HashMap;
use twoway_core::{EngineConfig, ParameterMap, Value, ValueType};

use crate::error::{ErrorKind, TemplateError};

/// Accumulates SQL text and bind values while a template is evaluated.
///
/// One context is created per evaluation and discarded afterwards. The SQL
/// buffer and the two bind sequences grow in lock-step: every bind value has
/// exactly one type and one `?` in the SQL.
pub struct CommandContext<'a> {
    args: &'a ParameterMap,
    arg_types: &'a HashMap<String, ValueType>,
    config: &'a EngineConfig,
    template: &'a str,
    sql: String,
    bind_values: Vec<Value>,
    bind_types: Vec<ValueType>,
    enabled: bool,
    depth: usize,
}

impl<'a> CommandContext<'a> {
    /// Create the top-level context of an evaluation
    pub fn root(
        args: &'a ParameterMap,
        arg_types: &'a HashMap<String, ValueType>,
        config: &'a EngineConfig,
        template: &'a str,
    ) -> Self {
        Self {
            args,
            arg_types,
            config,
            template,
            sql: String::new(),
            bind_values: Vec::new(),
            bind_types: Vec::new(),
            enabled: true,
            depth: 0,
        }
    }

    /// Context for an optional block; starts disabled until something is emitted
    pub fn child(&self) -> CommandContext<'a> {
        CommandContext {
            args: self.args,
            arg_types: self.arg_types,
            config: self.config,
            template: self.template,
            sql: String::new(),
            bind_values: Vec::new(),
            bind_types: Vec::new(),
            enabled: false,
            depth: self.depth,
        }
    }

    /// Context for a template found inside an embedded value, one level deeper
    pub fn nested<'b>(
        &self,
        args: &'b ParameterMap,
        arg_types: &'b HashMap<String, ValueType>,
        template: &'b str,
    ) -> CommandContext<'b>
    where
        'a: 'b,
    {
        CommandContext {
            args,
            arg_types,
            config: self.config,
            template,
            sql: String::new(),
            bind_values: Vec::new(),
            bind_types: Vec::new(),
            enabled: true,
            depth: self.depth + 1,
        }
    }

    pub fn arg(&self, name: &str) -> Option<&'a Value> {
        self.args.get(name)
    }

    /// Declared type of a named argument
    pub fn arg_type(&self, name: &str) -> Option<&'a ValueType> {
        self.arg_types.get(name)
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    /// Nesting level of dynamic embedding, 0 for the top-level template
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Append literal SQL
    pub fn add_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Append a placeholder together with its bind value and type
    pub fn add_sql_with_bind(&mut self, sql: &str, value: Value, value_type: ValueType) {
        self.sql.push_str(sql);
        self.bind_values.push(value);
        self.bind_types.push(value_type);
    }

    /// Append SQL produced elsewhere together with its bind values and types
    pub fn add_sql_with_binds(&mut self, sql: &str, values: Vec<Value>, types: Vec<ValueType>) {
        debug_assert_eq!(values.len(), types.len());
        self.sql.push_str(sql);
        self.bind_values.extend(values);
        self.bind_types.extend(types);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bind_values(&self) -> &[Value] {
        &self.bind_values
    }

    pub fn bind_types(&self) -> &[ValueType] {
        &self.bind_types
    }

    /// Whether the current optional block has produced real content
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Consume the context into its SQL and bind sequences
    pub fn into_parts(self) -> (String, Vec<Value>, Vec<ValueType>) {
        (self.sql, self.bind_values, self.bind_types)
    }

    /// Build an error carrying the template and a view of the parameters
    pub fn error(&self, kind: ErrorKind, expression: &str) -> TemplateError {
        TemplateError {
            kind,
            expression: expression.to_string(),
            clause: None,
            template: self.template.to_string(),
            parameters: self.describe_args(),
        }
    }

    fn describe_args(&self) -> String {
        if self.args.is_empty() {
            return "(none)".to_string();
        }
        self.args
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
