//! Template engine facade

use std::collections::HashMap;
use std::sync::Arc;
use twoway_core::{EngineConfig, ParameterMap, Value, ValueType};

use crate::context::CommandContext;
use crate::display::display_sql;
use crate::error::Result;
use crate::node::{Node, evaluate_all};
use crate::parser::TemplateParser;

/// A parsed template.
///
/// Immutable and cheap to clone, so one template can be evaluated any
/// number of times, from any number of threads.
#[derive(Debug, Clone)]
pub struct Template {
    source: Arc<str>,
    nodes: Arc<Vec<Node>>,
}

impl Template {
    /// Parse template text
    pub fn parse(source: &str) -> Result<Self> {
        let nodes = TemplateParser::new(source).parse()?;
        tracing::debug!(nodes = nodes.len(), source_len = source.len(), "compiled template");
        Ok(Self {
            source: Arc::from(source),
            nodes: Arc::new(nodes),
        })
    }

    /// The template text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Top-level nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Distinct root argument names referenced anywhere in the template
    pub fn argument_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for node in self.nodes.iter() {
            node.collect_argument_names(&mut names);
        }
        names
    }

    /// Evaluate against parameters
    pub fn evaluate(&self, params: &Parameters, config: &EngineConfig) -> Result<BoundQuery> {
        let mut ctx = CommandContext::root(&params.args, &params.types, config, &self.source);
        evaluate_all(&self.nodes, &mut ctx, None)?;
        let (sql, values, types) = ctx.into_parts();
        Ok(BoundQuery { sql, values, types })
    }
}

/// Named arguments plus optional declared types
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    pub args: ParameterMap,
    pub types: HashMap<String, ValueType>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named argument
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Declare the type of a named argument, used when its value is null
    pub fn with_type(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.types.insert(name.into(), value_type);
        self
    }
}

impl From<ParameterMap> for Parameters {
    fn from(args: ParameterMap) -> Self {
        Self {
            args,
            types: HashMap::new(),
        }
    }
}

/// Result of evaluating a template
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    /// SQL with `?` placeholders
    pub sql: String,
    /// Bind values in placeholder order
    pub values: Vec<Value>,
    /// Bind types, one per value
    pub types: Vec<ValueType>,
}

impl BoundQuery {
    /// SQL with the bind values inlined, for logs
    pub fn display_sql(&self) -> String {
        display_sql(&self.sql, &self.values)
    }
}

/// Compiles and renders two-way SQL templates
#[derive(Debug, Clone, Default)]
pub struct TwoWayEngine {
    config: EngineConfig,
}

impl TwoWayEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse a template for repeated use
    pub fn compile(&self, source: &str) -> Result<Template> {
        Template::parse(source)
    }

    /// Evaluate a compiled template
    #[tracing::instrument(skip(self, template, params), fields(sql_preview = %template.source().chars().take(100).collect::<String>()))]
    pub fn render(&self, template: &Template, params: &Parameters) -> Result<BoundQuery> {
        let query = template.evaluate(params, &self.config)?;
        tracing::debug!(
            binds = query.values.len(),
            display_sql = %query.display_sql().chars().take(200).collect::<String>(),
            "rendered template"
        );
        Ok(query)
    }

    /// Parse and evaluate in one step
    pub fn render_str(&self, source: &str, params: &Parameters) -> Result<BoundQuery> {
        let template = self.compile(source)?;
        self.render(&template, params)
    }
}
