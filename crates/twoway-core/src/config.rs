//! Declarative engine configuration
//!
//! Engine options can be built in code or loaded from a TOML file:
//!
//! ```toml
//! block_null_parameter = true
//! max_dynamic_depth = 4
//! adjust_connector = true
//! like_escape = "|"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{CoreError, Result};

/// Options controlling template evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Fail instead of binding NULL when a variable resolves to null
    pub block_null_parameter: bool,
    /// How many times an embedded value may itself contain directives
    pub max_dynamic_depth: usize,
    /// Drop a leading `AND`/`OR` of the first IF body that produces content inside BEGIN
    pub adjust_connector: bool,
    /// Escape character used by LIKE-search options
    pub like_escape: char,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_null_parameter: false,
            max_dynamic_depth: 8,
            adjust_connector: true,
            like_escape: '|',
        }
    }
}

impl EngineConfig {
    /// Enable or disable null-blocking
    pub fn with_block_null_parameter(mut self, block: bool) -> Self {
        self.block_null_parameter = block;
        self
    }

    /// Set the nested dynamic embedding limit
    pub fn with_max_dynamic_depth(mut self, depth: usize) -> Self {
        self.max_dynamic_depth = depth;
        self
    }

    /// Enable or disable connector adjustment inside BEGIN blocks
    pub fn with_adjust_connector(mut self, adjust: bool) -> Self {
        self.adjust_connector = adjust;
        self
    }

    /// Set the LIKE-search escape character
    pub fn with_like_escape(mut self, escape: char) -> Self {
        self.like_escape = escape;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading engine configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_dynamic_depth == 0 {
            return Err(CoreError::Configuration(
                "max_dynamic_depth must be at least 1".to_string(),
            ));
        }
        if matches!(self.like_escape, '%' | '_' | '\'' | '?') || self.like_escape.is_whitespace()
        {
            return Err(CoreError::Configuration(format!(
                "like_escape cannot be {:?}",
                self.like_escape
            )));
        }
        Ok(())
    }
}
