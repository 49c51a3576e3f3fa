//! Twoway Core - value model and configuration for two-way SQL templates
//!
//! This crate provides the types every other twoway crate depends on:
//!
//! - `Value` - A parameter value (scalars, lists, maps and beans)
//! - `Bean` - Trait for parameter objects with properties and methods
//! - `ValueType` - The type reported alongside each bind value
//! - `EngineConfig` - Engine options, loadable from TOML

mod config;
mod error;
mod types;

pub use config::*;
pub use error::*;
pub use types::*;
