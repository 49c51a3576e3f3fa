//! Twoway Templates - two-way SQL templates
//!
//! A two-way SQL template is plain SQL that still runs as-is in a SQL client.
//! Directives live in comments and each placeholder is followed by a test
//! value, which the engine replaces at evaluation time.
//!
//! ## Directives
//!
//! - **Bind variables**: `/*pmb.memberId*/3` becomes `?` with one bind value,
//!   `/*pmb.ids*/(1, 2)` expands a list into `(?, ?, ?)`
//! - **Embedded variables**: `/*$pmb.orderBy*/ID` inlines text, `/*$$pmb.schema*/`
//!   inserts without a test value, `/*$.pmb.schema*/dbo.MEMBER` replaces up to the dot
//! - **IF / ELSE**: `/*IF pmb.name != null*/ ... /*ELSE*/ ... /*END*/`
//! - **BEGIN**: `/*BEGIN*/ ... /*END*/` drops its body when nothing inside it applied
//! - **FOR**: `/*FOR pmb.names:likePrefix*/ ... /*#current*/'a' ... /*END*/`, with
//!   `/*FIRST*/`, `/*LAST*/` and `/*NEXT 'or '*/` markers
//!
//! ## Example
//!
//! ```rust
//! use twoway_templates::{Parameters, TwoWayEngine};
//! use twoway_core::{ParameterMap, Value};
//!
//! let mut pmb = ParameterMap::new();
//! pmb.insert("memberName".into(), Value::from("S"));
//!
//! let engine = TwoWayEngine::default();
//! let query = engine.render_str(
//!     "select * from MEMBER /*BEGIN*/where /*IF pmb.memberName != null*/MEMBER_NAME like /*pmb.memberName:likePrefix*/'S%'/*END*//*END*/",
//!     &Parameters::new().with("pmb", Value::Map(pmb)),
//! ).unwrap();
//! assert_eq!(query.sql, "select * from MEMBER where MEMBER_NAME like ? escape '|'");
//! ```

mod context;
mod display;
mod engine;
mod error;
mod if_comment;
mod like_search;
mod loop_info;
mod node;
mod parser;
mod resolver;
mod tokenizer;
mod variable;

pub use context::CommandContext;
pub use display::{display_sql, sqlquote};
pub use engine::{BoundQuery, Parameters, Template, TwoWayEngine};
pub use error::{ErrorCategory, ErrorKind, Result, TemplateError};
pub use if_comment::{IfCommentExpression, Operator, Term, compare};
pub use like_search::{LikeSearchOption, VariableOptions};
pub use loop_info::LoopInfo;
pub use node::Node;
pub use parser::TemplateParser;
pub use resolver::{
    LOOP_VARIABLE, Missing, PathRoot, PathSegment, PropertyPath, SegmentResolution, ValueAndType,
    resolve_segment,
};
pub use tokenizer::{PositionedToken, SqlTokenizer, TestValueExtent, Token};
pub use variable::{EmbeddedMode, VariableNode};

#[cfg(test)]
mod tests;
