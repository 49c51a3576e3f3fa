//! Dotted-path resolution
//!
//! A path such as `pmb.member.get(0).name` starts at a named argument (or the
//! loop variable `#current`) and walks one segment at a time. Each segment
//! resolves to a tagged [`SegmentResolution`] so every failure is reported
//! with its own error kind.

use twoway_core::{Value, ValueType};

use crate::context::CommandContext;
use crate::error::{ErrorKind, Result};
use crate::like_search::LikeSearchOption;
use crate::loop_info::LoopInfo;

/// Reserved name of the current loop element
pub const LOOP_VARIABLE: &str = "#current";

/// Where a path starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRoot {
    /// A named argument
    Argument(String),
    /// The current element of the innermost loop
    LoopVariable,
}

/// One step after the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// `name`: bean property or map key
    Property(String),
    /// `get(N)`: list element, index kept raw until resolution
    Index(String),
    /// `name()`: zero-argument method
    Method(String),
}

impl PathSegment {
    fn display(&self) -> String {
        match self {
            PathSegment::Property(name) => name.clone(),
            PathSegment::Index(raw) => format!("get({raw})"),
            PathSegment::Method(name) => format!("{name}()"),
        }
    }
}

/// A parsed dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    pub root: PathRoot,
    pub segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// Parse `root.segment.segment`, errors carry a human-readable reason
    pub fn parse(path: &str) -> std::result::Result<Self, String> {
        let mut parts = path.split('.');
        let first = parts.next().unwrap_or_default().trim();
        let root = if first == LOOP_VARIABLE {
            PathRoot::LoopVariable
        } else if is_identifier(first) {
            PathRoot::Argument(first.to_string())
        } else {
            return Err(format!("'{path}' does not start with an argument name"));
        };

        let mut segments = Vec::new();
        for part in parts {
            let part = part.trim();
            let segment = if let Some(name) = part.strip_suffix("()") {
                if !is_identifier(name) {
                    return Err(format!("invalid method '{part}' in '{path}'"));
                }
                PathSegment::Method(name.to_string())
            } else if let Some(raw) = part
                .strip_prefix("get(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                PathSegment::Index(raw.trim().to_string())
            } else if is_identifier(part) {
                PathSegment::Property(part.to_string())
            } else {
                return Err(format!("invalid segment '{part}' in '{path}'"));
            };
            segments.push(segment);
        }

        Ok(Self { root, segments })
    }

    /// Name of the root argument, `None` for the loop variable
    pub fn argument_name(&self) -> Option<&str> {
        match &self.root {
            PathRoot::Argument(name) => Some(name.as_str()),
            PathRoot::LoopVariable => None,
        }
    }

    pub fn uses_loop_variable(&self) -> bool {
        self.root == PathRoot::LoopVariable
    }

    /// Resolve the path against the context and the active loop
    pub fn resolve(
        &self,
        expression: &str,
        ctx: &CommandContext<'_>,
        loop_info: Option<&LoopInfo<'_>>,
    ) -> Result<ValueAndType> {
        let (first_value, first_type) = match &self.root {
            PathRoot::Argument(name) => {
                let Some(value) = ctx.arg(name) else {
                    return Err(ctx.error(
                        ErrorKind::ArgumentNotFound { name: name.clone() },
                        expression,
                    ));
                };
                let declared = ctx.arg_type(name).cloned();
                (value.clone(), declared.unwrap_or_else(|| value.value_type()))
            }
            PathRoot::LoopVariable => {
                let Some(info) = loop_info else {
                    return Err(ctx.error(ErrorKind::LoopVariableOutsideLoop, expression));
                };
                let current = info.current().clone();
                let value_type = current.value_type();
                (current, value_type)
            }
        };

        let mut target = first_value.clone();
        let mut target_type = first_type.clone();
        let mut walked = match &self.root {
            PathRoot::Argument(name) => name.clone(),
            PathRoot::LoopVariable => LOOP_VARIABLE.to_string(),
        };

        for segment in &self.segments {
            let declared = match (&target, segment) {
                (Value::Bean(bean), PathSegment::Property(name)) => bean.property_type(name),
                _ => None,
            };
            let next = match resolve_segment(&target, segment) {
                SegmentResolution::Property(value)
                | SegmentResolution::MapEntry(value)
                | SegmentResolution::ListElement(value)
                | SegmentResolution::MethodResult(value) => value,
                SegmentResolution::NotFound(missing) => {
                    let kind = missing.into_error(&walked, &target, segment);
                    return Err(ctx.error(kind, expression));
                }
            };
            tracing::trace!(path = %walked, segment = %segment.display(), "resolved segment");
            target_type = match (&next, declared) {
                (Value::Null, Some(declared)) => declared,
                (value, _) => value.value_type(),
            };
            target = next;
            walked.push('.');
            walked.push_str(&segment.display());
        }

        Ok(ValueAndType {
            first_value,
            first_type,
            target_value: target,
            target_type,
            like_option: None,
        })
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// How a single segment was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentResolution {
    /// Bean property
    Property(Value),
    /// Map entry; a missing key reads as null
    MapEntry(Value),
    /// List element via `get(N)`
    ListElement(Value),
    /// Result of a zero-argument method
    MethodResult(Value),
    NotFound(Missing),
}

/// Why a segment could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// The value the segment is applied to is null
    NullTarget,
    NoSuchProperty,
    NoSuchMethod,
    IndexOutOfRange { index: usize, size: usize },
    NonNumericIndex,
    NotIndexable,
}

impl Missing {
    fn into_error(self, walked: &str, target: &Value, segment: &PathSegment) -> ErrorKind {
        let type_name = target.value_type().name().to_string();
        match (self, segment) {
            (Missing::NullTarget, _) => ErrorKind::NullIntermediate {
                path: walked.to_string(),
                segment: segment.display(),
            },
            (Missing::IndexOutOfRange { index, size }, _) => {
                ErrorKind::IndexOutOfRange { index, size }
            }
            (Missing::NonNumericIndex, PathSegment::Index(raw)) => {
                ErrorKind::NonNumericIndex { raw: raw.clone() }
            }
            (Missing::NotIndexable, _) => ErrorKind::NotIndexable { type_name },
            (Missing::NoSuchMethod, PathSegment::Method(method)) => ErrorKind::MethodNotFound {
                type_name,
                method: method.clone(),
            },
            (_, segment) => ErrorKind::PropertyNotFound {
                type_name,
                property: segment.display(),
            },
        }
    }
}

/// Resolve one segment against a value
pub fn resolve_segment(target: &Value, segment: &PathSegment) -> SegmentResolution {
    if target.is_null() {
        return SegmentResolution::NotFound(Missing::NullTarget);
    }
    match segment {
        PathSegment::Property(name) => match target {
            Value::Bean(bean) => match bean.property(name) {
                Some(value) => SegmentResolution::Property(value),
                None => SegmentResolution::NotFound(Missing::NoSuchProperty),
            },
            Value::Map(map) => {
                SegmentResolution::MapEntry(map.get(name).cloned().unwrap_or(Value::Null))
            }
            _ => SegmentResolution::NotFound(Missing::NoSuchProperty),
        },
        PathSegment::Index(raw) => {
            let Value::List(items) = target else {
                return SegmentResolution::NotFound(Missing::NotIndexable);
            };
            let Ok(index) = raw.parse::<usize>() else {
                return SegmentResolution::NotFound(Missing::NonNumericIndex);
            };
            match items.get(index) {
                Some(value) => SegmentResolution::ListElement(value.clone()),
                None => SegmentResolution::NotFound(Missing::IndexOutOfRange {
                    index,
                    size: items.len(),
                }),
            }
        }
        PathSegment::Method(name) => {
            if let Value::Bean(bean) = target {
                return match bean.call(name) {
                    Some(value) => SegmentResolution::MethodResult(value),
                    None => SegmentResolution::NotFound(Missing::NoSuchMethod),
                };
            }
            match builtin_method(target, name) {
                Some(value) => SegmentResolution::MethodResult(value),
                None => SegmentResolution::NotFound(Missing::NoSuchMethod),
            }
        }
    }
}

fn size_value(size: usize) -> Value {
    match i32::try_from(size) {
        Ok(size) => Value::Int32(size),
        Err(_) => Value::Int64(i64::try_from(size).unwrap_or(i64::MAX)),
    }
}

/// `size()`, `isEmpty()` and `length()` on plain values
fn builtin_method(target: &Value, name: &str) -> Option<Value> {
    let size = match target {
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => return None,
    };
    match (name, target) {
        ("size", _) | ("length", Value::String(_)) => Some(size_value(size)),
        ("isEmpty", _) => Some(Value::Bool(size == 0)),
        _ => None,
    }
}

/// The outcome of resolving a variable comment's path.
///
/// Keeps the root object (needed to re-evaluate templates found inside
/// embedded values) next to the final target.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueAndType {
    pub first_value: Value,
    pub first_type: ValueType,
    pub target_value: Value,
    pub target_type: ValueType,
    /// LIKE-search option applied to the target, if any
    pub like_option: Option<LikeSearchOption>,
}

impl ValueAndType {
    /// Apply a LIKE-search option to a string target
    pub fn filter_by_like(&mut self, option: Option<LikeSearchOption>, escape: char) {
        let (Some(option), Value::String(s)) = (option, &self.target_value) else {
            return;
        };
        self.target_value = Value::String(option.apply(s, escape));
        self.like_option = Some(option);
    }

    /// SQL to append after the placeholder, e.g. ` escape '|'`
    pub fn rear_option(&self, escape: char) -> Option<String> {
        self.like_option
            .map(|_| LikeSearchOption::rear_option(escape))
    }
}
