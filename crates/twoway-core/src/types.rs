//! Parameter values for two-way SQL templates

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::CoreError;

/// Named arguments a template is evaluated against, in insertion order.
pub type ParameterMap = IndexMap<String, Value>;

/// A parameter object with named properties and zero-argument methods.
///
/// This is the typed stand-in for reflective bean access: a template path
/// like `pmb.member.name` asks each bean along the way for a property, and
/// `pmb.isPaging()` asks for a method result.
pub trait Bean: fmt::Debug + Send + Sync {
    /// Name shown in error messages and used as the bind type of the bean itself
    fn type_name(&self) -> &str;

    /// Read a property.
    ///
    /// `None` means the bean has no such property, `Some(Value::Null)` means
    /// the property exists and is null.
    fn property(&self, name: &str) -> Option<Value>;

    /// Invoke a zero-argument method. `None` means the method does not exist.
    fn call(&self, method: &str) -> Option<Value> {
        let _ = method;
        None
    }

    /// Declared type of a property, used when its value is null
    fn property_type(&self, name: &str) -> Option<ValueType> {
        let _ = name;
        None
    }

    /// Property names, in display order
    fn property_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A template parameter value
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Exact decimal
    Decimal(Decimal),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Date without time
    Date(NaiveDate),
    /// Date and time without timezone
    DateTime(NaiveDateTime),
    /// Time of day
    Time(NaiveTime),
    /// Ordered collection
    List(Vec<Value>),
    /// String-keyed map
    Map(ParameterMap),
    /// Arbitrary parameter object
    Bean(Arc<dyn Bean>),
}

impl Value {
    /// Wrap a bean
    pub fn bean(bean: impl Bean + 'static) -> Self {
        Value::Bean(Arc::new(bean))
    }

    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numbers compare with each other regardless of their representation
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Int64(_) | Value::Float64(_) | Value::Decimal(_)
        )
    }

    /// Dates and date-times compare with each other
    pub fn is_date(&self) -> bool {
        matches!(self, Value::Date(_) | Value::DateTime(_))
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Normalize any number to a decimal.
    ///
    /// Returns `None` for non-numbers and for floats without a finite
    /// decimal representation.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int32(v) => Some(Decimal::from(*v)),
            Value::Int64(v) => Some(Decimal::from(*v)),
            Value::Float64(v) => Decimal::try_from(*v).ok(),
            Value::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Normalize dates to a date-time at midnight
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// The bind type describing this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Unknown,
            Value::Bool(_) => ValueType::Boolean,
            Value::Int32(_) => ValueType::Integer,
            Value::Int64(_) => ValueType::BigInt,
            Value::Float64(_) => ValueType::Double,
            Value::Decimal(_) => ValueType::Decimal,
            Value::String(_) => ValueType::String,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Date(_) => ValueType::Date,
            Value::DateTime(_) => ValueType::Timestamp,
            Value::Time(_) => ValueType::Time,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Bean(bean) => ValueType::Object(bean.type_name().to_string()),
        }
    }

    /// Convert to JSON for machine-readable output
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Int32(v) => Json::from(*v),
            Value::Int64(v) => Json::from(*v),
            Value::Float64(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Decimal(v) => Json::String(v.to_string()),
            Value::String(v) => Json::String(v.clone()),
            Value::Bytes(v) => Json::Array(v.iter().map(|b| Json::from(*b)).collect()),
            Value::Date(_) | Value::DateTime(_) | Value::Time(_) => Json::String(self.to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Bean(bean) => Json::Object(
                bean.property_names()
                    .into_iter()
                    .map(|name| {
                        let value = bean.property(&name).unwrap_or(Value::Null).to_json();
                        (name, value)
                    })
                    .collect(),
            ),
        }
    }

    /// Nested rendering used inside lists, maps and beans: strings are quoted
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            other => write!(f, "{}", other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Bean(a), Value::Bean(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    value.fmt_nested(f)?;
                }
                write!(f, "}}")
            }
            Value::Bean(bean) => {
                write!(f, "{}{{", bean.type_name())?;
                for (i, name) in bean.property_names().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    bean.property(name).unwrap_or(Value::Null).fmt_nested(f)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<ParameterMap> for Value {
    fn from(v: ParameterMap) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Bool(v),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Decimal(Decimal::from(u))
                } else {
                    let f = n.as_f64().unwrap_or(f64::NAN);
                    Decimal::from_str(&n.to_string())
                        .map(Value::Decimal)
                        .unwrap_or(Value::Float64(f))
                }
            }
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// The type reported alongside each bind value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Type could not be determined (null without declaration)
    Unknown,
    Boolean,
    Integer,
    BigInt,
    Double,
    Decimal,
    String,
    Bytes,
    Date,
    Timestamp,
    Time,
    List,
    Map,
    /// A bean, named by its type
    Object(String),
}

impl ValueType {
    /// Type name as written in declared-type maps
    pub fn name(&self) -> &str {
        match self {
            ValueType::Unknown => "unknown",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::BigInt => "bigint",
            ValueType::Double => "double",
            ValueType::Decimal => "decimal",
            ValueType::String => "string",
            ValueType::Bytes => "bytes",
            ValueType::Date => "date",
            ValueType::Timestamp => "timestamp",
            ValueType::Time => "time",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Object(name) => name,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = CoreError;

    /// Parses type names, with `object:<Name>` for bean types
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("object:") {
            return Ok(ValueType::Object(name.to_string()));
        }
        let ty = match s.to_ascii_lowercase().as_str() {
            "unknown" => ValueType::Unknown,
            "boolean" | "bool" => ValueType::Boolean,
            "integer" | "int" => ValueType::Integer,
            "bigint" | "long" => ValueType::BigInt,
            "double" | "float" => ValueType::Double,
            "decimal" | "numeric" => ValueType::Decimal,
            "string" | "text" | "varchar" => ValueType::String,
            "bytes" | "binary" => ValueType::Bytes,
            "date" => ValueType::Date,
            "timestamp" | "datetime" => ValueType::Timestamp,
            "time" => ValueType::Time,
            "list" => ValueType::List,
            "map" => ValueType::Map,
            _ => return Err(CoreError::UnknownValueType(s.to_string())),
        };
        Ok(ty)
    }
}
