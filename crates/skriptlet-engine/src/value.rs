use anyhow::{Result, bail};
use std::collections::HashMap;
use std::fmt;

use crate::class::ClassId;

// ============================================================================
// VALUES
// ============================================================================

/// A runtime value produced by an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Object(Object),
}

/// Instance of a user-registered class.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub class: ClassId,
    pub properties: HashMap<String, Value>,
}

impl Object {
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

impl Value {
    /// The most specific class this value is an instance of.
    pub fn class(&self) -> ClassId {
        match self {
            Value::Boolean(_) => ClassId::BOOLEAN,
            Value::Integer(_) => ClassId::INTEGER,
            Value::Decimal(_) => ClassId::DECIMAL,
            Value::String(_) => ClassId::STRING,
            Value::Object(obj) => obj.class,
        }
    }

    pub fn as_number(&self) -> Result<f64> {
        match self {
            Value::Integer(n) => Ok(*n as f64),
            Value::Decimal(n) => Ok(*n),
            _ => bail!("Expected number, got {}", self.kind()),
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Value::Integer(n) => Ok(*n),
            Value::Decimal(n) if n.fract() == 0.0 => Ok(*n as i64),
            _ => bail!("Expected integer, got {}", self.kind()),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => bail!("Expected boolean, got {}", self.kind()),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            _ => bail!("Expected string, got {}", self.kind()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Object(_) => "object",
        }
    }

    /// Builds a number value, keeping integral results as integers.
    pub fn number(n: f64) -> Value {
        if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
            Value::Integer(n as i64)
        } else {
            Value::Decimal(n)
        }
    }
}

// ============================================================================
// COMPARISON OPERATIONS
// ============================================================================

impl Value {
    pub fn less_than(&self, other: &Value) -> Result<bool> {
        Ok(self.as_number()? < other.as_number()?)
    }

    pub fn greater_than(&self, other: &Value) -> Result<bool> {
        Ok(self.as_number()? > other.as_number()?)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Decimal(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Object(obj) => write!(f, "object{{ {} properties }}", obj.properties.len()),
        }
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Decimal(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
