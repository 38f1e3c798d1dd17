// Runtime Values
// Dynamic data consumed by expressions: scalars, nested mappings and opaque objects

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// An opaque composite exposed to expressions through named properties.
///
/// Hosts implement this for data that should not be copied into a
/// mapping up front (viewer/owner records, lazily computed fields).
pub trait DataObject: fmt::Debug + Send + Sync {
    /// Name used when the object is rendered as a string
    fn type_name(&self) -> &str;

    /// Look up a named property; `None` means the property is absent
    fn property(&self, name: &str) -> Option<Value>;
}

/// Nested mapping: either a positional list or an ordered keyed map
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Array {
    pub fn len(&self) -> usize {
        match self {
            Array::List(items) => items.len(),
            Array::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry by key. Lists accept decimal indices.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Array::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            Array::Map(map) => map.get(key),
        }
    }

    /// Entry by position. Maps are indexed by insertion order only when the
    /// key itself is the decimal index.
    pub fn get_index(&self, index: i64) -> Option<&Value> {
        if index < 0 {
            return None;
        }
        match self {
            Array::List(items) => items.get(index as usize),
            Array::Map(map) => map.get(&index.to_string()),
        }
    }

    /// Values in iteration order
    pub fn values(&self) -> Vec<Value> {
        match self {
            Array::List(items) => items.clone(),
            Array::Map(map) => map.values().cloned().collect(),
        }
    }
}

/// Runtime value type used in expression evaluation
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Array),
    Object(Arc<dyn DataObject>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Build a keyed map from `(key, value)` pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Array(Array::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean interpretation used by conditions and logical operators.
    /// Strings are true unless empty, `"0"` or case-insensitive `"false"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => {
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
            }
            Value::Array(a) => !a.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Numeric view: numbers as is, numeric strings parsed
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Named member lookup on maps, lists and objects
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Array(a) => a.get(key).cloned(),
            Value::Object(o) => o.property(key),
            _ => None,
        }
    }

    /// Textual form used for interpolation into text and attributes
    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => format_float(*n),
            Value::String(s) => s.clone(),
            Value::Array(_) => self.to_json().to_string(),
            Value::Object(o) => o.type_name().to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(Array::List(items)) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Array(Array::Map(map)) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Object(o) => serde_json::Value::String(o.type_name().to_string()),
        }
    }
}

/// Integral floats print without a fractional part
pub(crate) fn format_float(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(Array::List(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Value::Array(Array::Map(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
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

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(Array::List(v.into_iter().map(Into::into).collect()))
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Array(Array::Map(map))
    }
}
