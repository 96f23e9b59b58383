#![forbid(unsafe_code)]

//! Dynamic values stored in observable nodes and registry fields.

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Number};

use super::node::ObservableNode;

/// A callable stored as data. Skipped by [`ObservableNode::copy_raw`].
#[derive(Clone)]
pub struct Callable(Rc<dyn Fn(&Value) -> Value>);

impl Callable {
    pub fn new(f: impl Fn(&Value) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, arg: &Value) -> Value {
        (self.0)(arg)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A value held by an observable node.
///
/// `Raw` holds an object or array that has not been wrapped yet; the first
/// read or write through a node replaces it with a `Node`.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Raw(serde_json::Value),
    Node(ObservableNode),
    Callable(Callable),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Raw(a), Self::Raw(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a.ptr_eq(b),
            (Self::Callable(a), Self::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Convert JSON, keeping objects and arrays raw.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            composite => Self::Raw(composite),
        }
    }

    /// Short type name for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Raw(serde_json::Value::Array(_)) => "array",
            Self::Raw(_) => "object",
            Self::Node(node) if node.is_array() => "array",
            Self::Node(_) => "object",
            Self::Callable(_) => "callable",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Object or array, wrapped or not.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Raw(_) | Self::Node(_))
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_node(&self) -> Option<&ObservableNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Wrapper-free JSON snapshot. Callables become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null | Self::Callable(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Raw(json) => strip_private(json),
            Self::Node(node) => node.copy_raw(),
        }
    }
}

/// Whether `key` is a bookkeeping key.
#[must_use]
pub fn is_private_key(key: &str) -> bool {
    key.starts_with('_')
}

/// Copy `json`, dropping private keys at every depth.
pub(crate) fn strip_private(json: &serde_json::Value) -> serde_json::Value {
    match json {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .filter(|(k, _)| !is_private_key(k))
                .map(|(k, v)| (k.clone(), strip_private(v)))
                .collect::<Map<_, _>>(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(strip_private).collect())
        }
        scalar => scalar.clone(),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(i64::from(n).into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(json)
    }
}

impl From<ObservableNode> for Value {
    fn from(node: ObservableNode) -> Self {
        Self::Node(node)
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Self::Callable(callable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn composites_stay_raw() {
        assert!(matches!(Value::from(json!({"a": 1})), Value::Raw(_)));
        assert!(matches!(Value::from(json!([1, 2])), Value::Raw(_)));
        assert_eq!(Value::from(json!(3)).as_f64(), Some(3.0));
    }

    #[test]
    fn non_finite_floats_are_null() {
        assert!(Value::from(f64::NAN).is_null());
    }

    #[test]
    fn strip_private_is_deep() {
        let raw = json!({"_hidden": 1, "a": {"_x": 2, "y": [ {"_z": 3, "w": 4} ]}});
        assert_eq!(strip_private(&raw), json!({"a": {"y": [{"w": 4}]}}));
    }

    #[test]
    fn callables_compare_by_identity() {
        let c = Callable::new(|v| v.clone());
        let d = Callable::new(|v| v.clone());
        assert_eq!(Value::from(c.clone()), Value::from(c));
        assert_ne!(Value::from(d), Value::Null);
    }
}
