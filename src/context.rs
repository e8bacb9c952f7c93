use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{RouteError, RouteResult};

/// Open key/value mapping threaded through middleware to the handler.
///
/// Values are JSON values, the same representation the request data map
/// uses elsewhere. Extending never mutates a context that has already been
/// handed out: the underlying map is shared until written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Arc<Map<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from any value that serializes to a JSON object.
    pub fn from_serialize<T: Serialize>(value: &T) -> RouteResult<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self::from(map)),
            Value::Null => Ok(Self::new()),
            other => Err(RouteError::internal(format!(
                "context extension must be an object, got `{other}`"
            ))),
        }
    }

    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    /// Union of both contexts. Keys in `other` win.
    pub fn extend(mut self, other: &Context) -> Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other.clone();
        }
        let values = Arc::make_mut(&mut self.values);
        for (key, value) in other.values.iter() {
            values.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.to_owned()).ok())
    }

    /// Like [`Context::get_typed`], but a missing or mistyped key is an error.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> RouteResult<T> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| RouteError::internal(format!("missing context key `{key}`")))?;
        serde_json::from_value(value.to_owned()).map_err(|e| {
            RouteError::internal(format!("context key `{key}` has unexpected type: {e}"))
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            values: Arc::new(map),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect::<Map<String, Value>>();
        Self::from(map)
    }
}
