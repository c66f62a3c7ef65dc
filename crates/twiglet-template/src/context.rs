/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Caller-supplied data for a render.
//!
//! A [`Context`] becomes the outermost scope of a render. Templates can read
//! it but never change it: `set` tags write to inner scopes only.

use crate::value::{Map, Value};
use serde::Serialize;

/// Variable bindings passed to [`Template::render`](crate::Template::render).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    variables: Map,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable into the context.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Build a context from any value serializing to a map.
    ///
    /// Non-map values (e.g. a top-level JSON array) yield `None`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Option<Self>, serde_json::Error> {
        Ok(match Value::from_serialize(value)? {
            Value::Map(variables) => Some(Self { variables }),
            Value::Null => Some(Self::new()),
            _ => None,
        })
    }

    pub fn variables(&self) -> &Map {
        &self.variables
    }

    pub fn into_variables(self) -> Map {
        self.variables
    }
}

impl From<Map> for Context {
    fn from(variables: Map) -> Self {
        Self { variables }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            variables: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_get() {
        let mut context = Context::new();
        context.insert("name", "Ada").insert("age", 36);

        assert_eq!(context.get("name"), Some(&Value::from("Ada")));
        assert_eq!(context.get("age"), Some(&Value::Integer(36)));
        assert_eq!(context.get("missing"), None);
    }

    #[test]
    fn test_from_serialize() {
        let context = Context::from_serialize(&json!({"b": 1, "a": [true]}))
            .unwrap()
            .unwrap();
        let keys: Vec<&String> = context.variables().keys().collect();
        assert_eq!(keys, vec!["b", "a"]);

        assert!(Context::from_serialize(&json!([1, 2])).unwrap().is_none());
        assert_eq!(Context::from_serialize(&json!(null)).unwrap(), Some(Context::new()));
    }

    #[test]
    fn test_from_iterator() {
        let context: Context = [("x", 1), ("y", 2)].into_iter().collect();
        assert_eq!(context.get("y"), Some(&Value::Integer(2)));
    }
}
