/*
 * functions/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Function registry and overload resolution.
//!
//! Functions are registered explicitly under a name, each with one or more
//! [`Signature`]s. A call is dispatched to the first signature, in
//! registration order, whose parameter types accept the runtime arguments.
//!
//! Filters use the same registry: `x | upper` calls `upper(x)`.

mod builtins;
mod date;

pub use date::{format_date, modify_date, parse_date, php_to_strftime};

use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;
use chrono::{FixedOffset, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declared type of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Accepts every value, including null.
    Any,
    String,
    Integer,
    Float,
    /// Integer or float.
    Number,
    Bool,
    List,
    Map,
    Date,
}

impl ParamType {
    /// Whether `value` satisfies this parameter type. Typed parameters reject null.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::Any, _) => true,
            (ParamType::String, Value::String(_)) => true,
            (ParamType::Integer, Value::Integer(_)) => true,
            (ParamType::Float, Value::Float(_)) => true,
            (ParamType::Number, Value::Integer(_) | Value::Float(_)) => true,
            (ParamType::Bool, Value::Bool(_)) => true,
            (ParamType::List, Value::List(_)) => true,
            (ParamType::Map, Value::Map(_)) => true,
            (ParamType::Date, Value::Date(_)) => true,
            _ => false,
        }
    }
}

/// Settings available to function implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionEnv {
    /// Timezone used when a function needs the current time.
    pub utc_offset: FixedOffset,
}

impl FunctionEnv {
    pub fn new(utc_offset: FixedOffset) -> Self {
        Self { utc_offset }
    }

    /// The current wall-clock time in the configured timezone.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.utc_offset).naive_local()
    }
}

/// The callable behind a signature.
pub type Callable = dyn Fn(&[Value], &FunctionEnv) -> TemplateResult<Value> + Send + Sync;

/// One typed overload of a function.
#[derive(Clone)]
pub struct Signature {
    params: Vec<ParamType>,
    callable: Arc<Callable>,
}

impl Signature {
    pub fn new<F>(params: impl Into<Vec<ParamType>>, callable: F) -> Self
    where
        F: Fn(&[Value], &FunctionEnv) -> TemplateResult<Value> + Send + Sync + 'static,
    {
        Self {
            params: params.into(),
            callable: Arc::new(callable),
        }
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Arity matches and every argument satisfies its declared type.
    pub fn matches(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| param.accepts(arg))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A named function with its overloads, in registration order.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    name: String,
    signatures: Vec<Signature>,
}

impl FunctionDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Select the first matching overload.
    pub fn resolve(&self, args: &[Value]) -> TemplateResult<&Signature> {
        self.signatures
            .iter()
            .find(|signature| signature.matches(args))
            .ok_or_else(|| {
                let types: Vec<&str> = args.iter().map(Value::type_name).collect();
                TemplateError::function(
                    &self.name,
                    format!("No signature accepts arguments ({})", types.join(", ")),
                )
            })
    }

    /// Resolve the overload for `args` and invoke it.
    pub fn call(&self, args: &[Value], env: &FunctionEnv) -> TemplateResult<Value> {
        let signature = self.resolve(args)?;
        (signature.callable)(args, env)
    }
}

/// Registration table of functions by name.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FunctionDescriptor>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        date::register(&mut registry);
        builtins::register(&mut registry);
        registry
    }

    /// Add an overload to `name`. Overloads are tried in the order they were added.
    pub fn register(&mut self, name: impl Into<String>, signature: Signature) -> &mut Self {
        let name = name.into();
        let descriptor = self
            .functions
            .entry(name.clone())
            .or_insert_with(|| {
                Arc::new(FunctionDescriptor {
                    name,
                    signatures: Vec::new(),
                })
            });
        Arc::make_mut(descriptor).signatures.push(signature);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Call a function by name.
    pub fn call(&self, name: &str, args: &[Value], env: &FunctionEnv) -> TemplateResult<Value> {
        self.functions
            .get(name)
            .ok_or_else(|| TemplateError::function(name, "Unknown function"))?
            .call(args, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> FunctionEnv {
        FunctionEnv::new(FixedOffset::east_opt(0).unwrap())
    }

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry
            .register(
                "describe",
                Signature::new([ParamType::Integer], |_, _| Ok(Value::from("integer"))),
            )
            .register(
                "describe",
                Signature::new([ParamType::Number], |_, _| Ok(Value::from("number"))),
            )
            .register(
                "describe",
                Signature::new([ParamType::Any], |_, _| Ok(Value::from("anything"))),
            )
            .register(
                "pair",
                Signature::new([ParamType::String, ParamType::String], |args, _| {
                    Ok(Value::from(format!("{}{}", args[0], args[1])))
                }),
            );
        registry
    }

    #[test]
    fn test_first_matching_signature_wins() {
        let registry = registry();
        let env = env();

        assert_eq!(
            registry.call("describe", &[Value::Integer(1)], &env).unwrap(),
            Value::from("integer")
        );
        assert_eq!(
            registry.call("describe", &[Value::Float(1.5)], &env).unwrap(),
            Value::from("number")
        );
        assert_eq!(
            registry.call("describe", &[Value::Null], &env).unwrap(),
            Value::from("anything")
        );
    }

    #[test]
    fn test_no_matching_signature() {
        let registry = registry();
        let err = registry
            .call("pair", &[Value::from("a"), Value::Integer(2)], &env())
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Function error in 'pair': No signature accepts arguments (string, integer)"
        );
    }

    #[test]
    fn test_typed_parameters_reject_null() {
        let registry = registry();
        assert!(registry.call("pair", &[Value::Null, Value::from("b")], &env()).is_err());
        assert!(!ParamType::String.accepts(&Value::Null));
        assert!(ParamType::Any.accepts(&Value::Null));
    }

    #[test]
    fn test_arity_must_match() {
        let registry = registry();
        assert!(registry.call("pair", &[Value::from("a")], &env()).is_err());
    }

    #[test]
    fn test_unknown_function() {
        let err = registry().call("missing", &[], &env()).unwrap_err();
        assert_eq!(err.to_string(), "Function error in 'missing': Unknown function");
    }

    #[test]
    fn test_descriptor_keeps_registration_order() {
        let descriptor = registry().get("describe").unwrap();
        let params: Vec<&[ParamType]> = descriptor.signatures().iter().map(Signature::params).collect();
        assert_eq!(
            params,
            vec![&[ParamType::Integer][..], &[ParamType::Number][..], &[ParamType::Any][..]]
        );
    }

    #[test]
    fn test_builtins_registered() {
        let registry = FunctionRegistry::with_builtins();
        for name in ["date", "date_modify", "upper", "join", "default", "range"] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }
}
