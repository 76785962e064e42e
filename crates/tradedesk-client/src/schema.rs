//! Runtime shape contracts for request and response payloads
//!
//! A [`Schema`] checks a JSON value and explains the first problem it finds.
//! [`Contract`] pairs the optional input schema (params or body) with the
//! optional output schema for one call.

use serde_json::Value;
use std::fmt;

/// A data-shape contract checked at runtime
pub trait Schema: Send + Sync {
    /// Check `value`, returning a human-readable reason on mismatch
    fn validate(&self, value: &Value) -> Result<(), String>;
}

/// JSON Schema (draft 2020-12) contract
pub struct JsonSchema {
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compile `schema`, failing if it is not a valid JSON Schema document
    pub fn new(schema: &Value) -> Result<Self, String> {
        let validator =
            jsonschema::draft202012::new(schema).map_err(|e| format!("Invalid schema: {e}"))?;
        Ok(Self { validator })
    }
}

impl Schema for JsonSchema {
    fn validate(&self, value: &Value) -> Result<(), String> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(value)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema").finish_non_exhaustive()
    }
}

/// Contract backed by a closure
pub struct FnSchema<F>(pub F);

impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }
}

/// Input and output contracts for one call
#[derive(Clone, Copy, Default)]
pub struct Contract<'a> {
    /// Checked against params (GET) or body (writes) before any I/O
    pub input: Option<&'a dyn Schema>,
    /// Checked against the unwrapped response payload
    pub output: Option<&'a dyn Schema>,
}

impl<'a> Contract<'a> {
    /// No runtime contract beyond deserializing into the result type
    pub fn none() -> Self {
        Self::default()
    }

    pub fn input(schema: &'a dyn Schema) -> Self {
        Self {
            input: Some(schema),
            output: None,
        }
    }

    pub fn output(schema: &'a dyn Schema) -> Self {
        Self {
            input: None,
            output: Some(schema),
        }
    }

    pub fn with_input(mut self, schema: &'a dyn Schema) -> Self {
        self.input = Some(schema);
        self
    }

    pub fn with_output(mut self, schema: &'a dyn Schema) -> Self {
        self.output = Some(schema);
        self
    }
}

impl fmt::Debug for Contract<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("input", &self.input.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}
