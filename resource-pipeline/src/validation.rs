//! Input validation
//!
//! A [`Schema`] turns raw request parameters into either a validated value
//! mapping or a [`FieldErrors`] mapping of field name to messages. Any closure
//! with the right signature is a schema; [`FieldSchema`] is a declarative
//! implementation for the common rules.
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::validation::{FieldRules, FieldSchema, Schema};
//! use serde_json::json;
//!
//! let schema = FieldSchema::new()
//!     .field("title", FieldRules::new().required().string().min_length(3))
//!     .field("status", FieldRules::new().one_of(["draft", "published"]));
//!
//! let input = json!({"status": "archived"});
//! let errors = schema.validate(input.as_object().unwrap()).unwrap_err();
//! assert_eq!(errors.get("title"), Some(&["can't be blank".to_string()][..]));
//! assert_eq!(errors.get("status"), Some(&["is not included in the list".to_string()][..]));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Mapping of field name to the error messages raised for it
///
/// Fields are kept sorted by name, so messages and the serialized object
/// list them alphabetically regardless of the order they were reported in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Create an empty error set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Builder form of [`FieldErrors::add`]
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(field, message);
        self
    }

    /// Messages recorded for a field
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Whether no errors were recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with errors
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over fields and their messages
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Merge another error set into this one
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Messages prefixed with their field name ("title can't be blank")
    pub fn full_messages(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(field, messages)| {
                messages
                    .iter()
                    .map(move |message| format!("{field} {message}"))
            })
            .collect()
    }

    /// Field errors as a JSON object
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

/// Validation of raw request parameters
pub trait Schema: Send + Sync {
    /// Validate `input`, returning the validated mapping or the field errors
    fn validate(&self, input: &Map<String, Value>) -> std::result::Result<Map<String, Value>, FieldErrors>;
}

impl<F> Schema for F
where
    F: Fn(&Map<String, Value>) -> std::result::Result<Map<String, Value>, FieldErrors>
        + Send
        + Sync,
{
    fn validate(&self, input: &Map<String, Value>) -> std::result::Result<Map<String, Value>, FieldErrors> {
        self(input)
    }
}

/// Expected JSON type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON string
    String,
    /// Integer, or a string that parses as one
    Integer,
    /// Any number, or a string that parses as one
    Number,
    /// Boolean, or the strings `true`/`false`
    Boolean,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
            (Self::Number, Value::Number(_)) => true,
            (Self::Number, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Boolean, Value::String(s)) => matches!(s.as_str(), "true" | "false"),
            _ => false,
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::String => "must be a string",
            Self::Integer => "is not an integer",
            Self::Number => "is not a number",
            Self::Boolean => "must be true or false",
        }
    }
}

/// Rules applied to a single field
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    required: bool,
    field_type: Option<FieldType>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    one_of: Option<Vec<String>>,
}

impl FieldRules {
    /// Create an empty rule set (the field is optional and unconstrained)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The field must be present, non-null and non-blank
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// The field must be a string
    #[must_use]
    pub fn string(self) -> Self {
        self.of_type(FieldType::String)
    }

    /// The field must be an integer
    #[must_use]
    pub fn integer(self) -> Self {
        self.of_type(FieldType::Integer)
    }

    /// The field must be a number
    #[must_use]
    pub fn number(self) -> Self {
        self.of_type(FieldType::Number)
    }

    /// The field must be a boolean
    #[must_use]
    pub fn boolean(self) -> Self {
        self.of_type(FieldType::Boolean)
    }

    /// Set the expected type
    #[must_use]
    pub fn of_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// Minimum string length in characters
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Maximum string length in characters
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// String values must match the regular expression
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`](crate::error::Error::Schema) if the pattern does not compile.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// The value must be one of the listed strings
    #[must_use]
    pub fn one_of<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of = Some(allowed.into_iter().map(Into::into).collect());
        self
    }

    fn check(&self, field: &str, value: Option<&Value>, errors: &mut FieldErrors) {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required {
                    errors.add(field, "can't be blank");
                }
                return;
            }
            Some(value) => value,
        };

        if self.required && value.as_str().is_some_and(|s| s.trim().is_empty()) {
            errors.add(field, "can't be blank");
            return;
        }

        if let Some(field_type) = self.field_type {
            if !field_type.accepts(value) {
                errors.add(field, field_type.message());
                return;
            }
        }

        if let Some(text) = value.as_str() {
            let length = text.chars().count();
            if let Some(min) = self.min_length.filter(|min| length < *min) {
                errors.add(field, format!("is too short (minimum is {min} characters)"));
            }
            if let Some(max) = self.max_length.filter(|max| length > *max) {
                errors.add(field, format!("is too long (maximum is {max} characters)"));
            }
            if self.pattern.as_ref().is_some_and(|re| !re.is_match(text)) {
                errors.add(field, "is invalid");
            }
        }

        if let Some(allowed) = &self.one_of {
            let candidate = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !allowed.contains(&candidate) {
                errors.add(field, "is not included in the list");
            }
        }
    }
}

/// Declarative schema: a set of named fields with rules
///
/// Fields not declared in the schema are left out of the validated mapping.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    fields: Vec<(String, FieldRules)>,
}

impl FieldSchema {
    /// Create an empty schema
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rules: FieldRules) -> Self {
        self.fields.push((name.into(), rules));
        self
    }

    /// Names of the declared fields
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

impl Schema for FieldSchema {
    fn validate(&self, input: &Map<String, Value>) -> std::result::Result<Map<String, Value>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut validated = Map::new();

        for (name, rules) in &self.fields {
            let value = input.get(name);
            rules.check(name, value, &mut errors);
            if let Some(value) = value {
                validated.insert(name.clone(), value.clone());
            }
        }

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }
}
