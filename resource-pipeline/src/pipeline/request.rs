//! Incoming request as seen by the pipeline
//!
//! Transport adapters (an axum handler, a test) build a [`ResourceRequest`]
//! from whatever they received and hand it to a dispatcher.
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::pipeline::ResourceRequest;
//! use serde_json::json;
//!
//! let request = ResourceRequest::list()
//!     .with_param("page", json!(2))
//!     .with_param("filters", json!({"status": "published"}))
//!     .with_bearer("secret-token");
//!
//! assert_eq!(request.param("page"), Some(&json!(2)));
//! assert!(request.filters().is_some());
//! ```

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

use crate::resource::Action;

/// One request against one resource
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// Requested action
    pub action: Action,
    /// Instance identifier for show, update and destroy
    pub id: Option<String>,
    /// Request parameters (query string and body merged)
    pub params: Map<String, Value>,
    /// Request headers
    pub headers: HeaderMap,
}

impl ResourceRequest {
    /// Empty request for an action
    pub fn new(action: Action) -> Self {
        Self {
            action,
            id: None,
            params: Map::new(),
            headers: HeaderMap::new(),
        }
    }

    /// List the collection
    pub fn list() -> Self {
        Self::new(Action::List)
    }

    /// Fetch one instance
    pub fn show(id: impl Into<String>) -> Self {
        Self::new(Action::Show).with_id(id)
    }

    /// Create an instance from `params`
    pub fn create(params: Map<String, Value>) -> Self {
        Self::new(Action::Create).with_params(params)
    }

    /// Update an instance from `params`
    pub fn update(id: impl Into<String>, params: Map<String, Value>) -> Self {
        Self::new(Action::Update).with_id(id).with_params(params)
    }

    /// Delete an instance
    pub fn destroy(id: impl Into<String>) -> Self {
        Self::new(Action::Destroy).with_id(id)
    }

    /// Set the instance identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Merge parameters, later keys overwriting earlier ones
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    /// Set one parameter
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Set a header; invalid names or values are ignored
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set an `Authorization: Bearer` header
    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header(header::AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    /// Look up a parameter
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Client filters, from a `filters` object or a JSON-encoded `filters` string
    pub fn filters(&self) -> Option<Map<String, Value>> {
        match self.params.get("filters")? {
            Value::Object(filters) => Some(filters.clone()),
            Value::String(encoded) => match serde_json::from_str(encoded) {
                Ok(Value::Object(filters)) => Some(filters),
                _ => None,
            },
            _ => None,
        }
    }
}
