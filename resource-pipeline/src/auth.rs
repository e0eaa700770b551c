//! Authentication stage collaborators
//!
//! The pipeline resolves the acting [`Subject`] once per request through an
//! [`Authenticator`]. The authenticator is named in configuration
//! (`pipeline.auth_lookup`) and bound to an implementation when the registry
//! is built, so a misconfigured name fails at startup rather than per request.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pipeline::ResourceRequest;

/// The authenticated actor on whose behalf a request executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identifier (user ID or client ID)
    pub id: String,

    /// Roles
    #[serde(default)]
    pub roles: Vec<String>,

    /// Additional claims carried by the credential
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl Subject {
    /// Create a subject with no roles or claims
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            claims: Map::new(),
        }
    }

    /// Add a role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Add a claim
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Check if the subject has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Look up a claim
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

/// Resolves the acting subject from a request
///
/// Returning `None` means "no subject": the pipeline aborts with the
/// access-denied envelope unless the action is exempt.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve the subject for this request
    async fn lookup(&self, request: &ResourceRequest) -> Option<Subject>;
}

/// Authenticator backed by a synchronous closure
pub struct FnAuthenticator<F> {
    lookup: F,
}

impl<F> FnAuthenticator<F>
where
    F: Fn(&ResourceRequest) -> Option<Subject> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl<F> Authenticator for FnAuthenticator<F>
where
    F: Fn(&ResourceRequest) -> Option<Subject> + Send + Sync,
{
    async fn lookup(&self, request: &ResourceRequest) -> Option<Subject> {
        (self.lookup)(request)
    }
}

/// Authenticator mapping opaque bearer tokens to subjects
///
/// ```rust
/// use resource_pipeline::auth::{BearerTokenAuthenticator, Subject};
///
/// let authenticator = BearerTokenAuthenticator::new()
///     .with_token("secret-token", Subject::new("user:1").with_role("admin"));
/// assert_eq!(authenticator.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BearerTokenAuthenticator {
    tokens: HashMap<String, Subject>,
}

impl BearerTokenAuthenticator {
    /// Create an authenticator that knows no tokens
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, subject: Subject) -> Self {
        self.tokens.insert(token.into(), subject);
        self
    }

    /// Number of registered tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens are registered
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl Authenticator for BearerTokenAuthenticator {
    async fn lookup(&self, request: &ResourceRequest) -> Option<Subject> {
        let token = extract_bearer(&request.headers)?;
        self.tokens.get(token).cloned()
    }
}

/// Extract the token from an `Authorization: Bearer ...` header
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
