//! Resource registry
//!
//! All process-wide pipeline state is assembled here once, before traffic:
//! configuration, the authenticator named by `pipeline.auth_lookup`, and one
//! dispatcher per resource. The built [`ResourceRegistry`] is immutable and
//! cheap to clone, so it can be shared across tasks (or used as axum state)
//! without locking.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use resource_pipeline::prelude::*;
//!
//! let registry = ResourceRegistry::builder()
//!     .with_config(Config::load()?)
//!     .authenticator("bearer", Arc::new(BearerTokenAuthenticator::new().with_token("t", Subject::new("user:1"))))
//!     .resource(posts())
//!     .build()?;
//!
//! let outcome = registry.dispatch("posts", ResourceRequest::list()).await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::envelope::Outcome;
use crate::error::{Error, Result};
use crate::pipeline::{Dispatcher, PipelineError, ResourceEndpoint, ResourceRequest};
use crate::resource::Resource;

type EndpointFactory =
    Box<dyn FnOnce(Arc<Config>, Option<Arc<dyn Authenticator>>) -> Arc<dyn ResourceEndpoint>>;

/// Builder for [`ResourceRegistry`]
///
/// All fields are optional; configuration defaults to `Config::default()`.
#[derive(Default)]
pub struct RegistryBuilder {
    config: Option<Config>,
    authenticators: HashMap<String, Arc<dyn Authenticator>>,
    resources: Vec<(String, EndpointFactory)>,
}

impl RegistryBuilder {
    /// Create a new registry builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Register an authenticator under the name `pipeline.auth_lookup` refers to
    #[must_use]
    pub fn authenticator(mut self, name: impl Into<String>, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticators.insert(name.into(), authenticator);
        self
    }

    /// Register a resource handler
    #[must_use]
    pub fn resource<R: Resource>(mut self, resource: R) -> Self {
        let name = resource.name().to_string();
        let factory: EndpointFactory = Box::new(move |config, authenticator| {
            let dispatcher = Dispatcher::new(resource, config);
            let dispatcher = match authenticator {
                Some(authenticator) => dispatcher.with_authenticator(authenticator),
                None => dispatcher,
            };
            Arc::new(dispatcher) as Arc<dyn ResourceEndpoint>
        });
        self.resources.push((name, factory));
        self
    }

    /// Build the registry
    ///
    /// # Errors
    ///
    /// Fails if `pipeline.auth_lookup` names an authenticator that was never
    /// registered, or if two resources share a name.
    pub fn build(self) -> Result<ResourceRegistry> {
        let config = Arc::new(self.config.unwrap_or_default());

        let authenticator = match &config.pipeline.auth_lookup {
            Some(name) => match self.authenticators.get(name) {
                Some(authenticator) => Some(Arc::clone(authenticator)),
                None => {
                    return Err(Error::Registry(format!(
                        "auth lookup '{name}' is not a registered authenticator"
                    )))
                }
            },
            None => None,
        };

        let mut endpoints = HashMap::with_capacity(self.resources.len());
        for (name, factory) in self.resources {
            if endpoints.contains_key(&name) {
                return Err(Error::Registry(format!(
                    "resource '{name}' registered twice"
                )));
            }
            let endpoint = factory(Arc::clone(&config), authenticator.clone());
            endpoints.insert(name, endpoint);
        }

        tracing::info!(
            resources = endpoints.len(),
            auth_lookup = ?config.pipeline.auth_lookup,
            "resource registry built"
        );

        Ok(ResourceRegistry {
            config,
            endpoints: Arc::new(endpoints),
        })
    }
}

/// Immutable map from resource name to dispatcher
#[derive(Clone)]
pub struct ResourceRegistry {
    config: Arc<Config>,
    endpoints: Arc<HashMap<String, Arc<dyn ResourceEndpoint>>>,
}

impl ResourceRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Shared configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Endpoint registered under `name`
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ResourceEndpoint>> {
        self.endpoints.get(name)
    }

    /// Registered resource names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Dispatch a request to the named resource
    ///
    /// An unknown name is answered like an inaccessible instance.
    pub async fn dispatch(&self, resource: &str, request: ResourceRequest) -> Outcome {
        match self.endpoints.get(resource) {
            Some(endpoint) => endpoint.dispatch(request).await,
            None => {
                tracing::warn!(resource = %resource, action = %request.action, "unknown resource");
                let error = PipelineError::not_found(resource, "").with_action(request.action);
                Outcome::Abort(error.to_envelope(&self.config.pipeline))
            }
        }
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FnAuthenticator;
    use crate::config::PipelineConfig;

    #[test]
    fn test_empty_registry() {
        let registry = ResourceRegistry::builder().build().unwrap();
        assert!(registry.names().is_empty());
        assert!(registry.get("posts").is_none());
    }

    #[test]
    fn test_unknown_auth_lookup_fails_at_build() {
        let mut config = Config::default();
        config.pipeline = PipelineConfig::default().with_auth_lookup("jwt");

        let error = ResourceRegistry::builder()
            .with_config(config)
            .build()
            .unwrap_err();
        assert!(matches!(error, Error::Registry(_)));
        assert!(error.to_string().contains("jwt"));
    }

    #[test]
    fn test_registered_auth_lookup_resolves() {
        let mut config = Config::default();
        config.pipeline = PipelineConfig::default().with_auth_lookup("anyone");

        let registry = ResourceRegistry::builder()
            .with_config(config)
            .authenticator(
                "anyone",
                Arc::new(FnAuthenticator::new(|_: &ResourceRequest| None)),
            )
            .build();
        assert!(registry.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_resource_is_masked() {
        let registry = ResourceRegistry::builder().build().unwrap();
        let outcome = registry.dispatch("ghosts", ResourceRequest::list()).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.code(), 403);
        assert_eq!(outcome.envelope().message(), Some("resource not found"));
    }
}
