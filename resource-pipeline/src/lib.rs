//! # resource-pipeline
//!
//! Request-handling pipeline for exposing a persisted entity type as a RESTful
//! resource: list, show, create, update, destroy.
//!
//! ## Features
//!
//! - **Fixed stage order**: authentication, validation, scoping, filtering,
//!   eager loading, authorization, pagination, serialization
//! - **Uniform envelope**: every request ends in `{code, msg, data, pagination?}`,
//!   failures included, always carried over transport status `200`
//! - **Declarative resources**: a handler implements [`Resource`](resource::Resource)
//!   and overrides only the hooks it needs
//! - **Pluggable collaborators**: [`Repository`](repository::Repository),
//!   [`Policy`](policy::Policy) and [`Authenticator`](auth::Authenticator)
//! - **Configuration**: figment layering of defaults, TOML and environment
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use resource_pipeline::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let registry = ResourceRegistry::builder()
//!         .with_config(config)
//!         .authenticator("bearer", Arc::new(BearerTokenAuthenticator::new()))
//!         .resource(Posts::new())
//!         .build()?;
//!
//!     let outcome = registry
//!         .dispatch("posts", ResourceRequest::list().with_param("page", 2))
//!         .await;
//!     println!("{}", serde_json::to_string(outcome.envelope())?);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod repository;
pub mod resource;
pub mod validation;

#[cfg(feature = "observability")]
pub mod observability;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::{Authenticator, BearerTokenAuthenticator, FnAuthenticator, Subject};
    pub use crate::config::{Config, MessagesConfig, PipelineConfig};
    pub use crate::envelope::{Envelope, Outcome, PaginationMeta};
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{
        Dispatcher, FilterKind, FilterSpec, PipelineError, PipelineErrorKind, ResourceEndpoint,
        ResourceRequest,
    };
    pub use crate::policy::{AllowAll, DenyAll, FnPolicy, Policy, PolicyError, Target};
    pub use crate::registry::{RegistryBuilder, ResourceRegistry};
    pub use crate::repository::{
        FilterCondition, FilterValue, OrderDirection, Page, Pagination, Query, Repository,
        RepositoryError, RepositoryResult,
    };
    pub use crate::resource::{Action, Entity, Resource};
    pub use crate::validation::{FieldErrors, FieldRules, FieldSchema, FieldType, Schema};

    #[cfg(feature = "memory-store")]
    pub use crate::repository::MemoryRepository;

    #[cfg(feature = "observability")]
    pub use crate::observability::init_tracing;
}
