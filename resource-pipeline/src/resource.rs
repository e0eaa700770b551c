//! Resource capability interface
//!
//! A concrete resource handler implements [`Resource`] to plug its entity
//! type, repository and policy into the pipeline, and overrides the
//! declarative hooks it needs. Every hook defaults to "nothing": a resource
//! that declares nothing permits no input fields, honours no filters, loads
//! no associations and exempts no actions.
//!
//! # Example
//!
//! ```rust,ignore
//! use resource_pipeline::prelude::*;
//!
//! struct Posts {
//!     repository: MemoryRepository<Post>,
//!     policy: AllowAll,
//!     filters: FilterSpec,
//!     create_schema: FieldSchema,
//! }
//!
//! impl Resource for Posts {
//!     type Entity = Post;
//!     type Repository = MemoryRepository<Post>;
//!     type Policy = AllowAll;
//!
//!     fn name(&self) -> &str { "posts" }
//!     fn repository(&self) -> &Self::Repository { &self.repository }
//!     fn policy(&self) -> &Self::Policy { &self.policy }
//!
//!     fn permitted_fields(&self) -> &[&str] { &["title", "body"] }
//!     fn filter_spec(&self) -> Option<&FilterSpec> { Some(&self.filters) }
//!     fn schema(&self, action: Action) -> Option<&dyn Schema> {
//!         matches!(action, Action::Create).then_some(&self.create_schema as &dyn Schema)
//!     }
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pipeline::FilterSpec;
use crate::policy::Policy;
use crate::repository::Repository;
use crate::validation::{FieldErrors, Schema};

/// The five actions a resource exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// List the accessible collection, filtered and paged
    List,
    /// Fetch one instance
    Show,
    /// Create an instance
    Create,
    /// Modify an instance
    Update,
    /// Delete an instance
    Destroy,
}

impl Action {
    /// Whether the action addresses a single existing instance by id
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Show | Self::Update | Self::Destroy)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Show => write!(f, "show"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// A persisted entity as seen by the pipeline
pub trait Entity: Clone + Send + Sync + 'static {
    /// Identifier, `None` until the entity has been persisted
    fn id(&self) -> Option<String>;

    /// Assign the identifier chosen by storage
    fn set_id(&mut self, id: String);

    /// Base attributes, used for serialization and predicate evaluation
    fn attributes(&self) -> Map<String, Value>;

    /// Nested representation of a named association
    fn association(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Value of a named computed attribute; `None` when there is no such accessor
    fn computed(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Construct a new, unsaved instance from permitted input fields
    fn build(attributes: &Map<String, Value>) -> Result<Self, FieldErrors>;

    /// Apply permitted input fields to an existing instance
    fn assign(&mut self, attributes: &Map<String, Value>) -> Result<(), FieldErrors>;
}

/// Capability interface implemented by every resource handler
pub trait Resource: Send + Sync + 'static {
    /// Entity type exposed by the resource
    type Entity: Entity;
    /// Persistence collaborator
    type Repository: Repository<Self::Entity>;
    /// Authorization collaborator
    type Policy: Policy<Self::Entity>;

    /// Stable resource name, used as the registry key
    fn name(&self) -> &str;

    /// The repository backing this resource
    fn repository(&self) -> &Self::Repository;

    /// The policy evaluated for this resource
    fn policy(&self) -> &Self::Policy;

    /// Input fields copied into instances on create and update
    fn permitted_fields(&self) -> &[&str] {
        &[]
    }

    /// Whitelisted client filters
    fn filter_spec(&self) -> Option<&FilterSpec> {
        None
    }

    /// Associations preloaded for list and item queries
    fn eager_load(&self) -> &[&str] {
        &[]
    }

    /// Associations nested into serialized output
    fn included_associations(&self) -> &[&str] {
        &[]
    }

    /// Computed attributes added to serialized output
    fn custom_attributes(&self) -> &[&str] {
        &[]
    }

    /// Fields a list request may sort by
    fn sortable_fields(&self) -> &[&str] {
        &[]
    }

    /// Actions that skip both authentication and the authorization gate
    fn exempt_actions(&self) -> &[Action] {
        &[]
    }

    /// Input schema registered for an action
    fn schema(&self, _action: Action) -> Option<&dyn Schema> {
        None
    }

    /// Envelope code for a successful action, overriding the configured default
    fn success_code(&self, _action: Action) -> Option<i64> {
        None
    }
}
