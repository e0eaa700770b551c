//! Repository trait definitions
//!
//! The persistence collaborator used by the pipeline. Methods use RPITIT
//! (Return Position Impl Trait In Traits) so implementations can be written
//! as plain `async fn` without `async_trait`.
//!
//! Every read takes the [`Query`] accumulated by the pipeline, so a record the
//! policy scoped away is never visible to `find` or `fetch_page`.
//!
//! # Example
//!
//! ```rust,ignore
//! use resource_pipeline::repository::{Page, Pagination, Query, Repository, RepositoryResult};
//!
//! struct PostRepository {
//!     pool: PgPool,
//! }
//!
//! impl Repository<Post> for PostRepository {
//!     fn scope(&self) -> Query {
//!         Query::new("posts")
//!     }
//!
//!     async fn fetch_page(&self, query: &Query, pagination: Pagination) -> RepositoryResult<Page<Post>> {
//!         // Translate query conditions into a WHERE clause
//!         todo!()
//!     }
//!     // ... other methods
//! }
//! ```

use std::future::Future;

use super::error::RepositoryError;
use super::query::{Pagination, Query};
use crate::resource::Entity;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// One window of a query result together with the size of the whole set
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
    /// Items inside the requested window
    pub items: Vec<E>,
    /// Number of items matching the query, ignoring the window
    pub total: u64,
}

impl<E> Page<E> {
    /// Create a page
    pub fn new(items: Vec<E>, total: u64) -> Self {
        Self { items, total }
    }

    /// A page with no items over an empty set
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Persistence operations the pipeline needs for one entity type
pub trait Repository<E: Entity>: Send + Sync {
    /// Query ranging over the full collection
    fn scope(&self) -> Query;

    /// Execute a query and return one window of the result
    ///
    /// `total` counts the whole filtered set. A window past the end yields no
    /// items and is not an error.
    fn fetch_page(
        &self,
        query: &Query,
        pagination: Pagination,
    ) -> impl Future<Output = RepositoryResult<Page<E>>> + Send;

    /// Find an entity by identifier among the records matched by `query`
    ///
    /// Returns `Ok(None)` when no accessible record has this identifier.
    fn find(
        &self,
        query: &Query,
        id: &str,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Persist a new entity, returning it with storage-assigned fields set
    ///
    /// # Errors
    ///
    /// Returns a [`RepositoryError`] whose `is_rejection()` is true when the
    /// record itself is rejected.
    fn insert(&self, entity: E) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Persist changes to an existing entity
    fn update(&self, entity: E) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Delete an entity by identifier
    ///
    /// Returns `true` if the entity was deleted, `false` if it didn't exist.
    fn delete(&self, id: &str) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Apply a named scope operation with a client-supplied argument
    ///
    /// Returns `None` when the repository has no scope with this name.
    fn named_scope(&self, _name: &str, _query: &Query, _value: &str) -> Option<Query> {
        None
    }
}
