//! Persistence abstractions
//!
//! The pipeline never talks to storage directly. It accumulates a [`Query`]
//! (policy scope, client filters, eager loads, ordering) and hands it to the
//! resource's [`Repository`], which executes it.
//!
//! # Features
//!
//! - **Queries**: [`Query`] and [`FilterCondition`] describe what to fetch
//! - **Pagination**: [`Pagination`] limits the returned window
//! - **Errors**: [`RepositoryError`] separates rejected records from faults
//! - **Memory store**: [`MemoryRepository`] (feature `memory-store`)
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::repository::{FilterCondition, Query};
//!
//! let query = Query::new("posts").filter(FilterCondition::like("title", "%rust%"));
//! assert_eq!(query.conditions()[0].to_string(), "title LIKE %rust%");
//! ```

mod error;
#[cfg(feature = "memory-store")]
mod memory;
mod query;
mod traits;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
#[cfg(feature = "memory-store")]
pub use memory::MemoryRepository;
pub use query::{
    FilterCondition, FilterOperator, FilterValue, OrderDirection, Pagination, Query,
};
pub use traits::{Page, Repository, RepositoryResult};
