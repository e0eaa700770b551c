//! The request pipeline
//!
//! Each request runs through the same stages regardless of resource:
//!
//! - **Authentication**: resolve the [`Subject`](crate::auth::Subject)
//! - **Validation**: check input against the action's schema
//! - **Loading**: scope, filter, sort and eager-load a query, or load one instance
//! - **Authorization**: consult the policy exactly once
//! - **Execution**: page, create, update or delete through the repository
//! - **Serialization**: attributes, nested associations, computed attributes
//! - **Response**: wrap everything in an [`Envelope`](crate::envelope::Envelope)
//!
//! Stage failures become [`PipelineError`]s and are translated into envelopes
//! by the dispatcher.

mod dispatch;
mod error;
mod filter;
mod pager;
mod request;
mod serializer;

pub use dispatch::{Dispatcher, ResourceEndpoint, Stage};
pub use error::{PipelineError, PipelineErrorKind};
pub use filter::{apply_filters, FilterKind, FilterSpec};
pub use pager::{paginate, PageRequest};
pub use request::ResourceRequest;
pub use serializer::Serializer;
