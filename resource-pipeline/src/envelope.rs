//! The uniform response envelope
//!
//! Every request handled by the pipeline terminates in exactly one
//! [`Envelope`]:
//!
//! ```json
//! { "code": 200, "msg": "Success", "data": {...}, "pagination": {...} }
//! ```
//!
//! `pagination` is only present for list results. Clients branch on `code`,
//! never on the transport status, which is always `200 OK`.
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::envelope::{Envelope, PaginationMeta};
//! use serde_json::json;
//!
//! let envelope = Envelope::success(200, "Success", json!([{"id": "1"}]))
//!     .with_pagination(PaginationMeta::new(1, 20, 1));
//! assert_eq!(envelope.code, 200);
//! assert_eq!(envelope.pagination.unwrap().total_pages, 1);
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pagination metadata attached to list envelopes
///
/// # Example
///
/// ```rust
/// use resource_pipeline::envelope::PaginationMeta;
///
/// let pagination = PaginationMeta::new(2, 20, 50);
/// assert_eq!(pagination.current_page, 2);
/// assert_eq!(pagination.total_pages, 3);
/// assert_eq!(pagination.total_count, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    /// Current page number (1-indexed)
    pub current_page: u32,
    /// Number of items per page
    pub per_page: u32,
    /// Total number of pages for the filtered set
    pub total_pages: u32,
    /// Total number of items in the filtered set
    pub total_count: u64,
}

impl PaginationMeta {
    /// Create pagination metadata, computing `total_pages`
    #[must_use]
    pub fn new(current_page: u32, per_page: u32, total_count: u64) -> Self {
        let per_page = per_page.max(1);
        Self {
            current_page,
            per_page,
            total_pages: calculate_total_pages(total_count, per_page),
            total_count,
        }
    }

    /// Offset of the first item on the current page
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.current_page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// Calculate total pages, rounding up
fn calculate_total_pages(total: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page);
    let pages = total.div_ceil(per_page);
    pages.min(u64::from(u32::MAX)) as u32
}

/// Response envelope returned for every action and every error path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Application-level result code
    pub code: i64,
    /// Human-readable message, or a field→errors map for schema failures
    pub msg: Value,
    /// Payload (`null` on failure and for destroy)
    pub data: Value,
    /// Present only for list results
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pagination: Option<PaginationMeta>,
}

impl Envelope {
    /// Create a success envelope
    pub fn success(code: i64, msg: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            msg: Value::String(msg.into()),
            data,
            pagination: None,
        }
    }

    /// Create a failure envelope with a plain message and no payload
    pub fn failure(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: Value::String(msg.into()),
            data: Value::Null,
            pagination: None,
        }
    }

    /// Create a failure envelope whose message is structured (e.g. field errors)
    pub fn failure_with(code: i64, msg: Value) -> Self {
        Self {
            code,
            msg,
            data: Value::Null,
            pagination: None,
        }
    }

    /// Attach pagination metadata
    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationMeta) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// The message as text, if it is a plain string
    pub fn message(&self) -> Option<&str> {
        self.msg.as_str()
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        // Failure is carried by `code`; the transport status stays 200.
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Terminal result of a dispatched request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Every stage completed
    Success(Envelope),
    /// A stage aborted the pipeline
    Abort(Envelope),
}

impl Outcome {
    /// Borrow the envelope
    pub fn envelope(&self) -> &Envelope {
        match self {
            Self::Success(envelope) | Self::Abort(envelope) => envelope,
        }
    }

    /// Take the envelope
    pub fn into_envelope(self) -> Envelope {
        match self {
            Self::Success(envelope) | Self::Abort(envelope) => envelope,
        }
    }

    /// Whether the pipeline ran to completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Shorthand for the envelope code
    pub fn code(&self) -> i64 {
        self.envelope().code
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        self.into_envelope().into_response()
    }
}
