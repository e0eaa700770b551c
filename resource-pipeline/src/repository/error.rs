//! Repository error types
//!
//! Structured errors raised by the persistence layer. The pipeline translates
//! them into envelopes: rejections of the data itself (validation, constraint,
//! duplicate) become business errors, a missing record becomes the masked
//! not-found, and everything else is an unhandled fault.
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::repository::{RepositoryError, RepositoryErrorKind};
//! use resource_pipeline::validation::FieldErrors;
//!
//! let error = RepositoryError::invalid(FieldErrors::new().with("email", "has already been taken"));
//! assert!(matches!(error.kind, RepositoryErrorKind::ValidationFailed));
//! assert!(error.is_rejection());
//! ```

use std::fmt;

use crate::validation::FieldErrors;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Finding a single entity by ID
    Find,
    /// Fetching a page of entities
    FetchPage,
    /// Inserting a new entity
    Insert,
    /// Saving changes to an existing entity
    Update,
    /// Deleting an entity
    Delete,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find"),
            Self::FetchPage => write!(f, "fetch_page"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Entity was not found
    NotFound,
    /// Entity already exists (duplicate key)
    AlreadyExists,
    /// Database constraint violation
    ConstraintViolation,
    /// Record-level validation rejected the entity
    ValidationFailed,
    /// Failed to connect to storage
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Underlying database error
    DatabaseError,
    /// Serialization or deserialization error
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Per-field messages for record-level rejections
    pub field_errors: FieldErrors,
    /// The type of entity involved (e.g., "posts")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            field_errors: FieldErrors::new(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Entity not found
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Find,
            RepositoryErrorKind::NotFound,
            "Entity not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Duplicate entity
    pub fn already_exists(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Insert,
            RepositoryErrorKind::AlreadyExists,
            "Entity already exists",
        )
        .with_entity(entity_type, identifier)
    }

    /// Record-level validation failure carrying per-field messages
    pub fn invalid(field_errors: FieldErrors) -> Self {
        Self {
            message: field_errors.to_string(),
            field_errors,
            ..Self::new(
                RepositoryOperation::Insert,
                RepositoryErrorKind::ValidationFailed,
                "",
            )
        }
    }

    /// Constraint violation
    pub fn constraint_violation(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConstraintViolation, message)
    }

    /// Connection failure
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Find,
            RepositoryErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Timeout
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Generic database error
    pub fn database_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::DatabaseError, message)
    }

    /// Add entity context
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether storage rejected the data itself rather than failing
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ValidationFailed
                | RepositoryErrorKind::ConstraintViolation
                | RepositoryErrorKind::AlreadyExists
        )
    }

    /// Messages describing a rejection, one per field error or the bare message
    pub fn rejection_messages(&self) -> Vec<String> {
        if self.field_errors.is_empty() {
            vec![self.message.clone()]
        } else {
            self.field_errors.full_messages()
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{entity_type}: {entity_id}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}
