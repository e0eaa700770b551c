//! Pipeline error types
//!
//! Every stage that aborts a request does so with a [`PipelineError`]. The
//! dispatcher translates it into the single [`Envelope`] returned to the
//! client; the error itself never crosses the pipeline boundary.
//!
//! | Kind             | Envelope code | `msg`                                  |
//! |------------------|---------------|----------------------------------------|
//! | `Validation`     | 400           | field → messages map                   |
//! | `Authentication` | 403           | configured access-denied message       |
//! | `Authorization`  | 403           | configured forbidden message           |
//! | `NotFound`       | 403           | configured not-found message           |
//! | `Business`       | -1            | record messages joined with `", "`     |
//! | `Fault`          | 500           | configured fault message               |
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::config::PipelineConfig;
//! use resource_pipeline::pipeline::{PipelineError, PipelineErrorKind};
//!
//! let error = PipelineError::not_found("posts", "42");
//! assert_eq!(error.kind, PipelineErrorKind::NotFound);
//!
//! let envelope = error.to_envelope(&PipelineConfig::default());
//! assert_eq!(envelope.code, 403);
//! assert_eq!(envelope.message(), Some("resource not found"));
//! ```

use std::fmt;

use crate::config::PipelineConfig;
use crate::envelope::Envelope;
use crate::policy::PolicyError;
use crate::repository::{RepositoryError, RepositoryErrorKind};
use crate::resource::Action;
use crate::validation::FieldErrors;

/// Category of pipeline error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineErrorKind {
    /// Input failed the action's schema, or a filter value is malformed
    Validation,
    /// No subject could be resolved
    Authentication,
    /// The policy refused the action
    Authorization,
    /// Instance absent or outside the accessible set
    NotFound,
    /// The record was rejected when building or persisting it
    Business,
    /// Anything unhandled
    Fault,
}

impl fmt::Display for PipelineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::NotFound => write!(f, "not_found"),
            Self::Business => write!(f, "business"),
            Self::Fault => write!(f, "fault"),
        }
    }
}

impl PipelineErrorKind {
    /// Envelope code for this error kind
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Validation => 400,
            Self::Authentication | Self::Authorization | Self::NotFound => 403,
            Self::Business => -1,
            Self::Fault => 500,
        }
    }
}

/// Structured pipeline error with action context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    /// The action being performed, when known
    pub action: Option<Action>,
    /// The category of error
    pub kind: PipelineErrorKind,
    /// Human-readable error message, used for logging
    pub message: String,
    /// Per-field messages for validation and business errors
    pub field_errors: FieldErrors,
    /// The type of entity involved
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl PipelineError {
    /// Create a new pipeline error
    pub fn new(kind: PipelineErrorKind, message: impl Into<String>) -> Self {
        Self {
            action: None,
            kind,
            message: message.into(),
            field_errors: FieldErrors::new(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Input failed validation
    pub fn validation(field_errors: FieldErrors) -> Self {
        Self {
            message: field_errors.to_string(),
            field_errors,
            ..Self::new(PipelineErrorKind::Validation, "")
        }
    }

    /// No subject could be resolved
    pub fn unauthenticated() -> Self {
        Self::new(PipelineErrorKind::Authentication, "no subject resolved")
    }

    /// The policy refused the action
    pub fn forbidden() -> Self {
        Self::new(PipelineErrorKind::Authorization, "policy denied the action")
    }

    /// Instance absent or outside the accessible set
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::NotFound, "Entity not found").with_entity(entity_type, entity_id)
    }

    /// The record was rejected
    pub fn business(field_errors: FieldErrors) -> Self {
        Self {
            message: field_errors.full_messages().join(", "),
            field_errors,
            ..Self::new(PipelineErrorKind::Business, "")
        }
    }

    /// Unhandled failure
    pub fn fault(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::Fault, message)
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

    /// Set the action that caused the error
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Envelope code for this error
    pub fn code(&self) -> i64 {
        self.kind.code()
    }

    /// Translate into the client-facing envelope
    pub fn to_envelope(&self, config: &PipelineConfig) -> Envelope {
        let messages = &config.messages;
        let code = self.code();
        match self.kind {
            PipelineErrorKind::Validation => Envelope::failure_with(code, self.field_errors.to_value()),
            PipelineErrorKind::Authentication => Envelope::failure(code, &messages.access_denied),
            PipelineErrorKind::Authorization => Envelope::failure(code, &messages.forbidden),
            PipelineErrorKind::NotFound => Envelope::failure(code, &messages.not_found),
            PipelineErrorKind::Business => Envelope::failure(code, &self.message),
            PipelineErrorKind::Fault if config.expose_fault_details => {
                Envelope::failure(code, &self.message)
            }
            PipelineErrorKind::Fault => Envelope::failure(code, &messages.fault),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipeline {} error", self.kind)?;
        if let Some(action) = self.action {
            write!(f, " during {action}")?;
        }
        write!(f, ": {}", self.message)?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{entity_type}: {entity_id}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for PipelineError {}

impl From<RepositoryError> for PipelineError {
    fn from(err: RepositoryError) -> Self {
        let mut error = if err.is_rejection() {
            Self {
                message: err.rejection_messages().join(", "),
                field_errors: err.field_errors.clone(),
                ..Self::new(PipelineErrorKind::Business, "")
            }
        } else if err.kind == RepositoryErrorKind::NotFound {
            Self::new(PipelineErrorKind::NotFound, err.message.clone())
        } else {
            Self::fault(err.to_string())
        };
        error.entity_type = err.entity_type;
        error.entity_id = err.entity_id;
        error
    }
}

impl From<PolicyError> for PipelineError {
    fn from(err: PolicyError) -> Self {
        Self::fault(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryOperation;
    use serde_json::json;

    #[test]
    fn test_kind_codes() {
        assert_eq!(PipelineErrorKind::Validation.code(), 400);
        assert_eq!(PipelineErrorKind::Authentication.code(), 403);
        assert_eq!(PipelineErrorKind::Authorization.code(), 403);
        assert_eq!(PipelineErrorKind::NotFound.code(), 403);
        assert_eq!(PipelineErrorKind::Business.code(), -1);
        assert_eq!(PipelineErrorKind::Fault.code(), 500);
    }

    #[test]
    fn test_validation_envelope_carries_field_map() {
        let error = PipelineError::validation(FieldErrors::new().with("title", "can't be blank"));
        let envelope = error.to_envelope(&PipelineConfig::default());
        assert_eq!(envelope.code, 400);
        assert_eq!(envelope.msg, json!({"title": ["can't be blank"]}));
        assert_eq!(envelope.data, serde_json::Value::Null);
    }

    #[test]
    fn test_configured_messages() {
        let mut config = PipelineConfig::default();
        config.messages.access_denied = "login required".into();
        config.messages.forbidden = "not yours".into();

        let envelope = PipelineError::unauthenticated().to_envelope(&config);
        assert_eq!(envelope.message(), Some("login required"));

        let envelope = PipelineError::forbidden().to_envelope(&config);
        assert_eq!(envelope.message(), Some("not yours"));
    }

    #[test]
    fn test_fault_message_hidden_by_default() {
        let error = PipelineError::fault("connection reset by peer");
        let envelope = error.to_envelope(&PipelineConfig::default());
        assert_eq!(envelope.code, 500);
        assert_eq!(envelope.message(), Some("internal server error"));

        let envelope = error.to_envelope(&PipelineConfig::default().with_fault_details(true));
        assert_eq!(envelope.message(), Some("connection reset by peer"));
    }

    #[test]
    fn test_business_joins_messages() {
        let error = PipelineError::business(
            FieldErrors::new()
                .with("body", "can't be blank")
                .with("title", "is too long (maximum is 5 characters)"),
        );
        let envelope = error.to_envelope(&PipelineConfig::default());
        assert_eq!(envelope.code, -1);
        assert_eq!(
            envelope.message(),
            Some("body can't be blank, title is too long (maximum is 5 characters)")
        );
    }

    #[test]
    fn test_from_repository_rejection() {
        let error: PipelineError = RepositoryError::invalid(
            FieldErrors::new().with("email", "has already been taken"),
        )
        .into();
        assert_eq!(error.kind, PipelineErrorKind::Business);
        assert_eq!(error.message, "email has already been taken");
    }

    #[test]
    fn test_from_repository_not_found() {
        let error: PipelineError = RepositoryError::not_found("posts", "9").into();
        assert_eq!(error.kind, PipelineErrorKind::NotFound);
        assert_eq!(error.entity_id.as_deref(), Some("9"));
    }

    #[test]
    fn test_from_repository_fault() {
        let error: PipelineError =
            RepositoryError::connection_failed("pool exhausted").with_operation(RepositoryOperation::FetchPage).into();
        assert_eq!(error.kind, PipelineErrorKind::Fault);
        assert!(error.message.contains("pool exhausted"));
    }

    #[test]
    fn test_display_with_action_and_entity() {
        let error = PipelineError::not_found("posts", "3").with_action(Action::Show);
        assert_eq!(
            error.to_string(),
            "Pipeline not_found error during show: Entity not found [posts: 3]"
        );
    }
}
