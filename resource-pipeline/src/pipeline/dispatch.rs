//! Dispatch pipeline
//!
//! [`Dispatcher`] drives one request through the fixed stage order
//!
//! ```text
//! authenticate -> validate -> load -> authorize -> execute -> serialize -> respond
//! ```
//!
//! and always produces exactly one [`Outcome`]. Any stage may abort; the
//! abort is translated into an envelope and no later stage runs. Panics raised
//! by collaborators are caught and reported as faults.
//!
//! Exempt actions skip both the authentication stage and the authorization
//! gate. Every other request is authorized exactly once, before anything
//! reaches the serializer.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::Instrument;

use super::error::{PipelineError, PipelineErrorKind};
use super::filter::apply_filters;
use super::pager::{paginate, PageRequest};
use super::request::ResourceRequest;
use super::serializer::Serializer;
use crate::auth::{Authenticator, Subject};
use crate::config::Config;
use crate::envelope::{Envelope, Outcome};
use crate::policy::{Policy, Target};
use crate::repository::{OrderDirection, Query, Repository};
use crate::resource::{Action, Entity, Resource};

/// Pipeline stage, recorded for logging when a request aborts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Resolving the subject
    Authenticating,
    /// Checking input against the action's schema
    Validating,
    /// Building the scoped query or the target instance
    Loading,
    /// Consulting the policy
    Authorizing,
    /// Running the action against the repository
    Executing,
    /// Producing the payload
    Serializing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticating => write!(f, "authenticating"),
            Self::Validating => write!(f, "validating"),
            Self::Loading => write!(f, "loading"),
            Self::Authorizing => write!(f, "authorizing"),
            Self::Executing => write!(f, "executing"),
            Self::Serializing => write!(f, "serializing"),
        }
    }
}

/// Object-safe view of a dispatcher, so resources with different entity
/// types can live in one registry
pub trait ResourceEndpoint: Send + Sync {
    /// Resource name
    fn name(&self) -> &str;

    /// Run a request through the pipeline
    fn dispatch(&self, request: ResourceRequest) -> BoxFuture<'_, Outcome>;
}

/// Runs requests for one resource
pub struct Dispatcher<R> {
    resource: R,
    config: Arc<Config>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl<R: Resource> Dispatcher<R> {
    /// Dispatcher without an authenticator; requests run with no subject
    pub fn new(resource: R, config: Arc<Config>) -> Self {
        Self {
            resource,
            config,
            authenticator: None,
        }
    }

    /// Resolve subjects with `authenticator`
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// The resource handler
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Shared configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a request through every stage and produce its outcome
    pub async fn handle(&self, request: ResourceRequest) -> Outcome {
        let action = request.action;
        let span = tracing::info_span!(
            "dispatch",
            resource = %self.resource.name(),
            action = %action,
        );

        let mut stage = Stage::Authenticating;
        let result = AssertUnwindSafe(self.run(request, &mut stage))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        let result = match result {
            Ok(result) => result,
            Err(payload) => Err(PipelineError::fault(panic_message(payload.as_ref()))),
        };

        span.in_scope(|| match result {
            Ok(envelope) => {
                tracing::debug!(code = envelope.code, "request completed");
                Outcome::Success(envelope)
            }
            Err(error) => {
                let error = error.with_action(action);
                log_abort(stage, &error);
                Outcome::Abort(error.to_envelope(&self.config.pipeline))
            }
        })
    }

    async fn run(
        &self,
        request: ResourceRequest,
        stage: &mut Stage,
    ) -> Result<Envelope, PipelineError> {
        let action = request.action;
        let exempt = self.resource.exempt_actions().contains(&action);

        *stage = Stage::Authenticating;
        let subject = if exempt {
            None
        } else {
            self.authenticate(&request).await?
        };

        *stage = Stage::Validating;
        if let Some(schema) = self.resource.schema(action) {
            schema
                .validate(&request.params)
                .map_err(PipelineError::validation)?;
        }

        let subject = subject.as_ref();
        match action {
            Action::List => self.list(&request, subject, exempt, stage).await,
            Action::Show => self.show(&request, subject, exempt, stage).await,
            Action::Create => self.create(&request, subject, exempt, stage).await,
            Action::Update => self.update(&request, subject, exempt, stage).await,
            Action::Destroy => self.destroy(&request, subject, exempt, stage).await,
        }
    }

    async fn authenticate(
        &self,
        request: &ResourceRequest,
    ) -> Result<Option<Subject>, PipelineError> {
        let Some(authenticator) = &self.authenticator else {
            return Ok(None);
        };
        match authenticator.lookup(request).await {
            Some(subject) => {
                tracing::debug!(subject = %subject.id, "subject resolved");
                Ok(Some(subject))
            }
            None => Err(PipelineError::unauthenticated()),
        }
    }

    async fn list(
        &self,
        request: &ResourceRequest,
        subject: Option<&Subject>,
        exempt: bool,
        stage: &mut Stage,
    ) -> Result<Envelope, PipelineError> {
        *stage = Stage::Loading;
        let query = self.scoped(subject).await?;
        let query = apply_filters(
            self.resource.repository(),
            query,
            request.filters().as_ref(),
            self.resource.filter_spec(),
        )?;
        let query = self.sorted(query, &request.params);

        *stage = Stage::Authorizing;
        self.authorize(subject, Action::List, Target::Collection(&query), exempt)
            .await?;

        *stage = Stage::Executing;
        let window = PageRequest::from_params(&request.params, &self.config.pipeline);
        let (items, pagination) = paginate(self.resource.repository(), &query, window).await?;

        *stage = Stage::Serializing;
        let data = self.serializer().many(&items);
        Ok(self.success(Action::List, data).with_pagination(pagination))
    }

    async fn show(
        &self,
        request: &ResourceRequest,
        subject: Option<&Subject>,
        exempt: bool,
        stage: &mut Stage,
    ) -> Result<Envelope, PipelineError> {
        *stage = Stage::Loading;
        let entity = self.load(request, subject).await?;

        *stage = Stage::Authorizing;
        self.authorize(subject, Action::Show, Target::Instance(&entity), exempt)
            .await?;

        *stage = Stage::Serializing;
        let data = self.serializer().one(&entity);
        Ok(self.success(Action::Show, data))
    }

    async fn create(
        &self,
        request: &ResourceRequest,
        subject: Option<&Subject>,
        exempt: bool,
        stage: &mut Stage,
    ) -> Result<Envelope, PipelineError> {
        *stage = Stage::Loading;
        let attributes = self.permitted(&request.params);
        let entity =
            <R::Entity as Entity>::build(&attributes).map_err(PipelineError::business)?;

        *stage = Stage::Authorizing;
        self.authorize(subject, Action::Create, Target::Instance(&entity), exempt)
            .await?;

        *stage = Stage::Executing;
        let saved = self.resource.repository().insert(entity).await?;

        *stage = Stage::Serializing;
        let data = self.serializer().one(&saved);
        Ok(self.success(Action::Create, data))
    }

    async fn update(
        &self,
        request: &ResourceRequest,
        subject: Option<&Subject>,
        exempt: bool,
        stage: &mut Stage,
    ) -> Result<Envelope, PipelineError> {
        *stage = Stage::Loading;
        let mut entity = self.load(request, subject).await?;

        *stage = Stage::Authorizing;
        self.authorize(subject, Action::Update, Target::Instance(&entity), exempt)
            .await?;

        *stage = Stage::Executing;
        let attributes = self.permitted(&request.params);
        entity
            .assign(&attributes)
            .map_err(PipelineError::business)?;
        let saved = self.resource.repository().update(entity).await?;

        *stage = Stage::Serializing;
        let data = self.serializer().one(&saved);
        Ok(self.success(Action::Update, data))
    }

    async fn destroy(
        &self,
        request: &ResourceRequest,
        subject: Option<&Subject>,
        exempt: bool,
        stage: &mut Stage,
    ) -> Result<Envelope, PipelineError> {
        *stage = Stage::Loading;
        let entity = self.load(request, subject).await?;

        *stage = Stage::Authorizing;
        self.authorize(subject, Action::Destroy, Target::Instance(&entity), exempt)
            .await?;

        *stage = Stage::Executing;
        let id = entity.id().unwrap_or_default();
        if !self.resource.repository().delete(&id).await? {
            return Err(PipelineError::not_found(self.resource.name(), id));
        }

        let code = self.success_code(Action::Destroy);
        Ok(Envelope::success(
            code,
            &self.config.pipeline.messages.destroyed,
            Value::Null,
        ))
    }

    /// Accessible collection for the subject, with eager loads applied
    async fn scoped(&self, subject: Option<&Subject>) -> Result<Query, PipelineError> {
        let base = self.resource.repository().scope();
        let query = self.resource.policy().scope(subject, base).await?;
        Ok(query.include(self.resource.eager_load().iter().copied()))
    }

    /// Load the addressed instance from the accessible set
    async fn load(
        &self,
        request: &ResourceRequest,
        subject: Option<&Subject>,
    ) -> Result<R::Entity, PipelineError> {
        let name = self.resource.name();
        let Some(id) = request.id.as_deref() else {
            return Err(PipelineError::not_found(name, ""));
        };

        let query = self.scoped(subject).await?;
        self.resource
            .repository()
            .find(&query, id)
            .await?
            .ok_or_else(|| PipelineError::not_found(name, id))
    }

    async fn authorize(
        &self,
        subject: Option<&Subject>,
        action: Action,
        target: Target<'_, R::Entity>,
        exempt: bool,
    ) -> Result<(), PipelineError> {
        if exempt {
            return Ok(());
        }
        if self
            .resource
            .policy()
            .authorize(subject, action, target)
            .await?
        {
            Ok(())
        } else {
            Err(PipelineError::forbidden())
        }
    }

    fn sorted(&self, query: Query, params: &Map<String, Value>) -> Query {
        let Some(field) = params.get("sort").and_then(Value::as_str) else {
            return query;
        };
        if !self.resource.sortable_fields().contains(&field) {
            tracing::debug!(sort = %field, "ignoring sort field outside the whitelist");
            return query;
        }

        let direction = match params.get("order").and_then(Value::as_str) {
            Some(order) if order.eq_ignore_ascii_case("desc") => OrderDirection::Descending,
            _ => OrderDirection::Ascending,
        };
        query.order_by(field, direction)
    }

    /// Input restricted to the permitted fields
    fn permitted(&self, params: &Map<String, Value>) -> Map<String, Value> {
        self.resource
            .permitted_fields()
            .iter()
            .filter_map(|field| {
                params
                    .get(*field)
                    .map(|value| ((*field).to_string(), value.clone()))
            })
            .collect()
    }

    fn serializer(&self) -> Serializer<'_> {
        Serializer::new(
            self.resource.included_associations(),
            self.resource.custom_attributes(),
        )
    }

    fn success_code(&self, action: Action) -> i64 {
        self.resource
            .success_code(action)
            .unwrap_or(self.config.pipeline.success_code)
    }

    fn success(&self, action: Action, data: Value) -> Envelope {
        Envelope::success(
            self.success_code(action),
            &self.config.pipeline.messages.success,
            data,
        )
    }
}

impl<R: Resource> ResourceEndpoint for Dispatcher<R> {
    fn name(&self) -> &str {
        self.resource.name()
    }

    fn dispatch(&self, request: ResourceRequest) -> BoxFuture<'_, Outcome> {
        Box::pin(self.handle(request))
    }
}

fn log_abort(stage: Stage, error: &PipelineError) {
    match error.kind {
        PipelineErrorKind::Fault => {
            tracing::error!(stage = %stage, error = %error, "request failed");
        }
        kind => {
            tracing::warn!(
                stage = %stage,
                kind = %kind,
                code = error.code(),
                "request aborted"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic".to_string()
    }
}
