//! Authorization policies
//!
//! A [`Policy`] answers two questions for a resource: which records a subject
//! may see at all (`scope`), and whether a subject may perform an action on a
//! collection or on one instance (`authorize`). The pipeline consults
//! `authorize` exactly once per non-exempt request, before anything reaches the
//! serializer.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::auth::Subject;
use crate::repository::Query;
use crate::resource::{Action, Entity};

/// What an authorization decision is about
#[derive(Debug)]
pub enum Target<'a, E> {
    /// The (scoped, filtered) collection a list will read from
    Collection(&'a Query),
    /// A single loaded or newly built instance
    Instance(&'a E),
}

impl<E> Clone for Target<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Target<'_, E> {}

/// Failure of the policy evaluator itself, as opposed to a denial
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("policy evaluation failed: {0}")]
pub struct PolicyError(pub String);

/// Authorization rules for one entity type
pub trait Policy<E: Entity>: Send + Sync {
    /// Narrow a query to the records the subject may access
    fn scope(
        &self,
        subject: Option<&Subject>,
        query: Query,
    ) -> impl Future<Output = Result<Query, PolicyError>> + Send;

    /// Decide whether the subject may perform `action` on `target`
    fn authorize(
        &self,
        subject: Option<&Subject>,
        action: Action,
        target: Target<'_, E>,
    ) -> impl Future<Output = Result<bool, PolicyError>> + Send;
}

/// Grants every action and leaves scopes untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl<E: Entity> Policy<E> for AllowAll {
    async fn scope(&self, _subject: Option<&Subject>, query: Query) -> Result<Query, PolicyError> {
        Ok(query)
    }

    async fn authorize(
        &self,
        _subject: Option<&Subject>,
        _action: Action,
        _target: Target<'_, E>,
    ) -> Result<bool, PolicyError> {
        Ok(true)
    }
}

/// Denies every action
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl<E: Entity> Policy<E> for DenyAll {
    async fn scope(&self, _subject: Option<&Subject>, query: Query) -> Result<Query, PolicyError> {
        Ok(query)
    }

    async fn authorize(
        &self,
        _subject: Option<&Subject>,
        _action: Action,
        _target: Target<'_, E>,
    ) -> Result<bool, PolicyError> {
        Ok(false)
    }
}

type ScopeRule = Arc<dyn Fn(Option<&Subject>, Query) -> Query + Send + Sync>;
type AuthorizeRule<E> =
    Arc<dyn for<'a> Fn(Option<&'a Subject>, Action, Target<'a, E>) -> bool + Send + Sync>;

/// Policy assembled from synchronous closures
///
/// Unset rules behave like [`AllowAll`].
///
/// ```rust,ignore
/// let policy = FnPolicy::new()
///     .with_scope(|subject, query| match subject {
///         Some(subject) => query.filter(FilterCondition::eq("owner_id", subject.id.as_str())),
///         None => query,
///     })
///     .with_authorize(|subject, action, _target| action == Action::List || subject.is_some_and(|s| s.has_role("admin")));
/// ```
pub struct FnPolicy<E> {
    scope: Option<ScopeRule>,
    authorize: Option<AuthorizeRule<E>>,
}

impl<E> Default for FnPolicy<E> {
    fn default() -> Self {
        Self {
            scope: None,
            authorize: None,
        }
    }
}

impl<E> fmt::Debug for FnPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPolicy")
            .field("scope", &self.scope.is_some())
            .field("authorize", &self.authorize.is_some())
            .finish()
    }
}

impl<E: Entity> FnPolicy<E> {
    /// Policy with no rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scope rule
    #[must_use]
    pub fn with_scope<F>(mut self, rule: F) -> Self
    where
        F: Fn(Option<&Subject>, Query) -> Query + Send + Sync + 'static,
    {
        self.scope = Some(Arc::new(rule));
        self
    }

    /// Set the authorization rule
    #[must_use]
    pub fn with_authorize<F>(mut self, rule: F) -> Self
    where
        F: for<'a> Fn(Option<&'a Subject>, Action, Target<'a, E>) -> bool + Send + Sync + 'static,
    {
        self.authorize = Some(Arc::new(rule));
        self
    }
}

impl<E: Entity> Policy<E> for FnPolicy<E> {
    async fn scope(&self, subject: Option<&Subject>, query: Query) -> Result<Query, PolicyError> {
        Ok(match &self.scope {
            Some(rule) => rule(subject, query),
            None => query,
        })
    }

    async fn authorize(
        &self,
        subject: Option<&Subject>,
        action: Action,
        target: Target<'_, E>,
    ) -> Result<bool, PolicyError> {
        Ok(match &self.authorize {
            Some(rule) => rule(subject, action, target),
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::FilterCondition;
    use crate::validation::FieldErrors;
    use serde_json::{json, Map, Value};

    #[derive(Debug, Clone)]
    struct Note {
        owner: String,
    }

    impl Entity for Note {
        fn id(&self) -> Option<String> {
            None
        }

        fn set_id(&mut self, _id: String) {}

        fn attributes(&self) -> Map<String, Value> {
            let mut map = Map::new();
            map.insert("owner".into(), json!(self.owner));
            map
        }

        fn build(_attributes: &Map<String, Value>) -> Result<Self, FieldErrors> {
            Ok(Self {
                owner: String::new(),
            })
        }

        fn assign(&mut self, _attributes: &Map<String, Value>) -> Result<(), FieldErrors> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_allow_all() {
        let query = Query::new("notes");
        let scoped = Policy::<Note>::scope(&AllowAll, None, query.clone()).await.unwrap();
        assert_eq!(scoped, query);
        assert!(AllowAll
            .authorize(None, Action::Destroy, Target::<Note>::Collection(&query))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_deny_all() {
        let note = Note {
            owner: "user:1".into(),
        };
        assert!(!DenyAll
            .authorize(None, Action::Show, Target::Instance(&note))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_fn_policy_rules() {
        let policy = FnPolicy::<Note>::new()
            .with_scope(|subject, query| match subject {
                Some(subject) => query.filter(FilterCondition::eq("owner", subject.id.as_str())),
                None => query,
            })
            .with_authorize(|subject, _action, target| match (subject, target) {
                (Some(subject), Target::Instance(note)) => note.owner == subject.id,
                (Some(_), Target::Collection(_)) => true,
                (None, _) => false,
            });

        let subject = Subject::new("user:1");
        let scoped = policy
            .scope(Some(&subject), Query::new("notes"))
            .await
            .unwrap();
        assert_eq!(scoped.conditions().len(), 1);

        let mine = Note {
            owner: "user:1".into(),
        };
        let theirs = Note {
            owner: "user:2".into(),
        };
        assert!(policy
            .authorize(Some(&subject), Action::Update, Target::Instance(&mine))
            .await
            .unwrap());
        assert!(!policy
            .authorize(Some(&subject), Action::Update, Target::Instance(&theirs))
            .await
            .unwrap());
        assert!(!policy
            .authorize(None, Action::List, Target::Collection(&scoped))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_fn_policy_without_scope_rule_keeps_query() {
        let policy = FnPolicy::<Note>::new().with_authorize(|_, _, _| false);
        let query = Query::new("notes").filter(FilterCondition::eq("owner", "user:1"));

        let scoped = policy.scope(None, query.clone()).await.unwrap();
        assert_eq!(scoped, query);
    }

    #[tokio::test]
    async fn test_fn_policy_defaults_to_allow() {
        let policy = FnPolicy::<Note>::new();
        assert!(policy
            .authorize(None, Action::Create, Target::Collection(&Query::new("notes")))
            .await
            .unwrap());
    }
}
