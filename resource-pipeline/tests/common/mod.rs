//! Shared fixtures: a `posts` resource over the in-memory repository

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use resource_pipeline::prelude::{
    Action, BearerTokenAuthenticator, Config, Entity, FieldErrors, FieldRules, FieldSchema,
    FilterCondition, FilterSpec, FnPolicy, MemoryRepository, PipelineConfig, Policy, PolicyError,
    Query, Resource, ResourceRegistry, Schema, Subject, Target,
};
use serde_json::{json, Map, Value};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const EDITOR_TOKEN: &str = "editor-token";
pub const READER_TOKEN: &str = "reader-token";

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    pub status: String,
    pub author: String,
    pub views: i64,
    pub tags: String,
}

impl Post {
    pub fn new(id: &str, title: &str, status: &str, views: i64) -> Self {
        Self {
            id: Some(id.to_string()),
            title: title.to_string(),
            body: format!("{title} body text"),
            status: status.to_string(),
            author: "user:editor".to_string(),
            views,
            tags: String::new(),
        }
    }

    pub fn tagged(mut self, tags: &str) -> Self {
        self.tags = tags.to_string();
        self
    }
}

fn text(attributes: &Map<String, Value>, field: &str) -> Option<String> {
    attributes.get(field).and_then(Value::as_str).map(str::to_string)
}

impl Entity for Post {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn attributes(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".into(), json!(self.id));
        map.insert("title".into(), json!(self.title));
        map.insert("body".into(), json!(self.body));
        map.insert("status".into(), json!(self.status));
        map.insert("views".into(), json!(self.views));
        map.insert("tags".into(), json!(self.tags));
        map
    }

    fn association(&self, name: &str) -> Option<Value> {
        match name {
            "author" => Some(json!({ "id": self.author })),
            _ => None,
        }
    }

    fn computed(&self, name: &str) -> Option<Value> {
        match name {
            "word_count" => Some(json!(self.body.split_whitespace().count())),
            _ => None,
        }
    }

    fn build(attributes: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mut post = Self {
            id: None,
            title: String::new(),
            body: String::new(),
            status: "draft".to_string(),
            author: "user:editor".to_string(),
            views: 0,
            tags: String::new(),
        };
        post.assign(attributes)?;
        Ok(post)
    }

    fn assign(&mut self, attributes: &Map<String, Value>) -> Result<(), FieldErrors> {
        if let Some(title) = text(attributes, "title") {
            self.title = title;
        }
        if let Some(body) = text(attributes, "body") {
            self.body = body;
        }
        if let Some(status) = text(attributes, "status") {
            self.status = status;
        }
        if let Some(views) = attributes.get("views") {
            self.views = views
                .as_i64()
                .ok_or_else(|| FieldErrors::new().with("views", "is not a number"))?;
        }
        Ok(())
    }
}

/// Non-admins only see published posts; writes need the editor or admin role
pub fn post_policy() -> FnPolicy<Post> {
    FnPolicy::new()
        .with_scope(|subject, query| match subject {
            Some(subject) if subject.has_role("admin") => query,
            _ => query.filter(FilterCondition::eq("status", "published")),
        })
        .with_authorize(|subject, action, _target| {
            let Some(subject) = subject else {
                return false;
            };
            match action {
                Action::List | Action::Show => true,
                Action::Create | Action::Update | Action::Destroy => {
                    subject.has_role("editor") || subject.has_role("admin")
                }
            }
        })
}

/// Wraps a policy and counts authorization calls
pub struct CountingPolicy<P> {
    inner: P,
    calls: Arc<AtomicUsize>,
}

impl<P> CountingPolicy<P> {
    pub fn new(inner: P) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl<E: Entity, P: Policy<E>> Policy<E> for CountingPolicy<P> {
    async fn scope(&self, subject: Option<&Subject>, query: Query) -> Result<Query, PolicyError> {
        self.inner.scope(subject, query).await
    }

    async fn authorize(
        &self,
        subject: Option<&Subject>,
        action: Action,
        target: Target<'_, E>,
    ) -> Result<bool, PolicyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.authorize(subject, action, target).await
    }
}

pub struct Posts<P> {
    pub repository: MemoryRepository<Post>,
    pub policy: P,
    pub filters: Option<FilterSpec>,
    create_schema: FieldSchema,
    update_schema: FieldSchema,
}

impl<P: Policy<Post> + 'static> Posts<P> {
    pub fn new(policy: P, records: Vec<Post>) -> Self {
        let repository = MemoryRepository::new("posts")
            .with_records(records)
            .with_scope("tagged", |query, tag| {
                query.filter(FilterCondition::like("tags", format!("%{tag}%")))
            })
            .with_validator(|post: &Post| {
                if post.title == "duplicate" {
                    Err(FieldErrors::new()
                        .with("title", "has already been taken")
                        .with("body", "is reserved"))
                } else {
                    Ok(())
                }
            });

        Self {
            repository,
            policy,
            filters: Some(
                FilterSpec::new()
                    .exact("status")
                    .range("views")
                    .substring("title")
                    .custom("tag", "tagged"),
            ),
            create_schema: FieldSchema::new()
                .field("title", FieldRules::new().required().string().max_length(100))
                .field("body", FieldRules::new().required().string())
                .field(
                    "status",
                    FieldRules::new().one_of(["draft", "published"]),
                ),
            update_schema: FieldSchema::new()
                .field("title", FieldRules::new().string().max_length(100))
                .field("status", FieldRules::new().one_of(["draft", "published"])),
        }
    }

    pub fn without_filters(mut self) -> Self {
        self.filters = None;
        self
    }
}

impl<P: Policy<Post> + 'static> Resource for Posts<P> {
    type Entity = Post;
    type Repository = MemoryRepository<Post>;
    type Policy = P;

    fn name(&self) -> &str {
        "posts"
    }

    fn repository(&self) -> &Self::Repository {
        &self.repository
    }

    fn policy(&self) -> &Self::Policy {
        &self.policy
    }

    fn permitted_fields(&self) -> &[&str] {
        &["title", "body", "status", "views"]
    }

    fn filter_spec(&self) -> Option<&FilterSpec> {
        self.filters.as_ref()
    }

    fn eager_load(&self) -> &[&str] {
        &["author"]
    }

    fn included_associations(&self) -> &[&str] {
        &["author"]
    }

    fn custom_attributes(&self) -> &[&str] {
        &["word_count"]
    }

    fn sortable_fields(&self) -> &[&str] {
        &["views", "title"]
    }

    fn schema(&self, action: Action) -> Option<&dyn Schema> {
        match action {
            Action::Create => Some(&self.create_schema),
            Action::Update => Some(&self.update_schema),
            _ => None,
        }
    }

    fn success_code(&self, action: Action) -> Option<i64> {
        (action == Action::Create).then_some(201)
    }
}

pub fn seed() -> Vec<Post> {
    vec![
        Post::new("1", "Hello Rust", "published", 5).tagged("rust,intro"),
        Post::new("2", "Async Rust", "published", 10).tagged("rust,async"),
        Post::new("3", "Draft notes", "draft", 7),
        Post::new("4", "Tokio tips", "published", 12).tagged("async"),
        Post::new("5", "Serde deep dive", "published", 3).tagged("rust"),
    ]
}

pub fn authenticator() -> BearerTokenAuthenticator {
    BearerTokenAuthenticator::new()
        .with_token(ADMIN_TOKEN, Subject::new("user:admin").with_role("admin"))
        .with_token(EDITOR_TOKEN, Subject::new("user:editor").with_role("editor"))
        .with_token(READER_TOKEN, Subject::new("user:reader"))
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.pipeline = PipelineConfig::default()
        .with_auth_lookup("bearer")
        .with_page_sizes(2, 50);
    config
}

pub fn registry_with<P: Policy<Post> + 'static>(resource: Posts<P>) -> ResourceRegistry {
    ResourceRegistry::builder()
        .with_config(config())
        .authenticator("bearer", Arc::new(authenticator()))
        .resource(resource)
        .build()
        .expect("registry builds")
}

pub fn registry() -> ResourceRegistry {
    registry_with(Posts::new(post_policy(), seed()))
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}
