//! In-memory repository
//!
//! A [`Repository`] over a `Vec` guarded by a `tokio` lock. Conditions are
//! evaluated against [`Entity::attributes`], comparing loosely so that the
//! text a client sends (`"5"`) matches a stored number (`5`). Useful for
//! tests, prototypes and small reference data sets.
//!
//! # Example
//!
//! ```rust,ignore
//! use resource_pipeline::repository::{FilterCondition, MemoryRepository};
//!
//! let repository = MemoryRepository::new("posts")
//!     .with_records(seed_posts())
//!     .with_scope("tagged", |query, tag| {
//!         query.filter(FilterCondition::like("tags", format!("%{tag}%")))
//!     });
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::error::{RepositoryError, RepositoryOperation};
use super::query::{FilterCondition, FilterOperator, FilterValue, OrderDirection, Pagination, Query};
use super::traits::{Page, Repository, RepositoryResult};
use crate::resource::Entity;
use crate::validation::FieldErrors;

type ScopeFn = Arc<dyn Fn(Query, &str) -> Query + Send + Sync>;
type ValidatorFn<E> = Arc<dyn Fn(&E) -> Result<(), FieldErrors> + Send + Sync>;

/// Repository keeping every record in memory
pub struct MemoryRepository<E> {
    resource: String,
    records: RwLock<Vec<E>>,
    scopes: HashMap<String, ScopeFn>,
    validator: Option<ValidatorFn<E>>,
    last_includes: RwLock<Vec<String>>,
}

impl<E: Entity> MemoryRepository<E> {
    /// Create an empty repository for a resource type
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            records: RwLock::new(Vec::new()),
            scopes: HashMap::new(),
            validator: None,
            last_includes: RwLock::new(Vec::new()),
        }
    }

    /// Seed the repository; records without an id are assigned one
    #[must_use]
    pub fn with_records(mut self, records: impl IntoIterator<Item = E>) -> Self {
        let records = records
            .into_iter()
            .map(|mut record| {
                if record.id().is_none() {
                    record.set_id(generate_id());
                }
                record
            })
            .collect();
        self.records = RwLock::new(records);
        self
    }

    /// Register a named scope reachable from custom filters
    #[must_use]
    pub fn with_scope<F>(mut self, name: impl Into<String>, scope: F) -> Self
    where
        F: Fn(Query, &str) -> Query + Send + Sync + 'static,
    {
        self.scopes.insert(name.into(), Arc::new(scope));
        self
    }

    /// Record-level validation run before every insert and update
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&E) -> Result<(), FieldErrors> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Snapshot of every stored record
    pub async fn all(&self) -> Vec<E> {
        self.records.read().await.clone()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the repository holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Associations requested by the most recently executed query
    pub async fn last_includes(&self) -> Vec<String> {
        self.last_includes.read().await.clone()
    }

    fn check(&self, entity: &E, operation: RepositoryOperation) -> RepositoryResult<()> {
        match &self.validator {
            Some(validator) => validator(entity).map_err(|errors| {
                RepositoryError::invalid(errors).with_operation(operation)
            }),
            None => Ok(()),
        }
    }

    async fn remember_includes(&self, query: &Query) {
        *self.last_includes.write().await = query.includes().to_vec();
    }
}

impl<E: Entity> Repository<E> for MemoryRepository<E> {
    fn scope(&self) -> Query {
        Query::new(self.resource.clone())
    }

    async fn fetch_page(&self, query: &Query, pagination: Pagination) -> RepositoryResult<Page<E>> {
        self.remember_includes(query).await;
        let records = self.records.read().await;

        let mut matched: Vec<(Map<String, Value>, &E)> = records
            .iter()
            .map(|record| (record.attributes(), record))
            .filter(|(attributes, _)| matches_all(attributes, query.conditions()))
            .collect();

        if let Some((field, direction)) = query.ordering() {
            matched.sort_by(|(a, _), (b, _)| {
                let ordering = compare_values(a.get(field), b.get(field));
                match direction {
                    OrderDirection::Ascending => ordering,
                    OrderDirection::Descending => ordering.reverse(),
                }
            });
        }

        let total = matched.len() as u64;
        let offset = usize::try_from(pagination.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(pagination.limit).unwrap_or(usize::MAX);
        let items = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect();

        Ok(Page::new(items, total))
    }

    async fn find(&self, query: &Query, id: &str) -> RepositoryResult<Option<E>> {
        self.remember_includes(query).await;
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|record| {
                record.id().as_deref() == Some(id)
                    && matches_all(&record.attributes(), query.conditions())
            })
            .cloned())
    }

    async fn insert(&self, mut entity: E) -> RepositoryResult<E> {
        self.check(&entity, RepositoryOperation::Insert)?;
        let mut records = self.records.write().await;

        let id = match entity.id() {
            Some(id) => id,
            None => {
                let id = generate_id();
                entity.set_id(id.clone());
                id
            }
        };
        if records.iter().any(|record| record.id().as_deref() == Some(id.as_str())) {
            return Err(RepositoryError::already_exists(self.resource.clone(), id));
        }

        records.push(entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: E) -> RepositoryResult<E> {
        self.check(&entity, RepositoryOperation::Update)?;
        let id = entity.id().unwrap_or_default();
        let mut records = self.records.write().await;

        match records
            .iter_mut()
            .find(|record| record.id().as_deref() == Some(id.as_str()))
        {
            Some(slot) => {
                *slot = entity.clone();
                Ok(entity)
            }
            None => Err(RepositoryError::not_found(self.resource.clone(), id)
                .with_operation(RepositoryOperation::Update)),
        }
    }

    async fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.id().as_deref() != Some(id));
        Ok(records.len() < before)
    }

    fn named_scope(&self, name: &str, query: &Query, value: &str) -> Option<Query> {
        self.scopes
            .get(name)
            .map(|scope| scope(query.clone(), value))
    }
}

fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

fn matches_all(attributes: &Map<String, Value>, conditions: &[FilterCondition]) -> bool {
    conditions
        .iter()
        .all(|condition| matches(attributes, condition))
}

fn matches(attributes: &Map<String, Value>, condition: &FilterCondition) -> bool {
    let Some(actual) = attributes.get(&condition.field) else {
        return false;
    };
    if actual.is_null() {
        return false;
    }

    match condition.operator {
        FilterOperator::Equal => loose_eq(actual, &condition.value),
        FilterOperator::NotEqual => !loose_eq(actual, &condition.value),
        FilterOperator::GreaterThan => compare_to(actual, &condition.value) == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => matches!(
            compare_to(actual, &condition.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOperator::LessThan => compare_to(actual, &condition.value) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => matches!(
            compare_to(actual, &condition.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOperator::Like => like(&text(actual), &condition.value.to_string()),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_eq(actual: &Value, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::String(s) => text(actual) == *s,
        FilterValue::Integer(n) => number(actual) == Some(*n as f64),
        FilterValue::Float(n) => number(actual) == Some(*n),
        FilterValue::Boolean(b) => actual.as_bool() == Some(*b) || text(actual) == b.to_string(),
    }
}

fn compare_to(actual: &Value, bound: &FilterValue) -> Option<Ordering> {
    match bound {
        FilterValue::Integer(n) => number(actual)?.partial_cmp(&(*n as f64)),
        FilterValue::Float(n) => number(actual)?.partial_cmp(n),
        FilterValue::String(s) => match actual {
            Value::String(a) => Some(a.as_str().cmp(s.as_str())),
            other => number(other)?.partial_cmp(&s.trim().parse::<f64>().ok()?),
        },
        FilterValue::Boolean(_) => None,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => text(a).cmp(&text(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// SQL `LIKE` matching: `%` is any run of characters, `_` exactly one
fn like(candidate: &str, pattern: &str) -> bool {
    let candidate: Vec<char> = candidate.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut c, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == candidate[c]) {
            c += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, c));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            c = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|ch| *ch == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        id: Option<String>,
        name: String,
        weight: i64,
    }

    impl Widget {
        fn new(id: &str, name: &str, weight: i64) -> Self {
            Self {
                id: Some(id.to_string()),
                name: name.to_string(),
                weight,
            }
        }
    }

    impl Entity for Widget {
        fn id(&self) -> Option<String> {
            self.id.clone()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }

        fn attributes(&self) -> Map<String, Value> {
            let mut map = Map::new();
            map.insert("id".into(), json!(self.id));
            map.insert("name".into(), json!(self.name));
            map.insert("weight".into(), json!(self.weight));
            map
        }

        fn build(attributes: &Map<String, Value>) -> Result<Self, FieldErrors> {
            Ok(Self {
                id: None,
                name: attributes
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                weight: attributes.get("weight").and_then(Value::as_i64).unwrap_or(0),
            })
        }

        fn assign(&mut self, attributes: &Map<String, Value>) -> Result<(), FieldErrors> {
            if let Some(name) = attributes.get("name").and_then(Value::as_str) {
                self.name = name.to_string();
            }
            Ok(())
        }
    }

    fn repository() -> MemoryRepository<Widget> {
        MemoryRepository::new("widgets").with_records(vec![
            Widget::new("1", "sprocket", 5),
            Widget::new("2", "gear", 10),
            Widget::new("3", "big gear", 15),
        ])
    }

    #[test]
    fn test_like_patterns() {
        assert!(like("big gear", "%gear%"));
        assert!(like("gear", "%gear%"));
        assert!(like("gear", "g_ar"));
        assert!(!like("sprocket", "%gear%"));
        assert!(like("anything", "%"));
        assert!(!like("gear", "gear_"));
    }

    #[test]
    fn test_loose_equality() {
        assert!(loose_eq(&json!(5), &FilterValue::String("5".into())));
        assert!(loose_eq(&json!("5"), &FilterValue::Integer(5)));
        assert!(loose_eq(&json!(true), &FilterValue::String("true".into())));
        assert!(!loose_eq(&json!("gear"), &FilterValue::String("Gear".into())));
    }

    #[tokio::test]
    async fn test_fetch_page_filters_and_counts() {
        let repository = repository();
        let query = repository
            .scope()
            .filter(FilterCondition::gte("weight", 10_i64));

        let page = repository.fetch_page(&query, Pagination::page(1, 1)).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_page_orders_results() {
        let repository = repository();
        let query = repository
            .scope()
            .order_by("weight", OrderDirection::Descending);

        let page = repository.fetch_page(&query, Pagination::default()).await.unwrap();
        let weights: Vec<i64> = page.items.iter().map(|w| w.weight).collect();
        assert_eq!(weights, vec![15, 10, 5]);
    }

    #[tokio::test]
    async fn test_fetch_page_past_end_is_empty() {
        let repository = repository();
        let page = repository
            .fetch_page(&repository.scope(), Pagination::page(9, 20))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_find_respects_query() {
        let repository = repository();
        let scoped = repository
            .scope()
            .filter(FilterCondition::like("name", "%gear%"));

        assert!(repository.find(&scoped, "2").await.unwrap().is_some());
        assert!(repository.find(&scoped, "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let repository = repository();
        let mut widget = Widget::new("x", "cog", 1);
        widget.id = None;

        let saved = repository.insert(widget).await.unwrap();
        assert!(saved.id.is_some());
        assert_eq!(repository.len().await, 4);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_rejected() {
        let repository = repository();
        let error = repository
            .insert(Widget::new("1", "dup", 1))
            .await
            .unwrap_err();
        assert!(error.is_rejection());
    }

    #[tokio::test]
    async fn test_validator_rejects_record() {
        let repository = repository().with_validator(|widget: &Widget| {
            if widget.name.is_empty() {
                Err(FieldErrors::new().with("name", "can't be blank"))
            } else {
                Ok(())
            }
        });

        let error = repository
            .insert(Widget::new("9", "", 1))
            .await
            .unwrap_err();
        assert_eq!(error.rejection_messages(), vec!["name can't be blank".to_string()]);
        assert_eq!(repository.len().await, 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repository = repository();
        let mut widget = repository
            .find(&repository.scope(), "2")
            .await
            .unwrap()
            .unwrap();
        widget.name = "cog".into();
        repository.update(widget).await.unwrap();

        let reloaded = repository.find(&repository.scope(), "2").await.unwrap().unwrap();
        assert_eq!(reloaded.name, "cog");

        assert!(repository.delete("2").await.unwrap());
        assert!(!repository.delete("2").await.unwrap());
        assert_eq!(repository.len().await, 2);
    }

    #[tokio::test]
    async fn test_named_scope_lookup() {
        let repository = repository().with_scope("heavier_than", |query, value| {
            query.filter(FilterCondition::gt("weight", FilterValue::infer(value)))
        });

        let query = repository
            .named_scope("heavier_than", &repository.scope(), "9")
            .unwrap();
        let page = repository.fetch_page(&query, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 2);

        assert!(repository.named_scope("missing", &repository.scope(), "x").is_none());
    }

    #[tokio::test]
    async fn test_named_scope_operators() {
        let repository = repository()
            .with_scope("lighter_than", |query, value| {
                query.filter(FilterCondition::lt("weight", FilterValue::infer(value)))
            })
            .with_scope("except", |query, name| query.filter(FilterCondition::ne("name", name)));

        let lighter = repository
            .named_scope("lighter_than", &repository.scope(), "10")
            .unwrap();
        let page = repository.fetch_page(&lighter, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "sprocket");

        let except = repository
            .named_scope("except", &repository.scope(), "gear")
            .unwrap();
        let page = repository.fetch_page(&except, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|widget| widget.name != "gear"));
    }

    #[tokio::test]
    async fn test_records_last_includes() {
        let repository = repository();
        let query = repository.scope().include(["parts"]);
        repository.fetch_page(&query, Pagination::default()).await.unwrap();
        assert_eq!(repository.last_includes().await, vec!["parts".to_string()]);
    }
}
