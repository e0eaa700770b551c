//! Filter engine
//!
//! A resource whitelists the filters a client may apply with a [`FilterSpec`]:
//! a map from filter key to [`FilterKind`]. Client filters are applied in the
//! order the client sent them; keys outside the whitelist are skipped.
//!
//! | Kind        | Client value      | Predicate                      |
//! |-------------|-------------------|--------------------------------|
//! | `exact`     | `v`               | `field = v`                    |
//! | `range`     | `"min,max"`       | `min <= field <= max`          |
//! | `substring` | `v`               | `field LIKE '%v%'`             |
//! | `custom`    | `v`               | repository named scope `(v)`   |
//!
//! Filter specs deserialize from configuration:
//!
//! ```rust
//! use resource_pipeline::pipeline::{FilterKind, FilterSpec};
//!
//! let spec: FilterSpec = serde_json::from_str(
//!     r#"{"status": "exact", "age": "range", "tag": {"custom": "tagged"}}"#,
//! ).unwrap();
//! assert_eq!(spec.get("tag"), Some(&FilterKind::Custom("tagged".into())));
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::PipelineError;
use crate::repository::{FilterCondition, FilterValue, Query, Repository};
use crate::resource::Entity;
use crate::validation::FieldErrors;

/// How a whitelisted filter key is applied
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawFilterKind")]
pub enum FilterKind {
    /// Equality on the field named by the key
    Exact,
    /// Inclusive bounds from a `"min,max"` value
    Range,
    /// Case-sensitive `LIKE '%v%'` on the field
    Substring,
    /// Delegates to the repository's named scope
    Custom(String),
    /// Unrecognized kind; applying it is a no-op
    Unknown(String),
}

impl FilterKind {
    /// Parse a kind name; `custom:<scope>` selects a named scope
    pub fn parse(name: &str) -> Self {
        match name {
            "exact" => Self::Exact,
            "range" => Self::Range,
            "substring" => Self::Substring,
            other => match other.strip_prefix("custom:") {
                Some(scope) if !scope.is_empty() => Self::Custom(scope.to_string()),
                _ => Self::Unknown(other.to_string()),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFilterKind {
    Name(String),
    Custom { custom: String },
}

impl From<RawFilterKind> for FilterKind {
    fn from(raw: RawFilterKind) -> Self {
        match raw {
            RawFilterKind::Name(name) => Self::parse(&name),
            RawFilterKind::Custom { custom } => Self::Custom(custom),
        }
    }
}

/// Whitelist of client filters for one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    kinds: BTreeMap<String, FilterKind>,
}

impl FilterSpec {
    /// Empty whitelist
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist a key with a kind
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, kind: FilterKind) -> Self {
        self.kinds.insert(key.into(), kind);
        self
    }

    /// Whitelist an equality filter
    #[must_use]
    pub fn exact(self, key: impl Into<String>) -> Self {
        self.with(key, FilterKind::Exact)
    }

    /// Whitelist a range filter
    #[must_use]
    pub fn range(self, key: impl Into<String>) -> Self {
        self.with(key, FilterKind::Range)
    }

    /// Whitelist a substring filter
    #[must_use]
    pub fn substring(self, key: impl Into<String>) -> Self {
        self.with(key, FilterKind::Substring)
    }

    /// Whitelist a filter backed by a repository named scope
    #[must_use]
    pub fn custom(self, key: impl Into<String>, scope: impl Into<String>) -> Self {
        self.with(key, FilterKind::Custom(scope.into()))
    }

    /// Kind registered for a key
    pub fn get(&self, key: &str) -> Option<&FilterKind> {
        self.kinds.get(key)
    }

    /// Whether no filter is whitelisted
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Number of whitelisted filters
    pub fn len(&self) -> usize {
        self.kinds.len()
    }
}

/// Narrow `query` with the client's filters
///
/// Without a spec, or without client filters, the query is returned
/// unchanged.
///
/// # Errors
///
/// A range value that is not exactly two non-empty comma-separated bounds is
/// a validation error keyed by `filters.<key>`.
pub fn apply_filters<E, R>(
    repository: &R,
    mut query: Query,
    filters: Option<&Map<String, Value>>,
    spec: Option<&FilterSpec>,
) -> Result<Query, PipelineError>
where
    E: Entity,
    R: Repository<E>,
{
    let (Some(filters), Some(spec)) = (filters, spec) else {
        return Ok(query);
    };

    for (key, raw) in filters {
        let Some(kind) = spec.get(key) else {
            tracing::debug!(filter = %key, "ignoring filter outside the whitelist");
            continue;
        };
        let Some(value) = filter_text(raw) else {
            tracing::debug!(filter = %key, "ignoring non-scalar filter value");
            continue;
        };

        query = match kind {
            FilterKind::Exact => {
                query.filter(FilterCondition::eq(key.as_str(), FilterValue::infer(&value)))
            }
            FilterKind::Range => {
                let (min, max) = parse_range(key, &value)?;
                query
                    .filter(FilterCondition::gte(key.as_str(), min))
                    .filter(FilterCondition::lte(key.as_str(), max))
            }
            FilterKind::Substring => {
                query.filter(FilterCondition::like(key.as_str(), format!("%{value}%")))
            }
            FilterKind::Custom(scope) => match repository.named_scope(scope, &query, &value) {
                Some(scoped) => scoped,
                None => {
                    tracing::warn!(filter = %key, scope = %scope, "named scope not found, filter ignored");
                    query
                }
            },
            FilterKind::Unknown(name) => {
                tracing::warn!(filter = %key, kind = %name, "unknown filter kind, filter ignored");
                query
            }
        };
    }

    Ok(query)
}

fn filter_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_range(key: &str, value: &str) -> Result<(FilterValue, FilterValue), PipelineError> {
    let bounds: Vec<&str> = value.split(',').map(str::trim).collect();
    match bounds.as_slice() {
        [min, max] if !min.is_empty() && !max.is_empty() => {
            Ok((FilterValue::infer(min), FilterValue::infer(max)))
        }
        _ => Err(PipelineError::validation(FieldErrors::new().with(
            format!("filters.{key}"),
            "must be a range in the form 'min,max'",
        ))),
    }
}
