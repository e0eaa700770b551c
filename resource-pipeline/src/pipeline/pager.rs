//! Pager
//!
//! Reads `page` and `per_page` from the request, clamps them to the
//! configured bounds and executes the query for that window. A page past the
//! end is not an error: it yields no items and still reports the totals.

use serde_json::{Map, Value};

use crate::config::PipelineConfig;
use crate::envelope::PaginationMeta;
use crate::repository::{Pagination, Query, Repository, RepositoryResult};
use crate::resource::Entity;

/// Page window requested by a list call, already clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page, within `1..=max_per_page`
    pub per_page: u32,
}

impl PageRequest {
    /// Read the window from request parameters
    ///
    /// ```rust
    /// use resource_pipeline::config::PipelineConfig;
    /// use resource_pipeline::pipeline::PageRequest;
    /// use serde_json::json;
    ///
    /// let params = json!({"page": "0", "per_page": 5000});
    /// let request = PageRequest::from_params(params.as_object().unwrap(), &PipelineConfig::default());
    /// assert_eq!(request.page, 1);
    /// assert_eq!(request.per_page, 100);
    /// ```
    pub fn from_params(params: &Map<String, Value>, config: &PipelineConfig) -> Self {
        let max_per_page = config.max_per_page.max(1);
        let page = read_number(params.get("page")).unwrap_or(1).max(1);
        let per_page = read_number(params.get("per_page"))
            .unwrap_or(config.default_per_page)
            .clamp(1, max_per_page);
        Self { page, per_page }
    }

    /// Offset/limit for the repository
    pub fn pagination(&self) -> Pagination {
        Pagination::page(u64::from(self.page), u64::from(self.per_page))
    }
}

fn read_number(value: Option<&Value>) -> Option<u32> {
    let n = match value? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    Some(u32::try_from(n).unwrap_or(u32::MAX))
}

/// Execute `query` for one window and describe the whole result set
pub async fn paginate<E, R>(
    repository: &R,
    query: &Query,
    request: PageRequest,
) -> RepositoryResult<(Vec<E>, PaginationMeta)>
where
    E: Entity,
    R: Repository<E>,
{
    let page = repository.fetch_page(query, request.pagination()).await?;
    let meta = PaginationMeta::new(request.page, request.per_page, page.total);
    Ok((page.items, meta))
}
