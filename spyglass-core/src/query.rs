//! Cursor-paginated upstream query abstraction.

use crate::domain::RepositoryNode;
use crate::error::Result;

/// The upstream query kinds used by the audit pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Full repository metadata (topics, vulnerability alerts, visibility).
    Repositories,
    /// Branch/commit activity.
    ActivityRefs,
    /// Pull request activity.
    ActivityPullRequests,
}

impl QueryKind {
    /// Upstream query identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Repositories => "all",
            QueryKind::ActivityRefs => "refs",
            QueryKind::ActivityPullRequests => "prs",
        }
    }
}

/// A single page request against the upstream query service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Query kind to issue.
    pub kind: QueryKind,
    /// Organization to query.
    pub org: String,
    /// Requested batch size. Upstream may return fewer nodes.
    pub page_size: u32,
    /// Opaque continuation cursor from the previous page, if any.
    pub cursor: Option<String>,
}

/// One page of upstream results.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    /// Repository-shaped records in this batch.
    pub nodes: Vec<RepositoryNode>,
    /// Whether another page follows.
    pub has_next_page: bool,
    /// Cursor to pass for the next page.
    pub end_cursor: Option<String>,
}

/// Abstraction over the upstream cursor-paginated query API.
#[cfg_attr(test, mockall::automock)]
pub trait PagedQuery {
    /// Fetch a single page of results.
    fn fetch_page(&self, request: &PageRequest) -> Result<QueryPage>;
}

/// Fetch every page for a query, concatenating batches in page order.
///
/// Cursors are opaque: each request passes exactly the cursor returned by
/// the previous page. Batch sizes are not assumed uniform, and there is no
/// upper bound on page count; bounding a stuck upstream is the caller's
/// responsibility.
pub fn fetch_all(
    client: &dyn PagedQuery,
    kind: QueryKind,
    org: &str,
    page_size: u32,
) -> Result<Vec<RepositoryNode>> {
    let mut nodes = Vec::new();
    let mut cursor = None;

    loop {
        let page = client.fetch_page(&PageRequest {
            kind,
            org: org.to_string(),
            page_size,
            cursor: cursor.clone(),
        })?;
        nodes.extend(page.nodes);
        if !page.has_next_page {
            break;
        }
        cursor = page.end_cursor;
    }

    log::debug!("fetched {} {} nodes for {org}", nodes.len(), kind.as_str());
    Ok(nodes)
}
