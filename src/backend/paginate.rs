//! Cursor pagination.
//!
//! Two strategies share [`PageBuilder`]:
//!
//! - [`paginate_candidates`] walks a candidate identifier list taken from
//!   back-references. Candidates are sorted and deduplicated first; the cursor is
//!   compared with `>` and `total_count` counts the matches after the cursor.
//! - [`paginate_scan`] walks every sorted key of a collection. The cursor is the
//!   last identifier seen; `total_count` is the number of keys after the cursor's
//!   position, not the number of matches.

use crate::error::GuacResult;
use crate::model::{Connection, PageEdge, PageInfo};

pub(crate) struct PageBuilder<T> {
    first: Option<usize>,
    edges: Vec<PageEdge<T>>,
    has_next_page: bool,
}

impl<T> PageBuilder<T> {
    pub(crate) fn new(first: Option<usize>) -> Self {
        Self {
            first,
            edges: Vec::new(),
            has_next_page: false,
        }
    }

    /// Adds a match. Once the page is full, a further match only records that
    /// another page exists.
    pub(crate) fn push(&mut self, cursor: String, node: T) {
        match self.first {
            Some(first) if self.edges.len() >= first => self.has_next_page = true,
            _ => self.edges.push(PageEdge { cursor, node }),
        }
    }

    pub(crate) const fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    /// Builds the connection. An empty page has no cursors and a zero count.
    pub(crate) fn finish(self, total_count: usize) -> Connection<T> {
        let (Some(start), Some(end)) = (self.edges.first(), self.edges.last()) else {
            return Connection::empty();
        };
        let page_info = PageInfo {
            has_next_page: self.has_next_page,
            start_cursor: Some(start.cursor.clone()),
            end_cursor: Some(end.cursor.clone()),
        };
        Connection {
            total_count,
            page_info,
            edges: self.edges,
        }
    }
}

/// Paginates over back-reference candidates. `visit` returns the node for a
/// matching candidate.
pub(crate) fn paginate_candidates<T>(
    mut candidates: Vec<String>,
    after: Option<&str>,
    first: Option<usize>,
    mut visit: impl FnMut(&str) -> GuacResult<Option<T>>,
) -> GuacResult<Connection<T>> {
    candidates.sort_unstable();
    candidates.dedup();

    let mut page = PageBuilder::new(first);
    let mut total = 0;
    for id in candidates {
        if after.is_some_and(|a| id.as_str() <= a) {
            continue;
        }
        if let Some(node) = visit(&id)? {
            total += 1;
            page.push(id, node);
        }
    }
    Ok(page.finish(total))
}

/// Paginates over every key of a collection. `keys` must be sorted; `visit`
/// returns `(identifier, node)` for a matching key.
pub(crate) fn paginate_scan<T>(
    keys: &[String],
    after: Option<&str>,
    first: Option<usize>,
    mut visit: impl FnMut(&str) -> GuacResult<Option<(String, T)>>,
) -> GuacResult<Connection<T>> {
    let mut page = PageBuilder::new(first);
    let mut total = keys.len();
    let mut current_page = after.is_none();

    for (i, key) in keys.iter().enumerate() {
        let Some((id, node)) = visit(key)? else {
            continue;
        };
        if !current_page {
            if after == Some(id.as_str()) {
                total = keys.len() - (i + 1);
                current_page = true;
            }
            continue;
        }
        page.push(id, node);
        if page.has_next_page() {
            break;
        }
    }
    Ok(page.finish(total))
}
