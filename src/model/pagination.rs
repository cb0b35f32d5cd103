//! Cursor-paginated connections.
//!
//! Cursors are node identifiers. They are opaque to callers; the only supported
//! operation is passing a returned cursor back as `after`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEdge<T> {
    pub cursor: String,
    pub node: T,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub total_count: usize,
    pub page_info: PageInfo,
    pub edges: Vec<PageEdge<T>>,
}

impl<T> Connection<T> {
    /// A connection with no edges and no cursors.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            page_info: PageInfo::default(),
            edges: Vec::new(),
        }
    }

    /// A connection holding exactly one node.
    #[must_use]
    pub fn single(cursor: String, node: T) -> Self {
        Self {
            total_count: 1,
            page_info: PageInfo {
                has_next_page: false,
                start_cursor: Some(cursor.clone()),
                end_cursor: Some(cursor.clone()),
            },
            edges: vec![PageEdge { cursor, node }],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Consumes the connection and returns its nodes in page order.
    #[must_use]
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_wire_shape() {
        let conn = Connection::single("0000000000000001".to_string(), 7_u32);
        let json = serde_json::to_value(&conn).unwrap();
        assert_eq!(json["totalCount"], 1);
        assert_eq!(json["pageInfo"]["hasNextPage"], false);
        assert_eq!(json["pageInfo"]["startCursor"], "0000000000000001");
        assert_eq!(json["edges"][0]["node"], 7);
    }

    #[test]
    fn test_empty_connection_has_no_cursors() {
        let conn: Connection<u32> = Connection::empty();
        assert!(conn.is_empty());
        assert_eq!(conn.page_info.start_cursor, None);
        assert_eq!(conn.page_info.end_cursor, None);
    }
}
