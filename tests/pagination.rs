//! Cursor pagination across the three query paths.

mod common;

use common::{backend, ctx};
use guac_kv::model::{ArtifactInputSpec, ArtifactSpec, IdOrArtifactInput};

fn artifacts(n: usize) -> Vec<IdOrArtifactInput> {
    (0..n)
        .map(|i| ArtifactInputSpec::new("sha256", format!("{i:064x}")).into())
        .collect()
}

#[test]
fn test_scan_pages_cover_everything_once() {
    let backend = backend();
    let mut ids = backend.ingest_artifacts(&ctx(), &artifacts(7)).unwrap();
    ids.sort();

    let spec = ArtifactSpec::default();
    let mut seen = Vec::new();
    let mut after: Option<String> = None;
    let mut pages = 0;
    loop {
        let page = backend
            .artifacts_list(&ctx(), &spec, after.as_deref(), Some(3))
            .unwrap();
        pages += 1;
        assert!(page.edges.len() <= 3);
        seen.extend(page.edges.iter().map(|e| e.node.id.clone()));
        if !page.page_info.has_next_page {
            break;
        }
        after = page.page_info.end_cursor.clone();
    }
    assert_eq!(pages, 3);
    seen.sort();
    assert_eq!(seen, ids);
}

#[test]
fn test_scan_total_counts_remaining_keys() {
    let backend = backend();
    backend.ingest_artifacts(&ctx(), &artifacts(5)).unwrap();
    let spec = ArtifactSpec::default();

    let first = backend.artifacts_list(&ctx(), &spec, None, Some(2)).unwrap();
    assert_eq!(first.total_count, 5);

    let second = backend
        .artifacts_list(&ctx(), &spec, first.page_info.end_cursor.as_deref(), Some(2))
        .unwrap();
    assert_eq!(second.total_count, 3);
    assert_eq!(second.page_info.start_cursor, second.edges.first().map(|e| e.cursor.clone()));
    assert_eq!(second.page_info.end_cursor, second.edges.last().map(|e| e.cursor.clone()));
}

#[test]
fn test_id_filter_short_circuits() {
    let backend = backend();
    let ids = backend.ingest_artifacts(&ctx(), &artifacts(3)).unwrap();

    let spec = ArtifactSpec {
        id: Some(ids[1].clone()),
        // Ignored when an id is given.
        algorithm: Some("md5".to_string()),
        digest: None,
    };
    let page = backend.artifacts_list(&ctx(), &spec, None, Some(10)).unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.edges[0].cursor, ids[1]);

    let unknown = ArtifactSpec {
        id: Some("ffffffffffffffff".to_string()),
        ..ArtifactSpec::default()
    };
    let page = backend.artifacts_list(&ctx(), &unknown, None, None).unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total_count, 0);
    assert!(page.page_info.start_cursor.is_none());
}

#[test]
fn test_no_matches_is_empty_connection() {
    let backend = backend();
    backend.ingest_artifacts(&ctx(), &artifacts(3)).unwrap();
    let spec = ArtifactSpec {
        algorithm: Some("sha512".to_string()),
        ..ArtifactSpec::default()
    };
    let page = backend.artifacts_list(&ctx(), &spec, None, Some(2)).unwrap();
    assert!(page.is_empty());
    assert!(!page.page_info.has_next_page);
    assert_eq!(page.page_info.end_cursor, None);
}
