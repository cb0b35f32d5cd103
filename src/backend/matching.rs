//! Sparse predicate helpers.

use crate::error::GuacResult;

/// True when a filter field is set and differs from the stored value.
pub(crate) fn no_match<T: PartialEq + ?Sized>(filter: Option<&T>, value: &T) -> bool {
    filter.is_some_and(|f| f != value)
}

/// [`no_match`] for strings, comparing the filter in lowercase.
///
/// Used for fields that are lowercased on ingest.
pub(crate) fn no_match_lower(filter: Option<&str>, value: &str) -> bool {
    filter.is_some_and(|f| f.to_lowercase() != value)
}

/// Multiset match of reference filters against stored reference identifiers.
///
/// Filters that resolve exactly (`exact` returns an identifier) go first: each
/// must remove one occurrence of its identifier from the remaining values. The
/// others then each remove the first remaining value that `partial` accepts.
/// A filter that finds nothing to consume fails the whole match, so two filters
/// naming the same reference need two occurrences of it.
pub(crate) fn match_multiset<S>(
    filters: &[S],
    values: &[String],
    mut exact: impl FnMut(&S) -> GuacResult<Option<String>>,
    mut partial: impl FnMut(&S, &str) -> GuacResult<bool>,
) -> GuacResult<bool> {
    let mut remaining: Vec<&str> = values.iter().map(String::as_str).collect();
    let mut pending = Vec::new();

    for filter in filters {
        match exact(filter)? {
            Some(id) => pending.push(Ok(id)),
            None => pending.push(Err(filter)),
        }
    }

    for id in pending.iter().filter_map(|p| p.as_ref().ok()) {
        let Some(pos) = remaining.iter().position(|v| v == id) else {
            return Ok(false);
        };
        remaining.remove(pos);
    }

    for filter in pending.iter().filter_map(|p| p.as_ref().err()) {
        let mut found = None;
        for (i, v) in remaining.iter().enumerate() {
            if partial(filter, v)? {
                found = Some(i);
                break;
            }
        }
        let Some(pos) = found else {
            return Ok(false);
        };
        remaining.remove(pos);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }

    /// Filters are either `"=X"` (resolves exactly to X) or `"~X"` (partial on X).
    fn run(filters: &[&str], values: &[&str]) -> bool {
        match_multiset(
            filters,
            &ids(values),
            |f| Ok(f.strip_prefix('=').map(ToString::to_string)),
            |f, v| Ok(f.strip_prefix('~').is_some_and(|p| v.starts_with(p))),
        )
        .unwrap()
    }

    #[test]
    fn test_no_match_wildcard() {
        assert!(!no_match::<str>(None, "x"));
        assert!(!no_match(Some("x"), "x"));
        assert!(no_match(Some("y"), "x"));
    }

    #[test]
    fn test_no_match_lower() {
        assert!(!no_match_lower(Some("SHA256"), "sha256"));
        assert!(no_match_lower(Some("sha1"), "sha256"));
    }

    #[test]
    fn test_no_match_time_compares_instants() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let same = FixedOffset::east_opt(3600).unwrap().from_utc_datetime(&t.naive_utc());
        assert!(!no_match(Some(&same.with_timezone(&Utc)), &t));
        assert!(no_match(Some(&(t + chrono::Duration::seconds(1))), &t));
        assert!(!no_match(None, &t));
    }

    #[test]
    fn test_multiset_consumes_duplicates() {
        assert!(run(&["=A"], &["A", "A", "B"]));
        assert!(run(&["=A", "=A"], &["A", "A", "B"]));
        assert!(!run(&["=A", "=A", "=A"], &["A", "A", "B"]));
    }

    #[test]
    fn test_partial_only_sees_unconsumed_values() {
        // The exact filter takes A1 first, leaving nothing for the partial one.
        assert!(!run(&["~A", "=A1"], &["A1", "B"]));
        assert!(run(&["~A", "=A1"], &["A1", "A2"]));
    }

    #[test]
    fn test_empty_filter_matches_anything() {
        assert!(run(&[], &[]));
        assert!(run(&[], &["A"]));
        assert!(!run(&["~A"], &[]));
    }
}
