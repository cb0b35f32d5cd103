//! Input checks applied before any backend work.
//!
//! Every check here runs before the first store access, so a rejected call
//! never leaves partial writes behind.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ValidationError;
use crate::model::{
    HashEqualSpec, PackageOrArtifactInput, PackageOrArtifactSpec, PackageOrSourceInput,
    PackageOrSourceSpec, PackageSourceOrArtifactInput, PackageSourceOrArtifactSpec,
};

/// Maximum number of artifacts a hash-equality filter may name.
pub(crate) const MAX_HASH_EQUAL_ARTIFACTS: usize = 2;

fn count_set(flags: &[bool]) -> usize {
    flags.iter().filter(|f| **f).count()
}

fn exactly_one(options: &'static str, flags: &[bool]) -> Result<(), ValidationError> {
    match count_set(flags) {
        1 => Ok(()),
        found => Err(ValidationError::SubjectCount { options, found }),
    }
}

fn at_most_one(options: &'static str, flags: &[bool]) -> Result<(), ValidationError> {
    match count_set(flags) {
        0 | 1 => Ok(()),
        found => Err(ValidationError::FilterSubjectCount { options, found }),
    }
}

pub(crate) fn package_or_source_input(input: &PackageOrSourceInput) -> Result<(), ValidationError> {
    exactly_one(
        "package or source",
        &[input.package.is_some(), input.source.is_some()],
    )
}

pub(crate) fn package_source_or_artifact_input(
    input: &PackageSourceOrArtifactInput,
) -> Result<(), ValidationError> {
    exactly_one(
        "package, source or artifact",
        &[
            input.package.is_some(),
            input.source.is_some(),
            input.artifact.is_some(),
        ],
    )
}

pub(crate) fn package_or_artifact_input(input: &PackageOrArtifactInput) -> Result<(), ValidationError> {
    exactly_one(
        "package or artifact",
        &[input.package.is_some(), input.artifact.is_some()],
    )
}

pub(crate) fn package_or_source_filter(spec: Option<&PackageOrSourceSpec>) -> Result<(), ValidationError> {
    spec.map_or(Ok(()), |s| {
        at_most_one("package or source", &[s.package.is_some(), s.source.is_some()])
    })
}

pub(crate) fn package_source_or_artifact_filter(
    spec: Option<&PackageSourceOrArtifactSpec>,
) -> Result<(), ValidationError> {
    spec.map_or(Ok(()), |s| {
        at_most_one(
            "package, source or artifact",
            &[s.package.is_some(), s.source.is_some(), s.artifact.is_some()],
        )
    })
}

pub(crate) fn package_or_artifact_filter(
    spec: Option<&PackageOrArtifactSpec>,
) -> Result<(), ValidationError> {
    spec.map_or(Ok(()), |s| {
        at_most_one("package or artifact", &[s.package.is_some(), s.artifact.is_some()])
    })
}

pub(crate) fn hash_equal_filter(spec: &HashEqualSpec) -> Result<(), ValidationError> {
    if spec.artifacts.len() > MAX_HASH_EQUAL_ARTIFACTS {
        return Err(ValidationError::TooManyArtifacts {
            count: spec.artifacts.len(),
            max: MAX_HASH_EQUAL_ARTIFACTS,
        });
    }
    Ok(())
}

/// Rejects the default (epoch) timestamp, which marks a field the caller never set.
pub(crate) fn non_zero_time(field: &'static str, t: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *t == DateTime::<Utc>::default() {
        return Err(ValidationError::ZeroTime { field });
    }
    Ok(())
}

/// Converts a scan window in hours to a duration. Negative windows are rejected.
pub(crate) fn scan_window(hours: i64) -> Result<TimeDelta, ValidationError> {
    if hours < 0 {
        return Err(ValidationError::ScanWindow { hours });
    }
    TimeDelta::try_hours(hours).ok_or(ValidationError::ScanWindow { hours })
}

/// Checks a batch of parallel slices.
///
/// `subjects` lists the subject union members as `(name, len)`; at most one may be
/// non-empty. Every entry of `parallel` must have the same length as the chosen
/// subject list. Returns the batch length.
pub(crate) fn batch(
    options: &'static str,
    subjects: &[(&'static str, usize)],
    parallel: &[(&'static str, usize)],
) -> Result<usize, ValidationError> {
    let populated: Vec<_> = subjects.iter().filter(|(_, len)| *len > 0).collect();
    let (left, left_len) = match populated.as_slice() {
        [] => subjects.first().map_or(("subjects", 0), |(name, _)| (*name, 0)),
        [only] => **only,
        many => {
            return Err(ValidationError::SubjectCount {
                options,
                found: many.len(),
            })
        }
    };
    for (right, right_len) in parallel {
        if *right_len != left_len {
            return Err(ValidationError::UnevenBatch {
                left,
                right,
                left_len,
                right_len: *right_len,
            });
        }
    }
    Ok(left_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactSpec, IdOrPkgInput, IdOrSourceInput, PkgSpec, SourceSpec};

    #[test]
    fn test_subject_must_be_exactly_one() {
        let none = PackageOrSourceInput::default();
        assert!(matches!(
            package_or_source_input(&none),
            Err(ValidationError::SubjectCount { found: 0, .. })
        ));

        let both = PackageOrSourceInput {
            package: Some(IdOrPkgInput::from_version_id("a")),
            source: Some(IdOrSourceInput::from_name_id("b")),
        };
        assert!(matches!(
            package_or_source_input(&both),
            Err(ValidationError::SubjectCount { found: 2, .. })
        ));

        let one = PackageOrSourceInput::package(IdOrPkgInput::from_version_id("a"));
        assert!(package_or_source_input(&one).is_ok());
    }

    #[test]
    fn test_filter_allows_empty_subject() {
        assert!(package_or_source_filter(None).is_ok());
        assert!(package_or_source_filter(Some(&PackageOrSourceSpec::default())).is_ok());
        let both = PackageOrSourceSpec {
            package: Some(PkgSpec::default()),
            source: Some(SourceSpec::default()),
        };
        assert!(package_or_source_filter(Some(&both)).is_err());
    }

    #[test]
    fn test_hash_equal_filter_limit() {
        let spec = HashEqualSpec {
            artifacts: vec![ArtifactSpec::default(); 3],
            ..HashEqualSpec::default()
        };
        let err = hash_equal_filter(&spec).unwrap_err();
        assert!(err.to_string().contains("too many artifacts"));
    }

    #[test]
    fn test_zero_time_rejected() {
        assert!(non_zero_time("known_since", &DateTime::<Utc>::default()).is_err());
        assert!(non_zero_time("known_since", &Utc::now()).is_ok());
    }

    #[test]
    fn test_scan_window_bounds() {
        assert_eq!(scan_window(0).unwrap(), TimeDelta::zero());
        assert_eq!(scan_window(24).unwrap(), TimeDelta::try_days(1).unwrap());
        assert!(scan_window(-1).is_err());
        assert!(scan_window(i64::MAX).is_err());
    }

    #[test]
    fn test_batch_alignment() {
        let len = batch(
            "packages or sources",
            &[("packages", 3), ("sources", 0)],
            &[("certifyLegals", 3), ("declaredLicenses", 3)],
        )
        .unwrap();
        assert_eq!(len, 3);

        let err = batch(
            "packages or sources",
            &[("packages", 3), ("sources", 0)],
            &[("certifyLegals", 2)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("uneven packages and certifyLegals"));

        let err = batch(
            "packages or sources",
            &[("packages", 1), ("sources", 1)],
            &[("certifyLegals", 1)],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::SubjectCount { found: 2, .. }));
    }

    #[test]
    fn test_empty_batch_is_allowed() {
        assert_eq!(batch("artifacts", &[("artifacts", 0)], &[("hashEquals", 0)]).unwrap(), 0);
        assert!(batch("artifacts", &[("artifacts", 0)], &[("hashEquals", 1)]).is_err());
    }
}
