//! Release selection.
//!
//! Resolution runs in two phases: filter the candidate list with a predicate
//! derived from the request, then take the greatest version among survivors.
//! Ties on version fall to the most recent `released_at`.
//!
//! Deprecated releases are skipped unless the request names an exact version.

use thiserror::Error;
use tracing::{debug, warn};

use crate::constraint::{self, ConstraintError};
use crate::release::Release;
use crate::version::SemanticVersion;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no release of '{package}' matches '{expression}'")]
    NotFound { package: String, expression: String },

    #[error("no version of '{package}' satisfies '{expression}'")]
    NoCompatibleVersion {
        package: String,
        expression: String,
        /// Non-deprecated versions that were considered.
        available: Vec<String>,
    },

    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

/// True for an empty request or the literal `latest`.
pub fn is_latest(expression: &str) -> bool {
    let e = expression.trim();
    e.is_empty() || e.eq_ignore_ascii_case("latest")
}

/// Pick the release of `package` that satisfies `expression`.
pub fn resolve<'a>(
    package: &str,
    candidates: &'a [Release],
    expression: &str,
) -> Result<&'a Release, ResolutionError> {
    let expression = expression.trim();

    if is_latest(expression) {
        return latest(candidates).ok_or_else(|| ResolutionError::NotFound {
            package: package.to_string(),
            expression: "latest".to_string(),
        });
    }

    if constraint::is_exact(expression)
        && let Ok(wanted) = expression.parse::<SemanticVersion>()
    {
        return exact(candidates, expression, &wanted).ok_or_else(|| ResolutionError::NotFound {
            package: package.to_string(),
            expression: expression.to_string(),
        });
    }

    let eligible: Vec<(&Release, SemanticVersion)> = parsed(candidates)
        .filter(|(r, _)| !r.is_deprecated)
        .collect();

    let mut survivors = Vec::new();
    for (release, version) in &eligible {
        if constraint::is_compatible(version, expression)? {
            survivors.push((*release, version.clone()));
        }
    }
    debug!(
        package,
        expression,
        eligible = eligible.len(),
        matched = survivors.len(),
        "filtered releases"
    );

    best(survivors).ok_or_else(|| ResolutionError::NoCompatibleVersion {
        package: package.to_string(),
        expression: expression.to_string(),
        available: eligible.iter().map(|(r, _)| r.version.clone()).collect(),
    })
}

/// Greatest non-deprecated release, or `None` when nothing is eligible.
pub fn latest(candidates: &[Release]) -> Option<&Release> {
    best(parsed(candidates).filter(|(r, _)| !r.is_deprecated).collect())
}

/// Exact request: raw string match first, then semantic equality.
/// Deprecated releases stay eligible.
fn exact<'a>(candidates: &'a [Release], raw: &str, wanted: &SemanticVersion) -> Option<&'a Release> {
    if let Some(release) = candidates.iter().find(|r| r.version == raw) {
        return Some(release);
    }
    best(parsed(candidates).filter(|(_, v)| v.equal(wanted)).collect())
}

/// Pair each release with its parsed version, skipping unparseable entries.
fn parsed(candidates: &[Release]) -> impl Iterator<Item = (&Release, SemanticVersion)> {
    candidates.iter().filter_map(|r| match r.semantic_version() {
        Ok(v) => Some((r, v)),
        Err(e) => {
            warn!(package = %r.package, version = %r.version, "skipping release: {}", e);
            None
        }
    })
}

fn best(survivors: Vec<(&Release, SemanticVersion)>) -> Option<&Release> {
    survivors
        .into_iter()
        .max_by(|(ra, va), (rb, vb)| va.cmp(vb).then(ra.released_at.cmp(&rb.released_at)))
        .map(|(r, _)| r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn release(version: &str) -> Release {
        Release::new("app", version)
    }

    fn scenario() -> Vec<Release> {
        vec![
            release("1.0.0"),
            release("1.2.0"),
            release("1.2.5"),
            release("2.0.0").deprecated(true),
        ]
    }

    #[test]
    fn test_caret_picks_highest_non_deprecated() {
        let candidates = scenario();
        let chosen = resolve("app", &candidates, "^1.0.0").unwrap();
        assert_eq!(chosen.version, "1.2.5");
    }

    #[test]
    fn test_exact_bypasses_deprecation() {
        let candidates = scenario();
        let chosen = resolve("app", &candidates, "2.0.0").unwrap();
        assert_eq!(chosen.version, "2.0.0");
        assert!(chosen.is_deprecated);
    }

    #[test]
    fn test_exact_semantic_match() {
        let candidates = vec![release("v1.4")];
        assert_eq!(resolve("app", &candidates, "1.4.0").unwrap().version, "v1.4");
    }

    #[test]
    fn test_exact_not_found() {
        let candidates = scenario();
        let err = resolve("app", &candidates, "3.0.0").unwrap_err();
        assert_eq!(
            err,
            ResolutionError::NotFound {
                package: "app".to_string(),
                expression: "3.0.0".to_string()
            }
        );
    }

    #[test]
    fn test_latest_skips_deprecated() {
        let candidates = scenario();
        assert_eq!(resolve("app", &candidates, "latest").unwrap().version, "1.2.5");
        assert_eq!(resolve("app", &candidates, "").unwrap().version, "1.2.5");
        assert_eq!(resolve("app", &candidates, "LATEST").unwrap().version, "1.2.5");
    }

    #[test]
    fn test_latest_tie_breaks_on_release_time() {
        let older = release("1.0.0+a").released_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let newer = release("1.0.0+b").released_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let candidates = vec![newer.clone(), older];
        assert_eq!(resolve("app", &candidates, "latest").unwrap().version, "1.0.0+b");
    }

    #[test]
    fn test_latest_empty_after_filter() {
        let candidates = vec![release("1.0.0").deprecated(true)];
        assert!(matches!(
            resolve("app", &candidates, "latest"),
            Err(ResolutionError::NotFound { .. })
        ));
        assert!(matches!(resolve("app", &[], ""), Err(ResolutionError::NotFound { .. })));
    }

    #[test]
    fn test_no_compatible_version_lists_available() {
        let candidates = scenario();
        let err = resolve("app", &candidates, ">=3.0.0").unwrap_err();
        match err {
            ResolutionError::NoCompatibleVersion { available, .. } => {
                assert_eq!(available, ["1.0.0", "1.2.0", "1.2.5"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_deprecated_excluded_from_constraints() {
        let candidates = scenario();
        assert!(matches!(
            resolve("app", &candidates, "2.x"),
            Err(ResolutionError::NoCompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_malformed_constraint_propagates() {
        let candidates = scenario();
        assert!(matches!(
            resolve("app", &candidates, ">=one"),
            Err(ResolutionError::Constraint(ConstraintError::InvalidVersion { .. }))
        ));
        assert!(matches!(
            resolve("app", &candidates, "garbage"),
            Err(ResolutionError::Constraint(_))
        ));
    }

    #[test]
    fn test_wildcard_and_tilde() {
        let candidates = scenario();
        assert_eq!(resolve("app", &candidates, "1.2.x").unwrap().version, "1.2.5");
        assert_eq!(resolve("app", &candidates, "~1.0.0").unwrap().version, "1.0.0");
        assert_eq!(resolve("app", &candidates, "<1.2.5").unwrap().version, "1.2.0");
    }

    #[test]
    fn test_unparseable_candidates_skipped() {
        let candidates = vec![release("nightly"), release("1.0.0")];
        assert_eq!(resolve("app", &candidates, "latest").unwrap().version, "1.0.0");
        assert_eq!(resolve("app", &candidates, "nightly").unwrap_err(), ResolutionError::Constraint(
            ConstraintError::InvalidVersion {
                constraint: "nightly".to_string(),
                source: crate::version::VersionError::InvalidComponent {
                    component: "nightly".to_string(),
                    input: "nightly".to_string(),
                },
            }
        ));
    }
}
