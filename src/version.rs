//! Semantic version parsing and ordering.
//!
//! Accepts `major[.minor[.patch]][-prerelease][+build]` with an optional
//! leading `v`/`V`. Missing minor/patch default to 0.
//!
//! Ordering:
//! - `(major, minor, patch)` compared numerically
//! - a release orders above the same core with a prerelease tag
//! - two prerelease tags compare as plain strings (`"rc.10" < "rc.9"`)
//! - build metadata never affects ordering or equality

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version")]
    Empty,
    #[error("invalid version format: {0} (more than 3 numeric components)")]
    TooManyComponents(String),
    #[error("invalid version component '{component}' in '{input}'")]
    InvalidComponent { component: String, input: String },
}

/// A parsed semantic version. Keeps the text it was parsed from.
#[derive(Debug, Clone, Default)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
    raw: String,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
            raw: format!("{major}.{minor}.{patch}"),
        }
    }

    pub fn parse(input: &str) -> Result<Self, VersionError> {
        input.parse()
    }

    /// The text this version was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    pub fn less_than(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Less
    }

    pub fn greater_than(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    pub fn equal(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }

    /// Three-way comparison as `-1`, `0` or `1`.
    pub fn compare(&self, other: &Self) -> i32 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }
}

fn parse_component(component: &str, input: &str) -> Result<u64, VersionError> {
    // u64::from_str accepts a leading '+', which is not a version digit
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidComponent {
            component: component.to_string(),
            input: input.to_string(),
        });
    }
    component.parse().map_err(|_| VersionError::InvalidComponent {
        component: component.to_string(),
        input: input.to_string(),
    })
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let s = s
            .strip_prefix('v')
            .or_else(|| s.strip_prefix('V'))
            .unwrap_or(s);

        let (s, build) = match s.split_once('+') {
            Some((rest, build)) => (rest, Some(build.to_string())),
            None => (s, None),
        };

        let (core, prerelease) = match s.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (s, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return Err(VersionError::TooManyComponents(input.to_string()));
        }

        let major = parse_component(parts[0], input)?;
        let minor = parts
            .get(1)
            .map(|p| parse_component(p, input))
            .transpose()?
            .unwrap_or(0);
        let patch = parts
            .get(2)
            .map(|p| parse_component(p, input))
            .transpose()?
            .unwrap_or(0);

        Ok(SemanticVersion {
            major,
            minor,
            patch,
            prerelease,
            build,
            raw: input.to_string(),
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.minor.cmp(&other.minor) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.patch.cmp(&other.patch) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_version_parse() {
        let parsed = v("1.2.3");
        assert_eq!((parsed.major, parsed.minor, parsed.patch), (1, 2, 3));
        assert_eq!(parsed.prerelease, None);
        assert_eq!(parsed.build, None);

        let parsed = v("v1.2.3");
        assert_eq!((parsed.major, parsed.minor, parsed.patch), (1, 2, 3));
        assert_eq!(parsed.raw(), "v1.2.3");

        let parsed = v("1.2.3-beta.1+build");
        assert_eq!(parsed.prerelease.as_deref(), Some("beta.1"));
        assert_eq!(parsed.build.as_deref(), Some("build"));

        let parsed = v("1.2.3+build123");
        assert_eq!(parsed.prerelease, None);
        assert_eq!(parsed.build.as_deref(), Some("build123"));
    }

    #[test]
    fn test_missing_components_default_to_zero() {
        assert_eq!(v("1.0"), SemanticVersion::new(1, 0, 0));
        assert_eq!(v("5"), SemanticVersion::new(5, 0, 0));
        assert_eq!(v("V2"), SemanticVersion::new(2, 0, 0));
    }

    #[test]
    fn test_version_parse_errors() {
        assert_eq!(SemanticVersion::parse(""), Err(VersionError::Empty));
        assert!(matches!(
            SemanticVersion::parse("1.2.3.4"),
            Err(VersionError::TooManyComponents(_))
        ));
        assert!(matches!(
            SemanticVersion::parse("invalid"),
            Err(VersionError::InvalidComponent { .. })
        ));
        assert!(SemanticVersion::parse("1..2").is_err());
        assert!(SemanticVersion::parse("1.-2").is_err());
        assert!(SemanticVersion::parse("1.a").is_err());
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(v("v1.2").to_string(), "1.2.0");
        assert_eq!(v("1.2.3-rc.1+linux").to_string(), "1.2.3-rc.1+linux");
        assert_eq!(v("V3").to_string(), "3.0.0");
    }

    #[test]
    fn test_canonical_round_trip() {
        for input in ["v1", "1.2", "1.2.3-alpha", "1.2.3+b7", "0.0.1-rc.2+sha.abc"] {
            let canonical = v(input).to_string();
            assert_eq!(v(&canonical).to_string(), canonical);
        }
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.3.0") > v("1.2.9"));
        assert!(v("2.0.0") > v("1.9.9"));
        assert!(v("1.2.3-alpha") < v("1.2.3"));
        assert!(v("1.2.3") > v("1.2.3-beta"));
        assert!(v("1.2.3-alpha") < v("1.2.3-beta"));
    }

    #[test]
    fn test_prerelease_compares_lexicographically() {
        // plain string ordering, not per-identifier
        assert!(v("1.0.0-rc.10") < v("1.0.0-rc.9"));
    }

    #[test]
    fn test_build_metadata_ignored() {
        assert!(v("1.0.0+a").equal(&v("1.0.0+b")));
        assert_eq!(v("1.0.0+a"), v("1.0.0"));
        assert_eq!(v("1.0.0+a").compare(&v("1.0.0")), 0);
    }

    #[test]
    fn test_comparators_exclusive() {
        let versions = ["0.9.0", "1.0.0-alpha", "1.0.0-beta", "1.0.0", "1.0.1", "2.0.0"];
        for a in versions {
            for b in versions {
                let (a, b) = (v(a), v(b));
                let held = [a.less_than(&b), a.equal(&b), a.greater_than(&b)];
                assert_eq!(held.iter().filter(|h| **h).count(), 1, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_ordering_is_transitive() {
        let versions: Vec<SemanticVersion> = [
            "0.9.0",
            "1",
            "1.0.0-alpha",
            "1.0.0-alpha+b2",
            "1.0.0-beta",
            "1.0.0-rc.10",
            "1.0.0-rc.9",
            "1.0.0+linux",
            "1.0.1",
            "1.10.0",
            "1.9.9",
            "2.0.0-0",
            "2.0.0",
        ]
        .into_iter()
        .map(v)
        .collect();

        for a in &versions {
            for b in &versions {
                for c in &versions {
                    if a.less_than(b) && b.less_than(c) {
                        assert!(a.less_than(c), "{a} < {b} < {c}");
                    }
                    if a.equal(b) && b.equal(c) {
                        assert!(a.equal(c), "{a} = {b} = {c}");
                    }
                    if a.compare(b) <= 0 && b.compare(c) <= 0 {
                        assert!(a.compare(c) <= 0, "{a} <= {b} <= {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(v("1.2.3").compare(&v("1.2.3")), 0);
        assert_eq!(v("1.2.3").compare(&v("1.2.4")), -1);
        assert_eq!(v("1.2.4").compare(&v("1.2.3")), 1);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("v1.4")).unwrap();
        assert_eq!(json, "\"1.4.0\"");
        let back: SemanticVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SemanticVersion::new(1, 4, 0));
    }
}
