//! Version constraint matching.
//!
//! Constraints stay plain strings and are interpreted at match time:
//! - `1.2.3` - exact
//! - `>=`, `>`, `<=`, `<` - relational
//! - `^1.2.0` - same major, at least 1.2.0
//! - `~1.2.0` - same major.minor, at least 1.2.0
//! - `1.2.x`, `1.*`, `1.X.x` - wildcard positions match anything

use std::fmt;

use thiserror::Error;

use crate::version::{SemanticVersion, VersionError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("unsupported constraint format: {0}")]
    Unsupported(String),
    #[error("invalid version in constraint '{constraint}': {source}")]
    InvalidVersion {
        constraint: String,
        #[source]
        source: VersionError,
    },
}

/// Which operator form a constraint string takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Exact,
    Gte,
    Gt,
    Lte,
    Lt,
    Caret,
    Tilde,
    Wildcard,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::Exact => "exact",
            ConstraintKind::Gte => ">=",
            ConstraintKind::Gt => ">",
            ConstraintKind::Lte => "<=",
            ConstraintKind::Lt => "<",
            ConstraintKind::Caret => "^",
            ConstraintKind::Tilde => "~",
            ConstraintKind::Wildcard => "wildcard",
        };
        f.write_str(name)
    }
}

const RELATIONAL_CHARS: &[char] = &['>', '<', '=', '^', '~'];
const WILDCARD_CHARS: &[char] = &['x', 'X', '*'];

/// The numeric core of a version-ish string, before any prerelease/build tag.
fn numeric_core(s: &str) -> &str {
    let end = s.find(['-', '+']).unwrap_or(s.len());
    &s[..end]
}

fn has_wildcard(s: &str) -> bool {
    numeric_core(s).contains(WILDCARD_CHARS)
}

/// True when the string carries no operator or wildcard marker.
pub fn is_exact(constraint: &str) -> bool {
    let s = constraint.trim();
    !s.contains(RELATIONAL_CHARS) && !has_wildcard(s)
}

/// Classify a constraint string by operator, in matching precedence order.
pub fn classify(constraint: &str) -> Result<ConstraintKind, ConstraintError> {
    let s = constraint.trim();

    let kind = if is_exact(s) {
        ConstraintKind::Exact
    } else if s.starts_with(">=") {
        ConstraintKind::Gte
    } else if s.starts_with('>') {
        ConstraintKind::Gt
    } else if s.starts_with("<=") {
        ConstraintKind::Lte
    } else if s.starts_with('<') {
        ConstraintKind::Lt
    } else if s.starts_with('^') {
        ConstraintKind::Caret
    } else if s.starts_with('~') {
        ConstraintKind::Tilde
    } else if has_wildcard(s) {
        ConstraintKind::Wildcard
    } else {
        return Err(ConstraintError::Unsupported(s.to_string()));
    };

    Ok(kind)
}

fn target(constraint: &str, operand: &str) -> Result<SemanticVersion, ConstraintError> {
    operand
        .trim()
        .parse()
        .map_err(|source| ConstraintError::InvalidVersion {
            constraint: constraint.to_string(),
            source,
        })
}

/// Check whether `version` satisfies `constraint`.
pub fn is_compatible(version: &SemanticVersion, constraint: &str) -> Result<bool, ConstraintError> {
    let s = constraint.trim();

    let matched = match classify(s)? {
        ConstraintKind::Exact => version.equal(&target(s, s)?),
        ConstraintKind::Gte => *version >= target(s, &s[2..])?,
        ConstraintKind::Gt => *version > target(s, &s[1..])?,
        ConstraintKind::Lte => *version <= target(s, &s[2..])?,
        ConstraintKind::Lt => *version < target(s, &s[1..])?,
        ConstraintKind::Caret => {
            let t = target(s, &s[1..])?;
            version.major == t.major && *version >= t
        }
        ConstraintKind::Tilde => {
            let t = target(s, &s[1..])?;
            version.major == t.major && version.minor == t.minor && *version >= t
        }
        ConstraintKind::Wildcard => matches_wildcard(version, s)?,
    };

    Ok(matched)
}

fn matches_wildcard(version: &SemanticVersion, constraint: &str) -> Result<bool, ConstraintError> {
    let core = numeric_core(constraint);
    let core = core
        .strip_prefix('v')
        .or_else(|| core.strip_prefix('V'))
        .unwrap_or(core);
    let normalized = core.replace(['*', 'X'], "x");

    let actual = [version.major, version.minor, version.patch];
    for (position, part) in normalized.split('.').take(3).enumerate() {
        if part == "x" {
            continue;
        }
        let pinned: u64 = part.parse().map_err(|_| ConstraintError::InvalidVersion {
            constraint: constraint.to_string(),
            source: VersionError::InvalidComponent {
                component: part.to_string(),
                input: constraint.to_string(),
            },
        })?;
        if actual[position] != pinned {
            return Ok(false);
        }
    }

    Ok(true)
}
