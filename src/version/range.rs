// Copyright (c) 2025 - Cowboy AI, Inc.
//! Semantic version ranges
//!
//! Ranges are written the way platform manifests write them (npm style):
//! space-separated comparators, `||` unions, hyphen ranges, and bare
//! versions meaning an exact match. They are normalized into
//! [`semver::VersionReq`] sets for matching and into half-open intervals for
//! the intersection test.

use semver::{BuildMetadata, Comparator, Op, Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;

use super::VersionError;

/// Parse an incoming or stored version string (`v1.2.3` accepted)
pub fn parse_version(version: &str) -> Result<Version, VersionError> {
    let trimmed = version.trim();
    let stripped = trimmed
        .strip_prefix('=')
        .unwrap_or(trimmed)
        .trim_start_matches(|c| c == 'v' || c == 'V');

    Version::parse(stripped).map_err(|e| VersionError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

/// A union of comparator sets
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    sets: Vec<VersionReq>,
    intervals: Vec<Interval>,
}

impl VersionRange {
    pub fn parse(range: &str) -> Result<Self, VersionError> {
        let mut sets = Vec::new();
        let mut intervals = Vec::new();

        for set in range.split("||") {
            let normalized = normalize_set(set);
            let req = VersionReq::parse(&normalized).map_err(|e| VersionError::InvalidRange {
                range: range.to_string(),
                reason: e.to_string(),
            })?;

            let mut interval = Interval::any();
            for comparator in &req.comparators {
                interval = interval.intersect(&comparator_interval(range, comparator)?);
            }
            sets.push(req);
            intervals.push(interval);
        }

        if intervals.iter().all(Interval::is_empty) {
            return Err(VersionError::InvalidRange {
                range: range.to_string(),
                reason: "range matches no version".to_string(),
            });
        }

        Ok(Self {
            raw: range.trim().to_string(),
            sets,
            intervals,
        })
    }

    /// The range as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        self.sets.iter().any(|req| req.matches(version))
    }

    /// Whether some version could satisfy both ranges
    pub fn intersects(&self, other: &VersionRange) -> bool {
        self.intervals.iter().any(|a| {
            other
                .intervals
                .iter()
                .any(|b| !a.intersect(b).is_empty())
        })
    }

    /// Lowest version the range admits
    pub fn min_version(&self) -> Version {
        self.intervals
            .iter()
            .filter(|interval| !interval.is_empty())
            .map(|interval| interval.lower.version.clone())
            .min()
            .unwrap_or_else(|| Version::new(0, 0, 0))
    }

    /// Same comparator sets, regardless of how they were spelled
    pub fn same_as(&self, other: &VersionRange) -> bool {
        self.sets == other.sets
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Rewrite one npm-style comparator set into `semver` syntax
fn normalize_set(set: &str) -> String {
    let set = set.trim();
    if let Some((low, high)) = set.split_once(" - ") {
        return format!(">={}, <={}", strip_v(low.trim()), strip_v(high.trim()));
    }

    let spaced = set.replace(',', " ");
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();

    for token in spaced.split_whitespace() {
        if token.chars().all(is_op_char) {
            pending_op.push_str(token);
            continue;
        }
        let token = format!("{}{}", std::mem::take(&mut pending_op), token);
        comparators.push(normalize_comparator(&token));
    }

    if comparators.is_empty() {
        return "*".to_string();
    }
    comparators.join(", ")
}

fn normalize_comparator(token: &str) -> String {
    let split = token.find(|c: char| !is_op_char(c)).unwrap_or(token.len());
    let (op, rest) = token.split_at(split);
    let rest = strip_v(rest);

    let is_wildcard = rest
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"));

    if op.is_empty() && !is_wildcard {
        format!("={rest}")
    } else {
        format!("{op}{rest}")
    }
}

fn is_op_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '~' | '^')
}

fn strip_v(version: &str) -> &str {
    version.trim_start_matches(|c| c == 'v' || c == 'V')
}

/// Inclusive-or-exclusive bound
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: Version,
    inclusive: bool,
}

impl Bound {
    fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// `[lower, upper)`-style interval; `upper == None` is unbounded
#[derive(Debug, Clone, PartialEq, Eq)]
struct Interval {
    lower: Bound,
    upper: Option<Bound>,
}

impl Interval {
    fn any() -> Self {
        Self {
            lower: Bound::inclusive(Version::new(0, 0, 0)),
            upper: None,
        }
    }

    fn new(lower: Bound, upper: Option<Bound>) -> Self {
        Self {
            lower: normalize_lower(lower),
            upper,
        }
    }

    fn intersect(&self, other: &Interval) -> Interval {
        let lower = match self.lower.version.cmp(&other.lower.version) {
            Ordering::Greater => self.lower.clone(),
            Ordering::Less => other.lower.clone(),
            Ordering::Equal if !self.lower.inclusive => self.lower.clone(),
            Ordering::Equal => other.lower.clone(),
        };

        let upper = match (&self.upper, &other.upper) {
            (None, upper) | (upper, None) => upper.clone(),
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal if !a.inclusive => a.clone(),
                Ordering::Equal => b.clone(),
            }),
        };

        Interval { lower, upper }
    }

    fn is_empty(&self) -> bool {
        match &self.upper {
            None => false,
            Some(upper) => match self.lower.version.cmp(&upper.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.lower.inclusive && upper.inclusive),
                Ordering::Less => false,
            },
        }
    }
}

/// `>1.2.3` admits nothing below `1.2.4` (pre-releases excluded)
fn normalize_lower(lower: Bound) -> Bound {
    if lower.inclusive || !lower.version.pre.is_empty() {
        return lower;
    }
    let v = lower.version;
    Bound::inclusive(Version::new(v.major, v.minor, v.patch + 1))
}

fn comparator_interval(range: &str, comparator: &Comparator) -> Result<Interval, VersionError> {
    let major = comparator.major;
    let floor = Version {
        major,
        minor: comparator.minor.unwrap_or(0),
        patch: comparator.patch.unwrap_or(0),
        pre: comparator.pre.clone(),
        build: BuildMetadata::EMPTY,
    };

    // First version past everything the partial comparator names
    let next_partial = || match (comparator.minor, comparator.patch) {
        (None, _) => Version::new(major + 1, 0, 0),
        (Some(minor), None) => Version::new(major, minor + 1, 0),
        (Some(minor), Some(patch)) => Version::new(major, minor, patch + 1),
    };
    let is_full = comparator.minor.is_some() && comparator.patch.is_some();

    let interval = match comparator.op {
        Op::Exact | Op::Wildcard if is_full => Interval::new(
            Bound::inclusive(floor.clone()),
            Some(Bound::inclusive(floor)),
        ),
        Op::Exact | Op::Wildcard => Interval::new(
            Bound::inclusive(floor),
            Some(Bound::exclusive(next_partial())),
        ),
        Op::Greater if is_full => Interval::new(Bound::exclusive(floor), None),
        Op::Greater => Interval::new(Bound::inclusive(next_partial()), None),
        Op::GreaterEq => Interval::new(Bound::inclusive(floor), None),
        Op::Less => Interval::new(
            Bound::inclusive(Version::new(0, 0, 0)),
            Some(Bound::exclusive(floor)),
        ),
        Op::LessEq if is_full => Interval::new(
            Bound::inclusive(Version::new(0, 0, 0)),
            Some(Bound::inclusive(floor)),
        ),
        Op::LessEq => Interval::new(
            Bound::inclusive(Version::new(0, 0, 0)),
            Some(Bound::exclusive(next_partial())),
        ),
        Op::Tilde => {
            let upper = match comparator.minor {
                None => Version::new(major + 1, 0, 0),
                Some(minor) => Version::new(major, minor + 1, 0),
            };
            Interval::new(Bound::inclusive(floor), Some(Bound::exclusive(upper)))
        }
        Op::Caret => {
            let upper = match (major, comparator.minor, comparator.patch) {
                (0, None, _) => Version::new(1, 0, 0),
                (0, Some(0), None) => Version::new(0, 1, 0),
                (0, Some(0), Some(patch)) => Version::new(0, 0, patch + 1),
                (0, Some(minor), _) => Version::new(0, minor + 1, 0),
                _ => Version::new(major + 1, 0, 0),
            };
            Interval::new(Bound::inclusive(floor), Some(Bound::exclusive(upper)))
        }
        _ => return Err(VersionError::UnsupportedRange(range.to_string())),
    };

    Ok(interval)
}
