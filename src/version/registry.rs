// Copyright (c) 2025 - Cowboy AI, Inc.
//! Version-range registry and migration resolution

use semver::Version;
use tracing::warn;

use super::{MigrationDirection, VersionError, VersionRange, VersionResult};

/// A registered handler definition that can name its predecessor range
pub trait VersionedDefinition {
    /// The range this definition expects to directly follow
    fn ancestor(&self) -> Option<&str>;
}

/// One (range → definition) entry
#[derive(Debug, Clone)]
pub struct VersionEntry<D> {
    pub range: VersionRange,
    pub definition: D,
}

/// Outcome of [`VersionRegistry::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<C, M> {
    /// What the incoming version's definition wants run
    pub change: C,
    /// Migrations from the saved version to the incoming one, in run order
    pub migrations: Vec<M>,
}

/// Registry of non-overlapping version ranges, sorted by minimum version
#[derive(Debug, Clone)]
pub struct VersionRegistry<D> {
    entries: Vec<VersionEntry<D>>,
}

impl<D> Default for VersionRegistry<D> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<D> VersionRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition` for `range`.
    ///
    /// Fails if the range intersects any registered range.
    pub fn register(&mut self, range: &str, definition: D) -> VersionResult<()> {
        let range = VersionRange::parse(range)?;

        if let Some(existing) = self.entries.iter().find(|e| e.range.intersects(&range)) {
            return Err(VersionError::OverlappingRanges {
                existing: existing.range.to_string(),
                new: range.to_string(),
            });
        }

        let min = range.min_version();
        let position = self
            .entries
            .partition_point(|entry| entry.range.min_version() <= min);
        self.entries.insert(position, VersionEntry { range, definition });
        Ok(())
    }

    pub fn entries(&self) -> &[VersionEntry<D>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scan backward from `from` (default: last entry) for the first range
    /// `version` satisfies.
    pub fn match_index(&self, version: &Version, from: Option<usize>) -> VersionResult<usize> {
        let last = match from {
            Some(from) => from.min(self.entries.len().saturating_sub(1)),
            None => self.entries.len().saturating_sub(1),
        };

        self.entries
            .get(..=last)
            .and_then(|candidates| {
                candidates
                    .iter()
                    .rposition(|entry| entry.range.satisfies(version))
            })
            .ok_or_else(|| VersionError::NoMatchingVersion(version.to_string()))
    }

    /// Pick the incoming version's definition and the migrations that carry
    /// stored data from `saved` to `coming`.
    ///
    /// Returns `None` when there is no incoming version. Without a saved
    /// version, a migration source, or when both versions share a range, the
    /// migration list is empty.
    pub fn resolve<C, M>(
        &self,
        coming: Option<&Version>,
        saved: Option<&Version>,
        get_change: impl FnOnce(&D) -> C,
        get_migrations: Option<&dyn Fn(MigrationDirection, &[&D]) -> Vec<M>>,
    ) -> VersionResult<Option<Resolution<C, M>>> {
        let Some(coming) = coming else {
            return Ok(None);
        };

        let index = self.match_index(coming, None)?;
        let entry = &self.entries[index];
        let change = get_change(&entry.definition);

        let (Some(saved), Some(get_migrations)) = (saved, get_migrations) else {
            return Ok(Some(Resolution {
                change,
                migrations: Vec::new(),
            }));
        };

        if entry.range.satisfies(saved) {
            return Ok(Some(Resolution {
                change,
                migrations: Vec::new(),
            }));
        }

        let migrations = if coming < saved {
            let saved_index = self.match_index(saved, None)?;
            let definitions: Vec<&D> = self
                .entries
                .get(index + 1..=saved_index)
                .unwrap_or_default()
                .iter()
                .rev()
                .map(|entry| &entry.definition)
                .collect();
            get_migrations(MigrationDirection::Down, &definitions)
        } else {
            let saved_index = self.match_index(saved, Some(index))?;
            let definitions: Vec<&D> = self
                .entries
                .get(saved_index + 1..=index)
                .unwrap_or_default()
                .iter()
                .map(|entry| &entry.definition)
                .collect();
            get_migrations(MigrationDirection::Up, &definitions)
        };

        Ok(Some(Resolution { change, migrations }))
    }
}

impl<D: VersionedDefinition> VersionRegistry<D> {
    /// Check the registry is servable.
    ///
    /// Zero definitions is fatal. Each definition after the first should name
    /// its predecessor's range as `ancestor`; mismatches are returned (and
    /// logged) as warnings.
    pub fn validate(&self) -> VersionResult<Vec<String>> {
        if self.entries.is_empty() {
            return Err(VersionError::NoDefinitions);
        }

        let mut warnings = Vec::new();
        for pair in self.entries.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let warning = match current.definition.ancestor() {
                None => Some(format!(
                    "definition for {} does not declare an ancestor (expected {})",
                    current.range, previous.range
                )),
                Some(ancestor) => match VersionRange::parse(ancestor) {
                    Ok(parsed) if parsed.same_as(&previous.range) => None,
                    _ => Some(format!(
                        "definition for {} declares ancestor {} but follows {}",
                        current.range, ancestor, previous.range
                    )),
                },
            };

            if let Some(warning) = warning {
                warn!(range = %current.range, "{}", warning);
                warnings.push(warning);
            }
        }

        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::parse_version;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Def {
        name: &'static str,
        ancestor: Option<&'static str>,
    }

    impl VersionedDefinition for Def {
        fn ancestor(&self) -> Option<&str> {
            self.ancestor
        }
    }

    fn def(name: &'static str, ancestor: Option<&'static str>) -> Def {
        Def { name, ancestor }
    }

    fn registry() -> VersionRegistry<Def> {
        let mut registry = VersionRegistry::new();
        // Registered out of order on purpose
        registry.register("^3.0.0", def("r3", Some("^2.0.0"))).unwrap();
        registry.register("^1.0.0", def("r1", None)).unwrap();
        registry.register("^2.0.0", def("r2", Some("^1.0.0"))).unwrap();
        registry
    }

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    fn names(direction: MigrationDirection, defs: &[&Def]) -> Vec<String> {
        defs.iter()
            .map(|d| format!("{}.{}", d.name, direction))
            .collect()
    }

    fn resolve(coming: &str, saved: Option<&str>) -> Resolution<&'static str, String> {
        let registry = registry();
        let saved = saved.map(v);
        registry
            .resolve(
                Some(&v(coming)),
                saved.as_ref(),
                |d| d.name,
                Some(&names as &dyn Fn(MigrationDirection, &[&Def]) -> Vec<String>),
            )
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_entries_sorted_by_min_version() {
        let registry = registry();
        let order: Vec<_> = registry
            .entries()
            .iter()
            .map(|e| e.definition.name)
            .collect();
        assert_eq!(order, vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_overlapping_range_is_rejected() {
        let mut registry = registry();
        let result = registry.register(">=2.5.0 <2.6.0", def("dup", None));

        assert!(matches!(result, Err(VersionError::OverlappingRanges { .. })));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_upgrade_runs_intermediate_and_target_up() {
        let resolution = resolve("3.1.0", Some("1.4.0"));

        assert_eq!(resolution.change, "r3");
        assert_eq!(resolution.migrations, vec!["r2.up", "r3.up"]);
    }

    #[test]
    fn test_downgrade_runs_newest_first() {
        let resolution = resolve("1.4.0", Some("3.1.0"));

        assert_eq!(resolution.change, "r1");
        assert_eq!(resolution.migrations, vec!["r3.down", "r2.down"]);
    }

    #[test]
    fn test_same_range_needs_no_migration() {
        let resolution = resolve("2.9.0", Some("2.0.1"));

        assert_eq!(resolution.change, "r2");
        assert!(resolution.migrations.is_empty());
    }

    #[test]
    fn test_first_sighting_needs_no_migration() {
        let resolution = resolve("3.0.0", None);

        assert_eq!(resolution.change, "r3");
        assert!(resolution.migrations.is_empty());
    }

    #[test]
    fn test_without_migration_source_needs_no_migration() {
        let resolution = registry()
            .resolve::<_, String>(Some(&v("3.0.0")), Some(&v("1.0.0")), |d| d.name, None)
            .unwrap()
            .unwrap();

        assert!(resolution.migrations.is_empty());
    }

    #[test]
    fn test_absent_coming_version_resolves_nothing() {
        let resolution = registry()
            .resolve::<_, String>(None, Some(&v("1.0.0")), |d| d.name, None)
            .unwrap();

        assert!(resolution.is_none());
    }

    #[test]
    fn test_unmatched_version() {
        let registry = registry();

        assert!(matches!(
            registry.match_index(&v("0.5.0"), None),
            Err(VersionError::NoMatchingVersion(_))
        ));
        assert!(matches!(
            registry.resolve(Some(&v("4.0.0")), None, |d| d.name, None::<&dyn Fn(MigrationDirection, &[&Def]) -> Vec<String>>),
            Err(VersionError::NoMatchingVersion(_))
        ));
    }

    #[test]
    fn test_match_index_respects_from() {
        let registry = registry();

        assert_eq!(registry.match_index(&v("2.0.0"), None).unwrap(), 1);
        assert_eq!(registry.match_index(&v("2.0.0"), Some(1)).unwrap(), 1);
        assert!(registry.match_index(&v("3.0.0"), Some(1)).is_err());
    }

    #[test]
    fn test_validate_reports_ancestor_mismatch() {
        assert_eq!(registry().validate().unwrap(), Vec::<String>::new());

        let mut registry = VersionRegistry::new();
        registry.register("^1.0.0", def("r1", None)).unwrap();
        registry.register("^2.0.0", def("r2", None)).unwrap();
        registry.register("^3.0.0", def("r3", Some("^1.0.0"))).unwrap();

        let warnings = registry.validate().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("does not declare an ancestor"));
        assert!(warnings[1].contains("declares ancestor ^1.0.0"));
    }

    #[test]
    fn test_validate_rejects_empty_registry() {
        let registry: VersionRegistry<Def> = VersionRegistry::new();
        assert!(matches!(registry.validate(), Err(VersionError::NoDefinitions)));
    }
}
