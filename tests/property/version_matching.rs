// Copyright (c) 2025 - Cowboy AI, Inc.
//! Properties of version matching over disjoint major-version ranges

use powerapp_sdk::version::{MigrationDirection, Version, VersionRegistry};
use proptest::prelude::*;

/// `^1.0.0 .. ^n.0.0`, each definition named by its major version
fn registry(majors: u64) -> VersionRegistry<u64> {
    let mut registry = VersionRegistry::new();
    for major in (1..=majors).rev() {
        registry.register(&format!("^{major}.0.0"), major).unwrap();
    }
    registry
}

fn majors_of(_: MigrationDirection, definitions: &[&u64]) -> Vec<u64> {
    definitions.iter().map(|major| **major).collect()
}

proptest! {
    #[test]
    fn match_index_finds_the_only_satisfied_range(
        majors in 1u64..8,
        major in 1u64..8,
        minor in 0u64..50,
        patch in 0u64..50,
    ) {
        let registry = registry(majors);
        let version = Version::new(major, minor, patch);

        match registry.match_index(&version, None) {
            Ok(index) => {
                prop_assert!(major <= majors);
                prop_assert_eq!(registry.entries()[index].definition, major);
            }
            Err(_) => prop_assert!(major > majors),
        }
    }

    #[test]
    fn match_index_never_looks_past_from(
        major in 1u64..6,
        from in 0usize..5,
    ) {
        let registry = registry(5);
        let result = registry.match_index(&Version::new(major, 0, 0), Some(from));

        prop_assert_eq!(result.is_ok(), (major as usize) <= from + 1);
    }

    #[test]
    fn migration_chain_spans_exactly_the_crossed_ranges(
        saved in 1u64..7,
        coming in 1u64..7,
    ) {
        let registry = registry(6);
        let migrations_of: &dyn Fn(MigrationDirection, &[&u64]) -> Vec<u64> = &majors_of;

        let resolution = registry
            .resolve(
                Some(&Version::new(coming, 1, 0)),
                Some(&Version::new(saved, 0, 0)),
                |major| *major,
                Some(migrations_of),
            )
            .unwrap()
            .unwrap();

        prop_assert_eq!(resolution.change, coming);
        let expected: Vec<u64> = if coming > saved {
            (saved + 1..=coming).collect()
        } else {
            (coming + 1..=saved).rev().collect()
        };
        prop_assert_eq!(resolution.migrations, expected);
    }
}
