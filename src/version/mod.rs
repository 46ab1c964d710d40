// Copyright (c) 2025 - Cowboy AI, Inc.
//! Versioning Infrastructure
//!
//! Every event names the platform contract version it was produced under.
//! Authors register one handler definition per non-overlapping semantic
//! version range; the resolver routes each event to the definition whose
//! range matches and computes the storage migrations between the version a
//! resource was last handled with and the incoming one.
//!
//! # Architecture
//!
//! ```text
//! register("^1"), register("^2"), register("^3")   (sorted, disjoint)
//!        │
//! event v3.1 ──▶ match_index ──▶ definition[^3] ──▶ change
//!                     │
//! saved v1.4 ──▶ match_index(from = ^3) ──▶ [^2.up, ^3.up] ──▶ MigrationChain
//! ```

use thiserror::Error;

pub mod migration;
pub mod range;
pub mod registry;

pub use migration::{
    Migration, MigrationChain, MigrationDirection, MigrationError, MigrationFns, MigrationStep,
};
pub use range::{parse_version, VersionRange};
pub use registry::{Resolution, VersionEntry, VersionRegistry, VersionedDefinition};

pub use semver::Version;

/// Errors from version registration and resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// Version string is not a semantic version
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// Range string cannot be parsed or matches nothing
    #[error("invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },

    /// Range uses a comparator the resolver does not understand
    #[error("unsupported version range '{0}'")]
    UnsupportedRange(String),

    /// Two registered ranges can match the same version
    #[error("version range {new} overlaps registered range {existing}")]
    OverlappingRanges { existing: String, new: String },

    /// Nothing was registered
    #[error("no handler definitions registered")]
    NoDefinitions,

    /// No registered range matches the version
    #[error("no registered definition matches version {0}")]
    NoMatchingVersion(String),
}

/// Result type for versioning operations
pub type VersionResult<T> = Result<T, VersionError>;
