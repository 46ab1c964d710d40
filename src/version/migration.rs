// Copyright (c) 2025 - Cowboy AI, Inc.
//! Storage migrations between adjacent handler versions
//!
//! Each registered definition may carry a migration describing how a
//! resource's storage blob changes when crossing into (`up`) or back out of
//! (`down`) its version range. The resolver picks the definitions between the
//! saved and incoming version; the chain applies their migrations in order.
//!
//! ```text
//! saved 1.x ──up(2.x)──▶ 2.x ──up(3.x)──▶ 3.x incoming
//! saved 3.x ──down(3.x)──▶ 2.x ──down(2.x)──▶ 1.x incoming
//! ```
//!
//! # Example
//!
//! ```rust
//! use powerapp_sdk::version::{MigrationChain, MigrationDirection, MigrationFns};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let rename = MigrationFns::new()
//!     .with_up(|mut storage| {
//!         if let Some(obj) = storage.as_object_mut() {
//!             if let Some(count) = obj.remove("count") {
//!                 obj.insert("total".to_string(), count);
//!             }
//!         }
//!         Ok(storage)
//!     });
//!
//! let mut chain = MigrationChain::new();
//! chain.add(MigrationDirection::Up, Arc::new(rename));
//!
//! let migrated = chain.run(json!({"count": 3})).unwrap();
//! assert_eq!(migrated, json!({"total": 3}));
//! ```

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type for migration functions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// JSON transformation failed
    #[error("storage transformation failed: {0}")]
    TransformationFailed(String),

    /// Missing required field in the old shape
    #[error("required field '{0}' missing in stored data")]
    MissingField(String),

    /// Invalid field value that cannot be migrated
    #[error("invalid value in field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },
}

/// Direction a migration runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationDirection {
    Up,
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Transforms a storage blob across one version boundary
///
/// The blob is `Null` for resources that never stored anything.
pub trait Migration: Send + Sync {
    /// Older shape to this version's shape
    fn up(&self, storage: Value) -> Result<Value, MigrationError>;

    /// This version's shape back to the older shape
    fn down(&self, storage: Value) -> Result<Value, MigrationError>;

    /// Optional: verify invariants after either direction
    fn validate(&self, _storage: &Value) -> Result<(), MigrationError> {
        Ok(())
    }
}

type MigrationFn = Arc<dyn Fn(Value) -> Result<Value, MigrationError> + Send + Sync>;

/// Closure-based [`Migration`]; a missing direction leaves the blob as is
#[derive(Clone, Default)]
pub struct MigrationFns {
    up: Option<MigrationFn>,
    down: Option<MigrationFn>,
}

impl MigrationFns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_up<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, MigrationError> + Send + Sync + 'static,
    {
        self.up = Some(Arc::new(f));
        self
    }

    pub fn with_down<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, MigrationError> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(f));
        self
    }
}

impl Migration for MigrationFns {
    fn up(&self, storage: Value) -> Result<Value, MigrationError> {
        match &self.up {
            Some(f) => f(storage),
            None => Ok(storage),
        }
    }

    fn down(&self, storage: Value) -> Result<Value, MigrationError> {
        match &self.down {
            Some(f) => f(storage),
            None => Ok(storage),
        }
    }
}

impl fmt::Debug for MigrationFns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationFns")
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .finish()
    }
}

/// One resolved migration and the direction to run it in
#[derive(Clone)]
pub struct MigrationStep {
    pub direction: MigrationDirection,
    pub migration: Arc<dyn Migration>,
}

impl MigrationStep {
    pub fn new(direction: MigrationDirection, migration: Arc<dyn Migration>) -> Self {
        Self {
            direction,
            migration,
        }
    }

    pub fn apply(&self, storage: Value) -> Result<Value, MigrationError> {
        let migrated = match self.direction {
            MigrationDirection::Up => self.migration.up(storage)?,
            MigrationDirection::Down => self.migration.down(storage)?,
        };
        self.migration.validate(&migrated)?;
        Ok(migrated)
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

/// Ordered migrations, run sequentially over one storage blob
#[derive(Debug, Clone, Default)]
pub struct MigrationChain {
    steps: Vec<MigrationStep>,
}

impl MigrationChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, direction: MigrationDirection, migration: Arc<dyn Migration>) {
        self.steps.push(MigrationStep::new(direction, migration));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step in order; the first failure aborts the chain
    pub fn run(&self, mut storage: Value) -> Result<Value, MigrationError> {
        for step in &self.steps {
            storage = step.apply(storage)?;
        }
        Ok(storage)
    }
}

impl From<Vec<MigrationStep>> for MigrationChain {
    fn from(steps: Vec<MigrationStep>) -> Self {
        Self { steps }
    }
}

impl FromIterator<MigrationStep> for MigrationChain {
    fn from_iter<I: IntoIterator<Item = MigrationStep>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}
