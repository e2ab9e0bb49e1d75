//! Derived-state services.
//!
//! # Responsibility
//! - Orchestrate store reads and derived-field write-backs for each
//!   synchronization rule.
//! - Keep every rule idempotent: recompute from authoritative reloaded
//!   state, write only when the stored value differs.
//!
//! # Invariants
//! - Services never create or delete entities.
//! - A rule that cannot resolve its inputs (normalization miss, missing
//!   row, incomplete scope) skips silently; only store failures and
//!   payload validation surface as errors.

use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod course_link;
pub mod propagation;
pub mod rollup;

/// Engine-level failure surfaced to the dispatcher.
#[derive(Debug)]
pub enum SyncError {
    /// Store read/write failure; propagated, logged by the dispatcher,
    /// never retried automatically.
    Store(StoreError),
    /// Required payload fields are missing; reported as a rejected write
    /// to the caller of the original operation.
    Validation(String),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Validation(message) => write!(f, "invalid payload: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Validation(_) => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
