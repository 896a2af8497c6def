//! Projection implementations (read model builders).
//!
//! Projections consume committed envelopes and keep read models current.
//! All projections are:
//! - **Rebuildable**: replaying a stream from scratch yields the same view
//! - **Idempotent**: an envelope at or below the stream cursor is ignored

pub mod products;
pub mod sales;

use thiserror::Error;

use crate::event_store::StoreError;

pub use products::ProductCatalogProjection;
pub use sales::SalesProjection;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cursor rule shared by projections: `Ok(false)` for a replay to skip,
/// `Ok(true)` for the next envelope of the stream.
pub(crate) fn advance(last: u64, found: u64) -> Result<bool, ProjectionError> {
    if found == 0 {
        return Err(ProjectionError::NonMonotonicSequence { last, found });
    }
    if found <= last {
        return Ok(false);
    }
    if found != last + 1 {
        return Err(ProjectionError::NonMonotonicSequence { last, found });
    }
    Ok(true)
}
