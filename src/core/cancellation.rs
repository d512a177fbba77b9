//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is passed into the build entry point and polled at
//! coarse checkpoints. Cancelling does not undo partial work; the build returns
//! [`Cancelled`] and the caller discards the half-built triangulation.

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Build phase reported with a cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildPhase {
    /// Loading points and features.
    Load,
    /// Triangulating the point set.
    Triangulation,
    /// Inserting one feature type.
    FeatureInsertion,
    /// Applying the edge option.
    EdgeOption,
    /// Void processing.
    Voids,
    /// Compacting tables.
    Compaction,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Triangulation => "triangulation",
            Self::FeatureInsertion => "feature insertion",
            Self::EdgeOption => "edge option",
            Self::Voids => "void processing",
            Self::Compaction => "compaction",
        };
        f.write_str(name)
    }
}

/// Cancellation observed at a checkpoint.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("build cancelled during {phase}")]
pub struct Cancelled {
    /// Phase that observed the request.
    pub phase: BuildPhase,
}

type CancelPredicate = dyn Fn() -> bool + Send + Sync;

/// Shared cancellation flag with an optional caller predicate.
///
/// # Examples
///
/// ```
/// use tin::core::cancellation::{BuildPhase, CancellationToken};
///
/// let token = CancellationToken::new();
/// assert!(token.check(BuildPhase::Load).is_ok());
/// token.cancel();
/// assert!(token.check(BuildPhase::Load).is_err());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    predicate: Option<Arc<CancelPredicate>>,
}

impl CancellationToken {
    /// A token that is only cancelled through [`CancellationToken::cancel`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also polls `predicate`.
    #[must_use]
    pub fn with_predicate<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            predicate: Some(Arc::new(predicate)),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.predicate.as_ref().is_some_and(|p| p())
    }

    /// Checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if cancellation was requested.
    pub fn check(&self, phase: BuildPhase) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            tracing::debug!(%phase, "cancellation observed");
            Err(Cancelled { phase })
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.flag.load(Ordering::Relaxed))
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn predicate_is_polled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let token = CancellationToken::with_predicate(move || counter.fetch_add(1, Ordering::Relaxed) >= 2);
        assert!(token.check(BuildPhase::Load).is_ok());
        assert!(token.check(BuildPhase::Triangulation).is_ok());
        let err = token.check(BuildPhase::Compaction).unwrap_err();
        assert_eq!(err.phase, BuildPhase::Compaction);
        assert_eq!(err.to_string(), "build cancelled during compaction");
    }

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(format!("{token:?}").contains("cancelled: true"));
    }
}
