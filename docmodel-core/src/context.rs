//! Per-operation execution context.
//!
//! Every backend call receives an [`OpContext`]. The default context is unbounded; a context
//! built with [`OpContext::with_timeout`] or [`OpContext::with_deadline`] makes backends refuse
//! to start work after the deadline and lets drivers forward the remaining time to the server.

use std::time::{Duration, Instant};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Deadline carried through collection operations.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use docmodel::context::OpContext;
///
/// let users = users.with_context(OpContext::with_timeout(Duration::from_secs(2)));
/// let found = users.find(doc! { "verified": true }).await?;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpContext {
    deadline: Option<Instant>,
}

impl OpContext {
    /// Context without a deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    /// Context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Instant::now().checked_add(timeout) }
    }

    /// Context expiring at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline) }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    ///
    /// An expired deadline reports `Some(Duration::ZERO)`.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Remaining time as a server-side limit, rounded up to whole milliseconds.
    ///
    /// Servers read a limit of 0 as unbounded, so a deadline with nothing left fails with
    /// [`DocumentStoreError::DeadlineExceeded`] instead of producing one.
    pub fn max_time(&self) -> DocumentStoreResult<Option<Duration>> {
        let Some(remaining) = self.remaining() else {
            return Ok(None);
        };
        if remaining.is_zero() {
            return Err(DocumentStoreError::DeadlineExceeded);
        }
        let millis = remaining.as_nanos().div_ceil(1_000_000);
        Ok(Some(Duration::from_millis(
            u64::try_from(millis).unwrap_or(u64::MAX),
        )))
    }

    /// Fails with [`DocumentStoreError::DeadlineExceeded`] once the deadline has passed.
    pub fn check(&self) -> DocumentStoreResult<()> {
        match self.remaining() {
            Some(remaining) if remaining.is_zero() => Err(DocumentStoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
