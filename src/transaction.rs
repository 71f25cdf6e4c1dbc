use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::DataApiError;
use crate::target::ConnectionTarget;

/// Lifecycle of a transaction handle. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TxState::Active => "active",
            TxState::Committed => "committed",
            TxState::RolledBack => "rolled back",
        };
        f.write_str(label)
    }
}

struct Inner {
    id: String,
    resource_arn: String,
    state: Mutex<TxState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TxState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if *self.lock() == TxState::Active {
            // The service expires abandoned transactions on its own; nothing async can run here.
            tracing::warn!(
                transaction_id = %self.id,
                "transaction handle dropped while still active; it will be rolled back when the server times it out"
            );
        }
    }
}

/// Opaque handle for a server-side transaction.
///
/// Clones share one lifecycle: once any clone is committed or rolled back, every clone is
/// terminal and the executor refuses it with `TransactionError`.
#[derive(Clone)]
pub struct TransactionHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl TransactionHandle {
    pub(crate) fn new(id: String, target: &ConnectionTarget) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                resource_arn: target.resource_arn().to_string(),
                state: Mutex::new(TxState::Active),
            }),
        }
    }

    /// Server-side transaction id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        *self.inner.lock()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == TxState::Active
    }

    /// Refuse handles that are terminal or were started against a different cluster.
    pub(crate) fn ensure_usable(&self, target: &ConnectionTarget) -> Result<(), DataApiError> {
        self.check(target, *self.inner.lock())
    }

    /// Move an active handle to a terminal state. The transition happens before the remote
    /// call, so a failed commit or rollback still retires the handle.
    pub(crate) fn finish(
        &self,
        target: &ConnectionTarget,
        next: TxState,
    ) -> Result<(), DataApiError> {
        let mut state = self.inner.lock();
        self.check(target, *state)?;
        *state = next;
        Ok(())
    }

    fn check(&self, target: &ConnectionTarget, state: TxState) -> Result<(), DataApiError> {
        if self.inner.resource_arn != target.resource_arn() {
            return Err(DataApiError::TransactionError(format!(
                "transaction {} belongs to {}, not {}",
                self.inner.id,
                self.inner.resource_arn,
                target.resource_arn()
            )));
        }
        if state != TxState::Active {
            return Err(DataApiError::TransactionError(format!(
                "transaction {} is already {state}",
                self.inner.id
            )));
        }
        Ok(())
    }
}

/// Outcome returned by committing or rolling back a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub transaction_id: String,
    pub state: TxState,
    /// Status text reported by the service, e.g. `Transaction Committed`.
    pub status: String,
}
