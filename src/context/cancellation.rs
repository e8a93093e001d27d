//! Per-module cancellation signal

use tokio_util::sync::CancellationToken;

/// One-way cancellation flag owned by a module
///
/// Cloning shares the same flag. Once cancelled it stays cancelled. A signal
/// made with [`CancellationSignal::child`] is also cancelled with its parent,
/// which is how the host reaches every module at once.
#[derive(Clone, Debug, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal cancelled together with `self`; cancelling the child leaves
    /// `self` untouched.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Assert the signal. Repeated calls are no-ops.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the signal is asserted (immediately if it already is).
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The underlying token, for APIs that take one directly
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
