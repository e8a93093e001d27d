//! Shutdown coordination for the host process
//!
//! The binary keeps the host running until a termination signal arrives; a
//! second signal forces an immediate exit in case module teardown hangs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Exit code used when a second signal forces termination
const FORCED_EXIT_CODE: i32 = 130;

/// Broadcasts a one-shot shutdown request to every subscriber
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    requested: Arc<AtomicBool>,
    signal_count: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            requested: Arc::new(AtomicBool::new(false)),
            signal_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Request shutdown. Safe to call any number of times.
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been requested, including requests made
    /// before this call.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_requested() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Translate process signals into shutdown requests. Must be called from
    /// inside a tokio runtime.
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            // Restore default SIGPIPE so piping output into `head` does not panic.
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            for kind in [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
            ] {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    if let Ok(mut stream) = signal(kind) {
                        while stream.recv().await.is_some() {
                            coordinator.on_signal();
                        }
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    coordinator.on_signal();
                }
            });
        }
    }

    fn on_signal(&self) {
        let previous = self.signal_count.fetch_add(1, Ordering::AcqRel);
        if previous >= 1 {
            log::warn!("Second shutdown signal received; exiting immediately");
            std::process::exit(FORCED_EXIT_CODE);
        }
        log::info!("Shutdown signal received; stopping modules");
        self.trigger();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
