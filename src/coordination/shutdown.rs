//! Cooperative shutdown signalling
//!
//! One [`Shutdown`] controller fans a single cancellation signal out to every
//! long-running task through cloned [`ShutdownToken`]s. Tasks observe the
//! signal at their own suspension points (tick waits, channel receives); no
//! task is interrupted mid-request.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Normal graceful shutdown (SIGTERM, SIGINT)
    Graceful,
    /// Requested by the process itself (tests, fatal collaborator error)
    Internal,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Internal => write!(f, "internal"),
        }
    }
}

/// Shutdown controller; owns the sending side of the signal
pub struct Shutdown {
    requested: AtomicBool,
    signal_tx: watch::Sender<Option<ShutdownSignal>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (signal_tx, _) = watch::channel(None);
        Self {
            requested: AtomicBool::new(false),
            signal_tx,
        }
    }

    /// Hand out a token for a task to observe
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            signal_rx: self.signal_tx.subscribe(),
        }
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Request shutdown; duplicates are ignored
    pub fn request_shutdown(&self, signal: ShutdownSignal) {
        if self.requested.swap(true, Ordering::SeqCst) {
            warn!(%signal, "shutdown already requested, ignoring duplicate signal");
            return;
        }

        info!(%signal, "shutdown requested");
        self.signal_tx.send_replace(Some(signal));
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the shutdown signal, cheap to clone
#[derive(Clone)]
pub struct ShutdownToken {
    signal_rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownToken {
    /// Check without waiting
    pub fn is_shutdown_requested(&self) -> bool {
        self.signal_rx.borrow().is_some()
    }

    /// Wait for the shutdown signal.
    ///
    /// Resolves immediately if the signal was already sent. A dropped
    /// controller counts as shutdown. Cancel safe, so it can sit in a
    /// `tokio::select!` loop.
    pub async fn cancelled(&mut self) -> ShutdownSignal {
        loop {
            if let Some(signal) = *self.signal_rx.borrow_and_update() {
                return signal;
            }
            if self.signal_rx.changed().await.is_err() {
                return ShutdownSignal::Internal;
            }
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_os_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
