//! Runtime - timers and graceful shutdown

use std::time::Duration;

/// Suspend the current task.
#[cfg(feature = "native")]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(all(not(feature = "native"), feature = "wasm", target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
    crate::wasm::sleep(duration).await;
}

/// No timer available: yield once and let the caller poll again.
#[cfg(not(any(feature = "native", all(feature = "wasm", target_arch = "wasm32"))))]
pub async fn sleep(_duration: Duration) {
    futures::future::ready(()).await;
}

#[cfg(feature = "native")]
pub use shutdown::{install_signal_handlers, Shutdown};

#[cfg(feature = "native")]
mod shutdown {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::broadcast;

    /// Shutdown signal broadcaster
    #[derive(Clone)]
    pub struct Shutdown {
        sender: broadcast::Sender<()>,
        triggered: Arc<AtomicBool>,
    }

    impl Default for Shutdown {
        fn default() -> Self { Self::new() }
    }

    impl Shutdown {
        pub fn new() -> Self {
            let (sender, _) = broadcast::channel(1);
            Self { sender, triggered: Arc::new(AtomicBool::new(false)) }
        }

        pub fn subscribe(&self) -> broadcast::Receiver<()> {
            self.sender.subscribe()
        }

        /// Idempotent.
        pub fn trigger(&self) {
            if !self.triggered.swap(true, Ordering::SeqCst) {
                let _ = self.sender.send(());
            }
        }

        pub fn is_triggered(&self) -> bool {
            self.triggered.load(Ordering::SeqCst)
        }

        /// Resolves once `trigger` has been called.
        pub async fn wait(&self) {
            let mut rx = self.subscribe();
            if self.is_triggered() {
                return;
            }
            let _ = rx.recv().await;
        }
    }

    /// Install SIGINT/SIGTERM (or Ctrl+C) handlers and return the shutdown handle.
    pub fn install_signal_handlers() -> Shutdown {
        let shutdown = Shutdown::new();
        let handle = shutdown.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(mut sigterm), Ok(mut sigint)) => {
                        tokio::select! {
                            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                            _ = sigint.recv() => tracing::info!("Received SIGINT"),
                        }
                    }
                    _ => {
                        tracing::warn!("signal handlers unavailable, falling back to Ctrl+C");
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
            }

            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received Ctrl+C");
            }

            handle.trigger();
        });

        shutdown
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn trigger_is_idempotent_and_wakes_waiters() {
            let shutdown = Shutdown::new();
            let waiter = {
                let s = shutdown.clone();
                tokio::spawn(async move { s.wait().await })
            };
            tokio::task::yield_now().await;
            shutdown.trigger();
            shutdown.trigger();
            assert!(shutdown.is_triggered());
            waiter.await.unwrap();
            // Already triggered: returns immediately.
            shutdown.wait().await;
        }
    }
}
