//! Shutdown coordination between the node's tokio tasks.
//!
//! The flag lives in a `watch` channel, so a task that subscribes after
//! shutdown was requested still observes it on its first poll.

use tokio::signal;
use tokio::sync::watch;
use tracing::info;

pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

/// Held by a task; resolves once the node is stopping.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Request shutdown. Repeated requests are no-ops.
    pub fn shutdown(&self) {
        self.tx.send_if_modified(|stopping| !std::mem::replace(stopping, true));
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait for SIGINT (or SIGTERM on unix), then request shutdown.
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use signal::unix::{signal as unix_signal, SignalKind};
            let mut terminate = unix_signal(SignalKind::terminate())?;
            tokio::select! {
                result = signal::ctrl_c() => result?,
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        signal::ctrl_c().await?;

        info!("termination signal received");
        self.shutdown();
        Ok(())
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolves once shutdown has been requested, or the controller is gone.
    pub async fn triggered(&mut self) {
        // An Err means the sender was dropped, which is as final as a stop.
        let _ = self.rx.wait_for(|stopping| *stopping).await;
    }
}
