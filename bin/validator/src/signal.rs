//! Shutdown on SIGINT or SIGTERM.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancel` on the first SIGINT or SIGTERM.
pub fn cancel_on_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(err) => {
                    error!("failed to register SIGTERM handler: {err}");
                    return;
                }
            };
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => info!("received SIGINT"),
                    Err(err) => {
                        error!("failed to listen for SIGINT: {err}");
                        return;
                    }
                },
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("failed to listen for SIGINT: {err}");
                return;
            }
            info!("received SIGINT");
        }

        cancel.cancel();
    });
}
