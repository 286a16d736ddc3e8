use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;

/// Delivers one message on `shutdown_tx` when the process is asked to stop
/// (SIGINT/SIGTERM on unix, Ctrl+C elsewhere).
///
/// Handlers are installed before this returns, so a signal arriving right after
/// startup is already routed to the channel. The polling loop is synchronous, so
/// the signal futures get their own single-threaded runtime on a background thread.
pub fn spawn_shutdown_listener(shutdown_tx: Sender<()>) -> Result<thread::JoinHandle<()>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    let mut signals = rt
        .block_on(async { ShutdownSignals::install() })
        .context("failed to install shutdown signal handlers")?;

    thread::Builder::new()
        .name("shutdown-signal".to_string())
        .spawn(move || {
            let name = rt.block_on(signals.recv());
            tracing::info!(signal = name, "shutdown requested");
            let _ = shutdown_tx.send(());
        })
        .context("failed to spawn signal thread")
}

#[cfg(unix)]
struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "ctrl-c"
    }
}
