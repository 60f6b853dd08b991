//! Termination signals for the server loop.

use std::fmt;
use std::io;
use tokio::signal;

/// Which signal ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            #[cfg(not(unix))]
            ShutdownSignal::Interrupt => write!(f, "Ctrl+C"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere).
pub async fn wait_for_shutdown() -> io::Result<ShutdownSignal> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        let received = tokio::select! {
            _ = interrupt.recv() => ShutdownSignal::Interrupt,
            _ = terminate.recv() => ShutdownSignal::Terminate,
        };
        Ok(received)
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok(ShutdownSignal::Interrupt)
    }
}
