/// Background tasks owned by components
///
/// A component that needs to block (reading a socket, waiting for a device to
/// come back in range) does it on a task thread, never on its hub. The task is
/// owned by exactly one component and is cancelled and joined as part of that
/// component's shutdown.
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::fmt::Display;
use std::io::{self, BufRead, ErrorKind};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::ComponentError;

/// Cancellation signal handed to a background task
///
/// Cancellation is signalled by dropping the paired sender, so every clone of
/// the token observes it.
#[derive(Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    /// Create a token together with the handle that cancels it on drop
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = bounded(0);
        (CancelHandle { _tx: tx }, Self { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns false if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        matches!(self.rx.recv_timeout(duration), Err(RecvTimeoutError::Timeout))
    }

    /// Read one `\n`-terminated line from a reader with a read timeout set,
    /// retrying timeouts until cancelled.
    ///
    /// Returns Ok(false) at end of stream or on cancellation. A final line
    /// without terminator is still returned.
    pub fn read_line<R: BufRead>(&self, reader: &mut R, line: &mut Vec<u8>) -> io::Result<bool> {
        line.clear();
        loop {
            if self.is_cancelled() {
                return Ok(false);
            }
            match reader.read_until(b'\n', line) {
                Ok(0) => return Ok(!line.is_empty()),
                Ok(_) if line.ends_with(b"\n") => return Ok(true),
                Ok(_) => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                    continue
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Dropping this cancels the paired [`CancelToken`]
pub struct CancelHandle {
    _tx: Sender<()>,
}

/// A thread owned by a component
pub struct BackgroundTask {
    name: String,
    cancel: Option<CancelHandle>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Spawn `body` on a named thread
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Result<Self, ComponentError>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let name = name.into();
        let (cancel, token) = CancelToken::new();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(token))
            .map_err(ComponentError::TaskSpawnFailed)?;

        tracing::debug!("Background task {} started", name);
        Ok(Self {
            name,
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal cancellation and wait for the task to exit
    pub fn cancel_and_join(&mut self) {
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Background task {} panicked", self.name);
            } else {
                tracing::debug!("Background task {} stopped", self.name);
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.cancel_and_join();
    }
}

/// Fixed-interval retry for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn fixed(backoff: Duration) -> Self {
        Self {
            backoff,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Run `attempt` until it succeeds.
    ///
    /// Returns None if the token is cancelled or attempts run out. Failures
    /// are logged at warning level and never propagate.
    pub fn run<T, E, F>(&self, token: &CancelToken, what: &str, mut attempt: F) -> Option<T>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempts = 0u32;
        loop {
            if token.is_cancelled() {
                return None;
            }
            attempts += 1;
            match attempt() {
                Ok(value) => return Some(value),
                Err(e) => {
                    tracing::warn!("{} failed (attempt {}): {}", what, attempts, e);
                }
            }
            if let Some(max) = self.max_attempts {
                if attempts >= max {
                    return None;
                }
            }
            if !token.sleep(self.backoff) {
                return None;
            }
        }
    }
}
