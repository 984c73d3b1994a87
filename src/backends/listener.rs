//! Listener thread lifecycle shared by every backend.
//!
//! [`ListenerThread::spawn`] starts a named thread and blocks until the thread reports
//! through [`Ready`] that it is listening (or failed to). [`ListenerThread::join`] is the
//! second half of the strict shutdown protocol: the backend signals cancellation through
//! its own channel first, then joins here without a timeout.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Sender};
use std::thread::{self, JoinHandle};

/// One-shot startup handshake handed to the listener body.
pub(crate) struct Ready<T>(Sender<Result<T>>);

impl<T> Ready<T> {
    /// Report that the listener is waiting for notifications.
    pub(crate) fn listening(self, value: T) {
        let _ = self.0.send(Ok(value));
    }

    /// Report that setup failed; the body must return right after.
    pub(crate) fn failed(self, err: Error) {
        let _ = self.0.send(Err(err));
    }
}

pub(crate) struct ListenerThread {
    handle: Option<JoinHandle<()>>,
}

impl ListenerThread {
    /// Spawn `body` on a thread called `name` and wait for its [`Ready`] report.
    ///
    /// If the body fails or returns without reporting, the thread is joined before
    /// the error is returned.
    pub(crate) fn spawn<T, F>(name: &str, body: F) -> Result<(Self, T)>
    where
        T: Send + 'static,
        F: FnOnce(Ready<T>) + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(Ready(tx)))
            .map_err(|e| Error::BackendInit(format!("failed to spawn listener thread: {e}")))?;

        match rx.recv() {
            Ok(Ok(value)) => Ok((
                Self {
                    handle: Some(handle),
                },
                value,
            )),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::BackendInit(
                    "listener thread exited during startup".into(),
                ))
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the thread to exit. Idempotent.
    ///
    /// Called from the listener thread itself (an observer shutting the enumerator down)
    /// the handle is released instead; the thread exits as soon as the observer returns.
    pub(crate) fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            log::warn!("listener stopped from its own thread; not joining");
            return;
        }
        if handle.join().is_err() {
            log::error!("listener thread panicked");
        }
    }
}

impl Drop for ListenerThread {
    fn drop(&mut self) {
        self.join();
    }
}
