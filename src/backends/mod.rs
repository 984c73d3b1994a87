//! Hot-plug notification backends for `stickwatch`.
//!
//! A backend owns one listener thread that waits on a platform notification primitive
//! and reports what it saw through a [`DeviceSink`]. Backends never touch the device
//! map directly; the sink is the only door into shared state.
//!
//! | Backend | Platform | Waits in | Cancelled by |
//! |---|---|---|---|
//! | [`windows::MessagePumpBackend`] | Windows | `GetMessageW` on a message-only window | posting `WM_CLOSE` to that window |
//! | [`linux::SocketMonitorBackend`] | Linux | `poll(2)` over a udev monitor socket + self-pipe | one byte written to the pipe |
//! | [`virtual_input::VirtualBackend`] | any | `crossbeam_channel::select!` | a message on the cancel channel |
//!
//! All variants share the same lifecycle ([`BackendState`]) and the same strict shutdown:
//! signal, then join. There is no timeout and no forced thread termination.

use crate::config::EnumeratorConfig;
use crate::device::{DeviceInfo, DeviceProbe};
use crate::error::{Error, Result};
use std::sync::Arc;

pub(crate) mod listener;
pub mod virtual_input;

#[cfg(target_os = "linux")]
#[cfg_attr(docsrs, doc(cfg(target_os = "linux")))]
pub mod linux;

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;

/// Backend lifecycle: `Uninitialized → Listening → ShuttingDown → Stopped`.
///
/// A failed start goes straight from `Uninitialized` to `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendState {
    Uninitialized,
    Listening,
    ShuttingDown,
    Stopped,
}

/// Narrow interface through which a listener thread reports hardware events.
pub trait DeviceSink: Send + Sync {
    /// The platform reported "something changed"; re-enumerate and diff.
    fn rescan(&self);
    /// The platform reported a concrete device arrival.
    fn device_added(&self, info: DeviceInfo);
    /// The platform reported a concrete device removal, by native path.
    fn device_removed(&self, path: &str);
}

/// Platform notification capability.
pub trait NotificationBackend: Send {
    fn name(&self) -> &'static str;

    fn state(&self) -> BackendState;

    /// Start listening.
    ///
    /// Blocks until the listener thread is actually waiting for notifications (or has
    /// failed to get there). On error nothing is left running and the backend is `Stopped`.
    /// Calling `start` on a backend that is not `Uninitialized` is an error.
    fn start(&mut self, sink: Arc<dyn DeviceSink>) -> Result<()>;

    /// Stop listening and release every platform resource.
    ///
    /// Returns once the listener thread has exited. Idempotent.
    fn stop(&mut self);
}

/// Native probe/backend pair for the build target.
#[cfg(target_os = "linux")]
pub fn native(config: &EnumeratorConfig) -> (Box<dyn DeviceProbe>, Box<dyn NotificationBackend>) {
    (
        Box::new(linux::UdevProbe::new(config.udev.clone())),
        Box::new(linux::SocketMonitorBackend::new(
            config.udev.clone(),
            config.thread_name.clone(),
        )),
    )
}

/// Native probe/backend pair for the build target.
#[cfg(target_os = "windows")]
pub fn native(config: &EnumeratorConfig) -> (Box<dyn DeviceProbe>, Box<dyn NotificationBackend>) {
    (
        Box::new(windows::HidProbe::new(config.hid.clone())),
        Box::new(windows::MessagePumpBackend::new(config.thread_name.clone())),
    )
}

/// Native probe/backend pair for the build target.
///
/// No hot-plug source exists here; starting fails with [`Error::BackendInit`].
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub fn native(_config: &EnumeratorConfig) -> (Box<dyn DeviceProbe>, Box<dyn NotificationBackend>) {
    (Box::new(UnsupportedProbe), Box::new(UnsupportedBackend::default()))
}

#[cfg_attr(any(target_os = "linux", target_os = "windows"), allow(dead_code))]
struct UnsupportedProbe;

impl DeviceProbe for UnsupportedProbe {
    fn scan(&self) -> Result<Vec<DeviceInfo>> {
        Err(Error::Enumeration(
            "no native device provider on this platform".into(),
        ))
    }
}

#[cfg_attr(any(target_os = "linux", target_os = "windows"), allow(dead_code))]
#[derive(Default)]
struct UnsupportedBackend {
    stopped: bool,
}

impl NotificationBackend for UnsupportedBackend {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn state(&self) -> BackendState {
        if self.stopped {
            BackendState::Stopped
        } else {
            BackendState::Uninitialized
        }
    }

    fn start(&mut self, _sink: Arc<dyn DeviceSink>) -> Result<()> {
        self.stopped = true;
        Err(Error::BackendInit(
            "no hot-plug backend for this platform".into(),
        ))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
