//! Simulated hot-plug source.
//!
//! [`VirtualHub`] stands in for the OS: it owns a list of "attached" devices and a
//! notification channel. `plug`/`unplug` edit the list and raise a notification, the
//! same way a real arrival/removal raises `WM_DEVICECHANGE` or a uevent. The
//! [`VirtualBackend`] listener reacts to each notification with a full rescan through
//! the [`VirtualProbe`], so it exercises exactly the path the native backends use.
//!
//! Useful for tests, demos, and platforms without a native backend.
//!
//! ```no_run
//! use stickwatch::{Enumerator, VirtualHub};
//!
//! let hub = VirtualHub::new();
//! hub.plug("Virtual Stick");
//! let enumerator = Enumerator::simulated(&hub);
//! enumerator.start().expect("virtual backend starts");
//! assert_eq!(enumerator.number_connected(), 1);
//! ```

use crate::backends::listener::ListenerThread;
use crate::backends::{BackendState, DeviceSink, NotificationBackend};
use crate::device::{DeviceInfo, DeviceProbe};
use crate::error::{Error, Result};
use crate::metadata::DeviceMeta;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// What the simulated OS reports. Like `WM_DEVICECHANGE`, it does not say which device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    Arrival,
    Removal,
}

struct HubInner {
    present: Mutex<Vec<DeviceInfo>>,
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
    serial: AtomicU32,
}

/// Handle to a simulated set of attached devices. Cheap to clone.
#[derive(Clone)]
pub struct VirtualHub {
    inner: Arc<HubInner>,
}

impl Default for VirtualHub {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualHub {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            inner: Arc::new(HubInner {
                present: Mutex::new(Vec::new()),
                tx,
                rx,
                serial: AtomicU32::new(0),
            }),
        }
    }

    fn present(&self) -> std::sync::MutexGuard<'_, Vec<DeviceInfo>> {
        self.inner
            .present
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a new device with a unique `virtual:N` path. Returns the path.
    pub fn plug(&self, name: &str) -> String {
        let n = self.inner.serial.fetch_add(1, Ordering::Relaxed);
        let path = format!("virtual:{n}");
        let meta = DeviceMeta {
            bus: Some("virtual".into()),
            ..DeviceMeta::default()
        };
        self.plug_device(DeviceInfo::new(path.clone(), name).with_meta(meta));
        path
    }

    /// Attach a caller-described device. Re-plugging a present path is a no-op.
    pub fn plug_device(&self, info: DeviceInfo) {
        {
            let mut present = self.present();
            if present.iter().any(|d| d.path == info.path) {
                return;
            }
            present.push(info);
        }
        let _ = self.inner.tx.send(Notification::Arrival);
    }

    /// Detach the device at `path`. Returns `false` if it wasn't attached.
    pub fn unplug(&self, path: &str) -> bool {
        {
            let mut present = self.present();
            let before = present.len();
            present.retain(|d| d.path != path);
            if present.len() == before {
                return false;
            }
        }
        let _ = self.inner.tx.send(Notification::Removal);
        true
    }

    /// Raise a notification without changing the device list (spurious wake-up).
    pub fn notify(&self, notification: Notification) {
        let _ = self.inner.tx.send(notification);
    }

    /// Paths currently attached, in plug order.
    pub fn attached(&self) -> Vec<String> {
        self.present().iter().map(|d| d.path.clone()).collect()
    }

    /// Notifications not yet consumed by a listener.
    pub fn pending(&self) -> usize {
        self.inner.rx.len()
    }

    pub fn probe(&self) -> VirtualProbe {
        VirtualProbe { hub: self.clone() }
    }

    /// Backend fed by this hub's notifications. Use one backend per hub.
    pub fn backend(&self, thread_name: impl Into<String>) -> VirtualBackend {
        VirtualBackend {
            notifications: self.inner.rx.clone(),
            thread_name: thread_name.into(),
            state: BackendState::Uninitialized,
            cancel: None,
            thread: None,
        }
    }
}

/// Enumeration provider reading a [`VirtualHub`]'s device list.
pub struct VirtualProbe {
    hub: VirtualHub,
}

impl DeviceProbe for VirtualProbe {
    fn scan(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.hub.present().clone())
    }
}

/// Listener waiting on a [`VirtualHub`]'s notification channel.
pub struct VirtualBackend {
    notifications: Receiver<Notification>,
    thread_name: String,
    state: BackendState,
    cancel: Option<Sender<()>>,
    thread: Option<ListenerThread>,
}

impl VirtualBackend {
    fn run(
        notifications: Receiver<Notification>,
        cancel: Receiver<()>,
        sink: Arc<dyn DeviceSink>,
    ) {
        sink.rescan();
        loop {
            select! {
                recv(cancel) -> _ => break,
                recv(notifications) -> msg => {
                    let Ok(notification) = msg else {
                        log::error!("virtual hub dropped; listener exiting");
                        break;
                    };
                    // Cancellation wins over a simultaneously ready notification.
                    if !matches!(cancel.try_recv(), Err(TryRecvError::Empty)) {
                        break;
                    }
                    log::debug!("virtual hub: {notification:?}");
                    sink.rescan();
                }
            }
        }
    }
}

impl NotificationBackend for VirtualBackend {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn state(&self) -> BackendState {
        match (&self.state, &self.thread) {
            (BackendState::Listening, Some(t)) if !t.is_running() => BackendState::Stopped,
            (state, _) => *state,
        }
    }

    fn start(&mut self, sink: Arc<dyn DeviceSink>) -> Result<()> {
        if self.state != BackendState::Uninitialized {
            return Err(Error::BackendInit(format!(
                "virtual backend cannot start from {:?}",
                self.state
            )));
        }
        let (cancel_tx, cancel_rx) = bounded(1);
        let notifications = self.notifications.clone();
        let spawned = ListenerThread::spawn(&self.thread_name, move |ready| {
            ready.listening(());
            Self::run(notifications, cancel_rx, sink);
        });
        match spawned {
            Ok((thread, ())) => {
                self.thread = Some(thread);
                self.cancel = Some(cancel_tx);
                self.state = BackendState::Listening;
                log::info!("virtual backend listening");
                Ok(())
            }
            Err(err) => {
                self.state = BackendState::Stopped;
                Err(err)
            }
        }
    }

    fn stop(&mut self) {
        if matches!(self.state, BackendState::Stopped) {
            return;
        }
        self.state = BackendState::ShuttingDown;
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(mut thread) = self.thread.take() {
            thread.join();
        }
        self.state = BackendState::Stopped;
        log::info!("virtual backend stopped");
    }
}

impl Drop for VirtualBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plug_and_unplug_edit_the_device_list() {
        let hub = VirtualHub::new();
        let a = hub.plug("A");
        let b = hub.plug("B");
        assert_eq!(hub.attached(), vec![a.clone(), b.clone()]);
        assert!(hub.unplug(&a));
        assert!(!hub.unplug(&a));
        assert_eq!(hub.attached(), vec![b]);
        assert_eq!(hub.pending(), 3);
    }

    #[test]
    fn probe_reports_attached_devices() {
        let hub = VirtualHub::new();
        hub.plug_device(DeviceInfo::new("virtual:custom", "Custom"));
        hub.plug_device(DeviceInfo::new("virtual:custom", "Duplicate"));
        let found = hub.probe().scan().expect("virtual scan never fails");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Custom");
    }

    #[test]
    fn backend_cannot_start_twice() {
        struct Nop;
        impl DeviceSink for Nop {
            fn rescan(&self) {}
            fn device_added(&self, _info: DeviceInfo) {}
            fn device_removed(&self, _path: &str) {}
        }

        let hub = VirtualHub::new();
        let mut backend = hub.backend("virtual-test");
        assert_eq!(backend.state(), BackendState::Uninitialized);
        backend.start(Arc::new(Nop)).expect("first start");
        assert_eq!(backend.state(), BackendState::Listening);
        assert!(backend.start(Arc::new(Nop)).is_err());
        backend.stop();
        backend.stop();
        assert_eq!(backend.state(), BackendState::Stopped);
    }
}
