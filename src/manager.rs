//! High-level device registry with hot-plug tracking.
//!
//! [`Enumerator`] is the main entry point of the crate. It owns:
//! - the [`DeviceMap`] (what is connected now),
//! - the ordered list of observers,
//! - the platform [`NotificationBackend`] and its listener thread.
//!
//! ## Typical flow
//! 1. Build one [`Enumerator`] at startup ([`Enumerator::new`]) and share it by
//!    reference, or use the lazily created process-wide [`Enumerator::instance`].
//! 2. [`register`](Enumerator::register) observers.
//! 3. [`start`](Enumerator::start): initial scan (observers see one `Connected` per
//!    device), then the backend starts listening.
//! 4. Read [`number_connected`](Enumerator::number_connected) /
//!    [`devices`](Enumerator::devices) from any thread at any time.
//! 5. [`shutdown`](Enumerator::shutdown) (or drop) stops the listener and joins it.
//!
//! ## Threading
//! Observers run on whichever thread detected the change: the `start()` caller for the
//! initial scan, the listener thread afterwards. Neither the map lock nor the state
//! lock is held while an observer runs, so observers may read the enumerator (including
//! [`is_started`](Enumerator::is_started)) or register more observers.
//! Observers must not call [`start`](Enumerator::start) or
//! [`shutdown`](Enumerator::shutdown).
//!
//! ## Example
//! ```no_run
//! use stickwatch::{ChangeKind, Enumerator, EnumeratorConfig};
//!
//! let enumerator = Enumerator::new(EnumeratorConfig::default());
//! enumerator.register(|change: stickwatch::DeviceStateChange| match change.kind {
//!     ChangeKind::Connected => println!("joystick #{} connected", change.device_id),
//!     ChangeKind::Disconnected => println!("joystick #{} gone", change.device_id),
//! });
//! enumerator.start().expect("hot-plug backend");
//! println!("{} joystick(s) attached", enumerator.number_connected());
//! ```

use crate::backends::virtual_input::VirtualHub;
use crate::backends::{self, DeviceSink, NotificationBackend};
use crate::config::EnumeratorConfig;
use crate::device::{DeviceId, DeviceInfo, DeviceProbe, DeviceRecord};
use crate::error::{Error, Result};
use crate::event::DeviceStateChange;
use crate::eventbus::{DeviceListener, EventFilter, ListenerBus};
use crate::registry::DeviceMap;
use crate::snapshot::Snapshot;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// State shared with the listener thread through [`DeviceSink`].
struct Shared {
    map: DeviceMap,
    bus: ListenerBus,
    probe: Box<dyn DeviceProbe>,
}

impl Shared {
    fn publish(&self, changes: &[DeviceStateChange]) {
        self.bus.emit_all(changes);
    }
}

impl DeviceSink for Shared {
    fn rescan(&self) {
        match self.probe.scan() {
            Ok(present) => {
                let changes = self.map.reconcile(present);
                self.publish(&changes);
            }
            Err(err) => log::warn!("device scan failed: {err}"),
        }
    }

    fn device_added(&self, info: DeviceInfo) {
        if let Some(change) = self.map.attach(info) {
            self.publish(&[change]);
        }
    }

    fn device_removed(&self, path: &str) {
        if let Some(change) = self.map.detach_path(path) {
            self.publish(&[change]);
        }
    }
}

struct Lifecycle {
    // `None` once shut down, and while `start` has the backend checked out.
    backend: Option<Box<dyn NotificationBackend>>,
    started: bool,
    shut_down: bool,
}

/// Live registry of connected joysticks.
pub struct Enumerator {
    shared: Arc<Shared>,
    // Serializes `start` and `shutdown`. Held across observer dispatch, so observers
    // must not take it.
    transition: Mutex<()>,
    // Short-lived state lock; never held while observers run.
    lifecycle: Mutex<Lifecycle>,
}

static INSTANCE: OnceLock<Enumerator> = OnceLock::new();

impl Enumerator {
    /// Enumerator using the native backend for the build target.
    pub fn new(config: EnumeratorConfig) -> Self {
        let (probe, backend) = backends::native(&config);
        Self::with_backend(probe, backend)
    }

    /// Enumerator driven by a simulated [`VirtualHub`].
    pub fn simulated(hub: &VirtualHub) -> Self {
        let config = EnumeratorConfig::default();
        Self::with_backend(Box::new(hub.probe()), Box::new(hub.backend(config.thread_name)))
    }

    /// Enumerator with a caller-supplied probe/backend pair.
    pub fn with_backend(probe: Box<dyn DeviceProbe>, backend: Box<dyn NotificationBackend>) -> Self {
        Self {
            shared: Arc::new(Shared {
                map: DeviceMap::new(),
                bus: ListenerBus::new(),
                probe,
            }),
            transition: Mutex::new(()),
            lifecycle: Mutex::new(Lifecycle {
                backend: Some(backend),
                started: false,
                shut_down: false,
            }),
        }
    }

    /// The process-wide enumerator, created with the default configuration on first use.
    ///
    /// Prefer constructing one [`Enumerator`] and passing it around; this exists for
    /// callers that cannot thread a handle through. The instance lives until process
    /// exit; call [`shutdown`](Self::shutdown) to stop its listener deterministically.
    pub fn instance() -> &'static Enumerator {
        INSTANCE.get_or_init(|| Enumerator::new(EnumeratorConfig::default()))
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scan for attached devices and start hot-plug monitoring.
    ///
    /// Idempotent: once started, further calls return `Ok(())` and do nothing.
    /// On [`Error::BackendInit`] the initial scan results stay in the map but no live
    /// updates will arrive. The failed backend is left `Stopped`, so calling `start`
    /// again rescans and reports the failure again. After [`shutdown`](Self::shutdown)
    /// this returns [`Error::ShutDown`].
    ///
    /// Concurrent callers wait for the first one to finish and then see its outcome.
    pub fn start(&self) -> Result<()> {
        let _transition = self.transition();
        let mut backend = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.started {
                return Ok(());
            }
            if lifecycle.shut_down {
                return Err(Error::ShutDown);
            }
            match lifecycle.backend.take() {
                Some(backend) => backend,
                None => return Err(Error::ShutDown),
            }
        };

        // Observers see the initial scan with no state lock held.
        self.shared.rescan();
        log::info!(
            "initial scan: {} device(s); starting {} backend",
            self.shared.map.len(),
            backend.name()
        );

        let sink: Arc<dyn DeviceSink> = self.shared.clone();
        let result = backend.start(sink);
        if let Err(err) = &result {
            log::error!("{} backend failed to start: {err}", backend.name());
        }

        let mut lifecycle = self.lifecycle();
        lifecycle.started = result.is_ok();
        lifecycle.backend = Some(backend);
        result
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle().started
    }

    /// Number of devices currently in the map.
    pub fn number_connected(&self) -> usize {
        self.shared.map.len()
    }

    /// Register a callback for every subsequent device-state change.
    ///
    /// Callbacks run in registration order and cannot be unregistered.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(DeviceStateChange) + Send + Sync + 'static,
    {
        self.shared.bus.add_listener(callback, EventFilter::All);
    }

    /// Register a [`DeviceListener`] that only sees changes passing `filter`.
    pub fn register_filtered(&self, listener: impl DeviceListener + 'static, filter: EventFilter) {
        self.shared.bus.add_listener(listener, filter);
    }

    /// Owned copy of the device map.
    pub fn devices(&self) -> Snapshot {
        self.shared.map.snapshot()
    }

    pub fn device(&self, id: DeviceId) -> Option<DeviceRecord> {
        self.shared.map.get(id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.shared.map.contains(id)
    }

    /// Stop the listener and release platform resources. Idempotent.
    ///
    /// Returns after the listener thread has exited, so no notification can be in
    /// flight afterwards. The device map keeps its last contents.
    ///
    /// Waits for an in-progress [`start`](Self::start) to finish first.
    pub fn shutdown(&self) {
        let _transition = self.transition();
        let backend = {
            let mut lifecycle = self.lifecycle();
            lifecycle.started = false;
            lifecycle.shut_down = true;
            lifecycle.backend.take()
        };
        if let Some(mut backend) = backend {
            log::info!("stopping {} backend", backend.name());
            backend.stop();
        }
    }
}

impl Drop for Enumerator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
