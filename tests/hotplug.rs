use crossbeam_channel::{unbounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;
use stickwatch::{
    BackendState, ChangeKind, DeviceInfo, DeviceProbe, DeviceSink, DeviceStateChange, Enumerator,
    Error, EventFilter, LogListener, Notification, NotificationBackend, VirtualHub,
};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(150);

fn record(enumerator: &Enumerator) -> Receiver<DeviceStateChange> {
    let (tx, rx) = unbounded();
    enumerator.register(move |change| {
        let _ = tx.send(change);
    });
    rx
}

fn next(rx: &Receiver<DeviceStateChange>) -> DeviceStateChange {
    rx.recv_timeout(WAIT).expect("expected a device-state change")
}

// -------- facade over the simulated backend

#[test]
fn connect_disconnect_walkthrough() {
    let hub = VirtualHub::new();
    let a = hub.plug("Stick A");
    hub.plug("Stick B");

    let enumerator = Enumerator::simulated(&hub);
    let events = record(&enumerator);
    enumerator.start().expect("virtual backend starts");

    assert_eq!(next(&events), DeviceStateChange::connected(0));
    assert_eq!(next(&events), DeviceStateChange::connected(1));
    assert_eq!(enumerator.number_connected(), 2);

    hub.unplug(&a);
    assert_eq!(next(&events), DeviceStateChange::disconnected(0));
    assert_eq!(enumerator.number_connected(), 1);
    assert_eq!(enumerator.devices().ids(), vec![1]);

    let c = hub.plug("Stick C");
    assert_eq!(next(&events), DeviceStateChange::connected(2));
    assert_eq!(enumerator.number_connected(), 2);
    assert_eq!(enumerator.devices().ids(), vec![1, 2]);
    assert_eq!(enumerator.device(2).map(|r| r.path), Some(c));
    assert!(!enumerator.contains(0));

    enumerator.shutdown();
}

#[test]
fn replugged_device_gets_a_fresh_id() {
    let hub = VirtualHub::new();
    let stick = DeviceInfo::new("virtual:stick", "Throttle");
    hub.plug_device(stick.clone());

    let enumerator = Enumerator::simulated(&hub);
    let events = record(&enumerator);
    enumerator.start().expect("start");
    assert_eq!(next(&events), DeviceStateChange::connected(0));

    for round in 1..=3 {
        hub.unplug(&stick.path);
        assert_eq!(next(&events).kind, ChangeKind::Disconnected);
        hub.plug_device(stick.clone());
        assert_eq!(next(&events), DeviceStateChange::connected(round));
    }
    assert_eq!(enumerator.devices().ids(), vec![3]);
}

#[test]
fn start_is_idempotent() {
    let hub = VirtualHub::new();
    hub.plug("Pad");
    let enumerator = Enumerator::simulated(&hub);
    let events = record(&enumerator);

    enumerator.start().expect("first start");
    enumerator.start().expect("second start is a no-op");
    assert!(enumerator.is_started());

    assert_eq!(next(&events), DeviceStateChange::connected(0));
    assert!(events.recv_timeout(QUIET).is_err());
    assert_eq!(enumerator.number_connected(), 1);
}

#[test]
fn concurrent_starts_initialize_once() {
    let hub = VirtualHub::new();
    hub.plug("Pad 1");
    hub.plug("Pad 2");
    let enumerator = Enumerator::simulated(&hub);
    let events = record(&enumerator);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| enumerator.start().expect("start"));
        }
    });

    assert_eq!(next(&events), DeviceStateChange::connected(0));
    assert_eq!(next(&events), DeviceStateChange::connected(1));
    assert!(events.recv_timeout(QUIET).is_err());
}

#[test]
fn observers_run_in_registration_order() {
    let hub = VirtualHub::new();
    let enumerator = Enumerator::simulated(&hub);
    let log = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
        let log = Arc::clone(&log);
        enumerator.register(move |change| log.lock().unwrap().push((tag, change)));
    }
    let done = record(&enumerator);
    enumerator.start().expect("start");

    let pad = hub.plug("Pad");
    next(&done);
    hub.unplug(&pad);
    next(&done);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("first", DeviceStateChange::connected(0)),
            ("second", DeviceStateChange::connected(0)),
            ("first", DeviceStateChange::disconnected(0)),
            ("second", DeviceStateChange::disconnected(0)),
        ]
    );
}

#[test]
fn filtered_registration_only_sees_matching_changes() {
    let hub = VirtualHub::new();
    let enumerator = Enumerator::simulated(&hub);
    let (tx, removals) = unbounded();
    enumerator.register_filtered(
        move |change: DeviceStateChange| {
            let _ = tx.send(change);
        },
        EventFilter::DisconnectedOnly,
    );
    enumerator.register_filtered(LogListener::new(), EventFilter::All);
    let all = record(&enumerator);
    enumerator.start().expect("start");

    let pad = hub.plug("Pad");
    next(&all);
    hub.unplug(&pad);
    next(&all);

    assert_eq!(next(&removals), DeviceStateChange::disconnected(0));
    assert!(removals.try_recv().is_err());
}

#[test]
fn observer_can_query_enumerator_from_callback() {
    let hub = VirtualHub::new();
    let enumerator = Arc::new(Enumerator::simulated(&hub));
    let weak: Weak<Enumerator> = Arc::downgrade(&enumerator);
    let (tx, counts) = unbounded();
    enumerator.register(move |change| {
        if let Some(e) = weak.upgrade() {
            let _ = tx.send((change, e.number_connected(), e.contains(change.device_id)));
        }
    });
    enumerator.start().expect("start");

    let pad = hub.plug("Pad");
    let (change, count, present) = counts.recv_timeout(WAIT).expect("callback ran");
    assert_eq!(change, DeviceStateChange::connected(0));
    assert_eq!(count, 1);
    assert!(present);

    hub.unplug(&pad);
    let (_, count, present) = counts.recv_timeout(WAIT).expect("callback ran");
    assert_eq!(count, 0);
    assert!(!present);

    enumerator.shutdown();
}

#[test]
fn observer_can_query_enumerator_during_initial_scan() {
    let hub = VirtualHub::new();
    hub.plug("Pad");
    let enumerator = Arc::new(Enumerator::simulated(&hub));
    let weak: Weak<Enumerator> = Arc::downgrade(&enumerator);
    let (tx, seen) = unbounded();
    enumerator.register(move |change| {
        if let Some(e) = weak.upgrade() {
            let _ = tx.send((change, e.is_started(), e.number_connected()));
        }
    });

    let (done_tx, done) = unbounded();
    let starter = {
        let enumerator = Arc::clone(&enumerator);
        thread::spawn(move || {
            let _ = done_tx.send(enumerator.start().is_ok());
        })
    };

    let started = done.recv_timeout(WAIT).expect("start returns while observer reads state");
    starter.join().expect("start thread");
    assert!(started);

    let (change, was_started, count) = seen.recv_timeout(WAIT).expect("initial scan event");
    assert_eq!(change, DeviceStateChange::connected(0));
    assert!(!was_started);
    assert_eq!(count, 1);
    assert!(enumerator.is_started());

    enumerator.shutdown();
}

#[test]
fn spurious_notifications_produce_no_events() {
    let hub = VirtualHub::new();
    hub.plug("Pad");
    let enumerator = Enumerator::simulated(&hub);
    let events = record(&enumerator);
    enumerator.start().expect("start");
    assert_eq!(next(&events), DeviceStateChange::connected(0));

    hub.notify(Notification::Arrival);
    hub.notify(Notification::Removal);
    hub.plug("Stick");
    assert_eq!(next(&events), DeviceStateChange::connected(1));
    assert_eq!(enumerator.number_connected(), 2);
}

// -------- shutdown

#[test]
fn shutdown_from_idle_stops_updates() {
    let hub = VirtualHub::new();
    let enumerator = Enumerator::simulated(&hub);
    let events = record(&enumerator);
    enumerator.start().expect("start");

    enumerator.shutdown();
    enumerator.shutdown();
    assert!(!enumerator.is_started());

    hub.plug("Late Pad");
    assert!(events.recv_timeout(QUIET).is_err());
    assert_eq!(enumerator.number_connected(), 0);
    assert!(matches!(enumerator.start(), Err(Error::ShutDown)));
}

#[test]
fn shutdown_waits_for_in_flight_notification() {
    let hub = VirtualHub::new();
    let enumerator = Arc::new(Enumerator::simulated(&hub));
    let (entered_tx, entered) = unbounded();
    let (release_tx, release) = unbounded::<()>();
    enumerator.register(move |_| {
        let _ = entered_tx.send(());
        let _ = release.recv_timeout(WAIT);
    });
    enumerator.start().expect("start");

    hub.plug("Pad");
    entered.recv_timeout(WAIT).expect("observer entered");

    let finished = Arc::new(AtomicBool::new(false));
    let stopper = {
        let enumerator = Arc::clone(&enumerator);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            enumerator.shutdown();
            finished.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(QUIET);
    assert!(!finished.load(Ordering::SeqCst), "shutdown must wait for the listener");

    release_tx.send(()).expect("observer waiting");
    stopper.join().expect("shutdown thread");
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(enumerator.number_connected(), 1);
}

#[test]
fn dropping_the_enumerator_joins_the_listener() {
    let hub = VirtualHub::new();
    {
        let enumerator = Enumerator::simulated(&hub);
        enumerator.start().expect("start");
    }
    // Listener is gone: nothing consumes notifications anymore.
    hub.plug("Pad");
    thread::sleep(QUIET);
    assert_eq!(hub.pending(), 1);
}

// -------- injected backends

/// Backend that hands its sink to the test instead of running a thread.
struct ScriptedBackend {
    sink: Arc<Mutex<Option<Arc<dyn DeviceSink>>>>,
    state: BackendState,
}

impl NotificationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn start(&mut self, sink: Arc<dyn DeviceSink>) -> stickwatch::Result<()> {
        *self.sink.lock().unwrap() = Some(sink);
        self.state = BackendState::Listening;
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.lock().unwrap().take();
        self.state = BackendState::Stopped;
    }
}

struct FixedProbe(Vec<DeviceInfo>);

impl DeviceProbe for FixedProbe {
    fn scan(&self) -> stickwatch::Result<Vec<DeviceInfo>> {
        Ok(self.0.clone())
    }
}

#[test]
fn per_device_notifications_update_the_map() {
    let slot = Arc::new(Mutex::new(None));
    let enumerator = Enumerator::with_backend(
        Box::new(FixedProbe(vec![DeviceInfo::new("/dev/input/js0", "Stick")])),
        Box::new(ScriptedBackend {
            sink: Arc::clone(&slot),
            state: BackendState::Uninitialized,
        }),
    );
    let events = record(&enumerator);
    enumerator.start().expect("start");
    assert_eq!(next(&events), DeviceStateChange::connected(0));

    let sink = slot.lock().unwrap().clone().expect("backend started");
    sink.device_added(DeviceInfo::new("/dev/input/js1", "Pad"));
    sink.device_added(DeviceInfo::new("/dev/input/js1", "Pad"));
    sink.device_removed("/dev/input/js0");
    sink.device_removed("/dev/input/js0");
    sink.device_removed("/dev/input/js9");

    assert_eq!(next(&events), DeviceStateChange::connected(1));
    assert_eq!(next(&events), DeviceStateChange::disconnected(0));
    assert!(events.try_recv().is_err());
    let snap = enumerator.devices();
    assert_eq!(snap.ids(), vec![1]);
    assert_eq!(snap.find_path("/dev/input/js1").map(|r| r.name.as_str()), Some("Pad"));

    enumerator.shutdown();
    assert!(slot.lock().unwrap().is_none());
}

struct BrokenBackend;

impl NotificationBackend for BrokenBackend {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn state(&self) -> BackendState {
        BackendState::Stopped
    }

    fn start(&mut self, _sink: Arc<dyn DeviceSink>) -> stickwatch::Result<()> {
        Err(Error::BackendInit("notification subsystem unavailable".into()))
    }

    fn stop(&mut self) {}
}

#[test]
fn backend_failure_keeps_initial_scan() {
    let enumerator = Enumerator::with_backend(
        Box::new(FixedProbe(vec![
            DeviceInfo::new("a", "A"),
            DeviceInfo::new("b", "B"),
        ])),
        Box::new(BrokenBackend),
    );

    assert!(matches!(enumerator.start(), Err(Error::BackendInit(_))));
    assert!(!enumerator.is_started());
    assert_eq!(enumerator.number_connected(), 2);

    // Retrying rescans (no new IDs) and fails again.
    assert!(enumerator.start().is_err());
    assert_eq!(enumerator.devices().ids(), vec![0, 1]);
}
