use crate::event::{ChangeKind, DeviceStateChange};
use std::sync::{Arc, Mutex, PoisonError};

/// Observer of device-state changes.
///
/// Invoked synchronously on the thread that detected the change (usually the backend
/// listener thread). Implementations must return promptly: a slow observer delays
/// every later notification.
///
/// Any `Fn(DeviceStateChange) + Send + Sync` closure is a listener.
pub trait DeviceListener: Send + Sync {
    fn on_change(&self, change: DeviceStateChange);
}

impl<F> DeviceListener for F
where
    F: Fn(DeviceStateChange) + Send + Sync,
{
    fn on_change(&self, change: DeviceStateChange) {
        self(change)
    }
}

/// Determines which changes a listener wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    ConnectedOnly,
    DisconnectedOnly,
    Custom(fn(&DeviceStateChange) -> bool),
}

impl EventFilter {
    pub fn accepts(&self, change: &DeviceStateChange) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::ConnectedOnly => change.kind == ChangeKind::Connected,
            EventFilter::DisconnectedOnly => change.kind == ChangeKind::Disconnected,
            EventFilter::Custom(f) => f(change),
        }
    }
}

#[derive(Clone)]
struct ListenerEntry {
    listener: Arc<dyn DeviceListener>,
    filter: EventFilter,
}

/// Ordered, append-only list of observers.
///
/// There is no unregistration: a listener stays registered for the lifetime of the bus.
/// Dispatch works on a copy of the list, so a listener may register further listeners
/// from inside its callback; those only see later changes.
#[derive(Default)]
pub struct ListenerBus {
    listeners: Mutex<Vec<ListenerEntry>>,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener with a filter.
    pub fn add_listener(&self, listener: impl DeviceListener + 'static, filter: EventFilter) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.push(ListenerEntry {
            listener: Arc::new(listener),
            filter,
        });
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Vec<ListenerEntry> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivers a batch of changes in order, each to every matching listener in
    /// registration order.
    pub fn emit_all(&self, changes: &[DeviceStateChange]) {
        if changes.is_empty() {
            return;
        }
        let entries = self.entries();
        for change in changes {
            for entry in &entries {
                if entry.filter.accepts(change) {
                    entry.listener.on_change(*change);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<(&'static str, DeviceStateChange)>>>) -> impl DeviceListener {
        let log = Arc::clone(log);
        move |change: DeviceStateChange| log.lock().unwrap().push((tag, change))
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = ListenerBus::new();
        bus.add_listener(recorder("first", &log), EventFilter::All);
        bus.add_listener(recorder("second", &log), EventFilter::All);

        bus.emit_all(&[DeviceStateChange::connected(0), DeviceStateChange::disconnected(0)]);

        let got = log.lock().unwrap().clone();
        assert_eq!(
            got,
            vec![
                ("first", DeviceStateChange::connected(0)),
                ("second", DeviceStateChange::connected(0)),
                ("first", DeviceStateChange::disconnected(0)),
                ("second", DeviceStateChange::disconnected(0)),
            ]
        );
    }

    #[test]
    fn filters_are_applied_per_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = ListenerBus::new();
        bus.add_listener(recorder("up", &log), EventFilter::ConnectedOnly);
        bus.add_listener(recorder("down", &log), EventFilter::DisconnectedOnly);
        bus.add_listener(recorder("odd", &log), EventFilter::Custom(|c| c.device_id % 2 == 1));

        bus.emit_all(&[DeviceStateChange::connected(1), DeviceStateChange::disconnected(2)]);

        let got = log.lock().unwrap().clone();
        assert_eq!(
            got,
            vec![
                ("up", DeviceStateChange::connected(1)),
                ("odd", DeviceStateChange::connected(1)),
                ("down", DeviceStateChange::disconnected(2)),
            ]
        );
    }

    #[test]
    fn registering_from_a_callback_does_not_deadlock() {
        let bus = Arc::new(ListenerBus::new());
        let inner = Arc::clone(&bus);
        bus.add_listener(
            move |_: DeviceStateChange| {
                inner.add_listener(|_: DeviceStateChange| {}, EventFilter::All);
            },
            EventFilter::All,
        );
        bus.emit_all(&[DeviceStateChange::connected(0)]);
        assert_eq!(bus.len(), 2);
    }
}
