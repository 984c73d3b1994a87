use crate::event::DeviceStateChange;
use crate::eventbus::DeviceListener;

/// Wraps a listener and forwards only changes matching a user-supplied predicate.
///
/// Unlike [`EventFilter::Custom`](crate::eventbus::EventFilter::Custom) the predicate
/// may capture state, e.g. the set of device IDs a UI panel is showing.
pub struct FilteredListener {
    predicate: Box<dyn Fn(&DeviceStateChange) -> bool + Send + Sync>,
    inner: Box<dyn DeviceListener>,
}

impl FilteredListener {
    pub fn new(
        predicate: impl Fn(&DeviceStateChange) -> bool + Send + Sync + 'static,
        inner: impl DeviceListener + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner: Box::new(inner),
        }
    }
}

impl DeviceListener for FilteredListener {
    fn on_change(&self, change: DeviceStateChange) {
        if (self.predicate)(&change) {
            self.inner.on_change(change);
        }
    }
}
