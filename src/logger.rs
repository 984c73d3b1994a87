use crate::event::{ChangeKind, DeviceStateChange};
use crate::eventbus::DeviceListener;

/// A simple listener that logs every device-state change through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl LogListener {
    pub fn new() -> Self {
        LogListener
    }
}

impl DeviceListener for LogListener {
    fn on_change(&self, change: DeviceStateChange) {
        match change.kind {
            ChangeKind::Connected => log::info!("[Hotplug] device #{} connected", change.device_id),
            ChangeKind::Disconnected => {
                log::info!("[Hotplug] device #{} disconnected", change.device_id)
            }
        }
    }
}
