//! Device-state-change events.
//!
//! Every transition of a device to or from the connected state is reported as one
//! [`DeviceStateChange`]. Events are small `Copy` values passed by value to observers;
//! look the device up in the map (or a [`Snapshot`](crate::snapshot::Snapshot)) for
//! names and paths.
//!
//! ## Ordering
//! Changes for a given device are delivered in the order the platform reported them.
//! No coalescing is performed: a quick unplug/replug produces a `Disconnected` for the
//! old ID followed by a `Connected` for a new ID.

use crate::device::DeviceId;
use serde::{Deserialize, Serialize};

/// Direction of a device transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Connected,
    Disconnected,
}

/// One device transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceStateChange {
    pub device_id: DeviceId,
    pub kind: ChangeKind,
}

impl DeviceStateChange {
    pub fn connected(device_id: DeviceId) -> Self {
        Self {
            device_id,
            kind: ChangeKind::Connected,
        }
    }

    pub fn disconnected(device_id: DeviceId) -> Self {
        Self {
            device_id,
            kind: ChangeKind::Disconnected,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.kind == ChangeKind::Connected
    }
}
