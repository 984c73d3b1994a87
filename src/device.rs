//! Device identity.
//!
//! A physical joystick is known to the crate in two shapes:
//! - [`DeviceInfo`] is what a native provider reports: an OS path/handle plus a
//!   friendly name. It carries no crate-assigned identity.
//! - [`DeviceRecord`] is an entry of the device map: a [`DeviceInfo`] that has
//!   been given a [`DeviceId`].
//!
//! ## Identity rules
//! - IDs are assigned on first detection, strictly increasing, and never reused for the
//!   lifetime of the process. Unplugging and re-plugging a stick yields a new ID.
//! - The native `path` is the deduplication key: two reports with the same path are the
//!   same device. Paths are platform-specific (`/dev/input/js0`, `\\?\HID#VID_...`)
//!   and should be treated as opaque.

use crate::error::Result;
use crate::metadata::DeviceMeta;
use serde::{Deserialize, Serialize};

/// Stable numeric identifier assigned to a device at first enumeration.
pub type DeviceId = u32;

/// A currently-present device as reported by a [`DeviceProbe`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Platform-native path or handle string. Deduplication key.
    pub path: String,
    /// Human-readable product name.
    pub name: String,
    /// Best-effort extra metadata.
    #[serde(default)]
    pub meta: DeviceMeta,
}

impl DeviceInfo {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            meta: DeviceMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: DeviceMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// One entry of the device map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub path: String,
    pub name: String,
    pub meta: DeviceMeta,
}

impl DeviceRecord {
    pub fn new(id: DeviceId, info: DeviceInfo) -> Self {
        Self {
            id,
            path: info.path,
            name: info.name,
            meta: info.meta,
        }
    }

    /// Refresh the fields a re-enumeration is allowed to update.
    pub(crate) fn refresh(&mut self, info: DeviceInfo) -> bool {
        let changed = self.name != info.name || self.meta != info.meta;
        self.name = info.name;
        self.meta = info.meta;
        changed
    }
}

impl std::fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {} ({})", self.id, self.name, self.path)
    }
}

/// Native device enumeration provider.
///
/// Treated as a black box: returns every currently present device of the tracked
/// class. Devices that cannot be described are skipped by the implementation;
/// an `Err` means the provider itself is unavailable.
pub trait DeviceProbe: Send + Sync {
    fn scan(&self) -> Result<Vec<DeviceInfo>>;
}
