//! Point-in-time view of the device map.
//!
//! [`Snapshot`] is an **owned**, read-only copy of the map taken under its lock.
//! It’s produced by [`Enumerator::devices`](crate::manager::Enumerator::devices) and
//! is cheap to clone for fan-out to multiple consumers.
//!
//! # Semantics
//! - Keys are [`DeviceId`]s, iterated in ascending (= detection) order.
//! - A snapshot is **immutable** and does not follow later hot-plug events.
//!
//! # Examples
//! ```no_run
//! use stickwatch::Snapshot;
//!
//! fn print_devices(snap: &Snapshot) {
//!     for (id, record) in snap.iter() {
//!         println!("{id}: {} at {}", record.name, record.path);
//!     }
//! }
//! ```

use crate::device::{DeviceId, DeviceRecord};
use std::collections::BTreeMap;

/// Owned snapshot of known devices (`DeviceId → DeviceRecord`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot(pub BTreeMap<DeviceId, DeviceRecord>);

impl Snapshot {
    #[inline]
    pub fn get(&self, id: DeviceId) -> Option<&DeviceRecord> {
        self.0.get(&id)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &DeviceRecord)> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// IDs in ascending order.
    pub fn ids(&self) -> Vec<DeviceId> {
        self.0.keys().copied().collect()
    }

    /// Look a device up by its native path.
    pub fn find_path(&self, path: &str) -> Option<&DeviceRecord> {
        self.0.values().find(|r| r.path == path)
    }

    /// Serialize the records (as a JSON array, ID order) for diagnostics.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let records: Vec<&DeviceRecord> = self.0.values().collect();
        serde_json::to_string_pretty(&records)
    }

    /// Consume the snapshot and return the inner map.
    #[inline]
    pub fn into_inner(self) -> BTreeMap<DeviceId, DeviceRecord> {
        self.0
    }
}
