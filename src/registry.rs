//! The device map: single source of truth for "what is connected now".
//!
//! [`DeviceMap`] is shared between API-calling threads and the backend listener
//! thread. Every read and write goes through one mutex, held only for the map update
//! itself. Mutating operations return the [`DeviceStateChange`]s they caused so the
//! caller can dispatch them *after* the lock is released; observers therefore never
//! run while the map is locked and may call back into the enumerator freely.
//!
//! ID allocation lives under the same lock, so "insert a new device" and "take the
//! next ID" are one atomic step. IDs are never reused: once `DeviceId::MAX` has been
//! handed out the map is exhausted and newly detected devices are logged and ignored.

use crate::device::{DeviceId, DeviceInfo, DeviceRecord};
use crate::event::DeviceStateChange;
use crate::snapshot::Snapshot;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct MapInner {
    records: BTreeMap<DeviceId, DeviceRecord>,
    // `None` once every ID has been handed out.
    next_id: Option<DeviceId>,
}

impl Default for MapInner {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: Some(0),
        }
    }
}

impl MapInner {
    fn id_for_path(&self, path: &str) -> Option<DeviceId> {
        self.records
            .values()
            .find(|r| r.path == path)
            .map(|r| r.id)
    }

    fn allocate(&mut self) -> Option<DeviceId> {
        let Some(id) = self.next_id else {
            log::warn!("device map: device ids exhausted, ignoring new device");
            return None;
        };
        self.next_id = id.checked_add(1);
        Some(id)
    }
}

/// Lock-guarded mapping from [`DeviceId`] to [`DeviceRecord`].
#[derive(Default)]
pub struct DeviceMap {
    inner: Mutex<MapInner>,
}

impl DeviceMap {
    pub fn new() -> Self {
        Self::default()
    }

    // Every statement leaves the map consistent, so a panic in another holder
    // doesn't invalidate it.
    fn lock(&self) -> MutexGuard<'_, MapInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record under an explicit ID.
    ///
    /// The ID counter is moved past `id`, so later allocations never collide with it;
    /// inserting `DeviceId::MAX` exhausts the counter. Returns the previous record stored
    /// under `id`, if any.
    pub fn insert(&self, id: DeviceId, mut record: DeviceRecord) -> Option<DeviceRecord> {
        record.id = id;
        let mut inner = self.lock();
        if matches!(inner.next_id, Some(next) if id >= next) {
            inner.next_id = id.checked_add(1);
        }
        inner.records.insert(id, record)
    }

    pub fn remove(&self, id: DeviceId) -> Option<DeviceRecord> {
        self.lock().records.remove(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.lock().records.contains_key(&id)
    }

    pub fn get(&self, id: DeviceId) -> Option<DeviceRecord> {
        self.lock().records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Owned copy of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.lock().records.clone())
    }

    /// The ID the next newly detected device will receive, or `None` once exhausted.
    pub fn next_id(&self) -> Option<DeviceId> {
        self.lock().next_id
    }

    /// Track a device reported by an add notification.
    ///
    /// A path that is already tracked only has its name/metadata refreshed and
    /// produces no event.
    pub fn attach(&self, info: DeviceInfo) -> Option<DeviceStateChange> {
        let mut inner = self.lock();
        if let Some(id) = inner.id_for_path(&info.path) {
            if let Some(record) = inner.records.get_mut(&id) {
                record.refresh(info);
            }
            return None;
        }
        let id = inner.allocate()?;
        log::debug!("device map: attach #{id} {} ({})", info.name, info.path);
        inner.records.insert(id, DeviceRecord::new(id, info));
        Some(DeviceStateChange::connected(id))
    }

    /// Forget the device with the given native path, if tracked.
    pub fn detach_path(&self, path: &str) -> Option<DeviceStateChange> {
        let mut inner = self.lock();
        let id = inner.id_for_path(path)?;
        inner.records.remove(&id);
        log::debug!("device map: detach #{id} ({path})");
        Some(DeviceStateChange::disconnected(id))
    }

    /// Bring the map in line with a full enumeration result.
    ///
    /// Tracked devices whose path is missing from `present` are removed (in ID order),
    /// then unknown paths are added (in `present` order) with fresh IDs. Devices present
    /// on both sides keep their ID and get their name/metadata refreshed. Duplicate
    /// paths within `present` are collapsed onto the first occurrence.
    pub fn reconcile(&self, present: Vec<DeviceInfo>) -> Vec<DeviceStateChange> {
        let mut changes = Vec::new();
        let mut inner = self.lock();

        let present_paths: HashSet<&str> = present.iter().map(|d| d.path.as_str()).collect();
        let gone: Vec<DeviceId> = inner
            .records
            .values()
            .filter(|r| !present_paths.contains(r.path.as_str()))
            .map(|r| r.id)
            .collect();
        for id in gone {
            if let Some(record) = inner.records.remove(&id) {
                log::debug!("device map: reconcile removed {record}");
                changes.push(DeviceStateChange::disconnected(id));
            }
        }

        let mut seen = HashSet::new();
        for info in present {
            if !seen.insert(info.path.clone()) {
                continue;
            }
            match inner.id_for_path(&info.path) {
                Some(id) => {
                    if let Some(record) = inner.records.get_mut(&id) {
                        record.refresh(info);
                    }
                }
                None => {
                    let Some(id) = inner.allocate() else {
                        continue;
                    };
                    let record = DeviceRecord::new(id, info);
                    log::debug!("device map: reconcile added {record}");
                    inner.records.insert(id, record);
                    changes.push(DeviceStateChange::connected(id));
                }
            }
        }

        changes
    }
}
