//! Windows device discovery (HID).
//!
//! Enumerates HID top-level collections via `hidapi` and keeps the ones that look like
//! game controls (see [`HidConfig::accepts`]): joysticks, gamepads, multi-axis
//! controllers, simulation controls. Plain mice/keyboards and XInput HID-compat
//! (`IG_`) endpoints are dropped.
//!
//! Each accepted collection becomes one [`DeviceInfo`] keyed by its interface path
//! (`\\?\HID#VID_...`). Composite devices expose one path per collection and are
//! therefore tracked per collection.

#![cfg(target_os = "windows")]

use crate::config::HidConfig;
use crate::device::{DeviceInfo, DeviceProbe};
use crate::error::{Error, Result};
use crate::metadata::DeviceMeta;
use hidapi::HidApi;
use std::sync::{Mutex, PoisonError};

/// [`DeviceProbe`] backed by `hidapi`.
///
/// The `HidApi` context is created on first scan and refreshed on every later scan.
pub struct HidProbe {
    config: HidConfig,
    api: Mutex<Option<HidApi>>,
}

impl HidProbe {
    pub fn new(config: HidConfig) -> Self {
        Self {
            config,
            api: Mutex::new(None),
        }
    }
}

/// Build a lightweight [`DeviceMeta`] snapshot for a `hidapi` device entry.
fn meta(info: &hidapi::DeviceInfo) -> DeviceMeta {
    DeviceMeta {
        bus: Some("usb".into()),
        vid: Some(info.vendor_id()),
        pid: Some(info.product_id()),
        serial_number: info
            .serial_number()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
        usage_page: Some(info.usage_page()),
        usage: Some(info.usage()),
    }
}

impl DeviceProbe for HidProbe {
    fn scan(&self) -> Result<Vec<DeviceInfo>> {
        let mut guard = self.api.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(api) => api
                .refresh_devices()
                .map_err(|e| Error::Enumeration(format!("hidapi refresh: {e}")))?,
            None => {
                let api =
                    HidApi::new().map_err(|e| Error::Enumeration(format!("hidapi init: {e}")))?;
                *guard = Some(api);
            }
        }
        let Some(api) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for info in api.device_list() {
            let path = info.path().to_string_lossy().to_string();
            if !self.config.accepts(info.usage_page(), info.usage(), &path) {
                continue;
            }
            let name = match info.product_string() {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => format!(
                    "HID {:04x}:{:04x}",
                    info.vendor_id(),
                    info.product_id()
                ),
            };
            found.push(DeviceInfo::new(path, name).with_meta(meta(info)));
        }
        log::debug!("hid: scan found {} game control(s)", found.len());
        Ok(found)
    }
}
