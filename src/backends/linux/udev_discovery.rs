//! Linux device discovery via udev.
//!
//! Enumerates the configured subsystem (default `input`) and keeps device nodes that
//! match the configured prefix (default `/dev/input/js`) and, unless disabled, carry
//! the `ID_INPUT_JOYSTICK` property. The same description logic is applied to monitor
//! `add` events, so a device looks identical whether it was found by the initial scan
//! or by hot-plug.
//!
//! ## Naming
//! The joystick node itself has no name; the parent `inputN` device carries the kernel
//! name in its `NAME` property (quoted). Fallbacks are `ID_MODEL` and the sysname.

use crate::config::UdevConfig;
use crate::device::{DeviceInfo, DeviceProbe};
use crate::error::{Error, Result};
use crate::metadata::DeviceMeta;

/// [`DeviceProbe`] backed by `udev_enumerate`.
pub struct UdevProbe {
    config: UdevConfig,
}

impl UdevProbe {
    pub fn new(config: UdevConfig) -> Self {
        Self { config }
    }
}

fn enumeration_error(err: std::io::Error) -> Error {
    Error::Enumeration(format!("udev: {err}"))
}

fn property_value(device: &udev::Device, name: &str) -> Option<String> {
    device
        .property_value(name)
        .map(|s| s.to_string_lossy().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
}

/// Whether `devnode` belongs to the tracked class by path alone.
pub(crate) fn node_matches(devnode: &str, config: &UdevConfig) -> bool {
    devnode.starts_with(&config.node_prefix)
}

/// Turn a udev device into a [`DeviceInfo`], or `None` if it isn't a tracked joystick.
pub(crate) fn describe(device: &udev::Device, config: &UdevConfig) -> Option<DeviceInfo> {
    let devnode = device.devnode()?.to_string_lossy().to_string();
    if !node_matches(&devnode, config) {
        return None;
    }
    if config.require_joystick_tag && device.property_value("ID_INPUT_JOYSTICK").is_none() {
        log::debug!("udev: {devnode} is not tagged ID_INPUT_JOYSTICK, skipping");
        return None;
    }

    let name = device
        .parent()
        .and_then(|p| property_value(&p, "NAME"))
        .or_else(|| property_value(device, "ID_MODEL"))
        .unwrap_or_else(|| device.sysname().to_string_lossy().to_string());

    let meta = DeviceMeta {
        bus: property_value(device, "ID_BUS"),
        vid: property_value(device, "ID_VENDOR_ID").and_then(|v| DeviceMeta::parse_hex_id(&v)),
        pid: property_value(device, "ID_MODEL_ID").and_then(|v| DeviceMeta::parse_hex_id(&v)),
        serial_number: property_value(device, "ID_SERIAL_SHORT"),
        usage_page: None,
        usage: None,
    };

    Some(DeviceInfo::new(devnode, name).with_meta(meta))
}

impl DeviceProbe for UdevProbe {
    fn scan(&self) -> Result<Vec<DeviceInfo>> {
        let mut enumerator = udev::Enumerator::new().map_err(enumeration_error)?;
        enumerator
            .match_subsystem(&self.config.subsystem)
            .map_err(enumeration_error)?;
        if self.config.require_joystick_tag {
            enumerator
                .match_property("ID_INPUT_JOYSTICK", "1")
                .map_err(enumeration_error)?;
        }

        let mut found = Vec::new();
        for device in enumerator.scan_devices().map_err(enumeration_error)? {
            match describe(&device, &self.config) {
                Some(info) => found.push(info),
                None => {
                    log::trace!("udev: skipped {}", device.syspath().display());
                }
            }
        }
        log::debug!("udev: scan found {} joystick(s)", found.len());
        Ok(found)
    }
}
