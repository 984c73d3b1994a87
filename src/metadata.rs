//! Descriptive metadata carried by each device record.
//!
//! Informational only: a device's identity is its native path. Probes fill in what
//! their platform exposes.
//!
//! Metadata is refreshed in place when a re-enumeration reports the same native
//! path again; it never changes a record's [`DeviceId`](crate::device::DeviceId).

use serde::{Deserialize, Serialize};

/// Bus and HID identification for one device. Unknown fields stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// `ID_BUS` on Linux, `"usb"` for hidapi, `"virtual"` for the simulated hub.
    pub bus: Option<String>,

    /// Vendor id.
    pub vid: Option<u16>,

    /// Product id.
    pub pid: Option<u16>,

    /// Serial string, when the firmware reports a non-empty one.
    pub serial_number: Option<String>,

    /// Top-level collection usage page (Windows only).
    pub usage_page: Option<u16>,

    /// Top-level collection usage (Windows only).
    pub usage: Option<u16>,
}

impl DeviceMeta {
    /// Parse a hex id as reported by udev (`"045e"`) or hidapi-style strings.
    pub(crate) fn parse_hex_id(raw: &str) -> Option<u16> {
        let trimmed = raw.trim().trim_start_matches("0x");
        u16::from_str_radix(trimmed, 16).ok()
    }
}
