//! Enumerator configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all) yields the
//! stock behavior: track `/dev/input/js*` joysticks on Linux and joystick / gamepad /
//! multi-axis HID collections on Windows.
//!
//! ```toml
//! thread_name = "my-app-hotplug"
//!
//! [udev]
//! node_prefix = "/dev/input/event"
//!
//! [hid]
//! generic_desktop_usages = [0x04, 0x05]
//! ```
//!
//! Both platform sections are always accepted; only the one matching the build target
//! is consulted.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumeratorConfig {
    /// Name given to the backend listener thread.
    pub thread_name: String,
    pub udev: UdevConfig,
    pub hid: HidConfig,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            thread_name: "stickwatch-hotplug".to_string(),
            udev: UdevConfig::default(),
            hid: HidConfig::default(),
        }
    }
}

impl EnumeratorConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Linux socket-monitor settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdevConfig {
    /// Kernel subsystem the monitor socket and enumerator are bound to.
    pub subsystem: String,
    /// Only device nodes starting with this prefix are tracked.
    pub node_prefix: String,
    /// Require the `ID_INPUT_JOYSTICK` udev tag.
    pub require_joystick_tag: bool,
}

impl Default for UdevConfig {
    fn default() -> Self {
        Self {
            subsystem: "input".to_string(),
            node_prefix: "/dev/input/js".to_string(),
            require_joystick_tag: true,
        }
    }
}

/// Windows HID filter settings.
///
/// A HID collection is tracked when its usage page is listed in `usage_pages`, or it
/// lives on Generic Desktop (`0x01`) with a usage listed in `generic_desktop_usages`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HidConfig {
    pub usage_pages: Vec<u16>,
    pub generic_desktop_usages: Vec<u16>,
    /// Skip XInput HID-compat (`IG_`) endpoints.
    pub skip_xinput_compat: bool,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            // Simulation Controls, Physical Interface
            usage_pages: vec![0x02, 0x0F],
            // Joystick, Gamepad, Multi-axis Controller
            generic_desktop_usages: vec![0x04, 0x05, 0x08],
            skip_xinput_compat: true,
        }
    }
}

impl HidConfig {
    /// Decide whether a HID collection belongs to the tracked device class.
    pub fn accepts(&self, usage_page: u16, usage: u16, path: &str) -> bool {
        if usage_page == 0x01 {
            if !self.generic_desktop_usages.contains(&usage) {
                return false;
            }
            // Gamepad collections tagged IG_ are the XInput shadow of a pad.
            return !(self.skip_xinput_compat && usage == 0x05 && path.contains("IG_"));
        }
        self.usage_pages.contains(&usage_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = EnumeratorConfig::from_toml_str("").expect("empty is valid");
        assert_eq!(cfg, EnumeratorConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = EnumeratorConfig::from_toml_str(
            r#"
            thread_name = "pads"

            [udev]
            node_prefix = "/dev/input/event"
            "#,
        )
        .expect("valid config");
        assert_eq!(cfg.thread_name, "pads");
        assert_eq!(cfg.udev.node_prefix, "/dev/input/event");
        assert_eq!(cfg.udev.subsystem, "input");
        assert_eq!(cfg.hid, HidConfig::default());
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = EnumeratorConfig::from_toml_str("thread_name = ").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[hid]\ngeneric_desktop_usages = [4]").expect("write");
        let cfg = EnumeratorConfig::load(file.path()).expect("load");
        assert_eq!(cfg.hid.generic_desktop_usages, vec![4]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EnumeratorConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }

    #[test]
    fn hid_filter_matches_game_controls_only() {
        let hid = HidConfig::default();
        assert!(hid.accepts(0x01, 0x04, r"\\?\hid#vid_044f&pid_b10a"));
        assert!(hid.accepts(0x02, 0xBA, r"\\?\hid#rudder"));
        // mouse, keyboard
        assert!(!hid.accepts(0x01, 0x02, r"\\?\hid#mouse"));
        assert!(!hid.accepts(0x01, 0x06, r"\\?\hid#kbd"));
        assert!(!hid.accepts(0x01, 0x05, r"\\?\hid#vid_045e&pid_028e&IG_00"));
        assert!(!hid.accepts(0x0C, 0x01, r"\\?\hid#consumer"));
    }
}
