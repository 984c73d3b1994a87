#![cfg(target_os = "windows")]

//! Windows hot-plug backend.
//!
//! - **HID** discovery via `hidapi` ([`HidProbe`]) for the initial scan and every rescan
//! - **Message window** ([`MessagePumpBackend`]): a hidden message-only window receiving
//!   `WM_DEVICECHANGE` for the HID device-interface class, pumped on a dedicated thread
//!
//! Most users should not interact with these modules directly;
//! [`Enumerator::new`](crate::manager::Enumerator::new) picks them on Windows.

pub mod hid_discovery;
pub mod message_window;

pub use hid_discovery::HidProbe;
pub use message_window::MessagePumpBackend;
