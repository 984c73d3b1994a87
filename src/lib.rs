//! StickWatch: live joystick registry with hot-plug notifications.
//!
//! Keeps a thread-safe map of connected joysticks/gamepads and tells registered
//! observers about every connect/disconnect as it happens. One background listener
//! per platform feeds the map: a message-only window on Windows, a udev monitor socket
//! on Linux, or a simulated hub anywhere.
//!
//! Start with [`Enumerator`].

pub mod backends;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod filtered_listener;
pub mod logger;
pub mod manager;
pub mod metadata;
pub mod registry;
pub mod snapshot;

pub use backends::virtual_input::{Notification, VirtualHub};
pub use backends::{BackendState, DeviceSink, NotificationBackend};
pub use config::*;
pub use device::*;
pub use error::{Error, Result};
pub use event::*;
pub use eventbus::*;
pub use filtered_listener::FilteredListener;
pub use logger::LogListener;
pub use manager::*;
pub use metadata::DeviceMeta;
pub use registry::DeviceMap;
pub use snapshot::Snapshot;
