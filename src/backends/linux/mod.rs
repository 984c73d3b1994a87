#![cfg(target_os = "linux")]

//! Linux hot-plug backend.
//!
//! - **udev discovery** ([`UdevProbe`]) enumerates joystick nodes for the initial scan
//!   and for catch-up rescans.
//! - **udev monitor** ([`SocketMonitorBackend`]) listens for kernel uevents on a netlink
//!   monitor socket and reports add/remove per device node.
//! - **self-pipe** cancellation lets the owner interrupt the blocked `poll(2)` at any time.
//!
//! Most users should not use these directly; [`Enumerator::new`](crate::manager::Enumerator::new)
//! picks them on Linux.

mod pipe;
pub mod udev_discovery;
pub mod udev_monitor;

pub use udev_discovery::UdevProbe;
pub use udev_monitor::SocketMonitorBackend;
