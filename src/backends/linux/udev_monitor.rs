//! Socket-monitor backend (udev netlink monitor + self-pipe).
//!
//! The listener thread owns the udev monitor socket. It blocks in `poll(2)` over the
//! socket and the read end of a cancellation pipe, and handles one uevent per wake-up:
//! - `add` of a tracked joystick node → [`DeviceSink::device_added`]
//! - `remove` of a node under the tracked prefix → [`DeviceSink::device_removed`]
//!
//! ## Shutdown
//! [`SocketMonitorBackend::stop`] writes one byte to the pipe and joins the thread.
//! The thread drops the monitor socket (releasing the monitor, then the udev context)
//! and the pipe's read end on its way out; the write end is closed last, after the join.

use super::pipe::{cancel_pipe, wait, CancelReceiver, CancelSender, Wake};
use super::udev_discovery::{describe, node_matches};
use crate::backends::listener::ListenerThread;
use crate::backends::{BackendState, DeviceSink, NotificationBackend};
use crate::config::UdevConfig;
use crate::error::{Error, Result};
use std::os::fd::AsRawFd;
use std::sync::Arc;

/// What a single uevent means for the device map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UeventAction {
    Add,
    Remove,
    Ignore,
}

/// Sort a uevent by action, node and joystick tag.
///
/// Removals are matched on the node path alone: udev strips most properties, the
/// joystick tag included, from `remove` events.
pub(crate) fn classify(
    event_type: udev::EventType,
    devnode: &str,
    tagged: bool,
    config: &UdevConfig,
) -> UeventAction {
    if !node_matches(devnode, config) {
        return UeventAction::Ignore;
    }
    match event_type {
        udev::EventType::Add if tagged || !config.require_joystick_tag => UeventAction::Add,
        udev::EventType::Remove => UeventAction::Remove,
        _ => UeventAction::Ignore,
    }
}

pub struct SocketMonitorBackend {
    config: UdevConfig,
    thread_name: String,
    state: BackendState,
    thread: Option<ListenerThread>,
    cancel: Option<CancelSender>,
}

impl SocketMonitorBackend {
    pub fn new(config: UdevConfig, thread_name: impl Into<String>) -> Self {
        Self {
            config,
            thread_name: thread_name.into(),
            state: BackendState::Uninitialized,
            thread: None,
            cancel: None,
        }
    }

    fn open_monitor(subsystem: &str) -> std::io::Result<udev::MonitorSocket> {
        let socket = udev::MonitorBuilder::new()?
            .match_subsystem(subsystem)?
            .listen()?;

        // libudev normally opens the socket non-blocking already; make sure, since a
        // blocking receive would hide the cancellation pipe.
        let fd = socket.as_raw_fd();
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            log::warn!(
                "udev monitor: F_GETFL failed: {}",
                std::io::Error::last_os_error()
            );
        } else if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            log::warn!(
                "udev monitor: could not set O_NONBLOCK: {}",
                std::io::Error::last_os_error()
            );
        }
        Ok(socket)
    }

    fn run(
        socket: udev::MonitorSocket,
        cancel: CancelReceiver,
        config: &UdevConfig,
        sink: &dyn DeviceSink,
    ) {
        loop {
            match wait(socket.as_raw_fd(), &cancel) {
                Ok(Wake::Cancel) => break,
                Ok(Wake::Data) => {
                    if let Some(event) = socket.iter().next() {
                        Self::handle_event(&event, config, sink);
                    }
                }
                Err(err) => {
                    log::error!("udev monitor wait failed, hot-plug updates stop: {err}");
                    break;
                }
            }
        }
    }

    fn handle_event(event: &udev::Event, config: &UdevConfig, sink: &dyn DeviceSink) {
        let device = event.device();
        let Some(devnode) = device.devnode().map(|p| p.to_string_lossy().to_string()) else {
            return;
        };
        let tagged = device.property_value("ID_INPUT_JOYSTICK").is_some();

        match classify(event.event_type(), &devnode, tagged, config) {
            UeventAction::Add => {
                log::debug!("udev: add {devnode}");
                if let Some(info) = describe(&device, config) {
                    sink.device_added(info);
                }
            }
            UeventAction::Remove => {
                log::debug!("udev: remove {devnode}");
                sink.device_removed(&devnode);
            }
            UeventAction::Ignore => {
                log::trace!("udev: ignoring {:?} for {devnode}", event.event_type())
            }
        }
    }
}

impl NotificationBackend for SocketMonitorBackend {
    fn name(&self) -> &'static str {
        "udev"
    }

    fn state(&self) -> BackendState {
        match (&self.state, &self.thread) {
            (BackendState::Listening, Some(t)) if !t.is_running() => BackendState::Stopped,
            (state, _) => *state,
        }
    }

    fn start(&mut self, sink: Arc<dyn DeviceSink>) -> Result<()> {
        if self.state != BackendState::Uninitialized {
            return Err(Error::BackendInit(format!(
                "udev backend cannot start from {:?}",
                self.state
            )));
        }

        let (cancel_tx, cancel_rx) = match cancel_pipe() {
            Ok(pair) => pair,
            Err(err) => {
                self.state = BackendState::Stopped;
                return Err(Error::BackendInit(format!("cancellation pipe: {err}")));
            }
        };

        let config = self.config.clone();
        let spawned = ListenerThread::spawn(&self.thread_name, move |ready| {
            let socket = match Self::open_monitor(&config.subsystem) {
                Ok(socket) => socket,
                Err(err) => {
                    ready.failed(Error::BackendInit(format!("udev monitor: {err}")));
                    return;
                }
            };
            ready.listening(());
            // Catch devices that appeared between the initial scan and the socket bind.
            sink.rescan();
            Self::run(socket, cancel_rx, &config, sink.as_ref());
        });

        match spawned {
            Ok((thread, ())) => {
                self.thread = Some(thread);
                self.cancel = Some(cancel_tx);
                self.state = BackendState::Listening;
                log::info!("udev backend listening on subsystem {}", self.config.subsystem);
                Ok(())
            }
            Err(err) => {
                self.state = BackendState::Stopped;
                Err(err)
            }
        }
    }

    fn stop(&mut self) {
        if self.state == BackendState::Stopped {
            return;
        }
        self.state = BackendState::ShuttingDown;
        if let Some(cancel) = &self.cancel {
            if let Err(err) = cancel.signal() {
                log::warn!("failed to signal udev listener: {err}");
            }
        }
        if let Some(mut thread) = self.thread.take() {
            thread.join();
        }
        self.cancel = None;
        self.state = BackendState::Stopped;
        log::info!("udev backend stopped");
    }
}

impl Drop for SocketMonitorBackend {
    fn drop(&mut self) {
        self.stop();
    }
}
