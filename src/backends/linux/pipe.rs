//! Self-pipe cancellation for a thread blocked in `poll(2)`.
//!
//! The owner keeps the [`CancelSender`]; the listener watches the [`CancelReceiver`]
//! next to its data descriptor. Any readiness on the pipe (a byte, or hang-up because
//! the sender was closed) means "stop". The pipe is never read: once signalled it
//! stays readable, so every later wait returns [`Wake::Cancel`] immediately.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

pub(crate) struct CancelSender(OwnedFd);

pub(crate) struct CancelReceiver(OwnedFd);

/// Create a close-on-exec, non-blocking pipe pair.
pub(crate) fn cancel_pipe() -> io::Result<(CancelSender, CancelReceiver)> {
    let mut fds = [0 as libc::c_int; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe2 succeeded, both descriptors are fresh and owned by nobody else.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok((CancelSender(write), CancelReceiver(read)))
}

impl CancelSender {
    /// Write the single cancellation byte.
    pub(crate) fn signal(&self) -> io::Result<()> {
        let byte = [0u8; 1];
        loop {
            let n = unsafe { libc::write(self.0.as_raw_fd(), byte.as_ptr().cast(), 1) };
            if n == 1 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                // Pipe full: a byte is already waiting.
                io::ErrorKind::WouldBlock => return Ok(()),
                _ => return Err(err),
            }
        }
    }
}

impl AsRawFd for CancelReceiver {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    /// `data` is readable.
    Data,
    /// Cancellation requested.
    Cancel,
}

/// Block until `data` is readable or cancellation is requested. No timeout.
///
/// Cancellation takes precedence when both are ready.
pub(crate) fn wait(data: RawFd, cancel: &CancelReceiver) -> io::Result<Wake> {
    let mut fds = [
        libc::pollfd {
            fd: data,
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: cancel.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
    ];

    loop {
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if fds[1].revents != 0 {
            return Ok(Wake::Cancel);
        }
        if fds[0].revents & libc::POLLIN != 0 {
            return Ok(Wake::Data);
        }
        if fds[0].revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "monitor descriptor reported an error",
            ));
        }
    }
}
