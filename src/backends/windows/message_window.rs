//! Window-message backend (message-only window + `WM_DEVICECHANGE`).
//!
//! The listener thread creates a hidden `HWND_MESSAGE` window, registers it for HID
//! device-interface notifications, and pumps messages for it. Arrival and removal
//! notifications both trigger a full rescan: `WM_DEVICECHANGE` names an interface path,
//! but the probe is the authority on what is present.
//!
//! ## Shutdown
//! The owner posts `WM_CLOSE` to the window. The window procedure destroys the window
//! on its own thread, `WM_DESTROY` posts the quit message, `GetMessageW` returns 0, and
//! the thread unregisters the notification and the window class before exiting. The
//! owner then joins. No timed wait, no thread termination.

#![cfg(target_os = "windows")]

use crate::backends::listener::ListenerThread;
use crate::backends::{BackendState, DeviceSink, NotificationBackend};
use crate::error::{Error, Result};
use core::ffi::c_void;
use std::cell::RefCell;
use std::sync::Arc;
use windows_sys::core::GUID;
use windows_sys::Win32::Foundation::{GetLastError, HWND, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::WindowsAndMessaging::*;

// Local constants (avoid relying on module exports that vary by windows-sys version)
const DBT_DEVICEARRIVAL: usize = 0x8000;
const DBT_DEVICEREMOVECOMPLETE: usize = 0x8004;
const DBT_DEVTYP_DEVICEINTERFACE: u32 = 0x0000_0005;
const DEVICE_NOTIFY_WINDOW_HANDLE: u32 = 0x0000_0000;
const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;

/// `GUID_DEVINTERFACE_HID` {4D1E55B2-F16F-11CF-88CB-001111000030}
const GUID_DEVINTERFACE_HID: GUID = GUID::from_u128(0x4d1e55b2_f16f_11cf_88cb_001111000030);

const CLASS_NAME: &str = "stickwatch_hotplug_window";

/// `DEV_BROADCAST_DEVICEINTERFACE_W` with an empty name, as passed to
/// `RegisterDeviceNotificationW`.
#[repr(C)]
struct DeviceInterfaceFilter {
    dbcc_size: u32,
    dbcc_devicetype: u32,
    dbcc_reserved: u32,
    dbcc_classguid: GUID,
    dbcc_name: [u16; 1],
}

thread_local! {
    // Set only on the pump thread, before its window exists.
    static SINK: RefCell<Option<Arc<dyn DeviceSink>>> = const { RefCell::new(None) };
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Window + notification registration owned by the pump thread.
struct MessageWindow {
    hwnd: HWND,
    notify: *mut c_void,
    class: Vec<u16>,
    hinstance: *mut c_void,
}

impl MessageWindow {
    fn create() -> Result<Self> {
        unsafe {
            let class = wide(CLASS_NAME);
            let hinstance = GetModuleHandleW(core::ptr::null());

            let mut wc: WNDCLASSW = core::mem::zeroed();
            wc.lpfnWndProc = Some(window_proc);
            wc.hInstance = hinstance;
            wc.lpszClassName = class.as_ptr();
            if RegisterClassW(&wc) == 0 {
                let err = GetLastError();
                if err != ERROR_CLASS_ALREADY_EXISTS {
                    return Err(Error::BackendInit(format!(
                        "RegisterClassW failed (error {err})"
                    )));
                }
            }

            let hwnd = CreateWindowExW(
                0,
                class.as_ptr(),
                class.as_ptr(),
                0,
                0,
                0,
                0,
                0,
                HWND_MESSAGE,
                core::ptr::null_mut(),
                hinstance,
                core::ptr::null(),
            );
            if hwnd.is_null() {
                let err = GetLastError();
                UnregisterClassW(class.as_ptr(), hinstance);
                return Err(Error::BackendInit(format!(
                    "CreateWindowExW failed (error {err})"
                )));
            }

            let filter = DeviceInterfaceFilter {
                dbcc_size: core::mem::size_of::<DeviceInterfaceFilter>() as u32,
                dbcc_devicetype: DBT_DEVTYP_DEVICEINTERFACE,
                dbcc_reserved: 0,
                dbcc_classguid: GUID_DEVINTERFACE_HID,
                dbcc_name: [0],
            };
            let notify = RegisterDeviceNotificationW(
                hwnd,
                &filter as *const DeviceInterfaceFilter as *const c_void,
                DEVICE_NOTIFY_WINDOW_HANDLE,
            );
            if notify.is_null() {
                let err = GetLastError();
                DestroyWindow(hwnd);
                UnregisterClassW(class.as_ptr(), hinstance);
                return Err(Error::BackendInit(format!(
                    "RegisterDeviceNotificationW failed (error {err})"
                )));
            }

            Ok(Self {
                hwnd,
                notify,
                class,
                hinstance,
            })
        }
    }

    /// Pump until `WM_QUIT`.
    fn pump(&self) {
        unsafe {
            let mut msg: MSG = core::mem::zeroed();
            loop {
                let rc = GetMessageW(&mut msg, core::ptr::null_mut(), 0, 0);
                if rc == 0 {
                    break;
                }
                if rc == -1 {
                    log::error!(
                        "GetMessageW failed (error {}), hot-plug updates stop",
                        GetLastError()
                    );
                    DestroyWindow(self.hwnd);
                    break;
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

impl Drop for MessageWindow {
    fn drop(&mut self) {
        unsafe {
            // The window is already destroyed by WM_CLOSE (or the pump error path).
            if !self.notify.is_null() {
                UnregisterDeviceNotification(self.notify);
                self.notify = core::ptr::null_mut();
            }
            UnregisterClassW(self.class.as_ptr(), self.hinstance);
        }
    }
}

fn current_sink() -> Option<Arc<dyn DeviceSink>> {
    SINK.with(|s| s.borrow().clone())
}

unsafe extern "system" fn window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_DEVICECHANGE => {
            match wparam {
                DBT_DEVICEARRIVAL | DBT_DEVICEREMOVECOMPLETE => {
                    log::debug!("WM_DEVICECHANGE 0x{wparam:04x}");
                    if let Some(sink) = current_sink() {
                        sink.rescan();
                    }
                }
                _ => {}
            }
            1
        }
        WM_CLOSE => {
            DestroyWindow(hwnd);
            0
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            0
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

pub struct MessagePumpBackend {
    thread_name: String,
    state: BackendState,
    // HWND of the pump thread's window; only used as a PostMessageW target.
    hwnd: Option<isize>,
    thread: Option<ListenerThread>,
}

impl MessagePumpBackend {
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
            state: BackendState::Uninitialized,
            hwnd: None,
            thread: None,
        }
    }
}

impl NotificationBackend for MessagePumpBackend {
    fn name(&self) -> &'static str {
        "message-window"
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
                "message-window backend cannot start from {:?}",
                self.state
            )));
        }

        let spawned = ListenerThread::spawn(&self.thread_name, move |ready| {
            SINK.with(|s| *s.borrow_mut() = Some(Arc::clone(&sink)));
            let window = match MessageWindow::create() {
                Ok(window) => window,
                Err(err) => {
                    SINK.with(|s| *s.borrow_mut() = None);
                    ready.failed(err);
                    return;
                }
            };
            ready.listening(window.hwnd as isize);
            // Catch devices that appeared between the initial scan and registration.
            sink.rescan();
            window.pump();
            drop(window);
            SINK.with(|s| *s.borrow_mut() = None);
        });

        match spawned {
            Ok((thread, hwnd)) => {
                self.thread = Some(thread);
                self.hwnd = Some(hwnd);
                self.state = BackendState::Listening;
                log::info!("message-window backend listening");
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
        if let Some(hwnd) = self.hwnd.take() {
            let posted = unsafe { PostMessageW(hwnd as HWND, WM_CLOSE, 0, 0) };
            if posted == 0 {
                // Window already gone: the pump thread has exited or is exiting.
                log::warn!("PostMessageW(WM_CLOSE) failed (error {})", unsafe {
                    GetLastError()
                });
            }
        }
        if let Some(mut thread) = self.thread.take() {
            thread.join();
        }
        self.state = BackendState::Stopped;
        log::info!("message-window backend stopped");
    }
}

impl Drop for MessagePumpBackend {
    fn drop(&mut self) {
        self.stop();
    }
}
