use super::{AppInfo, MouseButtons, PumpStatus, Rect, Size, WindowDelegate, WindowEvent, WindowInfo};
use crate::Error;

use std::cell::RefCell;
use std::collections::VecDeque;

use windows::{
    core::*, Win32::Foundation::*, Win32::Graphics::Gdi::*, Win32::System::LibraryLoader::*,
    Win32::UI::HiDpi::*, Win32::UI::Input::KeyboardAndMouse::*, Win32::UI::WindowsAndMessaging::*,
};

type Result<T> = std::result::Result<T, Error>;

// wparam flags for WM_MOUSEMOVE
const MK_LBUTTON: usize = 0x0001;
const MK_RBUTTON: usize = 0x0002;
const MK_MBUTTON: usize = 0x0010;

thread_local! {
    // wndproc has no access to the delegate, messages are queued here and drained by `pump`
    static EVENTS: RefCell<VecDeque<(isize, WindowEvent)>> = RefCell::new(VecDeque::new());
}

fn push_event(hwnd: HWND, event: WindowEvent) {
    EVENTS.with(|events| events.borrow_mut().push_back((hwnd.0 as isize, event)));
}

fn pop_event() -> Option<(isize, WindowEvent)> {
    EVENTS.with(|events| events.borrow_mut().pop_front())
}

pub struct App {
    window_class: HSTRING,
    hinstance: HINSTANCE,
}

pub struct Window {
    hwnd: HWND,
}

#[derive(Clone, Copy)]
pub struct NativeHandle {
    hwnd: HWND,
}

impl Drop for Window {
    fn drop(&mut self) {
        unsafe {
            if IsWindow(self.hwnd).as_bool() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        unsafe {
            let _ = UnregisterClassW(PCWSTR(self.window_class.as_ptr()), self.hinstance);
        }
    }
}

fn client_size(hwnd: HWND) -> Size<i32> {
    let mut rect = RECT::default();
    unsafe {
        if GetClientRect(hwnd, &mut rect).is_err() {
            return Size::default();
        }
    }
    Size {
        x: rect.right - rect.left,
        y: rect.bottom - rect.top,
    }
}

extern "system" fn wndproc(window: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    unsafe {
        match message {
            WM_SIZE => {
                let size = client_size(window);
                push_event(
                    window,
                    WindowEvent::Resize {
                        width: size.x,
                        height: size.y,
                    },
                );
                LRESULT(0)
            }
            WM_PAINT => {
                let _ = ValidateRect(window, None);
                push_event(window, WindowEvent::Paint);
                LRESULT(0)
            }
            WM_MOUSEMOVE => {
                let x = (lparam.0 & 0xffff) as i16 as i32;
                let y = ((lparam.0 >> 16) & 0xffff) as i16 as i32;
                let mut buttons = MouseButtons::NONE;
                if wparam.0 & MK_LBUTTON != 0 {
                    buttons |= MouseButtons::LEFT;
                }
                if wparam.0 & MK_RBUTTON != 0 {
                    buttons |= MouseButtons::RIGHT;
                }
                if wparam.0 & MK_MBUTTON != 0 {
                    buttons |= MouseButtons::MIDDLE;
                }
                push_event(window, WindowEvent::MouseMove { x, y, buttons });
                LRESULT(0)
            }
            WM_KEYDOWN => {
                if wparam.0 as u16 == VK_ESCAPE.0 {
                    let _ = PostMessageW(window, WM_CLOSE, WPARAM(0), LPARAM(0));
                }
                LRESULT(0)
            }
            WM_CLOSE => {
                push_event(window, WindowEvent::Close);
                LRESULT(0)
            }
            WM_DESTROY => {
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(window, message, wparam, lparam),
        }
    }
}

impl super::App for App {
    type Window = Window;
    type NativeHandle = NativeHandle;

    fn create(info: AppInfo) -> Result<Self> {
        unsafe {
            if info.dpi_aware {
                let _ = SetThreadDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
            }

            let window_class = HSTRING::from(info.name.as_str());
            let instance: HINSTANCE = GetModuleHandleW(None)?.into();

            let wc = WNDCLASSW {
                hCursor: LoadCursorW(None, IDC_ARROW)?,
                hInstance: instance,
                lpszClassName: PCWSTR(window_class.as_ptr()),
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(wndproc),
                ..Default::default()
            };

            if RegisterClassW(&wc) == 0 {
                return Err(Error::Device(format!("failed to register window class {}", info.name)));
            }

            Ok(App {
                window_class,
                hinstance: instance,
            })
        }
    }

    fn create_window(&mut self, info: WindowInfo) -> Result<Window> {
        unsafe {
            // grow the outer rect so the client area matches the requested size
            let mut rect = RECT {
                left: 0,
                top: 0,
                right: info.rect.width,
                bottom: info.rect.height,
            };
            AdjustWindowRect(&mut rect, WS_OVERLAPPEDWINDOW, false)?;
            let width = rect.right - rect.left;
            let height = rect.bottom - rect.top;

            // centre on the primary monitor unless a position was given
            let (x, y) = if info.rect.x == 0 && info.rect.y == 0 {
                let screen_w = GetSystemMetrics(SM_CXSCREEN);
                let screen_h = GetSystemMetrics(SM_CYSCREEN);
                (((screen_w - width) / 2).max(0), ((screen_h - height) / 2).max(0))
            } else {
                (info.rect.x, info.rect.y)
            };

            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PCWSTR(self.window_class.as_ptr()),
                &HSTRING::from(info.title.as_str()),
                WS_OVERLAPPEDWINDOW,
                x,
                y,
                width,
                height,
                None,
                None,
                self.hinstance,
                None,
            )?;

            Ok(Window { hwnd })
        }
    }

    fn pump<D: WindowDelegate>(&mut self, delegate: &mut D) -> Result<PumpStatus> {
        let mut status = PumpStatus::Idle;
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    return Ok(PumpStatus::Quit);
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
                status = PumpStatus::Dispatched;
            }
        }
        while let Some((hwnd, event)) = pop_event() {
            status = PumpStatus::Dispatched;
            if super::dispatch_event(delegate, event)? {
                unsafe {
                    let _ = DestroyWindow(HWND(hwnd as _));
                }
                EVENTS.with(|events| events.borrow_mut().clear());
                return Ok(PumpStatus::Quit);
            }
        }
        Ok(status)
    }
}

impl super::NativeHandle<App> for NativeHandle {
    fn get_isize(&self) -> isize {
        self.hwnd.0 as isize
    }
}

impl super::Window<App> for Window {
    fn show(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOW);
            let _ = UpdateWindow(self.hwnd);
        }
    }

    fn get_size(&self) -> Size<i32> {
        client_size(self.hwnd)
    }

    fn get_viewport_rect(&self) -> Rect<i32> {
        let size = client_size(self.hwnd);
        Rect {
            x: 0,
            y: 0,
            width: size.x,
            height: size.y,
        }
    }

    fn get_title(&self) -> String {
        unsafe {
            let len = GetWindowTextLengthW(self.hwnd);
            if len <= 0 {
                return String::new();
            }
            let mut buf = vec![0u16; len as usize + 1];
            let copied = GetWindowTextW(self.hwnd, &mut buf);
            String::from_utf16_lossy(&buf[..copied.max(0) as usize])
        }
    }

    fn set_title(&mut self, title: &str) {
        unsafe {
            let _ = SetWindowTextW(self.hwnd, &HSTRING::from(title));
        }
    }

    fn get_native_handle(&self) -> NativeHandle {
        NativeHandle { hwnd: self.hwnd }
    }
}
