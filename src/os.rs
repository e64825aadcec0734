use crate::Error;

use std::any::Any;

/// Implements this interface for windows win32 platfrom
#[cfg(target_os = "windows")]
pub mod win32;

/// Headless platform whose events are queued by the caller
pub mod null;

type Result<T> = std::result::Result<T, Error>;

/// Describes a rectangle starting at the top left corner specified by x,y
/// with the size of width and height.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub width: T,
    pub height: T,
}

/// 2-Dimensional size.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Size<T> {
    pub x: T,
    pub y: T,
}

/// Filled out to specify various app parameters when an App is created by `App::create`
pub struct AppInfo {
    /// name of the app, used as the window class name
    pub name: String,
    /// signify if the app is DPI aware or not
    pub dpi_aware: bool,
}

/// Filled out to specify various window parameters
/// when a window is created by `App::create_window`
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub title: String,
    /// position and client area size of the window
    pub rect: Rect<i32>,
}

impl Default for WindowInfo {
    fn default() -> Self {
        WindowInfo {
            title: String::from("dxframe"),
            rect: Rect {
                x: 0,
                y: 0,
                width: 1280,
                height: 720,
            },
        }
    }
}

bitflags! {
    /// Mouse buttons held during a mouse move
    pub struct MouseButtons: u8 {
        const NONE = 0b00000000;
        const LEFT = 0b00000001;
        const RIGHT = 0b00000010;
        const MIDDLE = 0b00000100;
    }
}

/// Events a window forwards to its `WindowDelegate`
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WindowEvent {
    /// The client area changed size, can be zero when minimised
    Resize { width: i32, height: i32 },
    /// The window requested a repaint
    Paint,
    /// The mouse moved within the client area
    MouseMove { x: i32, y: i32, buttons: MouseButtons },
    /// The user asked to close the window
    Close,
}

/// Result of pumping the platform message queue once
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PumpStatus {
    /// At least one message was processed
    Dispatched,
    /// The queue was empty, the caller is free to update and render
    Idle,
    /// The app received a quit request
    Quit,
}

/// Receives window events. The platform holds the delegate only for the duration of a `pump`
/// and calls it on the owning thread.
pub trait WindowDelegate {
    fn resize(&mut self, width: i32, height: i32) -> Result<()>;
    fn update(&mut self) -> Result<()>;
    fn render(&mut self) -> Result<()>;

    fn mouse_moved(&mut self, _x: i32, _y: i32, _buttons: MouseButtons) -> Result<()> {
        Ok(())
    }

    /// Return true to allow the window to close
    fn close(&mut self) -> bool {
        true
    }
}

/// Dispatch a single event to `delegate`. Paint runs update + render and mouse movement
/// is followed by a render, matching how a native window procedure drives the loop.
pub fn dispatch_event<D: WindowDelegate>(delegate: &mut D, event: WindowEvent) -> Result<bool> {
    match event {
        WindowEvent::Resize { width, height } => delegate.resize(width, height)?,
        WindowEvent::Paint => {
            delegate.update()?;
            delegate.render()?;
        }
        WindowEvent::MouseMove { x, y, buttons } => {
            delegate.mouse_moved(x, y, buttons)?;
            delegate.render()?;
        }
        WindowEvent::Close => return Ok(delegate.close()),
    }
    Ok(false)
}

/// An interface which all platforms need to implement for general operating system calls
pub trait App: 'static + Any + Sized {
    type Window: Window<Self>;
    type NativeHandle: NativeHandle<Self>;

    fn create(info: AppInfo) -> Result<Self>;
    fn create_window(&mut self, info: WindowInfo) -> Result<Self::Window>;
    /// Process all pending messages, forwarding window events to `delegate`
    fn pump<D: WindowDelegate>(&mut self, delegate: &mut D) -> Result<PumpStatus>;
}

/// A native platform handle (ie. HWND)
pub trait NativeHandle<A: App> {
    fn get_isize(&self) -> isize;
}

/// An instance of an operating system window
pub trait Window<A: App>: Any + Sized {
    fn show(&self);
    /// Client area size
    fn get_size(&self) -> Size<i32>;
    /// Client area rect at the origin, used for viewports
    fn get_viewport_rect(&self) -> Rect<i32>;
    fn get_title(&self) -> String;
    fn set_title(&mut self, title: &str);
    fn get_native_handle(&self) -> A::NativeHandle;
}
