use super::{AppInfo, MouseButtons, PumpStatus, Rect, Size, WindowDelegate, WindowEvent, WindowInfo};
use crate::Error;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

struct WindowState {
    title: String,
    rect: Rect<i32>,
    visible: bool,
}

/// Headless app. Events are queued with `push_event` and delivered on the next `pump`.
pub struct App {
    events: VecDeque<WindowEvent>,
    window: Option<Rc<RefCell<WindowState>>>,
    quit: bool,
}

/// Headless window which shares its size and title with the owning `App`.
pub struct Window {
    state: Rc<RefCell<WindowState>>,
}

#[derive(Clone, Copy)]
pub struct NativeHandle;

impl App {
    /// Queue an event for the next `pump`. Resize events also update the client size the
    /// window reports, as the native window would have before delivering the message.
    pub fn push_event(&mut self, event: WindowEvent) {
        if let WindowEvent::Resize { width, height } = event {
            if let Some(window) = &self.window {
                let mut state = window.borrow_mut();
                state.rect.width = width.max(0);
                state.rect.height = height.max(0);
            }
        }
        self.events.push_back(event);
    }

    /// Convenience for queuing a mouse move.
    pub fn push_mouse_move(&mut self, x: i32, y: i32, buttons: MouseButtons) {
        self.push_event(WindowEvent::MouseMove { x, y, buttons });
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl super::App for App {
    type Window = Window;
    type NativeHandle = NativeHandle;

    fn create(info: AppInfo) -> Result<Self, Error> {
        tracing::debug!("null app created: {}", info.name);
        Ok(App {
            events: VecDeque::new(),
            window: None,
            quit: false,
        })
    }

    fn create_window(&mut self, info: WindowInfo) -> Result<Window, Error> {
        if self.window.is_some() {
            return Err(Error::Device(String::from("null app supports a single window")));
        }
        let state = Rc::new(RefCell::new(WindowState {
            title: info.title,
            rect: info.rect,
            visible: false,
        }));
        self.window = Some(state.clone());
        Ok(Window { state })
    }

    fn pump<D: WindowDelegate>(&mut self, delegate: &mut D) -> Result<PumpStatus, Error> {
        if self.quit {
            return Ok(PumpStatus::Quit);
        }
        if self.events.is_empty() {
            return Ok(PumpStatus::Idle);
        }
        while let Some(event) = self.events.pop_front() {
            if super::dispatch_event(delegate, event)? {
                self.quit = true;
                self.events.clear();
                return Ok(PumpStatus::Quit);
            }
        }
        Ok(PumpStatus::Dispatched)
    }
}

impl super::NativeHandle<App> for NativeHandle {
    fn get_isize(&self) -> isize {
        0
    }
}

impl Window {
    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }
}

impl super::Window<App> for Window {
    fn show(&self) {
        self.state.borrow_mut().visible = true;
    }

    fn get_size(&self) -> Size<i32> {
        let state = self.state.borrow();
        Size {
            x: state.rect.width,
            y: state.rect.height,
        }
    }

    fn get_viewport_rect(&self) -> Rect<i32> {
        let state = self.state.borrow();
        Rect {
            x: 0,
            y: 0,
            width: state.rect.width,
            height: state.rect.height,
        }
    }

    fn get_title(&self) -> String {
        self.state.borrow().title.clone()
    }

    fn set_title(&mut self, title: &str) {
        self.state.borrow_mut().title = title.to_string();
    }

    fn get_native_handle(&self) -> NativeHandle {
        NativeHandle
    }
}
