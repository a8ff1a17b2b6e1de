use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;
use winit::window::{CursorIcon, Window};

use super::{Host, SetupError, SignalHandler};
use crate::render::Renderer;
use crate::scene::CursorState;
use crate::signal::{HostSignal, SignalBus, SignalKind, Subscription};

/// Host backed by a winit window. The window itself is the mount target;
/// the event loop forwards window events through [`WindowHost::dispatch`].
#[derive(Clone)]
pub struct WindowHost {
    window: Arc<Window>,
    bus: SignalBus,
    closed: Rc<Cell<bool>>,
}

impl WindowHost {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            bus: SignalBus::new(),
            closed: Rc::new(Cell::new(false)),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn dispatch(&self, signal: HostSignal) -> usize {
        self.bus.emit(signal)
    }

    /// Marks the mount target as gone, e.g. after a close request.
    pub fn close(&self) {
        self.closed.set(true);
    }

    pub fn listener_count(&self) -> usize {
        self.bus.listener_count()
    }
}

impl Host for WindowHost {
    type Surface = Renderer;
    type Listener = Subscription;

    fn mount_size(&self) -> Option<(u32, u32)> {
        if self.closed.get() {
            return None;
        }
        let size = self.window.inner_size().to_logical::<f64>(self.window.scale_factor());
        Some((size.width.round() as u32, size.height.round() as u32))
    }

    fn viewport_size(&self) -> (u32, u32) {
        let size = self.window.inner_size().to_logical::<f64>(self.window.scale_factor());
        (size.width.round() as u32, size.height.round() as u32)
    }

    fn pixel_ratio(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    fn create_surface(
        &self,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<Renderer, SetupError> {
        pollster::block_on(Renderer::new(
            Arc::clone(&self.window),
            width,
            height,
            pixel_ratio,
        ))
        .map_err(SetupError::Surface)
    }

    fn attach_surface(&self, _surface: &Renderer) -> Result<(), SetupError> {
        debug!("renderer presenting to window {:?}", self.window.id());
        Ok(())
    }

    fn detach_surface(&self, _surface: &Renderer) {
        debug!("renderer detached from window {:?}", self.window.id());
    }

    fn listen(&self, kind: SignalKind, handler: SignalHandler) -> Result<Subscription, SetupError> {
        Ok(self.bus.subscribe(kind, handler))
    }

    fn set_cursor(&self, cursor: CursorState) {
        let icon = match cursor {
            CursorState::Pointer => CursorIcon::Pointer,
            CursorState::Default => CursorIcon::Default,
        };
        self.window.set_cursor(icon);
    }
}
