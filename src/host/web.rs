use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use glam::Vec2;
use gloo_events::EventListener;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, MouseEvent, Node, Window};

use super::{Host, SetupError, SignalHandler};
use crate::render::CanvasRenderer;
use crate::scene::CursorState;
use crate::signal::{HostSignal, SignalKind};

/// Host backed by a DOM element looked up by id on every call, so a
/// container removed from the page reads as an absent mount target.
#[derive(Debug, Clone)]
pub struct DomHost {
    container_id: String,
}

impl DomHost {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
        }
    }

    fn window(&self) -> Option<Window> {
        web_sys::window()
    }

    fn document(&self) -> Option<Document> {
        self.window()?.document()
    }

    fn container(&self) -> Option<Element> {
        self.document()?.get_element_by_id(&self.container_id)
    }
}

/// DOM registration; dropping it removes the listener or stops the
/// animation frame loop.
pub enum DomListener {
    Event(EventListener),
    Frames(AnimationFrameLoop),
}

impl Host for DomHost {
    type Surface = CanvasRenderer;
    type Listener = DomListener;

    fn mount_size(&self) -> Option<(u32, u32)> {
        let container = self.container()?;
        Some((
            container.client_width().max(0) as u32,
            container.client_height().max(0) as u32,
        ))
    }

    fn viewport_size(&self) -> (u32, u32) {
        let Some(window) = self.window() else {
            return (1, 1);
        };
        let dimension = |value: Result<JsValue, JsValue>| {
            value
                .ok()
                .and_then(|value| value.as_f64())
                .unwrap_or(1.0)
                .max(1.0) as u32
        };
        (dimension(window.inner_width()), dimension(window.inner_height()))
    }

    fn pixel_ratio(&self) -> f32 {
        self.window()
            .map(|window| window.device_pixel_ratio() as f32)
            .unwrap_or(1.0)
    }

    fn create_surface(
        &self,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<CanvasRenderer, SetupError> {
        let document = self
            .document()
            .ok_or_else(|| SetupError::Surface(anyhow::anyhow!("document not available")))?;
        CanvasRenderer::new(&document, width, height, pixel_ratio).map_err(SetupError::Surface)
    }

    fn attach_surface(&self, surface: &CanvasRenderer) -> Result<(), SetupError> {
        let container = self
            .container()
            .ok_or_else(|| SetupError::Attach(format!("#{} not found", self.container_id)))?;
        container
            .append_child(surface.canvas())
            .map_err(|err| SetupError::Attach(format!("{err:?}")))?;
        Ok(())
    }

    fn detach_surface(&self, surface: &CanvasRenderer) {
        let Some(container) = self.container() else {
            return;
        };
        let canvas: &Node = surface.canvas().as_ref();
        if container.contains(Some(canvas)) {
            if let Err(err) = container.remove_child(canvas) {
                log::warn!("failed to remove canvas: {err:?}");
            }
        }
    }

    fn listen(&self, kind: SignalKind, handler: SignalHandler) -> Result<DomListener, SetupError> {
        let window = self.window().ok_or_else(|| SetupError::Listener {
            kind,
            reason: "window not available".to_string(),
        })?;
        let mut handler = handler;
        let listener = match kind {
            SignalKind::PointerMove => {
                DomListener::Event(EventListener::new(&window, "mousemove", move |event| {
                    if let Some(event) = event.dyn_ref::<MouseEvent>() {
                        handler(HostSignal::PointerMove {
                            client: Vec2::new(event.client_x() as f32, event.client_y() as f32),
                        });
                    }
                }))
            }
            SignalKind::Scroll => {
                let source = window.clone();
                DomListener::Event(EventListener::new(&window, "scroll", move |_| {
                    let offset = source.scroll_y().unwrap_or(0.0) as f32;
                    handler(HostSignal::Scroll { offset });
                }))
            }
            SignalKind::Resize => {
                DomListener::Event(EventListener::new(&window, "resize", move |_| {
                    handler(HostSignal::Resize);
                }))
            }
            SignalKind::Frame => DomListener::Frames(
                AnimationFrameLoop::start(window, handler)
                    .map_err(|reason| SetupError::Listener { kind, reason })?,
            ),
        };
        Ok(listener)
    }

    fn set_cursor(&self, cursor: CursorState) {
        let Some(body) = self.document().and_then(|document| document.body()) else {
            return;
        };
        if let Err(err) = body.style().set_property("cursor", cursor.as_css()) {
            log::warn!("failed to set cursor: {err:?}");
        }
    }
}

struct LoopState {
    window: Window,
    pending: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl LoopState {
    fn request(&self) -> Result<(), String> {
        let callback = self.callback.borrow();
        let Some(callback) = callback.as_ref() else {
            return Ok(());
        };
        let id = self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
            .map_err(|err| format!("requestAnimationFrame failed: {err:?}"))?;
        self.pending.set(Some(id));
        Ok(())
    }
}

/// `requestAnimationFrame` loop registered once; each tick schedules the
/// next one until the loop is dropped.
pub struct AnimationFrameLoop {
    state: Rc<LoopState>,
}

impl AnimationFrameLoop {
    fn start(window: Window, mut handler: SignalHandler) -> Result<Self, String> {
        let state = Rc::new(LoopState {
            window,
            pending: Cell::new(None),
            callback: RefCell::new(None),
        });
        let weak: Weak<LoopState> = Rc::downgrade(&state);
        let callback = Closure::<dyn FnMut(f64)>::new(move |timestamp_ms: f64| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            state.pending.set(None);
            handler(HostSignal::Frame { timestamp_ms });
            if let Err(err) = state.request() {
                log::error!("{err}");
            }
        });
        *state.callback.borrow_mut() = Some(callback);
        state.request()?;
        Ok(Self { state })
    }
}

impl Drop for AnimationFrameLoop {
    fn drop(&mut self) {
        if let Some(id) = self.state.pending.take() {
            if let Err(err) = self.state.window.cancel_animation_frame(id) {
                log::warn!("cancelAnimationFrame failed: {err:?}");
            }
        }
        self.state.callback.borrow_mut().take();
    }
}
