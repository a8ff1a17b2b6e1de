use std::cell::Cell;
use std::rc::Rc;

use anyhow::anyhow;
use glam::Vec2;

use super::{Host, SetupError, SignalHandler};
use crate::render::{HeadlessSurface, ResourceLedger};
use crate::scene::CursorState;
use crate::signal::{HostSignal, SignalBus, SignalKind, Subscription};

#[derive(Debug)]
struct Inner {
    mount: Cell<Option<(u32, u32)>>,
    viewport: Cell<(u32, u32)>,
    pixel_ratio: f32,
    cursor: Cell<CursorState>,
    attached: Cell<usize>,
    fail_surface: Cell<bool>,
    surface_ratio: Cell<Option<f32>>,
    bus: SignalBus,
    ledger: ResourceLedger,
}

/// In-memory host driven by the caller.
///
/// Used by the headless CLI mode and by tests: signals are injected with
/// [`HeadlessHost::pointer_move`], [`HeadlessHost::scroll`],
/// [`HeadlessHost::resize`] and [`HeadlessHost::frame`].
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    inner: Rc<Inner>,
}

impl HeadlessHost {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_pixel_ratio(width, height, 1.0)
    }

    pub fn with_pixel_ratio(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Self {
            inner: Rc::new(Inner {
                mount: Cell::new(Some((width, height))),
                viewport: Cell::new((width, height)),
                pixel_ratio,
                cursor: Cell::new(CursorState::Default),
                attached: Cell::new(0),
                fail_surface: Cell::new(false),
                surface_ratio: Cell::new(None),
                bus: SignalBus::new(),
                ledger: ResourceLedger::new(),
            }),
        }
    }

    /// Host whose mount target does not exist.
    pub fn without_mount(width: u32, height: u32) -> Self {
        let host = Self::new(width, height);
        host.inner.mount.set(None);
        host
    }

    /// Makes the next surface creation fail.
    pub fn fail_surface_creation(&self) {
        self.inner.fail_surface.set(true);
    }

    pub fn remove_mount(&self) {
        self.inner.mount.set(None);
    }

    /// Changes the mount target and viewport size without notifying anyone.
    pub fn resize_mount(&self, width: u32, height: u32) {
        self.inner.mount.set(Some((width, height)));
        self.inner.viewport.set((width, height));
    }

    pub fn bus(&self) -> &SignalBus {
        &self.inner.bus
    }

    pub fn cursor(&self) -> CursorState {
        self.inner.cursor.get()
    }

    pub fn attached_surfaces(&self) -> usize {
        self.inner.attached.get()
    }

    /// Pixel ratio the most recent surface was created with.
    pub fn surface_pixel_ratio(&self) -> Option<f32> {
        self.inner.surface_ratio.get()
    }

    pub fn live_resources(&self) -> usize {
        self.inner.ledger.live()
    }

    pub fn pointer_move(&self, client: Vec2) -> usize {
        self.inner.bus.emit(HostSignal::PointerMove { client })
    }

    pub fn scroll(&self, offset: f32) -> usize {
        self.inner.bus.emit(HostSignal::Scroll { offset })
    }

    /// Resizes the mount target, then delivers the resize signal.
    pub fn resize(&self, width: u32, height: u32) -> usize {
        self.resize_mount(width, height);
        self.inner.bus.emit(HostSignal::Resize)
    }

    pub fn frame(&self, timestamp_ms: f64) -> usize {
        self.inner.bus.emit(HostSignal::Frame { timestamp_ms })
    }
}

impl Host for HeadlessHost {
    type Surface = HeadlessSurface;
    type Listener = Subscription;

    fn mount_size(&self) -> Option<(u32, u32)> {
        self.inner.mount.get()
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.inner.viewport.get()
    }

    fn pixel_ratio(&self) -> f32 {
        self.inner.pixel_ratio
    }

    fn create_surface(
        &self,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<HeadlessSurface, SetupError> {
        if self.inner.fail_surface.replace(false) {
            return Err(SetupError::Surface(anyhow!("no adapter available")));
        }
        self.inner.surface_ratio.set(Some(pixel_ratio));
        Ok(HeadlessSurface::new(
            width,
            height,
            pixel_ratio,
            self.inner.ledger.clone(),
        ))
    }

    fn attach_surface(&self, _surface: &HeadlessSurface) -> Result<(), SetupError> {
        if self.inner.mount.get().is_none() {
            return Err(SetupError::Attach("mount target is gone".to_string()));
        }
        self.inner.attached.set(self.inner.attached.get() + 1);
        Ok(())
    }

    fn detach_surface(&self, _surface: &HeadlessSurface) {
        self.inner
            .attached
            .set(self.inner.attached.get().saturating_sub(1));
    }

    fn listen(&self, kind: SignalKind, handler: SignalHandler) -> Result<Subscription, SetupError> {
        Ok(self.inner.bus.subscribe(kind, handler))
    }

    fn set_cursor(&self, cursor: CursorState) {
        self.inner.cursor.set(cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_updates_mount_before_emitting() {
        let host = HeadlessHost::new(800, 600);
        let probe = host.clone();
        let seen = Rc::new(Cell::new(None));
        let sink = Rc::clone(&seen);
        let _listener = host
            .listen(
                SignalKind::Resize,
                Box::new(move |_| sink.set(probe.mount_size())),
            )
            .unwrap();
        assert_eq!(host.resize(400, 300), 1);
        assert_eq!(seen.get(), Some((400, 300)));
    }

    #[test]
    fn surface_failure_is_one_shot() {
        let host = HeadlessHost::new(10, 10);
        host.fail_surface_creation();
        assert!(matches!(
            host.create_surface(10, 10, 1.0),
            Err(SetupError::Surface(_))
        ));
        assert!(host.create_surface(10, 10, 1.0).is_ok());
    }
}
