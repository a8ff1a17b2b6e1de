use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::HeroConfig;
use crate::host::{Host, SetupError, SignalHandler};
use crate::input::InputState;
use crate::render::FrameSurface;
use crate::scene::{CursorState, FrameOutcome, HeroScene};
use crate::signal::{HostSignal, SignalKind};

/// Seconds elapsed since the first frame timestamp.
#[derive(Debug, Clone, Copy, Default)]
struct Clock {
    start_ms: Option<f64>,
}

impl Clock {
    fn elapsed(&mut self, timestamp_ms: f64) -> f32 {
        let start = *self.start_ms.get_or_insert(timestamp_ms);
        ((timestamp_ms - start) / 1000.0).max(0.0) as f32
    }
}

/// State touched by the frame and resize handlers.
struct FrameLoop<S> {
    scene: HeroScene,
    surface: Option<S>,
    clock: Clock,
    frames: u64,
}

impl<S: FrameSurface> FrameLoop<S> {
    /// Runs one frame. Returns `None` once the surface has been released.
    fn tick(&mut self, timestamp_ms: f64, input: &InputState) -> Option<FrameOutcome> {
        let surface = self.surface.as_mut()?;
        let elapsed = self.clock.elapsed(timestamp_ms);
        let outcome = self.scene.update(elapsed, input);
        match surface.render(&self.scene) {
            Ok(()) => self.frames += 1,
            Err(err) => error!("failed to render frame: {err:#}"),
        }
        Some(outcome)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.scene.resize(width, height);
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(width, height);
        }
    }

    /// Detaches the surface from the mount target, if it is still there,
    /// and releases it.
    fn release_surface<H: Host<Surface = S>>(&mut self, host: &H) {
        let Some(mut surface) = self.surface.take() else {
            return;
        };
        if host.mount_size().is_some() {
            host.detach_surface(&surface);
        } else {
            debug!("mount target gone; skipping surface removal");
        }
        surface.release();
    }
}

/// A mounted hero visualization.
///
/// Owns the scene, the drawing surface and the four listener
/// registrations. Dropping it (or calling [`HeroVisualization::unmount`])
/// deregisters every listener, resets the cursor, removes the surface from
/// the mount target and releases the surface resources.
pub struct HeroVisualization<H: Host> {
    host: H,
    frame: Rc<RefCell<FrameLoop<H::Surface>>>,
    input: Arc<InputState>,
    listeners: Vec<H::Listener>,
    /// Set when teardown ran while a frame held the loop; the frame
    /// handler releases the surface once it lets go.
    release_pending: Rc<Cell<bool>>,
    torn_down: bool,
}

impl<H: Host> HeroVisualization<H> {
    /// Builds the scene and starts listening to `host`.
    ///
    /// Returns `Ok(None)` without creating anything when the mount target
    /// is absent. Mounting twice into the same host without unmounting
    /// first is not supported and leaves two surfaces attached.
    pub fn mount(host: H, config: &HeroConfig) -> Result<Option<Self>, SetupError> {
        let Some((width, height)) = host.mount_size() else {
            debug!("mount target absent; nothing to do");
            return Ok(None);
        };

        let pixel_ratio = host.pixel_ratio().min(config.max_pixel_ratio);
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let scene = HeroScene::from_config(config, aspect);

        let mut surface = host.create_surface(width, height, pixel_ratio)?;
        if let Err(err) = surface.prepare(&scene) {
            surface.release();
            return Err(SetupError::Surface(err));
        }
        if let Err(err) = host.attach_surface(&surface) {
            surface.release();
            return Err(err);
        }

        let mut visualization = Self {
            host,
            frame: Rc::new(RefCell::new(FrameLoop {
                scene,
                surface: Some(surface),
                clock: Clock::default(),
                frames: 0,
            })),
            input: Arc::new(InputState::new()),
            listeners: Vec::with_capacity(SignalKind::ALL.len()),
            release_pending: Rc::new(Cell::new(false)),
            torn_down: false,
        };

        // A failure here drops `visualization`, which tears down whatever
        // was registered so far.
        for kind in SignalKind::ALL {
            let handler = visualization.handler(kind);
            let listener = visualization.host.listen(kind, handler)?;
            visualization.listeners.push(listener);
        }

        info!(
            "hero visualization mounted at {width}x{height} (pixel ratio {pixel_ratio:.2})"
        );
        Ok(Some(visualization))
    }

    fn handler(&self, kind: SignalKind) -> SignalHandler {
        let input = Arc::clone(&self.input);
        let host = self.host.clone();
        let frame: Weak<RefCell<FrameLoop<H::Surface>>> = Rc::downgrade(&self.frame);
        let release_pending = Rc::clone(&self.release_pending);
        match kind {
            SignalKind::PointerMove => Box::new(move |signal| {
                if let HostSignal::PointerMove { client } = signal {
                    input.set_pointer_client(client, host.viewport_size());
                }
            }),
            SignalKind::Scroll => Box::new(move |signal| {
                if let HostSignal::Scroll { offset } = signal {
                    input.set_scroll_target(offset);
                }
            }),
            SignalKind::Resize => Box::new(move |_| {
                let Some(frame) = frame.upgrade() else {
                    return;
                };
                let Some((width, height)) = host.mount_size() else {
                    debug!("resize ignored: mount target absent");
                    return;
                };
                if let Ok(mut frame) = frame.try_borrow_mut() {
                    frame.resize(width, height);
                } else {
                    warn!("resize arrived during a frame; ignored");
                };
            }),
            SignalKind::Frame => Box::new(move |signal| {
                let HostSignal::Frame { timestamp_ms } = signal else {
                    return;
                };
                let Some(frame) = frame.upgrade() else {
                    return;
                };
                let outcome = if release_pending.get() {
                    None
                } else if let Ok(mut frame) = frame.try_borrow_mut() {
                    frame.tick(timestamp_ms, &input)
                } else {
                    warn!("re-entrant frame skipped");
                    None
                };
                if release_pending.get() {
                    finish_pending_release(&host, &frame, &release_pending);
                    return;
                }
                if let Some(outcome) = outcome {
                    host.set_cursor(outcome.cursor);
                }
            }),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Shared input intent; writing to it has the same effect as the
    /// pointer and scroll listeners.
    pub fn input(&self) -> &Arc<InputState> {
        &self.input
    }

    pub fn with_scene<R>(&self, f: impl FnOnce(&HeroScene) -> R) -> R {
        f(&self.frame.borrow().scene)
    }

    /// Current surface size, or `None` after teardown.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.frame.borrow().surface.as_ref().map(|surface| surface.size())
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame.borrow().frames
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Tears the visualization down. Equivalent to dropping it.
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.listeners.clear();
        self.host.set_cursor(CursorState::Default);

        if let Ok(mut frame) = self.frame.try_borrow_mut() {
            frame.release_surface(&self.host);
        } else {
            debug!("teardown during a frame; surface released once it ends");
            self.release_pending.set(true);
        }
        info!("hero visualization torn down");
    }
}

/// Releases a surface whose teardown was deferred by a running frame.
fn finish_pending_release<H: Host>(
    host: &H,
    frame: &RefCell<FrameLoop<H::Surface>>,
    release_pending: &Cell<bool>,
) {
    if let Ok(mut frame) = frame.try_borrow_mut() {
        frame.release_surface(host);
        release_pending.set(false);
    }
}

impl<H: Host> Drop for HeroVisualization<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;

    #[test]
    fn clock_starts_at_first_timestamp() {
        let mut clock = Clock::default();
        assert_eq!(clock.elapsed(1234.0), 0.0);
        assert!((clock.elapsed(2234.0) - 1.0).abs() < 1e-6);
        assert_eq!(clock.elapsed(1000.0), 0.0);
    }

    #[test]
    fn teardown_during_a_frame_releases_when_the_frame_ends() {
        let host = HeadlessHost::new(800, 600);
        let mut visualization = HeroVisualization::mount(host.clone(), &HeroConfig::default())
            .unwrap()
            .unwrap();
        let mut frame_handler = visualization.handler(SignalKind::Frame);
        let frame = Rc::clone(&visualization.frame);

        let running = frame.borrow_mut();
        visualization.teardown();
        assert_eq!(host.bus().listener_count(), 0);
        assert_eq!(host.cursor(), CursorState::Default);
        assert_eq!(host.live_resources(), 6);
        assert_eq!(host.attached_surfaces(), 1);
        drop(running);

        frame_handler(HostSignal::Frame { timestamp_ms: 16.0 });
        assert_eq!(host.live_resources(), 0);
        assert_eq!(host.attached_surfaces(), 0);
        assert_eq!(host.cursor(), CursorState::Default);
        assert_eq!(visualization.surface_size(), None);
        assert_eq!(visualization.frames_rendered(), 0);
        assert!(!visualization.release_pending.get());
    }
}
