//! Environments the visualization can be mounted into.
//!
//! A [`Host`] owns the mount target: it reports its size, creates the
//! drawing surface, delivers input signals and shows the cursor the
//! scene asks for.

use thiserror::Error;

use crate::render::FrameSurface;
use crate::scene::CursorState;
use crate::signal::{HostSignal, SignalKind};

pub mod headless;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use headless::HeadlessHost;
#[cfg(not(target_arch = "wasm32"))]
pub use native::WindowHost;
#[cfg(target_arch = "wasm32")]
pub use web::DomHost;

/// Handler invoked for every signal of the kind it was registered for.
pub type SignalHandler = Box<dyn FnMut(HostSignal)>;

/// Failure while mounting the visualization.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to create rendering surface: {0:#}")]
    Surface(anyhow::Error),
    #[error("failed to attach surface to mount target: {0}")]
    Attach(String),
    #[error("failed to register {kind:?} listener: {reason}")]
    Listener { kind: SignalKind, reason: String },
}

pub trait Host: Clone + 'static {
    type Surface: FrameSurface + 'static;
    /// Registration handle; dropping it deregisters the handler.
    type Listener: 'static;

    /// Size of the mount target in logical pixels, or `None` when the
    /// target is absent.
    fn mount_size(&self) -> Option<(u32, u32)>;

    /// Size of the pointer coordinate space used for NDC conversion.
    fn viewport_size(&self) -> (u32, u32);

    fn pixel_ratio(&self) -> f32 {
        1.0
    }

    fn create_surface(
        &self,
        width: u32,
        height: u32,
        pixel_ratio: f32,
    ) -> Result<Self::Surface, SetupError>;

    fn attach_surface(&self, surface: &Self::Surface) -> Result<(), SetupError>;

    /// Removes the surface from the mount target. Only called while the
    /// target is present.
    fn detach_surface(&self, surface: &Self::Surface);

    fn listen(&self, kind: SignalKind, handler: SignalHandler)
        -> Result<Self::Listener, SetupError>;

    fn set_cursor(&self, cursor: CursorState);
}
