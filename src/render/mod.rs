use anyhow::Result;

use crate::scene::HeroScene;

mod common;
pub mod headless;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use common::{shade_shape, CameraParams, LightParams, MAX_POINT_LIGHTS};
pub use headless::{HeadlessSurface, ResourceLedger};
#[cfg(not(target_arch = "wasm32"))]
pub use native::Renderer;
#[cfg(target_arch = "wasm32")]
pub use wasm::CanvasRenderer;

/// Target the visualization draws into.
///
/// Sizes are in logical pixels. GPU-side resources created by
/// [`FrameSurface::prepare`] stay alive until [`FrameSurface::release`] or
/// drop.
pub trait FrameSurface {
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Uploads the immutable parts of the scene (particle buffer, shape
    /// geometry and materials).
    fn prepare(&mut self, scene: &HeroScene) -> Result<()>;

    fn render(&mut self, scene: &HeroScene) -> Result<()>;

    /// Frees everything allocated by `prepare`. Calling it twice is fine.
    fn release(&mut self);
}
