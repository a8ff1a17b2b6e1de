//! Interactive 3D background for the landing page hero section.
//!
//! The crate keeps the scene model ([`HeroScene`]) free of any platform
//! code so that it can be stepped frame by frame in tests and headless
//! tools. Hosts ([`host`]) plug the scene into a real environment: a winit
//! window natively, a DOM container on WebAssembly, or an in-memory driver.

pub mod camera;
pub mod config;
pub mod easing;
pub mod geometry;
pub mod host;
pub mod input;
pub mod render;
pub mod scene;
pub mod signal;
pub mod visualization;
pub mod waitlist;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use camera::{PerspectiveCamera, Ray};
pub use config::HeroConfig;
pub use host::{HeadlessHost, Host, SetupError};
pub use input::InputState;
pub use render::{FrameSurface, HeadlessSurface};
#[cfg(not(target_arch = "wasm32"))]
pub use render::Renderer;
pub use scene::{CursorState, FrameOutcome, HeroScene, ShapeId};
pub use signal::{HostSignal, SignalBus, SignalKind};
pub use visualization::HeroVisualization;
pub use waitlist::{WaitlistEntry, WaitlistError, WaitlistForm};
