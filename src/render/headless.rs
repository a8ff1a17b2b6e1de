use std::cell::Cell;
use std::rc::Rc;

use anyhow::{bail, Result};
use log::debug;

use super::FrameSurface;
use crate::scene::HeroScene;

/// Shared counter of live surface resources.
///
/// Clones observe the same count, so a host can keep one after handing
/// the surface to the visualization.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    live: Rc<Cell<usize>>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.live.get()
    }

    fn acquire(&self, count: usize) {
        self.live.set(self.live.get() + count);
    }

    fn free(&self, count: usize) {
        self.live.set(self.live.get().saturating_sub(count));
    }
}

/// Offscreen surface that records what a GPU surface would allocate.
///
/// The surface itself counts as one resource. `prepare` adds the particle
/// buffer plus geometry and material for every shape.
#[derive(Debug)]
pub struct HeadlessSurface {
    width: u32,
    height: u32,
    pixel_ratio: f32,
    ledger: ResourceLedger,
    owned: usize,
    prepared: bool,
    frames: u64,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32, pixel_ratio: f32, ledger: ResourceLedger) -> Self {
        ledger.acquire(1);
        Self {
            width,
            height,
            pixel_ratio,
            ledger,
            owned: 1,
            prepared: false,
            frames: 0,
        }
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Backing store size in device pixels.
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.pixel_ratio).round() as u32,
            (self.height as f32 * self.pixel_ratio).round() as u32,
        )
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn is_released(&self) -> bool {
        self.owned == 0
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }
}

impl FrameSurface for HeadlessSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn prepare(&mut self, scene: &HeroScene) -> Result<()> {
        if self.is_released() {
            bail!("surface already released");
        }
        if self.prepared {
            return Ok(());
        }
        let allocated = 1 + scene.shapes.len() * 2;
        self.ledger.acquire(allocated);
        self.owned += allocated;
        self.prepared = true;
        debug!(
            "prepared {} particles and {} shapes",
            scene.particles.len(),
            scene.shapes.len()
        );
        Ok(())
    }

    fn render(&mut self, _scene: &HeroScene) -> Result<()> {
        if !self.prepared || self.is_released() {
            bail!("render called on an unprepared surface");
        }
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.ledger.free(self.owned);
        self.owned = 0;
        self.prepared = false;
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeroConfig;

    #[test]
    fn prepare_and_release_balance_the_ledger() {
        let ledger = ResourceLedger::new();
        let scene = HeroScene::from_config(&HeroConfig::default(), 1.0);
        let mut surface = HeadlessSurface::new(640, 480, 2.0, ledger.clone());
        assert_eq!(ledger.live(), 1);

        surface.prepare(&scene).unwrap();
        assert_eq!(ledger.live(), 6);
        surface.prepare(&scene).unwrap();
        assert_eq!(ledger.live(), 6);

        surface.render(&scene).unwrap();
        assert_eq!(surface.frames_rendered(), 1);

        surface.release();
        surface.release();
        assert_eq!(ledger.live(), 0);
        assert!(surface.render(&scene).is_err());
    }

    #[test]
    fn drop_releases() {
        let ledger = ResourceLedger::new();
        let scene = HeroScene::from_config(&HeroConfig::default(), 1.0);
        {
            let mut surface = HeadlessSurface::new(10, 10, 1.0, ledger.clone());
            surface.prepare(&scene).unwrap();
        }
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn drawing_buffer_follows_pixel_ratio() {
        let mut surface = HeadlessSurface::new(400, 300, 2.0, ResourceLedger::new());
        assert_eq!(surface.drawing_buffer_size(), (800, 600));
        surface.resize(200, 100);
        assert_eq!(surface.size(), (200, 100));
        assert_eq!(surface.drawing_buffer_size(), (400, 200));
    }
}
