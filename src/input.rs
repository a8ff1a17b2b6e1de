use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::easing::Ease;

/// Maps a client-space pointer position to normalized device coordinates.
///
/// X grows to the right and Y grows upward, both in `[-1, 1]` across the
/// viewport.
pub fn client_to_ndc(client: Vec2, viewport: (u32, u32)) -> Vec2 {
    let width = viewport.0.max(1) as f32;
    let height = viewport.1.max(1) as f32;
    Vec2::new(
        (client.x / width) * 2.0 - 1.0,
        -(client.y / height) * 2.0 + 1.0,
    )
}

/// Intent recorded by input listeners and consumed by the frame update.
///
/// Listeners only write here; the frame tick is the only reader that turns
/// these values into scene changes.
#[derive(Debug, Default)]
pub struct InputState {
    pointer: RwLock<Vec2>,
    scroll_target: RwLock<f32>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pointer_ndc(&self, ndc: Vec2) {
        *self.pointer.write() = ndc;
    }

    /// Records a pointer move given in client pixels.
    pub fn set_pointer_client(&self, client: Vec2, viewport: (u32, u32)) {
        self.set_pointer_ndc(client_to_ndc(client, viewport));
    }

    pub fn set_scroll_target(&self, offset: f32) {
        *self.scroll_target.write() = offset;
    }

    pub fn pointer(&self) -> Vec2 {
        *self.pointer.read()
    }

    pub fn scroll_target(&self) -> f32 {
        *self.scroll_target.read()
    }
}

/// Raw and smoothed scroll offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollState {
    pub target: f32,
    pub smoothed: f32,
}

impl ScrollState {
    /// Moves the smoothed offset `rate` of the way toward the target.
    pub fn advance(&mut self, target: f32, rate: f32) -> f32 {
        self.target = target;
        self.smoothed = self.smoothed.ease_toward(target, rate);
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_corners_map_to_ndc_corners() {
        let viewport = (800, 600);
        assert_eq!(client_to_ndc(Vec2::ZERO, viewport), Vec2::new(-1.0, 1.0));
        assert_eq!(
            client_to_ndc(Vec2::new(800.0, 600.0), viewport),
            Vec2::new(1.0, -1.0)
        );
        assert_eq!(
            client_to_ndc(Vec2::new(400.0, 300.0), viewport),
            Vec2::ZERO
        );
    }

    #[test]
    fn zero_sized_viewport_does_not_divide_by_zero() {
        let ndc = client_to_ndc(Vec2::new(0.5, 0.5), (0, 0));
        assert!(ndc.is_finite());
    }

    #[test]
    fn input_state_records_latest_intent() {
        let state = InputState::new();
        state.set_pointer_client(Vec2::new(200.0, 150.0), (800, 600));
        state.set_scroll_target(120.0);
        state.set_scroll_target(300.0);
        assert_eq!(state.pointer(), Vec2::new(-0.5, 0.5));
        assert_eq!(state.scroll_target(), 300.0);
    }

    #[test]
    fn smoothed_scroll_approaches_target_without_overshoot() {
        let mut scroll = ScrollState::default();
        for _ in 0..200 {
            let before = (scroll.smoothed - 500.0).abs();
            scroll.advance(500.0, 0.05);
            let after = (scroll.smoothed - 500.0).abs();
            assert!(after < before);
            assert!(scroll.smoothed <= 500.0);
        }
        for _ in 0..200 {
            let before = (scroll.smoothed - 0.0).abs();
            scroll.advance(0.0, 0.05);
            assert!(scroll.smoothed.abs() < before);
            assert!(scroll.smoothed >= 0.0);
        }
    }
}
