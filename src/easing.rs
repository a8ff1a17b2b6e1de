use glam::{Vec2, Vec3};

/// Values that can be moved a fraction of the way toward a target each frame.
pub trait Ease: Copy {
    /// Returns `self + (target - self) * rate`.
    fn ease_toward(self, target: Self, rate: f32) -> Self;
}

impl Ease for f32 {
    fn ease_toward(self, target: Self, rate: f32) -> Self {
        self + (target - self) * rate
    }
}

impl Ease for Vec2 {
    fn ease_toward(self, target: Self, rate: f32) -> Self {
        self + (target - self) * rate
    }
}

impl Ease for Vec3 {
    fn ease_toward(self, target: Self, rate: f32) -> Self {
        self + (target - self) * rate
    }
}

/// Eases `value` in place.
pub fn ease<T: Ease>(value: &mut T, target: T, rate: f32) {
    *value = value.ease_toward(target, rate);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_moves_fraction_of_gap() {
        assert!((0.0f32.ease_toward(10.0, 0.05) - 0.5).abs() < 1e-6);
        assert!((10.0f32.ease_toward(0.0, 0.1) - 9.0).abs() < 1e-6);
    }

    #[test]
    fn vectors_ease_componentwise() {
        let mut value = Vec3::ZERO;
        ease(&mut value, Vec3::new(1.0, -2.0, 4.0), 0.5);
        assert_eq!(value, Vec3::new(0.5, -1.0, 2.0));
    }

    #[test]
    fn repeated_easing_converges_without_overshoot() {
        let mut value = 3.0f32;
        for _ in 0..400 {
            let before = (value - 1.0).abs();
            ease(&mut value, 1.0, 0.1);
            assert!((value - 1.0).abs() <= before);
            assert!(value >= 1.0);
        }
        assert!((value - 1.0).abs() < 1e-4);
    }
}
