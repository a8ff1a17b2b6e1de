use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::CameraConfig;

/// Half-line used for hover picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Returns the ray expressed in the space described by `inverse`.
    ///
    /// The direction is not renormalized so that distances along the
    /// returned ray stay proportional to the original parameterization.
    pub fn transformed(&self, inverse: &Mat4) -> Ray {
        Ray {
            origin: inverse.transform_point3(self.origin),
            direction: inverse.transform_vector3(self.direction),
        }
    }
}

/// Perspective camera that always looks at the scene origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            fov_degrees: config.fov_degrees,
            aspect: aspect.max(0.01),
            near: config.near,
            far: config.far,
            position: Vec3::new(0.0, 0.0, config.rest_distance),
            target: Vec3::ZERO,
        }
    }

    /// Recomputes the aspect ratio from a pixel size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// OpenGL-style projection with clip depth in -1..1, used for picking.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov_degrees.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// View-projection for wgpu, whose clip depth runs 0..1.
    pub fn gpu_view_proj(&self) -> Mat4 {
        let projection = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        );
        projection * self.view()
    }

    /// Builds the picking ray through a point given in NDC.
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_proj().inverse();
        let through = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.5));
        Ray::new(self.position, through - self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(&CameraConfig::default(), 800.0 / 600.0)
    }

    #[test]
    fn starts_at_rest_distance() {
        let camera = camera();
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert!((camera.aspect - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn centre_ray_points_at_target() {
        let camera = camera();
        let ray = camera.ray_through(Vec2::ZERO);
        assert_eq!(ray.origin, camera.position);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn corner_ray_leans_toward_corner() {
        let camera = camera();
        let ray = camera.ray_through(Vec2::new(1.0, 1.0));
        assert!(ray.direction.x > 0.0);
        assert!(ray.direction.y > 0.0);
        assert!(ray.direction.z < 0.0);
        let half_fov = (75.0f32 / 2.0).to_radians();
        let vertical = (ray.direction.y / -ray.direction.z).atan();
        assert!((vertical - half_fov).abs() < 1e-3);
    }

    #[test]
    fn gpu_projection_maps_depth_to_unit_range() {
        let camera = camera();
        let near = Vec3::new(0.0, 0.0, camera.position.z - camera.near);
        let far = Vec3::new(0.0, 0.0, camera.position.z - camera.far);

        let gpu = camera.gpu_view_proj();
        assert!(gpu.project_point3(near).z.abs() < 1e-4);
        assert!((gpu.project_point3(far).z - 1.0).abs() < 1e-4);

        let gl = camera.view_proj();
        assert!((gl.project_point3(near).z + 1.0).abs() < 1e-4);

        let origin = Vec3::ZERO;
        let (a, b) = (gl.project_point3(origin), gpu.project_point3(origin));
        assert!((a.truncate() - b.truncate()).length() < 1e-5);
    }

    #[test]
    fn viewport_update_sets_aspect() {
        let mut camera = camera();
        camera.set_viewport(400, 300);
        assert!((camera.aspect - 400.0 / 300.0).abs() < 1e-6);
        camera.set_viewport(10, 0);
        assert_eq!(camera.aspect, 10.0);
    }
}
