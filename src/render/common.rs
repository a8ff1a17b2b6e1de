use glam::{Mat4, Vec3};

use crate::camera::PerspectiveCamera;
use crate::config::LightKind;
use crate::scene::{InteractiveShape, Light};

/// Point lights beyond this count are ignored by the renderers.
pub const MAX_POINT_LIGHTS: usize = 4;

/// Camera parameters consumed by the renderers.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

impl CameraParams {
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        Self {
            view_proj: camera.gpu_view_proj(),
            position: camera.position,
        }
    }
}

/// Single point light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// Lighting state consumed by the renderers.
#[derive(Clone, Debug, PartialEq)]
pub struct LightParams {
    /// Sum of all ambient lights, already scaled by intensity.
    pub ambient: Vec3,
    pub points: Vec<PointLight>,
}

impl LightParams {
    pub fn from_lights(lights: &[Light]) -> Self {
        let ambient = lights
            .iter()
            .filter(|light| light.kind == LightKind::Ambient)
            .map(|light| light.color * light.intensity)
            .sum();
        let points = lights
            .iter()
            .filter(|light| light.kind == LightKind::Point)
            .take(MAX_POINT_LIGHTS)
            .map(|light| PointLight {
                position: light.position,
                color: light.color,
                intensity: light.intensity,
            })
            .collect();
        Self { ambient, points }
    }
}

/// Flat colour of a shape for renderers without per-pixel lighting.
///
/// Point lights contribute by how much they face the camera side of the
/// shape; emissive light is added on top.
pub fn shade_shape(shape: &InteractiveShape, lights: &LightParams, camera: Vec3) -> Vec3 {
    let centre = shape.transform.position;
    let facing = (camera - centre).normalize_or_zero();
    let diffuse: Vec3 = lights
        .points
        .iter()
        .map(|light| {
            let direction = (light.position - centre).normalize_or_zero();
            light.color * light.intensity * facing.dot(direction).max(0.0)
        })
        .sum();
    (shape.current.color * (lights.ambient + diffuse) + shape.emissive()).min(Vec3::ONE)
}
