use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::camera::{PerspectiveCamera, Ray};
use crate::config::{
    CameraConfig, HeroConfig, LightKind, MotionConfig, ParticleConfig, ShapeSpec, SHAPE_COUNT,
};
use crate::easing::{ease, Ease};
use crate::geometry::{intersect_bounding_sphere, MeshData};
use crate::input::{InputState, ScrollState};

/// Index of an interactive shape inside [`HeroScene::shapes`].
pub type ShapeId = usize;

/// Cursor appearance requested by the last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    #[default]
    Default,
    Pointer,
}

impl CursorState {
    /// CSS `cursor` keyword for this state.
    pub fn as_css(self) -> &'static str {
        match self {
            CursorState::Default => "default",
            CursorState::Pointer => "pointer",
        }
    }
}

/// Position, Euler rotation (XYZ order) and scale of a scene node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Point cloud scattered once at setup; only its transform changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleField {
    positions: Vec<Vec3>,
    pub transform: Transform,
    pub size: f32,
    pub color: Vec3,
    pub opacity: f32,
}

impl ParticleField {
    pub fn scatter(config: &ParticleConfig, rng: &mut impl Rng) -> Self {
        let positions = (0..config.count)
            .map(|_| {
                Vec3::new(
                    (rng.gen::<f32>() - 0.5) * config.spread,
                    (rng.gen::<f32>() - 0.5) * config.spread,
                    (rng.gen::<f32>() - 0.5) * config.spread,
                )
            })
            .collect();
        Self {
            positions,
            transform: Transform::default(),
            size: config.size,
            color: config.color,
            opacity: config.opacity,
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Colour, opacity and emissive intensity of a shape in one of its states.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub color: Vec3,
    pub opacity: f32,
    pub emissive: f32,
}

/// One of the two hoverable wireframe shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveShape {
    pub name: String,
    pub mesh: MeshData,
    bounding_radius: f32,
    pub rest: Appearance,
    pub hover: Appearance,
    pub emissive_color: Vec3,
    /// Current eased appearance.
    pub current: Appearance,
    pub transform: Transform,
    is_hovered: bool,
}

impl InteractiveShape {
    pub fn from_spec(spec: &ShapeSpec) -> Self {
        let mesh = MeshData::from_kind(&spec.kind);
        let bounding_radius = mesh.bounding_radius();
        let rest = Appearance {
            color: spec.rest_color,
            opacity: spec.rest_opacity,
            emissive: spec.rest_emissive,
        };
        Self {
            name: spec.name.clone(),
            mesh,
            bounding_radius,
            rest,
            hover: Appearance {
                color: spec.hover_color,
                opacity: spec.hover_opacity,
                emissive: spec.hover_emissive,
            },
            emissive_color: spec.emissive_color,
            current: rest,
            transform: Transform::at(spec.position),
            is_hovered: false,
        }
    }

    pub fn is_hovered(&self) -> bool {
        self.is_hovered
    }

    /// World-space distance to the nearest hit of a unit-direction ray.
    fn hit_distance(&self, ray: &Ray) -> Option<f32> {
        let model = self.transform.matrix();
        let local = ray.transformed(&model.inverse());
        intersect_bounding_sphere(&local, self.bounding_radius)?;
        self.mesh.intersect(&local)
    }

    /// Emissive contribution after intensity is applied.
    pub fn emissive(&self) -> Vec3 {
        self.emissive_color * self.current.emissive
    }
}

/// Light source in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// What a frame decided, for the host to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub hovered: Option<ShapeId>,
    pub cursor: CursorState,
}

/// Complete state of the hero visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroScene {
    pub camera: PerspectiveCamera,
    pub particles: ParticleField,
    pub shapes: [InteractiveShape; SHAPE_COUNT],
    pub lights: Vec<Light>,
    scroll: ScrollState,
    motion: MotionConfig,
    camera_config: CameraConfig,
    /// Particle field spin in radians per second about X and Y.
    particle_spin: Vec2,
}

impl HeroScene {
    /// Builds the scene, seeding the particle field from `config.seed`.
    pub fn from_config(config: &HeroConfig, aspect: f32) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(config, aspect, &mut rng)
    }

    pub fn new(config: &HeroConfig, aspect: f32, rng: &mut impl Rng) -> Self {
        let lights = config
            .lights
            .iter()
            .map(|light| Light {
                kind: light.kind,
                position: light.position,
                color: light.color,
                intensity: light.intensity,
            })
            .collect();
        Self {
            camera: PerspectiveCamera::new(&config.camera, aspect),
            particles: ParticleField::scatter(&config.particles, rng),
            shapes: [
                InteractiveShape::from_spec(&config.shapes[0]),
                InteractiveShape::from_spec(&config.shapes[1]),
            ],
            lights,
            scroll: ScrollState::default(),
            motion: config.motion,
            camera_config: config.camera,
            particle_spin: Vec2::new(config.particles.spin_x, config.particles.spin_y),
        }
    }

    pub fn scroll(&self) -> ScrollState {
        self.scroll
    }

    pub fn hovered(&self) -> Option<ShapeId> {
        self.shapes.iter().position(InteractiveShape::is_hovered)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
    }

    /// Nearest shape under the pointer, using the current transforms.
    pub fn pick(&self, pointer: Vec2) -> Option<ShapeId> {
        let ray = self.camera.ray_through(pointer);
        self.shapes
            .iter()
            .enumerate()
            .filter_map(|(id, shape)| shape.hit_distance(&ray).map(|distance| (id, distance)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Advances the scene by one frame using the recorded input intent.
    pub fn update(&mut self, elapsed: f32, input: &InputState) -> FrameOutcome {
        self.advance(elapsed, input.pointer(), input.scroll_target())
    }

    /// Advances the scene by one frame. `elapsed` is seconds since the
    /// first frame.
    pub fn advance(&mut self, elapsed: f32, pointer: Vec2, scroll_target: f32) -> FrameOutcome {
        let motion = self.motion;

        let smoothed = self.scroll.advance(scroll_target, motion.scroll_easing);
        let parallax = smoothed * motion.parallax_per_pixel;
        let rotation_bias = smoothed * motion.rotation_per_pixel;

        let spin = self.particle_spin;
        let particles = &mut self.particles.transform;
        particles.rotation.y = elapsed * spin.y + rotation_bias;
        particles.rotation.x = elapsed * spin.x;
        particles.position.y = -parallax * motion.particle_lift;

        // Picking sees last frame's camera and shape transforms.
        let hovered = self.pick(pointer);
        for (id, shape) in self.shapes.iter_mut().enumerate() {
            shape.is_hovered = hovered == Some(id);
        }
        let cursor = if hovered.is_some() {
            CursorState::Pointer
        } else {
            CursorState::Default
        };

        let pulse = 1.0 + motion.pulse_amplitude * (elapsed * motion.pulse_frequency).sin();
        for (index, shape) in self.shapes.iter_mut().enumerate() {
            shape.transform.rotation.x += motion.shape_spin.x;
            shape.transform.rotation.y += motion.shape_spin.y;

            let depth = 1.0 + index as f32 * motion.shape_depth_step;
            ease(
                &mut shape.transform.position.y,
                -parallax * depth,
                motion.shape_easing,
            );

            let (target, scale) = if shape.is_hovered {
                (shape.hover, pulse)
            } else {
                (shape.rest, 1.0)
            };
            let rate = motion.hover_easing;
            let current = &mut shape.current;
            ease(&mut current.color, target.color, rate);
            ease(&mut current.emissive, target.emissive, rate);
            ease(&mut current.opacity, target.opacity, rate);
            ease(&mut shape.transform.scale, Vec3::splat(scale), rate);
        }

        let reach = self.camera_config.pointer_reach;
        let camera = &mut self.camera;
        camera.position.x = camera
            .position
            .x
            .ease_toward(pointer.x * reach, motion.camera_easing);
        camera.position.y = camera
            .position
            .y
            .ease_toward(pointer.y * reach, motion.camera_easing);
        camera.position.z = self.camera_config.rest_distance - parallax * motion.camera_dolly;
        camera.look_at(Vec3::ZERO);

        FrameOutcome { hovered, cursor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> HeroScene {
        let config = HeroConfig {
            seed: Some(7),
            ..HeroConfig::default()
        };
        HeroScene::from_config(&config, 800.0 / 600.0)
    }

    /// NDC of a world point as seen by the scene camera.
    fn ndc_of(scene: &HeroScene, world: Vec3) -> Vec2 {
        scene.camera.view_proj().project_point3(world).truncate()
    }

    /// A point inside the solid part of each shape.
    fn anchor(scene: &HeroScene, id: ShapeId) -> Vec3 {
        let local = match id {
            0 => Vec3::new(1.5, 0.0, 0.0),
            _ => Vec3::ZERO,
        };
        scene.shapes[id].transform.matrix().transform_point3(local)
    }

    const FAR_CORNER: Vec2 = Vec2::new(0.98, 0.98);

    #[test]
    fn setup_builds_the_landing_scene() {
        let scene = scene();
        assert_eq!(scene.particles.len(), 800);
        assert!(scene
            .particles
            .positions()
            .iter()
            .all(|p| p.abs().max_element() <= 7.5));
        assert_eq!(scene.shapes.len(), 2);
        assert_eq!(scene.shapes[0].name, "torus");
        assert_eq!(scene.shapes[1].transform.position, Vec3::new(4.0, -1.0, -4.0));
        assert_eq!(scene.lights.len(), 3);
        assert_eq!(scene.hovered(), None);
    }

    #[test]
    fn seeded_fields_are_reproducible() {
        assert_eq!(scene().particles, scene().particles);
    }

    #[test]
    fn particle_field_spins_with_time_and_scroll() {
        let mut scene = scene();
        scene.advance(2.0, FAR_CORNER, 0.0);
        let rotation = scene.particles.transform.rotation;
        assert!((rotation.y - 0.1).abs() < 1e-6);
        assert!((rotation.x - 0.05).abs() < 1e-6);

        scene.advance(2.0, FAR_CORNER, 1000.0);
        // smoothed scroll is 50 after one frame
        let rotation = scene.particles.transform.rotation;
        assert!((rotation.y - (0.1 + 50.0 * 0.0005)).abs() < 1e-5);
        let lift = scene.particles.transform.position.y;
        assert!((lift - (-2.0 * 50.0 * 0.0015)).abs() < 1e-5);
    }

    #[test]
    fn smoothed_scroll_never_overshoots() {
        let mut scene = scene();
        let target = 640.0;
        for frame in 0..150 {
            let before = (scene.scroll().smoothed - target).abs();
            scene.advance(frame as f32 / 60.0, FAR_CORNER, target);
            let after = (scene.scroll().smoothed - target).abs();
            assert!(after < before);
            assert!(scene.scroll().smoothed <= target);
        }
    }

    #[test]
    fn shapes_spin_every_frame_regardless_of_hover() {
        let mut scene = scene();
        for frame in 0..10 {
            scene.advance(frame as f32 / 60.0, FAR_CORNER, 0.0);
        }
        for shape in &scene.shapes {
            assert!((shape.transform.rotation.x - 0.1).abs() < 1e-5);
            assert!((shape.transform.rotation.y - 0.05).abs() < 1e-5);
        }
    }

    #[test]
    fn deeper_shape_gets_more_parallax() {
        let mut scene = scene();
        for frame in 0..2000 {
            scene.advance(frame as f32 / 60.0, FAR_CORNER, 400.0);
        }
        let parallax = scene.scroll().smoothed * 0.0015;
        let first = scene.shapes[0].transform.position.y;
        let second = scene.shapes[1].transform.position.y;
        assert!((first - (-parallax)).abs() < 1e-3);
        assert!((second - (-parallax * 1.3)).abs() < 1e-3);
    }

    #[test]
    fn pointer_away_from_shapes_converges_to_rest_state() {
        let mut scene = scene();
        for frame in 0..400 {
            let outcome = scene.advance(frame as f32 / 60.0, FAR_CORNER, 0.0);
            assert_eq!(outcome.hovered, None);
            assert_eq!(outcome.cursor, CursorState::Default);
        }
        assert!((scene.shapes[0].current.opacity - 0.3).abs() < 1e-5);
        assert!((scene.shapes[1].current.opacity - 0.2).abs() < 1e-5);
        for shape in &scene.shapes {
            assert!((shape.transform.scale - Vec3::ONE).length() < 1e-5);
            assert!(shape.current.emissive.abs() < 1e-5);
            assert!((shape.current.color - shape.rest.color).length() < 1e-5);
        }
    }

    #[test]
    fn sustained_hover_converges_to_hover_state() {
        let mut scene = scene();
        for id in 0..SHAPE_COUNT {
            for frame in 0..300 {
                let pointer = ndc_of(&scene, anchor(&scene, id));
                let outcome = scene.advance(frame as f32 / 60.0, pointer, 0.0);
                assert_eq!(outcome.hovered, Some(id));
                assert_eq!(outcome.cursor, CursorState::Pointer);
            }
            let shape = &scene.shapes[id];
            assert!(shape.is_hovered());
            assert!((shape.current.color - shape.hover.color).length() < 1e-4);
            assert!((shape.current.emissive - 0.5).abs() < 1e-4);
            assert!((shape.current.opacity - 0.6).abs() < 1e-4);
            let scale = shape.transform.scale.x;
            assert!((0.85..=1.15).contains(&scale));
        }
    }

    #[test]
    fn hover_state_is_recomputed_each_frame() {
        let mut scene = scene();
        let pointer = ndc_of(&scene, anchor(&scene, 1));
        assert_eq!(scene.advance(0.0, pointer, 0.0).hovered, Some(1));
        assert_eq!(scene.advance(0.016, FAR_CORNER, 0.0).hovered, None);
        assert!(scene.shapes.iter().all(|shape| !shape.is_hovered()));
    }

    #[test]
    fn at_most_one_shape_is_hovered() {
        let mut scene = scene();
        let mut frame = 0;
        for y in -10..=10 {
            for x in -10..=10 {
                let pointer = Vec2::new(x as f32 / 10.0, y as f32 / 10.0);
                scene.advance(frame as f32 / 60.0, pointer, 0.0);
                let hovered = scene.shapes.iter().filter(|s| s.is_hovered()).count();
                assert!(hovered <= 1);
                frame += 1;
            }
        }
    }

    #[test]
    fn nearest_shape_wins_when_both_are_hit() {
        let mut scene = scene();
        scene.shapes[0].transform.position = Vec3::new(0.0, 0.0, 0.0);
        scene.shapes[1].transform.position = Vec3::new(1.5, 0.0, -3.0);
        let pointer = ndc_of(&scene, Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(scene.pick(pointer), Some(0));
        scene.shapes[1].transform.position = Vec3::new(1.5, 0.0, 2.0);
        assert_eq!(scene.pick(pointer), Some(1));
    }

    #[test]
    fn camera_follows_pointer_and_returns_to_rest() {
        let mut scene = scene();
        for frame in 0..300 {
            scene.advance(frame as f32 / 60.0, Vec2::new(1.0, -1.0), 0.0);
        }
        assert!((scene.camera.position.x - 0.5).abs() < 1e-3);
        assert!((scene.camera.position.y + 0.5).abs() < 1e-3);

        for frame in 300..900 {
            scene.advance(frame as f32 / 60.0, Vec2::ZERO, 0.0);
            assert_eq!(scene.camera.position.z, 5.0);
        }
        assert!(scene.camera.position.x.abs() < 1e-4);
        assert!(scene.camera.position.y.abs() < 1e-4);
        assert_eq!(scene.camera.target, Vec3::ZERO);
    }

    #[test]
    fn camera_depth_is_assigned_not_eased() {
        let mut scene = scene();
        scene.advance(0.0, FAR_CORNER, 1000.0);
        let parallax = scene.scroll().smoothed * 0.0015;
        assert!((scene.camera.position.z - (5.0 - parallax * 5.0)).abs() < 1e-6);
    }
}
