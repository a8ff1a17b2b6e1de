use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

/// Number of hoverable shapes in the scene.
pub const SHAPE_COUNT: usize = 2;
/// Number of points in the particle field.
pub const PARTICLE_COUNT: usize = 800;
/// Ambient light plus two point lights.
pub const LIGHT_COUNT: usize = 3;

/// Converts a packed `0xRRGGBB` value into normalized RGB.
pub fn hex_color(rgb: u32) -> Vec3 {
    Vec3::new(
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    )
}

const SAND: u32 = 0xD4A574;
const PEACH: u32 = 0xFDE2C7;

/// Everything the hero visualization needs to build its scene.
///
/// The defaults reproduce the landing page look. An XML document may
/// override parts of it, see [`HeroConfig::from_xml`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroConfig {
    /// Seed for the particle field. `None` draws from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    pub particles: ParticleConfig,
    pub shapes: [ShapeSpec; SHAPE_COUNT],
    pub lights: [LightSpec; LIGHT_COUNT],
    pub camera: CameraConfig,
    pub motion: MotionConfig,
    /// Upper bound applied to the device pixel ratio of the surface.
    pub max_pixel_ratio: f32,
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            seed: None,
            particles: ParticleConfig::default(),
            shapes: [
                ShapeSpec {
                    name: "torus".to_string(),
                    kind: ShapeKind::Torus {
                        radius: 1.5,
                        tube: 0.4,
                        radial_segments: 16,
                        tubular_segments: 100,
                    },
                    position: Vec3::new(-3.0, 0.0, -3.0),
                    rest_color: hex_color(PEACH),
                    hover_color: hex_color(SAND),
                    emissive_color: hex_color(PEACH),
                    rest_opacity: 0.3,
                    hover_opacity: 0.6,
                    rest_emissive: 0.0,
                    hover_emissive: 0.5,
                },
                ShapeSpec {
                    name: "sphere".to_string(),
                    kind: ShapeKind::Sphere {
                        radius: 1.0,
                        width_segments: 32,
                        height_segments: 32,
                    },
                    position: Vec3::new(4.0, -1.0, -4.0),
                    rest_color: hex_color(SAND),
                    hover_color: hex_color(PEACH),
                    emissive_color: hex_color(SAND),
                    rest_opacity: 0.2,
                    hover_opacity: 0.6,
                    rest_emissive: 0.0,
                    hover_emissive: 0.5,
                },
            ],
            lights: [
                LightSpec {
                    kind: LightKind::Ambient,
                    color: Vec3::ONE,
                    intensity: 0.5,
                    position: Vec3::ZERO,
                },
                LightSpec {
                    kind: LightKind::Point,
                    color: hex_color(SAND),
                    intensity: 1.0,
                    position: Vec3::new(5.0, 5.0, 5.0),
                },
                LightSpec {
                    kind: LightKind::Point,
                    color: hex_color(PEACH),
                    intensity: 0.8,
                    position: Vec3::new(-5.0, -5.0, 3.0),
                },
            ],
            camera: CameraConfig::default(),
            motion: MotionConfig::default(),
            max_pixel_ratio: 2.0,
        }
    }
}

/// Floating point cloud drawn behind the shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleConfig {
    pub count: usize,
    /// Side length of the cube the points are scattered in.
    pub spread: f32,
    pub size: f32,
    pub color: Vec3,
    pub opacity: f32,
    /// Radians per second about the X axis.
    pub spin_x: f32,
    /// Radians per second about the Y axis.
    pub spin_y: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: PARTICLE_COUNT,
            spread: 15.0,
            size: 0.03,
            color: hex_color(SAND),
            opacity: 0.8,
            spin_x: 0.025,
            spin_y: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeKind {
    Torus {
        radius: f32,
        tube: f32,
        radial_segments: u32,
        tubular_segments: u32,
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
}

/// Static description of one hoverable shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeSpec {
    pub name: String,
    pub kind: ShapeKind,
    pub position: Vec3,
    pub rest_color: Vec3,
    pub hover_color: Vec3,
    pub emissive_color: Vec3,
    pub rest_opacity: f32,
    pub hover_opacity: f32,
    pub rest_emissive: f32,
    pub hover_emissive: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Ambient,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSpec {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    /// Ignored for ambient lights.
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Camera distance from the origin with no scroll.
    pub rest_distance: f32,
    /// How far the camera follows the pointer, in world units per NDC unit.
    pub pointer_reach: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            rest_distance: 5.0,
            pointer_reach: 0.5,
        }
    }
}

/// Easing rates and parallax factors used by the frame update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    pub scroll_easing: f32,
    /// Parallax depth per scrolled pixel.
    pub parallax_per_pixel: f32,
    /// Extra particle yaw per scrolled pixel.
    pub rotation_per_pixel: f32,
    pub particle_lift: f32,
    pub shape_easing: f32,
    /// Additional parallax depth for each subsequent shape.
    pub shape_depth_step: f32,
    pub camera_easing: f32,
    pub camera_dolly: f32,
    pub hover_easing: f32,
    /// Per-frame self rotation of each shape (x, y) in radians.
    pub shape_spin: Vec2,
    pub pulse_amplitude: f32,
    pub pulse_frequency: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            scroll_easing: 0.05,
            parallax_per_pixel: 0.0015,
            rotation_per_pixel: 0.0005,
            particle_lift: 2.0,
            shape_easing: 0.05,
            shape_depth_step: 0.3,
            camera_easing: 0.05,
            camera_dolly: 5.0,
            hover_easing: 0.1,
            shape_spin: Vec2::new(0.01, 0.005),
            pulse_amplitude: 0.1,
            pulse_frequency: 3.0,
        }
    }
}

impl HeroConfig {
    /// Applies overrides from an XML document on top of the defaults.
    ///
    /// ```xml
    /// <hero>
    ///     <seed>7</seed>
    ///     <particles><color>#D4A574</color></particles>
    ///     <shape><name>sphere</name><position>4 -1 -4</position></shape>
    ///     <light><intensity>0.4</intensity></light>
    /// </hero>
    /// ```
    ///
    /// Colours are either `#RRGGBB` or three 0-255 components. Shapes are
    /// matched by name. `<light>` elements tune the default rig in order
    /// (ambient, then the two point lights); the rig always keeps its
    /// three lights. The particle count is fixed at [`PARTICLE_COUNT`].
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid hero config XML")?;
        let root = document.root_element();
        if !root.has_tag_name("hero") {
            bail!("expected <hero> root element, found <{}>", root.tag_name().name());
        }

        let mut config = Self::default();
        if let Some(seed) = optional_text(&root, "seed") {
            config.seed = Some(
                seed.parse::<u64>()
                    .map_err(|err| anyhow!("failed to parse seed: {err}"))?,
            );
        }
        config.max_pixel_ratio =
            parse_f32(optional_text(&root, "max-pixel-ratio"), config.max_pixel_ratio)?;

        if let Some(node) = child(&root, "particles") {
            let particles = &mut config.particles;
            if let Some(count) = optional_text(&node, "count") {
                let count = count
                    .parse::<usize>()
                    .map_err(|err| anyhow!("failed to parse particle count: {err}"))?;
                if count != PARTICLE_COUNT {
                    bail!("particle count is fixed at {PARTICLE_COUNT}, got {count}");
                }
            }
            particles.spread = parse_f32(optional_text(&node, "spread"), particles.spread)?;
            particles.size = parse_f32(optional_text(&node, "size"), particles.size)?;
            particles.color = parse_color(optional_text(&node, "color"), particles.color)?;
            particles.opacity = parse_f32(optional_text(&node, "opacity"), particles.opacity)?;
        }

        for node in root.children().filter(|n| n.has_tag_name("shape")) {
            let name = required_text(&node, "name")?;
            let shape = config
                .shapes
                .iter_mut()
                .find(|shape| shape.name == name)
                .ok_or_else(|| anyhow!("unknown shape '{name}'"))?;
            shape.position = parse_vec3(optional_text(&node, "position"), shape.position)?;
            shape.rest_color = parse_color(optional_text(&node, "color"), shape.rest_color)?;
            shape.hover_color =
                parse_color(optional_text(&node, "hover-color"), shape.hover_color)?;
            shape.emissive_color =
                parse_color(optional_text(&node, "emissive"), shape.emissive_color)?;
            shape.rest_opacity = parse_f32(optional_text(&node, "opacity"), shape.rest_opacity)?;
            shape.hover_opacity =
                parse_f32(optional_text(&node, "hover-opacity"), shape.hover_opacity)?;
        }

        let lights: Vec<_> = root.children().filter(|n| n.has_tag_name("light")).collect();
        if lights.len() > LIGHT_COUNT {
            bail!(
                "expected at most {LIGHT_COUNT} <light> elements, found {}",
                lights.len()
            );
        }
        for (node, light) in lights.iter().zip(config.lights.iter_mut()) {
            *light = parse_light(node, light)?;
        }

        if let Some(node) = child(&root, "camera") {
            let camera = &mut config.camera;
            camera.fov_degrees = parse_f32(optional_text(&node, "fov"), camera.fov_degrees)?;
            camera.rest_distance =
                parse_f32(optional_text(&node, "distance"), camera.rest_distance)?;
            camera.pointer_reach =
                parse_f32(optional_text(&node, "pointer-reach"), camera.pointer_reach)?;
        }

        Ok(config)
    }
}

fn parse_light(node: &Node<'_, '_>, base: &LightSpec) -> Result<LightSpec> {
    let kind = match optional_text(node, "type").as_deref() {
        None => base.kind,
        Some("point") => LightKind::Point,
        Some("ambient") => LightKind::Ambient,
        Some(other) => bail!("unknown light type '{other}'"),
    };
    Ok(LightSpec {
        kind,
        color: parse_color(optional_text(node, "color"), base.color)?,
        intensity: parse_f32(optional_text(node, "intensity"), base.intensity)?,
        position: parse_vec3(optional_text(node, "position"), base.position)?,
    })
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str, what: &str) -> Result<[f32; 3]> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("invalid {what} component '{component}': {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    match numbers.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(anyhow!("{what} needs exactly three components")),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    Ok(Vec3::from_array(parse_components(&value, "vector")?))
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 {
            bail!("colour '#{hex}' must have six hex digits");
        }
        let rgb = u32::from_str_radix(hex, 16)
            .map_err(|err| anyhow!("invalid colour '#{hex}': {err}"))?;
        return Ok(hex_color(rgb));
    }
    let [r, g, b] = parse_components(&value, "colour")?;
    Ok(Vec3::new(r / 255.0, g / 255.0, b / 255.0))
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}
