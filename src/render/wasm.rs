use anyhow::{anyhow, Result};
use glam::{Mat4, Vec2, Vec3};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement};

use super::common::{shade_shape, LightParams};
use super::FrameSurface;
use crate::scene::HeroScene;

/// Renderer backed by a 2D canvas for WebAssembly builds.
///
/// Vertices are projected on the CPU with the scene camera. Shapes are
/// stroked as wireframes and particles are filled squares composited
/// with `lighter`.
pub struct CanvasRenderer {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    size: (u32, u32),
    pixel_ratio: f32,
    edges: Vec<Vec<u32>>,
}

impl CanvasRenderer {
    /// Creates a detached canvas sized for `width` x `height` logical pixels.
    pub fn new(document: &Document, width: u32, height: u32, pixel_ratio: f32) -> Result<Self> {
        let canvas = document
            .create_element("canvas")
            .map_err(|err| anyhow!("failed to create canvas: {err:?}"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| anyhow!("created element is not a canvas"))?;
        let context = canvas
            .get_context("2d")
            .map_err(|err| anyhow!("failed to query canvas context: {err:?}"))?
            .ok_or_else(|| anyhow!("canvas does not support 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| anyhow!("failed to cast canvas context"))?;

        let mut renderer = Self {
            canvas,
            context,
            size: (width, height),
            pixel_ratio,
            edges: Vec::new(),
        };
        renderer.resize(width, height);
        Ok(renderer)
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn to_screen(&self, view_proj: &Mat4, world: Vec3) -> Option<(Vec2, f32)> {
        let clip = *view_proj * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        let (width, height) = (self.size.0 as f32, self.size.1 as f32);
        let screen = Vec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height);
        Some((screen, clip.w))
    }

    fn draw_particles(&self, scene: &HeroScene, view_proj: &Mat4) -> Result<()> {
        let particles = &scene.particles;
        let model = particles.transform.matrix();
        let focal = scene.camera.projection().y_axis.y * self.size.1 as f32 * 0.5;

        self.context
            .set_global_composite_operation("lighter")
            .map_err(|err| anyhow!("composite operation rejected: {err:?}"))?;
        self.context
            .set_fill_style_str(&css_rgba(particles.color, particles.opacity));
        for &position in particles.positions() {
            let Some((screen, depth)) = self.to_screen(view_proj, model.transform_point3(position))
            else {
                continue;
            };
            let side = (particles.size * focal / depth).max(1.0) as f64;
            self.context.fill_rect(
                screen.x as f64 - side * 0.5,
                screen.y as f64 - side * 0.5,
                side,
                side,
            );
        }
        self.context
            .set_global_composite_operation("source-over")
            .map_err(|err| anyhow!("composite operation rejected: {err:?}"))?;
        Ok(())
    }

    fn draw_shapes(&self, scene: &HeroScene, view_proj: &Mat4) {
        let lights = LightParams::from_lights(&scene.lights);
        self.context.set_line_width(1.0);
        for (shape, edges) in scene.shapes.iter().zip(&self.edges) {
            let model = shape.transform.matrix();
            let color = shade_shape(shape, &lights, scene.camera.position);
            self.context
                .set_stroke_style_str(&css_rgba(color, shape.current.opacity));
            self.context.begin_path();
            for pair in edges.chunks_exact(2) {
                let a = self.to_screen(
                    view_proj,
                    model.transform_point3(shape.mesh.position(pair[0])),
                );
                let b = self.to_screen(
                    view_proj,
                    model.transform_point3(shape.mesh.position(pair[1])),
                );
                if let (Some((a, _)), Some((b, _))) = (a, b) {
                    self.context.move_to(a.x as f64, a.y as f64);
                    self.context.line_to(b.x as f64, b.y as f64);
                }
            }
            self.context.stroke();
        }
    }
}

fn css_rgba(color: Vec3, alpha: f32) -> String {
    let rgb = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    format!(
        "rgba({}, {}, {}, {:.3})",
        rgb.x as u8,
        rgb.y as u8,
        rgb.z as u8,
        alpha.clamp(0.0, 1.0)
    )
}

impl FrameSurface for CanvasRenderer {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Updates the backing store and CSS size to match the layout.
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.canvas
            .set_width((width as f32 * self.pixel_ratio).round() as u32);
        self.canvas
            .set_height((height as f32 * self.pixel_ratio).round() as u32);
        let style = self.canvas.style();
        for (property, value) in [("width", width), ("height", height)] {
            if let Err(err) = style.set_property(property, &format!("{value}px")) {
                log::warn!("failed to set canvas {property}: {err:?}");
            }
        }
        let ratio = self.pixel_ratio as f64;
        if let Err(err) = self.context.set_transform(ratio, 0.0, 0.0, ratio, 0.0, 0.0) {
            log::warn!("failed to apply pixel ratio: {err:?}");
        }
    }

    fn prepare(&mut self, scene: &HeroScene) -> Result<()> {
        self.edges = scene
            .shapes
            .iter()
            .map(|shape| shape.mesh.edge_indices())
            .collect();
        Ok(())
    }

    fn render(&mut self, scene: &HeroScene) -> Result<()> {
        let (width, height) = (self.size.0 as f64, self.size.1 as f64);
        self.context.clear_rect(0.0, 0.0, width, height);

        let view_proj = scene.camera.view_proj();
        self.draw_particles(scene, &view_proj)?;
        self.draw_shapes(scene, &view_proj);
        Ok(())
    }

    fn release(&mut self) {
        self.edges.clear();
        self.canvas.set_width(0);
        self.canvas.set_height(0);
    }
}
