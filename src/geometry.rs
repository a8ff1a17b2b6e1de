use std::collections::HashSet;
use std::f32::consts::{PI, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::Ray;
use crate::config::ShapeKind;

/// Triangle mesh with interleaved vertex data.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

const STRIDE: usize = 6;

impl MeshData {
    pub fn from_kind(kind: &ShapeKind) -> Self {
        match *kind {
            ShapeKind::Torus {
                radius,
                tube,
                radial_segments,
                tubular_segments,
            } => torus(radius, tube, radial_segments, tubular_segments),
            ShapeKind::Sphere {
                radius,
                width_segments,
                height_segments,
            } => sphere(radius, width_segments, height_segments),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, index: u32) -> Vec3 {
        let base = index as usize * STRIDE;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3) {
        self.vertices.extend_from_slice(&position.to_array());
        self.vertices.extend_from_slice(&normal.to_array());
    }

    /// Radius of the smallest origin-centred sphere holding every vertex.
    pub fn bounding_radius(&self) -> f32 {
        (0..self.vertex_count() as u32)
            .map(|index| self.position(index).length())
            .fold(0.0, f32::max)
    }

    /// Unique triangle edges as a line list, used for wireframe drawing.
    pub fn edge_indices(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for triangle in self.indices.chunks_exact(3) {
            for (a, b) in [
                (triangle[0], triangle[1]),
                (triangle[1], triangle[2]),
                (triangle[2], triangle[0]),
            ] {
                let key = (a.min(b), a.max(b));
                if seen.insert(key) {
                    edges.extend_from_slice(&[a, b]);
                }
            }
        }
        edges
    }

    /// Nearest hit of `ray` against the triangles, as a ray parameter.
    ///
    /// Both faces of a triangle count as a hit.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        self.indices
            .chunks_exact(3)
            .filter_map(|triangle| {
                intersect_triangle(
                    ray,
                    self.position(triangle[0]),
                    self.position(triangle[1]),
                    self.position(triangle[2]),
                )
            })
            .fold(None, |nearest: Option<f32>, t| match nearest {
                Some(current) if current <= t => Some(current),
                _ => Some(t),
            })
    }
}

/// Ray parameter at which `ray` enters the origin-centred sphere of `radius`.
pub fn intersect_bounding_sphere(ray: &Ray, radius: f32) -> Option<f32> {
    let a = ray.direction.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = ray.origin.dot(ray.direction);
    let c = ray.origin.length_squared() - radius * radius;
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let far = (-b + root) / a;
    if far < 0.0 {
        return None;
    }
    Some(((-b - root) / a).max(0.0))
}

/// Möller-Trumbore ray/triangle test.
fn intersect_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;
    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    (t > EPSILON).then_some(t)
}

/// Torus in the XY plane around the Z axis.
pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> MeshData {
    let radial = radial_segments.max(3);
    let tubular = tubular_segments.max(3);
    let mut mesh = MeshData::default();

    for j in 0..=radial {
        let v = j as f32 / radial as f32 * TAU;
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32 * TAU;
            let position = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let centre = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            mesh.push_vertex(position, (position - centre).normalize_or_zero());
        }
    }

    let row = tubular + 1;
    for j in 1..=radial {
        for i in 1..=tubular {
            let a = row * j + i - 1;
            let b = row * (j - 1) + i - 1;
            let c = row * (j - 1) + i;
            let d = row * j + i;
            mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    mesh
}

/// UV sphere with poles on the Y axis.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width = width_segments.max(3);
    let height = height_segments.max(2);
    let mut mesh = MeshData::default();

    for iy in 0..=height {
        let v = iy as f32 / height as f32;
        for ix in 0..=width {
            let u = ix as f32 / width as f32;
            let position = Vec3::new(
                -radius * (u * TAU).cos() * (v * PI).sin(),
                radius * (v * PI).cos(),
                radius * (u * TAU).sin() * (v * PI).sin(),
            );
            mesh.push_vertex(position, position.normalize_or_zero());
        }
    }

    let row = width + 1;
    for iy in 0..height {
        for ix in 0..width {
            let a = row * iy + ix + 1;
            let b = row * iy + ix;
            let c = row * (iy + 1) + ix;
            let d = row * (iy + 1) + ix + 1;
            // Pole rows collapse to single triangles.
            if iy != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torus_has_expected_topology() {
        let mesh = torus(1.5, 0.4, 16, 100);
        assert_eq!(mesh.vertex_count(), 17 * 101);
        assert_eq!(mesh.triangle_count(), 16 * 100 * 2);
        assert!((mesh.bounding_radius() - 1.9).abs() < 1e-4);
    }

    #[test]
    fn sphere_has_expected_topology() {
        let mesh = sphere(1.0, 32, 32);
        assert_eq!(mesh.vertex_count(), 33 * 33);
        assert_eq!(mesh.triangle_count(), 32 * 32 * 2 - 2 * 32);
        assert!((mesh.bounding_radius() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn edges_are_unique() {
        let mesh = sphere(1.0, 8, 6);
        let edges = mesh.edge_indices();
        assert_eq!(edges.len() % 2, 0);
        let unique: HashSet<_> = edges
            .chunks_exact(2)
            .map(|pair| (pair[0].min(pair[1]), pair[0].max(pair[1])))
            .collect();
        assert_eq!(unique.len(), edges.len() / 2);
    }

    #[test]
    fn ray_hits_near_side_of_sphere() {
        let mesh = sphere(1.0, 32, 32);
        let ray = Ray::new(Vec3::new(0.013, 0.021, 5.0), Vec3::NEG_Z);
        let t = mesh.intersect(&ray).unwrap();
        assert!((t - 4.0).abs() < 0.01);
    }

    #[test]
    fn ray_passes_through_torus_hole() {
        let mesh = torus(1.5, 0.4, 16, 100);
        let through_hole = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(mesh.intersect(&through_hole).is_none());
        let on_ring = Ray::new(Vec3::new(1.52, 0.011, 5.0), Vec3::NEG_Z);
        let t = mesh.intersect(&on_ring).unwrap();
        assert!((t - 4.6).abs() < 0.01);
    }

    #[test]
    fn missing_ray_is_none() {
        let mesh = sphere(1.0, 16, 16);
        let ray = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(mesh.intersect(&ray).is_none());
        assert!(intersect_bounding_sphere(&ray, 1.0).is_none());
    }

    #[test]
    fn bounding_sphere_behind_origin_is_ignored() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert!(intersect_bounding_sphere(&ray, 1.0).is_none());
        let inside = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(intersect_bounding_sphere(&inside, 1.0), Some(0.0));
    }
}
