/// Procedural meshes with a clear orientation, for demos and stress tests
use std::f32::consts::{PI, TAU};

use nalgebra::Point3;
use tracing::info;

use crate::geometry::{Mesh, Triangle};

/// Indexed vertex/face soup that expands into facets with computed normals
#[derive(Debug, Default)]
struct MeshBuilder {
    vertices: Vec<Point3<f32>>,
    faces: Vec<[usize; 3]>,
}

impl MeshBuilder {
    fn push_vertex(&mut self, x: f32, y: f32, z: f32) -> usize {
        self.vertices.push(Point3::new(x, y, z));
        self.vertices.len() - 1
    }

    /// Append vertices and faces whose indices are local to `vertices`
    fn push_part(&mut self, vertices: &[[f32; 3]], faces: &[[usize; 3]]) {
        let offset = self.vertices.len();
        for &[x, y, z] in vertices {
            self.push_vertex(x, y, z);
        }
        for &[a, b, c] in faces {
            self.faces.push([a + offset, b + offset, c + offset]);
        }
    }

    /// Two triangles spanning the quad `p1 p2 p3 p4` laid out as a grid cell
    fn push_cell(&mut self, p1: [f32; 3], p2: [f32; 3], p3: [f32; 3], p4: [f32; 3]) {
        self.push_part(&[p1, p2, p3, p4], &[[0, 1, 2], [1, 3, 2]]);
    }

    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn into_mesh(self, name: &str) -> Mesh {
        let mut mesh = Mesh::with_capacity(self.faces.len());
        mesh.set_name(name);
        for [a, b, c] in self.faces {
            mesh.add_triangle(Triangle::from_vertices(
                self.vertices[a],
                self.vertices[b],
                self.vertices[c],
            ));
        }
        mesh
    }
}

/// Square pyramid pointing along an axis: four base corners, then the tip
#[rustfmt::skip]
const SPIKE_FACES: [[usize; 3]; 6] = [
    [0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4],
    [0, 3, 1], [1, 3, 2],
];

/// Noisy cone with X/Y/Z axis spikes, arrow reliefs and a spiral texture.
///
/// The spiral consumes whatever remains of `target_triangles` after the
/// fixed features, so the result lands close to (not exactly on) the target.
pub fn directional_cone(target_triangles: usize) -> Mesh {
    const STEPS: usize = 5;
    const CONE_HEIGHT: f32 = 15.0;
    const CONE_RADIUS: f32 = 8.0;
    const SPIKE_LENGTH: f32 = 12.0;
    const SPIKE_WIDTH: f32 = 1.0;

    let base_resolution = (((target_triangles / 10) as f64).sqrt() as usize).max(3);
    info!(base_resolution, target_triangles, "generating directional cone");
    let mut builder = MeshBuilder::default();

    info!("step 1/{STEPS}: cone body");
    let apex = builder.push_vertex(0.0, 0.0, CONE_HEIGHT);
    let ring: Vec<usize> = (0..base_resolution)
        .map(|i| {
            let theta = TAU * i as f32 / base_resolution as f32;
            let noise = 0.5 * (10.0 * theta).sin();
            let radius = CONE_RADIUS + noise;
            builder.push_vertex(radius * theta.cos(), radius * theta.sin(), 0.0)
        })
        .collect();
    let base_center = builder.push_vertex(0.0, 0.0, 0.0);
    for i in 0..base_resolution {
        let next = (i + 1) % base_resolution;
        builder.faces.push([apex, ring[i], ring[next]]);
        builder.faces.push([base_center, ring[next], ring[i]]);
    }

    info!("step 2/{STEPS}: axis spikes");
    let (r, w, h, l) = (CONE_RADIUS, SPIKE_WIDTH, CONE_HEIGHT, SPIKE_LENGTH);
    builder.push_part(
        &[[r, w, w], [r, -w, w], [r, -w, -w], [r, w, -w], [r + l, 0.0, 0.0]],
        &SPIKE_FACES,
    );
    builder.push_part(
        &[[w, r, w], [-w, r, w], [-w, r, -w], [w, r, -w], [0.0, r + l, 0.0]],
        &SPIKE_FACES,
    );
    builder.push_part(
        &[[w, w, h], [-w, w, h], [-w, -w, h], [w, -w, h], [0.0, 0.0, h + l]],
        &SPIKE_FACES,
    );

    info!("step 3/{STEPS}: arrow reliefs");
    let arrow_height = CONE_HEIGHT * 0.7;
    let arrow_width = CONE_RADIUS * 0.5;
    let arrow_count = base_resolution / 10;
    let detail = base_resolution / 20;
    for i in 0..arrow_count {
        let angle = TAU * i as f32 / arrow_count as f32;
        let (sin, cos) = angle.sin_cos();
        let (cx, cy, cz) = (CONE_RADIUS * 0.8 * cos, CONE_RADIUS * 0.8 * sin, CONE_HEIGHT * 0.3);
        // Arrow narrows linearly towards its tip
        let point = |t: f32, s: f32| {
            let across = arrow_width * (1.0 - t) * (s - 0.5);
            [cx + across * cos, cy + across * sin, cz + t * arrow_height]
        };
        for j in 0..detail {
            let (t1, t2) = (j as f32 / detail as f32, (j + 1) as f32 / detail as f32);
            for k in 0..detail {
                let (s1, s2) = (k as f32 / detail as f32, (k + 1) as f32 / detail as f32);
                builder.push_cell(point(t1, s1), point(t1, s2), point(t2, s1), point(t2, s2));
            }
        }
    }

    let remaining = target_triangles.saturating_sub(builder.face_count());
    if remaining > 0 {
        info!(remaining, "step 4/{STEPS}: spiral texture");
        // Two triangles per cell, ten latitude rings per longitude step
        let theta_steps = ((remaining / 20) as f64).sqrt() as usize;
        let phi_steps = theta_steps * 10;
        let ring_at = |i: usize| {
            let phi = PI * i as f32 / phi_steps as f32;
            (CONE_RADIUS * (1.0 - phi / PI), CONE_HEIGHT * phi / PI, phi)
        };
        for i in 0..phi_steps {
            let (r1, z1, phi) = ring_at(i);
            let (r2, z2, _) = ring_at(i + 1);
            for j in 0..theta_steps {
                let theta1 = TAU * j as f32 / theta_steps as f32 + phi * 10.0;
                let theta2 = TAU * (j + 1) as f32 / theta_steps as f32 + phi * 10.0;
                builder.push_cell(
                    [r1 * theta1.cos(), r1 * theta1.sin(), z1],
                    [r1 * theta2.cos(), r1 * theta2.sin(), z1],
                    [r2 * theta1.cos(), r2 * theta1.sin(), z2],
                    [r2 * theta2.cos(), r2 * theta2.sin(), z2],
                );
            }
        }
    }

    info!(triangles = builder.face_count(), "step 5/{STEPS}: assembling facets");
    builder.into_mesh("directional_cone")
}

/// Height of the terrain surface; rises towards +Y (north)
fn terrain_height(x: f32, y: f32) -> f32 {
    let ridges: f32 = [1.0f32, 2.0, 3.0, 5.0, 8.0, 13.0]
        .iter()
        .map(|&f| (x * f).sin() * (y * f).cos() / f)
        .sum();
    ridges + 0.1 * y
}

/// Wavy terrain grid over [-10, 10]² with corner pillars, a north arrow and
/// axis strips.
pub fn oriented_terrain(width: usize, height: usize) -> Mesh {
    const STEPS: usize = 5;
    const EXTENT: f32 = 10.0;

    let (width, height) = (width.max(2), height.max(2));
    info!(width, height, "generating oriented terrain");
    let grid_x = |j: usize| -EXTENT + 2.0 * EXTENT * j as f32 / (width - 1) as f32;
    let grid_y = |i: usize| -EXTENT + 2.0 * EXTENT * i as f32 / (height - 1) as f32;
    let mut builder = MeshBuilder::default();

    info!("step 1/{STEPS}: base grid");
    for i in 0..height {
        for j in 0..width {
            let (x, y) = (grid_x(j), grid_y(i));
            builder.push_vertex(x, y, terrain_height(x, y));
        }
    }
    for i in 0..height - 1 {
        for j in 0..width - 1 {
            let p1 = i * width + j;
            let (p2, p3) = (p1 + 1, p1 + width);
            let p4 = p3 + 1;
            builder.faces.push([p1, p2, p3]);
            builder.faces.push([p2, p4, p3]);
        }
    }

    info!("step 2/{STEPS}: corner markers");
    #[rustfmt::skip]
    const PILLAR_FACES: [[usize; 3]; 12] = [
        [0, 2, 1], [0, 3, 2],
        [0, 1, 5], [0, 5, 4],
        [1, 2, 6], [1, 6, 5],
        [2, 3, 7], [2, 7, 6],
        [3, 0, 4], [3, 4, 7],
        [4, 5, 6], [4, 6, 7],
    ];
    let (pillar_height, half) = (2.0, 0.5);
    for (cx, cy) in [(-EXTENT, -EXTENT), (EXTENT, -EXTENT), (-EXTENT, EXTENT), (EXTENT, EXTENT)] {
        let cz = terrain_height(cx, cy);
        let mut corners = Vec::with_capacity(8);
        for z in [cz, cz + pillar_height] {
            corners.extend([
                [cx - half, cy - half, z],
                [cx + half, cy - half, z],
                [cx + half, cy + half, z],
                [cx - half, cy + half, z],
            ]);
        }
        builder.push_part(&corners, &PILLAR_FACES);
    }

    info!("step 3/{STEPS}: north arrow");
    let segments = 20;
    let (arrow_radius, arrow_height) = (2.0f32, 3.0f32);
    let base_z = terrain_height(grid_x(width / 2), grid_y(height / 2));
    let center = builder.push_vertex(0.0, 0.0, base_z);
    let rim: Vec<usize> = (0..segments)
        .map(|i| {
            let theta = TAU * i as f32 / segments as f32;
            builder.push_vertex(arrow_radius * theta.cos(), arrow_radius * theta.sin(), base_z)
        })
        .collect();
    let tip = builder.push_vertex(0.0, arrow_radius * 2.0, base_z + arrow_height);
    for i in 0..segments {
        builder.faces.push([center, rim[i], rim[(i + 1) % segments]]);
    }
    for i in 0..segments {
        builder.faces.push([tip, rim[i], rim[(i + 1) % segments]]);
    }

    info!("step 4/{STEPS}: axis strips");
    let (strip_half, lift, reach) = (0.3, 0.5, 9.5);
    let mid_y = grid_y(height / 2);
    let mid_x = grid_x(width / 2);
    let (west, east) = (
        terrain_height(-EXTENT, mid_y) + lift,
        terrain_height(EXTENT, mid_y) + lift,
    );
    builder.push_cell(
        [-reach, -strip_half, west],
        [-reach, strip_half, west],
        [reach, -strip_half, east],
        [reach, strip_half, east],
    );
    let (south, north) = (
        terrain_height(mid_x, -EXTENT) + lift,
        terrain_height(mid_x, EXTENT) + lift,
    );
    builder.push_cell(
        [-strip_half, -reach, south],
        [strip_half, -reach, south],
        [-strip_half, reach, north],
        [strip_half, reach, north],
    );

    info!(triangles = builder.face_count(), "step 5/{STEPS}: assembling facets");
    builder.into_mesh("oriented_terrain")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cone_feature_counts() {
        // Base resolution 3: cone 6, spikes 18, no arrows, no budget left for a spiral
        let mesh = directional_cone(0);
        assert_eq!(mesh.triangle_count(), 24);
        assert_eq!(mesh.name, "directional_cone");
    }

    #[test]
    fn test_cone_approaches_target() {
        let target = 20_000;
        let mesh = directional_cone(target);
        let count = mesh.triangle_count() as f64;
        assert!(count > target as f64 * 0.8, "{count}");
        assert!(count < target as f64 * 1.2, "{count}");
    }

    #[test]
    fn test_cone_spike_reaches_along_x() {
        let mesh = directional_cone(100);
        let max_x = mesh
            .triangles
            .iter()
            .flat_map(|t| t.vertices.iter())
            .map(|v| v.x)
            .fold(f32::MIN, f32::max);
        assert!((max_x - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_terrain_counts() {
        let (w, h) = (10, 7);
        let mesh = oriented_terrain(w, h);
        let grid = 2 * (w - 1) * (h - 1);
        let expected = grid + 4 * 12 + 2 * 20 + 2 * 2;
        assert_eq!(mesh.triangle_count(), expected);
    }

    #[test]
    fn test_terrain_clamps_dimensions() {
        let mesh = oriented_terrain(0, 1);
        assert_eq!(mesh.triangle_count(), 2 + 48 + 40 + 4);
    }

    #[test]
    fn test_terrain_rises_north() {
        assert!(terrain_height(0.0, 10.0) > terrain_height(0.0, -10.0));
    }
}
