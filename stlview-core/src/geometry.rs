/// Geometry primitives for STL meshes
use nalgebra::{Point3, Vector3};

/// Solid name used when a file carries none, or an empty one
pub const DEFAULT_SOLID_NAME: &str = "Unnamed";

/// One facet: a normal vector and three vertex positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub normal: Vector3<f32>,
    pub vertices: [Point3<f32>; 3],
}

impl Triangle {
    pub fn new(normal: Vector3<f32>, v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        Self {
            normal,
            vertices: [v0, v1, v2],
        }
    }

    /// Build a triangle whose normal is derived from its winding
    pub fn from_vertices(v0: Point3<f32>, v1: Point3<f32>, v2: Point3<f32>) -> Self {
        let mut triangle = Self::new(Vector3::zeros(), v0, v1, v2);
        triangle.normal = triangle.calculate_normal();
        triangle
    }

    /// Calculate the unit face normal from the triangle's vertices.
    ///
    /// Degenerate triangles yield the zero vector.
    pub fn calculate_normal(&self) -> Vector3<f32> {
        let v0 = self.vertices[0];
        let v1 = self.vertices[1];
        let v2 = self.vertices[2];

        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        edge1
            .cross(&edge2)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }
}

/// A parsed STL solid: a name and its facets in file order
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            name: DEFAULT_SOLID_NAME.to_string(),
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn named(name: &str) -> Self {
        let mut mesh = Self::new();
        mesh.set_name(name);
        mesh
    }

    /// Set the solid name, falling back to the placeholder for blank input
    pub fn set_name(&mut self, name: &str) {
        let name = name.trim();
        self.name = if name.is_empty() {
            DEFAULT_SOLID_NAME.to_string()
        } else {
            name.to_string()
        };
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Create a simple cube mesh for testing
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        let corner = |x: f32, y: f32, z: f32| Point3::new(x * h, y * h, z * h);
        // Two counter-clockwise triangles per face, viewed from outside
        let quads = [
            // Front
            [(-1., -1., 1.), (1., -1., 1.), (1., 1., 1.), (-1., 1., 1.)],
            // Back
            [(1., -1., -1.), (-1., -1., -1.), (-1., 1., -1.), (1., 1., -1.)],
            // Top
            [(-1., 1., 1.), (1., 1., 1.), (1., 1., -1.), (-1., 1., -1.)],
            // Bottom
            [(-1., -1., -1.), (1., -1., -1.), (1., -1., 1.), (-1., -1., 1.)],
            // Right
            [(1., -1., 1.), (1., -1., -1.), (1., 1., -1.), (1., 1., 1.)],
            // Left
            [(-1., -1., -1.), (-1., -1., 1.), (-1., 1., 1.), (-1., 1., -1.)],
        ];

        let mut mesh = Self::with_capacity(12);
        mesh.set_name("cube");
        for [a, b, c, d] in quads {
            let (a, b, c, d) = (
                corner(a.0, a.1, a.2),
                corner(b.0, b.1, b.2),
                corner(c.0, c.1, c.2),
                corner(d.0, d.1, d.2),
            );
            mesh.add_triangle(Triangle::from_vertices(a, b, c));
            mesh.add_triangle(Triangle::from_vertices(a, c, d));
        }

        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name() {
        assert_eq!(Mesh::new().name, DEFAULT_SOLID_NAME);
        assert_eq!(Mesh::named("   ").name, DEFAULT_SOLID_NAME);
        assert_eq!(Mesh::named(" part ").name, "part");
    }

    #[test]
    fn test_calculate_normal() {
        let t = Triangle::from_vertices(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert!((t.normal - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_degenerate_normal_is_zero() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let t = Triangle::from_vertices(p, p, p);
        assert_eq!(t.normal, Vector3::zeros());
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.triangle_count(), 12);
        for triangle in &cube.triangles {
            let centroid = (triangle.vertices[0].coords
                + triangle.vertices[1].coords
                + triangle.vertices[2].coords)
                / 3.0;
            assert!(triangle.normal.dot(&centroid) > 0.0);
        }
    }
}
