/// Renderer-facing views of a mesh: bounds, flat buffers, canonical cameras
use nalgebra::{Matrix4, Point3, Vector3};

use crate::geometry::Mesh;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Bounds {
    /// Bounds of every vertex in the mesh, or `None` for an empty mesh
    pub fn from_mesh(mesh: &Mesh) -> Option<Self> {
        let mut points = mesh.triangles.iter().flat_map(|t| t.vertices.iter());
        let first = *points.next()?;
        Some(points.fold(Self { min: first, max: first }, |b, p| Self {
            min: b.min.inf(p),
            max: b.max.sup(p),
        }))
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Radius of the sphere through the box corners
    pub fn radius(&self) -> f32 {
        self.size().norm() / 2.0
    }
}

/// Flat vertex/index buffers, one vertex per facet corner
#[derive(Debug, Clone, Default)]
pub struct RenderBuffers {
    /// xyz triples
    pub positions: Vec<f32>,
    /// xyz triples, the facet normal repeated for each corner
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
}

impl RenderBuffers {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let corners = mesh.triangle_count() * 3;
        let mut buffers = Self {
            positions: Vec::with_capacity(corners * 3),
            normals: Vec::with_capacity(corners * 3),
            indices: Vec::with_capacity(corners),
        };
        for triangle in &mesh.triangles {
            for vertex in &triangle.vertices {
                // Index range exceeds u32 only past ~1.4 billion facets
                buffers.indices.push(buffers.indices.len() as u32);
                buffers.positions.extend_from_slice(vertex.coords.as_slice());
                buffers.normals.extend_from_slice(triangle.normal.as_slice());
            }
        }
        buffers
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// The six canonical inspection viewpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Viewpoint {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
}

impl Viewpoint {
    pub const ALL: [Viewpoint; 6] = [
        Viewpoint::Front,
        Viewpoint::Back,
        Viewpoint::Left,
        Viewpoint::Right,
        Viewpoint::Top,
        Viewpoint::Bottom,
    ];

    /// Unit vector from the target towards the eye
    pub fn direction(&self) -> Vector3<f32> {
        match self {
            Viewpoint::Front => Vector3::z(),
            Viewpoint::Back => -Vector3::z(),
            Viewpoint::Left => -Vector3::x(),
            Viewpoint::Right => Vector3::x(),
            Viewpoint::Top => Vector3::y(),
            Viewpoint::Bottom => -Vector3::y(),
        }
    }

    /// Camera up vector; never parallel to [`Viewpoint::direction`]
    pub fn up(&self) -> Vector3<f32> {
        match self {
            Viewpoint::Top => -Vector3::z(),
            Viewpoint::Bottom => Vector3::z(),
            _ => Vector3::y(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Viewpoint::Front => "front",
            Viewpoint::Back => "back",
            Viewpoint::Left => "left",
            Viewpoint::Right => "right",
            Viewpoint::Top => "top",
            Viewpoint::Bottom => "bottom",
        }
    }
}

/// Perspective camera configuration
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Frame `bounds` from `viewpoint`, far enough back that the bounding
    /// sphere fits the vertical field of view
    pub fn framing(bounds: &Bounds, viewpoint: Viewpoint, aspect: f32) -> Self {
        let fov = std::f32::consts::PI / 4.0;
        let radius = bounds.radius().max(f32::EPSILON);
        let distance = radius / (fov / 2.0).sin();
        let target = bounds.center();

        Self {
            position: target + viewpoint.direction() * distance,
            target,
            up: viewpoint.up(),
            fov,
            aspect,
            near: (distance - radius).max(distance * 0.01),
            far: distance + radius,
        }
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Create the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    /// Combined model-view-projection matrix
    pub fn mvp_matrix(&self, model: &Matrix4<f32>) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix() * model
    }
}
