//! Static meshes for the lit passes.
//!
//! Everything here is built once at startup on the CPU and uploaded as plain
//! vertex and index buffers. Front faces are counter-clockwise.

use std::f32::consts::{FRAC_PI_2, PI};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }

    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Indexed triangle list.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3, uvs: [Vec2; 4]) {
        let base = self.vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(uvs) {
            self.vertices.push(Vertex::new(corner, normal, uv));
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.vertices.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), v| {
                let p = Vec3::from_array(v.position);
                (lo.min(p), hi.max(p))
            },
        )
    }

    /// Translate so the bounding box is centered on the origin.
    pub fn center(&mut self) {
        let (lo, hi) = self.bounds();
        let offset = (lo + hi) * 0.5;
        for v in &mut self.vertices {
            v.position = (Vec3::from_array(v.position) - offset).to_array();
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// UV sphere with poles on ±y.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Mesh {
    let mut mesh = Mesh::default();
    let row = width_segments + 1;

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let normal = Vec3::new(
                -(u * 2.0 * PI).cos() * (v * PI).sin(),
                (v * PI).cos(),
                (u * 2.0 * PI).sin() * (v * PI).sin(),
            );
            mesh.vertices
                .push(Vertex::new(normal * radius, normal, Vec2::new(u, v)));
        }
    }

    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;
            // The pole rows collapse to a single triangle.
            if iy != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

/// Box centered on the origin with the given full extents.
pub fn cuboid(size: Vec3) -> Mesh {
    let half = size * 0.5;
    let mut mesh = Mesh::default();
    // (normal, u, v) with u × v = normal.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    for (normal, u, v) in faces {
        let center = normal * half;
        let hu = u * half;
        let hv = v * half;
        mesh.push_quad(
            [
                center - hu - hv,
                center + hu - hv,
                center + hu + hv,
                center - hu + hv,
            ],
            normal,
            QUAD_UVS,
        );
    }
    mesh
}

/// Plane in the xy plane facing +z. Texture row 0 is at the top edge.
pub fn plane(width: f32, height: f32) -> Mesh {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let mut mesh = Mesh::default();
    mesh.push_quad(
        [
            Vec3::new(-hw, -hh, 0.0),
            Vec3::new(hw, -hh, 0.0),
            Vec3::new(hw, hh, 0.0),
            Vec3::new(-hw, hh, 0.0),
        ],
        Vec3::Z,
        QUAD_UVS,
    );
    mesh
}

const QUAD_UVS: [Vec2; 4] = [
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 0.0),
];

/// Extrusion of a closed outline along +z with a rounded bevel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrude {
    pub depth: f32,
    pub bevel_thickness: f32,
    pub bevel_size: f32,
    pub bevel_segments: u32,
}

/// Extrude a counter-clockwise, star-shaped outline.
///
/// Faces are flat shaded. Caps are fanned from the outline's origin, so
/// every outline vertex must be visible from there.
pub fn extrude(outline: &[Vec2], settings: &Extrude) -> Mesh {
    let mut mesh = Mesh::default();
    if outline.len() < 3 {
        return mesh;
    }

    let miters: Vec<Vec2> = (0..outline.len()).map(|i| bevel_direction(outline, i)).collect();
    let ring = |z: f32, offset: f32| -> Vec<Vec3> {
        outline
            .iter()
            .zip(&miters)
            .map(|(p, m)| (*p + *m * offset).extend(z))
            .collect()
    };

    // Back bevel, straight wall, front bevel.
    let segments = settings.bevel_segments.max(1);
    let mut rings = Vec::new();
    for s in 0..=segments {
        let t = s as f32 / segments as f32;
        let z = settings.bevel_thickness * (t * FRAC_PI_2).cos();
        let offset = settings.bevel_size * (t * FRAC_PI_2).sin();
        rings.push(ring(-z, offset));
    }
    for s in 0..=segments {
        let t = s as f32 / segments as f32;
        let z = settings.bevel_thickness * (t * FRAC_PI_2).sin();
        let offset = settings.bevel_size * (t * FRAC_PI_2).cos();
        rings.push(ring(settings.depth + z, offset));
    }

    let n = outline.len();
    for pair in rings.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        for i in 0..n {
            let j = (i + 1) % n;
            let (a, b, c, d) = (lower[i], lower[j], upper[j], upper[i]);
            let normal = (b - a).cross(c - a).try_normalize().unwrap_or_else(|| {
                (c - a).cross(d - a).normalize_or_zero()
            });
            mesh.push_quad([a, b, c, d], normal, [a.truncate(), b.truncate(), c.truncate(), d.truncate()]);
        }
    }

    let back = rings.first().map(|r| r[0].z).unwrap_or(0.0);
    let front = rings.last().map(|r| r[0].z).unwrap_or(0.0);
    push_cap(&mut mesh, outline, front, Vec3::Z);
    push_cap(&mut mesh, outline, back, Vec3::NEG_Z);

    mesh
}

fn push_cap(mesh: &mut Mesh, outline: &[Vec2], z: f32, normal: Vec3) {
    let center = mesh.vertices.len() as u32;
    mesh.vertices.push(Vertex::new(Vec3::new(0.0, 0.0, z), normal, Vec2::ZERO));
    for p in outline {
        mesh.vertices.push(Vertex::new(p.extend(z), normal, *p));
    }
    let n = outline.len() as u32;
    for i in 0..n {
        let a = center + 1 + i;
        let b = center + 1 + (i + 1) % n;
        if normal.z > 0.0 {
            mesh.indices.extend_from_slice(&[center, a, b]);
        } else {
            mesh.indices.extend_from_slice(&[center, b, a]);
        }
    }
}

/// Outward miter at vertex `i`, limited to length √2 at sharp tips.
fn bevel_direction(outline: &[Vec2], i: usize) -> Vec2 {
    let n = outline.len();
    let prev = outline[(i + n - 1) % n];
    let cur = outline[i];
    let next = outline[(i + 1) % n];

    let outward = |d: Vec2| Vec2::new(d.y, -d.x).normalize_or_zero();
    let n1 = outward(cur - prev);
    let n2 = outward(next - cur);
    let denom = 1.0 + n1.dot(n2);
    if denom < 1e-4 {
        return n1;
    }
    let miter = (n1 + n2) / denom;
    let limit = std::f32::consts::SQRT_2;
    if miter.length() > limit {
        miter.normalize() * limit
    } else {
        miter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::star_outline;

    /// Every triangle's winding agrees with its stored normals.
    fn assert_consistent_winding(mesh: &Mesh) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let pa = Vec3::from_array(a.position);
            let face = (Vec3::from_array(b.position) - pa).cross(Vec3::from_array(c.position) - pa);
            if face.length() < 1e-9 {
                continue;
            }
            assert!(face.dot(Vec3::from_array(a.normal)) > 0.0, "triangle {:?} faces inward", tri);
        }
    }

    #[test]
    fn test_vertex_stride() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_sphere_counts_and_radius() {
        let mesh = sphere(1.0, 32, 32);
        assert_eq!(mesh.vertices.len(), 33 * 33);
        assert_eq!(mesh.indices.len(), 32 * 62 * 3);
        for v in &mesh.vertices {
            assert!((Vec3::from_array(v.position).length() - 1.0).abs() < 1e-5);
        }
        assert_consistent_winding(&mesh);
    }

    #[test]
    fn test_cuboid_extents() {
        let mesh = cuboid(Vec3::new(0.15, 0.02, 0.4));
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.index_count(), 36);
        let (lo, hi) = mesh.bounds();
        assert!((hi - lo - Vec3::new(0.15, 0.02, 0.4)).length() < 1e-6);
        assert_consistent_winding(&mesh);
    }

    #[test]
    fn test_plane_faces_forward() {
        let mesh = plane(1.0, 1.0);
        assert_consistent_winding(&mesh);
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        // Top edge samples the first texture row.
        let top = mesh.vertices.iter().find(|v| v.position[1] > 0.0).unwrap();
        assert_eq!(top.uv[1], 0.0);
    }

    #[test]
    fn test_extruded_star() {
        let settings = Extrude {
            depth: 0.02,
            bevel_thickness: 0.05,
            bevel_size: 0.05,
            bevel_segments: 2,
        };
        let mut mesh = extrude(&star_outline(), &settings);
        mesh.center();

        let (lo, hi) = mesh.bounds();
        assert!(((lo + hi) * 0.5).length() < 1e-5);
        assert!((hi.z - lo.z - 0.12).abs() < 1e-5);
        // The bevel grows the silhouette past the outer radius.
        assert!(hi.y - lo.y > 1.2 + 1.2 * (PI / 5.0).cos());
        assert_consistent_winding(&mesh);
    }

    #[test]
    fn test_bevel_direction_is_outward() {
        let outline = star_outline();
        for i in 0..outline.len() {
            let m = bevel_direction(&outline, i);
            assert!(m.dot(outline[i]) > 0.0);
            assert!(m.length() <= std::f32::consts::SQRT_2 + 1e-5);
        }
    }
}
