//! The triangular reference grid and the CPU side of the morph blend.
//!
//! The grid lives in barycentric-style `(u, v)` space with `u + v <= 1`.
//! Each vertex carries a morph offset pointing at the neighboring vertex
//! that survives at the next-coarser tessellation; blending toward it
//! collapses the fine tessellation onto the coarse one, which is what
//! hides the seam between adjacent patches of different levels.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use tellus_triangulate::PatchInstance;

/// One reference-grid vertex: a `(u, v)` position and the offset to its
/// morph target at the next-coarser tessellation.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PatchVertex {
    pub pos: [f32; 2],
    pub morph: [f32; 2],
}

/// The reference grid mesh. Generated once; topology never changes.
pub struct PatchGrid {
    levels: u32,
    vertices: Vec<PatchVertex>,
    indices: Vec<u32>,
}

impl PatchGrid {
    /// Build a grid with `2^levels` rows of triangles per edge.
    pub fn generate(levels: u32) -> Self {
        let rows = 2_u32.pow(levels) + 1;
        let delta = 1.0 / (rows - 1) as f32;

        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        let mut row_start = 0_u32;
        for row in 0..rows {
            let cols = rows - row;
            let next_start = row_start + cols;

            for col in 0..cols {
                let pos = [col as f32 * delta, row as f32 * delta];

                // Odd vertices morph onto the even neighbor that survives
                // at the coarser tessellation; even/even vertices are
                // shared with it and do not move.
                let morph = match (row % 2, col % 2) {
                    (0, 1) => [-delta, 0.0],
                    (1, 0) => [0.0, delta],
                    (1, 1) => [delta, -delta],
                    _ => [0.0, 0.0],
                };
                vertices.push(PatchVertex { pos, morph });

                if row < rows - 1 && col < cols - 1 {
                    indices.extend_from_slice(&[
                        row_start + col,
                        next_start + col,
                        row_start + col + 1,
                    ]);
                    if col < cols - 2 {
                        indices.extend_from_slice(&[
                            next_start + col,
                            next_start + col + 1,
                            row_start + col + 1,
                        ]);
                    }
                }
            }
            row_start = next_start;
        }

        Self {
            levels,
            vertices,
            indices,
        }
    }

    /// Subdivision levels of the reference grid.
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Grid step in `(u, v)` space.
    pub fn delta(&self) -> f32 {
        1.0 / 2_u32.pow(self.levels) as f32
    }

    pub fn vertices(&self) -> &[PatchVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Blend a vertex toward its coarser-level target. Factor 0 is the full
/// fine tessellation; factor 1 collapses onto the coarse one.
pub fn morphed_uv(vertex: &PatchVertex, factor: f32) -> Vec2 {
    Vec2::from(vertex.pos) + Vec2::from(vertex.morph) * factor.clamp(0.0, 1.0)
}

/// Map a grid `(u, v)` point through a leaf instance onto the sphere.
///
/// Mirrors the vertex shader: affine map onto the leaf triangle's plane,
/// then renormalization onto the sphere of the given radius. Displacement
/// on top of this is the shader's concern.
pub fn instance_surface_position(instance: &PatchInstance, uv: Vec2, radius: f32) -> Vec3 {
    let flat = instance.origin() + instance.edge_r() * uv.x + instance.edge_s() * uv.y;
    flat.normalize_or_zero() * radius
}

/// The morph blend factor as the vertex shader computes it.
///
/// `distances[level]` is the camera distance below which a level-`level`
/// triangle splits. A leaf lives between `distances[level]` (near end)
/// and `distances[level - 1]` (far end, where it merges back into its
/// parent); the factor ramps from 0 to 1 over the last `morph_range`
/// fraction of that interval. Level 0 has no coarser level and never
/// morphs.
pub fn morph_factor(distance: f32, level: u32, distances: &[f32], morph_range: f32) -> f32 {
    if level == 0 {
        return 0.0;
    }
    let low = distances[level as usize - 1];
    let high = distances[level as usize];
    let a = (distance - low) / (high - low);
    1.0 - (a / morph_range).clamp(0.0, 1.0)
}
