//! The reusable patch: one fixed-resolution triangular reference grid,
//! stamped onto every triangulator leaf via GPU instancing, with per-vertex
//! morph offsets that stitch neighboring subdivision levels seamlessly.

mod grid;
mod renderer;

pub use grid::{PatchGrid, PatchVertex, instance_surface_position, morph_factor, morphed_uv};
pub use renderer::{MAX_LUT_LEVELS, PatchRenderer, PatchUniforms};
