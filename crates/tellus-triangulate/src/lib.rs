//! Adaptive sphere triangulation: subdivides a base icosahedron per frame
//! into a camera-dependent set of leaf triangles, each of which is rendered
//! as one instance of a fixed-resolution patch grid.

mod icosahedron;
mod lut;
mod triangulator;

pub use icosahedron::{FACE_COUNT, base_faces, edge_length, vertices};
pub use triangulator::{PatchInstance, Triangulator};
