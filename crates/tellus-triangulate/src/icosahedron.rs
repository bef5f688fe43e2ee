//! The base icosahedron: 12 vertices, 20 faces, scaled to a planet radius.

use glam::Vec3;

/// Number of faces of the base icosahedron.
pub const FACE_COUNT: usize = 20;

/// Triangle indices into the vertex table, wound counter-clockwise seen
/// from outside the sphere.
const FACES: [[usize; 3]; FACE_COUNT] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// The 12 icosahedron vertices, projected onto a sphere of the given radius.
pub fn vertices(radius: f32) -> [Vec3; 12] {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;

    let mut positions = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];

    for p in &mut positions {
        *p = p.normalize() * radius;
    }
    positions
}

/// The 20 base faces as corner triples on a sphere of the given radius.
pub fn base_faces(radius: f32) -> [[Vec3; 3]; FACE_COUNT] {
    let verts = vertices(radius);
    FACES.map(|[a, b, c]| [verts[a], verts[b], verts[c]])
}

/// Edge length of the base icosahedron at the given radius. Seeds the
/// level-0 entry of the split-distance LUT.
pub fn edge_length(radius: f32) -> f32 {
    let verts = vertices(radius);
    verts[0].distance(verts[11])
}
