//! Polygon triangulation and normal generation for decoded faces.
//!
//! Polygons are split as a fan around their first vertex. That is exact for
//! convex polygons; non-convex or self-intersecting faces come out with
//! overlapping or inverted triangles.

use glam::Vec3;
use tracing::debug;

/// Append the fan triangulation of `face` to `out`.
///
/// A face of N >= 3 indices yields N-2 triangles `(0, i, i+1)` for `i` in
/// `1..N-1`, in ascending order. Faces with fewer than three indices emit
/// nothing. Returns the number of triangles written.
pub fn fan_triangulate(face: &[u32], out: &mut Vec<u32>) -> usize {
    if face.len() < 3 {
        return 0;
    }
    let first = face[0];
    out.reserve((face.len() - 2) * 3);
    for pair in face[1..].windows(2) {
        out.extend_from_slice(&[first, pair[0], pair[1]]);
    }
    face.len() - 2
}

/// Area-weighted vertex normals for a triangle list.
///
/// Vertices not referenced by any triangle, or only by zero-area triangles,
/// get a zero normal.
pub fn compute_vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (Some(p0), Some(p1), Some(p2)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };
        let p0 = Vec3::from_array(*p0);
        // Unnormalized cross product weights by twice the triangle area.
        let n = (Vec3::from_array(*p1) - p0).cross(Vec3::from_array(*p2) - p0);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }

    for n in &mut normals {
        *n = n.normalize_or_zero();
    }

    debug!(
        "Computed normals for {} vertices from {} triangles",
        positions.len(),
        indices.len() / 3
    );
    normals
}
