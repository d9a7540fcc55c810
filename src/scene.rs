use three_d::*;


/// Icosahedron mesh tessellated for the sketch.
///
/// Unindexed triangle soup so every vertex can carry its own barycentric
/// coordinate; flat f32 arrays ready for GL buffer upload.
pub struct IcoMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub barycentric: Vec<f32>,
    pub vertex_count: usize,
}

impl IcoMesh {
    /// Builds an icosphere of the given radius with `subdivisions` rounds
    /// of 4-way face splits projected back onto the sphere.
    pub fn new(radius: f32, subdivisions: u32) -> Self {
        let mut faces = base_icosahedron();
        for _ in 0..subdivisions {
            faces = subdivide(&faces);
        }

        let mut positions = Vec::with_capacity(faces.len() * 9);
        let mut normals = Vec::with_capacity(faces.len() * 9);
        let mut barycentric = Vec::with_capacity(faces.len() * 9);

        for face in faces.iter() {
            for corner in face.iter() {
                let n = corner.normalize();
                let p = n * radius;
                positions.extend_from_slice(&[p.x, p.y, p.z]);
                normals.extend_from_slice(&[n.x, n.y, n.z]);
            }
            barycentric.extend_from_slice(&[
                0.0, 0.0, 1.0,
                0.0, 1.0, 0.0,
                1.0, 0.0, 0.0,
            ]);
        }

        let vertex_count = faces.len() * 3;
        Self { positions, normals, barycentric, vertex_count }
    }
}


/// The 20 faces of a unit-scale icosahedron from three golden-ratio
/// rectangles. Vertices are not yet normalized.
fn base_icosahedron() -> Vec<[Vec3; 3]> {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;

    let v = [
        vec3(-1.0,  t,  0.0),
        vec3( 1.0,  t,  0.0),
        vec3(-1.0, -t,  0.0),
        vec3( 1.0, -t,  0.0),
        vec3( 0.0, -1.0,  t),
        vec3( 0.0,  1.0,  t),
        vec3( 0.0, -1.0, -t),
        vec3( 0.0,  1.0, -t),
        vec3(  t,  0.0, -1.0),
        vec3(  t,  0.0,  1.0),
        vec3( -t,  0.0, -1.0),
        vec3( -t,  0.0,  1.0),
    ];

    const FACES: [[usize; 3]; 20] = [
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    FACES
        .iter()
        .map(|[a, b, c]| [v[*a], v[*b], v[*c]])
        .collect()
}


/// Splits each face into four via edge midpoints.
fn subdivide(faces: &[[Vec3; 3]]) -> Vec<[Vec3; 3]> {
    let mut out = Vec::with_capacity(faces.len() * 4);
    for [a, b, c] in faces.iter() {
        let ab = (a + b) * 0.5;
        let bc = (b + c) * 0.5;
        let ca = (c + a) * 0.5;
        out.push([*a, ab, ca]);
        out.push([*b, bc, ab]);
        out.push([*c, ca, bc]);
        out.push([ab, bc, ca]);
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_count_grows_four_fold_per_subdivision() {
        for s in 0..3 {
            let mesh = IcoMesh::new(1.0, s);
            let expected = 20 * 4_usize.pow(s) * 3;
            assert_eq!(mesh.vertex_count, expected);
            assert_eq!(mesh.positions.len(), expected * 3);
            assert_eq!(mesh.normals.len(), expected * 3);
            assert_eq!(mesh.barycentric.len(), expected * 3);
        }
    }

    #[test]
    fn test_all_vertices_lie_on_the_sphere() {
        let radius = 1.001;
        let mesh = IcoMesh::new(radius, 1);
        for p in mesh.positions.chunks_exact(3) {
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((r - radius).abs() < 1e-4);
        }
    }

    #[test]
    fn test_normals_are_unit_and_radial() {
        let mesh = IcoMesh::new(2.0, 1);
        for (p, n) in mesh
            .positions
            .chunks_exact(3)
            .zip(mesh.normals.chunks_exact(3))
        {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4);
            // radial: position is the normal scaled by the radius
            assert!((p[0] - n[0] * 2.0).abs() < 1e-4);
            assert!((p[1] - n[1] * 2.0).abs() < 1e-4);
            assert!((p[2] - n[2] * 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_barycentric_corners_cycle_per_triangle() {
        let mesh = IcoMesh::new(1.0, 0);
        for triangle in mesh.barycentric.chunks_exact(9) {
            assert_eq!(triangle, &[0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
        }
    }
}
