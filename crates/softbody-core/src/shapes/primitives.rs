use std::collections::HashMap;

use glam::Vec3;

/// Golden ratio, the icosahedron's long-axis coordinate.
const PHI: f32 = 1.618_034;

const ICOSAHEDRON_FACES: [[u32; 3]; 20] = [
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

/// Geodesic sphere from a subdivided icosahedron.
///
/// Vertex counts: 12, 42, 162, 642 for 0..=3 subdivisions.
pub fn icosphere(center: Vec3, radius: f32, subdivisions: u32) -> (Vec<Vec3>, Vec<u32>) {
    let mut unit: Vec<Vec3> = [
        (-1.0, PHI, 0.0),
        (1.0, PHI, 0.0),
        (-1.0, -PHI, 0.0),
        (1.0, -PHI, 0.0),
        (0.0, -1.0, PHI),
        (0.0, 1.0, PHI),
        (0.0, -1.0, -PHI),
        (0.0, 1.0, -PHI),
        (PHI, 0.0, -1.0),
        (PHI, 0.0, 1.0),
        (-PHI, 0.0, -1.0),
        (-PHI, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
    .collect();
    let mut faces: Vec<[u32; 3]> = ICOSAHEDRON_FACES.to_vec();

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, verts: &mut Vec<Vec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let m = ((verts[a as usize] + verts[b as usize]) * 0.5).normalize();
                verts.push(m);
                verts.len() as u32 - 1
            })
        };

        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(a, b, &mut unit);
            let bc = midpoint(b, c, &mut unit);
            let ca = midpoint(c, a, &mut unit);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }

    let vertices = unit.into_iter().map(|v| center + v * radius).collect();
    let triangles = faces.into_iter().flatten().collect();
    (vertices, triangles)
}

/// Axis-aligned box with 8 corners and 12 triangles.
pub fn box_mesh(center: Vec3, half_extents: Vec3) -> (Vec<Vec3>, Vec<u32>) {
    // Corner i has +x when bit 0 is set, +y for bit 1, +z for bit 2.
    let vertices = (0..8u32)
        .map(|i| {
            let sign = Vec3::new(
                if i & 1 != 0 { 1.0 } else { -1.0 },
                if i & 2 != 0 { 1.0 } else { -1.0 },
                if i & 4 != 0 { 1.0 } else { -1.0 },
            );
            center + sign * half_extents
        })
        .collect();
    let triangles = vec![
        0, 2, 3, 0, 3, 1, // -z
        4, 5, 7, 4, 7, 6, // +z
        0, 4, 6, 0, 6, 2, // -x
        1, 3, 7, 1, 7, 5, // +x
        0, 1, 5, 0, 5, 4, // -y
        2, 6, 7, 2, 7, 3, // +y
    ];
    (vertices, triangles)
}

/// Regular tetrahedron inscribed in a sphere of `radius`.
pub fn tetrahedron(center: Vec3, radius: f32) -> (Vec<Vec3>, Vec<u32>) {
    let vertices = [
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
    ]
    .iter()
    .map(|&v| center + v.normalize() * radius)
    .collect();
    let triangles = vec![0, 1, 2, 0, 3, 1, 0, 2, 3, 1, 3, 2];
    (vertices, triangles)
}
