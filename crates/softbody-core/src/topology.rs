//! Mesh to particle/constraint conversion.
//!
//! Builds the simulation network once from an indexed triangle mesh:
//!
//! - every unique edge becomes a structural distance constraint,
//! - every pair of triangles sharing an edge links its two wing vertices with
//!   a shear/bend distance constraint,
//! - volume preservation is added per [`VolumeMode`]; flat faces get no
//!   centre tetrahedron,
//! - every particle gets a shape-memory constraint when enabled.
//!
//! Constraint order is deterministic: triangles are walked in index order and
//! edges are recorded the first time they are seen.

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use tracing::error;

use crate::config::{MassDistribution, SoftBodyConfig, VolumeMode};
use crate::constraints::Constraint;
use crate::error::{Result, SoftBodyError};
use crate::math::{is_finite_vec, tetrahedron_volume, MIN_REST_VOLUME};
use crate::particle::ParticleSet;

/// Centre tetrahedra smaller than this fraction of the mean are skipped.
const DEGENERATE_TETRA_FRACTION: f32 = 1.0e-3;

/// An edge with the triangles that contain it.
struct EdgeRecord {
    v0: u32,
    v1: u32,
    triangles: Vec<u32>,
}

/// Particles and constraints built from a mesh.
pub struct Topology {
    pub particles: ParticleSet,
    pub constraints: Vec<Constraint>,
    /// Number of input vertices. Particles at or past this index are interior helpers.
    pub vertex_count: usize,
}

/// Reject meshes the solver cannot be built from.
pub fn validate_mesh(vertices: &[Vec3], triangles: &[u32], total_mass: f32) -> Result<()> {
    if vertices.is_empty() {
        return Err(SoftBodyError::EmptyMesh);
    }
    if triangles.len() % 3 != 0 {
        return Err(SoftBodyError::MalformedTriangles {
            len: triangles.len(),
        });
    }
    if let Some(&index) = triangles.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(SoftBodyError::VertexOutOfBounds {
            index,
            vertex_count: vertices.len(),
        });
    }
    if let Some(index) = vertices.iter().position(|&v| !is_finite_vec(v)) {
        return Err(SoftBodyError::NonFiniteVertex { index });
    }
    if !(total_mass.is_finite() && total_mass > 0.0) {
        return Err(SoftBodyError::InvalidMass(total_mass));
    }
    Ok(())
}

/// Build particles and constraints for a mesh.
pub fn build(
    vertices: &[Vec3],
    triangles: &[u32],
    total_mass: f32,
    config: &SoftBodyConfig,
) -> Result<Topology> {
    if let Err(e) = validate_mesh(vertices, triangles, total_mass) {
        error!(error = %e, "rejecting soft body mesh");
        return Err(e);
    }

    let vertex_count = vertices.len();
    let centroid = vertices.iter().copied().sum::<Vec3>() / vertex_count as f32;

    let tetra_faces = if config.volume_mode == VolumeMode::CenterTetrahedra {
        solid_faces(vertices, triangles, centroid)
    } else {
        Vec::new()
    };
    let add_center = !tetra_faces.is_empty();
    let mut positions = vertices.to_vec();
    let center_index = if add_center {
        positions.push(centroid);
        Some(vertex_count)
    } else {
        None
    };

    let masses = distribute_mass(
        &positions,
        triangles,
        centroid,
        total_mass,
        config.mass_distribution,
        center_index,
    );
    let mut particles = ParticleSet::from_positions(&positions, 1.0);
    for (i, &m) in masses.iter().enumerate() {
        particles.set_mass(i, m);
    }

    let fracture = &config.fracture;
    let edges = collect_edges(triangles);
    let mut constraints = Vec::new();
    let mut linked: HashSet<(u32, u32)> = HashSet::new();

    // Structural edges
    for e in &edges {
        linked.insert((e.v0, e.v1));
        let mut c = Constraint::distance(&particles, e.v0, e.v1, config.structural_compliance)
            .with_stiffness(config.stiffness);
        if fracture.enabled {
            c = c.breakable(fracture.max_strain);
        }
        constraints.push(c);
    }

    // Shear/bend links across adjacent triangle pairs
    for e in &edges {
        if e.triangles.len() != 2 {
            continue;
        }
        let wing_a = wing_vertex(triangles, e.triangles[0], e.v0, e.v1);
        let wing_b = wing_vertex(triangles, e.triangles[1], e.v0, e.v1);
        let (Some(wa), Some(wb)) = (wing_a, wing_b) else {
            continue;
        };
        if wa == wb {
            continue;
        }
        let key = (wa.min(wb), wa.max(wb));
        if !linked.insert(key) {
            continue;
        }
        let mut c = Constraint::distance(&particles, key.0, key.1, config.shear_compliance)
            .with_stiffness(config.stiffness);
        if fracture.enabled {
            c = c.breakable(fracture.max_strain);
        }
        constraints.push(c);
    }

    // Volume
    match config.volume_mode {
        VolumeMode::None => {}
        VolumeMode::CenterTetrahedra => {
            if let Some(center) = center_index {
                for tri in &tetra_faces {
                    let indices = [tri[0], tri[1], tri[2], center as u32];
                    let mut c = Constraint::tetrahedron(&particles, indices, config.volume_compliance)
                        .with_stiffness(config.stiffness);
                    if fracture.enabled {
                        c = c.breakable(fracture.volume_break_ratio);
                    }
                    constraints.push(c);
                }
            }
        }
        VolumeMode::Radial => {
            if vertex_count >= 4 {
                let indices = (0..vertex_count as u32).collect();
                let mut c = Constraint::radial_volume(&particles, indices, config.volume_compliance)
                    .with_stiffness(config.stiffness);
                if fracture.enabled {
                    c = c.breakable(fracture.volume_break_ratio);
                }
                constraints.push(c);
            }
        }
    }

    // Shape memory
    if config.shape_memory_stiffness > 0.0 {
        let rest_com = particles.predicted_center_of_mass();
        for i in 0..particles.count {
            constraints.push(Constraint::shape_memory(
                i as u32,
                particles.original_position[i] - rest_com,
                config.shape_memory_stiffness,
            ));
        }
    }

    Ok(Topology {
        particles,
        constraints,
        vertex_count,
    })
}

/// Triangles whose tetrahedron with `centroid` encloses real volume.
///
/// A face coplanar with the centroid (flat meshes, flat patches of a closed
/// mesh) has no volume to preserve and would turn any out-of-plane motion
/// into an unbounded volume strain.
fn solid_faces(vertices: &[Vec3], triangles: &[u32], centroid: Vec3) -> Vec<[u32; 3]> {
    let faces: Vec<([u32; 3], f32)> = triangles
        .chunks_exact(3)
        .map(|tri| {
            let [a, b, c] = [tri[0], tri[1], tri[2]];
            let v = tetrahedron_volume(
                vertices[a as usize],
                vertices[b as usize],
                vertices[c as usize],
                centroid,
            );
            ([a, b, c], v.abs())
        })
        .collect();
    if faces.is_empty() {
        return Vec::new();
    }
    let mean = faces.iter().map(|(_, v)| v).sum::<f32>() / faces.len() as f32;
    let floor = (mean * DEGENERATE_TETRA_FRACTION).max(MIN_REST_VOLUME);
    faces
        .into_iter()
        .filter(|&(_, v)| v > floor)
        .map(|(tri, _)| tri)
        .collect()
}

/// Unique edges in first-seen order with their adjacent triangles.
fn collect_edges(triangles: &[u32]) -> Vec<EdgeRecord> {
    let mut lookup: HashMap<(u32, u32), usize> = HashMap::new();
    let mut edges: Vec<EdgeRecord> = Vec::new();

    for (t, tri) in triangles.chunks_exact(3).enumerate() {
        let (a, b, c) = (tri[0], tri[1], tri[2]);
        for (v0, v1) in [(a, b), (b, c), (c, a)] {
            if v0 == v1 {
                continue;
            }
            let key = if v0 < v1 { (v0, v1) } else { (v1, v0) };
            let idx = *lookup.entry(key).or_insert_with(|| {
                edges.push(EdgeRecord {
                    v0: key.0,
                    v1: key.1,
                    triangles: Vec::new(),
                });
                edges.len() - 1
            });
            let record = &mut edges[idx];
            if !record.triangles.contains(&(t as u32)) {
                record.triangles.push(t as u32);
            }
        }
    }
    edges
}

/// The vertex of triangle `t` that is not on edge `(v0, v1)`.
fn wing_vertex(triangles: &[u32], t: u32, v0: u32, v1: u32) -> Option<u32> {
    let base = t as usize * 3;
    triangles[base..base + 3]
        .iter()
        .copied()
        .find(|&v| v != v0 && v != v1)
}

/// Per-particle masses summing to `total_mass`.
fn distribute_mass(
    positions: &[Vec3],
    triangles: &[u32],
    centroid: Vec3,
    total_mass: f32,
    distribution: MassDistribution,
    center_index: Option<usize>,
) -> Vec<f32> {
    let n = positions.len();
    let uniform = vec![total_mass / n as f32; n];
    if distribution == MassDistribution::Uniform {
        return uniform;
    }

    // Each triangle spans a cone to the centroid; its volume is shared by the
    // triangle's vertices and, when present, the centre particle.
    let sharers = if center_index.is_some() { 4.0 } else { 3.0 };
    let mut weights = vec![0.0_f32; n];
    for tri in triangles.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
        let volume =
            tetrahedron_volume(positions[a], positions[b], positions[c], centroid).abs();
        let share = volume / sharers;
        weights[a] += share;
        weights[b] += share;
        weights[c] += share;
        if let Some(center) = center_index {
            weights[center] += share;
        }
    }

    let total: f32 = weights.iter().sum();
    if total <= 1e-12 || weights.iter().any(|&w| w <= 0.0) {
        return uniform;
    }
    weights.iter().map(|w| w / total * total_mass).collect()
}
