use glam::{Mat3, Vec3};

use crate::constraints::BodyFrame;
use crate::math::{mat3_outer, polar_rotation};
use crate::particle::ParticleSet;

/// Soft bias pulling one particle back toward its rest position relative to
/// the body's centre of mass.
///
/// This is deliberately weak compared to structural constraints: it restores
/// the overall shape after large deformations without fighting wobble.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeMemoryConstraint {
    pub particle: u32,
    /// Rest position relative to the rest centre of mass.
    pub rest_offset: Vec3,
}

impl ShapeMemoryConstraint {
    pub fn new(particle: u32, rest_offset: Vec3) -> Self {
        Self {
            particle,
            rest_offset,
        }
    }

    /// Move the particle `stiffness` of the way toward its goal in `frame`.
    pub fn project(&self, particles: &mut ParticleSet, frame: &BodyFrame, stiffness: f32) -> bool {
        let i = self.particle as usize;
        if !particles.is_movable(i) {
            return false;
        }
        let goal = frame.center + frame.rotation * self.rest_offset;
        let correction = (goal - particles.predicted[i]) * stiffness;
        particles.predicted[i] += correction;
        true
    }
}

/// Compute the body frame for a set of shape-memory constraints.
///
/// The centre is the mass-weighted centre of the movable predicted positions.
/// With `follow_rotation`, the rotation comes from the polar decomposition of
/// the mass-weighted cross-covariance between current and rest offsets
/// (Mueller et al. 2005, "Meshless Deformations Based on Shape Matching");
/// otherwise the rest orientation is kept.
pub fn body_frame<'a>(
    particles: &ParticleSet,
    shape: impl IntoIterator<Item = &'a ShapeMemoryConstraint>,
    follow_rotation: bool,
) -> BodyFrame {
    let center = particles.predicted_center_of_mass();
    let fixed_orientation = BodyFrame {
        center,
        rotation: Mat3::IDENTITY,
    };
    if !follow_rotation {
        return fixed_orientation;
    }

    let mut a_pq = Mat3::ZERO;
    let mut contributors = 0usize;
    for c in shape {
        let i = c.particle as usize;
        if !particles.is_movable(i) {
            continue;
        }
        let mass = 1.0 / particles.inv_mass[i];
        let q = particles.predicted[i] - center;
        a_pq += mat3_outer(q * mass, c.rest_offset);
        contributors += 1;
    }
    if contributors == 0 {
        return fixed_orientation;
    }

    // Regularise so coplanar or collapsed bodies keep the unused axis at identity.
    let a_pq = a_pq + Mat3::IDENTITY * 1e-6;

    BodyFrame {
        center,
        rotation: polar_rotation(a_pq),
    }
}
