use glam::Vec3;

use crate::math::{clamp_rest_volume, tetrahedron_volume, MIN_REST_LENGTH};
use crate::particle::ParticleSet;

/// Volume preservation constraint.
///
/// Two forms are supported:
///
/// - `Tetrahedron`: exact signed volume of four particles, solved with XPBD
///   using the determinant gradients.
/// - `Radial`: the mean distance of a particle group from its centroid stands
///   in for the enclosed volume; errors push particles along their radial
///   direction.
#[derive(Clone, Debug, PartialEq)]
pub enum VolumeConstraint {
    Tetrahedron { indices: [u32; 4], rest_volume: f32 },
    Radial { indices: Vec<u32>, rest_radius: f32 },
}

impl VolumeConstraint {
    /// Tetrahedron over the particles' current positions. Near-zero volumes are clamped.
    pub fn tetrahedron(particles: &ParticleSet, indices: [u32; 4]) -> Self {
        let [p0, p1, p2, p3] = indices.map(|i| particles.position[i as usize]);
        Self::Tetrahedron {
            indices,
            rest_volume: clamp_rest_volume(tetrahedron_volume(p0, p1, p2, p3)),
        }
    }

    /// Radial group over the particles' current positions.
    pub fn radial(particles: &ParticleSet, indices: Vec<u32>) -> Self {
        let n = indices.len().max(1) as f32;
        let centroid = indices
            .iter()
            .map(|&i| particles.position[i as usize])
            .sum::<Vec3>()
            / n;
        let mean_radius = indices
            .iter()
            .map(|&i| (particles.position[i as usize] - centroid).length())
            .sum::<f32>()
            / n;
        Self::Radial {
            indices,
            rest_radius: mean_radius.max(MIN_REST_LENGTH),
        }
    }

    pub fn indices(&self) -> &[u32] {
        match self {
            Self::Tetrahedron { indices, .. } => indices,
            Self::Radial { indices, .. } => indices,
        }
    }

    /// Current volume (tetrahedron) or mean radius (radial) at the predicted positions.
    pub fn current_measure(&self, particles: &ParticleSet) -> f32 {
        match self {
            Self::Tetrahedron { indices, .. } => {
                let [p0, p1, p2, p3] = indices.map(|i| particles.predicted[i as usize]);
                tetrahedron_volume(p0, p1, p2, p3)
            }
            Self::Radial { indices, .. } => radial_stats(particles, indices).1,
        }
    }

    /// Volume strain `|V / V0 - 1|`. The radial form cubes its radius ratio.
    pub fn strain(&self, particles: &ParticleSet) -> f32 {
        match self {
            Self::Tetrahedron { rest_volume, .. } => {
                (self.current_measure(particles) / rest_volume - 1.0).abs()
            }
            Self::Radial { rest_radius, .. } => {
                let ratio = self.current_measure(particles) / rest_radius;
                (ratio * ratio * ratio - 1.0).abs()
            }
        }
    }

    /// One relaxation pass. Returns true if any particle was moved.
    pub fn project(
        &self,
        particles: &mut ParticleSet,
        alpha_tilde: f32,
        stiffness: f32,
        lambda: &mut f32,
    ) -> bool {
        match self {
            Self::Tetrahedron {
                indices,
                rest_volume,
            } => project_tetrahedron(particles, indices, *rest_volume, alpha_tilde, stiffness, lambda),
            Self::Radial {
                indices,
                rest_radius,
            } => project_radial(particles, indices, *rest_radius, alpha_tilde, stiffness),
        }
    }
}

fn project_tetrahedron(
    particles: &mut ParticleSet,
    indices: &[u32; 4],
    rest_volume: f32,
    alpha_tilde: f32,
    stiffness: f32,
    lambda: &mut f32,
) -> bool {
    let idx = indices.map(|i| i as usize);
    let [p0, p1, p2, p3] = idx.map(|i| particles.predicted[i]);

    // dV/dp_k for V = (p1 - p0) x (p2 - p0) . (p3 - p0) / 6
    let g1 = (p2 - p0).cross(p3 - p0) / 6.0;
    let g2 = (p3 - p0).cross(p1 - p0) / 6.0;
    let g3 = (p1 - p0).cross(p2 - p0) / 6.0;
    let g0 = -(g1 + g2 + g3);
    let grads = [g0, g1, g2, g3];

    let w = idx.map(|i| particles.inv_mass[i]);
    let denom: f32 = (0..4).map(|k| w[k] * grads[k].length_squared()).sum();
    if !denom.is_finite() || denom < 1e-12 {
        return false;
    }

    let c_val = tetrahedron_volume(p0, p1, p2, p3) - rest_volume;
    let delta_lambda = -(c_val + alpha_tilde * *lambda) / (denom + alpha_tilde);
    if !delta_lambda.is_finite() {
        return false;
    }
    *lambda += delta_lambda;

    for k in 0..4 {
        if w[k] > 0.0 {
            particles.predicted[idx[k]] += grads[k] * (delta_lambda * w[k] * stiffness);
        }
    }
    true
}

fn project_radial(
    particles: &mut ParticleSet,
    indices: &[u32],
    rest_radius: f32,
    alpha_tilde: f32,
    stiffness: f32,
) -> bool {
    let (centroid, mean_radius, mean_w) = radial_stats(particles, indices);
    if mean_w <= 0.0 {
        return false;
    }

    let error = mean_radius - rest_radius;
    if !error.is_finite() || error.abs() < 1e-7 {
        return false;
    }
    // Compliance softens the radial push the same way it softens XPBD constraints.
    let softness = mean_w / (mean_w + alpha_tilde);

    let mut moved = false;
    for &i in indices {
        let i = i as usize;
        let w = particles.inv_mass[i];
        if w <= 0.0 {
            continue;
        }
        let offset = particles.predicted[i] - centroid;
        let dist = offset.length();
        if dist < 1e-8 {
            continue;
        }
        let scale = (w / mean_w).min(4.0);
        particles.predicted[i] -= offset / dist * (error * stiffness * softness * scale);
        moved = true;
    }
    moved
}

/// Centroid, mean radius and mean inverse mass of the movable particles in `indices`.
fn radial_stats(particles: &ParticleSet, indices: &[u32]) -> (Vec3, f32, f32) {
    let mut centroid = Vec3::ZERO;
    let mut n = 0usize;
    let mut w_sum = 0.0_f32;
    for &i in indices {
        let i = i as usize;
        if particles.active[i] {
            centroid += particles.predicted[i];
            n += 1;
            w_sum += particles.inv_mass[i];
        }
    }
    if n == 0 {
        return (Vec3::ZERO, 0.0, 0.0);
    }
    centroid /= n as f32;

    let mut radius = 0.0_f32;
    for &i in indices {
        let i = i as usize;
        if particles.active[i] {
            radius += (particles.predicted[i] - centroid).length();
        }
    }
    (centroid, radius / n as f32, w_sum / n as f32)
}
