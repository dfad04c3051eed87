use crate::math::MIN_REST_LENGTH;
use crate::particle::ParticleSet;

/// XPBD distance constraint for edges and shear/bend links.
///
/// Maintains a rest length between two particles using XPBD
/// (Extended Position-Based Dynamics) with compliance.
///
/// Reference: "XPBD: Position-Based Simulation of Compliant Constrained Dynamics",
/// Macklin et al., 2016
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceConstraint {
    /// Particle index A.
    pub a: u32,
    /// Particle index B.
    pub b: u32,
    /// Current rest length (drifts under plastic deformation).
    pub rest_length: f32,
    /// Rest length at build time.
    pub original_rest_length: f32,
}

impl DistanceConstraint {
    /// Create a new distance constraint. Rest lengths below the minimum are clamped.
    pub fn new(a: u32, b: u32, rest_length: f32) -> Self {
        let rest_length = rest_length.max(MIN_REST_LENGTH);
        Self {
            a,
            b,
            rest_length,
            original_rest_length: rest_length,
        }
    }

    /// Rest length taken from the particles' current positions.
    pub fn from_particles(particles: &ParticleSet, a: u32, b: u32) -> Self {
        let rest = (particles.position[a as usize] - particles.position[b as usize]).length();
        Self::new(a, b, rest)
    }

    /// Current length between the predicted positions.
    #[inline]
    pub fn current_length(&self, particles: &ParticleSet) -> f32 {
        (particles.predicted[self.a as usize] - particles.predicted[self.b as usize]).length()
    }

    /// `|len / rest - 1|` at the predicted positions.
    #[inline]
    pub fn strain(&self, particles: &ParticleSet) -> f32 {
        (self.current_length(particles) / self.rest_length - 1.0).abs()
    }

    /// One XPBD projection. Returns true if any particle was moved.
    ///
    /// 1. Compute constraint value C = |p_a - p_b| - rest_length
    /// 2. delta_lambda = -(C + alpha_tilde * lambda) / (w_a + w_b + alpha_tilde)
    /// 3. Apply corrections weighted by inverse mass and scaled by stiffness
    pub fn project(
        &self,
        particles: &mut ParticleSet,
        alpha_tilde: f32,
        stiffness: f32,
        lambda: &mut f32,
    ) -> bool {
        let a = self.a as usize;
        let b = self.b as usize;

        // Inverse mass from particle data (0.0 = fixed/fractured)
        let w_a = particles.inv_mass[a];
        let w_b = particles.inv_mass[b];
        let w_sum = w_a + w_b;
        if w_sum < 1e-10 {
            return false;
        }

        let diff = particles.predicted[a] - particles.predicted[b];
        let dist = diff.length();
        if !dist.is_finite() || dist < 1e-10 {
            return false;
        }

        let c_val = dist - self.rest_length;
        let n = diff / dist;

        let delta_lambda = -(c_val + alpha_tilde * *lambda) / (w_sum + alpha_tilde);
        *lambda += delta_lambda;

        let correction = n * delta_lambda * stiffness;
        particles.predicted[a] += correction * w_a;
        particles.predicted[b] -= correction * w_b;
        true
    }

    /// Absorb strain beyond `yield_strain` into the rest length.
    ///
    /// The rest length never drifts further than `max_plastic_strain` from the original.
    pub fn apply_plasticity(
        &mut self,
        particles: &ParticleSet,
        yield_strain: f32,
        creep_rate: f32,
        max_plastic_strain: f32,
    ) {
        if creep_rate <= 0.0 {
            return;
        }
        let len = (particles.position[self.a as usize] - particles.position[self.b as usize]).length();
        let strain = len / self.rest_length - 1.0;
        if strain.abs() <= yield_strain {
            return;
        }

        let excess = strain - yield_strain.copysign(strain);
        let target = self.rest_length * (1.0 + excess * creep_rate);
        let lo = self.original_rest_length * (1.0 - max_plastic_strain).max(0.0);
        let hi = self.original_rest_length * (1.0 + max_plastic_strain);
        self.rest_length = target.clamp(lo, hi).max(MIN_REST_LENGTH);
    }
}
