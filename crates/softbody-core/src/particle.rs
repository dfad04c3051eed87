use glam::Vec3;

use crate::math::is_finite_vec;

/// Ground contact recorded for a particle during the current substep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundContact {
    /// Effective restitution (restitution times energy compensation).
    pub restitution: f32,
    pub friction: f32,
    /// Velocity the particle carried when the contact was first detected.
    pub incoming_velocity: Vec3,
}

/// SoA particle storage
///
/// Index `i` in every vector describes particle `i`. Slots are never removed:
/// a fractured particle keeps its position so renderers stay consistent.
pub struct ParticleSet {
    pub count: usize,
    pub position: Vec<Vec3>,
    /// Working position during a substep
    pub predicted: Vec<Vec3>,
    pub velocity: Vec<Vec3>,
    /// Inverse mass; 0.0 for fixed or fractured particles
    pub inv_mass: Vec<f32>,
    /// Inverse mass assigned at build time, restored on reset
    pub base_inv_mass: Vec<f32>,
    pub fixed: Vec<bool>,
    pub active: Vec<bool>,
    /// Rest configuration (reset target and shape-memory source)
    pub original_position: Vec<Vec3>,
    /// Last position known to be finite
    pub last_valid: Vec<Vec3>,
    /// Accumulated mechanical load
    pub stress: Vec<f32>,
    /// Ground contact this substep, if any
    pub contact: Vec<Option<GroundContact>>,
    /// Seconds of continuous slow ground contact
    pub contact_time: Vec<f32>,
}

impl ParticleSet {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            position: vec![Vec3::ZERO; count],
            predicted: vec![Vec3::ZERO; count],
            velocity: vec![Vec3::ZERO; count],
            inv_mass: vec![1.0; count],
            base_inv_mass: vec![1.0; count],
            fixed: vec![false; count],
            active: vec![true; count],
            original_position: vec![Vec3::ZERO; count],
            last_valid: vec![Vec3::ZERO; count],
            stress: vec![0.0; count],
            contact: vec![None; count],
            contact_time: vec![0.0; count],
        }
    }

    /// Build a set at rest at `positions`, each particle carrying `mass`.
    pub fn from_positions(positions: &[Vec3], mass: f32) -> Self {
        let mut set = Self::new(positions.len());
        let w = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        for (i, &p) in positions.iter().enumerate() {
            set.position[i] = p;
            set.predicted[i] = p;
            set.original_position[i] = p;
            set.last_valid[i] = p;
            set.inv_mass[i] = w;
            set.base_inv_mass[i] = w;
        }
        set
    }

    /// Set the mass of particle `i`. Fixed particles keep an inverse mass of zero.
    pub fn set_mass(&mut self, i: usize, mass: f32) {
        let w = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.base_inv_mass[i] = w;
        if self.active[i] && !self.fixed[i] {
            self.inv_mass[i] = w;
        }
    }

    /// Whether particle `i` can be moved by forces and constraints.
    #[inline]
    pub fn is_movable(&self, i: usize) -> bool {
        self.active[i] && !self.fixed[i] && self.inv_mass[i] > 0.0
    }

    /// Integrate `accel` into the velocity and write the predicted position.
    ///
    /// Fixed and inactive particles predict to where they already are.
    #[inline]
    pub fn predict_position(&mut self, i: usize, accel: Vec3, dt: f32) {
        if !self.is_movable(i) {
            self.predicted[i] = self.position[i];
            return;
        }
        self.velocity[i] += accel * dt;
        self.predicted[i] = self.position[i] + self.velocity[i] * dt;
    }

    /// Move the predicted position into `position`, deriving velocity from the delta.
    #[inline]
    pub fn commit_position(&mut self, i: usize, dt: f32) {
        if !self.is_movable(i) {
            self.predicted[i] = self.position[i];
            return;
        }
        self.velocity[i] = (self.predicted[i] - self.position[i]) / dt;
        self.position[i] = self.predicted[i];
        if is_finite_vec(self.position[i]) {
            self.last_valid[i] = self.position[i];
        }
    }

    /// Scale the velocity toward zero. `factor` is clamped into `[0, 1]`.
    #[inline]
    pub fn apply_damping(&mut self, i: usize, factor: f32) {
        self.velocity[i] *= factor.clamp(0.0, 1.0);
    }

    /// Accumulate stress on an active particle. Negative amounts are ignored.
    #[inline]
    pub fn add_stress(&mut self, i: usize, amount: f32) {
        if self.active[i] && amount > 0.0 {
            self.stress[i] += amount;
        }
    }

    /// Remove particle `i` from the simulation. Idempotent.
    pub fn deactivate(&mut self, i: usize) {
        self.inv_mass[i] = 0.0;
        self.velocity[i] = Vec3::ZERO;
        self.predicted[i] = self.position[i];
        self.contact[i] = None;
        self.active[i] = false;
    }

    /// Pin particle `i` in place.
    pub fn fix(&mut self, i: usize) {
        self.fixed[i] = true;
        self.inv_mass[i] = 0.0;
        self.velocity[i] = Vec3::ZERO;
    }

    /// Release a pinned particle. Fractured particles stay immovable.
    pub fn unfix(&mut self, i: usize) {
        self.fixed[i] = false;
        if self.active[i] {
            self.inv_mass[i] = self.base_inv_mass[i];
        }
    }

    /// Roll back a particle holding NaN or infinity to its last valid position.
    ///
    /// Returns true if a rollback happened.
    pub fn sanitize(&mut self, i: usize) -> bool {
        if is_finite_vec(self.position[i])
            && is_finite_vec(self.predicted[i])
            && is_finite_vec(self.velocity[i])
        {
            return false;
        }
        self.position[i] = self.last_valid[i];
        self.predicted[i] = self.last_valid[i];
        self.velocity[i] = Vec3::ZERO;
        if !self.stress[i].is_finite() {
            self.stress[i] = 0.0;
        }
        true
    }

    /// Restore every particle to its rest state.
    pub fn reset(&mut self) {
        for i in 0..self.count {
            self.position[i] = self.original_position[i];
            self.predicted[i] = self.original_position[i];
            self.last_valid[i] = self.original_position[i];
            self.velocity[i] = Vec3::ZERO;
            self.stress[i] = 0.0;
            self.contact[i] = None;
            self.contact_time[i] = 0.0;
            self.active[i] = true;
            self.inv_mass[i] = if self.fixed[i] { 0.0 } else { self.base_inv_mass[i] };
        }
    }

    /// Number of particles still taking part in the simulation.
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Mass-weighted mean velocity of movable particles.
    pub fn center_of_mass_velocity(&self) -> Vec3 {
        let mut momentum = Vec3::ZERO;
        let mut total_mass = 0.0_f32;
        for i in 0..self.count {
            if self.is_movable(i) {
                let m = 1.0 / self.inv_mass[i];
                momentum += self.velocity[i] * m;
                total_mass += m;
            }
        }
        if total_mass > 1e-10 {
            momentum / total_mass
        } else {
            Vec3::ZERO
        }
    }

    /// Mass-weighted centre of the predicted positions of movable particles.
    ///
    /// Falls back to the plain average of all active particles when nothing can move.
    pub fn predicted_center_of_mass(&self) -> Vec3 {
        let mut com = Vec3::ZERO;
        let mut total_mass = 0.0_f32;
        for i in 0..self.count {
            if self.is_movable(i) {
                let m = 1.0 / self.inv_mass[i];
                com += self.predicted[i] * m;
                total_mass += m;
            }
        }
        if total_mass > 1e-10 {
            return com / total_mass;
        }

        let mut n = 0usize;
        for i in 0..self.count {
            if self.active[i] {
                com += self.predicted[i];
                n += 1;
            }
        }
        if n > 0 {
            com / n as f32
        } else {
            Vec3::ZERO
        }
    }
}
