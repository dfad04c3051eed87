//! Stress accumulation and fracture.
//!
//! Constraints that are stretched past a fraction of their break threshold
//! load the particles they touch; ground impacts load the impacting particle
//! directly. Stress decays geometrically every step. A particle whose stress
//! exceeds the fracture threshold is deactivated, and every constraint that
//! references it is broken in the same step. Its shape-memory constraint is
//! switched off with it but never counts as broken.
//!
//! Broken constraints are kept (inactive) so a reset can bring them back.

use tracing::info;

use crate::config::FractureConfig;
use crate::constraints::{Constraint, ConstraintPhase};
use crate::particle::ParticleSet;

/// Fracture bookkeeping for one body.
#[derive(Clone, Debug, Default)]
pub struct FractureState {
    /// For each particle, the constraints that reference it.
    adjacency: Vec<Vec<u32>>,
    /// Constraints deactivated by breaking, in the order they broke.
    broken: Vec<u32>,
    is_fractured: bool,
}

/// What a single call to [`FractureState::process`] changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FractureReport {
    pub deactivated_particles: usize,
    pub broken_constraints: usize,
}

impl FractureState {
    /// Build the particle-to-constraint adjacency for `constraints`.
    pub fn new(particle_count: usize, constraints: &[Constraint]) -> Self {
        let mut adjacency = vec![Vec::new(); particle_count];
        for (ci, c) in constraints.iter().enumerate() {
            for p in c.particle_indices() {
                let list = &mut adjacency[p as usize];
                if !list.contains(&(ci as u32)) {
                    list.push(ci as u32);
                }
            }
        }
        Self {
            adjacency,
            broken: Vec::new(),
            is_fractured: false,
        }
    }

    /// Register a constraint appended after construction.
    pub fn register(&mut self, index: u32, constraint: &Constraint) {
        for p in constraint.particle_indices() {
            let list = &mut self.adjacency[p as usize];
            if !list.contains(&index) {
                list.push(index);
            }
        }
    }

    pub fn is_fractured(&self) -> bool {
        self.is_fractured
    }

    pub fn broken_count(&self) -> usize {
        self.broken.len()
    }

    pub fn broken(&self) -> &[u32] {
        &self.broken
    }

    /// Constraint indices that reference particle `i`.
    pub fn constraints_of(&self, i: usize) -> &[u32] {
        &self.adjacency[i]
    }

    /// Record a constraint that broke during relaxation and load its particles.
    pub fn record_hard_break(
        &mut self,
        index: u32,
        constraints: &[Constraint],
        particles: &mut ParticleSet,
        config: &FractureConfig,
    ) {
        let c = &constraints[index as usize];
        for p in c.particle_indices() {
            particles.add_stress(p as usize, c.current_stress * config.strain_stress_scale);
        }
        self.mark_broken(index, config);
    }

    fn mark_broken(&mut self, index: u32, config: &FractureConfig) {
        if !self.broken.contains(&index) {
            self.broken.push(index);
        }
        if !self.is_fractured && self.broken.len() >= config.fractured_after_broken.max(1) {
            self.is_fractured = true;
            info!(broken = self.broken.len(), "soft body fractured");
        }
    }

    /// Run one fracture pass after the substeps of a step.
    ///
    /// 1. Stretched breakable constraints add strain stress to their particles.
    /// 2. Particles above the threshold deactivate and break their constraints.
    /// 3. All remaining stress decays by `stress_decay_rate`.
    pub fn process(
        &mut self,
        particles: &mut ParticleSet,
        constraints: &mut [Constraint],
        config: &FractureConfig,
    ) -> FractureReport {
        let mut report = FractureReport::default();

        for c in constraints.iter_mut() {
            if !c.active || !c.can_break {
                continue;
            }
            let strain = c.violation(particles);
            c.current_stress = strain;
            let onset = c.break_threshold * config.stress_onset;
            if strain > onset {
                let load = strain * config.strain_stress_scale;
                for p in c.particle_indices() {
                    particles.add_stress(p as usize, load);
                }
            }
        }

        for i in 0..particles.count {
            if !particles.active[i] || particles.stress[i] <= config.threshold {
                continue;
            }
            particles.deactivate(i);
            report.deactivated_particles += 1;

            for k in 0..self.adjacency[i].len() {
                let ci = self.adjacency[i][k];
                let c = &mut constraints[ci as usize];
                if !c.active {
                    continue;
                }
                c.active = false;
                c.lambda = 0.0;
                // Shape memory only goes quiet with its particle; it never breaks.
                if c.phase() == ConstraintPhase::ShapeMemory {
                    continue;
                }
                report.broken_constraints += 1;
                self.mark_broken(ci, config);
            }
        }

        for s in particles.stress.iter_mut() {
            *s *= config.stress_decay_rate;
        }
        report
    }

    /// Return every constraint to its rest state and clear the fractured flag.
    pub fn restore(&mut self, constraints: &mut [Constraint]) {
        for c in constraints.iter_mut() {
            c.restore();
        }
        self.broken.clear();
        self.is_fractured = false;
    }
}
