//! Position constraints.
//!
//! A [`Constraint`] pairs shared solver state (activity, compliance, breaking)
//! with a closed set of geometric variants in [`ConstraintKind`]. Particles are
//! referenced by index so constraints can live in a flat `Vec` and be broken
//! or restored without touching the particle storage.

pub mod distance;
pub mod ground;
pub mod shape_memory;
pub mod volume;

use glam::{Mat3, Vec3};

use crate::particle::ParticleSet;

pub use distance::DistanceConstraint;
pub use ground::GroundConstraint;
pub use shape_memory::ShapeMemoryConstraint;
pub use volume::VolumeConstraint;

/// Relaxation phase. Phases run in declaration order within each iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintPhase {
    Ground,
    Structural,
    Volume,
    ShapeMemory,
}

/// Geometric variant of a constraint.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintKind {
    Distance(DistanceConstraint),
    Volume(VolumeConstraint),
    Ground(GroundConstraint),
    ShapeMemory(ShapeMemoryConstraint),
}

/// Outcome of a single projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    /// Corrections (possibly zero) were applied.
    Solved,
    /// The constraint was inactive or had nothing it could move.
    Skipped,
    /// Strain exceeded the break threshold; the constraint is now inactive.
    Broken,
}

/// Rigid frame of the body used by shape-memory targets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyFrame {
    pub center: Vec3,
    pub rotation: Mat3,
}

impl Default for BodyFrame {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            rotation: Mat3::IDENTITY,
        }
    }
}

/// Per-pass inputs shared by every constraint.
#[derive(Clone, Copy, Debug)]
pub struct SolveContext {
    /// Substep length in seconds.
    pub dt: f32,
    /// Current body frame (only read by shape memory).
    pub frame: BodyFrame,
    /// Stress added to a particle per unit of downward impact speed.
    pub impact_stress_scale: f32,
}

impl SolveContext {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            frame: BodyFrame::default(),
            impact_stress_scale: 0.0,
        }
    }
}

/// A constraint with its solver state.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub active: bool,
    /// XPBD compliance (inverse stiffness). 0 is perfectly rigid.
    pub compliance: f32,
    /// Fraction of the correction applied per pass, in (0, 1].
    pub stiffness: f32,
    pub can_break: bool,
    /// Strain at which the constraint breaks.
    pub break_threshold: f32,
    /// Strain measured during the latest projection.
    pub current_stress: f32,
    /// Accumulated Lagrange multiplier (reset each substep).
    pub lambda: f32,
}

impl Constraint {
    fn with_kind(kind: ConstraintKind, compliance: f32, stiffness: f32) -> Self {
        Self {
            kind,
            active: true,
            compliance,
            stiffness,
            can_break: false,
            break_threshold: f32::INFINITY,
            current_stress: 0.0,
            lambda: 0.0,
        }
    }

    /// Distance constraint whose rest length is the current distance between `a` and `b`.
    pub fn distance(particles: &ParticleSet, a: u32, b: u32, compliance: f32) -> Self {
        Self::with_kind(
            ConstraintKind::Distance(DistanceConstraint::from_particles(particles, a, b)),
            compliance,
            1.0,
        )
    }

    /// Distance constraint with an explicit rest length.
    pub fn distance_with_rest(a: u32, b: u32, rest_length: f32, compliance: f32) -> Self {
        Self::with_kind(
            ConstraintKind::Distance(DistanceConstraint::new(a, b, rest_length)),
            compliance,
            1.0,
        )
    }

    /// Tetrahedral volume constraint over the current positions.
    pub fn tetrahedron(particles: &ParticleSet, indices: [u32; 4], compliance: f32) -> Self {
        Self::with_kind(
            ConstraintKind::Volume(VolumeConstraint::tetrahedron(particles, indices)),
            compliance,
            1.0,
        )
    }

    /// Aggregate centroid-radius volume constraint over the current positions.
    pub fn radial_volume(particles: &ParticleSet, indices: Vec<u32>, compliance: f32) -> Self {
        Self::with_kind(
            ConstraintKind::Volume(VolumeConstraint::radial(particles, indices)),
            compliance,
            1.0,
        )
    }

    /// Infinite ground plane at `y = height`.
    pub fn ground(height: f32, restitution: f32, friction: f32) -> Self {
        Self::with_kind(
            ConstraintKind::Ground(GroundConstraint::new(height, restitution, friction)),
            0.0,
            1.0,
        )
    }

    /// Shape-memory pull for `particle` toward `rest_offset` from the body centre.
    pub fn shape_memory(particle: u32, rest_offset: Vec3, stiffness: f32) -> Self {
        Self::with_kind(
            ConstraintKind::ShapeMemory(ShapeMemoryConstraint::new(particle, rest_offset)),
            0.0,
            stiffness,
        )
    }

    /// Make the constraint breakable at `threshold` strain.
    ///
    /// Ground and shape-memory constraints never break; the call is ignored for them.
    pub fn breakable(mut self, threshold: f32) -> Self {
        if matches!(
            self.kind,
            ConstraintKind::Distance(_) | ConstraintKind::Volume(_)
        ) {
            self.can_break = true;
            self.break_threshold = threshold;
        }
        self
    }

    /// Set the per-pass correction fraction.
    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Relaxation phase this constraint belongs to.
    pub fn phase(&self) -> ConstraintPhase {
        match self.kind {
            ConstraintKind::Ground(_) => ConstraintPhase::Ground,
            ConstraintKind::Distance(_) => ConstraintPhase::Structural,
            ConstraintKind::Volume(_) => ConstraintPhase::Volume,
            ConstraintKind::ShapeMemory(_) => ConstraintPhase::ShapeMemory,
        }
    }

    /// Indices of the particles this constraint acts on. Ground planes act on
    /// every particle and report none.
    pub fn particle_indices(&self) -> Vec<u32> {
        match &self.kind {
            ConstraintKind::Distance(c) => vec![c.a, c.b],
            ConstraintKind::Volume(c) => c.indices().to_vec(),
            ConstraintKind::Ground(_) => Vec::new(),
            ConstraintKind::ShapeMemory(c) => vec![c.particle],
        }
    }

    /// Strain of the constraint at the predicted positions.
    pub fn violation(&self, particles: &ParticleSet) -> f32 {
        match &self.kind {
            ConstraintKind::Distance(c) => c.strain(particles),
            ConstraintKind::Volume(c) => c.strain(particles),
            ConstraintKind::Ground(c) => c.max_penetration(particles),
            ConstraintKind::ShapeMemory(_) => 0.0,
        }
    }

    /// Project the predicted positions one relaxation step toward satisfying the constraint.
    pub fn project(&mut self, particles: &mut ParticleSet, ctx: &SolveContext) -> Projection {
        if !self.active {
            return Projection::Skipped;
        }

        if self.can_break {
            let strain = self.violation(particles);
            self.current_stress = strain;
            if strain > self.break_threshold {
                self.active = false;
                self.lambda = 0.0;
                return Projection::Broken;
            }
        }

        let alpha_tilde = if ctx.dt > 0.0 {
            self.compliance / (ctx.dt * ctx.dt)
        } else {
            0.0
        };

        let applied = match &mut self.kind {
            ConstraintKind::Distance(c) => {
                c.project(particles, alpha_tilde, self.stiffness, &mut self.lambda)
            }
            ConstraintKind::Volume(c) => {
                c.project(particles, alpha_tilde, self.stiffness, &mut self.lambda)
            }
            ConstraintKind::Ground(c) => c.project(particles, ctx.impact_stress_scale),
            ConstraintKind::ShapeMemory(c) => c.project(particles, &ctx.frame, self.stiffness),
        };

        if applied {
            Projection::Solved
        } else {
            Projection::Skipped
        }
    }

    /// Return to the undamaged rest state.
    pub fn restore(&mut self) {
        self.active = true;
        self.current_stress = 0.0;
        self.lambda = 0.0;
        if let ConstraintKind::Distance(c) = &mut self.kind {
            c.rest_length = c.original_rest_length;
        }
    }
}

/// Reset all Lagrange multipliers to zero.
/// Call this at the beginning of each substep.
pub fn reset_lambdas(constraints: &mut [Constraint]) {
    for c in constraints.iter_mut() {
        c.lambda = 0.0;
    }
}

/// Indices of `constraints` in solve order: by phase, then creation order.
pub fn solve_order(constraints: &[Constraint]) -> Vec<u32> {
    let mut order: Vec<u32> = (0..constraints.len() as u32).collect();
    order.sort_by_key(|&i| constraints[i as usize].phase());
    order
}
