use glam::Vec3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, error, info, trace, warn};

use crate::config::SoftBodyConfig;
use crate::constraints::ground::resolve_ground_velocities;
use crate::constraints::shape_memory::body_frame;
use crate::constraints::{
    reset_lambdas, solve_order, Constraint, ConstraintKind, ConstraintPhase, Projection,
    SolveContext,
};
use crate::error::Result;
use crate::fracture::FractureState;
use crate::math::{clamp_length, is_finite_vec};
use crate::particle::ParticleSet;
use crate::quality::{AdaptiveQuality, SolverStats};
use crate::topology::{self, Topology};

/// A single soft body: particles, constraints and the XPBD step pipeline.
///
/// Built once from a triangle mesh with [`SoftBodySolver::initialize`], then
/// advanced with [`SoftBodySolver::step`]. Particle slots are stable for the
/// lifetime of the solver, so the first `vertex_count` positions always line
/// up with the input vertices.
pub struct SoftBodySolver {
    particles: ParticleSet,
    constraints: Vec<Constraint>,
    config: SoftBodyConfig,
    /// Constraint indices sorted by phase, then creation order.
    order: Vec<u32>,
    fracture: FractureState,
    quality: AdaptiveQuality,
    stats: SolverStats,
    step_count: u64,
    vertex_count: usize,
}

impl SoftBodySolver {
    /// Build a solver from a mesh. Fails on invalid input or config.
    pub fn initialize(
        vertices: &[Vec3],
        triangles: &[u32],
        total_mass: f32,
        config: SoftBodyConfig,
    ) -> Result<Self> {
        if let Err(e) = config.validate() {
            error!(error = %e, "rejecting soft body config");
            return Err(e);
        }

        let Topology {
            particles,
            constraints,
            vertex_count,
            ..
        } = topology::build(vertices, triangles, total_mass, &config)?;

        let fracture = FractureState::new(particles.count, &constraints);
        let order = solve_order(&constraints);

        let mut quality = AdaptiveQuality::new(config.substeps, config.iterations);
        quality.enabled = config.adaptive_quality;
        quality.budget_ms = config.quality_budget_ms;

        info!(
            particles = particles.count,
            constraints = constraints.len(),
            fracture = config.fracture.enabled,
            "soft body initialized"
        );

        let mut solver = Self {
            particles,
            constraints,
            config,
            order,
            fracture,
            quality,
            stats: SolverStats::default(),
            step_count: 0,
            vertex_count,
        };
        solver.refresh_stats();
        Ok(solver)
    }

    /// Build a solver with the default config, toggling fracture only.
    pub fn initialize_from_mesh(
        vertices: &[Vec3],
        triangles: &[u32],
        total_mass: f32,
        fracture_enabled: bool,
    ) -> Result<Self> {
        Self::initialize(
            vertices,
            triangles,
            total_mass,
            SoftBodyConfig::default().with_fracture(fracture_enabled),
        )
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// `dt` is clamped into `[min_dt, max_dt]`; non-finite or non-positive
    /// values leave the body untouched.
    pub fn step(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            trace!(dt, "ignoring non-positive time step");
            return;
        }

        #[cfg(not(target_arch = "wasm32"))]
        let started = std::time::Instant::now();

        let dt = dt.clamp(self.config.min_dt, self.config.max_dt);
        let substeps = self.quality.substeps().max(1);
        let iterations = self.quality.iterations().max(1);
        let sub_dt = dt / substeps as f32;
        let gravity = clamp_length(self.config.gravity, self.config.max_acceleration);

        let mut ctx = SolveContext::new(sub_dt);
        if self.config.fracture.enabled {
            ctx.impact_stress_scale = self.config.fracture.impact_stress_scale;
        }

        let mut recovered = 0u32;
        for _ in 0..substeps {
            recovered += self.predict(gravity, sub_dt);
            reset_lambdas(&mut self.constraints);
            let incoming_com_velocity = self.particles.center_of_mass_velocity();

            for _ in 0..iterations {
                self.relax(&mut ctx);
            }

            self.commit(sub_dt);
            resolve_ground_velocities(
                &mut self.particles,
                &self.config.contact,
                sub_dt,
                incoming_com_velocity,
            );
            recovered += self.stabilize(sub_dt);
        }

        if recovered > 0 {
            self.stats.nan_recoveries += recovered;
            debug!(particles = recovered, "rolled back non-finite particles");
        }

        self.apply_plasticity();

        if self.config.fracture.enabled {
            let report =
                self.fracture
                    .process(&mut self.particles, &mut self.constraints, &self.config.fracture);
            if report.deactivated_particles > 0 {
                debug!(
                    step = self.step_count,
                    particles = report.deactivated_particles,
                    constraints = report.broken_constraints,
                    broken_total = self.fracture.broken_count(),
                    "fracture cascade"
                );
            }
        }

        self.step_count += 1;
        let interval = u64::from(self.config.health_check_interval.max(1));
        if self.step_count % interval == 0 {
            self.check_divergence();
        }

        self.stats.last_iterations_used = iterations;
        self.stats.last_substeps_used = substeps;
        self.refresh_stats();

        #[cfg(not(target_arch = "wasm32"))]
        self.report_solve_time(started.elapsed().as_secs_f32() * 1000.0);
    }

    /// Feed a measured step time to the stats and the adaptive quality controller.
    ///
    /// Called automatically on native targets. Hosts without a monotonic clock
    /// in `std` (wasm) measure the step themselves and report it here.
    pub fn report_solve_time(&mut self, ms: f32) {
        self.stats.last_solve_time_ms = ms;
        self.quality.update(ms);
    }

    /// Add `impulse` to particles within `radius` of `center`.
    ///
    /// The velocity change falls off linearly with distance and scales with
    /// inverse mass. Fixed and fractured particles are unaffected.
    pub fn apply_impulse(&mut self, center: Vec3, impulse: Vec3, radius: f32) {
        if radius.is_nan() || radius <= 0.0 || !is_finite_vec(center) || !is_finite_vec(impulse) {
            return;
        }
        for i in 0..self.particles.count {
            if !self.particles.is_movable(i) {
                continue;
            }
            let d = (self.particles.position[i] - center).length();
            if d >= radius {
                continue;
            }
            let falloff = 1.0 - d / radius;
            self.particles.velocity[i] += impulse * falloff * self.particles.inv_mass[i];
        }
    }

    /// Apply `force` over `dt` seconds as an impulse.
    pub fn apply_force(&mut self, center: Vec3, force: Vec3, radius: f32, dt: f32) {
        if dt.is_finite() && dt > 0.0 {
            self.apply_impulse(center, force * dt, radius);
        }
    }

    /// Add an infinite ground plane at `y = height`.
    pub fn add_ground_constraint(&mut self, height: f32, restitution: f32, friction: f32) {
        let mut c = Constraint::ground(height, restitution, friction);
        if let ConstraintKind::Ground(g) = &mut c.kind {
            g.energy_compensation = self.config.contact.energy_compensation;
        }
        let index = self.constraints.len() as u32;
        self.fracture.register(index, &c);
        self.constraints.push(c);
        self.order = solve_order(&self.constraints);
        self.refresh_stats();
    }

    /// Restore the body to its initial state.
    ///
    /// Positions return to their rest values bit for bit; velocities, stress
    /// and contacts are cleared; broken constraints and fractured particles
    /// come back. Pinned particles stay pinned. Adaptive quality returns to
    /// the configured level.
    pub fn reset(&mut self) {
        self.particles.reset();
        self.fracture.restore(&mut self.constraints);
        self.quality.restore_full();
        self.refresh_stats();
    }

    /// Pin particle `i` in place. Returns false if `i` is out of range.
    pub fn pin(&mut self, i: usize) -> bool {
        if i >= self.particles.count {
            return false;
        }
        self.particles.fix(i);
        true
    }

    /// Release a pinned particle. Returns false if `i` is out of range.
    pub fn unpin(&mut self, i: usize) -> bool {
        if i >= self.particles.count {
            return false;
        }
        self.particles.unfix(i);
        true
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    pub fn is_fractured(&self) -> bool {
        self.fracture.is_fractured()
    }

    /// Positions of the input vertices, in input order.
    pub fn mesh_positions(&self) -> &[Vec3] {
        &self.particles.position[..self.vertex_count]
    }

    /// [`Self::mesh_positions`] as raw bytes (three little-endian `f32` per vertex).
    pub fn mesh_position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.mesh_positions())
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// Direct access to particle state, for hosts that drive particles themselves.
    pub fn particles_mut(&mut self) -> &mut ParticleSet {
        &mut self.particles
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn config(&self) -> &SoftBodyConfig {
        &self.config
    }

    pub fn fracture(&self) -> &FractureState {
        &self.fracture
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Integrate external forces and write predicted positions.
    ///
    /// Particles that went non-finite are rolled back here so relaxation
    /// never spreads NaN to their neighbours. Returns the number of rollbacks.
    fn predict(&mut self, accel: Vec3, dt: f32) -> u32 {
        let max_displacement = self.config.max_displacement;

        #[cfg(feature = "parallel")]
        {
            let particles = &self.particles;
            let next: Vec<(Vec3, Vec3)> = (0..particles.count)
                .into_par_iter()
                .map(|i| predicted_state(particles, i, accel, dt, max_displacement))
                .collect();
            for (i, (velocity, predicted)) in next.into_iter().enumerate() {
                self.particles.velocity[i] = velocity;
                self.particles.predicted[i] = predicted;
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            for i in 0..self.particles.count {
                self.particles.predict_position(i, accel, dt);
                let p = &mut self.particles;
                p.predicted[i] = limit_displacement(p.position[i], p.predicted[i], max_displacement);
            }
        }

        for contact in self.particles.contact.iter_mut() {
            *contact = None;
        }

        let mut recovered = 0;
        for i in 0..self.particles.count {
            if self.particles.sanitize(i) {
                recovered += 1;
            }
        }
        recovered
    }

    /// One Gauss-Seidel pass over every active constraint in phase order.
    fn relax(&mut self, ctx: &mut SolveContext) {
        let mut frame_ready = false;
        for &ci in &self.order {
            let c = &self.constraints[ci as usize];
            if !c.active {
                continue;
            }

            if !frame_ready && c.phase() == ConstraintPhase::ShapeMemory {
                let shape = self.constraints.iter().filter_map(|c| match &c.kind {
                    ConstraintKind::ShapeMemory(s) if c.active => Some(s),
                    _ => None,
                });
                ctx.frame = body_frame(
                    &self.particles,
                    shape,
                    self.config.shape_memory_follows_rotation,
                );
                frame_ready = true;
            }

            let c = &mut self.constraints[ci as usize];
            if c.project(&mut self.particles, ctx) == Projection::Broken {
                self.fracture.record_hard_break(
                    ci,
                    &self.constraints,
                    &mut self.particles,
                    &self.config.fracture,
                );
            }
        }
    }

    /// Move predicted positions into place and derive velocities.
    fn commit(&mut self, dt: f32) {
        #[cfg(feature = "parallel")]
        {
            let particles = &self.particles;
            let next: Vec<Option<Vec3>> = (0..particles.count)
                .into_par_iter()
                .map(|i| {
                    particles.is_movable(i).then(|| {
                        (particles.predicted[i] - particles.position[i]) / dt
                    })
                })
                .collect();
            let p = &mut self.particles;
            for (i, velocity) in next.into_iter().enumerate() {
                match velocity {
                    Some(v) => {
                        p.velocity[i] = v;
                        p.position[i] = p.predicted[i];
                        if is_finite_vec(p.position[i]) {
                            p.last_valid[i] = p.position[i];
                        }
                    }
                    None => p.predicted[i] = p.position[i],
                }
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            for i in 0..self.particles.count {
                self.particles.commit_position(i, dt);
            }
        }
    }

    /// NaN rollback, damping and speed limit. Returns the number of rollbacks.
    fn stabilize(&mut self, dt: f32) -> u32 {
        let damping = 1.0 - self.config.global_damping * dt;
        let max_velocity = self.config.max_velocity;
        let mut recovered = 0;
        for i in 0..self.particles.count {
            if self.particles.sanitize(i) {
                recovered += 1;
            }
            if !self.particles.active[i] {
                continue;
            }
            self.particles.apply_damping(i, damping);
            self.particles.velocity[i] = clamp_length(self.particles.velocity[i], max_velocity);
        }
        recovered
    }

    /// Creep distance rest lengths toward sustained deformation.
    fn apply_plasticity(&mut self) {
        let plastic = &self.config.plasticity;
        if plastic.creep_rate <= 0.0 {
            return;
        }
        for c in self.constraints.iter_mut().filter(|c| c.active) {
            if let ConstraintKind::Distance(d) = &mut c.kind {
                d.apply_plasticity(
                    &self.particles,
                    plastic.yield_strain,
                    plastic.creep_rate,
                    plastic.max_plastic_strain,
                );
            }
        }
    }

    /// Reset the body if any active particle has left the divergence bound.
    fn check_divergence(&mut self) {
        let bound = self.config.divergence_bound;
        let p = &self.particles;
        let diverged = (0..p.count).find(|&i| {
            p.active[i] && (!is_finite_vec(p.position[i]) || p.position[i].length() > bound)
        });
        if let Some(i) = diverged {
            self.stats.divergence_resets += 1;
            warn!(
                particle = i,
                bound,
                resets = self.stats.divergence_resets,
                "soft body diverged, resetting"
            );
            self.reset();
        }
    }

    fn refresh_stats(&mut self) {
        let s = &mut self.stats;
        s.particle_count = self.particles.count as u32;
        s.active_particle_count = self.particles.active_count() as u32;
        s.constraint_count = self.constraints.len() as u32;
        s.active_constraint_count = self.constraints.iter().filter(|c| c.active).count() as u32;
        s.broken_constraint_count = self.fracture.broken_count() as u32;
        s.is_fractured = self.fracture.is_fractured();
    }
}

/// Pull `predicted` back so it lies within `max` of `position`.
#[inline]
fn limit_displacement(position: Vec3, predicted: Vec3, max: f32) -> Vec3 {
    let delta = predicted - position;
    if delta.length_squared() > max * max {
        position + clamp_length(delta, max)
    } else {
        predicted
    }
}

/// Velocity and predicted position of particle `i` after integrating `accel`.
/// Mirrors [`ParticleSet::predict_position`] followed by [`limit_displacement`].
#[cfg(feature = "parallel")]
fn predicted_state(
    particles: &ParticleSet,
    i: usize,
    accel: Vec3,
    dt: f32,
    max_displacement: f32,
) -> (Vec3, Vec3) {
    if !particles.is_movable(i) {
        return (particles.velocity[i], particles.position[i]);
    }
    let velocity = particles.velocity[i] + accel * dt;
    let predicted = particles.position[i] + velocity * dt;
    (
        velocity,
        limit_displacement(particles.position[i], predicted, max_displacement),
    )
}
