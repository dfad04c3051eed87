//! Infinite ground plane contact.
//!
//! Positions are handled during relaxation like any other constraint: a
//! particle below the plane is lifted back onto it. Restitution and friction
//! act on velocities, so they are applied after the substep commits, using the
//! incoming velocity recorded when the contact was first detected.

use glam::Vec3;

use crate::config::ContactConfig;
use crate::math::smoothstep;
use crate::particle::{GroundContact, ParticleSet};

/// Horizontal plane `y = height` that particles cannot pass through.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundConstraint {
    pub height: f32,
    /// Fraction of the normal impact speed returned on rebound.
    pub restitution: f32,
    /// Fraction of tangential velocity removed per contact substep.
    pub friction: f32,
    /// Multiplier on `restitution`. 1.0 means plain restitution.
    pub energy_compensation: f32,
}

impl GroundConstraint {
    pub fn new(height: f32, restitution: f32, friction: f32) -> Self {
        Self {
            height,
            restitution: restitution.max(0.0),
            friction: friction.clamp(0.0, 1.0),
            energy_compensation: 1.0,
        }
    }

    /// Restitution actually applied on rebound.
    #[inline]
    pub fn effective_restitution(&self) -> f32 {
        self.restitution * self.energy_compensation
    }

    /// Deepest penetration below the plane among movable particles.
    pub fn max_penetration(&self, particles: &ParticleSet) -> f32 {
        (0..particles.count)
            .filter(|&i| particles.is_movable(i))
            .map(|i| self.height - particles.predicted[i].y)
            .fold(0.0_f32, f32::max)
    }

    /// Lift every movable particle below the plane back onto it.
    ///
    /// The first time a particle touches during the substep its incoming
    /// velocity is recorded and, when `impact_stress_scale` is positive, its
    /// downward speed is converted into stress.
    pub fn project(&self, particles: &mut ParticleSet, impact_stress_scale: f32) -> bool {
        let mut touched = false;
        for i in 0..particles.count {
            if !particles.is_movable(i) {
                continue;
            }
            let depth = self.height - particles.predicted[i].y;
            if depth <= 0.0 {
                continue;
            }
            particles.predicted[i].y = self.height;
            touched = true;

            if particles.contact[i].is_none() {
                let incoming = particles.velocity[i];
                particles.contact[i] = Some(GroundContact {
                    restitution: self.effective_restitution(),
                    friction: self.friction,
                    incoming_velocity: incoming,
                });
                if impact_stress_scale > 0.0 && incoming.y < 0.0 {
                    particles.add_stress(i, -incoming.y * impact_stress_scale);
                }
            }
        }
        touched
    }
}

/// Reconcile velocities of particles that touched the ground this substep.
///
/// Impacts reflect the incoming normal velocity scaled by restitution and
/// scale tangential velocity by `(1 - friction)`. Slow contacts accumulate
/// contact time; once past `rest_time` the particle is resting and its
/// velocity is damped instead of bounced, which stops micro-bouncing.
///
/// With `body_coupling` the body's centre of mass also receives the rebound,
/// so a connected body bounces as a whole rather than only at its contact
/// points. `incoming_com_velocity` is the centre-of-mass velocity before the
/// substep's constraints were solved.
pub fn resolve_ground_velocities(
    particles: &mut ParticleSet,
    config: &ContactConfig,
    dt: f32,
    incoming_com_velocity: Vec3,
) {
    let mut any_impact = false;
    let mut impact_restitution = 0.0_f32;
    let mut total_mass = 0.0_f32;

    for i in 0..particles.count {
        if !particles.is_movable(i) {
            continue;
        }
        let mass = 1.0 / particles.inv_mass[i];
        total_mass += mass;

        let Some(contact) = particles.contact[i] else {
            particles.contact_time[i] = 0.0;
            continue;
        };

        let v_in = contact.incoming_velocity;
        let mut v = particles.velocity[i];
        let impact_speed = -v_in.y;

        if impact_speed > config.rest_velocity {
            particles.contact_time[i] = 0.0;
            v.y = v.y.max(impact_speed * contact.restitution);
            any_impact = true;
            impact_restitution = impact_restitution.max(contact.restitution);
        } else {
            particles.contact_time[i] += dt;
            v.y = v.y.max(0.0);
        }

        let tangential = Vec3::new(v.x, 0.0, v.z) * (1.0 - contact.friction);
        v.x = tangential.x;
        v.z = tangential.z;

        // Blend in resting damping as contact time approaches rest_time.
        let rest_blend = if config.rest_time > 0.0 {
            smoothstep(0.0, config.rest_time, particles.contact_time[i])
        } else {
            1.0
        };
        if rest_blend > 0.0 {
            v *= 1.0 - config.rest_damping * rest_blend;
        }

        particles.velocity[i] = v;
    }

    if !config.body_coupling || !any_impact || total_mass <= 0.0 {
        return;
    }

    let v_com_in = incoming_com_velocity.y;
    if -v_com_in <= config.rest_velocity {
        return;
    }

    let mut momentum_out = 0.0_f32;
    for i in 0..particles.count {
        if particles.is_movable(i) {
            momentum_out += particles.velocity[i].y / particles.inv_mass[i];
        }
    }
    let v_com_out = momentum_out / total_mass;
    let target = -v_com_in * impact_restitution;
    if v_com_out >= target {
        return;
    }

    let shift = target - v_com_out;
    for i in 0..particles.count {
        if particles.is_movable(i) {
            particles.velocity[i].y += shift;
        }
    }
}
