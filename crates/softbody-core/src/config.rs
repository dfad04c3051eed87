//! Solver configuration.
//!
//! Everything the solver needs is passed in through [`SoftBodyConfig`] before
//! the first step. Missing fields deserialize to their defaults.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SoftBodyError};

/// How (and whether) the topology builder adds volume preservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeMode {
    /// Surface constraints only.
    None,
    /// One interior centre particle; every triangle plus the centre forms a tetrahedron.
    CenterTetrahedra,
    /// A single aggregate constraint on the mean centroid-to-particle radius.
    Radial,
}

/// How the total mass is spread over the particles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassDistribution {
    /// Every particle receives the same share.
    Uniform,
    /// Shares proportional to the enclosed volume adjacent to each vertex.
    VolumeWeighted,
}

/// Stress accumulation and breaking parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractureConfig {
    /// Master switch. When false no constraint is breakable and no stress accumulates.
    pub enabled: bool,
    /// Accumulated particle stress above which the particle fractures away.
    pub threshold: f32,
    /// Per-step geometric decay of particle stress, in (0, 1).
    pub stress_decay_rate: f32,
    /// Stress added per unit of downward impact speed on ground contact.
    pub impact_stress_scale: f32,
    /// Stress added per unit of strain by violated constraints.
    pub strain_stress_scale: f32,
    /// Fraction of a constraint's break threshold at which it starts loading its particles.
    pub stress_onset: f32,
    /// Distance strain `|len/rest - 1|` that breaks a distance constraint.
    pub max_strain: f32,
    /// Volume strain `|V/V0 - 1|` that breaks a volume constraint.
    pub volume_break_ratio: f32,
    /// Number of broken constraints after which the body reports itself as fractured.
    pub fractured_after_broken: usize,
}

impl Default for FractureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 3.0,
            stress_decay_rate: 0.95,
            impact_stress_scale: 0.5,
            strain_stress_scale: 1.0,
            stress_onset: 0.5,
            max_strain: 0.5,
            volume_break_ratio: 0.8,
            fractured_after_broken: 3,
        }
    }
}

/// Permanent deformation of distance constraints under sustained strain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlasticityConfig {
    /// Strain below which deformation is purely elastic.
    pub yield_strain: f32,
    /// Fraction of the excess strain absorbed into the rest length per step. 0 disables plasticity.
    pub creep_rate: f32,
    /// Largest allowed drift of the rest length from its original value, as a strain.
    pub max_plastic_strain: f32,
}

impl Default for PlasticityConfig {
    fn default() -> Self {
        Self {
            yield_strain: 0.1,
            creep_rate: 0.0,
            max_plastic_strain: 0.5,
        }
    }
}

/// Ground contact response tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Speed (m/s) below which a contact is treated as resting rather than an impact.
    pub rest_velocity: f32,
    /// Seconds of continuous slow contact before a particle is classified as resting.
    pub rest_time: f32,
    /// Fraction of velocity removed per substep from resting particles.
    pub rest_damping: f32,
    /// Apply restitution to the body's centre of mass, not only the touching particles.
    pub body_coupling: bool,
    /// Multiplier on restitution for new ground constraints. 1.0 is physically plain restitution.
    pub energy_compensation: f32,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            rest_velocity: 0.5,
            rest_time: 0.1,
            rest_damping: 0.2,
            body_coupling: true,
            energy_compensation: 1.0,
        }
    }
}

/// Configuration for a single soft body and its solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftBodyConfig {
    /// Gravity acceleration in m/s².
    pub gravity: Vec3,
    /// Linear velocity damping rate per second. 0 disables damping.
    pub global_damping: f32,
    /// Constraint relaxation passes per substep.
    pub iterations: u32,
    /// Substeps per call to `step`.
    pub substeps: u32,
    /// Lower clamp on the step size.
    pub min_dt: f32,
    /// Upper clamp on the step size.
    pub max_dt: f32,
    /// Speed ceiling in m/s.
    pub max_velocity: f32,
    /// Ceiling on external acceleration in m/s².
    pub max_acceleration: f32,
    /// Ceiling on per-substep displacement of a particle.
    pub max_displacement: f32,
    /// Distance from the origin beyond which the body is considered diverged.
    pub divergence_bound: f32,
    /// Steps between whole-body health checks.
    pub health_check_interval: u32,
    /// Compliance of edge constraints.
    pub structural_compliance: f32,
    /// Compliance of shear/bend constraints across adjacent triangles.
    pub shear_compliance: f32,
    /// Compliance of volume constraints.
    pub volume_compliance: f32,
    /// Fraction of each structural/volume correction applied per pass, in (0, 1].
    pub stiffness: f32,
    pub volume_mode: VolumeMode,
    pub mass_distribution: MassDistribution,
    /// Weight of the shape-memory pull. 0 creates no shape-memory constraints.
    pub shape_memory_stiffness: f32,
    /// Rotate shape-memory targets with the body instead of keeping the rest orientation.
    pub shape_memory_follows_rotation: bool,
    pub fracture: FractureConfig,
    pub plasticity: PlasticityConfig,
    pub contact: ContactConfig,
    /// Let measured solve time lower iterations and substeps.
    pub adaptive_quality: bool,
    /// Time budget per step in milliseconds for adaptive quality.
    pub quality_budget_ms: f32,
}

impl Default for SoftBodyConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            global_damping: 0.01,
            iterations: 8,
            substeps: 4,
            min_dt: 1.0 / 480.0,
            max_dt: 1.0 / 30.0,
            max_velocity: 50.0,
            max_acceleration: 500.0,
            max_displacement: 1.0,
            divergence_bound: 1.0e4,
            health_check_interval: 30,
            structural_compliance: 1.0e-6,
            shear_compliance: 1.0e-5,
            volume_compliance: 1.0e-7,
            stiffness: 1.0,
            volume_mode: VolumeMode::CenterTetrahedra,
            mass_distribution: MassDistribution::Uniform,
            shape_memory_stiffness: 0.02,
            shape_memory_follows_rotation: false,
            fracture: FractureConfig::default(),
            plasticity: PlasticityConfig::default(),
            contact: ContactConfig::default(),
            adaptive_quality: false,
            quality_budget_ms: 4.0,
        }
    }
}

impl SoftBodyConfig {
    /// Set the number of relaxation passes per substep.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the number of substeps per step.
    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps;
        self
    }

    /// Set the gravity vector.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the per-second damping rate.
    pub fn with_damping(mut self, global_damping: f32) -> Self {
        self.global_damping = global_damping;
        self
    }

    /// Set the volume preservation mode.
    pub fn with_volume_mode(mut self, volume_mode: VolumeMode) -> Self {
        self.volume_mode = volume_mode;
        self
    }

    /// Enable or disable fracture.
    pub fn with_fracture(mut self, enabled: bool) -> Self {
        self.fracture.enabled = enabled;
        self
    }

    /// Set the particle stress that triggers fracture.
    pub fn with_fracture_threshold(mut self, threshold: f32) -> Self {
        self.fracture.threshold = threshold;
        self
    }

    /// Set the shape-memory weight.
    pub fn with_shape_memory(mut self, stiffness: f32) -> Self {
        self.shape_memory_stiffness = stiffness;
        self
    }

    /// Check every value against its valid range.
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, msg: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(SoftBodyError::InvalidConfig(msg.to_string()))
            }
        }

        check(self.iterations >= 1, "iterations must be at least 1")?;
        check(self.substeps >= 1, "substeps must be at least 1")?;
        check(
            self.min_dt > 0.0 && self.min_dt <= self.max_dt,
            "min_dt must be positive and not exceed max_dt",
        )?;
        check(
            self.gravity.is_finite(),
            "gravity must be finite",
        )?;
        check(self.global_damping >= 0.0, "global_damping must be non-negative")?;
        check(
            self.stiffness > 0.0 && self.stiffness <= 1.0,
            "stiffness must be in (0, 1]",
        )?;
        check(
            self.structural_compliance >= 0.0
                && self.shear_compliance >= 0.0
                && self.volume_compliance >= 0.0,
            "compliance must be non-negative",
        )?;
        check(
            (0.0..=1.0).contains(&self.shape_memory_stiffness),
            "shape_memory_stiffness must be in [0, 1]",
        )?;
        check(self.max_velocity > 0.0, "max_velocity must be positive")?;
        check(self.max_acceleration > 0.0, "max_acceleration must be positive")?;
        check(self.max_displacement > 0.0, "max_displacement must be positive")?;
        check(self.divergence_bound > 0.0, "divergence_bound must be positive")?;
        check(
            self.health_check_interval >= 1,
            "health_check_interval must be at least 1",
        )?;

        let f = &self.fracture;
        check(f.threshold > 0.0, "fracture threshold must be positive")?;
        check(
            f.stress_decay_rate > 0.0 && f.stress_decay_rate < 1.0,
            "stress_decay_rate must be in (0, 1)",
        )?;
        check(
            f.stress_onset > 0.0 && f.stress_onset <= 1.0,
            "stress_onset must be in (0, 1]",
        )?;
        check(
            f.max_strain > 0.0 && f.volume_break_ratio > 0.0,
            "break thresholds must be positive",
        )?;

        let c = &self.contact;
        check(c.energy_compensation > 0.0, "energy_compensation must be positive")?;
        check(
            (0.0..=1.0).contains(&c.rest_damping),
            "rest_damping must be in [0, 1]",
        )?;

        let p = &self.plasticity;
        check(
            p.creep_rate >= 0.0 && p.creep_rate <= 1.0,
            "plastic creep_rate must be in [0, 1]",
        )?;
        Ok(())
    }
}
