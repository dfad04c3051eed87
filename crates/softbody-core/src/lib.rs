//! Soft-body simulation with position-based dynamics.
//!
//! A body is built once from a closed triangle mesh and a total mass. Its
//! vertices become particles tied together by compliant (XPBD) distance,
//! volume and shape-memory constraints, and it collides with infinite ground
//! planes. Under load the body can deform plastically or fracture.
//!
//! ```no_run
//! use glam::Vec3;
//! use softbody_core::{shapes, SoftBodyConfig, SoftBodySolver};
//!
//! let (vertices, triangles) = shapes::icosphere(Vec3::new(0.0, 5.0, 0.0), 0.5, 1);
//! let mut body = SoftBodySolver::initialize(&vertices, &triangles, 1.0, SoftBodyConfig::default())?;
//! body.add_ground_constraint(0.0, 0.6, 0.4);
//! for _ in 0..120 {
//!     body.step(1.0 / 60.0);
//! }
//! let positions = body.mesh_positions();
//! # let _ = positions;
//! # Ok::<(), softbody_core::SoftBodyError>(())
//! ```

pub mod config;
pub mod constraints;
pub mod error;
pub mod fracture;
pub mod materials;
pub mod math;
pub mod particle;
pub mod quality;
pub mod shapes;
pub mod solver;
pub mod topology;

pub use config::{
    ContactConfig, FractureConfig, MassDistribution, PlasticityConfig, SoftBodyConfig, VolumeMode,
};
pub use error::{Result, SoftBodyError};
pub use materials::MaterialPreset;
pub use quality::SolverStats;
pub use solver::SoftBodySolver;
