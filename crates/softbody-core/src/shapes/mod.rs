//! Procedural triangle meshes used as solver input.
//!
//! Every generator returns `(vertices, triangles)` with counter-clockwise
//! winding seen from outside, ready for
//! [`SoftBodySolver::initialize`](crate::solver::SoftBodySolver::initialize).
pub mod primitives;

pub use primitives::{box_mesh, icosphere, tetrahedron};
