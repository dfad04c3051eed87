//! Error types for soft-body initialization and configuration.
//!
//! Only setup can fail. Stepping never returns an error: numerical trouble is
//! repaired in place and fracture is an ordinary state change.

use thiserror::Error;

/// Errors raised while building a solver from a mesh or validating a config.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoftBodyError {
    /// The vertex list was empty.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// The triangle index list is not a multiple of three.
    #[error("triangle index list has length {len}, expected a multiple of 3")]
    MalformedTriangles { len: usize },

    /// A triangle references a vertex that does not exist.
    #[error("triangle references vertex {index} but mesh has {vertex_count} vertices")]
    VertexOutOfBounds { index: u32, vertex_count: usize },

    /// A vertex position contains NaN or infinity.
    #[error("vertex {index} has a non-finite position")]
    NonFiniteVertex { index: usize },

    /// Total mass must be positive and finite.
    #[error("total mass must be positive and finite, got {0}")]
    InvalidMass(f32),

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for `Result<T, SoftBodyError>`.
pub type Result<T> = std::result::Result<T, SoftBodyError>;
