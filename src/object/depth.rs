//! Object depth
//!
//! A topology is a tree of [`TopologyObject`]s, additionally indexed by a
//! flat per-depth levels array. Most object types appear at a single,
//! canonical depth of that array, which makes depth the cheap way to look
//! objects of a type up. Asymmetric machines break this assumption for some
//! types (e.g. a Cache type present at several levels of the hierarchy),
//! which is what [`TypeToDepthError::Multiple`] reports.
//!
//! [`TopologyObject`]: crate::object::TopologyObject

use thiserror::Error;

/// Error from a query looking for the depth of a certain object type
#[derive(Copy, Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum TypeToDepthError {
    /// No object of the requested type exists in the topology
    #[error("no object of given type exists in the topology")]
    Nonexistent,

    /// Objects of the requested type exist at different depths in the
    /// topology
    #[error("objects of given type exist at different depths in the topology")]
    Multiple,
}

/// Result from a query looking for the depth of a certain object type
pub type TypeToDepthResult = Result<usize, TypeToDepthError>;
