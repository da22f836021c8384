//! Object attributes
//!
//! Some object types carry a type-specific payload in addition to the common
//! header (type, cpuset, depth, indices): memory-bearing types know how much
//! memory they hold, and caches know their level within the cache hierarchy.
//! [`ObjectAttributes`] is the tagged union of these payloads.

use crate::object::types::ObjectType;

/// Type-specific attribute payload of a [`TopologyObject`]
///
/// Socket, Core, Proc and Fake objects have no payload and carry no
/// `ObjectAttributes` at all.
///
/// [`TopologyObject`]: crate::object::TopologyObject
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum ObjectAttributes {
    /// [`ObjectType::Machine`]-specific attributes
    Machine {
        /// Total memory of the machine, in kilobytes
        total_memory_kb: u64,
    },

    /// [`ObjectType::NUMANode`]-specific attributes
    NUMANode {
        /// Local memory of the node, in kilobytes
        local_memory_kb: u64,
    },

    /// [`ObjectType::Cache`]-specific attributes
    Cache {
        /// Size of the cache, in kilobytes
        size_kb: u64,

        /// Level of the cache within the cache hierarchy (1 for L1, ...)
        level: u32,
    },
}

impl ObjectAttributes {
    /// Object type this payload belongs to
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Machine { .. } => ObjectType::Machine,
            Self::NUMANode { .. } => ObjectType::NUMANode,
            Self::Cache { .. } => ObjectType::Cache,
        }
    }

    /// Memory amount in kilobytes, for memory-bearing types
    pub fn memory_kb(&self) -> u64 {
        match *self {
            Self::Machine { total_memory_kb } => total_memory_kb,
            Self::NUMANode { local_memory_kb } => local_memory_kb,
            Self::Cache { size_kb, .. } => size_kb,
        }
    }

    /// Cache hierarchy level, for caches only
    pub fn cache_level(&self) -> Option<u32> {
        match *self {
            Self::Cache { level, .. } => Some(level),
            _ => None,
        }
    }
}
