//! Topology objects
//!
//! A [`TopologyObject`] is one node of the topology tree: a hardware entity
//! (machine, NUMA node, socket, cache, core, logical processor...) together
//! with the processor set it spans and its position within the tree.
//!
//! Objects are owned by the [`Topology`] they belong to, in an arena indexed
//! by [`ObjectIndex`]. Parent/child links are plain arena indices, which is
//! what lets the tree carry both an owning downward relation and a
//! non-owning upward back-reference without reference cycles. Navigation
//! therefore goes through the topology: see [`Topology::parent()`],
//! [`Topology::children()`] and [`Topology::ancestors()`].
//!
//! [`Topology`]: crate::topology::Topology
//! [`Topology::parent()`]: crate::topology::Topology::parent
//! [`Topology::children()`]: crate::topology::Topology::children
//! [`Topology::ancestors()`]: crate::topology::Topology::ancestors

pub mod attributes;
pub mod depth;
pub mod formatting;
pub mod search;
pub mod types;

use self::{attributes::ObjectAttributes, types::ObjectType};
use crate::cpu::cpuset::CpuSet;
use derive_more::{Display, From, Into};
#[allow(unused)]
#[cfg(test)]
use similar_asserts::assert_eq;
use std::fmt;

/// Identifier of a [`TopologyObject`] within its topology's object arena
///
/// Indices are assigned in insertion order at construction time and are
/// stable for the lifetime of the topology.
#[derive(Copy, Clone, Debug, Display, Eq, From, Hash, Into, Ord, PartialEq, PartialOrd)]
pub struct ObjectIndex(usize);

/// Hardware entity at one node of the topology tree
///
/// See the [module-level documentation](self) for an overview.
#[derive(Clone, Debug)]
pub struct TopologyObject {
    /// Type of this object
    pub(crate) object_type: ObjectType,

    /// Type-specific attribute payload, if this type carries one
    pub(crate) attributes: Option<ObjectAttributes>,

    /// Set of logical processors this object spans
    pub(crate) cpuset: CpuSet,

    /// Depth of this object, i.e. index of its level in the levels array
    pub(crate) depth: usize,

    /// OS/firmware-reported physical index, if any
    ///
    /// `None` models entities the OS does not number, e.g. caches on most
    /// platforms.
    pub(crate) os_index: Option<usize>,

    /// This object's own arena index
    pub(crate) index: ObjectIndex,

    /// Arena index of the parent object, `None` for the root
    pub(crate) parent: Option<ObjectIndex>,

    /// Arena indices of the children, in physical order
    pub(crate) children: Vec<ObjectIndex>,
}

impl TopologyObject {
    /// Type of this object
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Type-specific attributes, if this object's type carries any
    pub fn attributes(&self) -> Option<&ObjectAttributes> {
        self.attributes.as_ref()
    }

    /// Set of logical processors this object spans
    pub fn cpuset(&self) -> &CpuSet {
        &self.cpuset
    }

    /// Depth of this object in the topology tree
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// OS/firmware-reported physical index, if any
    pub fn os_index(&self) -> Option<usize> {
        self.os_index
    }

    /// This object's identifier within its topology
    pub fn index(&self) -> ObjectIndex {
        self.index
    }

    /// Arena index of this object's parent, `None` for the root
    pub fn parent_index(&self) -> Option<ObjectIndex> {
        self.parent
    }

    /// Arena indices of this object's children, in physical order
    pub fn child_indices(&self) -> &[ObjectIndex] {
        &self.children
    }

    /// Number of children
    pub fn arity(&self) -> usize {
        self.children.len()
    }
}

impl fmt::Display for TopologyObject {
    /// Renders like [`formatting::format_object()`] with a `"#"` physical
    /// index prefix, e.g. `"Socket#0"` or `"Machine(16GB)"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatting::render_object(f, self, "#")
    }
}
