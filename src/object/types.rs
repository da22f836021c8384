//! Object types

use strum::{Display, EnumIter, IntoStaticStr};

/// Represents the type of a [`TopologyObject`]
///
/// Variants are declared in nesting order: `A < B` when objects of type `A`
/// contain objects of type `B`. [`ObjectType::Machine`] is always the
/// outermost type and [`ObjectType::Proc`] the innermost, so the derived
/// ordering compares the canonical depths of two types.
///
/// [`TopologyObject`]: crate::object::TopologyObject
#[derive(
    Copy, Clone, Debug, Display, EnumIter, Eq, Hash, IntoStaticStr, Ord, PartialEq, PartialOrd,
)]
pub enum ObjectType {
    /// The root object, a set of processors and memory with cache coherency
    ///
    /// This type is always used for the root object of a topology, and never
    /// used anywhere else. Hence it never has a parent.
    Machine,

    /// Duplicate grouping level exposed by the OS that does not actually
    /// partition processors differently from its surroundings
    ///
    /// A `Fake` object's cpuset equals that of its parent or of its single
    /// child. Queries treat these levels as transparent: they never widen
    /// nor narrow a processor span.
    Fake,

    /// NUMA node, a set of processors around memory with uniform access
    /// latency
    NUMANode,

    /// Physical package, what goes into a physical motherboard socket
    Socket,

    /// Data cache shared by a set of processors
    ///
    /// The level within the cache hierarchy (L1, L2, ...) is carried by the
    /// object's [`Cache` attributes].
    ///
    /// [`Cache` attributes]: crate::object::attributes::ObjectAttributes::Cache
    Cache,

    /// A computation unit (may be shared by several logical processors, e.g.
    /// in the case of an SMT core)
    Core,

    /// (Logical) processor, the leaf of the processor hierarchy
    ///
    /// Objects of this type span exactly one logical processor index.
    Proc,
}

impl ObjectType {
    /// Name of this type as used in textual renderings
    ///
    /// # Examples
    ///
    /// ```
    /// use hwtopo::object::types::ObjectType;
    ///
    /// assert_eq!(ObjectType::NUMANode.name(), "NUMANode");
    /// ```
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Truth that objects of this type carry a memory amount
    pub fn has_memory(self) -> bool {
        matches!(self, Self::Machine | Self::NUMANode | Self::Cache)
    }

    /// Truth that this type is a leaf of the processor hierarchy and cannot
    /// have children
    pub fn is_leaf(self) -> bool {
        self == Self::Proc
    }
}
