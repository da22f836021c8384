//! Topology tree
//!
//! A [`Topology`] is the finished description of one machine: a tree of
//! [`TopologyObject`]s rooted at the whole machine, additionally indexed by
//! a flat per-depth "levels" array for O(1) random access, plus a
//! type-to-depth lookup table.
//!
//! Topologies are assembled once through a [`TopologyBuilder`] and are
//! immutable afterwards: every query takes `&self`, performs no I/O and
//! completes in time bounded by the tree height or by its own capacity
//! parameter, so topologies can be shared freely across threads.
//!
//! [`TopologyBuilder`]: crate::topology::builder::TopologyBuilder

pub mod builder;

use crate::object::{
    depth::{TypeToDepthError, TypeToDepthResult},
    types::ObjectType,
    ObjectIndex, TopologyObject,
};
#[allow(unused)]
#[cfg(test)]
use similar_asserts::assert_eq;
use std::{collections::HashMap, iter::FusedIterator, ptr, sync::OnceLock};

/// Finished, read-only description of one machine's hardware hierarchy
///
/// See the [module-level documentation](self) for an overview, and the
/// query families implemented on this type:
///
/// - levels and depths: [here](#object-levels-depths-and-types)
/// - nearby objects: [`objects_closest_to()`]
/// - cpuset covering: [`smallest_object_covering_cpuset()`]
/// - cpuset decomposition: [`cpuset_partition()`]
///
/// [`objects_closest_to()`]: Self::objects_closest_to
/// [`smallest_object_covering_cpuset()`]: Self::smallest_object_covering_cpuset
/// [`cpuset_partition()`]: Self::cpuset_partition
#[derive(Clone, Debug)]
pub struct Topology {
    /// Object arena, the backing store that [`ObjectIndex`] points into
    ///
    /// Invariant: `objects[i].index == i`, parent/children indices all fall
    /// within the arena, and the root is the only parent-less object.
    pub(crate) objects: Vec<TopologyObject>,

    /// Per-depth object index, in physical order; `levels[0]` is the root
    pub(crate) levels: Vec<Vec<ObjectIndex>>,

    /// Canonical depth of each object type present in the topology
    pub(crate) type_to_depth: HashMap<ObjectType, TypeToDepthResult>,
}

/// # Object levels, depths and types
impl Topology {
    /// Depth of the hierarchical tree of objects
    ///
    /// # Examples
    ///
    /// ```
    /// let topology = hwtopo::Topology::test_instance();
    /// assert!(topology.depth() >= 2, "Machine and Proc levels are always present");
    /// ```
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Depth of the objects of type `object_type`
    ///
    /// # Errors
    ///
    /// - [`TypeToDepthError::Nonexistent`] if no object of this type is
    ///   present in the topology
    /// - [`TypeToDepthError::Multiple`] if objects of this type exist at
    ///   multiple depths (e.g. an asymmetric cache hierarchy)
    ///
    /// # Examples
    ///
    /// ```
    /// use hwtopo::object::types::ObjectType;
    ///
    /// let topology = hwtopo::Topology::test_instance();
    /// assert_eq!(topology.depth_for_type(ObjectType::Machine), Ok(0));
    /// ```
    pub fn depth_for_type(&self, object_type: ObjectType) -> TypeToDepthResult {
        self.type_to_depth
            .get(&object_type)
            .copied()
            .unwrap_or(Err(TypeToDepthError::Nonexistent))
    }

    /// Type of the objects at depth `depth`, or `None` if `depth` is out of
    /// range
    pub fn type_at_depth(&self, depth: usize) -> Option<ObjectType> {
        let first = *self.levels.get(depth)?.first()?;
        Some(self.object_ref(first).object_type())
    }

    /// Number of objects at depth `depth`, `0` if `depth` is out of range
    pub fn num_objects_at_depth(&self, depth: usize) -> usize {
        self.levels.get(depth).map_or(0, Vec::len)
    }

    /// Object at depth `depth` and position `idx` within that depth, or
    /// `None` if either is out of range
    pub fn object_at_depth(&self, depth: usize, idx: usize) -> Option<&TopologyObject> {
        let index = *self.levels.get(depth)?.get(idx)?;
        Some(self.object_ref(index))
    }

    /// Objects at depth `depth`, in physical order
    ///
    /// An empty iterator is returned when `depth` is out of range.
    pub fn objects_at_depth(
        &self,
        depth: usize,
    ) -> impl DoubleEndedIterator<Item = &TopologyObject>
           + Clone
           + ExactSizeIterator
           + FusedIterator {
        const EMPTY: &[ObjectIndex] = &[];
        self.levels
            .get(depth)
            .map_or(EMPTY, Vec::as_slice)
            .iter()
            .map(move |&index| self.object_ref(index))
    }

    /// Root object of the topology, spanning the whole machine
    pub fn root_object(&self) -> &TopologyObject {
        // The builder cannot produce a topology without a root
        &self.objects[0]
    }

    /// Object designated by `index`, or `None` if `index` does not belong to
    /// this topology
    pub fn object(&self, index: ObjectIndex) -> Option<&TopologyObject> {
        self.objects.get(usize::from(index))
    }

    /// Truth that `obj` is one of this topology's objects
    pub fn contains(&self, obj: &TopologyObject) -> bool {
        self.object(obj.index())
            .is_some_and(|candidate| ptr::eq(candidate, obj))
    }

    /// Parent of `obj`, `None` for the root
    pub fn parent(&self, obj: &TopologyObject) -> Option<&TopologyObject> {
        self.object(obj.parent_index()?)
    }

    /// Children of `obj`, in physical order
    pub fn children<'self_>(
        &'self_ self,
        obj: &'self_ TopologyObject,
    ) -> impl DoubleEndedIterator<Item = &'self_ TopologyObject>
           + Clone
           + ExactSizeIterator
           + FusedIterator {
        obj.child_indices()
            .iter()
            .map(move |&index| self.object_ref(index))
    }

    /// Ancestors of `obj`, from its parent up to the root
    pub fn ancestors<'self_>(
        &'self_ self,
        obj: &'self_ TopologyObject,
    ) -> impl Iterator<Item = &'self_ TopologyObject> + Clone + FusedIterator {
        std::iter::successors(self.parent(obj), move |ancestor| self.parent(ancestor))
    }

    /// Resolve an arena index that is known to come from this topology
    pub(crate) fn object_ref(&self, index: ObjectIndex) -> &TopologyObject {
        &self.objects[usize::from(index)]
    }
}

/// # Test topology
impl Topology {
    /// Reference topology used by unit tests and documentation examples
    ///
    /// A uniform machine with 16GB of memory and 2 sockets of 4
    /// single-threaded cores each, exposed as Proc objects 0-7: processors
    /// 0-3 live on socket 0 and processors 4-7 on socket 1.
    pub fn test_instance() -> &'static Self {
        static INSTANCE: OnceLock<Topology> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            use crate::object::attributes::ObjectAttributes;
            use builder::TopologyBuilder;

            let mut builder = TopologyBuilder::new();
            let machine = builder
                .insert_root(
                    ObjectType::Machine,
                    Some(ObjectAttributes::Machine {
                        total_memory_kb: 16 * 1024 * 1024,
                    }),
                )
                .expect("the builder is empty");
            for socket in 0..2 {
                let socket_id = builder
                    .insert_object(machine, ObjectType::Socket, Some(socket), None)
                    .expect("machine is a valid parent");
                for proc in 4 * socket..4 * (socket + 1) {
                    builder
                        .insert_processor(socket_id, proc)
                        .expect("socket is a valid parent");
                }
            }
            builder
                .build()
                .expect("the test topology is a valid machine description")
        })
    }
}
