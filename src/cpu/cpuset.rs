//! CPU sets
//!
//! The [`CpuSet`] newtype and the two topology searches that consume an
//! arbitrary `CpuSet` query: finding the deepest object covering a set, and
//! decomposing a set into the topology objects that exactly partition it.

use crate::{bitmap::Bitmap, object::TopologyObject, topology::Topology};
use derive_more::{AsRef, Deref, Display, From, Into};
#[allow(unused)]
#[cfg(test)]
use similar_asserts::assert_eq;
use std::{
    borrow::Borrow,
    ops::{BitAnd, BitOr, BitOrAssign, RangeBounds, Sub},
};
use thiserror::Error;

/// A `CpuSet` is a [`Bitmap`] whose bits are set according to logical
/// processor indices
///
/// Every topology object spans one, and all cpuset-driven queries
/// ([`Topology::smallest_object_covering_cpuset()`],
/// [`Topology::cpuset_partition()`]) take one as input.
///
/// The read-only [`Bitmap`] API is available through `Deref`; mutations and
/// set-to-set comparisons are forwarded below so that they can be written
/// directly against `CpuSet`.
#[derive(AsRef, Clone, Debug, Default, Deref, Display, Eq, From, Hash, Into, PartialEq)]
pub struct CpuSet(Bitmap);

impl CpuSet {
    /// Create an empty cpuset
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cpuset with all processor indices of `range` set
    ///
    /// # Panics
    ///
    /// Panics if the upper end of `range` is unbounded, see
    /// [`Bitmap::from_range()`].
    pub fn from_range(range: impl RangeBounds<usize>) -> Self {
        Self(Bitmap::from_range(range))
    }

    /// Set the bit at processor index `idx`
    pub fn set(&mut self, idx: usize) {
        self.0.set(idx);
    }

    /// Clear the bit at processor index `idx`
    pub fn unset(&mut self, idx: usize) {
        self.0.unset(idx);
    }

    /// Clear all bits
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Make this cpuset a copy of `other`, reusing the existing storage
    pub fn copy_from(&mut self, other: &Self) {
        self.0.copy_from(&other.0);
    }

    /// Truth that `inner` is a subset of `self`
    pub fn includes(&self, inner: &Self) -> bool {
        self.0.includes(&inner.0)
    }

    /// Truth that `self` and `rhs` have at least one processor in common
    pub fn intersects(&self, rhs: &Self) -> bool {
        self.0.intersects(&rhs.0)
    }
}

impl<B: Borrow<CpuSet>> BitAnd<B> for &CpuSet {
    type Output = CpuSet;

    fn bitand(self, rhs: B) -> CpuSet {
        CpuSet(&self.0 & &rhs.borrow().0)
    }
}

impl<B: Borrow<Self>> BitAnd<B> for CpuSet {
    type Output = Self;

    fn bitand(self, rhs: B) -> Self {
        Self(self.0 & &rhs.borrow().0)
    }
}

impl<B: Borrow<CpuSet>> BitOr<B> for &CpuSet {
    type Output = CpuSet;

    fn bitor(self, rhs: B) -> CpuSet {
        CpuSet(&self.0 | &rhs.borrow().0)
    }
}

impl<B: Borrow<Self>> BitOr<B> for CpuSet {
    type Output = Self;

    fn bitor(self, rhs: B) -> Self {
        Self(self.0 | &rhs.borrow().0)
    }
}

impl<B: Borrow<Self>> BitOrAssign<B> for CpuSet {
    fn bitor_assign(&mut self, rhs: B) {
        self.0 |= &rhs.borrow().0;
    }
}

impl<B: Borrow<CpuSet>> Sub<B> for &CpuSet {
    type Output = CpuSet;

    fn sub(self, rhs: B) -> CpuSet {
        CpuSet(&self.0 - &rhs.borrow().0)
    }
}

impl From<usize> for CpuSet {
    /// Cpuset with the single processor index `idx` set
    fn from(idx: usize) -> Self {
        Self(Bitmap::from(idx))
    }
}

impl<I: Borrow<usize>> FromIterator<I> for CpuSet {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self(Bitmap::from_iter(iter))
    }
}

#[cfg(any(test, feature = "proptest"))]
impl proptest::prelude::Arbitrary for CpuSet {
    type Parameters = <Bitmap as proptest::prelude::Arbitrary>::Parameters;
    type Strategy = proptest::strategy::Map<
        <Bitmap as proptest::prelude::Arbitrary>::Strategy,
        fn(Bitmap) -> Self,
    >;

    fn arbitrary_with(params: Self::Parameters) -> Self::Strategy {
        use proptest::prelude::*;
        Bitmap::arbitrary_with(params).prop_map(Self as fn(Bitmap) -> Self)
    }
}

/// # Finding objects covering at least a CPU set
impl Topology {
    /// Get the deepest object covering the given cpuset `set`, if any
    ///
    /// Returns `None` if `set` reaches outside the root cpuset, i.e. contains
    /// a processor index that does not exist in this machine.
    ///
    /// Since the empty set is included in every cpuset, querying it descends
    /// through first children all the way down to the machine's first leaf
    /// object.
    ///
    /// # Examples
    ///
    /// ```
    /// use hwtopo::{cpu::cpuset::CpuSet, object::types::ObjectType, topology::Topology};
    ///
    /// // 2 sockets of 4 processors each
    /// let topology = Topology::test_instance();
    /// let socket0 = topology
    ///     .smallest_object_covering_cpuset(&CpuSet::from_range(2..4))
    ///     .expect("the query is part of the machine");
    /// assert_eq!(socket0.object_type(), ObjectType::Socket);
    /// assert_eq!(*socket0.cpuset(), CpuSet::from_range(0..4));
    /// ```
    pub fn smallest_object_covering_cpuset(&self, set: &CpuSet) -> Option<&TopologyObject> {
        let mut current = self.root_object();
        if !current.cpuset().includes(set) {
            return None;
        }
        'descend: loop {
            for child in self.children(current) {
                if child.cpuset().includes(set) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }
}

/// # Decomposing a CPU set into topology objects
impl Topology {
    /// Get up to `max` objects whose cpusets partition the given cpuset `set`
    ///
    /// The tree is walked depth-first in children order, and an object is
    /// emitted as soon as its cpuset exactly equals the part of `set` that
    /// its subtree is responsible for. The result is therefore the coarsest
    /// decomposition of `set` into existing objects, in physical order.
    ///
    /// `max` is a hard capacity: once that many objects have been gathered,
    /// the walk stops and the partial result is returned. Callers that need
    /// completeness must re-invoke with a larger `max`. A `max` of zero
    /// yields an empty result.
    ///
    /// Parts of `set` that do not line up with any object's cpuset (possible
    /// when the machine's leaf objects span several processors each) are
    /// silently absent from the output.
    ///
    /// # Errors
    ///
    /// - [`UnreachableQueryError`] if `set` is not included in the root
    ///   cpuset (in which case no combination of topology objects can cover
    ///   it)
    ///
    /// # Examples
    ///
    /// ```
    /// use hwtopo::{cpu::cpuset::CpuSet, topology::Topology};
    ///
    /// // 2 sockets of 4 processors each
    /// let topology = Topology::test_instance();
    /// let parts = topology.cpuset_partition(&CpuSet::from_range(0..4), 8)?;
    /// assert_eq!(parts.len(), 1, "processors 0-3 are exactly the first socket");
    /// # Ok::<_, eyre::Report>(())
    /// ```
    pub fn cpuset_partition(
        &self,
        set: &CpuSet,
        max: usize,
    ) -> Result<Vec<&TopologyObject>, UnreachableQueryError> {
        let root = self.root_object();
        if !root.cpuset().includes(set) {
            return Err(UnreachableQueryError {
                query: set.clone(),
                root: root.cpuset().clone(),
            });
        }
        let mut result = Vec::new();
        if max > 0 {
            self.partition_subset(root, set, max, &mut result);
        }
        Ok(result)
    }

    /// Recursive step of [`cpuset_partition()`](Self::cpuset_partition)
    ///
    /// The caller must ensure that `result` has room left (`result.len() <
    /// max`) and that `subset` is a nonempty subset of `current`'s cpuset.
    fn partition_subset<'self_>(
        &'self_ self,
        current: &'self_ TopologyObject,
        subset: &CpuSet,
        max: usize,
        result: &mut Vec<&'self_ TopologyObject>,
    ) {
        if current.cpuset() == subset {
            result.push(current);
            return;
        }
        for child in self.children(current) {
            // Split out the part of the target this child is responsible for
            let child_subset = subset & child.cpuset();
            if child_subset.is_empty() {
                continue;
            }
            self.partition_subset(child, &child_subset, max, result);
            if result.len() == max {
                return;
            }
        }
    }
}

/// Error returned by [`Topology::cpuset_partition()`] when the query cpuset
/// is not a subset of the root (machine-wide) cpuset
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("query cpuset {query} is not included in the root cpuset {root}")]
pub struct UnreachableQueryError {
    /// Requested cpuset
    pub query: CpuSet,

    /// Root cpuset covering all processors in the topology
    pub root: CpuSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use crate::{
        object::{attributes::ObjectAttributes, types::ObjectType},
        strategies::query_cpuset,
        topology::builder::TopologyBuilder,
    };
    use proptest::prelude::*;
    use std::ptr;

    #[test]
    fn cpuset_newtype_forwards_bitmap() {
        let mut set = CpuSet::from_range(0..4);
        set.set(6);
        set.unset(1);
        assert_eq!(set.to_string(), "0,2-3,6");
        assert_eq!(set.weight(), 4);
        assert!(set.includes(&CpuSet::from(6)));
        assert!(!set.includes(&CpuSet::from(1)));
        assert_eq!(&set & &CpuSet::from_range(0..2), CpuSet::from(0));
        assert_eq!(
            &set | &CpuSet::from(1),
            [0usize, 1, 2, 3, 6].into_iter().collect::<CpuSet>()
        );
    }

    #[test]
    fn covering_object_descends_to_socket() {
        let topology = Topology::test_instance();
        let socket = topology
            .smallest_object_covering_cpuset(&CpuSet::from_iter([2usize, 3]))
            .expect("query is inside the machine");
        assert_eq!(socket.object_type(), ObjectType::Socket);
        assert_eq!(socket.os_index(), Some(0));
    }

    #[test]
    fn covering_object_crossing_sockets_is_machine() {
        let topology = Topology::test_instance();
        let machine = topology
            .smallest_object_covering_cpuset(&CpuSet::from_iter([3usize, 4]))
            .expect("query is inside the machine");
        assert!(ptr::eq(machine, topology.root_object()));
    }

    #[test]
    fn covering_object_of_unreachable_query_is_none() {
        let topology = Topology::test_instance();
        assert!(topology
            .smallest_object_covering_cpuset(&CpuSet::from(8))
            .is_none());
    }

    #[test]
    fn empty_query_is_covered_by_first_leaf() {
        let topology = Topology::test_instance();
        let leaf = topology
            .smallest_object_covering_cpuset(&CpuSet::new())
            .expect("the empty set is included in the root cpuset");
        assert_eq!(leaf.object_type(), ObjectType::Proc);
        assert_eq!(leaf.os_index(), Some(0));
    }

    #[test]
    fn partition_of_root_cpuset_is_root() {
        let topology = Topology::test_instance();
        let root = topology.root_object();
        let parts = topology
            .cpuset_partition(root.cpuset(), usize::MAX)
            .expect("the root cpuset is trivially reachable");
        assert_eq!(parts.len(), 1);
        assert!(ptr::eq(parts[0], root));
    }

    #[test]
    fn partition_decomposes_to_procs() {
        let topology = Topology::test_instance();
        let parts = topology
            .cpuset_partition(&CpuSet::from_iter([0usize, 1, 4]), 8)
            .expect("query is inside the machine");
        let expected = [0usize, 1, 4];
        assert_eq!(parts.len(), expected.len());
        for (part, os_index) in parts.iter().zip(expected) {
            assert_eq!(part.object_type(), ObjectType::Proc);
            assert_eq!(part.os_index(), Some(os_index));
        }
    }

    #[test]
    fn partition_capacity_is_a_hard_cutoff() {
        let topology = Topology::test_instance();
        let query = CpuSet::from_iter([0usize, 1, 4]);
        let parts = topology
            .cpuset_partition(&query, 2)
            .expect("query is inside the machine");
        assert_eq!(parts.len(), 2);
        assert!(topology
            .cpuset_partition(&query, 0)
            .expect("still reachable")
            .is_empty());
    }

    #[test]
    fn partition_of_unreachable_query_errors_out() {
        let topology = Topology::test_instance();
        let query = CpuSet::from_iter([0usize, 11]);
        let error = topology
            .cpuset_partition(&query, 8)
            .expect_err("processor 11 does not exist in this machine");
        assert_eq!(
            error,
            UnreachableQueryError {
                query,
                root: topology.root_object().cpuset().clone(),
            }
        );
    }

    #[test]
    fn unaligned_partition_residue_is_dropped() {
        // Machine whose leaves span two processors each
        let mut builder = TopologyBuilder::new();
        let machine = builder
            .insert_root(
                ObjectType::Machine,
                Some(ObjectAttributes::Machine {
                    total_memory_kb: 1024,
                }),
            )
            .unwrap();
        for core in 0..2 {
            builder
                .insert_object_with_cpuset(
                    machine,
                    ObjectType::Core,
                    Some(core),
                    None,
                    CpuSet::from_range(2 * core..2 * (core + 1)),
                )
                .unwrap();
        }
        let topology = builder.build().unwrap();

        // {0, 2} does not line up with either core, so nothing is emitted
        let parts = topology
            .cpuset_partition(&CpuSet::from_iter([0usize, 2]), 8)
            .expect("query is inside the machine");
        assert!(parts.is_empty());

        // {0, 1, 2} decomposes to the first core, with {2} dropped
        let parts = topology
            .cpuset_partition(&CpuSet::from_range(0..3), 8)
            .expect("query is inside the machine");
        assert_eq!(parts.len(), 1);
        assert_eq!(*parts[0].cpuset(), CpuSet::from_range(0..2));
    }

    proptest! {
        /// Covering monotonicity: the result's cpuset always includes the query
        #[test]
        fn covering_object_includes_query(set in query_cpuset()) {
            let topology = Topology::test_instance();
            match topology.smallest_object_covering_cpuset(&set) {
                Some(obj) => prop_assert!(obj.cpuset().includes(&set)),
                None => prop_assert!(!topology.root_object().cpuset().includes(&set)),
            }
        }

        /// On a machine with single-processor leaves, every reachable query
        /// is exactly partitioned by pairwise-disjoint objects
        #[test]
        fn partition_unions_back_to_query(set in query_cpuset()) {
            let topology = Topology::test_instance();
            match topology.cpuset_partition(&set, usize::MAX) {
                Ok(parts) => {
                    let mut union = CpuSet::new();
                    for part in &parts {
                        prop_assert!(!union.intersects(part.cpuset()));
                        union |= part.cpuset();
                    }
                    prop_assert_eq!(union, set);
                }
                Err(e) => {
                    prop_assert!(!topology.root_object().cpuset().includes(&set));
                    prop_assert_eq!(e.query, set);
                }
            }
        }
    }
}
