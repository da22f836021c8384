//! Common strategies for property-based testing
//!
//! Every proptest [`Strategy`] that more than one module needs is centralized
//! here; single-module strategies live next to their tests.

use crate::cpu::cpuset::CpuSet;
use proptest::{
    collection::BTreeSetStrategy,
    prelude::*,
    strategy::{Map, TupleUnion, WA},
};
use std::{collections::BTreeSet, ops::Range};

/// Generate a cpuset to query a topology with
///
/// Biased towards sets that fall within the processor range of
/// [`Topology::test_instance()`], with a minority of sets reaching past it so
/// that unreachable-query paths get exercised too. Empty sets do come up.
///
/// [`Topology::test_instance()`]: crate::topology::Topology::test_instance
pub(crate) fn query_cpuset() -> QueryCpuSet {
    prop_oneof![
        4 => prop::collection::btree_set(0..8usize, 0..=8).prop_map(set_to_cpuset as SetToCpuSet),
        1 => prop::collection::btree_set(0..12usize, 1..=12).prop_map(set_to_cpuset as SetToCpuSet),
    ]
}

/// Strategy emitted by [`query_cpuset()`]
pub(crate) type QueryCpuSet = TupleUnion<(
    WA<Map<BTreeSetStrategy<Range<usize>>, SetToCpuSet>>,
    WA<Map<BTreeSetStrategy<Range<usize>>, SetToCpuSet>>,
)>;

/// Conversion step of [`query_cpuset()`]
type SetToCpuSet = fn(BTreeSet<usize>) -> CpuSet;

/// Turn a generated set of processor indices into a [`CpuSet`]
fn set_to_cpuset(set: BTreeSet<usize>) -> CpuSet {
    set.into_iter().collect()
}
