//! CPU management
//!
//! This module holds the [`CpuSet`] processor-set type along with the
//! topology queries that take an arbitrary `CpuSet` as input: covering-object
//! search and exact-partition search.
//!
//! [`CpuSet`]: crate::cpu::cpuset::CpuSet

pub mod cpuset;
