//! Hardware topology trees and processor-set queries
//!
//! This crate models the hierarchical topology of a machine, including NUMA
//! memory nodes, sockets, shared caches, cores and logical processors, as a
//! tree of [`TopologyObject`]s that each span a set of logical processors.
//! On top of that tree, it answers the locality questions that thread and
//! memory placement code keeps asking:
//!
//! - Which objects sit at a given depth, and at which depth does a given
//!   object type live? See the [levels and depths] methods of [`Topology`].
//! - Which objects are closest to this one? See [`objects_closest_to()`].
//! - What is the smallest object covering this processor set? See
//!   [`smallest_object_covering_cpuset()`].
//! - How does this processor set decompose into whole hardware objects? See
//!   [`cpuset_partition()`].
//!
//! Topologies are described once through a
//! [`TopologyBuilder`](topology::builder::TopologyBuilder) and are immutable
//! afterwards. All queries take `&self`, perform no I/O and allocate at most
//! their own result, so a topology can serve queries from many threads.
//!
//! ```
//! use hwtopo::{
//!     object::{attributes::ObjectAttributes, types::ObjectType},
//!     topology::builder::TopologyBuilder,
//!     CpuSet,
//! };
//!
//! // Describe a 2-socket machine with 2 processors per socket
//! let mut builder = TopologyBuilder::new();
//! let machine = builder.insert_root(
//!     ObjectType::Machine,
//!     Some(ObjectAttributes::Machine { total_memory_kb: 8 * 1024 * 1024 }),
//! )?;
//! for socket in 0..2 {
//!     let socket_id = builder.insert_object(machine, ObjectType::Socket, Some(socket), None)?;
//!     for proc in 2 * socket..2 * (socket + 1) {
//!         builder.insert_processor(socket_id, proc)?;
//!     }
//! }
//! let topology = builder.build()?;
//!
//! // Processors 0 and 1 are covered by socket 0 alone
//! let covering = topology
//!     .smallest_object_covering_cpuset(&CpuSet::from_range(0..2))
//!     .expect("the machine spans these processors");
//! assert_eq!(covering.to_string(), "Socket#0");
//!
//! // Processors 1-2 straddle both sockets and decompose into their procs
//! let parts = topology.cpuset_partition(&CpuSet::from_range(1..3), usize::MAX)?;
//! let rendered = parts.iter().map(ToString::to_string).collect::<Vec<_>>();
//! assert_eq!(rendered, ["Proc#1", "Proc#2"]);
//! # Ok::<_, eyre::Report>(())
//! ```
//!
//! [levels and depths]: Topology#object-levels-depths-and-types
//! [`objects_closest_to()`]: Topology::objects_closest_to
//! [`smallest_object_covering_cpuset()`]: Topology::smallest_object_covering_cpuset
//! [`cpuset_partition()`]: Topology::cpuset_partition

pub mod bitmap;
pub mod cpu;
pub mod object;
#[cfg(any(test, feature = "proptest"))]
pub(crate) mod strategies;
pub mod topology;

pub use crate::{
    bitmap::Bitmap,
    cpu::cpuset::CpuSet,
    object::{types::ObjectType, TopologyObject},
    topology::Topology,
};
