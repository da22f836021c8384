//! End-to-end queries against a reference machine
//!
//! Builds the 2-socket, 8-processor reference machine from scratch and runs
//! every query family against it, checking exact results rather than the
//! per-module properties that unit tests already cover.

use hwtopo::{
    object::{
        attributes::ObjectAttributes,
        depth::TypeToDepthError,
        formatting::{format_object, format_object_set_union},
        types::ObjectType,
        TopologyObject,
    },
    topology::{builder::TopologyBuilder, Topology},
    CpuSet,
};
use similar_asserts::assert_eq;

/// 2 sockets of 4 single-threaded cores each, exposed as procs 0-7
fn reference_machine() -> Topology {
    let mut builder = TopologyBuilder::new();
    let machine = builder
        .insert_root(
            ObjectType::Machine,
            Some(ObjectAttributes::Machine {
                total_memory_kb: 16 * 1024 * 1024,
            }),
        )
        .expect("the builder starts empty");
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
    builder.build().expect("this machine description is valid")
}

/// OS indices of a query result, for compact comparisons
fn os_indices(objects: &[&TopologyObject]) -> Vec<usize> {
    objects
        .iter()
        .map(|obj| obj.os_index().expect("result objects are OS-numbered"))
        .collect()
}

#[test]
fn levels_and_depths() {
    let topology = reference_machine();
    assert_eq!(topology.depth(), 3);

    assert_eq!(topology.depth_for_type(ObjectType::Machine), Ok(0));
    assert_eq!(topology.depth_for_type(ObjectType::Socket), Ok(1));
    assert_eq!(topology.depth_for_type(ObjectType::Proc), Ok(2));
    assert_eq!(
        topology.depth_for_type(ObjectType::NUMANode),
        Err(TypeToDepthError::Nonexistent)
    );

    for (depth, ty, count) in [
        (0, ObjectType::Machine, 1),
        (1, ObjectType::Socket, 2),
        (2, ObjectType::Proc, 8),
    ] {
        assert_eq!(topology.type_at_depth(depth), Some(ty));
        assert_eq!(topology.num_objects_at_depth(depth), count);
        assert_eq!(topology.objects_at_depth(depth).count(), count);
        for idx in 0..count {
            let obj = topology
                .object_at_depth(depth, idx)
                .expect("idx is in range");
            assert_eq!(obj.object_type(), ty);
            assert_eq!(obj.depth(), depth);
        }
        assert!(topology.object_at_depth(depth, count).is_none());
    }
    assert_eq!(topology.type_at_depth(3), None);
    assert_eq!(topology.num_objects_at_depth(3), 0);
}

#[test]
fn closest_objects() {
    let topology = reference_machine();
    let proc6 = topology.object_at_depth(2, 6).expect("8 procs at depth 2");

    // Socket 1's other procs first in physical order, then socket 0's
    let neighbors = topology
        .objects_closest_to(proc6, usize::MAX)
        .expect("proc6 belongs to this topology");
    assert_eq!(os_indices(&neighbors), [4, 5, 7, 0, 1, 2, 3]);

    // The capacity bound can cut a widening step short
    let neighbors = topology
        .objects_closest_to(proc6, 5)
        .expect("proc6 belongs to this topology");
    assert_eq!(os_indices(&neighbors), [4, 5, 7, 0, 1]);

    // Nothing is close to the root
    assert!(topology
        .objects_closest_to(topology.root_object(), usize::MAX)
        .expect("the root belongs to this topology")
        .is_empty());

    // Objects from another topology are rejected even when they look alike
    let other = reference_machine();
    let foreign = other.object_at_depth(2, 6).expect("8 procs at depth 2");
    topology
        .objects_closest_to(foreign, 1)
        .expect_err("foreign objects must be rejected");
}

#[test]
fn covering_objects() {
    let topology = reference_machine();

    // Inside one socket, the socket is the deepest cover
    let socket1 = topology
        .smallest_object_covering_cpuset(&CpuSet::from_range(5..7))
        .expect("processors 5-6 exist");
    assert_eq!(socket1.object_type(), ObjectType::Socket);
    assert_eq!(socket1.os_index(), Some(1));

    // A single processor is covered by its own proc object
    let proc3 = topology
        .smallest_object_covering_cpuset(&CpuSet::from(3))
        .expect("processor 3 exists");
    assert_eq!(proc3.object_type(), ObjectType::Proc);
    assert_eq!(proc3.os_index(), Some(3));

    // Crossing sockets escalates to the machine
    let machine = topology
        .smallest_object_covering_cpuset(&CpuSet::from_iter([3usize, 4]))
        .expect("processors 3-4 exist");
    assert_eq!(machine.object_type(), ObjectType::Machine);

    // Sets reaching outside the machine have no cover
    assert!(topology
        .smallest_object_covering_cpuset(&CpuSet::from_iter([0usize, 8]))
        .is_none());
}

#[test]
fn cpuset_partitions() {
    let topology = reference_machine();

    // A whole socket plus a stray proc decomposes coarsely
    let query = CpuSet::from_range(0..4) | CpuSet::from(6);
    let parts = topology
        .cpuset_partition(&query, usize::MAX)
        .expect("the query is inside the machine");
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].object_type(), ObjectType::Socket);
    assert_eq!(parts[0].os_index(), Some(0));
    assert_eq!(parts[1].object_type(), ObjectType::Proc);
    assert_eq!(parts[1].os_index(), Some(6));

    // The union of the parts gives the query back
    let mut union = CpuSet::new();
    for part in &parts {
        union |= part.cpuset();
    }
    assert_eq!(union, query);

    // Unreachable queries error out instead of returning a partial cover
    let error = topology
        .cpuset_partition(&CpuSet::from_iter([7usize, 8]), usize::MAX)
        .expect_err("processor 8 does not exist");
    assert_eq!(error.query, CpuSet::from_iter([7usize, 8]));
    assert_eq!(error.root, CpuSet::from_range(0..8));
}

#[test]
fn object_rendering() {
    let topology = reference_machine();
    let root = topology.root_object();
    let socket0 = topology.object_at_depth(1, 0).expect("2 sockets at depth 1");

    assert_eq!(root.to_string(), "Machine(16GB)");
    assert_eq!(socket0.to_string(), "Socket#0");

    // Measuring with an empty buffer reports the full rendered length
    let len = format_object(&mut [], socket0, ":");
    assert_eq!(len, "Socket:0".len());
    let mut buf = vec![0u8; len];
    assert_eq!(format_object(&mut buf, socket0, ":"), len);
    assert_eq!(std::str::from_utf8(&buf).unwrap(), "Socket:0");

    // Truncated renderings keep reporting the full length
    let mut tiny = [0u8; 3];
    assert_eq!(format_object(&mut tiny, socket0, ":"), len);
    assert_eq!(&tiny, b"Soc");

    // Set unions render with the cpuset list syntax
    let objects = [
        topology.object_at_depth(2, 1).expect("8 procs at depth 2"),
        topology.object_at_depth(1, 1).expect("2 sockets at depth 1"),
    ];
    let len = format_object_set_union(&mut [], &objects);
    let mut buf = vec![0u8; len];
    assert_eq!(format_object_set_union(&mut buf, &objects), len);
    assert_eq!(std::str::from_utf8(&buf).unwrap(), "1,4-7");
}
