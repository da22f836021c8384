//! Looking for objects that are close to another object

use super::{ObjectIndex, TopologyObject};
use crate::topology::Topology;
#[allow(unused)]
#[cfg(test)]
use similar_asserts::assert_eq;
use thiserror::Error;

/// # Finding nearby objects
impl Topology {
    /// Get up to `max` objects at the same depth as `obj`, from closest to
    /// farthest
    ///
    /// Closeness is defined by processor-set locality, not by tree distance:
    /// the source's ancestry is climbed one *widening* step at a time —
    /// ancestors whose cpuset equals the current one, such as duplicate
    /// `Fake` levels, are transparent — and each step contributes the
    /// objects of the source's level that the wider cpuset newly covers, in
    /// physical order.
    ///
    /// The source itself is never part of the result, and every returned
    /// object's cpuset is disjoint from the source's. Querying the root
    /// yields an empty result, as does any machine too small to contain
    /// objects outside the source's subtree.
    ///
    /// # Errors
    ///
    /// - [`ForeignObjectError`] if `obj` does not belong to this topology
    ///
    /// # Examples
    ///
    /// ```
    /// use hwtopo::topology::Topology;
    ///
    /// // 2 sockets of 4 processors each
    /// let topology = Topology::test_instance();
    /// let proc0 = topology.object_at_depth(2, 0).expect("machine has 8 procs");
    ///
    /// let neighbors = topology.objects_closest_to(proc0, 4)?;
    /// let os_indices = neighbors
    ///     .iter()
    ///     .map(|neighbor| neighbor.os_index().expect("procs are OS-numbered"))
    ///     .collect::<Vec<_>>();
    /// // The rest of proc0's socket comes first, then the other socket
    /// assert_eq!(os_indices, [1, 2, 3, 4]);
    /// # Ok::<_, eyre::Report>(())
    /// ```
    pub fn objects_closest_to<'self_>(
        &'self_ self,
        obj: &'self_ TopologyObject,
        max: usize,
    ) -> Result<Vec<&'self_ TopologyObject>, ForeignObjectError> {
        if !self.contains(obj) {
            return Err(obj.into());
        }
        let mut stored = Vec::new();
        if max == 0 {
            return Ok(stored);
        }

        let mut parent = obj;
        loop {
            // Climb to the first ancestor that actually widens the cpuset
            let mut nextparent = self.parent(parent);
            while let Some(ancestor) = nextparent {
                if ancestor.cpuset() != parent.cpuset() {
                    break;
                }
                parent = ancestor;
                nextparent = self.parent(ancestor);
            }
            let Some(nextparent) = nextparent else {
                // Reached the root
                return Ok(stored);
            };

            // Collect the source-level objects that widening from parent to
            // nextparent newly brought into scope
            for cousin in self.objects_at_depth(obj.depth()) {
                if nextparent.cpuset().includes(cousin.cpuset())
                    && !parent.cpuset().includes(cousin.cpuset())
                {
                    stored.push(cousin);
                    if stored.len() == max {
                        return Ok(stored);
                    }
                }
            }
            parent = nextparent;
        }
    }
}

/// A [`Topology`] method was passed in a [`TopologyObject`] that does not
/// belong to said topology
#[derive(Copy, Clone, Debug, Eq, Error, Hash, PartialEq)]
#[error("object #{0} does not belong to the queried topology")]
pub struct ForeignObjectError(ObjectIndex);

impl From<&TopologyObject> for ForeignObjectError {
    fn from(obj: &TopologyObject) -> Self {
        Self(obj.index())
    }
}
