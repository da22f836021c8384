//! Topology building
//!
//! Discovery backends (OS probing, firmware tables, synthetic descriptions)
//! are not part of this crate: whoever knows what the machine looks like
//! describes it to a [`TopologyBuilder`], object by object, and gets a
//! validated, immutable [`Topology`] out of [`build()`].
//!
//! Interior objects do not need a processor set of their own: their cpuset
//! is inferred as the union of their children's. Only leaves must state
//! theirs, either through [`insert_processor()`] (single-processor `Proc`
//! leaves, the common case) or through [`insert_object_with_cpuset()`]
//! (multi-processor leaves, e.g. cores whose hardware threads are not
//! individually exposed).
//!
//! [`build()`]: TopologyBuilder::build
//! [`insert_processor()`]: TopologyBuilder::insert_processor
//! [`insert_object_with_cpuset()`]: TopologyBuilder::insert_object_with_cpuset

use super::Topology;
use crate::{
    cpu::cpuset::CpuSet,
    object::{
        attributes::ObjectAttributes,
        depth::TypeToDepthError,
        types::ObjectType,
        ObjectIndex, TopologyObject,
    },
};
#[allow(unused)]
#[cfg(test)]
use similar_asserts::assert_eq;
use std::collections::HashMap;
use thiserror::Error;

/// Incremental description of one machine's hardware hierarchy
///
/// # Examples
///
/// ```
/// use hwtopo::{
///     object::{attributes::ObjectAttributes, types::ObjectType},
///     topology::builder::TopologyBuilder,
/// };
///
/// let mut builder = TopologyBuilder::new();
/// let machine = builder.insert_root(
///     ObjectType::Machine,
///     Some(ObjectAttributes::Machine { total_memory_kb: 2 * 1024 * 1024 }),
/// )?;
/// let socket = builder.insert_object(machine, ObjectType::Socket, Some(0), None)?;
/// for proc in 0..4 {
///     builder.insert_processor(socket, proc)?;
/// }
/// let topology = builder.build()?;
/// assert_eq!(topology.depth(), 3);
/// # Ok::<_, eyre::Report>(())
/// ```
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    /// Objects described so far, in insertion order; the root comes first
    objects: Vec<BuilderObject>,
}

/// One object description, pending validation
#[derive(Debug)]
struct BuilderObject {
    /// Type of the object
    object_type: ObjectType,

    /// OS/firmware-reported physical index, if any
    os_index: Option<usize>,

    /// Type-specific attributes, checked against `object_type` at insertion
    attributes: Option<ObjectAttributes>,

    /// Explicit cpuset for leaves, `None` to infer from children
    cpuset: Option<CpuSet>,

    /// Parent object, `None` for the root
    parent: Option<ObjectIndex>,

    /// Children, in insertion order
    children: Vec<ObjectIndex>,
}

impl TopologyBuilder {
    /// Start an empty machine description
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe the root object, spanning the whole machine
    ///
    /// This must be the first insertion.
    ///
    /// # Errors
    ///
    /// - [`DuplicateRoot`] if a root was already inserted
    /// - [`AttributeMismatch`] if `attributes` is not the payload that
    ///   `object_type` calls for
    ///
    /// [`DuplicateRoot`]: TopologyBuildError::DuplicateRoot
    /// [`AttributeMismatch`]: TopologyBuildError::AttributeMismatch
    pub fn insert_root(
        &mut self,
        object_type: ObjectType,
        attributes: Option<ObjectAttributes>,
    ) -> Result<ObjectIndex, TopologyBuildError> {
        if !self.objects.is_empty() {
            return Err(TopologyBuildError::DuplicateRoot);
        }
        check_attributes(object_type, attributes)?;
        Ok(self.push(BuilderObject {
            object_type,
            os_index: None,
            attributes,
            cpuset: None,
            parent: None,
            children: Vec::new(),
        }))
    }

    /// Describe an interior object below `parent`
    ///
    /// Children inserted under the same parent are kept in insertion order,
    /// which the levels array will expose as physical order: describe the
    /// machine in its physical layout order.
    ///
    /// The object's cpuset will be inferred at [`build()`](Self::build) time
    /// as the union of its children's, so an object inserted this way must
    /// end up with at least one child.
    ///
    /// # Errors
    ///
    /// - [`UnknownParent`] if `parent` was not returned by a previous
    ///   insertion
    /// - [`AttributeMismatch`] if `attributes` is not the payload that
    ///   `object_type` calls for
    ///
    /// [`UnknownParent`]: TopologyBuildError::UnknownParent
    /// [`AttributeMismatch`]: TopologyBuildError::AttributeMismatch
    pub fn insert_object(
        &mut self,
        parent: ObjectIndex,
        object_type: ObjectType,
        os_index: Option<usize>,
        attributes: Option<ObjectAttributes>,
    ) -> Result<ObjectIndex, TopologyBuildError> {
        self.check_parent(parent)?;
        check_attributes(object_type, attributes)?;
        Ok(self.push(BuilderObject {
            object_type,
            os_index,
            attributes,
            cpuset: None,
            parent: Some(parent),
            children: Vec::new(),
        }))
    }

    /// Describe a leaf object below `parent` with an explicit cpuset
    ///
    /// # Errors
    ///
    /// Same as [`insert_object()`](Self::insert_object).
    pub fn insert_object_with_cpuset(
        &mut self,
        parent: ObjectIndex,
        object_type: ObjectType,
        os_index: Option<usize>,
        attributes: Option<ObjectAttributes>,
        cpuset: CpuSet,
    ) -> Result<ObjectIndex, TopologyBuildError> {
        self.check_parent(parent)?;
        check_attributes(object_type, attributes)?;
        Ok(self.push(BuilderObject {
            object_type,
            os_index,
            attributes,
            cpuset: Some(cpuset),
            parent: Some(parent),
            children: Vec::new(),
        }))
    }

    /// Describe the logical processor `os_index` below `parent`
    ///
    /// Convenience form of [`insert_object_with_cpuset()`] for the common
    /// single-processor `Proc` leaf, spanning exactly the processor index it
    /// is numbered with.
    ///
    /// # Errors
    ///
    /// Same as [`insert_object()`](Self::insert_object).
    ///
    /// [`insert_object_with_cpuset()`]: Self::insert_object_with_cpuset
    pub fn insert_processor(
        &mut self,
        parent: ObjectIndex,
        os_index: usize,
    ) -> Result<ObjectIndex, TopologyBuildError> {
        self.insert_object_with_cpuset(
            parent,
            ObjectType::Proc,
            Some(os_index),
            None,
            CpuSet::from(os_index),
        )
    }

    /// Validate the description and turn it into a read-only [`Topology`]
    ///
    /// # Errors
    ///
    /// - [`MissingRoot`] if nothing was inserted
    /// - [`EmptyCpuset`] if an object has neither an explicit cpuset nor
    ///   children to infer one from
    /// - [`ChildNotIncluded`] if a child's cpuset reaches outside its
    ///   parent's (only possible with explicit cpusets)
    /// - [`OverlappingSiblings`] if two children of the same parent span a
    ///   common processor
    ///
    /// [`MissingRoot`]: TopologyBuildError::MissingRoot
    /// [`EmptyCpuset`]: TopologyBuildError::EmptyCpuset
    /// [`ChildNotIncluded`]: TopologyBuildError::ChildNotIncluded
    /// [`OverlappingSiblings`]: TopologyBuildError::OverlappingSiblings
    pub fn build(self) -> Result<Topology, TopologyBuildError> {
        if self.objects.is_empty() {
            return Err(TopologyBuildError::MissingRoot);
        }

        // Resolve cpusets bottom-up: children always have higher arena
        // indices than their parent, so one reverse pass suffices. An
        // explicit cpuset is authoritative, inference only fills the gaps.
        let mut cpusets = vec![CpuSet::new(); self.objects.len()];
        for idx in (0..self.objects.len()).rev() {
            let obj = &self.objects[idx];
            let cpuset = match &obj.cpuset {
                Some(explicit) => explicit.clone(),
                None => {
                    let mut union = CpuSet::new();
                    for &child in &obj.children {
                        union |= &cpusets[usize::from(child)];
                    }
                    union
                }
            };
            if cpuset.is_empty() {
                return Err(TopologyBuildError::EmptyCpuset(ObjectIndex::from(idx)));
            }
            cpusets[idx] = cpuset;
        }

        // Check the partition invariants that inference alone does not
        // enforce: explicit-cpuset children staying inside their parent, and
        // siblings not spanning a common processor
        for (idx, obj) in self.objects.iter().enumerate() {
            let parent_cpuset = &cpusets[idx];
            for (nth, &child) in obj.children.iter().enumerate() {
                let child_cpuset = &cpusets[usize::from(child)];
                if !parent_cpuset.includes(child_cpuset) {
                    return Err(TopologyBuildError::ChildNotIncluded {
                        parent: ObjectIndex::from(idx),
                        child,
                    });
                }
                for &sibling in &obj.children[nth + 1..] {
                    if child_cpuset.intersects(&cpusets[usize::from(sibling)]) {
                        return Err(TopologyBuildError::OverlappingSiblings {
                            parent: ObjectIndex::from(idx),
                            first: child,
                            second: sibling,
                        });
                    }
                }
            }
        }

        // Depths follow parent links, which always point backwards
        let mut depths = vec![0; self.objects.len()];
        for (idx, obj) in self.objects.iter().enumerate() {
            if let Some(parent) = obj.parent {
                depths[idx] = depths[usize::from(parent)] + 1;
            }
        }

        // The levels array lists each depth in depth-first order, so that
        // per-depth order follows the physical layout of the tree
        let mut levels: Vec<Vec<ObjectIndex>> = Vec::new();
        let mut stack = vec![ObjectIndex::from(0)];
        while let Some(index) = stack.pop() {
            let depth = depths[usize::from(index)];
            if levels.len() <= depth {
                levels.resize_with(depth + 1, Vec::new);
            }
            levels[depth].push(index);
            // Reversed so that the stack pops children in insertion order
            stack.extend(self.objects[usize::from(index)].children.iter().rev());
        }

        // Record the canonical depth of every type present in the tree
        let mut type_to_depth = HashMap::new();
        for (idx, obj) in self.objects.iter().enumerate() {
            type_to_depth
                .entry(obj.object_type)
                .and_modify(|depth| {
                    if *depth != Ok(depths[idx]) {
                        *depth = Err(TypeToDepthError::Multiple);
                    }
                })
                .or_insert(Ok(depths[idx]));
        }

        let objects = self
            .objects
            .into_iter()
            .zip(cpusets)
            .zip(depths)
            .enumerate()
            .map(|(idx, ((obj, cpuset), depth))| TopologyObject {
                object_type: obj.object_type,
                attributes: obj.attributes,
                cpuset,
                depth,
                os_index: obj.os_index,
                index: ObjectIndex::from(idx),
                parent: obj.parent,
                children: obj.children,
            })
            .collect();
        Ok(Topology {
            objects,
            levels,
            type_to_depth,
        })
    }

    /// Ensure that a parent index designates an already-described object
    fn check_parent(&self, parent: ObjectIndex) -> Result<(), TopologyBuildError> {
        if usize::from(parent) >= self.objects.len() {
            return Err(TopologyBuildError::UnknownParent(parent));
        }
        Ok(())
    }

    /// Add a described object to the arena, linking it to its parent
    fn push(&mut self, obj: BuilderObject) -> ObjectIndex {
        let index = ObjectIndex::from(self.objects.len());
        if let Some(parent) = obj.parent {
            self.objects[usize::from(parent)].children.push(index);
        }
        self.objects.push(obj);
        index
    }
}

/// Ensure that an attribute payload is the one its object type calls for
fn check_attributes(
    object_type: ObjectType,
    attributes: Option<ObjectAttributes>,
) -> Result<(), TopologyBuildError> {
    let valid = match attributes {
        Some(attributes) => attributes.object_type() == object_type,
        None => !object_type.has_memory(),
    };
    valid
        .then_some(())
        .ok_or(TopologyBuildError::AttributeMismatch(object_type))
}

/// Error returned when a machine description is inconsistent
#[derive(Copy, Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum TopologyBuildError {
    /// No root object was described
    #[error("topology has no root object")]
    MissingRoot,

    /// A second root object was described
    #[error("topology already has a root object")]
    DuplicateRoot,

    /// A parent index does not designate an already-described object
    #[error("parent object #{0} has not been described")]
    UnknownParent(ObjectIndex),

    /// An attribute payload does not match its object's type
    #[error("attributes do not match object type {0}")]
    AttributeMismatch(ObjectType),

    /// An object has neither an explicit cpuset nor children to infer one
    /// from
    #[error("object #{0} is a leaf without a processor set")]
    EmptyCpuset(ObjectIndex),

    /// A child's explicit cpuset reaches outside its parent's
    #[error("child object #{child} is not included in its parent #{parent}")]
    ChildNotIncluded {
        /// Parent object
        parent: ObjectIndex,

        /// Offending child
        child: ObjectIndex,
    },

    /// Two children of the same parent span a common processor
    #[error("children #{first} and #{second} of object #{parent} overlap")]
    OverlappingSiblings {
        /// Parent object
        parent: ObjectIndex,

        /// First offending child
        first: ObjectIndex,

        /// Second offending child
        second: ObjectIndex,
    },
}
