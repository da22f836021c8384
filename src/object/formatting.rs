//! Truncation-safe object rendering
//!
//! These functions follow the bounded-buffer write convention of C's
//! `snprintf`: the returned value is the number of bytes the full rendering
//! occupies, whether or not it fit in the destination buffer. Callers detect
//! truncation by comparing the return value against the capacity they
//! provided, and can run a "measure" pass with an empty buffer before
//! allocating for the "render" pass:
//!
//! ```
//! use hwtopo::{object::formatting::format_object, topology::Topology};
//!
//! let topology = Topology::test_instance();
//! let root = topology.root_object();
//!
//! // Measure, then render
//! let len = format_object(&mut [], root, "#");
//! let mut buf = vec![0u8; len];
//! assert_eq!(format_object(&mut buf, root, "#"), len);
//! assert_eq!(std::str::from_utf8(&buf).unwrap(), "Machine(16GB)");
//! ```

use super::{attributes::ObjectAttributes, types::ObjectType, TopologyObject};
use arrayvec::ArrayString;
use crate::cpu::cpuset::CpuSet;
#[allow(unused)]
#[cfg(test)]
use similar_asserts::assert_eq;
use std::fmt::{self, Write};

/// Render one object into `buf`, truncating if it does not fit
///
/// The rendering is the object's type name, followed by `index_prefix` and
/// the physical index for OS-numbered objects, followed by a human-scaled
/// memory amount for memory-bearing types. Caches additionally prefix their
/// hierarchy level, e.g. `"L2Cache#0(4096KB)"`.
///
/// Memory amounts print in the largest unit of KB/MB/GB in which the scaled
/// value still has at least two digits, so that coarse units never hide most
/// of the magnitude.
///
/// Returns the length of the full rendering in bytes, even when `buf` is too
/// small to hold it.
pub fn format_object(buf: &mut [u8], obj: &TopologyObject, index_prefix: &str) -> usize {
    let mut writer = TruncatingWriter::new(buf);
    render_object(&mut writer, obj, index_prefix)
        .expect("rendering into a byte buffer does not fail");
    writer.full_len
}

/// Render the union of several objects' cpusets into `buf`, truncating if it
/// does not fit
///
/// The union is rendered with the cpuset list syntax, e.g. `"0-3,8"`. Same
/// return convention as [`format_object()`].
pub fn format_object_set_union(buf: &mut [u8], objects: &[&TopologyObject]) -> usize {
    let mut set = CpuSet::new();
    for obj in objects {
        set |= obj.cpuset();
    }
    let mut writer = TruncatingWriter::new(buf);
    write!(writer, "{set}").expect("rendering into a byte buffer does not fail");
    writer.full_len
}

/// Shared rendering logic of [`format_object()`] and the [`Display`] impl of
/// [`TopologyObject`]
///
/// [`Display`]: std::fmt::Display
pub(crate) fn render_object(
    w: &mut impl Write,
    obj: &TopologyObject,
    index_prefix: &str,
) -> fmt::Result {
    // Physical index text, silently truncated past the scratch capacity
    let mut index_text = ArrayString::<32>::new();
    if let Some(os_index) = obj.os_index() {
        let _ = write!(index_text, "{index_prefix}{os_index}");
    }

    let type_name = obj.object_type().name();
    match (obj.object_type(), obj.attributes()) {
        (ObjectType::Socket | ObjectType::Core | ObjectType::Proc | ObjectType::Fake, _) => {
            write!(w, "{type_name}{index_text}")
        }
        (ObjectType::Machine, Some(&ObjectAttributes::Machine { total_memory_kb })) => {
            write!(w, "{type_name}({})", MemorySize(total_memory_kb))
        }
        (ObjectType::NUMANode, Some(&ObjectAttributes::NUMANode { local_memory_kb })) => {
            write!(w, "{type_name}{index_text}({})", MemorySize(local_memory_kb))
        }
        (ObjectType::Cache, Some(&ObjectAttributes::Cache { size_kb, level })) => {
            write!(w, "L{level}{type_name}{index_text}({})", MemorySize(size_kb))
        }
        // Attribute-less rendition of attribute-bearing types
        _ => Ok(()),
    }
}

/// Memory amount in kilobytes, displayed with a human-scaled unit
///
/// The unit is the largest of KB/MB/GB such that the scaled value is at
/// least 10, so single-digit amounts that would lose most of their precision
/// to the scaling are never printed.
struct MemorySize(u64);

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kb = self.0;
        if kb < 10 * 1024 {
            write!(f, "{kb}KB")
        } else if kb < 10 * 1024 * 1024 {
            write!(f, "{}MB", kb >> 10)
        } else {
            write!(f, "{}GB", kb >> 20)
        }
    }
}

/// [`Write`] implementation that fills a byte buffer, drops what does not
/// fit, and keeps counting the bytes it would have needed
struct TruncatingWriter<'buf> {
    /// Destination buffer
    buf: &'buf mut [u8],

    /// Bytes actually written to `buf` so far
    written: usize,

    /// Bytes the rendering needs, truncated or not
    full_len: usize,
}

impl<'buf> TruncatingWriter<'buf> {
    /// Set up writing into `buf`
    fn new(buf: &'buf mut [u8]) -> Self {
        Self {
            buf,
            written: 0,
            full_len: 0,
        }
    }
}

impl Write for TruncatingWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.full_len += s.len();
        let room = self.buf.len() - self.written;
        let taken = room.min(s.len());
        self.buf[self.written..self.written + taken].copy_from_slice(&s.as_bytes()[..taken]);
        self.written += taken;
        Ok(())
    }
}
