/// A contiguous byte region within one of the shared mesh buffers.
///
/// Any range held in a free or allocated list has `count > 0`; zero-length
/// ranges are removed, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferRange {
    /// Byte offset of the first byte of the region.
    pub start: u32,

    /// Length of the region in bytes.
    pub count: u32,
}

impl BufferRange {
    pub const fn new(start: u32, count: u32) -> Self {
        Self { start, count }
    }

    /// One past the last byte of the region.
    pub const fn end(&self) -> u32 {
        self.start + self.count
    }
}

/// Handle identifying a live mesh allocation in the shared vertex & index buffers.
///
/// Returned by [`MeshBufferSuballocator::allocate`][crate::MeshBufferSuballocator::allocate]
/// and owned by the caller; pass it back unchanged to
/// [`MeshBufferSuballocator::deallocate`][crate::MeshBufferSuballocator::deallocate].
/// The suballocator keeps no reference to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshRange {
    pub vertex_range: BufferRange,
    pub index_range: BufferRange,
}
