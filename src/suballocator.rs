//! The mesh buffer suballocator itself.

use parking_lot::Mutex;

use crate::debug_label::DebugLabel;
use crate::device::{BufferDesc, DeviceError, MeshBufferDevice, MeshBufferUsage};
use crate::range::{BufferRange, MeshRange};
use crate::range_list::{AllocatedList, FreeList, debug_check_invariants};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SuballocatorError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("cannot allocate zero bytes of {usage:?} data")]
    ZeroSized { usage: MeshBufferUsage },

    #[error("allocation of {size} byte(s) of {usage:?} data does not fit a 32 bit buffer address")]
    AllocationTooLarge { usage: MeshBufferUsage, size: usize },

    #[error(
        "growing the {usage:?} buffer past {capacity} byte(s) would overflow the 32 bit address space"
    )]
    CapacityOverflow { usage: MeshBufferUsage, capacity: u32 },

    #[error("{usage:?} range {range:?} is not a live allocation (double free or foreign handle)")]
    NotAllocated {
        usage: MeshBufferUsage,
        range: BufferRange,
    },
}

/// Size & usage statistics of the shared mesh buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshBufferStats {
    pub vertex_capacity_in_bytes: u64,
    pub index_capacity_in_bytes: u64,
    pub vertex_bytes_in_use: u64,
    pub index_bytes_in_use: u64,

    /// Number of live mesh allocations.
    pub num_live_meshes: usize,
}

/// Bookkeeping and device buffer for one of the two shared buffers.
struct BufferState<B> {
    usage: MeshBufferUsage,

    /// Created lazily by the first allocation; replaced (never shrunk) on growth.
    buffer: Option<B>,
    capacity: u32,

    free: FreeList,
    allocated: AllocatedList,
}

impl<B: Clone> BufferState<B> {
    fn new(usage: MeshBufferUsage) -> Self {
        Self {
            usage,
            buffer: None,
            capacity: 0,
            free: FreeList::default(),
            allocated: AllocatedList::default(),
        }
    }

    fn label(&self) -> DebugLabel {
        match self.usage {
            MeshBufferUsage::Vertex => "shared mesh vertex buffer".into(),
            MeshBufferUsage::Index => "shared mesh index buffer".into(),
        }
    }

    fn allocate<D: MeshBufferDevice<Buffer = B>>(
        &mut self,
        device: &D,
        data: &[u8],
        size: u32,
    ) -> Result<BufferRange, SuballocatorError> {
        let fit = match self.free.find_fit(size) {
            Some(fit) => fit,
            None => {
                let new_capacity = self.capacity.checked_add(size).ok_or(
                    SuballocatorError::CapacityOverflow {
                        usage: self.usage,
                        capacity: self.capacity,
                    },
                )?;
                self.grow(device, new_capacity)?;
                self.free
                    .find_fit(size)
                    .expect("growth leaves a trailing hole at least as large as the request")
            }
        };

        let range = self.free.consume_at(fit, size);
        self.allocated.insert(range);
        debug_check_invariants(&self.free, &self.allocated, self.capacity);

        let buffer = self
            .buffer
            .as_ref()
            .expect("a non-empty free list implies the buffer exists");
        device.write_buffer(buffer, u64::from(range.start), data);
        log::trace!(
            "uploaded {size} byte(s) of {:?} data at offset {}",
            self.usage,
            range.start
        );
        Ok(range)
    }

    /// Replaces the buffer with one of `new_capacity` bytes, packing all live
    /// data into its front via device copies.
    ///
    /// Blocks until the copies have executed, then retires the old buffer to
    /// deferred destruction (in-flight draws may still read from it). Since
    /// the live data ends up contiguous from offset 0, the free list collapses
    /// to the single trailing hole.
    fn grow<D: MeshBufferDevice<Buffer = B>>(
        &mut self,
        device: &D,
        new_capacity: u32,
    ) -> Result<(), SuballocatorError> {
        debug_assert!(new_capacity > self.capacity);
        log::debug!(
            "growing {:?} buffer from {} to {new_capacity} byte(s)",
            self.usage,
            self.capacity
        );

        let new_buffer = device.create_buffer(&BufferDesc {
            label: self.label(),
            size: u64::from(new_capacity),
            usage: self.usage,
        })?;

        let (copies, packed_end) = self.allocated.plan_compaction();
        if let Some(old_buffer) = self.buffer.take() {
            if !copies.is_empty() {
                device.copy_and_wait(&old_buffer, &new_buffer, &copies)?;
            }
            device.retire_buffer(old_buffer);
        }

        self.free
            .reset_to(BufferRange::new(packed_end, new_capacity - packed_end));
        self.capacity = new_capacity;
        self.buffer = Some(new_buffer);
        debug_check_invariants(&self.free, &self.allocated, self.capacity);
        Ok(())
    }

    fn deallocate(&mut self, range: BufferRange) -> Result<(), SuballocatorError> {
        if !self.allocated.remove_exact(range) {
            return Err(SuballocatorError::NotAllocated {
                usage: self.usage,
                range,
            });
        }
        self.free.insert_coalescing(range);
        debug_check_invariants(&self.free, &self.allocated, self.capacity);
        Ok(())
    }
}

struct Inner<B> {
    vertex: BufferState<B>,
    index: BufferState<B>,
}

/// Packs many independently sized mesh allocations into two shared device
/// buffers, one for vertex and one for index data.
///
/// A single coarse lock serializes all operations; growth blocks the calling
/// thread until the device finished compacting, so mesh loading should stay
/// off the real-time render path.
pub struct MeshBufferSuballocator<D: MeshBufferDevice> {
    device: D,
    inner: Mutex<Inner<D::Buffer>>,
}

impl<D: MeshBufferDevice> MeshBufferSuballocator<D> {
    /// Starts with empty, zero-capacity buffers; the first allocation creates them.
    pub fn new(device: D) -> Self {
        Self {
            device,
            inner: Mutex::new(Inner {
                vertex: BufferState::new(MeshBufferUsage::Vertex),
                index: BufferState::new(MeshBufferUsage::Index),
            }),
        }
    }

    /// Uploads a mesh into the shared buffers, growing them if no free range fits.
    ///
    /// Growth is sized to exactly the current capacity plus the request and is
    /// fully synchronous, so the returned ranges are valid when this returns.
    /// A growth pass relocates the *other* live allocations by packing them to
    /// the front of the new buffer; anything holding resolved offsets (e.g.
    /// recorded draws) must re-fetch them afterwards.
    ///
    /// Device buffer creation failure during growth is fatal and not retried.
    pub fn allocate(
        &self,
        vertex_data: &[u8],
        index_data: &[u8],
    ) -> Result<MeshRange, SuballocatorError> {
        // Validate both halves up front so a bad index size cannot leave a
        // freshly allocated vertex range behind.
        let vertex_size = checked_size(MeshBufferUsage::Vertex, vertex_data)?;
        let index_size = checked_size(MeshBufferUsage::Index, index_data)?;

        let mut inner = self.inner.lock();
        let vertex_range = inner.vertex.allocate(&self.device, vertex_data, vertex_size)?;
        let index_range = inner.index.allocate(&self.device, index_data, index_size)?;
        Ok(MeshRange {
            vertex_range,
            index_range,
        })
    }

    /// Releases a mesh allocation, coalescing the freed ranges with any
    /// adjacent holes.
    ///
    /// `range` must be a handle previously returned by
    /// [`MeshBufferSuballocator::allocate`] on this instance. Anything else —
    /// a double free, a foreign handle — is a caller contract violation and
    /// reported as [`SuballocatorError::NotAllocated`], never silently ignored.
    pub fn deallocate(&self, range: MeshRange) -> Result<(), SuballocatorError> {
        let mut inner = self.inner.lock();
        inner.vertex.deallocate(range.vertex_range)?;
        inner.index.deallocate(range.index_range)
    }

    /// The current shared vertex buffer, for binding at draw time.
    ///
    /// `None` until the first allocation. Growth replaces the buffer, so don't
    /// cache this across allocations.
    pub fn vertex_buffer(&self) -> Option<D::Buffer> {
        self.inner.lock().vertex.buffer.clone()
    }

    /// The current shared index buffer. See [`MeshBufferSuballocator::vertex_buffer`].
    pub fn index_buffer(&self) -> Option<D::Buffer> {
        self.inner.lock().index.buffer.clone()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn stats(&self) -> MeshBufferStats {
        let inner = self.inner.lock();
        MeshBufferStats {
            vertex_capacity_in_bytes: u64::from(inner.vertex.capacity),
            index_capacity_in_bytes: u64::from(inner.index.capacity),
            vertex_bytes_in_use: inner.vertex.allocated.bytes_in_use(),
            index_bytes_in_use: inner.index.allocated.bytes_in_use(),
            num_live_meshes: inner.vertex.allocated.len(),
        }
    }

    #[cfg(test)]
    fn free_ranges(&self, usage: MeshBufferUsage) -> Vec<BufferRange> {
        let inner = self.inner.lock();
        let state = match usage {
            MeshBufferUsage::Vertex => &inner.vertex,
            MeshBufferUsage::Index => &inner.index,
        };
        let mut holes: Vec<_> = state.free.iter().copied().collect();
        holes.sort_unstable_by_key(|r| r.start);
        holes
    }
}

fn checked_size(usage: MeshBufferUsage, data: &[u8]) -> Result<u32, SuballocatorError> {
    if data.is_empty() {
        return Err(SuballocatorError::ZeroSized { usage });
    }
    u32::try_from(data.len()).map_err(|_| SuballocatorError::AllocationTooLarge {
        usage,
        size: data.len(),
    })
}
