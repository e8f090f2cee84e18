use crate::debug_label::DebugLabel;

/// What a shared mesh buffer is bound as during draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshBufferUsage {
    Vertex,
    Index,
}

/// Description of a device-local buffer to create.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    /// Debug label of the buffer. This will show up in graphics debuggers for easy identification.
    pub label: DebugLabel,

    /// Size of the buffer in bytes.
    pub size: u64,

    pub usage: MeshBufferUsage,
}

/// A single region to copy from a replaced buffer into its replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyRegion {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub len: u64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("failed to create a {usage:?} buffer of {size} byte(s): out of device memory")]
    OutOfMemory { usage: MeshBufferUsage, size: u64 },

    #[error("device lost while waiting for buffer copies to finish: {0}")]
    Lost(String),
}

/// The narrow slice of the graphics device the suballocator needs.
///
/// [`crate::WgpuMeshBufferDevice`] is the wgpu implementation; tests run
/// against an in-memory one.
pub trait MeshBufferDevice {
    type Buffer: Clone;

    /// Creates a device-local (not host-visible) buffer.
    ///
    /// Failure is a fatal device-resource-exhaustion condition; the
    /// suballocator does not retry.
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Self::Buffer, DeviceError>;

    /// Writes `data` into `buffer` starting at byte `offset`.
    ///
    /// The suballocator guarantees `offset + data.len()` is within the
    /// buffer's capacity.
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    /// Records the given copies from `src` into `dst`, submits them to the
    /// queue, and blocks until the device has finished executing them.
    fn copy_and_wait(
        &self,
        src: &Self::Buffer,
        dst: &Self::Buffer,
        copies: &[CopyRegion],
    ) -> Result<(), DeviceError>;

    /// Hands a replaced buffer to deferred destruction.
    ///
    /// The receiver releases it only once the device can no longer reference
    /// it; in-flight draws may still be reading from it when this is called.
    fn retire_buffer(&self, buffer: Self::Buffer);
}
