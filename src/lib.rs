//! Sub-allocation of GPU-resident mesh data.
//!
//! Rather than creating one device buffer per mesh, all mesh data shares two
//! large device buffers (one for vertex data, one for index data). This crate
//! packs independently sized mesh allocations into those buffers, reclaims
//! freed regions, and grows the buffers on demand — compacting live data into
//! the replacement buffer via device-side copies so fragmentation never
//! outlives a growth.
//!
//! The graphics device is only reached through the narrow [`MeshBufferDevice`]
//! trait; [`WgpuMeshBufferDevice`] is the wgpu implementation.

mod debug_label;
mod deferred_release;
mod device;
mod range;
mod range_list;
mod suballocator;
mod wgpu_device;

pub use self::debug_label::DebugLabel;
pub use self::deferred_release::DeferredReleaseQueue;
pub use self::device::{BufferDesc, CopyRegion, DeviceError, MeshBufferDevice, MeshBufferUsage};
pub use self::range::{BufferRange, MeshRange};
pub use self::suballocator::{MeshBufferStats, MeshBufferSuballocator, SuballocatorError};
pub use self::wgpu_device::WgpuMeshBufferDevice;
