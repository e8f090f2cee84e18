use std::sync::Arc;

use parking_lot::Mutex;

use crate::deferred_release::DeferredReleaseQueue;
use crate::device::{BufferDesc, CopyRegion, DeviceError, MeshBufferDevice, MeshBufferUsage};

/// [`MeshBufferDevice`] implementation on top of wgpu.
///
/// Replaced buffers are kept alive until [`WgpuMeshBufferDevice::begin_frame`]
/// is called with a later frame index, since draws submitted during the
/// current frame may still reference them. Call `begin_frame` once per frame,
/// after the previous frame's submissions have completed.
pub struct WgpuMeshBufferDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    retired_buffers: Mutex<DeferredReleaseQueue<wgpu::Buffer>>,
}

impl WgpuMeshBufferDevice {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            retired_buffers: Mutex::new(DeferredReleaseQueue::default()),
        }
    }

    /// Starts a new frame, destroying every buffer retired before it.
    pub fn begin_frame(&self, frame_index: u64) {
        self.retired_buffers
            .lock()
            .begin_frame(frame_index, |buffer| buffer.destroy());
    }

    /// Number of replaced buffers awaiting destruction.
    pub fn num_retired_buffers(&self) -> usize {
        self.retired_buffers.lock().num_pending()
    }
}

impl MeshBufferDevice for WgpuMeshBufferDevice {
    type Buffer = wgpu::Buffer;

    // Note that wgpu reports out-of-memory through the device's
    // uncaptured-error handler rather than a return value, so this never
    // returns `DeviceError::OutOfMemory` itself. Embedders that need
    // synchronous detection can wrap growth in a wgpu error scope.
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Self::Buffer, DeviceError> {
        let usage = match desc.usage {
            MeshBufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            MeshBufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.get(),
            size: desc.size,
            // COPY_SRC because a later growth pass copies live data out of
            // this buffer into its replacement.
            usage: usage | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }))
    }

    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    fn copy_and_wait(
        &self,
        src: &Self::Buffer,
        dst: &Self::Buffer,
        copies: &[CopyRegion],
    ) -> Result<(), DeviceError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mesh buffer compaction"),
            });
        for copy in copies {
            encoder.copy_buffer_to_buffer(src, copy.src_offset, dst, copy.dst_offset, copy.len);
        }
        let submission_index = self.queue.submit([encoder.finish()]);

        // Growth is synchronous from the allocator's point of view: block
        // until the device has executed the copies. No timeout, per contract.
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission_index),
                timeout: None,
            })
            .map_err(|err| DeviceError::Lost(err.to_string()))?;
        Ok(())
    }

    fn retire_buffer(&self, buffer: Self::Buffer) {
        self.retired_buffers.lock().retire(buffer);
    }
}
