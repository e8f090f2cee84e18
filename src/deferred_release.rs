//! Frame-tagged deferred destruction of replaced device resources.

/// Holds retired resources until the device is known to be done with them.
///
/// A resource retired during frame `n` may still be referenced by that frame's
/// draws, so it is only handed back once [`DeferredReleaseQueue::begin_frame`]
/// is called with a later frame index — by which point the caller has
/// synchronized with the device for all earlier frames.
pub struct DeferredReleaseQueue<R> {
    retired: Vec<(u64, R)>,
    current_frame_index: u64,
}

impl<R> Default for DeferredReleaseQueue<R> {
    fn default() -> Self {
        Self {
            retired: Vec::new(),
            current_frame_index: 0,
        }
    }
}

impl<R> DeferredReleaseQueue<R> {
    /// Enqueues a resource that the current frame may still reference.
    pub fn retire(&mut self, resource: R) {
        self.retired.push((self.current_frame_index, resource));
    }

    /// Starts a new frame, releasing every resource retired before it.
    ///
    /// `on_release` is invoked once per released resource, e.g. to call
    /// `destroy` on it.
    pub fn begin_frame(&mut self, frame_index: u64, mut on_release: impl FnMut(R)) {
        self.current_frame_index = frame_index;

        let num_released = self
            .retired
            .iter()
            .filter(|(retired_at, _)| *retired_at < frame_index)
            .count();
        if num_released > 0 {
            log::debug!("releasing {num_released} retired mesh buffer(s)");
        }

        let mut i = 0;
        while i < self.retired.len() {
            if self.retired[i].0 < frame_index {
                let (_, resource) = self.retired.swap_remove(i);
                on_release(resource);
            } else {
                i += 1;
            }
        }
    }

    /// Number of resources still awaiting release.
    pub fn num_pending(&self) -> usize {
        self.retired.len()
    }
}
