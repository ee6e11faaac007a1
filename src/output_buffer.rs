//! Pooled output buffers holding one decoded unit each.
//!
//! An [`OutputBuffer`] belongs to exactly one engine's output pool, fixed at
//! construction through a weak back-reference. [`OutputBuffer::release`]
//! (or simply dropping the buffer) returns it to that pool exactly once,
//! from whichever thread holds it, after which it is writable again.

use std::mem;
use std::sync::Weak;

use crate::engine::Shared;
use crate::flags::BufferFlags;

/// A pooled buffer holding one decoded unit.
///
/// Payload storage is reallocated only when [`OutputBuffer::init`] requests
/// more capacity than currently held, so a steady-state decode loop reuses
/// the same allocations round after round.
pub struct OutputBuffer {
    data: Vec<u8>,
    time_us: i64,
    flags: BufferFlags,
    skipped_output_count: u32,
    pub(crate) owner: Weak<Shared>,
}

impl OutputBuffer {
    /// Create a blank buffer with no preallocated payload.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a blank buffer with `capacity` bytes of payload storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            time_us: 0,
            flags: BufferFlags::none(),
            skipped_output_count: 0,
            owner: Weak::new(),
        }
    }

    /// Prepare the buffer for a decoded unit: stamp the timestamp and make
    /// sure at least `size` bytes of payload storage are available. Existing
    /// storage is reused when it is already big enough.
    pub fn init(&mut self, time_us: i64, size: usize) {
        self.time_us = time_us;
        self.data.clear();
        if self.data.capacity() < size {
            self.data.reserve(size);
        }
    }

    /// The decoded payload.
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access for the codec filling the buffer.
    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Presentation timestamp in microseconds.
    pub fn time_us(&self) -> i64 {
        self.time_us
    }

    pub fn set_time_us(&mut self, time_us: i64) {
        self.time_us = time_us;
    }

    pub fn flags(&self) -> &BufferFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut BufferFlags {
        &mut self.flags
    }

    /// How many decode-only outputs were suppressed since the previous
    /// delivered buffer.
    pub fn skipped_output_count(&self) -> u32 {
        self.skipped_output_count
    }

    pub(crate) fn set_skipped_output_count(&mut self, count: u32) {
        self.skipped_output_count = count;
    }

    /// Return the buffer to its owning pool.
    ///
    /// Dropping the buffer has the same effect; this method exists to make
    /// the hand-back explicit at call sites.
    pub fn release(self) {}

    /// Install the pool back-reference at engine construction.
    pub(crate) fn attach(&mut self, owner: Weak<Shared>) {
        self.owner = owner;
    }

    /// Reset for reuse, retaining payload storage.
    pub(crate) fn clear_for_reuse(&mut self) {
        self.data.clear();
        self.time_us = 0;
        self.flags.clear();
        self.skipped_output_count = 0;
    }

    /// Move the buffer's contents into a fresh value for recycling from
    /// within `Drop`, where `self` cannot be moved.
    fn take_for_recycle(&mut self) -> Self {
        Self {
            data: mem::take(&mut self.data),
            time_us: self.time_us,
            flags: self.flags,
            skipped_output_count: self.skipped_output_count,
            owner: Weak::new(),
        }
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("time_us", &self.time_us)
            .field("payload_len", &self.data.len())
            .field("flags", &self.flags)
            .field("skipped_output_count", &self.skipped_output_count)
            .finish_non_exhaustive()
    }
}

impl Drop for OutputBuffer {
    /// Dropping a delivered buffer returns it to its pool. Pooled buffers
    /// drop plainly once the engine is gone (the owner no longer upgrades).
    fn drop(&mut self) {
        let Some(shared) = self.owner.upgrade() else {
            return;
        };
        let mut recycled = self.take_for_recycle();
        recycled.owner = Weak::clone(&self.owner);
        shared.recycle_output(recycled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_reuses_storage_when_capacity_suffices() {
        let mut buf = OutputBuffer::with_capacity(256);
        buf.payload_mut().extend_from_slice(&[1, 2, 3]);
        let before = buf.payload().as_ptr();

        buf.init(99, 128);
        assert_eq!(buf.time_us(), 99);
        assert!(buf.payload().is_empty());
        assert_eq!(buf.payload().as_ptr(), before);
    }

    #[test]
    fn init_grows_when_asked_for_more() {
        let mut buf = OutputBuffer::with_capacity(8);
        buf.init(0, 1024);
        assert!(buf.payload_mut().capacity() >= 1024);
    }

    #[test]
    fn unowned_buffers_drop_plainly() {
        let buf = OutputBuffer::new();
        buf.release();
    }
}
