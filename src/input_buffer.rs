//! Pooled input buffers holding one encoded unit each.
//!
//! An [`InputBuffer`] is created once per pool slot when the engine is built
//! and reused for the engine's lifetime: producers fill it, the worker reads
//! it, and the engine clears it back into the pool. Backing storage is only
//! replaced when a write genuinely needs more room, so the steady-state path
//! allocates nothing.
//!
//! The payload region follows a write-then-read discipline: producers write
//! and then [`InputBuffer::flip`] before queueing; the codec reads the
//! flipped view. [`InputBuffer::clear`] rewinds everything for the next
//! round without shrinking storage.

use std::mem;
use std::sync::Weak;

use crate::crypto::CryptoInfo;
use crate::engine::Shared;
use crate::error::{Error, Result};
use crate::flags::BufferFlags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How an [`InputBuffer`] responds to writes that exceed its capacity.
///
/// Fixed at construction; the choice is a property of the pipeline (a
/// fixed-budget embedded pipeline disables growth, a general-purpose one
/// allows it), not of any individual write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GrowthPolicy {
    /// Insufficient capacity fails the write with
    /// [`Error::InsufficientCapacity`], carrying the exact current and
    /// required sizes. The error goes to the writer synchronously and is
    /// never recorded by the engine.
    Disabled,
    /// Insufficient capacity installs a replacement allocation of the
    /// required size, preserving all bytes written so far in order.
    #[default]
    Growable,
}

/// A growable byte region with a write cursor and a read limit.
///
/// `buf.len()` is the write cursor; `limit` is frozen by `flip` and bounds
/// the read view. Capacity only changes through `ensure`.
#[derive(Debug, Default)]
struct ByteRegion {
    buf: Vec<u8>,
    limit: usize,
}

impl ByteRegion {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            limit: 0,
        }
    }

    fn written(&self) -> usize {
        self.buf.len()
    }

    fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Guarantee room for `additional` more bytes past the write cursor.
    fn ensure(&mut self, additional: usize, policy: GrowthPolicy) -> Result<()> {
        let required = self.buf.len() + additional;
        if required <= self.buf.capacity() {
            return Ok(());
        }
        if policy == GrowthPolicy::Disabled {
            return Err(Error::InsufficientCapacity {
                current: self.buf.capacity(),
                required,
            });
        }
        // Install a replacement allocation of the required size, carrying
        // over every byte written so far in order.
        let mut replacement = Vec::with_capacity(required);
        replacement.extend_from_slice(&self.buf);
        self.buf = replacement;
        Ok(())
    }

    /// Append at the write cursor. Capacity must have been ensured.
    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Freeze write mode into read mode: the read view becomes everything
    /// written so far.
    fn flip(&mut self) {
        self.limit = self.buf.len();
    }

    /// Rewind both cursors, retaining storage.
    fn clear(&mut self) {
        self.buf.clear();
        self.limit = 0;
    }

    fn read_slice(&self) -> &[u8] {
        &self.buf[..self.limit]
    }
}

/// A pooled buffer holding one encoded unit plus its metadata.
pub struct InputBuffer {
    data: ByteRegion,
    supplemental: Option<ByteRegion>,
    policy: GrowthPolicy,
    padding: usize,
    time_us: i64,
    flags: BufferFlags,
    crypto: CryptoInfo,
    waiting_for_keys: bool,

    // Engine bookkeeping. `slot` identifies the pool slot this buffer was
    // created for; `generation` is stamped at dequeue and goes stale when
    // the engine flushes; `owner` routes the buffer home when it is dropped
    // outside the engine.
    pub(crate) slot: usize,
    pub(crate) generation: u64,
    pub(crate) owner: Weak<Shared>,
}

impl InputBuffer {
    /// Create a blank buffer.
    ///
    /// `padding` is added to every requested write length before the
    /// capacity check, giving codecs that over-read (SIMD loads, bitreader
    /// lookahead) a safe margin past the payload.
    pub fn new(policy: GrowthPolicy, initial_capacity: usize, padding: usize) -> Self {
        Self {
            data: ByteRegion::with_capacity(initial_capacity),
            supplemental: None,
            policy,
            padding,
            time_us: 0,
            flags: BufferFlags::none(),
            crypto: CryptoInfo::default(),
            waiting_for_keys: false,
            slot: usize::MAX,
            generation: 0,
            owner: Weak::new(),
        }
    }

    /// Guarantee room for a write of `len` bytes (plus the fixed padding)
    /// past the current write position.
    ///
    /// With [`GrowthPolicy::Disabled`] and insufficient capacity this fails
    /// synchronously with the exact current/required sizes; nothing is
    /// recorded in the engine.
    pub fn ensure_space_for_write(&mut self, len: usize) -> Result<()> {
        self.data.ensure(len + self.padding, self.policy)
    }

    /// Append `bytes` at the write cursor, growing per the buffer's policy.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_space_for_write(bytes.len())?;
        self.data.write(bytes);
        Ok(())
    }

    /// Bytes written so far (the write cursor).
    pub fn bytes_written(&self) -> usize {
        self.data.written()
    }

    /// Current payload capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Switch the payload (and any supplemental region) from write mode to
    /// read mode. Producers call this once the unit is fully written, before
    /// queueing the buffer.
    pub fn flip(&mut self) {
        self.data.flip();
        if let Some(supplemental) = &mut self.supplemental {
            supplemental.flip();
        }
    }

    /// The readable payload: everything written before the last [`flip`].
    ///
    /// [`flip`]: Self::flip
    pub fn payload(&self) -> &[u8] {
        self.data.read_slice()
    }

    /// Reset for reuse: rewind both regions, clear flags, crypto metadata
    /// and the waiting-for-keys marker. Storage is retained.
    pub fn clear(&mut self) {
        self.data.clear();
        if let Some(supplemental) = &mut self.supplemental {
            supplemental.clear();
        }
        self.time_us = 0;
        self.flags.clear();
        self.crypto.clear();
        self.waiting_for_keys = false;
    }

    /// Prepare the supplemental-data region for `len` bytes.
    ///
    /// The side region is only reallocated when its current capacity is
    /// insufficient; otherwise the existing one is rewound, so steady-state
    /// calls allocate nothing.
    pub fn reset_supplemental_data(&mut self, len: usize) {
        let region = self.supplemental.get_or_insert_with(ByteRegion::default);
        region.clear();
        // Growth of the side region is always permitted; its size is decided
        // by whoever attaches the data, not by the payload policy.
        let _ = region.ensure(len, GrowthPolicy::Growable);
    }

    /// Append to the supplemental-data region.
    ///
    /// Fails with [`Error::InsufficientCapacity`] when the write exceeds the
    /// capacity established by [`reset_supplemental_data`].
    ///
    /// [`reset_supplemental_data`]: Self::reset_supplemental_data
    pub fn write_supplemental_data(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(region) = &mut self.supplemental else {
            return Err(Error::InsufficientCapacity {
                current: 0,
                required: bytes.len(),
            });
        };
        region.ensure(bytes.len(), GrowthPolicy::Disabled)?;
        region.write(bytes);
        Ok(())
    }

    /// The readable supplemental data, empty when none was attached.
    pub fn supplemental_data(&self) -> &[u8] {
        self.supplemental
            .as_ref()
            .map(ByteRegion::read_slice)
            .unwrap_or(&[])
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

    pub fn crypto(&self) -> &CryptoInfo {
        &self.crypto
    }

    pub fn crypto_mut(&mut self) -> &mut CryptoInfo {
        &mut self.crypto
    }

    /// Whether the sample cannot be decoded until decryption keys arrive.
    pub fn is_waiting_for_keys(&self) -> bool {
        self.waiting_for_keys
    }

    pub fn set_waiting_for_keys(&mut self, waiting: bool) {
        self.waiting_for_keys = waiting;
    }

    /// Install the pool back-reference at engine construction.
    pub(crate) fn attach(&mut self, slot: usize, owner: Weak<Shared>) {
        self.slot = slot;
        self.owner = owner;
    }

    /// Move the buffer's contents into a fresh value for recycling from
    /// within `Drop`, where `self` cannot be moved.
    fn take_for_recycle(&mut self) -> Self {
        Self {
            data: mem::take(&mut self.data),
            supplemental: self.supplemental.take(),
            policy: self.policy,
            padding: self.padding,
            time_us: self.time_us,
            flags: self.flags,
            crypto: mem::take(&mut self.crypto),
            waiting_for_keys: self.waiting_for_keys,
            slot: self.slot,
            generation: self.generation,
            owner: Weak::new(),
        }
    }
}

impl std::fmt::Debug for InputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBuffer")
            .field("slot", &self.slot)
            .field("time_us", &self.time_us)
            .field("bytes_written", &self.bytes_written())
            .field("capacity", &self.capacity())
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Drop for InputBuffer {
    /// Dropping a checked-out buffer returns it to its pool, keeping pool
    /// accounting whole even when a producer abandons a buffer instead of
    /// queueing it. Pooled buffers themselves drop plainly once the engine
    /// is gone (the owner no longer upgrades).
    fn drop(&mut self) {
        let Some(shared) = self.owner.upgrade() else {
            return;
        };
        let mut recycled = self.take_for_recycle();
        recycled.owner = Weak::clone(&self.owner);
        shared.recycle_input(recycled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_preserves_written_bytes_and_adds_padding() {
        let mut buf = InputBuffer::new(GrowthPolicy::Growable, 8, 4);
        buf.write(b"abcdef").unwrap();

        buf.ensure_space_for_write(32).unwrap();
        assert!(buf.capacity() >= 6 + 32 + 4);

        buf.write(b"ghij").unwrap();
        buf.flip();
        assert_eq!(buf.payload(), b"abcdefghij");
    }

    #[test]
    fn disabled_growth_reports_exact_sizes() {
        let mut buf = InputBuffer::new(GrowthPolicy::Disabled, 8, 2);
        buf.write(b"abcd").unwrap();

        let err = buf.ensure_space_for_write(100).unwrap_err();
        match err {
            Error::InsufficientCapacity { current, required } => {
                assert_eq!(current, buf.capacity());
                assert_eq!(required, 4 + 100 + 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The failed write changed nothing.
        buf.flip();
        assert_eq!(buf.payload(), b"abcd");
    }

    #[test]
    fn payload_is_empty_until_flipped() {
        let mut buf = InputBuffer::new(GrowthPolicy::Growable, 16, 0);
        buf.write(b"data").unwrap();
        assert!(buf.payload().is_empty());

        buf.flip();
        assert_eq!(buf.payload(), b"data");
    }

    #[test]
    fn clear_resets_everything_but_keeps_storage() {
        let mut buf = InputBuffer::new(GrowthPolicy::Growable, 16, 0);
        buf.write(b"payload").unwrap();
        buf.set_time_us(42);
        buf.flags_mut().add(BufferFlags::KEY_FRAME);
        buf.set_waiting_for_keys(true);
        buf.crypto_mut().key_id = vec![7];
        let capacity = buf.capacity();

        buf.clear();
        assert_eq!(buf.bytes_written(), 0);
        assert_eq!(buf.time_us(), 0);
        assert_eq!(buf.flags().bits(), 0);
        assert!(!buf.is_waiting_for_keys());
        assert!(buf.crypto().key_id.is_empty());
        assert_eq!(buf.capacity(), capacity);
    }

    #[test]
    fn supplemental_reset_reuses_capacity() {
        let mut buf = InputBuffer::new(GrowthPolicy::Growable, 16, 0);

        buf.reset_supplemental_data(64);
        buf.write_supplemental_data(b"side-data").unwrap();
        buf.flip();
        assert_eq!(buf.supplemental_data(), b"side-data");

        // A smaller reset must rewind the existing region, not reallocate.
        let before = buf.supplemental_data().as_ptr();
        buf.reset_supplemental_data(16);
        buf.write_supplemental_data(b"x").unwrap();
        buf.flip();
        let after = buf.supplemental_data().as_ptr();
        assert_eq!(before, after);
        assert_eq!(buf.supplemental_data(), b"x");
    }

    #[test]
    fn supplemental_write_respects_reset_capacity() {
        let mut buf = InputBuffer::new(GrowthPolicy::Growable, 16, 0);
        buf.reset_supplemental_data(4);

        let err = buf.write_supplemental_data(&[0u8; 1024]).unwrap_err();
        assert!(matches!(err, Error::InsufficientCapacity { .. }));
    }
}
