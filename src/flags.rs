//! Per-buffer flag bits shared by input and output buffers.
//!
//! A flag word travels with every buffer through the engine, so this type is
//! a pure value: a `u32` plus bit tests. There is no validation layer — the
//! engine itself only ever reads [`BufferFlags::DECODE_ONLY`] and
//! [`BufferFlags::END_OF_STREAM`]; the rest is carried for the codec and the
//! surrounding pipeline.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A bit set of per-buffer markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BufferFlags(u32);

impl BufferFlags {
    /// The buffer should be decoded (to prime codec state) but its output
    /// must not be delivered to a consumer.
    pub const DECODE_ONLY: u32 = 1 << 0;

    /// No further buffers follow this one.
    pub const END_OF_STREAM: u32 = 1 << 1;

    /// The buffer starts at a point from which decoding can begin without
    /// earlier data (a sync sample / key frame).
    pub const KEY_FRAME: u32 = 1 << 2;

    /// The buffer's payload is encrypted; its crypto metadata applies.
    pub const ENCRYPTED: u32 = 1 << 3;

    /// An empty flag set.
    pub fn none() -> Self {
        Self(0)
    }

    /// Zero all flags.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Replace the whole flag word.
    pub fn set(&mut self, bits: u32) {
        self.0 = bits;
    }

    /// The raw flag word.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Set a single flag bit.
    pub fn add(&mut self, flag: u32) {
        self.0 |= flag;
    }

    /// Clear a single flag bit.
    pub fn remove(&mut self, flag: u32) {
        self.0 &= !flag;
    }

    /// Test an arbitrary flag bit.
    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn is_decode_only(&self) -> bool {
        self.contains(Self::DECODE_ONLY)
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.contains(Self::END_OF_STREAM)
    }

    pub fn is_key_frame(&self) -> bool {
        self.contains(Self::KEY_FRAME)
    }

    pub fn is_encrypted(&self) -> bool {
        self.contains(Self::ENCRYPTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_and_predicates() {
        let mut flags = BufferFlags::none();
        assert!(!flags.is_key_frame());

        flags.add(BufferFlags::KEY_FRAME);
        flags.add(BufferFlags::ENCRYPTED);
        assert!(flags.is_key_frame());
        assert!(flags.is_encrypted());
        assert!(!flags.is_end_of_stream());

        flags.remove(BufferFlags::KEY_FRAME);
        assert!(!flags.is_key_frame());
        assert!(flags.is_encrypted());
    }

    #[test]
    fn set_replaces_the_whole_word() {
        let mut flags = BufferFlags::none();
        flags.add(BufferFlags::DECODE_ONLY);

        flags.set(BufferFlags::END_OF_STREAM);
        assert!(flags.is_end_of_stream());
        assert!(!flags.is_decode_only());
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut flags = BufferFlags::none();
        flags.set(BufferFlags::DECODE_ONLY | BufferFlags::KEY_FRAME);

        flags.clear();
        assert_eq!(flags.bits(), 0);
    }
}
