//! Encryption metadata carried alongside an encoded sample.
//!
//! The engine never interprets any of this; it is plumbing between whatever
//! demuxed the sample and the codec's decode hook. Keeping it on the input
//! buffer (instead of a side channel) means it is cleared and reused with
//! the buffer itself.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The encryption scheme applied to a sample's payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EncryptionScheme {
    /// The payload is not encrypted.
    #[default]
    Unencrypted,
    /// AES-CTR full-sample or subsample encryption ("cenc").
    AesCtr,
    /// AES-CBC pattern encryption ("cbcs").
    AesCbc,
}

/// One subsample mapping: how many leading clear bytes precede how many
/// encrypted bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Subsample {
    pub clear_bytes: u32,
    pub encrypted_bytes: u32,
}

/// Per-sample encryption metadata.
///
/// An empty `subsamples` list with a non-[`EncryptionScheme::Unencrypted`]
/// scheme means the whole payload is encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CryptoInfo {
    pub scheme: EncryptionScheme,
    pub key_id: Vec<u8>,
    pub iv: Vec<u8>,
    pub subsamples: Vec<Subsample>,
}

impl CryptoInfo {
    /// Reset to the unencrypted default, retaining allocations.
    pub fn clear(&mut self) {
        self.scheme = EncryptionScheme::Unencrypted;
        self.key_id.clear();
        self.iv.clear();
        self.subsamples.clear();
    }
}
