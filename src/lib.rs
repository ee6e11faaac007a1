//! `blockdec` — a small, focused asynchronous block-decoder engine.
//!
//! This crate provides:
//! - A dedicated worker thread running an arbitrary blocking "decode one
//!   unit" function
//! - Fixed-capacity input/output buffer pools with zero steady-state
//!   allocation
//! - The minimal contract a concrete codec must satisfy
//! - Flush, permanent-error, and clean-shutdown semantics
//!
//! The engine performs no I/O and knows nothing about containers, codecs,
//! or clocks: input bytes arrive from wherever (demuxer, network) and
//! output bytes go wherever (renderer, sink) through the exchanged buffer
//! objects. Producers and consumers may run on any threads; backpressure
//! falls out of pool exhaustion.

// The engine and its configuration (most consumers should start here).
pub mod engine;

// The decoder contract and codec policy hooks.
pub mod decoder;

// Pooled buffer types and their metadata.
pub mod crypto;
pub mod flags;
pub mod input_buffer;
pub mod output_buffer;

// Error taxonomy.
pub mod error;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use crate::decoder::{Codec, Decoder};
pub use crate::engine::{DecodeEngine, EngineConfig};
pub use crate::error::{DecodeError, Error, Result};
pub use crate::flags::BufferFlags;
pub use crate::input_buffer::{GrowthPolicy, InputBuffer};
pub use crate::output_buffer::OutputBuffer;
