//! The decoder contract and the codec policy hooks.
//!
//! Two seams, kept deliberately small:
//! - [`Decoder`] is what a pipeline consumes: the four buffer-exchange
//!   operations plus terminal shutdown. [`crate::engine::DecodeEngine`] is
//!   the concrete implementation.
//! - [`Codec`] is what a concrete codec supplies: blank-buffer factories
//!   for both pools, the blocking decode function, and a wrapper for
//!   unexpected faults. The engine owns everything else (threading, pools,
//!   queues, flush/error bookkeeping).

use crate::error::{DecodeError, Result};
use crate::input_buffer::InputBuffer;
use crate::output_buffer::OutputBuffer;

/// The four-operation contract a pipeline drives a decoder through.
///
/// `dequeue_input`, `queue_input` and `dequeue_output` fail with the
/// recorded [`DecodeError`] once the engine has failed; `flush` and
/// `release` always succeed. API-contract violations (a second dequeue
/// while an input buffer is still checked out, queueing a buffer that was
/// not the last dequeued) are programming errors and panic.
pub trait Decoder {
    /// Take an empty input buffer to fill, or `None` iff the input pool is
    /// exhausted (every buffer is checked out, pending, or being decoded).
    fn dequeue_input(&mut self) -> Result<Option<InputBuffer>>;

    /// Hand a filled buffer to the engine. Buffers are decoded in strict
    /// queue order.
    fn queue_input(&mut self, input: InputBuffer) -> Result<()>;

    /// Take the next decoded buffer, or `None` iff nothing is ready.
    fn dequeue_output(&mut self) -> Result<Option<OutputBuffer>>;

    /// Discard queued and in-flight work and reclaim owned buffers without
    /// destroying the engine. The next decode call sees a reset request.
    fn flush(&mut self);

    /// One-time terminal shutdown. Blocks until the worker thread has
    /// fully exited; idempotent.
    fn release(&mut self);
}

/// Policy hooks a concrete codec supplies to [`crate::engine::DecodeEngine`].
///
/// The decode function runs on the engine's worker thread with no lock
/// held, so it may block for as long as a unit takes; bounding decode
/// duration is the codec's responsibility, not the engine's.
pub trait Codec: Send + 'static {
    /// Short name used for the worker thread and log events.
    fn name(&self) -> &str;

    /// Produce one blank input buffer for the pool.
    ///
    /// `initial_capacity` is the engine's configured starting payload size;
    /// codecs are free to ignore it (for example to apply a format-derived
    /// size or a different growth policy).
    fn create_input_buffer(&self, initial_capacity: usize) -> InputBuffer;

    /// Produce one blank output buffer for the pool.
    fn create_output_buffer(&self) -> OutputBuffer;

    /// Decode one unit from `input` into `output`.
    ///
    /// `reset` is true when a flush was requested since the previous decode
    /// call; the codec must drop any inter-frame state before decoding this
    /// unit.
    ///
    /// The input's flags have already been copied onto `output` where they
    /// apply (decode-only). The hook may set or unset
    /// [`crate::flags::BufferFlags::DECODE_ONLY`] on the output; if it is
    /// still set afterwards the output is suppressed instead of delivered.
    ///
    /// Returning an error — or panicking — permanently fails the engine
    /// with the same declared error kind; it never crashes the worker.
    fn decode(
        &mut self,
        input: &InputBuffer,
        output: &mut OutputBuffer,
        reset: bool,
    ) -> std::result::Result<(), DecodeError>;

    /// Wrap an unexpected host fault (a panic caught at the decode
    /// boundary) into the declared error kind.
    fn unexpected_fault(&self, detail: String) -> DecodeError {
        DecodeError::msg(format!("decode hook panicked: {detail}"))
    }
}
