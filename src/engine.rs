//! The decode engine: pools, queues, and the worker-thread protocol.
//!
//! [`DecodeEngine`] is the concrete [`Decoder`] implementation. It owns two
//! fixed-capacity buffer pools, a pending-decode FIFO, a ready FIFO, and one
//! dedicated worker thread running the codec's blocking decode hook. All
//! shared state sits behind a single mutex with one condition variable; the
//! worker blocks on the condvar (never busy-polls) and the lock is released
//! for the duration of every decode call, so a slow codec only ever stalls
//! callers that hit pool exhaustion.
//!
//! Backpressure is inherent: at most `output_pool_size` decodes can be
//! buffered ahead of the consumer before producers find the input pool
//! empty.

use std::collections::VecDeque;
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::decoder::{Codec, Decoder};
use crate::error::{DecodeError, Error, Result, panic_message};
use crate::flags::BufferFlags;
use crate::input_buffer::InputBuffer;
use crate::output_buffer::OutputBuffer;

/// Pool sizing for a [`DecodeEngine`].
///
/// Library-level configuration, no CLI surface: frontends map whatever they
/// parse into this.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of input buffers created at construction. Fixed for the
    /// engine's lifetime.
    pub input_pool_size: usize,

    /// Number of output buffers created at construction. Fixed for the
    /// engine's lifetime; also the maximum number of decodes that can run
    /// ahead of the consumer.
    pub output_pool_size: usize,

    /// Starting payload capacity passed to the codec's input-buffer
    /// factory. Buffers still grow per their [`crate::input_buffer::GrowthPolicy`].
    pub initial_input_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_pool_size: 4,
            output_pool_size: 4,
            initial_input_capacity: 8 * 1024,
        }
    }
}

/// State shared between caller threads and the worker.
///
/// Everything lives under one mutex; only the worker ever waits on the
/// condvar (the caller-facing operations are all non-blocking by contract).
pub(crate) struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

pub(crate) struct State {
    available_inputs: Vec<InputBuffer>,
    pending_inputs: VecDeque<InputBuffer>,
    available_outputs: Vec<OutputBuffer>,
    ready_outputs: VecDeque<OutputBuffer>,

    /// Slot of the input buffer currently dequeued-but-not-yet-queued.
    /// At most one may exist; a second dequeue is a contract violation.
    dequeued_input_slot: Option<usize>,

    /// Bumped on every flush. A checked-out input buffer stamped with an
    /// older generation is stale: its content is discarded when it comes
    /// back (queued or dropped).
    generation: u64,

    /// Edge-triggered flush request, consumed by the worker's next
    /// dispatch (which tells the codec to reset first).
    flushed: bool,

    /// Terminal, monotonic.
    released: bool,

    /// Write-once. Every later dequeue/queue call re-raises a clone.
    error: Option<DecodeError>,

    /// Decode-only outputs suppressed since the last delivery.
    skipped_output_count: u32,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(State {
                available_inputs: Vec::new(),
                pending_inputs: VecDeque::new(),
                available_outputs: Vec::new(),
                ready_outputs: VecDeque::new(),
                dequeued_input_slot: None,
                generation: 0,
                flushed: false,
                released: false,
                error: None,
                skipped_output_count: 0,
            }),
            cond: Condvar::new(),
        }
    }

    /// Lock the shared state.
    ///
    /// Poisoning is recovered rather than propagated: the decode hook runs
    /// outside the lock and is panic-guarded, so the only code that can
    /// poison this mutex is queue/pool bookkeeping that never leaves the
    /// state half-updated.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return a buffer that left the engine (dropped or stale-queued by a
    /// producer) to the input pool.
    pub(crate) fn recycle_input(&self, mut buf: InputBuffer) {
        let mut state = self.lock();
        if buf.generation == state.generation && state.dequeued_input_slot == Some(buf.slot) {
            state.dequeued_input_slot = None;
        }
        buf.clear();
        state.available_inputs.push(buf);
    }

    /// Return a delivered output buffer to the pool and wake the worker,
    /// which may be waiting for a free output slot.
    pub(crate) fn recycle_output(&self, mut buf: OutputBuffer) {
        let mut state = self.lock();
        buf.clear_for_reuse();
        state.available_outputs.push(buf);
        drop(state);
        self.cond.notify_all();
    }
}

/// A generic asynchronous block decoder.
///
/// Construction starts the worker thread; [`DecodeEngine::release`] (or
/// drop) shuts it down. See the module docs for the concurrency model and
/// [`Decoder`] for the operation contract.
pub struct DecodeEngine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl DecodeEngine {
    /// Build the pools from the codec's factories and start the worker.
    pub fn new<C: Codec>(codec: C, config: EngineConfig) -> Result<Self> {
        let shared = Arc::new(Shared::new());
        {
            let mut state = shared.lock();
            for slot in 0..config.input_pool_size {
                let mut buf = codec.create_input_buffer(config.initial_input_capacity);
                buf.attach(slot, Arc::downgrade(&shared));
                state.available_inputs.push(buf);
            }
            for _ in 0..config.output_pool_size {
                let mut buf = codec.create_output_buffer();
                buf.attach(Arc::downgrade(&shared));
                state.available_outputs.push(buf);
            }
        }

        debug!(
            codec = codec.name(),
            input_pool = config.input_pool_size,
            output_pool = config.output_pool_size,
            "starting decode engine"
        );

        let thread_name = format!("blockdec-{}", codec.name());
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(thread_name)
            .spawn(move || worker_loop(codec, worker_shared))
            .map_err(Error::WorkerSpawn)?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// See [`Decoder::dequeue_input`].
    pub fn dequeue_input(&mut self) -> Result<Option<InputBuffer>> {
        let mut state = self.shared.lock();
        assert!(!state.released, "dequeue_input called after release");
        if let Some(err) = &state.error {
            return Err(err.clone().into());
        }
        assert!(
            state.dequeued_input_slot.is_none(),
            "dequeue_input called while a previous input buffer is still checked out"
        );
        let Some(mut buf) = state.available_inputs.pop() else {
            return Ok(None);
        };
        buf.generation = state.generation;
        state.dequeued_input_slot = Some(buf.slot);
        Ok(Some(buf))
    }

    /// See [`Decoder::queue_input`].
    pub fn queue_input(&mut self, input: InputBuffer) -> Result<()> {
        let mut state = self.shared.lock();
        assert!(!state.released, "queue_input called after release");
        if let Some(err) = &state.error {
            let err = err.clone();
            // The buffer still belongs to the pool; dropping it outside the
            // lock routes it home through its owner reference.
            drop(state);
            drop(input);
            return Err(err.into());
        }
        if input.generation != state.generation {
            // A flush happened while this buffer was checked out; its
            // content is stale and must be discarded, not decoded.
            drop(state);
            drop(input);
            return Ok(());
        }
        match state.dequeued_input_slot {
            Some(slot) if slot == input.slot => {}
            _ => panic!("queue_input called with a buffer that was not the last dequeued"),
        }
        state.dequeued_input_slot = None;
        state.pending_inputs.push_back(input);
        drop(state);
        self.shared.cond.notify_all();
        Ok(())
    }

    /// See [`Decoder::dequeue_output`].
    pub fn dequeue_output(&mut self) -> Result<Option<OutputBuffer>> {
        let mut state = self.shared.lock();
        assert!(!state.released, "dequeue_output called after release");
        if let Some(err) = &state.error {
            return Err(err.clone().into());
        }
        Ok(state.ready_outputs.pop_front())
    }

    /// See [`Decoder::flush`].
    ///
    /// A decode already executing is untouched here (the lock is not held
    /// during decode); the worker discards its result when it re-acquires
    /// the lock and sees the flush.
    pub fn flush(&mut self) {
        let mut state = self.shared.lock();
        state.flushed = true;
        state.generation += 1;
        state.dequeued_input_slot = None;
        state.skipped_output_count = 0;

        let pending = state.pending_inputs.len();
        let ready = state.ready_outputs.len();
        while let Some(mut buf) = state.pending_inputs.pop_front() {
            buf.clear();
            state.available_inputs.push(buf);
        }
        while let Some(mut buf) = state.ready_outputs.pop_front() {
            buf.clear_for_reuse();
            state.available_outputs.push(buf);
        }
        drop(state);

        debug!(
            dropped_pending = pending,
            dropped_ready = ready,
            "flushed decode engine"
        );
    }

    /// See [`Decoder::release`].
    pub fn release(&mut self) {
        {
            let mut state = self.shared.lock();
            if state.released && self.worker.is_none() {
                return;
            }
            state.released = true;
        }
        self.shared.cond.notify_all();
        if let Some(worker) = self.worker.take() {
            debug!("releasing decode engine, waiting for worker exit");
            // The worker guards the decode hook with catch_unwind, so a
            // join error here means something far outside normal operation.
            if worker.join().is_err() {
                debug!("decode worker terminated abnormally during release");
            }
        }
    }
}

impl Decoder for DecodeEngine {
    fn dequeue_input(&mut self) -> Result<Option<InputBuffer>> {
        DecodeEngine::dequeue_input(self)
    }

    fn queue_input(&mut self, input: InputBuffer) -> Result<()> {
        DecodeEngine::queue_input(self, input)
    }

    fn dequeue_output(&mut self) -> Result<Option<OutputBuffer>> {
        DecodeEngine::dequeue_output(self)
    }

    fn flush(&mut self) {
        DecodeEngine::flush(self)
    }

    fn release(&mut self) {
        DecodeEngine::release(self)
    }
}

impl Drop for DecodeEngine {
    fn drop(&mut self) {
        self.release();
    }
}

/// One unit of work handed to the worker: the input to decode, the output
/// slot to decode into, and whether a flush was requested since the
/// previous decode call.
type Work = (InputBuffer, OutputBuffer, bool);

/// Block until there is either work or a shutdown request.
fn next_work(shared: &Shared) -> Option<Work> {
    let mut state = shared.lock();
    loop {
        if state.released {
            return None;
        }
        if !state.pending_inputs.is_empty() && !state.available_outputs.is_empty() {
            if let (Some(input), Some(output)) = (
                state.pending_inputs.pop_front(),
                state.available_outputs.pop(),
            ) {
                let reset = mem::take(&mut state.flushed);
                return Some((input, output, reset));
            }
        }
        state = shared
            .cond
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

fn worker_loop<C: Codec>(mut codec: C, shared: Arc<Shared>) {
    while let Some((mut input, mut output, reset)) = next_work(&shared) {
        output.set_time_us(input.time_us());

        let mut failure: Option<DecodeError> = None;
        if input.flags().is_end_of_stream() {
            // End-of-stream passes through without a decode call.
            output.flags_mut().add(BufferFlags::END_OF_STREAM);
        } else {
            if input.flags().is_decode_only() {
                output.flags_mut().add(BufferFlags::DECODE_ONLY);
            }
            trace!(time_us = input.time_us(), reset, "decoding unit");
            // The lock is not held here; a slow decode blocks nobody but
            // pool-exhausted callers. A panicking hook degrades to a
            // recorded error instead of a dead worker.
            match catch_unwind(AssertUnwindSafe(|| codec.decode(&input, &mut output, reset))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => failure = Some(err),
                Err(payload) => failure = Some(codec.unexpected_fault(panic_message(payload))),
            }
        }

        let mut state = shared.lock();
        if let Some(err) = failure {
            debug!(error = %err, "decode failed; engine is now permanently failed");
            input.clear();
            state.available_inputs.push(input);
            output.clear_for_reuse();
            state.available_outputs.push(output);
            state.error = Some(err);
            return;
        }

        if state.flushed {
            // The flush arrived while this unit was decoding; its result
            // must never reach the consumer.
            output.clear_for_reuse();
            state.available_outputs.push(output);
        } else if output.flags().is_decode_only() {
            // Suppressed: decoded to prime codec state, never delivered.
            state.skipped_output_count += 1;
            output.clear_for_reuse();
            state.available_outputs.push(output);
        } else {
            output.set_skipped_output_count(state.skipped_output_count);
            state.skipped_output_count = 0;
            state.ready_outputs.push_back(output);
        }
        input.clear();
        state.available_inputs.push(input);
    }
}
