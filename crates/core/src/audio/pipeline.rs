use std::{
    sync::{Condvar, Mutex, MutexGuard},
    time::Duration,
};

use serde::Serialize;
use tracing::trace;

use super::RingBuffer;
use crate::{DemoError, Result};

/// Result of a blocking producer write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Every byte was deposited.
    Complete,
    /// Stop was requested before all bytes fit; nothing more was written.
    Interrupted { written: usize },
}

/// Result of a consumer pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The whole request was filled, padding with silence where needed.
    Filled(usize),
    /// Production has ended and every byte has been consumed.
    EndOfStream,
}

/// Aggregate counters for logging. Reading them has no effect on playback.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub capacity: usize,
    pub occupied: usize,
    pub frames_rendered: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    /// Zero bytes handed out because the buffer ran dry.
    pub silence_bytes: u64,
    pub stopped: bool,
    pub finished: bool,
}

impl PipelineStats {
    /// Buffered bytes as a percentage of capacity.
    pub fn fill_percent(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.occupied as f32 / self.capacity as f32 * 100.0
    }
}

#[derive(Debug)]
struct PipelineState {
    ring: RingBuffer,
    stopped: bool,
    finished: bool,
    frames_rendered: u64,
    bytes_written: u64,
    bytes_read: u64,
    silence_bytes: u64,
}

/// Bounded byte pipeline between one producer and one real-time consumer.
///
/// The producer blocks while the ring is full; the consumer never blocks.
/// Every read that frees space wakes one waiting producer, and `stop` wakes
/// all of them.
#[derive(Debug)]
pub struct Pipeline {
    state: Mutex<PipelineState>,
    space: Condvar,
    done: Condvar,
}

impl Pipeline {
    /// Creates an empty pipeline holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            state: Mutex::new(PipelineState {
                ring: RingBuffer::new(capacity)?,
                stopped: false,
                finished: false,
                frames_rendered: 0,
                bytes_written: 0,
                bytes_read: 0,
                silence_bytes: 0,
            }),
            space: Condvar::new(),
            done: Condvar::new(),
        })
    }

    /// Writes all of `bytes`, waiting for free capacity as needed.
    ///
    /// Returns early with [`WriteOutcome::Interrupted`] once stop is
    /// requested, even if the consumer never frees another byte.
    pub fn write(&self, bytes: &[u8]) -> Result<WriteOutcome> {
        let mut state = self.lock_state()?;
        let mut written = 0;

        while written < bytes.len() {
            while state.ring.is_full() && !state.stopped {
                trace!(occupied = state.ring.occupied(), "producer waiting for space");
                state = self
                    .space
                    .wait(state)
                    .map_err(|_| DemoError::Poisoned("audio pipeline"))?;
            }
            if state.stopped {
                return Ok(WriteOutcome::Interrupted { written });
            }

            let count = state.ring.push(&bytes[written..]);
            state.bytes_written += count as u64;
            written += count;
        }

        Ok(WriteOutcome::Complete)
    }

    /// Drains up to `out.len()` buffered bytes without blocking.
    pub fn drain(&self, out: &mut [u8]) -> Result<usize> {
        let count = {
            let mut state = self.lock_state()?;
            let count = state.ring.pop(out);
            state.bytes_read += count as u64;
            count
        };
        if count > 0 {
            self.space.notify_one();
        }
        Ok(count)
    }

    /// Consumer-facing read: fills all of `out` or reports end of stream.
    ///
    /// While production is still live, a short or empty buffer is padded
    /// with zero bytes so the sink never sees a partial frame.
    pub fn pull(&self, out: &mut [u8]) -> Result<PullOutcome> {
        let (count, finished) = {
            let mut state = self.lock_state()?;
            let count = state.ring.pop(out);
            state.bytes_read += count as u64;
            if count == 0 && state.finished {
                return Ok(PullOutcome::EndOfStream);
            }
            if count < out.len() {
                state.silence_bytes += (out.len() - count) as u64;
            }
            (count, state.finished)
        };

        if count > 0 {
            self.space.notify_one();
        }
        if count < out.len() {
            if !finished {
                trace!(requested = out.len(), available = count, "pipeline underrun");
            }
            out[count..].fill(0);
        }
        Ok(PullOutcome::Filled(out.len()))
    }

    /// Requests the producer to stop and wakes every waiter.
    pub fn stop(&self) -> Result<()> {
        self.lock_state()?.stopped = true;
        self.space.notify_all();
        Ok(())
    }

    /// Marks production as permanently ended.
    pub fn finish(&self) -> Result<()> {
        self.lock_state()?.finished = true;
        self.space.notify_all();
        self.done.notify_all();
        Ok(())
    }

    /// Returns whether stop has been requested.
    pub fn is_stopped(&self) -> Result<bool> {
        Ok(self.lock_state()?.stopped)
    }

    /// Returns whether production has ended, for any reason.
    pub fn is_finished(&self) -> Result<bool> {
        Ok(self.lock_state()?.finished)
    }

    /// Waits until [`Pipeline::finish`] has been called. Returns `false` on timeout.
    pub fn wait_finished(&self, timeout: Duration) -> Result<bool> {
        let state = self.lock_state()?;
        let (state, _) = self
            .done
            .wait_timeout_while(state, timeout, |state| !state.finished)
            .map_err(|_| DemoError::Poisoned("audio pipeline"))?;
        Ok(state.finished)
    }

    pub(crate) fn record_frame(&self) -> Result<()> {
        self.lock_state()?.frames_rendered += 1;
        Ok(())
    }

    /// Snapshot of the counters, taken under the pipeline lock.
    pub fn stats(&self) -> Result<PipelineStats> {
        let state = self.lock_state()?;
        Ok(PipelineStats {
            capacity: state.ring.capacity(),
            occupied: state.ring.occupied(),
            frames_rendered: state.frames_rendered,
            bytes_written: state.bytes_written,
            bytes_read: state.bytes_read,
            silence_bytes: state.silence_bytes,
            stopped: state.stopped,
            finished: state.finished,
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, PipelineState>> {
        self.state
            .lock()
            .map_err(|_| DemoError::Poisoned("audio pipeline"))
    }
}
