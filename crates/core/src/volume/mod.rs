//! Output gain and its wall-clock fade, independent of the audio data path.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use flume::{Receiver, RecvTimeoutError, TryRecvError};
use tracing::debug;

/// Default fade tick, roughly 60 Hz.
pub const DEFAULT_FADE_TICK: Duration = Duration::from_millis(16);

/// Shared output gain in `[0, 1]`, guarded by its own lock.
#[derive(Debug, Clone)]
pub struct VolumeControl {
    level: Arc<Mutex<f32>>,
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl VolumeControl {
    pub fn new(initial: f32) -> Self {
        Self {
            level: Arc::new(Mutex::new(initial.clamp(0.0, 1.0))),
        }
    }

    pub fn volume(&self) -> f32 {
        *self.lock()
    }

    /// Sets the gain, clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        *self.lock() = volume;
    }

    /// Ramps linearly from the current gain to zero over `duration`.
    ///
    /// Only one fade may run at a time per control; overlapping fades fight
    /// over the same value.
    pub fn fade_out(&self, duration: Duration) -> FadeCompletion {
        self.fade_out_with_tick(duration, DEFAULT_FADE_TICK)
    }

    pub fn fade_out_with_tick(&self, duration: Duration, tick: Duration) -> FadeCompletion {
        let (tx, rx) = flume::bounded(1);
        let control = self.clone();
        let tick = tick.max(Duration::from_millis(1));

        let handle = thread::spawn(move || {
            let start_volume = control.volume();
            if start_volume <= 0.0 {
                let _ = tx.send(());
                return;
            }

            debug!(start_volume, ?duration, "volume fade started");
            let started = Instant::now();
            loop {
                let elapsed = started.elapsed();
                if elapsed >= duration {
                    control.set_volume(0.0);
                    let _ = tx.send(());
                    debug!("volume fade complete");
                    return;
                }
                let remaining = 1.0 - elapsed.as_secs_f32() / duration.as_secs_f32();
                control.set_volume(start_volume * remaining);
                thread::sleep(tick);
            }
        });

        FadeCompletion {
            rx,
            handle: Some(handle),
            complete: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, f32> {
        // The guarded value is a plain float; a poisoned lock still holds a usable gain.
        self.level
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Completion signal of a running fade. Fires exactly once.
#[derive(Debug)]
pub struct FadeCompletion {
    rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    complete: bool,
}

impl FadeCompletion {
    /// Non-blocking check.
    pub fn is_complete(&mut self) -> bool {
        if !self.complete {
            match self.rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => self.mark_complete(),
                Err(TryRecvError::Empty) => {}
            }
        }
        self.complete
    }

    /// Blocks for at most `timeout`. Returns whether the fade has finished.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if !self.complete {
            match self.rx.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => self.mark_complete(),
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        self.complete
    }

    /// Blocks until the fade has finished.
    pub fn wait(mut self) {
        if !self.complete {
            let _ = self.rx.recv();
            self.mark_complete();
        }
    }

    fn mark_complete(&mut self) {
        self.complete = true;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Scales interleaved signed 16-bit little-endian samples in place.
///
/// A trailing odd byte is left untouched.
pub fn apply_gain(pcm: &mut [u8], gain: f32) {
    if gain >= 1.0 {
        return;
    }
    let gain = gain.max(0.0);
    for sample in pcm.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]);
        let scaled = (f32::from(value) * gain).round() as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}
