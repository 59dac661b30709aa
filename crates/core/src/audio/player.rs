use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, info, warn};

use super::{Decoder, DriverExit, Pipeline, PipelineStats, PullOutcome, RenderDriver, RenderSummary};
use crate::{
    config::{AppConfig, PlaybackConfig},
    position::{PositionSnapshot, SnapshotSlot},
    volume::{self, FadeCompletion, VolumeControl},
    DemoError, Result,
};

/// Outcome of [`Player::stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// `false` when the render loop missed the shutdown deadline.
    pub clean: bool,
    /// Present whenever the render loop exited in time.
    pub summary: Option<RenderSummary>,
}

impl ShutdownReport {
    /// Surfaces a decoder failure as an error; everything else is success.
    pub fn into_result(self) -> Result<Option<RenderSummary>> {
        if let Some(RenderSummary {
            exit: DriverExit::DecodeFailed(reason),
            ..
        }) = &self.summary
        {
            return Err(DemoError::Decode(reason.clone()));
        }
        Ok(self.summary)
    }
}

/// Plays a decoder through the ring-buffer pipeline and exposes sync state.
pub struct Player {
    pipeline: Arc<Pipeline>,
    slot: SnapshotSlot,
    volume: VolumeControl,
    config: PlaybackConfig,
    decoder: Option<Box<dyn Decoder>>,
    handle: Option<JoinHandle<RenderSummary>>,
    report: Option<ShutdownReport>,
}

impl Player {
    /// Validates the decoder against the audio configuration and sizes the
    /// ring buffer. Nothing is decoded until [`Player::start`].
    pub fn new(decoder: impl Decoder + 'static, config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let sample_rate = decoder.sample_rate();
        if sample_rate == 0 {
            return Err(DemoError::config("decoder reports a zero sample rate"));
        }
        if sample_rate != config.audio.sample_rate {
            return Err(DemoError::config(format!(
                "decoder renders at {sample_rate} Hz but output is configured for {} Hz",
                config.audio.sample_rate
            )));
        }

        let capacity = config.audio.ring_capacity();
        debug!(sample_rate, capacity, "player created");

        Ok(Self {
            pipeline: Arc::new(Pipeline::new(capacity)?),
            slot: SnapshotSlot::new(),
            volume: VolumeControl::default(),
            config: config.playback.clone(),
            decoder: Some(Box::new(decoder)),
            handle: None,
            report: None,
        })
    }

    /// Spawns the render driver. Calling it twice is an error.
    pub fn start(&mut self) -> Result<()> {
        let decoder = self
            .decoder
            .take()
            .ok_or_else(|| DemoError::msg("player has already been started"))?;
        let driver = RenderDriver::new(decoder, Arc::clone(&self.pipeline), self.slot.clone());
        let handle = thread::Builder::new()
            .name("render-driver".into())
            .spawn(move || driver.run())?;
        self.handle = Some(handle);
        info!("playback started");
        Ok(())
    }

    /// Latest published position.
    pub fn sync_state(&self) -> PositionSnapshot {
        self.slot.latest()
    }

    /// Current pipeline counters.
    pub fn stats(&self) -> Result<PipelineStats> {
        self.pipeline.stats()
    }

    /// Consumer handle for the audio sink.
    pub fn output(&self) -> AudioOutput {
        AudioOutput {
            pipeline: Arc::clone(&self.pipeline),
            volume: self.volume.clone(),
        }
    }

    /// Read-only handles for diagnostics.
    pub fn probe(&self) -> PlaybackProbe {
        PlaybackProbe {
            pipeline: Arc::clone(&self.pipeline),
            slot: self.slot.clone(),
        }
    }

    /// Returns the current output gain.
    pub fn volume(&self) -> f32 {
        self.volume.volume()
    }

    /// Sets the output gain, clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f32) {
        self.volume.set_volume(volume);
    }

    /// Fades the output gain to zero using the configured tick.
    pub fn fade_out(&self, duration: Duration) -> FadeCompletion {
        self.volume
            .fade_out_with_tick(duration, self.config.fade_tick())
    }

    /// `true` once the render loop has ended for any reason.
    pub fn is_finished(&self) -> bool {
        self.pipeline.is_finished().unwrap_or(true)
    }

    /// Waits for the render loop to end. Returns `false` on timeout.
    pub fn wait_finished(&self, timeout: Duration) -> Result<bool> {
        self.pipeline.wait_finished(timeout)
    }

    /// Stops playback, waiting at most the configured shutdown timeout for
    /// the render loop. Safe to call repeatedly.
    pub fn stop(&mut self) -> ShutdownReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        info!("stopping playback");
        if let Err(err) = self.pipeline.stop() {
            warn!(error = %err, "could not signal render loop");
        }

        let report = match self.handle.take() {
            None => {
                // Never started: nothing will ever be produced.
                if let Err(err) = self.pipeline.finish() {
                    warn!(error = %err, "could not mark pipeline finished");
                }
                self.decoder = None;
                ShutdownReport {
                    clean: true,
                    summary: None,
                }
            }
            Some(handle) => {
                let timeout = self.config.shutdown_timeout();
                let exited = self.pipeline.wait_finished(timeout).unwrap_or(false);
                if exited {
                    match handle.join() {
                        Ok(summary) => ShutdownReport {
                            clean: true,
                            summary: Some(summary),
                        },
                        Err(_) => {
                            warn!("render loop panicked");
                            ShutdownReport {
                                clean: false,
                                summary: None,
                            }
                        }
                    }
                } else {
                    warn!(?timeout, "render loop did not exit in time, detaching it");
                    ShutdownReport {
                        clean: false,
                        summary: None,
                    }
                }
            }
        };

        if let Ok(stats) = self.pipeline.stats() {
            info!(
                frames = stats.frames_rendered,
                kib = stats.bytes_written / 1024,
                "playback cleanup complete"
            );
        }
        self.report = Some(report.clone());
        report
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if self.report.is_none() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("started", &self.handle.is_some())
            .field("stopped", &self.report.is_some())
            .finish()
    }
}

/// Pull-side handle given to the audio sink.
///
/// Applies the current output gain to every pulled block. Requests should
/// be whole sample frames so gain stays aligned to 16-bit samples.
#[derive(Debug, Clone)]
pub struct AudioOutput {
    pipeline: Arc<Pipeline>,
    volume: VolumeControl,
}

impl AudioOutput {
    /// Pulls from the pipeline and applies the current gain.
    pub fn pull(&self, out: &mut [u8]) -> Result<PullOutcome> {
        let outcome = self.pipeline.pull(out)?;
        if let PullOutcome::Filled(len) = outcome {
            volume::apply_gain(&mut out[..len], self.volume.volume());
        }
        Ok(outcome)
    }
}

impl io::Read for AudioOutput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pull(buf) {
            Ok(PullOutcome::Filled(len)) => Ok(len),
            Ok(PullOutcome::EndOfStream) => Ok(0),
            Err(err) => Err(io::Error::other(err)),
        }
    }
}

/// Read-only view for periodic diagnostics.
#[derive(Debug, Clone)]
pub struct PlaybackProbe {
    pipeline: Arc<Pipeline>,
    slot: SnapshotSlot,
}

impl PlaybackProbe {
    /// Latest published position.
    pub fn snapshot(&self) -> PositionSnapshot {
        self.slot.latest()
    }

    pub fn stats(&self) -> Result<PipelineStats> {
        self.pipeline.stats()
    }
}
