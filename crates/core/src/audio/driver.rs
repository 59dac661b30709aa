use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::{Decoder, FrameOutcome, Pipeline, WriteOutcome};
use crate::position::SnapshotSlot;

/// Why the render loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverExit {
    EndOfStream,
    Stopped,
    DecodeFailed(String),
    /// The pipeline's lock was poisoned by another thread.
    PipelineFailed(String),
}

/// Totals reported by a finished render loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub frames_rendered: u64,
    pub bytes_written: u64,
    pub exit: DriverExit,
}

/// Decode loop feeding the pipeline and publishing positions.
pub struct RenderDriver<D> {
    decoder: D,
    pipeline: Arc<Pipeline>,
    slot: SnapshotSlot,
}

impl<D: Decoder> RenderDriver<D> {
    pub fn new(decoder: D, pipeline: Arc<Pipeline>, slot: SnapshotSlot) -> Self {
        Self {
            decoder,
            pipeline,
            slot,
        }
    }

    /// Runs until end of stream, a decode failure, or a stop request.
    ///
    /// The pipeline is always marked finished on return so the consumer can
    /// report end of stream once it has drained the remaining bytes.
    pub fn run(mut self) -> RenderSummary {
        debug!(
            sample_rate = self.decoder.sample_rate(),
            "render loop started"
        );

        let mut frames_rendered = 0u64;
        let mut bytes_written = 0u64;
        let exit = loop {
            match self.pipeline.is_stopped() {
                Ok(false) => {}
                Ok(true) => break DriverExit::Stopped,
                Err(err) => break DriverExit::PipelineFailed(err.to_string()),
            }

            let frame = match self.decoder.next_frame() {
                Ok(FrameOutcome::Frame(frame)) => frame,
                Ok(FrameOutcome::EndOfStream) => {
                    self.slot.publish(self.decoder.position());
                    break DriverExit::EndOfStream;
                }
                Err(err) => {
                    warn!(error = %err, frames = frames_rendered, "decoder failed, ending playback");
                    break DriverExit::DecodeFailed(err.to_string());
                }
            };

            frames_rendered += 1;
            if let Err(err) = self.pipeline.record_frame() {
                break DriverExit::PipelineFailed(err.to_string());
            }
            self.slot.publish(frame.snapshot);

            if frame.audio.is_empty() {
                trace!(frame = frames_rendered, "empty frame from decoder");
                continue;
            }

            match self.pipeline.write(&frame.audio) {
                Ok(WriteOutcome::Complete) => bytes_written += frame.audio.len() as u64,
                Ok(WriteOutcome::Interrupted { written }) => {
                    bytes_written += written as u64;
                    debug!(frames = frames_rendered, "render loop interrupted during write");
                    break DriverExit::Stopped;
                }
                Err(err) => break DriverExit::PipelineFailed(err.to_string()),
            }
        };

        if let Err(err) = self.pipeline.finish() {
            warn!(error = %err, "could not mark pipeline finished");
        }
        info!(
            frames = frames_rendered,
            kib = bytes_written / 1024,
            exit = ?exit,
            "render loop exited"
        );

        RenderSummary {
            frames_rendered,
            bytes_written,
            exit,
        }
    }
}
