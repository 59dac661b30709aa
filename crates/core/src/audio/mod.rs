//! Audio side of the engine: decoder boundary, ring-buffer pipeline, render
//! driver and the player façade tying them to the sync state.

mod decoder;
mod driver;
mod pipeline;
mod player;
mod ring;

pub use decoder::{
    DecodedFrame, Decoder, FrameOutcome, ScriptStep, ScriptedDecoder, SyntheticModule,
    SyntheticSettings,
};
pub use driver::{DriverExit, RenderDriver, RenderSummary};
pub use pipeline::{Pipeline, PipelineStats, PullOutcome, WriteOutcome};
pub use player::{AudioOutput, PlaybackProbe, Player, ShutdownReport};
pub use ring::RingBuffer;
