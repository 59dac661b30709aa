//! Core library for the demo-sync player.
//!
//! Tracker audio is rendered on a background thread into a bounded ring
//! buffer, while the playback position it publishes drives a cue timeline
//! and a sequencer that switches and blends visual effects. Each module owns
//! one subsystem; the `demo-sync` binary wires them into a host loop.

pub mod audio;
pub mod config;
pub mod cues;
pub mod diagnostics;
pub mod effect;
pub mod error;
pub mod input;
pub mod position;
pub mod render;
pub mod sequencer;
pub mod timeline;
pub mod volume;

pub use audio::{
    AudioOutput, Decoder, DriverExit, Pipeline, PlaybackProbe, Player, PullOutcome,
    RenderDriver, RenderSummary, ShutdownReport, SyntheticModule, SyntheticSettings,
};
pub use config::{AppConfig, AudioConfig, PlaybackConfig, SequencerConfig};
pub use cues::CueFile;
pub use diagnostics::DiagnosticsTask;
pub use effect::Effect;
pub use error::{DemoError, Result};
pub use input::InputState;
pub use position::{PositionSnapshot, SnapshotSlot};
pub use render::{Palette, Rgb, Surface};
pub use sequencer::{CrossfadeMode, Sequencer, SequencerState};
pub use timeline::{Cue, CuePosition, Timeline, Transition};
pub use volume::{FadeCompletion, VolumeControl};
