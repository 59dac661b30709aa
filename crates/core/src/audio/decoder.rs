use std::{
    collections::VecDeque,
    f32::consts::TAU,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};

use crate::{position::PositionSnapshot, DemoError, Result};

/// One decoded frame: the position it describes and its raw PCM bytes.
#[derive(Debug, Clone, Default)]
pub struct DecodedFrame {
    pub snapshot: PositionSnapshot,
    pub audio: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Frame(DecodedFrame),
    EndOfStream,
}

/// Source of audio frames driven by the render loop.
///
/// Frames may carry any number of bytes, including none. An `Err` is treated
/// as the end of the stream.
pub trait Decoder: Send {
    fn sample_rate(&self) -> u32;

    /// Decodes the next frame.
    fn next_frame(&mut self) -> Result<FrameOutcome>;

    /// Position as of the most recent frame, published once more at the end.
    fn position(&self) -> PositionSnapshot;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn next_frame(&mut self) -> Result<FrameOutcome> {
        (**self).next_frame()
    }

    fn position(&self) -> PositionSnapshot {
        (**self).position()
    }
}

/// Shape of the generated song.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    pub sample_rate: u32,
    pub bpm: u32,
    pub ticks_per_row: u32,
    pub rows_per_pattern: u32,
    pub orders: u32,
    pub channels: usize,
    /// Peak amplitude in `[0, 1]`.
    pub amplitude: f32,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bpm: 125,
            ticks_per_row: 6,
            rows_per_pattern: 64,
            orders: 8,
            channels: 4,
            amplitude: 0.25,
        }
    }
}

// Root note per order, cycled.
const ORDER_ROOTS_HZ: [f32; 4] = [220.0, 261.63, 196.0, 246.94];
const ROW_STEPS: [f32; 8] = [1.0, 1.25, 1.5, 2.0, 1.5, 1.25, 1.0, 0.75];

/// Tracker-shaped tone generator standing in for a real module decoder.
///
/// Produces 16-bit signed little-endian interleaved stereo, one tick per
/// frame, with the classic tick length of `2.5 * sample_rate / bpm` frames.
#[derive(Debug, Clone)]
pub struct SyntheticModule {
    settings: SyntheticSettings,
    order: u32,
    row: u32,
    tick: u32,
    phase: f32,
    frames_emitted: u64,
    last: PositionSnapshot,
}

impl SyntheticModule {
    pub fn new(settings: SyntheticSettings) -> Result<Self> {
        if settings.sample_rate == 0 || settings.bpm == 0 {
            return Err(DemoError::config("synthetic module needs a sample rate and tempo"));
        }
        if settings.ticks_per_row == 0 || settings.rows_per_pattern == 0 || settings.orders == 0 {
            return Err(DemoError::config("synthetic module has no rows to play"));
        }
        Ok(Self {
            settings,
            order: 0,
            row: 0,
            tick: 0,
            phase: 0.0,
            frames_emitted: 0,
            last: PositionSnapshot::default(),
        })
    }

    pub fn settings(&self) -> &SyntheticSettings {
        &self.settings
    }

    /// Sample frames in one tick.
    pub fn frames_per_tick(&self) -> usize {
        (self.settings.sample_rate as usize * 5) / (self.settings.bpm as usize * 2)
    }

    pub fn total_ms(&self) -> i64 {
        let ticks = u64::from(self.settings.orders)
            * u64::from(self.settings.rows_per_pattern)
            * u64::from(self.settings.ticks_per_row);
        (ticks * self.frames_per_tick() as u64 * 1_000 / u64::from(self.settings.sample_rate))
            as i64
    }

    fn snapshot(&self) -> PositionSnapshot {
        let s = &self.settings;
        let mut snapshot = PositionSnapshot {
            order: self.order as i32,
            pattern: (self.order % 4) as i32,
            row: self.row as i32,
            num_rows: s.rows_per_pattern as i32,
            tick: self.tick as i32,
            ticks_per_row: s.ticks_per_row as i32,
            tempo: s.bpm as i32,
            elapsed_ms: (self.frames_emitted * 1_000 / u64::from(s.sample_rate)) as i64,
            total_ms: self.total_ms(),
            ..PositionSnapshot::default()
        };

        let decay = 1.0 - self.tick as f32 / s.ticks_per_row as f32;
        let levels: Vec<u8> = (0..s.channels)
            .map(|channel| {
                let every = channel as u32 + 2;
                if (self.row + channel as u32) % every == 0 {
                    (255.0 * decay) as u8
                } else {
                    0
                }
            })
            .collect();
        snapshot.set_channel_levels(&levels);
        snapshot
    }

    fn render_tick(&mut self) -> Vec<u8> {
        let frames = self.frames_per_tick();
        let root = ORDER_ROOTS_HZ[self.order as usize % ORDER_ROOTS_HZ.len()];
        let freq = root * ROW_STEPS[self.row as usize % ROW_STEPS.len()];
        let step = TAU * freq / self.settings.sample_rate as f32;
        let ticks = self.settings.ticks_per_row as f32;
        let mut pcm = Vec::with_capacity(frames * 4);

        for i in 0..frames {
            let within_row = (self.tick as f32 + i as f32 / frames as f32) / ticks;
            let envelope = self.settings.amplitude * (1.0 - 0.8 * within_row);
            let sample = (self.phase.sin() * envelope * f32::from(i16::MAX)) as i16;
            let bytes = sample.to_le_bytes();
            pcm.extend_from_slice(&bytes);
            pcm.extend_from_slice(&bytes);
            self.phase = (self.phase + step) % TAU;
        }

        self.frames_emitted += frames as u64;
        pcm
    }

    fn advance(&mut self) {
        self.tick += 1;
        if self.tick < self.settings.ticks_per_row {
            return;
        }
        self.tick = 0;
        self.row += 1;
        if self.row < self.settings.rows_per_pattern {
            return;
        }
        self.row = 0;
        self.order += 1;
    }
}

impl Decoder for SyntheticModule {
    fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    fn next_frame(&mut self) -> Result<FrameOutcome> {
        if self.order >= self.settings.orders {
            return Ok(FrameOutcome::EndOfStream);
        }
        let snapshot = self.snapshot();
        let audio = self.render_tick();
        self.last = snapshot.clone();
        self.advance();
        Ok(FrameOutcome::Frame(DecodedFrame { snapshot, audio }))
    }

    fn position(&self) -> PositionSnapshot {
        self.last.clone()
    }
}

/// One scripted decoder response.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Frame(DecodedFrame),
    Fail(String),
}

/// Decoder that replays a fixed script, then reports end of stream.
///
/// Counts every `next_frame` call so callers can check how often the render
/// loop consulted it.
#[derive(Debug, Clone)]
pub struct ScriptedDecoder {
    sample_rate: u32,
    steps: VecDeque<ScriptStep>,
    calls: Arc<AtomicUsize>,
    last: PositionSnapshot,
}

impl ScriptedDecoder {
    pub fn new(sample_rate: u32, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            sample_rate,
            steps: steps.into_iter().collect(),
            calls: Arc::new(AtomicUsize::new(0)),
            last: PositionSnapshot::default(),
        }
    }

    /// Script of `count` frames, each `bytes` long, at successive rows of order 0.
    pub fn frames(sample_rate: u32, count: usize, bytes: usize) -> Self {
        let steps = (0..count).map(|i| {
            ScriptStep::Frame(DecodedFrame {
                snapshot: PositionSnapshot::at(0, i as i32),
                audio: vec![(i % 251) as u8 + 1; bytes],
            })
        });
        Self::new(sample_rate, steps)
    }

    /// Shared counter of `next_frame` calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Decoder for ScriptedDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self) -> Result<FrameOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(frame)) => {
                self.last = frame.snapshot.clone();
                Ok(FrameOutcome::Frame(frame))
            }
            Some(ScriptStep::Fail(reason)) => Err(DemoError::Decode(reason)),
            None => Ok(FrameOutcome::EndOfStream),
        }
    }

    fn position(&self) -> PositionSnapshot {
        self.last.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_song() -> SyntheticModule {
        SyntheticModule::new(SyntheticSettings {
            sample_rate: 8_000,
            bpm: 125,
            ticks_per_row: 3,
            rows_per_pattern: 4,
            orders: 2,
            ..SyntheticSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn tick_length_follows_tempo() {
        let song = small_song();
        assert_eq!(song.frames_per_tick(), 160);
    }

    #[test]
    fn walks_ticks_rows_and_orders_then_ends() {
        let mut song = small_song();
        let mut positions = Vec::new();
        while let FrameOutcome::Frame(frame) = song.next_frame().unwrap() {
            assert_eq!(frame.audio.len(), 160 * 4);
            let s = frame.snapshot;
            positions.push((s.order, s.row, s.tick));
        }

        assert_eq!(positions.len(), 2 * 4 * 3);
        assert_eq!(positions[0], (0, 0, 0));
        assert_eq!(positions[3], (0, 1, 0));
        assert_eq!(positions[12], (1, 0, 0));
        assert_eq!(*positions.last().unwrap(), (1, 3, 2));
        assert_eq!(song.position().order, 1);
        assert!(matches!(song.next_frame().unwrap(), FrameOutcome::EndOfStream));
    }

    #[test]
    fn rejects_empty_song() {
        let settings = SyntheticSettings {
            orders: 0,
            ..SyntheticSettings::default()
        };
        assert!(SyntheticModule::new(settings).unwrap_err().is_configuration());
    }

    #[test]
    fn scripted_decoder_counts_calls_and_fails_on_demand() {
        let mut decoder = ScriptedDecoder::new(
            8_000,
            [
                ScriptStep::Frame(DecodedFrame::default()),
                ScriptStep::Fail("corrupt pattern".into()),
            ],
        );
        let calls = decoder.call_counter();
        assert!(matches!(decoder.next_frame().unwrap(), FrameOutcome::Frame(_)));
        assert!(matches!(decoder.next_frame(), Err(DemoError::Decode(_))));
        assert!(matches!(decoder.next_frame().unwrap(), FrameOutcome::EndOfStream));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
