//! Playback position published by the render driver once per frame.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Maximum number of tracker channels exposed in a snapshot.
pub const MAX_CHANNELS: usize = 64;

/// Playback state for one rendered frame, suitable for syncing visuals.
///
/// Beat progress is derived from `tick` and `ticks_per_row` on every read and
/// is never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub order: i32,
    pub pattern: i32,
    pub row: i32,
    pub num_rows: i32,
    /// Frame within the current row.
    pub tick: i32,
    pub ticks_per_row: i32,
    pub tempo: i32,
    pub elapsed_ms: i64,
    pub total_ms: i64,
    pub loop_count: i32,
    #[serde(with = "channel_levels")]
    pub channel_levels: [u8; MAX_CHANNELS],
    pub active_channels: usize,
}

impl Default for PositionSnapshot {
    fn default() -> Self {
        Self {
            order: 0,
            pattern: 0,
            row: 0,
            num_rows: 0,
            tick: 0,
            ticks_per_row: 0,
            tempo: 0,
            elapsed_ms: 0,
            total_ms: 0,
            loop_count: 0,
            channel_levels: [0; MAX_CHANNELS],
            active_channels: 0,
        }
    }
}

impl PositionSnapshot {
    /// Convenience constructor for a bare (order, row) position.
    pub fn at(order: i32, row: i32) -> Self {
        Self {
            order,
            row,
            ..Self::default()
        }
    }

    /// Progress through the current row in `[0, 1)`.
    pub fn beat_progress(&self) -> f32 {
        if self.ticks_per_row <= 0 {
            return 0.0;
        }
        (self.tick as f32 / self.ticks_per_row as f32).clamp(0.0, 1.0)
    }

    /// Peaks at 1.0 at the start of each row and decays towards the next.
    pub fn beat_pulse(&self) -> f32 {
        if self.ticks_per_row <= 0 {
            return 0.0;
        }
        1.0 - self.beat_progress()
    }

    /// 1.0 on the first tick of a row, 0.0 otherwise.
    pub fn row_pulse(&self) -> f32 {
        if self.tick == 0 {
            1.0
        } else {
            0.0
        }
    }

    /// Loudest active channel, normalised to `[0, 1]`.
    pub fn max_channel_level(&self) -> f32 {
        let active = self.active_channels.min(MAX_CHANNELS);
        let max = self.channel_levels[..active]
            .iter()
            .copied()
            .max()
            .unwrap_or(0);
        f32::from(max) / 255.0
    }

    /// Stores channel levels, truncating anything beyond [`MAX_CHANNELS`].
    pub fn set_channel_levels(&mut self, levels: &[u8]) {
        let count = levels.len().min(MAX_CHANNELS);
        self.channel_levels = [0; MAX_CHANNELS];
        self.channel_levels[..count].copy_from_slice(&levels[..count]);
        self.active_channels = count;
    }
}

mod channel_levels {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::MAX_CHANNELS;

    pub fn serialize<S: Serializer>(levels: &[u8; MAX_CHANNELS], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(levels.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; MAX_CHANNELS], D::Error> {
        let raw = Vec::<u8>::deserialize(d)?;
        if raw.len() > MAX_CHANNELS {
            return Err(D::Error::custom("too many channel levels"));
        }
        let mut levels = [0; MAX_CHANNELS];
        levels[..raw.len()].copy_from_slice(&raw);
        Ok(levels)
    }
}

/// Single-writer, multi-reader slot holding the latest snapshot.
///
/// A publish replaces the whole value under the write guard, so readers never
/// observe a half-updated snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSlot {
    shared: Arc<RwLock<PositionSnapshot>>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: PositionSnapshot) {
        // A poisoned slot still holds a complete snapshot; keep serving it.
        let mut slot = self
            .shared
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = snapshot;
    }

    pub fn latest(&self) -> PositionSnapshot {
        self.shared
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
