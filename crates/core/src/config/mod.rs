use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{sequencer::CrossfadeMode, DemoError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
    pub sequencer: SequencerConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Rejects values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(DemoError::config("sample_rate must be positive"));
        }
        if self.audio.channels == 0 || self.audio.bytes_per_sample == 0 {
            return Err(DemoError::config(
                "channels and bytes_per_sample must be positive",
            ));
        }
        if self.audio.buffer_seconds == 0 {
            return Err(DemoError::config("buffer_seconds must be positive"));
        }
        if self.playback.fade_tick_ms == 0 {
            return Err(DemoError::config("fade_tick_ms must be positive"));
        }
        Ok(())
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
    /// Seconds of audio the ring buffer holds to absorb decode jitter.
    pub buffer_seconds: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            bytes_per_sample: 2,
            buffer_seconds: 4,
        }
    }
}

impl AudioConfig {
    /// Bytes in one interleaved sample frame.
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bytes_per_sample)
    }

    /// Bytes consumed by one second of playback.
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.frame_bytes()
    }

    /// Ring buffer capacity: a whole number of seconds, aligned to a frame.
    pub fn ring_capacity(&self) -> usize {
        let raw = self.bytes_per_second() * self.buffer_seconds as usize;
        let frame = self.frame_bytes().max(1);
        raw.div_ceil(frame) * frame
    }
}

/// Timing knobs for the player lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How long `stop` waits for the render driver before giving up.
    pub shutdown_timeout_ms: u64,
    /// Tick interval of the volume fade (16 ms is roughly 60 Hz).
    pub fade_tick_ms: u64,
    /// Length of the fade performed by the host before stopping.
    pub shutdown_fade_secs: f32,
    pub diagnostics_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: 2_000,
            fade_tick_ms: 16,
            shutdown_fade_secs: 5.0,
            diagnostics_interval_ms: 2_000,
        }
    }
}

impl PlaybackConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn fade_tick(&self) -> Duration {
        Duration::from_millis(self.fade_tick_ms)
    }

    pub fn shutdown_fade(&self) -> Duration {
        Duration::from_secs_f32(self.shutdown_fade_secs.max(0.0))
    }

    pub fn diagnostics_interval(&self) -> Duration {
        Duration::from_millis(self.diagnostics_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub crossfade: CrossfadeMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_capacity_covers_configured_seconds() {
        let audio = AudioConfig::default();
        assert_eq!(audio.frame_bytes(), 4);
        assert_eq!(audio.ring_capacity(), 44_100 * 4 * 4);
        assert_eq!(audio.ring_capacity() % audio.frame_bytes(), 0);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "audio": { "sample_rate": 22050 } }"#).unwrap();
        assert_eq!(config.audio.sample_rate, 22_050);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.playback.shutdown_timeout(), Duration::from_secs(2));
        assert_eq!(config.sequencer.crossfade, CrossfadeMode::Threshold);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let mut config = AppConfig::default();
        config.audio.sample_rate = 0;
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn parses_dissolve_mode() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "sequencer": { "crossfade": "dissolve" } }"#).unwrap();
        assert_eq!(config.sequencer.crossfade, CrossfadeMode::Dissolve);
    }
}
