//! Headless host loop: audio pull thread, 60 Hz visual update, key commands
//! from stdin and the shutdown fade.

use std::{
    io::BufRead,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use demo_sync_core::{
    audio::AudioOutput, AppConfig, CueFile, DemoError, DiagnosticsTask, InputState, Player,
    PullOutcome, Result, Sequencer, Surface, SyntheticModule, SyntheticSettings, Timeline,
};
use flume::Receiver;
use tracing::{debug, info, warn};

use crate::effects;

const FRAME: Duration = Duration::from_micros(16_667);
const PULL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub cues: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub seconds: Option<f32>,
    pub bpm: u32,
    pub orders: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitReason {
    Quit,
    TimeLimit,
    EndOfStream,
}

pub fn play(options: &PlayOptions) -> Result<()> {
    let config = match &options.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let module = SyntheticModule::new(SyntheticSettings {
        sample_rate: config.audio.sample_rate,
        bpm: options.bpm,
        orders: options.orders,
        ..SyntheticSettings::default()
    })?;
    info!(
        bpm = options.bpm,
        orders = options.orders,
        length_ms = module.total_ms(),
        "synthetic module ready"
    );

    let timeline = match &options.cues {
        Some(path) => CueFile::load(path)?.resolve(&effects::BUILTIN)?,
        None => Timeline::default_for(effects::BUILTIN.len()),
    };

    let mut surface = Surface::vga();
    let mut sequencer = Sequencer::new(effects::builtin(), timeline, &mut surface)?
        .with_crossfade(config.sequencer.crossfade);

    let mut player = Player::new(module, &config)?;
    let consumer = AudioConsumer::spawn(player.output(), config.audio.bytes_per_second())?;
    player.start()?;
    let diagnostics = DiagnosticsTask::spawn(config.playback.diagnostics_interval(), player.probe())?;
    let keys = spawn_key_reader()?;

    let mut input = InputState::new();
    let mut overlay = false;
    let mut frames = 0u64;
    let started = Instant::now();
    let mut last = started;

    let reason = loop {
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        input.advance(keys.try_iter());
        if input.just_pressed('q') {
            break ExitReason::Quit;
        }
        if input.just_pressed('d') {
            overlay = !overlay;
            info!(overlay, "debug overlay toggled");
        }
        if options
            .seconds
            .is_some_and(|limit| started.elapsed().as_secs_f32() >= limit)
        {
            break ExitReason::TimeLimit;
        }
        if consumer.is_done() {
            break ExitReason::EndOfStream;
        }

        let sync = player.sync_state();
        let active = sequencer.active_effect().to_string();
        sequencer.update(dt, &sync, &mut surface);
        if sequencer.active_effect() != active {
            info!(order = sync.order, row = sync.row, effect = sequencer.active_effect(), "effect changed");
        }
        sequencer.draw(&mut surface);
        if overlay {
            draw_overlay(&mut surface, &sync);
        }
        frames += 1;

        pace(now);
    };
    info!(?reason, frames, "leaving main loop");

    fade_out(&player, &mut sequencer, &mut surface, &config);

    let report = player.stop();
    let received = consumer.stop()?;
    let reports = diagnostics.cancel()?;
    debug!(reports, "diagnostics finished");

    let summary = report.into_result()?;
    info!(
        frames,
        audio_bytes = received,
        rendered = summary.as_ref().map(|s| s.frames_rendered),
        "playback finished"
    );
    Ok(())
}

pub fn check_cues(path: &PathBuf) -> Result<()> {
    let file = CueFile::load(path)?;
    let timeline = file.resolve(&effects::BUILTIN)?;
    for cue in timeline.cues() {
        info!(
            order = cue.position.order,
            row = cue.position.row,
            effect = effects::BUILTIN[cue.effect],
            transition = ?cue.transition,
            fade_seconds = cue.fade_seconds,
            "cue"
        );
    }
    info!(cues = timeline.len(), path = %path.display(), "cue file is valid");
    Ok(())
}

/// Ramps volume to zero while fading the palette to black, keeping the
/// visuals running until the volume fade reports completion.
fn fade_out(player: &Player, sequencer: &mut Sequencer, surface: &mut Surface, config: &AppConfig) {
    let duration = config.playback.shutdown_fade();
    info!(seconds = duration.as_secs_f32(), "fading out");

    let base = surface.palette().clone();
    let mut completion = player.fade_out(duration);
    let started = Instant::now();
    let mut last = started;

    while !completion.is_complete() {
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        let progress = if duration.is_zero() {
            1.0
        } else {
            started.elapsed().as_secs_f32() / duration.as_secs_f32()
        };
        sequencer.update(dt, &player.sync_state(), surface);
        surface.set_palette(base.faded(1.0 - progress));
        sequencer.draw(surface);

        pace(now);
    }
    surface.set_palette(base.faded(0.0));
}

fn pace(frame_start: Instant) {
    if let Some(remaining) = FRAME.checked_sub(frame_start.elapsed()) {
        thread::sleep(remaining);
    }
}

/// Row marker across the top and a beat bar below it.
fn draw_overlay(surface: &mut Surface, sync: &demo_sync_core::PositionSnapshot) {
    let width = surface.width();
    let rows = sync.num_rows.max(1) as usize;
    let row = sync.row.clamp(0, rows as i32 - 1) as usize;
    surface.fill_rect(0, 0, width, 6, 0);
    surface.fill_rect(row * width / rows, 0, (width / rows).max(1), 3, 255);
    let beat = (sync.beat_progress() * width as f32) as usize;
    surface.fill_rect(0, 4, beat, 2, 255);
}

/// Forwards key presses typed on stdin (one line per batch).
fn spawn_key_reader() -> Result<Receiver<char>> {
    let (tx, rx) = flume::unbounded();
    thread::Builder::new().name("keys".into()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            for key in line.trim().chars() {
                if tx.send(key.to_ascii_lowercase()).is_err() {
                    return;
                }
            }
        }
        debug!("stdin closed");
    })?;
    Ok(rx)
}

/// Stand-in for a sound card callback: pulls a fixed slice of audio every
/// few milliseconds, at the rate the device would consume it.
struct AudioConsumer {
    running: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    handle: JoinHandle<Result<u64>>,
}

impl AudioConsumer {
    fn spawn(output: AudioOutput, bytes_per_second: usize) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let done = Arc::new(AtomicBool::new(false));
        let chunk = (bytes_per_second / 100).max(4) & !3;

        let handle = {
            let running = Arc::clone(&running);
            let done = Arc::clone(&done);
            thread::Builder::new()
                .name("audio-consumer".into())
                .spawn(move || {
                    let mut buf = vec![0u8; chunk];
                    let mut received = 0u64;
                    let result = loop {
                        if !running.load(Ordering::Acquire) {
                            break Ok(received);
                        }
                        match output.pull(&mut buf) {
                            Ok(PullOutcome::Filled(n)) => received += n as u64,
                            Ok(PullOutcome::EndOfStream) => {
                                debug!(received, "audio consumer reached end of stream");
                                break Ok(received);
                            }
                            Err(err) => {
                                warn!(error = %err, "audio consumer failed");
                                break Err(err);
                            }
                        }
                        thread::sleep(PULL_INTERVAL);
                    };
                    done.store(true, Ordering::Release);
                    result
                })?
        };

        Ok(Self {
            running,
            done,
            handle,
        })
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn stop(self) -> Result<u64> {
        self.running.store(false, Ordering::Release);
        self.handle
            .join()
            .map_err(|_| DemoError::msg("audio consumer panicked"))?
    }
}
