//! Periodic playback report written to the log.

use std::{
    thread::{self, JoinHandle},
    time::Duration,
};

use flume::{RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::{audio::PlaybackProbe, DemoError, Result};

/// Background thread logging position and buffer fill at a fixed interval.
///
/// Exits on its own once the pipeline reports end of stream, or when
/// cancelled. Dropping the task also stops it, without waiting.
#[derive(Debug)]
pub struct DiagnosticsTask {
    cancel: Sender<()>,
    handle: JoinHandle<usize>,
}

impl DiagnosticsTask {
    pub fn spawn(interval: Duration, probe: PlaybackProbe) -> Result<Self> {
        if interval.is_zero() {
            return Err(DemoError::config("diagnostics interval must be positive"));
        }
        let (cancel, rx) = flume::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("diagnostics".into())
            .spawn(move || {
                let mut reports = 0;
                loop {
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let sync = probe.snapshot();
                    let stats = match probe.stats() {
                        Ok(stats) => stats,
                        Err(err) => {
                            warn!(error = %err, "diagnostics lost access to the pipeline");
                            break;
                        }
                    };
                    reports += 1;
                    info!(
                        order = sync.order,
                        row = sync.row,
                        tempo = sync.tempo,
                        elapsed_ms = sync.elapsed_ms,
                        total_ms = sync.total_ms,
                        fill_percent = stats.fill_percent(),
                        silence_bytes = stats.silence_bytes,
                        "playback status"
                    );
                    if stats.finished {
                        break;
                    }
                }
                debug!(reports, "diagnostics stopped");
                reports
            })?;

        Ok(Self { cancel, handle })
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the task and returns how many reports it logged.
    pub fn cancel(self) -> Result<usize> {
        let _ = self.cancel.send(());
        self.handle
            .join()
            .map_err(|_| DemoError::msg("diagnostics thread panicked"))
    }
}
