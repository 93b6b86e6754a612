//! Room recorder.
//!
//! `start_recording` creates the WAV file up front with a placeholder
//! header so the file exists as soon as the call returns. Audio frames are
//! handed to a single consumer task over an unbounded channel; the consumer
//! owns the writer and is the only place file I/O happens after start. Each
//! write runs on the blocking pool.
//! `stop_recording` asks the consumer to drain, then rewrites the header with
//! the final data length.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use chrono::Utc;
use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vr_voice::RoomId;

use crate::errors::{RecorderError, RecorderResult};

type Writer = WavWriter<BufWriter<File>>;

#[derive(Clone, Debug)]
pub struct RecorderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// How long `stop_recording` waits for queued frames to be written.
    pub drain_timeout: Duration,
    /// How long `shutdown` waits for the consumer task to exit.
    pub join_timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            drain_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(2),
        }
    }
}

/// What ended up on disk for one recording.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub frames_written: u64,
    pub samples_written: u64,
    pub write_errors: u64,
    pub wall_time: Duration,
    /// Seconds of audio in the file, derived from the sample count.
    pub audio_secs: f64,
}

enum Command {
    Open { writer: Writer, path: PathBuf },
    Frame(Vec<f32>),
    Finalize(oneshot::Sender<Option<RecordingSummary>>),
}

struct ActiveFile {
    writer: Writer,
    path: PathBuf,
    frames: u64,
    samples: u64,
    errors: u64,
    opened_at: Instant,
}

impl ActiveFile {
    fn write_frame(&mut self, samples: &[f32]) {
        for &s in samples {
            if let Err(e) = self.writer.write_sample(to_wav_sample(s)) {
                self.errors += 1;
                error!(path = %self.path.display(), error = %e, "recorder: write failed");
                return;
            }
            self.samples += 1;
        }
        self.frames += 1;
    }

    fn finalize(self, sample_rate: u32, channels: u16) -> RecordingSummary {
        let ActiveFile {
            writer,
            path,
            frames,
            samples,
            mut errors,
            opened_at,
        } = self;

        if let Err(e) = writer.finalize() {
            errors += 1;
            error!(path = %path.display(), error = %e, "recorder: header finalize failed");
        }

        let per_sec = f64::from(sample_rate) * f64::from(channels.max(1));
        let summary = RecordingSummary {
            path,
            frames_written: frames,
            samples_written: samples,
            write_errors: errors,
            wall_time: opened_at.elapsed(),
            audio_secs: if per_sec > 0.0 {
                samples as f64 / per_sec
            } else {
                0.0
            },
        };
        info!(
            path = %summary.path.display(),
            frames = summary.frames_written,
            audio_secs = summary.audio_secs,
            "recorder: file closed"
        );
        summary
    }
}

fn to_wav_sample(s: f32) -> i16 {
    let s = if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 };
    (s * 32767.0).round() as i16
}

/// Per-room WAV recorder with a background consumer.
pub struct RoomRecorder {
    room_id: RoomId,
    cfg: RecorderConfig,
    recording: AtomicBool,
    /// Path of the open file; also serializes start/stop transitions.
    current: Mutex<Option<PathBuf>>,
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<Option<RecordingSummary>>>>,
}

impl RoomRecorder {
    /// Spawns the consumer on the current tokio runtime.
    pub fn new(room_id: RoomId, cfg: RecorderConfig) -> RecorderResult<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| RecorderError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = handle.spawn(run_consumer(
            room_id.clone(),
            cfg.sample_rate,
            cfg.channels,
            rx,
            cancel.clone(),
        ));

        Ok(Self {
            room_id,
            cfg,
            recording: AtomicBool::new(false),
            current: Mutex::new(None),
            tx,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.cfg
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.current.lock().clone()
    }

    /// Opens `{room_id}_{timestamp}.wav` under `dir`. A second call while a
    /// recording is active returns the existing path without touching disk.
    pub fn start_recording(&self, dir: &Path) -> RecorderResult<PathBuf> {
        let mut current = self.current.lock();
        if let Some(path) = current.as_ref() {
            debug!(room_id = %self.room_id, "recorder: already recording");
            return Ok(path.clone());
        }
        if self.cancel.is_cancelled() || self.tx.is_closed() {
            return Err(RecorderError::ConsumerStopped);
        }

        std::fs::create_dir_all(dir)?;
        let path = self.next_path(dir);

        let spec = WavSpec {
            channels: self.cfg.channels,
            sample_rate: self.cfg.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec)?;
        // Header with a zero data length, rewritten on finalize.
        writer.flush()?;

        if self
            .tx
            .send(Command::Open {
                writer,
                path: path.clone(),
            })
            .is_err()
        {
            let _ = std::fs::remove_file(&path);
            return Err(RecorderError::ConsumerStopped);
        }

        *current = Some(path.clone());
        self.recording.store(true, Ordering::Release);
        info!(room_id = %self.room_id, path = %path.display(), "recording started");
        Ok(path)
    }

    fn next_path(&self, dir: &Path) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let base = format!("{}_{}", self.room_id, stamp);
        let mut path = dir.join(format!("{base}.wav"));
        let mut n = 1u32;
        while path.exists() {
            path = dir.join(format!("{base}_{n}.wav"));
            n += 1;
        }
        path
    }

    /// Queues a frame for writing. Returns `false` when nothing is recording,
    /// the consumer has gone away, or the frame would split a sample across
    /// channels.
    pub fn add_audio_data(&self, samples: &[f32]) -> bool {
        if !self.is_recording() || samples.is_empty() {
            return false;
        }
        if samples.len() % usize::from(self.cfg.channels.max(1)) != 0 {
            warn!(
                room_id = %self.room_id,
                len = samples.len(),
                channels = self.cfg.channels,
                "recorder: misaligned frame rejected"
            );
            return false;
        }
        self.tx.send(Command::Frame(samples.to_vec())).is_ok()
    }

    /// Drains queued frames and finalizes the file. No-op when idle.
    pub async fn stop_recording(&self) -> Option<RecordingSummary> {
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut current = self.current.lock();
            current.as_ref()?;
            self.recording.store(false, Ordering::Release);
            *current = None;
            if self.tx.send(Command::Finalize(reply_tx)).is_err() {
                warn!(room_id = %self.room_id, "recorder: consumer gone before stop");
                return None;
            }
        }

        match tokio::time::timeout(self.cfg.drain_timeout, reply_rx).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(_)) => {
                warn!(room_id = %self.room_id, "recorder: consumer dropped finalize reply");
                None
            }
            Err(_) => {
                warn!(
                    room_id = %self.room_id,
                    timeout_ms = self.cfg.drain_timeout.as_millis() as u64,
                    "recorder: drain timed out, forcing close"
                );
                self.cancel.cancel();
                self.join_consumer().await
            }
        }
    }

    /// Stops any active recording and terminates the consumer.
    pub async fn shutdown(&self) -> Option<RecordingSummary> {
        let summary = self.stop_recording().await;
        self.cancel.cancel();
        let forced = self.join_consumer().await;
        summary.or(forced)
    }

    async fn join_consumer(&self) -> Option<RecordingSummary> {
        let task = self.task.lock().take()?;
        match tokio::time::timeout(self.cfg.join_timeout, task).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                error!(room_id = %self.room_id, error = %e, "recorder: consumer task failed");
                None
            }
            Err(_) => {
                warn!(room_id = %self.room_id, "recorder: consumer did not exit in time");
                None
            }
        }
    }
}

impl Drop for RoomRecorder {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Returns the summary of a file that was still open when cancelled.
/// Disk writes run on the blocking pool; the task itself only routes commands.
async fn run_consumer(
    room_id: RoomId,
    sample_rate: u32,
    channels: u16,
    mut rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
) -> Option<RecordingSummary> {
    let mut active: Option<ActiveFile> = None;

    loop {
        let cmd = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            cmd = rx.recv() => match cmd {
                Some(cmd) => cmd,
                None => break,
            },
        };

        match cmd {
            Command::Open { writer, path } => {
                if let Some(prev) = active.take() {
                    warn!(room_id = %room_id, "recorder: open while a file was active");
                    off_runtime(&room_id, move || prev.finalize(sample_rate, channels)).await;
                }
                active = Some(ActiveFile {
                    writer,
                    path,
                    frames: 0,
                    samples: 0,
                    errors: 0,
                    opened_at: Instant::now(),
                });
            }
            Command::Frame(samples) => match active.take() {
                Some(mut file) => {
                    active = off_runtime(&room_id, move || {
                        file.write_frame(&samples);
                        file
                    })
                    .await;
                }
                None => debug!(room_id = %room_id, "recorder: frame with no open file"),
            },
            Command::Finalize(reply) => {
                let summary = match active.take() {
                    Some(f) => off_runtime(&room_id, move || f.finalize(sample_rate, channels)).await,
                    None => None,
                };
                let _ = reply.send(summary);
            }
        }
    }

    debug!(room_id = %room_id, "recorder: consumer exiting");
    match active {
        Some(f) => off_runtime(&room_id, move || f.finalize(sample_rate, channels)).await,
        None => None,
    }
}

/// Runs file I/O on the blocking pool. `None` if the closure panicked; the
/// open file goes with it.
async fn off_runtime<T, F>(room_id: &RoomId, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(v) => Some(v),
        Err(e) => {
            error!(room_id = %room_id, error = %e, "recorder: blocking write failed");
            None
        }
    }
}
