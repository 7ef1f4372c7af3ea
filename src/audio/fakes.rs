//! In-memory backend and surface for exercising the session manager.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PlaybackError;

use super::{AudioBackend, AudioSession, NowPlayingInfo, NowPlayingSurface};

pub(crate) const TRACK_LEN: Duration = Duration::from_secs(200);

#[derive(Default)]
pub(crate) struct FakeAudio {
    pub path: PathBuf,
    pub playing: AtomicBool,
    pub stopped: AtomicBool,
    pub finished: AtomicBool,
    pub reject_seek: AtomicBool,
    pub position_ms: AtomicU64,
    pub volume_bits: AtomicU64,
}

impl FakeAudio {
    pub fn set_position(&self, at: Duration) {
        self.position_ms
            .store(at.as_millis() as u64, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct BackendState {
    live: AtomicUsize,
    opened: Mutex<Vec<Arc<FakeAudio>>>,
    fail_on: Mutex<Option<PathBuf>>,
}

#[derive(Default, Clone)]
pub(crate) struct FakeBackend(Arc<BackendState>);

impl FakeBackend {
    /// Sessions opened and not yet dropped.
    pub fn live(&self) -> usize {
        self.0.live.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Arc<FakeAudio> {
        self.0.opened.lock().unwrap().last().cloned().unwrap()
    }

    pub fn opened(&self, i: usize) -> Arc<FakeAudio> {
        self.0.opened.lock().unwrap()[i].clone()
    }

    pub fn fail_on(&self, path: &str) {
        *self.0.fail_on.lock().unwrap() = Some(PathBuf::from(path));
    }
}

pub(crate) struct FakeSession {
    audio: Arc<FakeAudio>,
    backend: Arc<BackendState>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.backend.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AudioBackend for FakeBackend {
    type Session = FakeSession;

    fn open(&self, source: &Path) -> Result<FakeSession, PlaybackError> {
        if self.0.fail_on.lock().unwrap().as_deref() == Some(source) {
            return Err(PlaybackError::Open {
                path: source.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            });
        }
        let audio = Arc::new(FakeAudio {
            path: source.to_path_buf(),
            ..FakeAudio::default()
        });
        self.0.opened.lock().unwrap().push(audio.clone());
        self.0.live.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            audio,
            backend: self.0.clone(),
        })
    }
}

impl AudioSession for FakeSession {
    fn play(&self) {
        self.audio.playing.store(true, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.audio.playing.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.audio.playing.store(false, Ordering::SeqCst);
        self.audio.stopped.store(true, Ordering::SeqCst);
    }

    fn position(&self) -> Duration {
        Duration::from_millis(self.audio.position_ms.load(Ordering::SeqCst))
    }

    fn duration(&self) -> Option<Duration> {
        Some(TRACK_LEN)
    }

    fn seek(&self, to: Duration) -> Result<(), PlaybackError> {
        if self.audio.reject_seek.load(Ordering::SeqCst) {
            return Err(PlaybackError::Seek("not seekable".into()));
        }
        self.audio.set_position(to);
        Ok(())
    }

    fn set_volume(&self, volume: f32) {
        self.audio
            .volume_bits
            .store(f64::from(volume).to_bits(), Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.audio.finished.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SurfaceCall {
    Publish(NowPlayingInfo),
    Progress(Duration, f64),
    Seeked(Duration, f64),
    Clear,
}

#[derive(Default)]
pub(crate) struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: SurfaceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl NowPlayingSurface for RecordingSurface {
    fn publish(&self, info: &NowPlayingInfo) {
        self.record(SurfaceCall::Publish(info.clone()));
    }

    fn update_progress(&self, elapsed: Duration, rate: f64) {
        self.record(SurfaceCall::Progress(elapsed, rate));
    }

    fn seeked(&self, elapsed: Duration, rate: f64) {
        self.record(SurfaceCall::Seeked(elapsed, rate));
    }

    fn clear(&self) {
        self.record(SurfaceCall::Clear);
    }
}
