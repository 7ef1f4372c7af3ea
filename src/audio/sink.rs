//! `rodio` implementation of the audio backend.
//!
//! The output stream lives on its own thread for the life of the backend;
//! every session is a `Sink` connected to that stream's mixer.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use lofty::prelude::AudioFile;
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStreamBuilder, Sink, Source};
use tracing::{debug, warn};

use crate::error::PlaybackError;

use super::backend::{AudioBackend, AudioSession};

pub struct RodioBackend {
    mixer: Mixer,
    // Dropping this releases the output thread.
    _shutdown: Sender<()>,
}

impl RodioBackend {
    /// Open the default output device.
    pub fn open_default() -> Result<Self, PlaybackError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<Mixer, String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("tapedeck-output".to_string())
            .spawn(move || {
                let mut stream = match OutputStreamBuilder::open_default_stream() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                // rodio logs to stderr when OutputStream is dropped; noisy under a TUI.
                stream.log_on_drop(false);
                let _ = ready_tx.send(Ok(stream.mixer().clone()));

                // Keep the stream alive until the backend goes away.
                let _ = shutdown_rx.recv();
                debug!("audio output closed");
            })
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        let mixer = ready_rx
            .recv()
            .map_err(|_| PlaybackError::Output("output thread exited".to_string()))?
            .map_err(PlaybackError::Output)?;

        Ok(Self {
            mixer,
            _shutdown: shutdown_tx,
        })
    }
}

impl AudioBackend for RodioBackend {
    type Session = RodioSession;

    fn open(&self, source: &Path) -> Result<RodioSession, PlaybackError> {
        let file = File::open(source).map_err(|e| PlaybackError::Open {
            path: source.to_path_buf(),
            source: e,
        })?;

        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let duration = decoder
            .total_duration()
            .or_else(|| probe_duration(source));

        let sink = Sink::connect_new(&self.mixer);
        sink.pause();
        sink.append(decoder);

        Ok(RodioSession { sink, duration })
    }
}

/// Header-derived duration for formats whose decoder cannot tell (e.g. VBR mp3).
fn probe_duration(path: &Path) -> Option<Duration> {
    lofty::read_from_path(path)
        .ok()
        .map(|tagged| tagged.properties().duration())
        .filter(|d| !d.is_zero())
}

pub struct RodioSession {
    sink: Sink,
    duration: Option<Duration>,
}

impl AudioSession for RodioSession {
    fn play(&self) {
        self.sink.play();
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn stop(&self) {
        self.sink.stop();
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn seek(&self, to: Duration) -> Result<(), PlaybackError> {
        self.sink.try_seek(to).map_err(|e| {
            warn!(error = %e, "seek rejected by decoder");
            PlaybackError::Seek(e.to_string())
        })
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}
