use std::path::Path;
use std::time::Duration;

use crate::error::PlaybackError;

/// Opens audio files as playable sessions.
pub trait AudioBackend: Send + Sync + 'static {
    type Session: AudioSession;

    /// Open and decode `source`. The returned session starts paused.
    fn open(&self, source: &Path) -> Result<Self::Session, PlaybackError>;
}

/// One decoded audio resource attached to the output.
///
/// Dropping the session releases the decoder and detaches it from the output.
pub trait AudioSession: Send + 'static {
    fn play(&self);
    fn pause(&self);
    fn stop(&self);
    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn seek(&self, to: Duration) -> Result<(), PlaybackError>;
    fn set_volume(&self, volume: f32);
    /// True once the resource has played to its end.
    fn is_finished(&self) -> bool;
}
