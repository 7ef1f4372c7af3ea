use std::time::Duration;

use super::types::NowPlayingInfo;

/// The OS "now playing" display (MPRIS, lock screen, control center).
///
/// Calls are made while the session manager holds its state lock, so
/// implementations must be quick and must not call back into the manager.
pub trait NowPlayingSurface: Send + Sync {
    /// Replace the whole now-playing entry.
    fn publish(&self, info: &NowPlayingInfo);
    /// Update elapsed time and rate of the current entry. Rate 0 means paused.
    fn update_progress(&self, elapsed: Duration, rate: f64);
    /// The position jumped. Surfaces that signal discontinuities override this.
    fn seeked(&self, elapsed: Duration, rate: f64) {
        self.update_progress(elapsed, rate);
    }
    /// Remove the now-playing entry entirely.
    fn clear(&self);
}
