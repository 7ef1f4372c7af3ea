//! Audio playback: the session manager and the backend it drives.
//!
//! `SessionManager` owns at most one playing session. The `AudioBackend`
//! trait is the seam to the decoder/output (`rodio` in production), and
//! `NowPlayingSurface` the seam to the OS media display.

mod backend;
mod session;
mod sink;
mod surface;
mod ticker;
mod types;

pub use backend::{AudioBackend, AudioSession};
pub use session::SessionManager;
pub use sink::RodioBackend;
pub use surface::NowPlayingSurface;
pub use types::*;

#[cfg(test)]
pub(crate) mod fakes;
