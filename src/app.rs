//! Application module: exposes the app model used by the TUI and runtime.
//!
//! The `App` model lives in `app::model` and holds the selection, the latest
//! playback snapshot and a one-line status message.

mod model;

pub use model::*;
