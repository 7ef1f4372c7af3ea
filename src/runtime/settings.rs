use crate::config;

/// Load and validate settings, falling back to defaults on any problem.
///
/// Runs before logging is set up, so the reason for a fallback is returned
/// to be logged once it is.
pub fn load_settings() -> (config::Settings, Option<String>) {
    match config::Settings::load() {
        Ok(s) => match s.validate() {
            Ok(()) => (s, None),
            Err(msg) => {
                eprintln!("tapedeck: invalid config, using defaults: {msg}");
                (config::Settings::default(), Some(format!("invalid config: {msg}")))
            }
        },
        Err(e) => {
            // Config is optional; failures should not prevent the app from starting.
            eprintln!("tapedeck: failed to load config, using defaults: {e}");
            (
                config::Settings::default(),
                Some(format!("failed to load config: {e}")),
            )
        }
    }
}
