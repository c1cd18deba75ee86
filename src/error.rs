//! Error types for the sanitizer and the execution engine.

/// Errors the engine can return from `execute`.
///
/// A child process failing is never represented here — see
/// [`crate::result::RunResult`] for that. This enum only covers cases where
/// the engine itself could not attempt the run. Sanitizer rejections are
/// not among them: validation is a step a caller runs explicitly before
/// constructing a descriptor, never something `execute` performs itself.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("command descriptor is invalid: name must not be empty")]
    InvalidDescriptor,

    #[error("failed to launch command: {0}")]
    Launch(String),
}
