//! Applying sed commands to text.
//!
//! The [`Engine`] trait is the narrow capability the bot needs: apply one
//! command to one input. [`Sed`] implements it by running the `sed`
//! executable; tests swap in an in-process engine.

use std::{io, time::Duration};

use nonempty::NonEmpty;

use crate::domain::SedCommand;

mod sed;
pub use sed::{LocateError, Sed};

/// Something that can apply a single sed command to a piece of text.
pub trait Engine {
    /// Applies `command` to `input` and returns the transformed text.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the command could not be applied.
    fn apply(&self, command: &SedCommand, input: &str) -> Result<String, EngineError>;
}

impl<E: Engine + ?Sized> Engine for &E {
    fn apply(&self, command: &SedCommand, input: &str) -> Result<String, EngineError> {
        (**self).apply(command, input)
    }
}

/// Errors raised while applying a single command.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("failed to start sed: {0}")]
    Spawn(#[source] io::Error),

    /// Talking to the engine process failed.
    #[error("failed to communicate with sed: {0}")]
    Io(#[from] io::Error),

    /// The engine rejected the command or failed while running it.
    #[error("sed exited with {}: {}", exit_code(.code.as_ref()), .stderr.trim())]
    Failed {
        /// The exit code, if the process exited normally.
        code: Option<i32>,
        /// What the engine wrote to its error stream.
        stderr: String,
    },

    /// The engine did not finish in time and was killed.
    #[error("sed did not finish within {0:?}")]
    TimedOut(Duration),

    /// The engine produced output that is not valid UTF-8.
    #[error("sed produced output that is not valid UTF-8")]
    NonUtf8,
}

fn exit_code(code: Option<&i32>) -> String {
    code.map_or_else(|| "no exit code".to_string(), |code| format!("code {code}"))
}

/// A command sequence stopped at a command the engine could not apply.
#[derive(Debug, thiserror::Error)]
#[error("failed to apply '{command}'")]
pub struct ExecError {
    /// The command that failed.
    pub command: SedCommand,

    /// Why it failed.
    #[source]
    pub source: EngineError,
}

/// Applies `commands` to `text` one after another.
///
/// Each command runs on the output of the previous one. The first failure
/// stops the sequence; later commands are never run and no partial result is
/// returned.
///
/// # Errors
///
/// Returns an [`ExecError`] naming the first command the engine failed on.
pub fn apply_all<E>(
    engine: &E,
    commands: &NonEmpty<SedCommand>,
    text: &str,
) -> Result<String, ExecError>
where
    E: Engine + ?Sized,
{
    commands.iter().try_fold(text.to_string(), |running, command| {
        tracing::info!(%command, "applying sed command");
        engine.apply(command, &running).map_err(|source| ExecError {
            command: command.clone(),
            source,
        })
    })
}
