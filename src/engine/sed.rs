use std::{
    env,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{Engine, EngineError};
use crate::domain::SedCommand;

/// How often a running sed process is checked for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The `sed` executable, run once per command as `sed -re <command>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sed {
    path: PathBuf,
    timeout: Duration,
}

impl Sed {
    /// How long a single command may run before it is killed, unless
    /// configured otherwise.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Uses the executable at `path` without checking that it exists.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Finds `sed` on the `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::NotOnPath`] if no executable called `sed` is
    /// found.
    pub fn locate() -> Result<Self, LocateError> {
        let name = format!("sed{}", env::consts::EXE_SUFFIX);
        let paths = env::var_os("PATH").ok_or(LocateError::NotOnPath)?;
        env::split_paths(&paths)
            .map(|dir| dir.join(&name))
            .find(|candidate| is_executable(candidate))
            .map(Self::new)
            .ok_or(LocateError::NotOnPath)
    }

    /// Uses the executable at `path`, checking that it exists.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::Missing`] if `path` is not an executable file.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self, LocateError> {
        let path = path.into();
        if is_executable(&path) {
            Ok(Self::new(path))
        } else {
            Err(LocateError::Missing(path))
        }
    }

    /// Sets how long a single command may run before it is killed.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The path of the executable.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How long a single command may run.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Engine for Sed {
    fn apply(&self, command: &SedCommand, input: &str) -> Result<String, EngineError> {
        tracing::debug!(sed = %self.path.display(), %command, "spawning sed");

        let mut child = Command::new(&self.path)
            .arg("-re")
            .arg(command.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::Spawn)?;

        // stdin is fed from its own thread and both outputs are drained
        // concurrently, otherwise a large input can fill a pipe and deadlock.
        let writer = {
            let stdin = child.stdin.take();
            let input = input.to_string();
            thread::spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(input.as_bytes()),
                None => Ok(()),
            })
        };
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = wait_until(&mut child, Instant::now() + self.timeout)? else {
            // The helper threads are left to finish on their own once the
            // pipes close.
            child.kill()?;
            child.wait()?;
            return Err(EngineError::TimedOut(self.timeout));
        };

        match join(writer)? {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e.into()),
            _ => {}
        }
        let stdout = join(stdout)??;
        let stderr = join(stderr)??;

        if !status.success() {
            return Err(EngineError::Failed {
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            });
        }

        String::from_utf8(stdout).map_err(|_| EngineError::NonUtf8)
    }
}

/// Errors raised while finding the sed executable.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LocateError {
    /// There is no `sed` on the `PATH`.
    #[error("no 'sed' executable found on PATH")]
    NotOnPath,

    /// The configured path is not an executable file.
    #[error("sed executable '{}' does not exist", .0.display())]
    Missing(PathBuf),
}

fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn join<T>(handle: JoinHandle<T>) -> io::Result<T> {
    handle
        .join()
        .map_err(|_| io::Error::other("sed pipe thread panicked"))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(s: &str) -> SedCommand {
        SedCommand::try_from(s).unwrap()
    }

    /// The system sed, or `None` when the test host has none.
    fn system_sed() -> Option<Sed> {
        Sed::locate().ok()
    }

    #[test]
    fn substitutes_with_system_sed() {
        let Some(sed) = system_sed() else { return };
        let output = sed.apply(&command("s/foo/bar/"), "foo baz\n").unwrap();
        assert_eq!(output, "bar baz\n");
    }

    #[test]
    fn extended_regex_is_enabled() {
        let Some(sed) = system_sed() else { return };
        let output = sed.apply(&command("s/(a+)b/[\\1]/"), "aaab\n").unwrap();
        assert_eq!(output, "[aaa]\n");
    }

    #[test]
    fn malformed_command_reports_stderr() {
        let Some(sed) = system_sed() else { return };
        let error = sed.apply(&command("s/unterminated"), "text\n").unwrap_err();
        match error {
            EngineError::Failed { code, stderr } => {
                assert_ne!(code, Some(0));
                assert!(!stderr.trim().is_empty());
            }
            other => panic!("expected a sed failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_executable_fails_to_spawn() {
        let sed = Sed::new("/definitely/not/a/real/sed");
        let error = sed.apply(&command("s/a/b/"), "a").unwrap_err();
        assert!(matches!(error, EngineError::Spawn(_)));
    }

    #[test]
    fn at_rejects_missing_path() {
        let error = Sed::at("/definitely/not/a/real/sed").unwrap_err();
        assert_eq!(
            error,
            LocateError::Missing(PathBuf::from("/definitely/not/a/real/sed"))
        );
    }

    #[test]
    fn timeout_defaults_until_overridden() {
        let sed = Sed::new("sed");
        assert_eq!(sed.timeout(), Sed::DEFAULT_TIMEOUT);

        let sed = sed.with_timeout(Duration::from_secs(1));
        assert_eq!(sed.timeout(), Duration::from_secs(1));
    }

    #[cfg(unix)]
    mod scripted {
        use std::{fs, os::unix::fs::PermissionsExt};

        use tempfile::TempDir;

        use super::*;

        /// Writes an executable shell script standing in for sed.
        fn script(body: &str) -> (TempDir, Sed) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("fake-sed");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            let sed = Sed::at(&path).unwrap();
            (dir, sed)
        }

        #[test]
        fn passes_pattern_as_expression_argument() {
            let (_dir, sed) = script("printf '%s|%s\\n' \"$1\" \"$2\"");
            let output = sed.apply(&command("s/x/y/"), "").unwrap();
            assert_eq!(output, "-re|s/x/y/\n");
        }

        #[test]
        fn nonzero_exit_carries_code_and_stderr() {
            let (_dir, sed) = script("echo \"no good: $2\" >&2\nexit 2");
            let error = sed.apply(&command("s/x/y/"), "input").unwrap_err();
            match error {
                EngineError::Failed { code, stderr } => {
                    assert_eq!(code, Some(2));
                    assert_eq!(stderr, "no good: s/x/y/\n");
                }
                other => panic!("expected a sed failure, got {other:?}"),
            }
        }

        #[test]
        fn large_input_does_not_deadlock() {
            let (_dir, sed) = script("exec cat");
            let input = "line of text\n".repeat(100_000);
            let output = sed.apply(&command("s/x/y/"), &input).unwrap();
            assert_eq!(output.len(), input.len());
        }

        #[test]
        fn slow_command_is_killed() {
            let (_dir, sed) = script("exec sleep 10");
            let sed = sed.with_timeout(Duration::from_millis(200));

            let started = Instant::now();
            let error = sed.apply(&command("s/x/y/"), "input").unwrap_err();

            assert!(matches!(error, EngineError::TimedOut(_)));
            assert!(started.elapsed() < Duration::from_secs(5));
        }
    }
}
