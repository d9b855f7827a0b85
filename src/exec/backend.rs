// src/exec/backend.rs

//! Pluggable process backend.
//!
//! The build runner and the test-runner orchestrator never spawn processes
//! directly; they hand a [`ProcessSpec`] to a [`ProcessBackend`]. Production
//! uses [`TokioProcessBackend`]; tests provide a fake that records the
//! invocations and fabricates output.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Future returned by [`ProcessBackend::run`].
pub type ProcessFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProcessOutput, ProcessError>> + Send + 'a>>;

/// Why a process could not be run to completion.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("executable not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to run {program:?}: {source}")]
    Io {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything needed to start one external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Human-readable command line, for logs and dry runs.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.iter().chain(self.stderr.iter()).map(String::as_str)
    }
}

/// Trait abstracting how external processes are run.
pub trait ProcessBackend: Send + Sync {
    /// Run the process to completion and capture its output.
    ///
    /// A missing executable must be reported as [`ProcessError::NotFound`];
    /// a non-zero exit status is not an error.
    fn run<'a>(&'a self, spec: &'a ProcessSpec) -> ProcessFuture<'a>;
}

/// Real backend built on `tokio::process`.
///
/// Processes are started without a console window and are not killed when
/// the awaiting future is dropped: aborting a cycle lets the current process
/// finish.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessBackend;

impl TokioProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

impl ProcessBackend for TokioProcessBackend {
    fn run<'a>(&'a self, spec: &'a ProcessSpec) -> ProcessFuture<'a> {
        Box::pin(async move {
            info!(command = %spec.display(), "starting process");

            let mut cmd = Command::new(&spec.program);
            cmd.args(&spec.args)
                .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(false);
            if let Some(dir) = &spec.current_dir {
                cmd.current_dir(dir);
            }
            #[cfg(windows)]
            cmd.creation_flags(CREATE_NO_WINDOW);

            let mut child = cmd.spawn().map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    ProcessError::NotFound(spec.program.clone())
                } else {
                    ProcessError::Io {
                        program: spec.program.clone(),
                        source,
                    }
                }
            })?;

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();
            let (stdout, stderr) = tokio::join!(collect_lines(stdout), collect_lines(stderr));

            let status = child.wait().await.map_err(|source| ProcessError::Io {
                program: spec.program.clone(),
                source,
            })?;

            let exit_code = status.code().unwrap_or(-1);
            debug!(
                program = ?spec.program,
                exit_code,
                stdout_lines = stdout.len(),
                stderr_lines = stderr.len(),
                "process exited"
            );

            Ok(ProcessOutput {
                exit_code,
                stdout,
                stderr,
            })
        })
    }
}

async fn collect_lines<R>(stream: Option<R>) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return Vec::new();
    };
    let mut lines = BufReader::new(stream).lines();
    let mut out = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_args_with_spaces() {
        let spec = ProcessSpec::new("/bin/nunit-console")
            .arg("--noshadow")
            .arg("/My Tests/a.dll");
        assert_eq!(spec.display(), "/bin/nunit-console --noshadow \"/My Tests/a.dll\"");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let spec = ProcessSpec::new("sh")
            .args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let output = TokioProcessBackend::new().run(&spec).await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, vec!["out"]);
        assert_eq!(output.stderr, vec!["err"]);
    }

    #[tokio::test]
    async fn missing_executable_is_not_found() {
        let spec = ProcessSpec::new("/definitely/not/here/runner");
        let err = TokioProcessBackend::new().run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::NotFound(_)));
    }
}
