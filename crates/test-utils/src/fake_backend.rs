use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use watchtest::exec::{ProcessBackend, ProcessError, ProcessFuture, ProcessOutput, ProcessSpec};

/// What the fake backend does when a program is "run".
#[derive(Debug, Clone, Default)]
pub struct FakeResponse {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Written to the `xml=` result file named on the command line.
    pub results_xml: Option<String>,
    pub not_found: bool,
}

impl FakeResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn not_found() -> Self {
        Self {
            not_found: true,
            ..Self::default()
        }
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn stdout_line(mut self, line: impl Into<String>) -> Self {
        self.stdout.push(line.into());
        self
    }

    pub fn results(mut self, xml: impl Into<String>) -> Self {
        self.results_xml = Some(xml.into());
        self
    }
}

type Hook = Arc<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct FakeState {
    responses: HashMap<PathBuf, FakeResponse>,
    calls: Vec<ProcessSpec>,
    hook: Option<Hook>,
}

/// A fake process backend that:
/// - records every invocation
/// - answers with the response configured for the program (exit 0 otherwise)
/// - writes scripted NUnit XML to the result file the runner was told to use
#[derive(Clone, Default)]
pub struct FakeProcessBackend {
    state: Arc<Mutex<FakeState>>,
}

impl std::fmt::Debug for FakeProcessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeProcessBackend").finish_non_exhaustive()
    }
}

impl FakeProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, program: impl Into<PathBuf>, response: FakeResponse) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(program.into(), response);
        self
    }

    /// Called with the 1-based call number after each invocation completes.
    pub fn on_call(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.state.lock().unwrap().hook = Some(Arc::new(hook));
    }

    pub fn calls(&self) -> Vec<ProcessSpec> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, program: impl AsRef<Path>) -> Vec<ProcessSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program.as_ref())
            .collect()
    }
}

/// Path from a `--xml=<path>` / `/xml=<path>` argument.
pub fn result_file_arg(spec: &ProcessSpec) -> Option<PathBuf> {
    spec.args.iter().find_map(|arg| {
        let flag = arg.trim_start_matches(['-', '/']);
        flag.strip_prefix("xml=").map(PathBuf::from)
    })
}

impl ProcessBackend for FakeProcessBackend {
    fn run<'a>(&'a self, spec: &'a ProcessSpec) -> ProcessFuture<'a> {
        Box::pin(async move {
            let (response, call, hook) = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(spec.clone());
                let response = state
                    .responses
                    .get(&spec.program)
                    .cloned()
                    .unwrap_or_default();
                (response, state.calls.len(), state.hook.clone())
            };

            let result = if response.not_found {
                Err(ProcessError::NotFound(spec.program.clone()))
            } else {
                if let (Some(xml), Some(path)) = (&response.results_xml, result_file_arg(spec)) {
                    tokio::fs::write(&path, xml).await.map_err(|source| ProcessError::Io {
                        program: spec.program.clone(),
                        source,
                    })?;
                }
                Ok(ProcessOutput {
                    exit_code: response.exit_code,
                    stdout: response.stdout,
                    stderr: response.stderr,
                })
            };

            if let Some(hook) = hook {
                hook(call);
            }
            result
        })
    }
}
