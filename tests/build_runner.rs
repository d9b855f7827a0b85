// tests/build_runner.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use watchtest::build::BuildRunner;
use watchtest::errors::WatchtestError;
use watchtest::types::Severity;
use watchtest_test_utils::builders::{EngineConfigBuilder, ProjectConfigBuilder};
use watchtest_test_utils::fake_backend::{FakeProcessBackend, FakeResponse};
use watchtest_test_utils::init_tracing;

fn runner(backend: &FakeProcessBackend, args: &[&str]) -> BuildRunner {
    let cfg = EngineConfigBuilder::new().with_build_args(args).build();
    BuildRunner::from_config(&cfg, Arc::new(backend.clone()))
}

#[tokio::test]
async fn test_diagnostics_are_collected_per_project() {
    init_tracing();
    let backend = FakeProcessBackend::new();
    backend.respond(
        "build-tool",
        FakeResponse::ok()
            .stdout_line("Build started.")
            .stdout_line(r"Util.cs(3,1): warning CS0168: The variable 'x' is declared but never used"),
    );
    let project = ProjectConfigBuilder::new("Core", "/repo/Core/Core.csproj").build();

    let results = runner(&backend, &["{project}", "/nologo"])
        .build(&project)
        .await
        .unwrap();

    assert!(results.succeeded());
    assert_eq!(results.warnings().count(), 1);
    let warning = &results.items[0];
    assert_eq!(warning.project, "Core");
    assert_eq!(warning.file, PathBuf::from("/repo/Core/Util.cs"));
    assert_eq!(warning.severity, Severity::Warning);

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec!["/repo/Core/Core.csproj", "/nologo"]);
    assert_eq!(calls[0].current_dir.as_deref(), Some(Path::new("/repo/Core")));
}

#[tokio::test]
async fn test_nonzero_exit_without_diagnostics_synthesizes_error() {
    init_tracing();
    let backend = FakeProcessBackend::new();
    backend.respond("build-tool", FakeResponse::ok().exit_code(3).stdout_line("something broke"));
    let project = ProjectConfigBuilder::new("Core", "/repo/Core/Core.csproj").build();

    let results = runner(&backend, &[]).build(&project).await.unwrap();

    assert!(!results.succeeded());
    let errors: Vec<_> = results.errors().collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("code 3"));
    assert_eq!(errors[0].file, PathBuf::from("/repo/Core/Core.csproj"));
}

#[tokio::test]
async fn test_missing_build_tool_is_an_error() {
    init_tracing();
    let backend = FakeProcessBackend::new();
    backend.respond("build-tool", FakeResponse::not_found());
    let project = ProjectConfigBuilder::new("Core", "/repo/Core/Core.csproj").build();

    match runner(&backend, &[]).build(&project).await {
        Err(WatchtestError::BuildToolMissing(program)) => {
            assert_eq!(program, PathBuf::from("build-tool"));
        }
        other => panic!("Expected BuildToolMissing, got: {:?}", other),
    }
}
