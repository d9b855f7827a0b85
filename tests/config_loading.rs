// tests/config_loading.rs

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use watchtest::config::load_and_validate;
use watchtest::errors::WatchtestError;
use watchtest::types::TriggerWhileRunningBehaviour;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_loads_and_resolves_paths() {
    let file = config_file(
        r#"
[engine]
triggered_while_running_behaviour = "abort"
queue_length = 3
optimistic_build = true
provider = "php"

[build]
program = "msbuild"
args = ["{project}", "/nologo"]

[runners.nunit]
default = "tools/nunit-console.exe"

[runners.nunit.frameworks]
"v4.0" = "tools/nunit-console-40.exe"

[[project]]
name = "Core"
file = "src/Core/Core.csproj"

[[project]]
name = "Core.Tests"
file = "src/Core.Tests/Core.Tests.csproj"
assembly = "src/Core.Tests/bin/Core.Tests.dll"
framework = "v4.0"
references = ["Core"]

[[extension]]
provider = "php"
extensions = [".php"]
"#,
    );

    let cfg = load_and_validate(file.path(), Path::new("/repo")).unwrap();

    assert_eq!(
        cfg.engine.triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Abort
    );
    assert_eq!(cfg.engine.queue_length, 3);
    assert!(cfg.engine.optimistic_build);
    assert_eq!(cfg.projects.len(), 2);
    assert_eq!(
        cfg.projects[1].assembly.as_deref(),
        Some(Path::new("/repo/src/Core.Tests/bin/Core.Tests.dll"))
    );
    let nunit = cfg.runners.nunit.as_ref().unwrap();
    assert_eq!(
        nunit.frameworks.get("v4.0"),
        Some(&PathBuf::from("/repo/tools/nunit-console-40.exe"))
    );
    assert_eq!(cfg.extensions.len(), 1);
}

#[test]
fn test_reference_cycle_returns_structured_error() {
    let file = config_file(
        r#"
[[project]]
name = "A"
file = "a.csproj"
references = ["B"]

[[project]]
name = "B"
file = "b.csproj"
references = ["A"]
"#,
    );

    match load_and_validate(file.path(), Path::new("/repo")) {
        Err(WatchtestError::DependencyCycle(msg)) => {
            assert!(msg.contains("cycle"));
            assert!(msg.contains('A') || msg.contains('B'));
        }
        Err(e) => panic!("Expected DependencyCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_duplicate_project_returns_config_error() {
    let file = config_file(
        r#"
[[project]]
name = "A"
file = "a.csproj"

[[project]]
name = "A"
file = "other.csproj"
"#,
    );

    let err = load_and_validate(file.path(), Path::new("/repo")).unwrap_err();
    assert!(matches!(err, WatchtestError::ConfigError(ref msg) if msg.contains("more than once")));
}

#[test]
fn test_extension_without_extensions_is_rejected() {
    let file = config_file(
        r#"
[[extension]]
provider = "php"
extensions = []
"#,
    );

    let err = load_and_validate(file.path(), Path::new("/repo")).unwrap_err();
    assert!(matches!(err, WatchtestError::ConfigError(_)));
}

#[test]
fn test_malformed_toml_returns_toml_error() {
    let file = config_file("[engine\nqueue_length = 1\n");

    let err = load_and_validate(file.path(), Path::new("/repo")).unwrap_err();
    assert!(matches!(err, WatchtestError::TomlError(_)));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_and_validate(dir.path().join("Watchtest.toml"), dir.path());
    assert!(result.is_err());
}
