// tests/engine_cycle.rs

mod common;
use crate::common::{drain, kinds, start_engine};

use std::path::Path;

use watchtest::bus::{Message, MessageKind};
use watchtest::config::EngineConfig;
use watchtest::fs::mock::MockFileSystem;
use watchtest::types::TriggerWhileRunningBehaviour;
use watchtest_test_utils::builders::{nunit_xml, EngineConfigBuilder, ProjectConfigBuilder};
use watchtest_test_utils::fake_backend::{FakeProcessBackend, FakeResponse};
use watchtest_test_utils::{init_tracing, with_timeout};

const ROOT: &str = "/repo";
const RUNNER: &str = "/tools/nunit-console.exe";
const CORE_DLL: &str = "/repo/Core/bin/Core.Tests.dll";

fn single_project() -> EngineConfig {
    EngineConfigBuilder::new()
        .with_default_runner(RUNNER)
        .with_project(
            ProjectConfigBuilder::new("Core", "/repo/Core/Core.csproj")
                .assembly(CORE_DLL)
                .build(),
        )
        .build()
}

fn fs_with_runner() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(RUNNER, "");
    fs
}

#[tokio::test]
async fn cycle_publishes_in_order_and_reports_deltas() {
    init_tracing();
    let fs = fs_with_runner();
    let backend = FakeProcessBackend::new();
    backend.respond(
        RUNNER,
        FakeResponse::ok().results(nunit_xml(
            CORE_DLL,
            &[("Core.T1", "Failure"), ("Core.T2", "Success")],
        )),
    );
    let (engine, mut rx) = start_engine(single_project(), Path::new(ROOT), &fs, &backend);

    engine.build_test_all().await;
    with_timeout(engine.wait_idle()).await;

    let messages = drain(&mut rx);
    let order: Vec<MessageKind> = kinds(&messages)
        .into_iter()
        .filter(|k| {
            matches!(
                k,
                MessageKind::RunStarted
                    | MessageKind::BuildRun
                    | MessageKind::TestRun
                    | MessageKind::CacheDelta
                    | MessageKind::RunFinished
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            MessageKind::RunStarted,
            MessageKind::BuildRun,
            MessageKind::TestRun,
            MessageKind::CacheDelta,
            MessageKind::RunFinished,
        ]
    );

    let delta = messages
        .iter()
        .find_map(|m| match m.as_ref() {
            Message::CacheDelta(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(delta.failed.added.len(), 1);
    assert_eq!(delta.failed.added[0].display_name, "Core.T1");

    let Some(Message::RunFinished(finished)) = messages.last().map(|m| m.as_ref()) else {
        panic!("last message should be RunFinished");
    };
    assert_eq!(finished.report.tests_failed, 1);
    assert_eq!(finished.report.tests_passed, 1);
    assert!(!finished.report.aborted);

    // Fix the test: the next cycle reports it as removed.
    backend.respond(
        RUNNER,
        FakeResponse::ok().results(nunit_xml(
            CORE_DLL,
            &[("Core.T1", "Success"), ("Core.T2", "Success")],
        )),
    );
    engine.build_test_all().await;
    with_timeout(engine.wait_idle()).await;

    let delta = drain(&mut rx)
        .iter()
        .find_map(|m| match m.as_ref() {
            Message::CacheDelta(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap();
    assert!(delta.failed.added.is_empty());
    assert_eq!(delta.failed.removed.len(), 1);
    assert!(engine.cache().snapshot().unwrap().failed.is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn failed_build_skips_tests_of_it_and_its_dependents() {
    init_tracing();
    let fs = fs_with_runner();
    let backend = FakeProcessBackend::new();
    let cfg = EngineConfigBuilder::new()
        .with_default_runner(RUNNER)
        .with_build_args(&["{project}"])
        .with_project(ProjectConfigBuilder::new("Core", "/repo/Core/Core.csproj").build())
        .with_project(
            ProjectConfigBuilder::new("Core.Tests", "/repo/Tests/Core.Tests.csproj")
                .assembly(CORE_DLL)
                .references("Core")
                .build(),
        )
        .build();
    backend.respond(
        "build-tool",
        FakeResponse::ok()
            .exit_code(1)
            .stdout_line("/repo/Core/Foo.cs(3,5): error CS1002: ; expected"),
    );
    let (engine, mut rx) = start_engine(cfg, Path::new(ROOT), &fs, &backend);

    engine.build_test_all().await;
    with_timeout(engine.wait_idle()).await;

    assert!(backend.calls_to(RUNNER).is_empty());
    let messages = drain(&mut rx);
    assert!(!kinds(&messages).contains(&MessageKind::TestRun));

    let snapshot = engine.cache().snapshot().unwrap();
    assert!(!snapshot.errors.is_empty());
    assert!(snapshot.errors.iter().any(|e| e.message.contains("CS1002")));

    engine.shutdown().await;
}

#[tokio::test]
async fn abort_mid_cycle_stops_before_next_runner_group() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeProcessBackend::new();
    let mut builder = EngineConfigBuilder::new();
    for tag in ["a", "b", "c"] {
        let exe = format!("/tools/{tag}/console.exe");
        let dll = format!("/repo/{tag}/bin/{tag}.dll");
        fs.add_file(&exe, "");
        backend.respond(exe.as_str(), FakeResponse::ok().results(nunit_xml(&dll, &[("T1", "Failure")])));
        builder = builder.with_framework_runner(tag, &exe).with_project(
            ProjectConfigBuilder::new(tag, &format!("/repo/{tag}/{tag}.csproj"))
                .assembly(&dll)
                .framework(tag)
                .build(),
        );
    }
    let (engine, mut rx) = start_engine(builder.build(), Path::new(ROOT), &fs, &backend);

    // Three builds, then the first runner: cancel right after it returns.
    let coordinator = engine.coordinator().clone();
    backend.on_call(move |call| {
        if call == 4 {
            coordinator.cancel();
        }
    });

    engine.build_test_all().await;
    with_timeout(engine.wait_idle()).await;

    let runner_calls = backend
        .calls()
        .into_iter()
        .filter(|c| c.program.ends_with("console.exe"))
        .count();
    assert_eq!(runner_calls, 1);

    let messages = drain(&mut rx);
    let finished = messages
        .iter()
        .find_map(|m| match m.as_ref() {
            Message::RunFinished(f) => Some(f.report.clone()),
            _ => None,
        })
        .unwrap();
    assert!(finished.aborted);
    // No delta for interrupted test groups.
    assert!(engine.cache().snapshot().unwrap().failed.is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn abort_message_returns_once_idle() {
    init_tracing();
    let fs = fs_with_runner();
    let backend = FakeProcessBackend::new();
    let cfg = EngineConfigBuilder::new()
        .with_default_runner(RUNNER)
        .with_behaviour(TriggerWhileRunningBehaviour::Queue)
        .with_project(
            ProjectConfigBuilder::new("Core", "/repo/Core/Core.csproj")
                .assembly(CORE_DLL)
                .build(),
        )
        .build();
    let (engine, _rx) = start_engine(cfg, Path::new(ROOT), &fs, &backend);

    engine.build_test_all().await;
    with_timeout(engine.abort("user")).await;

    assert!(engine.coordinator().is_idle());
    assert!(!engine.is_running());
    engine.shutdown().await;
}

#[tokio::test]
async fn explicit_tests_run_without_building() {
    init_tracing();
    let fs = fs_with_runner();
    let backend = FakeProcessBackend::new();
    backend.respond(
        RUNNER,
        FakeResponse::ok().results(nunit_xml(CORE_DLL, &[("Core.T1", "Failure")])),
    );
    let (engine, _rx) = start_engine(single_project(), Path::new(ROOT), &fs, &backend);

    engine.run_tests(vec![watchtest::model::TestRunInfo::new(CORE_DLL, None)
        .with_tests(watchtest::types::RunnerKind::NUnit, ["Core.T1"])]);
    with_timeout(engine.wait_idle()).await;

    assert!(backend.calls_to("build-tool").is_empty());
    let runs = backend.calls_to(RUNNER);
    assert_eq!(runs.len(), 1);
    assert!(runs[0].args.iter().any(|a| a.ends_with("run=Core.T1")));
    assert_eq!(engine.cache().snapshot().unwrap().failed.len(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn cache_delta_mode_follows_engine_config() {
    init_tracing();
    let fs = fs_with_runner();
    let backend = FakeProcessBackend::new();

    let (engine, _rx) = start_engine(single_project(), Path::new(ROOT), &fs, &backend);
    assert!(engine.cache().deltas_enabled());
    engine.shutdown().await;

    backend.respond(
        RUNNER,
        FakeResponse::ok().results(nunit_xml(CORE_DLL, &[("Core.T1", "Failure")])),
    );
    let mut cfg = single_project();
    cfg.engine.deltas = false;
    let (engine, mut rx) = start_engine(cfg, Path::new(ROOT), &fs, &backend);
    assert!(!engine.cache().deltas_enabled());

    engine.build_test_all().await;
    with_timeout(engine.wait_idle()).await;

    let delta = drain(&mut rx)
        .iter()
        .find_map(|m| match m.as_ref() {
            Message::CacheDelta(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap();
    assert!(delta.full_refresh);
    assert_eq!(delta.failed.added.len(), 1);

    engine.shutdown().await;
}
