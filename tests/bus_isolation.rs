// tests/bus_isolation.rs

mod common;
use crate::common::{drain, kinds, start_engine};

use std::path::Path;
use std::sync::Arc;

use watchtest::bus::{FnConsumer, Handled, Message, MessageKind};
use watchtest::fs::mock::MockFileSystem;
use watchtest_test_utils::builders::{nunit_xml, EngineConfigBuilder, ProjectConfigBuilder};
use watchtest_test_utils::fake_backend::{FakeProcessBackend, FakeResponse};
use watchtest_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn panicking_front_end_does_not_stop_the_cycle() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/tools/nunit-console.exe", "");
    let backend = FakeProcessBackend::new();
    backend.respond(
        "/tools/nunit-console.exe",
        FakeResponse::ok().results(nunit_xml("/repo/Core/bin/Core.dll", &[("T1", "Failure")])),
    );
    let cfg = EngineConfigBuilder::new()
        .with_default_runner("/tools/nunit-console.exe")
        .with_project(
            ProjectConfigBuilder::new("Core", "/repo/Core/Core.csproj")
                .assembly("/repo/Core/bin/Core.dll")
                .build(),
        )
        .build();
    let (engine, mut rx) = start_engine(cfg, Path::new("/repo"), &fs, &backend);
    engine.bus().register(
        &[MessageKind::RunStarted, MessageKind::BuildRun],
        Arc::new(FnConsumer::new("broken-ui", |_, _| -> anyhow::Result<Handled> {
            panic!("render failed")
        })),
    );

    engine.build_test_all().await;
    with_timeout(engine.wait_idle()).await;

    let messages = drain(&mut rx);
    let seen = kinds(&messages);
    assert!(seen.contains(&MessageKind::TestRun));
    assert!(seen.contains(&MessageKind::RunFinished));

    let errors: Vec<&str> = messages
        .iter()
        .filter_map(|m| match m.as_ref() {
            Message::Error(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.contains("broken-ui") && e.contains("render failed")));
    assert_eq!(engine.cache().snapshot().unwrap().failed.len(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn failing_consumer_error_is_republished() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeProcessBackend::new();
    let (engine, mut rx) = start_engine(
        EngineConfigBuilder::new().build(),
        Path::new("/repo"),
        &fs,
        &backend,
    );
    engine.bus().register(
        &[MessageKind::Information],
        Arc::new(FnConsumer::new("strict", |_, _| Err(anyhow::anyhow!("rejected")))),
    );

    let report = engine.bus().publish(Message::information("hello")).await;

    assert_eq!(report.failures.len(), 1);
    let messages = drain(&mut rx);
    // The test sink sees the original message and then the failure.
    assert!(matches!(messages[0].as_ref(), Message::Information(_)));
    assert!(matches!(messages[1].as_ref(), Message::Error(text) if text.contains("rejected")));

    engine.shutdown().await;
}
