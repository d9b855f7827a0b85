#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use watchtest::bus::{Message, MessageKind};
use watchtest::config::EngineConfig;
use watchtest::consumers::ChannelSink;
use watchtest::engine::{Engine, EngineContext};
use watchtest::fs::mock::MockFileSystem;
use watchtest_test_utils::fake_backend::FakeProcessBackend;

/// Engine over a mock filesystem and the fake backend, with a channel sink
/// attached.
pub fn start_engine(
    cfg: EngineConfig,
    root: &Path,
    fs: &MockFileSystem,
    backend: &FakeProcessBackend,
) -> (Engine, mpsc::UnboundedReceiver<Arc<Message>>) {
    let ctx = EngineContext::new(cfg, root, Arc::new(fs.clone()), Arc::new(backend.clone()))
        .expect("engine context");
    let engine = Engine::start(ctx).expect("engine start");
    let (sink, rx) = ChannelSink::channel();
    engine.add_sink("test", Arc::new(sink));
    (engine, rx)
}

/// Everything received so far, without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Arc<Message>>) -> Vec<Arc<Message>> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

pub fn kinds(messages: &[Arc<Message>]) -> Vec<MessageKind> {
    messages.iter().map(|m| m.kind()).collect()
}
