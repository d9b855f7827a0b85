// tests/watcher_events.rs

use std::sync::Arc;
use std::time::Duration;

use watchtest::bus::{Message, MessageBus, MessageKind};
use watchtest::consumers::{ChannelSink, SinkConsumer};
use watchtest::watch::{DirectoryWatcher, WatchOptions};
use watchtest_test_utils::{init_tracing, recv_until};

fn watcher() -> (DirectoryWatcher, tokio::sync::mpsc::UnboundedReceiver<Arc<Message>>) {
    let bus = Arc::new(MessageBus::new());
    let (sink, rx) = ChannelSink::channel();
    bus.register(
        &[MessageKind::FileChange],
        Arc::new(SinkConsumer::new("test", Arc::new(sink))),
    );
    let options = WatchOptions {
        debounce: Duration::from_millis(50),
        ignore: vec!["**/obj/**".to_string()],
        output_dir: None,
    };
    (DirectoryWatcher::new(bus, options), rx)
}

#[tokio::test]
async fn edits_are_debounced_into_one_batch() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (watcher, mut rx) = watcher();
    watcher.watch(dir.path()).unwrap();

    std::fs::create_dir_all(dir.path().join("obj")).unwrap();
    std::fs::write(dir.path().join("obj/gen.cs"), "generated").unwrap();
    std::fs::write(dir.path().join("a.cs"), "one").unwrap();
    std::fs::write(dir.path().join("a.cs"), "two").unwrap();

    let message = recv_until(&mut rx, MessageKind::FileChange).await.pop().unwrap();
    let Message::FileChange(change) = message.as_ref() else {
        panic!("expected a file change");
    };
    let names: Vec<_> = change
        .files()
        .iter()
        .filter_map(|f| f.path().file_name())
        .collect();
    assert_eq!(names, vec!["a.cs"]);

    watcher.stop();
}

#[tokio::test]
async fn paused_watcher_drops_changes() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (watcher, mut rx) = watcher();
    watcher.watch(dir.path()).unwrap();

    watcher.pause();
    std::fs::write(dir.path().join("while_paused.cs"), "x").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    watcher.resume();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(rx.try_recv().is_err());

    std::fs::write(dir.path().join("after.cs"), "y").unwrap();
    let message = recv_until(&mut rx, MessageKind::FileChange).await.pop().unwrap();
    let Message::FileChange(change) = message.as_ref() else {
        panic!("expected a file change");
    };
    assert!(change.files().iter().all(|f| f.path().ends_with("after.cs")));

    watcher.stop();
}
