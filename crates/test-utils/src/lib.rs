pub mod builders;
pub mod fake_backend;

use std::future::Future;
use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{fmt, EnvFilter};
use watchtest::bus::{Message, MessageKind};

static INIT: Once = Once::new();

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialise tracing for tests.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `-- --nocapture`). The filter comes from `WATCHTEST_LOG`, then
/// `RUST_LOG`, e.g. `WATCHTEST_LOG=watchtest::engine=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = std::env::var(watchtest::logging::LOG_ENV)
            .ok()
            .and_then(|v| EnvFilter::try_new(v).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn,watchtest=info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future, failing the test if it takes longer than five seconds.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Receive from a sink channel until a message of `kind` arrives.
///
/// Returns every message seen, the matching one last.
pub async fn recv_until(
    rx: &mut UnboundedReceiver<Arc<Message>>,
    kind: MessageKind,
) -> Vec<Arc<Message>> {
    with_timeout(async {
        let mut seen = Vec::new();
        while let Some(message) = rx.recv().await {
            let done = message.kind() == kind;
            seen.push(message);
            if done {
                break;
            }
        }
        seen
    })
    .await
}
