use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Polls `condition` every `step` until it holds or `limit` elapses.
///
/// Works with paused time: each sleep lets the runtime auto-advance.
pub async fn wait_until<F>(
    limit: Duration,
    step: Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(step).await;
    }
}
