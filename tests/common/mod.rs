use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tod_dispatch::DaemonFactory;
use tod_dispatch::ProbeDaemon;
use tod_dispatch::Result;
use tod_dispatch::Settings;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio::time::timeout;

/// Daemon that echoes every request back as `"<id> request=<id> <rest>"`
/// after a fixed delay, or never answers when `silent`.
pub struct EchoDaemon {
    delay: Duration,
    silent: bool,
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

#[async_trait]
impl ProbeDaemon for EchoDaemon {
    async fn submit(
        &self,
        line: &str,
    ) -> Result<()> {
        if self.silent {
            return Ok(());
        }
        let (id, rest) = line.split_once(' ').unwrap_or((line, ""));
        let reply = format!("{} request={} {}", id, id, rest);
        let tx = self.tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(reply);
        });
        Ok(())
    }

    async fn receive_line(
        &self,
        wait: Duration,
    ) -> Result<Option<String>> {
        let mut rx = self.rx.lock().await;
        Ok(timeout(wait, rx.recv()).await.ok().flatten())
    }

    async fn terminate(&self) -> Result<()> {
        Ok(())
    }

    async fn clear_outstanding(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct EchoFactory {
    pub delay: Duration,
    pub silent: HashSet<String>,
    pub sessions: DashMap<String, String>,
}

impl EchoFactory {
    pub fn new(
        delay: Duration,
        silent: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            delay,
            silent: silent.iter().map(|s| s.to_string()).collect(),
            sessions: DashMap::new(),
        })
    }
}

impl DaemonFactory for EchoFactory {
    fn spawn(
        &self,
        vp: &str,
        session_id: &str,
        _concurrency: usize,
    ) -> Result<Arc<dyn ProbeDaemon>> {
        self.sessions.insert(vp.to_string(), session_id.to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Arc::new(EchoDaemon {
            delay: self.delay,
            silent: self.silent.contains(vp),
            tx,
            rx: Mutex::new(rx),
        }))
    }
}

/// Settings with every poll interval shortened for tests.
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.scheduler.session_id = "itest".to_string();
    settings.scheduler.intake_poll_interval_in_ms = 50;
    settings.scheduler.status_interval_in_ms = 100;
    settings.scheduler.startup_grace_in_ms = 100;
    settings.worker.concurrency = 3;
    settings.worker.timeout_in_secs = 1;
    settings.worker.queue_poll_interval_in_ms = 50;
    settings.worker.dispatch_interval_in_ms = 50;
    settings.worker.receive_timeout_in_ms = 50;
    settings
}
