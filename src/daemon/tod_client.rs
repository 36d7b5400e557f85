use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::process::Child;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::DaemonFactory;
use super::ProbeDaemon;
use crate::DaemonConfig;
use crate::DaemonError;
use crate::Result;

/// Grace period for the client to exit after being killed
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Subprocess-backed daemon channel.
///
/// Stdin and stdout sit behind separate locks so the dispatch task can
/// write while the receive task is parked on a read.
pub struct TodClient {
    vp: String,
    session_id: String,
    debug_path: PathBuf,
    clear_timeout: Duration,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<Lines<BufReader<ChildStdout>>>,
}

impl TodClient {
    /// Launches `<client> --session-id=<session> --concurrency=<n>`.
    pub fn start(
        config: &DaemonConfig,
        vp: &str,
        session_id: &str,
        concurrency: usize,
    ) -> Result<Self> {
        let mut child = Command::new(&config.client_path)
            .arg(format!("--session-id={}", session_id))
            .arg(format!("--concurrency={}", concurrency))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DaemonError::Spawn {
                program: config.client_path.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(DaemonError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(DaemonError::MissingPipe("stdout"))?;

        info!(
            "[TodClient:{}] started client pid={:?} session={}",
            vp,
            child.id(),
            session_id
        );

        Ok(Self {
            vp: vp.to_string(),
            session_id: session_id.to_string(),
            debug_path: config.debug_path.clone(),
            clear_timeout: config.clear_timeout(),
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(BufReader::new(stdout).lines()),
        })
    }

    async fn run_clear_requests(&self) -> Result<()> {
        let mut helper = Command::new(&self.debug_path)
            .arg(format!("--session-id={}", self.session_id))
            .arg("--clear-requests")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DaemonError::Spawn {
                program: self.debug_path.display().to_string(),
                source,
            })?;

        let stdout = helper.stdout.take().ok_or(DaemonError::MissingPipe("stdout"))?;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await.map_err(DaemonError::Read)? {
            debug!("[TodClient:{}] clear-requests: {}", self.vp, line.trim());
        }
        let status = helper.wait().await.map_err(DaemonError::Read)?;
        debug!("[TodClient:{}] clear-requests exited with {}", self.vp, status);
        Ok(())
    }
}

#[async_trait]
impl ProbeDaemon for TodClient {
    async fn submit(
        &self,
        line: &str,
    ) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| {
            DaemonError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client stdin already closed",
            ))
        })?;

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        stdin.write_all(&buf).await.map_err(DaemonError::Write)?;
        stdin.flush().await.map_err(DaemonError::Write)?;
        Ok(())
    }

    async fn receive_line(
        &self,
        wait: Duration,
    ) -> Result<Option<String>> {
        let mut lines = self.stdout.lock().await;
        // next_line is cancel safe, so a timeout never loses a partial line
        match timeout(wait, lines.next_line()).await {
            Err(_) => Ok(None),
            Ok(Ok(Some(line))) => Ok(Some(line)),
            Ok(Ok(None)) => Err(DaemonError::StreamClosed.into()),
            Ok(Err(e)) => Err(DaemonError::Read(e).into()),
        }
    }

    async fn terminate(&self) -> Result<()> {
        // closing stdin first lets a well-behaved client exit on EOF
        self.stdin.lock().await.take();

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = child.start_kill() {
            // already exited
            debug!("[TodClient:{}] kill: {}", self.vp, e);
        }
        match timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => info!("[TodClient:{}] client exited with {}", self.vp, status),
            Ok(Err(e)) => warn!("[TodClient:{}] wait failed: {}", self.vp, e),
            Err(_) => warn!("[TodClient:{}] client did not exit within {:?}", self.vp, REAP_TIMEOUT),
        }
        Ok(())
    }

    async fn clear_outstanding(&self) -> Result<()> {
        match timeout(self.clear_timeout, self.run_clear_requests()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "[TodClient:{}] clear-requests produced no result within {:?}",
                    self.vp, self.clear_timeout
                );
                Err(DaemonError::ClearTimeout(self.clear_timeout).into())
            }
        }
    }
}

/// Spawns one [`TodClient`] per vantage point.
#[derive(Debug, Clone)]
pub struct TodClientFactory {
    config: DaemonConfig,
}

impl TodClientFactory {
    pub fn new(config: DaemonConfig) -> Self {
        Self { config }
    }
}

impl DaemonFactory for TodClientFactory {
    fn spawn(
        &self,
        vp: &str,
        session_id: &str,
        concurrency: usize,
    ) -> Result<Arc<dyn ProbeDaemon>> {
        let client = TodClient::start(&self.config, vp, session_id, concurrency)?;
        Ok(Arc::new(client))
    }
}
