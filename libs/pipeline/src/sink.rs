use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use relay_api::{BoxFuture, HandlerError, MessageHandler};

use crate::SinkConfig;

/// Line written for every consumed message.
pub fn format_line(payload: &str) -> String {
    format!("Consumed log message: {payload}\n")
}

// ═══════════════════════════════════════════════════════════════
//  WriterSink
// ═══════════════════════════════════════════════════════════════

/// Writes one line per message to an async writer, flushing after each.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> MessageHandler for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn handle<'a>(&'a self, payload: &'a str) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let line = format_line(payload);
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
            Ok(())
        })
    }
}

pub type StdoutSink = WriterSink<tokio::io::Stdout>;

impl StdoutSink {
    pub fn stdout() -> Self {
        WriterSink::new(tokio::io::stdout())
    }
}

// ═══════════════════════════════════════════════════════════════
//  FileSink
// ═══════════════════════════════════════════════════════════════

/// Appends consumed messages to a file, creating parent directories.
pub struct FileSink {
    path: PathBuf,
    inner: WriterSink<tokio::fs::File>,
}

impl FileSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HandlerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HandlerError::io(format!("mkdir '{}': {e}", parent.display())))?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| HandlerError::io(format!("open '{}': {e}", path.display())))?;
        Ok(Self { path, inner: WriterSink::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageHandler for FileSink {
    fn handle<'a>(&'a self, payload: &'a str) -> BoxFuture<'a, Result<(), HandlerError>> {
        self.inner.handle(payload)
    }
}

/// Build the handler described by `config`.
pub async fn build_sink(config: &SinkConfig) -> Result<Arc<dyn MessageHandler>, HandlerError> {
    match config {
        SinkConfig::Stdout => Ok(Arc::new(StdoutSink::stdout())),
        SinkConfig::File { path } => {
            let sink = FileSink::open(path).await?;
            tracing::info!(path = %sink.path().display(), "file sink opened");
            Ok(Arc::new(sink))
        }
    }
}
