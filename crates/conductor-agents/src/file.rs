use crate::core::AgentCore;
use async_trait::async_trait;
use conductor_core::{
    Agent, AgentHealth, AgentKind, AgentMetrics, AgentStatus, BusMessage, ConductorResult,
    ExecutionResult, Task,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bytes returned by a `read` before the content is truncated.
const MAX_READ_BYTES: usize = 64 * 1024;
/// Entries returned by a `list`.
const MAX_LIST_ENTRIES: usize = 200;

/// Filesystem inspection agent.
///
/// Payload fields: `path` (required), `operation` = `read` | `stat` | `list`
/// (default `stat`). Relative paths resolve against the agent's base
/// directory.
pub struct FileAgent {
    core: AgentCore,
    base_dir: Option<PathBuf>,
}

impl FileAgent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            core: AgentCore::new(id, name, AgentKind::File),
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn perform(&self, task: &Task) -> Result<Value, String> {
        let raw = task
            .payload_str("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| "missing payload field: path".to_string())?;
        let path = self.resolve(raw);
        let operation = task.payload_str("operation").unwrap_or("stat");
        debug!(agent_id = %self.core.id(), path = %path.display(), operation, "File operation");

        match operation {
            "stat" => stat(&path).await,
            "read" => read(&path).await,
            "list" => list(&path).await,
            other => Err(format!("unsupported file operation: {other}")),
        }
    }
}

async fn stat(path: &Path) -> Result<Value, String> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| format!("cannot stat '{}': {e}", path.display()))?;
    let modified = meta
        .modified()
        .ok()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());
    Ok(json!({
        "path": path.display().to_string(),
        "is_file": meta.is_file(),
        "is_dir": meta.is_dir(),
        "size": meta.len(),
        "modified": modified,
        "readonly": meta.permissions().readonly(),
    }))
}

async fn read(path: &Path) -> Result<Value, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("cannot read '{}': {e}", path.display()))?;
    let truncated = bytes.len() > MAX_READ_BYTES;
    let shown = &bytes[..bytes.len().min(MAX_READ_BYTES)];
    Ok(json!({
        "path": path.display().to_string(),
        "size": bytes.len(),
        "truncated": truncated,
        "content": String::from_utf8_lossy(shown),
    }))
}

async fn list(path: &Path) -> Result<Value, String> {
    let mut dir = tokio::fs::read_dir(path)
        .await
        .map_err(|e| format!("cannot list '{}': {e}", path.display()))?;
    let mut entries = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| format!("cannot list '{}': {e}", path.display()))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    entries.sort();
    let total = entries.len();
    let shown: Vec<Value> = entries
        .into_iter()
        .take(MAX_LIST_ENTRIES)
        .map(|(name, is_dir)| json!({"name": name, "is_dir": is_dir}))
        .collect();
    Ok(json!({
        "path": path.display().to_string(),
        "total": total,
        "entries": shown,
    }))
}

#[async_trait]
impl Agent for FileAgent {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> AgentKind {
        self.core.kind()
    }

    fn status(&self) -> AgentStatus {
        self.core.status()
    }

    fn health(&self) -> AgentHealth {
        self.core.health()
    }

    fn metrics(&self) -> AgentMetrics {
        self.core.metrics()
    }

    async fn execute(&self, task: &Task) -> ExecutionResult {
        self.core.run(task, self.perform(task)).await
    }

    async fn receive(&self, message: BusMessage) -> ConductorResult<()> {
        self.core.accept(message)
    }

    async fn stop(&self) -> ConductorResult<()> {
        self.core.stop();
        info!(agent_id = %self.core.id(), "File agent stopped");
        Ok(())
    }
}
