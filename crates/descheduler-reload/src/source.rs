use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Where the raw configuration document comes from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Human-readable origin, used in logs and events.
    fn describe(&self) -> String;

    /// Fetch the current document. Timeouts and cancellation are the
    /// implementation's concern.
    async fn fetch(&self) -> anyhow::Result<String>;
}

/// Reads the document from a file on every fetch.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn fetch(&self) -> anyhow::Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Cannot read {}", self.path.display()))
    }
}

/// In-memory document, replaceable at runtime.
pub struct StaticSource {
    name: String,
    content: RwLock<String>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: RwLock::new(content.into()),
        }
    }

    pub async fn replace(&self, content: impl Into<String>) {
        *self.content.write().await = content.into();
    }
}

#[async_trait]
impl ConfigSource for StaticSource {
    fn describe(&self) -> String {
        format!("static:{}", self.name)
    }

    async fn fetch(&self) -> anyhow::Result<String> {
        Ok(self.content.read().await.clone())
    }
}
