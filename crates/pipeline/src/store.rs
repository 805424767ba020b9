//! Artifact persistence collaborator.
//!
//! Artifacts are keyed by correlation id. Reusing an id overwrites the
//! earlier file; two workers sharing an id race and the last write wins.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use plotbuilder_core::job::CorrelationId;

use crate::render::{Artifact, RenderError};

#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    /// Persist `artifact` under `id`, returning where it landed.
    async fn persist(&self, id: &CorrelationId, artifact: &Artifact)
        -> Result<PathBuf, RenderError>;
}

/// Writes `<root>/<id>.<ext>` on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the reports directory if it does not exist yet.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn path_for(&self, id: &CorrelationId, extension: &str) -> PathBuf {
        self.root.join(format!("{id}.{extension}"))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn persist(
        &self,
        id: &CorrelationId,
        artifact: &Artifact,
    ) -> Result<PathBuf, RenderError> {
        let path = self.path_for(id, artifact.extension);
        tokio::fs::write(&path, &artifact.bytes).await?;
        Ok(path)
    }
}
