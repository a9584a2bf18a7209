use crate::error::NipError;
use crate::source::{MetadataRequest, NipSource};
use hoppipolla_core::metadata::{merge_metadata, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

pub const SOURCE_NAME: &str = "local";

/// Serves manually recorded metadata loaded from the `*.json` files of a directory.
///
/// Every file holds one [`Metadata`] bundle. The bundles are merged in file name
/// order at [`init`](NipSource::init) and the result answers every request.
pub struct LocalNipSource {
    data_dir: PathBuf,
    metadata: RwLock<Arc<Metadata>>,
}

impl LocalNipSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            metadata: RwLock::new(Arc::new(Metadata::default())),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn unreadable(path: &Path, err: std::io::Error) -> NipError {
        NipError::LocalData {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    async fn load(&self) -> Result<Metadata, NipError> {
        let mut entries = tokio::fs::read_dir(&self.data_dir)
            .await
            .map_err(|err| Self::unreadable(&self.data_dir, err))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| Self::unreadable(&self.data_dir, err))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut bundles = Vec::with_capacity(files.len());
        for path in files {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| Self::unreadable(&path, err))?;
            match serde_json::from_str::<Metadata>(&raw) {
                Ok(bundle) => bundles.push(bundle),
                Err(err) => error!(
                    "Skipping unparsable metadata file {}: {}",
                    path.display(),
                    err
                ),
            }
        }

        Ok(merge_metadata(bundles))
    }
}

#[async_trait::async_trait]
impl NipSource for LocalNipSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn init(&self) -> Result<(), NipError> {
        let loaded = self.load().await?;
        info!(
            "Loaded {} node and {} link attribute(s) from {}",
            loaded.node_info.len(),
            loaded.link_info.len(),
            self.data_dir.display()
        );
        *self.metadata.write().await = Arc::new(loaded);
        Ok(())
    }

    async fn close(&self) -> Result<(), NipError> {
        Ok(())
    }

    async fn get_metadata(&self, _request: &MetadataRequest) -> Result<Arc<Metadata>, NipError> {
        Ok(self.metadata.read().await.clone())
    }
}
