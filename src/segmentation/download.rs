//! Local model directory with on-demand download

use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ModelsConfig;
use crate::error::{AppError, Result};
use crate::segmentation::models::ModelSpec;

pub struct ModelStore {
    model_dir: PathBuf,
    base_url: String,
    allow_download: bool,
    client: Client,
}

impl ModelStore {
    pub fn new(config: &ModelsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            model_dir: PathBuf::from(&config.model_dir),
            base_url: config.download_base_url.trim_end_matches('/').to_string(),
            allow_download: config.allow_download,
            client,
        })
    }

    pub fn local_path(&self, spec: &ModelSpec) -> PathBuf {
        self.model_dir.join(spec.file_name)
    }

    /// Whether the model file is already on disk
    pub fn is_cached(&self, spec: &ModelSpec) -> bool {
        self.local_path(spec).is_file()
    }

    /// Return the local path of a model, downloading it first if needed
    pub async fn ensure(&self, spec: &ModelSpec) -> Result<PathBuf> {
        let path = self.local_path(spec);
        if path.is_file() {
            debug!(model = %spec.name, path = ?path, "Using cached model");
            return Ok(path);
        }

        if !self.allow_download {
            return Err(AppError::ModelUnavailable(format!(
                "model '{}' is not present in {} and downloads are disabled",
                spec.name,
                self.model_dir.display()
            )));
        }

        fs::create_dir_all(&self.model_dir).await?;

        let url = format!("{}/{}", self.base_url, spec.file_name);
        info!(model = %spec.name, url = %url, "Downloading model");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ModelUnavailable(format!(
                "download of '{}' from {} returned {}",
                spec.name,
                url,
                response.status()
            )));
        }

        // Stream into a sibling .part file so an interrupted download never looks complete
        let partial = path.with_extension("part");
        let written = match self.stream_to(response, &partial).await {
            Ok(written) => written,
            Err(e) => {
                warn!(model = %spec.name, error = %e, "Model download failed");
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        fs::rename(&partial, &path).await?;
        info!(model = %spec.name, bytes = written, "Model downloaded");
        Ok(path)
    }

    async fn stream_to(&self, response: reqwest::Response, path: &Path) -> Result<u64> {
        let mut file = fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }
}
