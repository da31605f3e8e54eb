//! Model artifact download.
//!
//! A tagger repo needs two files, `model.onnx` and `selected_tags.csv`.
//! Missing files are streamed from the configured mirror into
//! `{model_dir}/{owner}--{name}/`. Each file is written under a `.part` name
//! and only renamed into place once its size matches `Content-Length`.
//! Files already present are checked against the mirror's advertised size.

use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::error::{EngineError, EngineResult};

/// ONNX model filename inside a repo.
pub const MODEL_FILENAME: &str = "model.onnx";
/// Tag vocabulary filename inside a repo.
pub const LABELS_FILENAME: &str = "selected_tags.csv";
/// Every file a tagger repo must provide.
pub const REQUIRED_FILES: [&str; 2] = [MODEL_FILENAME, LABELS_FILENAME];

/// Local layout of one tagger repo.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    dir: PathBuf,
}

impl ModelFiles {
    /// Layout rooted at `dir` (already including the repo directory).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the ONNX model.
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILENAME)
    }

    /// Path of the tag vocabulary.
    pub fn labels_path(&self) -> PathBuf {
        self.dir.join(LABELS_FILENAME)
    }

    /// Required files not present on disk.
    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_FILES
            .into_iter()
            .filter(|name| !self.dir.join(name).exists())
            .collect()
    }

    /// Whether every required file is present.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// URL of `file` in `repo` on the configured mirror.
pub fn file_url(config: &ModelConfig, file: &str) -> String {
    format!(
        "{}/{}/resolve/main/{}",
        config.download_base_url.trim_end_matches('/'),
        config.repo,
        file
    )
}

/// Make sure every required file exists, downloading the missing ones.
///
/// With downloads allowed, files already on disk are checked against the
/// size the mirror advertises; a mismatch deletes the file and fails with
/// `FileSizeMismatch`. With `skip_auto_download` set, nothing touches the
/// network and missing files are an error instead.
pub async fn ensure_model_files(
    config: &ModelConfig,
    files: &ModelFiles,
    client: &reqwest::Client,
) -> EngineResult<()> {
    if config.skip_auto_download {
        let missing = files.missing();
        if missing.is_empty() {
            return Ok(());
        }
        return Err(EngineError::NotLoaded(format!(
            "Missing {} in {} and auto-download is disabled",
            missing.join(", "),
            files.dir().display()
        )));
    }

    tokio::fs::create_dir_all(files.dir())
        .await
        .map_err(|e| EngineError::Download {
            url: config.repo.clone(),
            message: format!("Cannot create {}: {e}", files.dir().display()),
        })?;

    for name in REQUIRED_FILES {
        let url = file_url(config, name);
        let dest = files.dir().join(name);
        if dest.exists() {
            verify_cached(client, &url, &dest).await?;
            continue;
        }

        tracing::info!("Downloading {}", name);
        tracing::info!("  Source: {}", url);
        tracing::info!("  Destination: {:?}", dest);

        let size = download_file(client, &url, &dest).await?;
        tracing::info!(
            "  {} complete ({:.1} MB)",
            name,
            size as f64 / (1024.0 * 1024.0)
        );
    }

    Ok(())
}

/// Hugging Face reports the real size of LFS files in this header.
const LINKED_SIZE_HEADER: &str = "x-linked-size";

/// Compare a cached file against the size advertised at `url`.
///
/// An unreachable mirror keeps the cached file, so a warm cache still
/// loads offline.
async fn verify_cached(client: &reqwest::Client, url: &str, path: &Path) -> EngineResult<()> {
    match remote_size(client, url).await {
        Ok(Some(expected)) => verify_size(path, expected),
        Ok(None) => {
            tracing::debug!("No size advertised for {url}, keeping {:?}", path);
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Cannot check {:?} against {url}: {e}", path);
            Ok(())
        }
    }
}

/// Advertised size of `url`, from a HEAD request.
async fn remote_size(client: &reqwest::Client, url: &str) -> Result<Option<u64>, reqwest::Error> {
    let response = client.head(url).send().await?.error_for_status()?;
    let headers = response.headers();
    let size = [LINKED_SIZE_HEADER, reqwest::header::CONTENT_LENGTH.as_str()]
        .into_iter()
        .find_map(|name| headers.get(name)?.to_str().ok()?.trim().parse::<u64>().ok());
    Ok(size)
}

/// Download a file from a URL to a local path, streaming to disk.
///
/// The body goes to a `.part` file that is removed on any failure.
/// Returns the number of bytes written.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> EngineResult<u64> {
    let download_err = |message: String| EngineError::Download {
        url: url.to_string(),
        message,
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| download_err(e.to_string()))?;

    let total_size = response.content_length();
    if let Some(size) = total_size {
        tracing::info!("  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0));
    }

    let part = part_path(dest);
    let downloaded = match write_part(response, &part, total_size).await {
        Ok(downloaded) => downloaded,
        Err(message) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(download_err(message));
        }
    };

    if let Some(expected) = total_size {
        verify_size(&part, expected)?;
    }

    if let Err(e) = tokio::fs::rename(&part, dest).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(download_err(format!("Cannot move into place: {e}")));
    }
    Ok(downloaded)
}

/// Stream a response body into `part`.
async fn write_part(
    response: reqwest::Response,
    part: &Path,
    total_size: Option<u64>,
) -> Result<u64, String> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| format!("Cannot create {}: {e}", part.display()))?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("Write failed: {e}"))?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_size {
            if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
                tracing::info!(
                    "  Progress: {:.0}%",
                    downloaded as f64 / total as f64 * 100.0
                );
            }
        }
    }

    file.flush()
        .await
        .map_err(|e| format!("Flush failed: {e}"))?;
    Ok(downloaded)
}

/// Check a file's size on disk against the advertised size.
///
/// On mismatch, removes the file so the next attempt starts clean.
pub fn verify_size(path: &Path, expected: u64) -> EngineResult<()> {
    let actual = std::fs::metadata(path)
        .map_err(|e| EngineError::Internal(format!("Cannot stat {}: {e}", path.display())))?
        .len();

    if actual != expected {
        let _ = std::fs::remove_file(path);
        return Err(EngineError::FileSizeMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
