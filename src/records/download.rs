//! Fetching hosted files and writing them to disk

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::client::ClientError;
use crate::config::HttpConfig;
use crate::proto::{SharedProtocol, UrlProtocol};

/// GET `url` over the attached family protocol, or a fresh one when the
/// record was built outside a dispatch
pub(crate) async fn fetch(protocol: Option<&SharedProtocol>, url: &str) -> Result<Bytes, ClientError> {
    let attached = protocol.and_then(|shared| shared.as_any().downcast_ref::<UrlProtocol>());

    let bytes = match attached {
        Some(protocol) => protocol.download(url).await?,
        None => {
            UrlProtocol::new(url, "", &HttpConfig::default())?
                .download(url)
                .await?
        }
    };

    Ok(bytes)
}

/// `path` itself, or `path/name` when `path` is an existing directory
pub(crate) async fn target(path: &Path, name: &str) -> PathBuf {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => path.join(name),
        _ => path.to_path_buf(),
    }
}

/// Last path segment of `url`, without query or fragment
pub(crate) fn file_name(url: &str) -> &str {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    url.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or("download")
}

/// Write `data` to `path`, replacing or appending; returns the bytes written
pub(crate) async fn write(path: &Path, data: &[u8], append: bool) -> Result<u64, ClientError> {
    let io_error = |source| ClientError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .await
        .map_err(io_error)?;

    file.write_all(data).await.map_err(io_error)?;
    file.flush().await.map_err(io_error)?;

    debug!(path = %path.display(), size = data.len(), append, "File written");
    Ok(data.len() as u64)
}
