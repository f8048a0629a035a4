use std::path::Path;

use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{RepoError, RepoResult};
use crate::core::http::build_http_client;

/// Lowercase hex SHA-1 of `bytes`.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-1 validated HTTP downloader.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(user_agent: &str) -> RepoResult<Self> {
        Ok(Self {
            client: build_http_client(user_agent)?,
        })
    }

    /// Download a single file to `dest`, optionally validating SHA-1.
    ///
    /// Creates parent directories as needed. Drops the file handle
    /// immediately after writing to avoid Windows OS Error 5.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> RepoResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RepoError::io(parent, e))?;
        }

        let bytes = self.get_bytes(url).await?;

        // Validate SHA-1 before writing (compute on the in-memory buffer)
        if let Some(expected) = sha1_expected {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(RepoError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        // Write to file inside a block to ensure the handle is dropped immediately
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| RepoError::io(dest, e))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| RepoError::io(dest, e))?;
            file.flush().await.map_err(|e| RepoError::io(dest, e))?;
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    /// Fetch a small text resource, `None` on any non-success status.
    pub async fn fetch_text(&self, url: &str) -> RepoResult<Option<String>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }

    async fn get_bytes(&self, url: &str) -> RepoResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::DownloadFailed {
                target: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
