//! One-way synchronization of a local invoice directory into S3.
//!
//! Each uploaded object carries a content hash in its metadata; on the
//! next run unchanged files are skipped and remote objects with no local
//! counterpart are removed, so the bucket prefix mirrors the directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::SyncError;

const HASH_METADATA_KEY: &str = "sha256";

/// What a sync run did, by object key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    pub deleted: Vec<String>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.uploaded.is_empty() && self.deleted.is_empty()
    }
}

/// Mirrors PDF files from a local directory into one bucket prefix.
#[derive(Debug, Clone)]
pub struct BucketSync {
    client: Client,
    bucket: String,
    prefix: String,
}

impl BucketSync {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Build from shared AWS configuration.
    pub fn from_config(
        config: &aws_config::SdkConfig,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self::new(Client::new(config), bucket, prefix)
    }

    /// Bucket this sync targets.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for a local file name under this sync's prefix.
    pub fn remote_key(&self, file_name: &str) -> String {
        if self.prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), file_name)
        }
    }

    /// Mirror the directory's PDF files into the bucket prefix.
    pub async fn sync(&self, dir: &Path) -> Result<SyncReport, SyncError> {
        let remote = self.remote_hashes().await?;
        let mut report = SyncReport::default();
        let mut local_keys = BTreeSet::new();

        for path in pdf_files(dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let key = self.remote_key(name);
            let hash = file_sha256(&path)?;
            local_keys.insert(key.clone());

            if remote.get(&key) == Some(&hash) {
                debug!(%key, "unchanged, skipping upload");
                report.skipped.push(key);
                continue;
            }

            let body = ByteStream::from_path(&path)
                .await
                .map_err(|e| SyncError::LocalRead {
                    path: path.display().to_string(),
                    source: std::io::Error::other(e),
                })?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(body)
                .metadata(HASH_METADATA_KEY, &hash)
                .send()
                .await
                .map_err(|e| SyncError::Service(e.to_string()))?;
            info!(%key, "uploaded");
            report.uploaded.push(key);
        }

        for key in remote.keys() {
            if local_keys.contains(key) {
                continue;
            }
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| SyncError::Service(e.to_string()))?;
            info!(%key, "deleted stale object");
            report.deleted.push(key.clone());
        }

        Ok(report)
    }

    /// Content hashes of every object under the prefix, from metadata.
    /// Objects uploaded without a hash map to an empty string and will
    /// always be re-uploaded.
    async fn remote_hashes(&self) -> Result<BTreeMap<String, String>, SyncError> {
        let mut hashes = BTreeMap::new();
        let mut token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(token)
                .send()
                .await
                .map_err(|e| SyncError::Service(e.to_string()))?;

            for object in resp.contents.unwrap_or_default() {
                let Some(key) = object.key else { continue };
                let head = self
                    .client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(&key)
                    .send()
                    .await
                    .map_err(|e| SyncError::Service(e.to_string()))?;
                let hash = head
                    .metadata
                    .and_then(|m| m.get(HASH_METADATA_KEY).cloned())
                    .unwrap_or_default();
                hashes.insert(key, hash);
            }

            match resp.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(hashes)
    }
}

fn pdf_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, SyncError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SyncError::LocalRead {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::LocalRead {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if path.is_file() && is_pdf {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Hex SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> Result<String, SyncError> {
    let data = std::fs::read(path).map_err(|e| SyncError::LocalRead {
        path: path.display().to_string(),
        source: e,
    })?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn remote_keys_join_prefix_and_name() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();
        let client = Client::from_conf(config);

        let sync = BucketSync::new(client.clone(), "bucket", "invoices/incoming");
        assert_eq!(sync.remote_key("a.pdf"), "invoices/incoming/a.pdf");

        let sync = BucketSync::new(client.clone(), "bucket", "invoices/");
        assert_eq!(sync.remote_key("a.pdf"), "invoices/a.pdf");

        let sync = BucketSync::new(client, "bucket", "");
        assert_eq!(sync.remote_key("a.pdf"), "a.pdf");
    }

    #[test]
    fn file_hash_is_stable_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        std::fs::write(&path, b"hello").unwrap();

        let hash = file_sha256(&path).unwrap();
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn pdf_listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"b").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();

        let files = pdf_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn empty_report_is_a_noop() {
        assert!(SyncReport::default().is_noop());
        let report = SyncReport {
            skipped: vec!["a.pdf".to_string()],
            ..SyncReport::default()
        };
        assert!(report.is_noop());
    }
}
