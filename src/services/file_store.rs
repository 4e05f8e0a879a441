//! FileStore — attachment blobs on local disk.
//!
//! Blobs live beneath `base_path/{shard}/{shard}/{stored_name}` where the two
//! shard levels are derived from the stored name, keeping per-directory file
//! counts low. The stored name is always generated server-side
//! (`{uuid}.{ext}`); the uploader's display name is metadata only and never
//! touches the filesystem path.

use crate::models::quote::FileEntry;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Per-file upload cap; uploads block the requesting connection, so this
/// bounds request duration.
pub const MAX_FILE_SIZE: i64 = 10 * 1024 * 1024;

/// Maximum number of files accepted in one multipart request.
pub const MAX_FILES_PER_REQUEST: usize = 10;

/// Spreadsheet uploads only.
const ALLOWED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file `{0}` exceeds the {limit} MB limit", limit = MAX_FILE_SIZE / 1024 / 1024)]
    FileTooLarge(String),
    #[error("file `{0}` is not a supported spreadsheet (.xlsx, .xls)")]
    UnsupportedFileType(String),
    #[error("invalid file name")]
    InvalidFileName,
    #[error("stored blob `{0}` is missing")]
    BlobMissing(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Disk-backed blob store for quote attachments.
#[derive(Clone, Debug)]
pub struct FileStore {
    /// Base directory on disk where attachment payloads are stored.
    pub base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Validate an uploader-supplied display name and return its extension.
    ///
    /// Rejects empty names, path separators, control bytes, and anything
    /// that is not a spreadsheet.
    fn checked_extension(display_name: &str) -> StoreResult<&str> {
        if display_name.is_empty()
            || display_name.contains('/')
            || display_name.contains('\\')
            || display_name.contains("..")
            || display_name.bytes().any(|b| b.is_ascii_control())
        {
            return Err(StoreError::InvalidFileName);
        }
        let ext = display_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("");
        if ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        {
            Ok(ext)
        } else {
            Err(StoreError::UnsupportedFileType(display_name.to_string()))
        }
    }

    /// Two-level shard identifiers for a stored name: the first two bytes of
    /// its MD5 digest as lowercase hex.
    fn shards(stored_name: &str) -> (String, String) {
        let digest = md5::compute(stored_name);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn blob_path(&self, stored_name: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(stored_name);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(stored_name);
        path
    }

    /// Stream one upload to disk and return its metadata entry.
    ///
    /// Writes incrementally to a temporary file, enforcing the size cap while
    /// streaming, then fsyncs and atomically renames into place. Temp files
    /// are cleaned up on any failure.
    pub async fn save_stream<S>(&self, display_name: &str, data: S) -> StoreResult<FileEntry>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let ext = Self::checked_extension(display_name)?;
        let stored_name = format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase());

        let file_path = self.blob_path(&stored_name);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::other("blob path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        pin_mut!(data);
        while let Some(chunk_res) = data.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            if size_bytes > MAX_FILE_SIZE {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::FileTooLarge(display_name.to_string()));
            }
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        Ok(FileEntry {
            stored_name,
            display_name: display_name.to_string(),
            size_bytes,
            uploaded_at: Utc::now(),
        })
    }

    /// Convenience wrapper for uploads already buffered in memory.
    pub async fn save_bytes(&self, display_name: &str, data: Bytes) -> StoreResult<FileEntry> {
        self.save_stream(display_name, stream::once(async { Ok(data) }))
            .await
    }

    /// Open a blob for streaming out, returning the handle and its length.
    pub async fn open(&self, stored_name: &str) -> StoreResult<(File, i64)> {
        let path = self.blob_path(stored_name);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::BlobMissing(stored_name.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len() as i64;
        Ok((file, len))
    }

    /// Read a whole blob into memory; used for archive assembly, which is
    /// bounded by the per-file and per-request caps.
    pub async fn read(&self, stored_name: &str) -> StoreResult<Vec<u8>> {
        let path = self.blob_path(stored_name);
        fs::read(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::BlobMissing(stored_name.to_string())
            } else {
                StoreError::Io(err)
            }
        })
    }

    /// Remove a blob and prune any now-empty shard directories.
    ///
    /// A missing blob is not an error; deletion is idempotent.
    pub async fn delete(&self, stored_name: &str) -> StoreResult<()> {
        let path = self.blob_path(stored_name);
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed blob {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob {} already missing", path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    /// Recursively remove empty shard directories up to the base path.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}
