//! Attachment bytes on the local filesystem.
//!
//! Layout is `{root}/{id}/{filename}`: one directory per attachment so the
//! original filename can be kept without collisions.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ephemera_core::{ByteStream, DomainError, DomainResult, FileStore, StoredFile, StoredFileInfo};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const ID_LEN: usize = 16;
const FALLBACK_FILENAME: &str = "file";

/// Last path component of a client-supplied filename
fn sanitize_filename(filename: &str) -> &str {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match name {
        "" | "." | ".." => FALLBACK_FILENAME,
        name => name,
    }
}

fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn new_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete everything under the root, leaving the root itself in place
    pub async fn purge(&self) -> DomainResult<usize> {
        fs::create_dir_all(&self.root).await?;

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to purge entry"),
            }
        }

        tracing::info!(root = %self.root.display(), removed, "Purged file storage");
        Ok(removed)
    }

    fn attachment_dir(&self, id: &str) -> DomainResult<PathBuf> {
        if is_valid_id(id) {
            Ok(self.root.join(id))
        } else {
            Err(DomainError::AttachmentNotFound(id.to_string()))
        }
    }

    /// Reserve a fresh attachment directory
    async fn create_dir(&self) -> DomainResult<(String, PathBuf)> {
        fs::create_dir_all(&self.root).await?;
        loop {
            let id = new_id();
            let dir = self.root.join(&id);
            match fs::create_dir(&dir).await {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn copy_into(path: &Path, mut reader: ByteStream) -> std::io::Result<u64> {
        let mut file = fs::File::create(path).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write(&self, filename: &str, reader: ByteStream) -> DomainResult<StoredFileInfo> {
        let (id, dir) = self.create_dir().await?;
        let path = dir.join(sanitize_filename(filename));

        match Self::copy_into(&path, reader).await {
            Ok(bytes) => {
                tracing::debug!(attachment_id = %id, bytes, "Stored attachment");
                Ok(StoredFileInfo {
                    id,
                    location: path.display().to_string(),
                })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                    tracing::warn!(attachment_id = %id, error = %cleanup, "Failed to remove partial upload");
                }
                Err(DomainError::storage(e))
            }
        }
    }

    async fn read(&self, id: &str) -> DomainResult<StoredFile> {
        let dir = self.attachment_dir(id)?;
        let not_found = || DomainError::AttachmentNotFound(id.to_string());

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        let entry = entries.next_entry().await?.ok_or_else(not_found)?;
        let filename = entry.file_name().to_string_lossy().into_owned();
        let file = fs::File::open(entry.path()).await?;

        Ok(StoredFile {
            filename,
            reader: Box::pin(file),
        })
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        let dir = self.attachment_dir(id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DomainError::AttachmentNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
