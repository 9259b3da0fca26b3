use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;

use super::{LogKind, LogStore};

const LIVE_SUFFIX: &str = ".log";
const ARCHIVE_SUFFIX: &str = ".gz.b64";

/// Logs kept as files in one directory.
///
/// Live logs are `<name>.log`, one JSON document per line. Archives are the
/// gzip of a live log, base64-encoded, stored as `<archive>.gz.b64`.
///
/// Appends to a log are serialized with its compression and truncation, and
/// truncation only drops the bytes the last compression archived. Lines
/// appended between the two steps stay in the live log.
pub struct FileLogStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Length of each live log as of its last successful compression
    archived: Mutex<HashMap<String, u64>>,
}

impl FileLogStore {
    /// Use `dir` for logs, creating it when missing
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating log directory {}", dir.display()))?;
        Ok(Self { dir, locks: Mutex::default(), archived: Mutex::default() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    fn live_path(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.dir.join(format!("{name}{LIVE_SUFFIX}")))
    }

    fn archive_path(&self, archive: &str) -> Result<PathBuf> {
        check_name(archive)?;
        Ok(self.dir.join(format!("{archive}{ARCHIVE_SUFFIX}")))
    }
}

/// Names become file names, so keep them inside the log directory.
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        bail!("invalid log name {name:?}");
    }
    Ok(())
}

fn gzip_base64(content: &[u8]) -> Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    Ok(STANDARD.encode(encoder.finish()?))
}

fn unbase64_gunzip(encoded: &str) -> Result<String> {
    let compressed = STANDARD.decode(encoded.trim()).context("archive is not valid base64")?;
    let mut content = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut content)
        .context("archive is not valid gzip")?;
    Ok(content)
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, name: &str, line: &str) -> Result<()> {
        let path = self.live_path(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn list(&self, kind: LogKind) -> Result<Vec<String>> {
        let suffix = match kind {
            LogKind::Live => LIVE_SUFFIX,
            LogKind::Archived => ARCHIVE_SUFFIX,
        };

        let mut entries = fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|f| f.strip_suffix(suffix)) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn compress(&self, name: &str, archive: &str) -> Result<bool> {
        let source = self.live_path(name)?;
        let destination = self.archive_path(archive)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let content = fs::read(&source)
            .await
            .with_context(|| format!("reading {}", source.display()))?;
        if content.is_empty() {
            return Ok(false);
        }
        let encoded = gzip_base64(&content)?;

        // create_new: never overwrite an earlier archive
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await
            .with_context(|| format!("creating {}", destination.display()))?;
        file.write_all(encoded.as_bytes()).await?;
        file.sync_all().await?;

        self.archived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), content.len() as u64);
        Ok(true)
    }

    async fn decompress(&self, archive: &str) -> Result<String> {
        let path = self.archive_path(archive)?;
        let encoded = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        unbase64_gunzip(&encoded)
    }

    async fn truncate(&self, name: &str) -> Result<()> {
        let path = self.live_path(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let archived = self.archived.lock().unwrap_or_else(PoisonError::into_inner).remove(name);
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;

        let keep = match archived {
            Some(archived) => {
                let content = fs::read(&path).await?;
                content.get(archived as usize..).map(<[u8]>::to_vec).unwrap_or_default()
            }
            None => Vec::new(),
        };

        // Lines appended after the last compression move to the front.
        file.write_all(&keep).await?;
        file.set_len(keep.len() as u64).await?;
        file.flush().await?;
        Ok(())
    }
}
