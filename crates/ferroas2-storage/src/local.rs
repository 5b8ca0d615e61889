use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use ferroas2_core::models::message::STATUS_PENDING;
use ferroas2_core::models::{
    IncomingAsyncMdn, IncomingFileMessage, IncomingSyncMdn, OutgoingFileMessage,
    PendingMdnInfoFile, ReplyMdn,
};
use ferroas2_core::validation::is_blank;
use ferroas2_core::Directories;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;

use crate::keys::{file_name_for, unique_path};
use crate::traits::{As2Store, StorageError, StorageResult};

const MDN_SUFFIX: &str = ".mdn.json";
const PENDING_INFO_SUFFIX: &str = ".json";

/// Filesystem store. Every operation runs under one lock.
pub struct FileSystemStore {
    dirs: Directories,
    lock: Mutex<()>,
}

impl FileSystemStore {
    pub fn new(dirs: Directories) -> Self {
        Self {
            dirs,
            lock: Mutex::new(()),
        }
    }

    pub fn directories(&self) -> &Directories {
        &self.dirs
    }

    fn pending_info_path(&self, message_id: &str) -> StorageResult<PathBuf> {
        Ok(self
            .dirs
            .pending_mdn_info
            .join(file_name_for(message_id, PENDING_INFO_SUFFIX)?))
    }

    async fn write_mdn<T: Serialize>(&self, key: &str, mdn: &T) -> StorageResult<PathBuf> {
        let path = self.dirs.mdn.join(file_name_for(key, MDN_SUFFIX)?);
        let _guard = self.lock.lock().await;
        write_json(&path, mdn).await?;
        tracing::info!(path = %path.display(), message_id = %key, "Saved MDN");
        Ok(path)
    }

    async fn read_pending(&self, message_id: &str) -> StorageResult<(PathBuf, PendingMdnInfoFile)> {
        let path = self.pending_info_path(message_id)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!(
                    "no pending MDN record for {}",
                    message_id
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let info: PendingMdnInfoFile = serde_json::from_slice(&data)?;
        Ok((path, info))
    }
}

async fn ensure_dir(dir: &Path) -> StorageResult<()> {
    if !fs::try_exists(dir).await? {
        tracing::debug!(dir = %dir.display(), "Creating directory");
        fs::create_dir_all(dir).await?;
    }
    Ok(())
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    fs::write(path, json).await.map_err(|e| {
        StorageError::SaveFailed(format!("Failed to write {}: {}", path.display(), e))
    })
}

/// Rename, falling back to copy and delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> StorageResult<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs::copy(from, to).await.map_err(|e| {
        StorageError::SaveFailed(format!(
            "Failed to move {} to {}: {}",
            from.display(),
            to.display(),
            e
        ))
    })?;
    fs::remove_file(from).await?;
    Ok(())
}

fn last_component(path: &Path) -> StorageResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StorageError::InvalidKey(format!("{} has no file name", path.display())))
}

#[async_trait]
impl As2Store for FileSystemStore {
    #[tracing::instrument(skip(self, msg, data), fields(message_id = %msg.message_id, size_bytes = data.len()))]
    async fn save_incoming_file(
        &self,
        msg: &IncomingFileMessage,
        data: &[u8],
    ) -> StorageResult<PathBuf> {
        let requested = if is_blank(&msg.file_name) {
            &msg.message_id
        } else {
            &msg.file_name
        };
        let file_name = file_name_for(requested, "")?;
        let dir = self.dirs.inbox.join(file_name_for(msg.sender_id(), "")?);

        let start = Instant::now();
        let _guard = self.lock.lock().await;
        ensure_dir(&dir).await?;
        let path = unique_path(&dir, &file_name).await?;
        fs::write(&path, data).await.map_err(|e| {
            StorageError::SaveFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            partner = %msg.sender_id(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Saved received file"
        );
        Ok(path)
    }

    async fn save_reply_mdn(&self, mdn: &ReplyMdn) -> StorageResult<PathBuf> {
        self.write_mdn(&mdn.attributes.original_message_id, mdn).await
    }

    async fn save_sync_mdn(&self, mdn: &IncomingSyncMdn) -> StorageResult<PathBuf> {
        self.write_mdn(&mdn.message_id, mdn).await
    }

    async fn save_async_mdn(&self, mdn: &IncomingAsyncMdn) -> StorageResult<PathBuf> {
        self.write_mdn(&mdn.attributes.original_message_id, mdn).await
    }

    #[tracing::instrument(skip(self, msg), fields(message_id = %msg.message_id))]
    async fn save_pending_mdn(&self, msg: &mut OutgoingFileMessage) -> StorageResult<()> {
        let info_file = self.pending_info_path(&msg.message_id)?;
        let file_name = last_component(&msg.file_path)?;

        let _guard = self.lock.lock().await;
        ensure_dir(&self.dirs.pending_mdn).await?;
        let data_file = unique_path(&self.dirs.pending_mdn, &file_name).await?;

        let record = PendingMdnInfoFile {
            original_file: msg.file_path.clone(),
            pending_file: data_file.clone(),
            outgoing_mic: msg.outgoing_mic.clone(),
        };
        write_json(&info_file, &record).await?;
        move_file(&msg.file_path, &data_file).await?;

        tracing::debug!(
            info_file = %info_file.display(),
            data_file = %data_file.display(),
            "Stored pending MDN info"
        );
        msg.pending_info.info_file = Some(info_file);
        msg.pending_info.data_file = Some(data_file);
        msg.status = STATUS_PENDING.to_string();
        Ok(())
    }

    async fn load_pending_mdn(&self, message_id: &str) -> StorageResult<PendingMdnInfoFile> {
        let _guard = self.lock.lock().await;
        self.read_pending(message_id).await.map(|(_, info)| info)
    }

    async fn delete_pending_mdn(&self, message_id: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let (info_path, info) = self.read_pending(message_id).await?;

        tracing::info!(
            info_file = %info_path.display(),
            pending_file = %info.pending_file.display(),
            message_id = %message_id,
            "Deleting pending MDN record"
        );
        fs::remove_file(&info_path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("{}: {}", info_path.display(), e))
        })?;
        match fs::remove_file(&info.pending_file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pending_file = %info.pending_file.display(),
                    "Pending file already gone"
                );
                Ok(())
            }
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "{}: {}",
                info.pending_file.display(),
                e
            ))),
        }
    }

    #[tracing::instrument(skip(self, msg), fields(message_id = %msg.message_id))]
    async fn archive_sent_file(&self, msg: &OutgoingFileMessage) -> StorageResult<PathBuf> {
        let file_name = last_component(&msg.file_path)?;
        let dir = self.dirs.sent.join(file_name_for(&msg.receiver_id, "")?);

        let _guard = self.lock.lock().await;
        ensure_dir(&dir).await?;
        let target = unique_path(&dir, &file_name).await?;
        move_file(&msg.file_path, &target).await?;

        tracing::info!(
            from = %msg.file_path.display(),
            to = %target.display(),
            partner = %msg.receiver_id,
            "Archived sent file"
        );
        Ok(target)
    }
}
