use crate::domain::model::CredentialPair;
use crate::domain::ports::CredentialStore;
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

/// 檔案中的儲存格式
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredentials {
    #[serde(flatten)]
    credentials: CredentialPair,
    updated_at: DateTime<Utc>,
}

/// 以 JSON 檔案保存憑證，重新啟動後仍然有效
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// 最後一次寫入的時間
    pub async fn updated_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read_stored().await?.map(|stored| stored.updated_at))
    }

    async fn read_stored(&self) -> Result<Option<StoredCredentials>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GatewayError::IoError(e)),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| GatewayError::CredentialStoreError {
                message: format!("Corrupt credentials file {}: {}", self.path.display(), e),
            })
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Option<CredentialPair>> {
        Ok(self.read_stored().await?.map(|stored| stored.credentials))
    }

    async fn set(&self, credentials: &CredentialPair) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let stored = StoredCredentials {
            credentials: credentials.clone(),
            updated_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&stored)?;

        // 先寫暫存檔再改名，避免中途失敗留下半份檔案
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &data).await?;
        restrict_permissions(&temp_path).await;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::debug!("🔐 Credentials written to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("🔐 Credentials removed from {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::IoError(e)),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let permissions = std::fs::Permissions::from_mode(0o600);
    if let Err(e) = tokio::fs::set_permissions(path, permissions).await {
        tracing::warn!(
            "⚠️ Failed to tighten permissions on {}: {}",
            path.display(),
            e
        );
    }
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) {}

/// 只存在記憶體中的憑證儲存
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<Option<CredentialPair>>,
    writes: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: CredentialPair) -> Self {
        Self {
            credentials: RwLock::new(Some(credentials)),
            writes: AtomicUsize::new(0),
        }
    }

    /// `set` 被呼叫的次數
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<CredentialPair>> {
        Ok(self.credentials.read().await.clone())
    }

    async fn set(&self, credentials: &CredentialPair) -> Result<()> {
        *self.credentials.write().await = Some(credentials.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.credentials.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_round_trip_survives_new_instance() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("credentials.json");

        let store = FileCredentialStore::new(&path);
        assert!(store.get().await.unwrap().is_none());

        let pair = CredentialPair::new("access-1", "refresh-1");
        store.set(&pair).await.unwrap();
        assert!(store.updated_at().await.unwrap().is_some());

        // 模擬重新啟動
        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.get().await.unwrap(), Some(pair));
        assert!(!reopened.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_clear_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(temp_dir.path().join("credentials.json"));

        store.clear().await.unwrap();
        store.set(&CredentialPair::new("a", "r")).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_reports_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(matches!(
            store.get().await,
            Err(GatewayError::CredentialStoreError { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        let store = FileCredentialStore::new(&path);
        store.set(&CredentialPair::new("a", "r")).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_memory_store_counts_writes() {
        let store = MemoryCredentialStore::with_credentials(CredentialPair::new("a", "r"));
        assert_eq!(store.writes(), 0);

        store.set(&CredentialPair::new("b", "r")).await.unwrap();
        assert_eq!(store.writes(), 1);
        assert_eq!(store.get().await.unwrap().unwrap().access_token, "b");

        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
    }
}
