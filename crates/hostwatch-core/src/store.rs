use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::equipment::EquipmentGroup;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("equipment group {0} not found")]
    GroupNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed equipment document: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait EquipmentStore: Send + Sync {
    async fn find_group_by_service(
        &self,
        service_id: &str,
    ) -> Result<Option<EquipmentGroup>, StoreError>;
    async fn update_group(&self, group: &EquipmentGroup) -> Result<(), StoreError>;
    async fn list_groups(&self) -> Result<Vec<EquipmentGroup>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryEquipmentStore {
    groups: RwLock<Vec<EquipmentGroup>>,
}

impl MemoryEquipmentStore {
    pub fn new(groups: Vec<EquipmentGroup>) -> Self {
        Self {
            groups: RwLock::new(groups),
        }
    }
}

#[async_trait]
impl EquipmentStore for MemoryEquipmentStore {
    async fn find_group_by_service(
        &self,
        service_id: &str,
    ) -> Result<Option<EquipmentGroup>, StoreError> {
        let groups = self.groups.read().await;
        Ok(groups.iter().find(|g| g.owns_service(service_id)).cloned())
    }

    async fn update_group(&self, group: &EquipmentGroup) -> Result<(), StoreError> {
        let mut groups = self.groups.write().await;
        let slot = groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| StoreError::GroupNotFound(group.id.clone()))?;
        *slot = group.clone();
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<EquipmentGroup>, StoreError> {
        Ok(self.groups.read().await.clone())
    }
}

#[derive(Debug)]
pub struct FileEquipmentStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEquipmentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<EquipmentGroup>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, groups: &[EquipmentGroup]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(groups)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl EquipmentStore for FileEquipmentStore {
    async fn find_group_by_service(
        &self,
        service_id: &str,
    ) -> Result<Option<EquipmentGroup>, StoreError> {
        let groups = self.load().await?;
        Ok(groups.into_iter().find(|g| g.owns_service(service_id)))
    }

    async fn update_group(&self, group: &EquipmentGroup) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut groups = self.load().await?;
        let slot = groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| StoreError::GroupNotFound(group.id.clone()))?;
        *slot = group.clone();
        self.save(&groups).await
    }

    async fn list_groups(&self) -> Result<Vec<EquipmentGroup>, StoreError> {
        self.load().await
    }
}
