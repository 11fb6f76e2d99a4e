//! Применение записей к хранилищу путей назначения.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use crate::{
    error::ApplyError,
    update::{mask_credentials, DataSourceEntry},
};

/// Внешний механизм применения/загрузки одной записи.
///
/// Реализация обязана быть идемпотентной: повторное применение той же
/// записи даёт то же содержимое пути назначения.
#[async_trait]
pub trait ApplyEngine: Send + Sync + 'static {
    async fn apply(
        &self,
        entry: &DataSourceEntry,
    ) -> Result<(), ApplyError>;
}

/// Хранилище путей назначения в памяти.
///
/// Запись с данными в сообщении перезаписывает путь целиком. Загрузка по
/// адресу не поддерживается: такая запись отклоняется с
/// [`ApplyError::NoInlineData`].
#[derive(Debug, Default)]
pub struct DataStore {
    paths: RwLock<BTreeMap<String, Value>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        dst_path: &str,
    ) -> Option<Value> {
        self.paths.read().get(dst_path).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.paths.read().clone()
    }

    pub fn len(&self) -> usize {
        self.paths.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.read().is_empty()
    }
}

#[async_trait]
impl ApplyEngine for DataStore {
    async fn apply(
        &self,
        entry: &DataSourceEntry,
    ) -> Result<(), ApplyError> {
        let Some(data) = entry.data.as_ref() else {
            return Err(ApplyError::NoInlineData {
                url: mask_credentials(&entry.url),
            });
        };
        if entry.dst_path.is_empty() {
            return Err(ApplyError::Rejected {
                dst_path: entry.dst_path.clone(),
                reason: "destination path is empty".to_string(),
            });
        }

        self.paths
            .write()
            .insert(entry.dst_path.clone(), data.clone());
        trace!(dst_path = %entry.dst_path, "Entry applied");
        Ok(())
    }
}
