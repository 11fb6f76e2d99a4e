use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::PublishError, topic::Topic};

/// Одна запись обновления: «получить содержимое по адресу, записать в путь
/// назначения, уведомить по набору топиков».
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceEntry {
    /// Адрес источника данных.
    pub url: String,
    /// Набор топиков (порядок вставки сохраняется, семантически — множество).
    #[serde(default)]
    pub topics: Vec<Topic>,
    /// Путь назначения у подписчика.
    pub dst_path: String,
    /// Данные, переданные прямо в сообщении.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Интервал периодического обновления, секунды.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic_update_interval: Option<u64>,
}

/// Обновление данных: записи плюс причина.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataUpdate {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub entries: Vec<DataSourceEntry>,
}

impl DataSourceEntry {
    pub fn new(
        url: impl Into<String>,
        dst_path: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            topics: Vec::new(),
            dst_path: dst_path.into(),
            data: None,
            periodic_update_interval: None,
        }
    }

    pub fn with_topics<I, T>(
        mut self,
        topics: I,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data(
        mut self,
        data: Value,
    ) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_periodic_update_interval(
        mut self,
        seconds: u64,
    ) -> Self {
        self.periodic_update_interval = Some(seconds);
        self
    }
}

impl DataUpdate {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(
        mut self,
        entry: DataSourceEntry,
    ) -> Self {
        self.entries.push(entry);
        self
    }

    /// Кодирует обновление для отправки в транспорт.
    pub fn encode(&self) -> Result<Bytes, PublishError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| PublishError::Serialization {
                reason: e.to_string(),
            })
    }

    /// Декодирует обновление, полученное из транспорта.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Тест проверяет сетевое представление: необязательные поля опускаются,
    /// топики — обычные строки.
    #[test]
    fn test_wire_format() {
        let update = DataUpdate::new("policy refresh").with_entry(
            DataSourceEntry::new("https://api/users", "/users")
                .with_topics(["svc1:data:policy_data"]),
        );

        let value: Value = serde_json::from_slice(&update.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "reason": "policy refresh",
                "entries": [{
                    "url": "https://api/users",
                    "topics": ["svc1:data:policy_data"],
                    "dst_path": "/users",
                }]
            })
        );
    }

    #[test]
    fn test_decode_full_entry() {
        let raw = br#"{
            "reason": "r",
            "entries": [{
                "url": "",
                "topics": ["a", "b"],
                "dst_path": "/x",
                "data": {"k": 1},
                "periodic_update_interval": 30
            }]
        }"#;
        let update = DataUpdate::decode(raw).unwrap();
        let entry = &update.entries[0];
        assert_eq!(entry.topics, vec![Topic::from("a"), Topic::from("b")]);
        assert_eq!(entry.data, Some(json!({"k": 1})));
        assert_eq!(entry.periodic_update_interval, Some(30));
    }

    #[test]
    fn test_decode_missing_topics_defaults_to_empty() {
        let raw = br#"{"entries": [{"url": "u", "dst_path": "/x"}]}"#;
        let update = DataUpdate::decode(raw).unwrap();
        assert!(update.reason.is_empty());
        assert!(update.entries[0].topics.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(DataUpdate::decode(b"not json").is_err());
    }
}
