use std::{path::Path, time::Duration};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, TopicError},
    logging::LoggingConfig,
    pubsub::RetryPolicy,
    topic::{LegacyTopicMode, Namespacer, ScopeMode, TopicTransform},
};

/// Префикс переменных окружения: `SCOPECAST_SCOPE`, `SCOPECAST_RETRY__MAX_ATTEMPTS`.
pub const ENV_PREFIX: &str = "SCOPECAST";

/// Параметры повторов транспорта.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

/// Настройки публикатора и клиента.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Идентификатор области; `default` означает режим без области.
    pub scope: String,
    /// Вид данных во втором компоненте пространства имён.
    pub topic_kind: String,
    pub legacy_topic_mode: LegacyTopicMode,
    /// Сырые имена топиков, на которые подписан клиент.
    pub topics: Vec<String>,
    pub broker_capacity: usize,
    pub wait_for_completion: bool,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
            max_backoff_ms: 2000,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scope: "default".to_string(),
            topic_kind: "data".to_string(),
            legacy_topic_mode: LegacyTopicMode::default(),
            topics: vec!["policy_data".to_string()],
            broker_capacity: 1024,
            wait_for_completion: true,
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Загружает настройки только из окружения.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Значения по умолчанию, затем файл (формат по расширению), затем
    /// переменные окружения с префиксом `SCOPECAST`.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("topics")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let settings: Settings = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic_kind.trim().is_empty() {
            return Err(ConfigError::invalid("topic_kind", "must not be empty"));
        }
        if self.broker_capacity == 0 {
            return Err(ConfigError::invalid("broker_capacity", "must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be positive"));
        }
        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::invalid(
                "retry.base_backoff_ms",
                "must not exceed retry.max_backoff_ms",
            ));
        }
        self.scope_mode()
            .map_err(|e| ConfigError::invalid("scope", e.to_string()))?;
        self.logging.validate()
    }

    /// Единственное место, где строка области превращается в режим.
    pub fn scope_mode(&self) -> Result<ScopeMode, TopicError> {
        ScopeMode::from_scope_id(&self.scope)
    }

    /// Общий `Namespacer` для публикатора и набора подписок.
    pub fn namespacer(&self) -> Result<Namespacer, TopicError> {
        Namespacer::new(
            self.scope_mode()?,
            self.topic_kind.clone(),
            self.legacy_topic_mode,
        )
    }

    pub fn topic_transform(&self) -> Result<TopicTransform, TopicError> {
        self.namespacer().map(TopicTransform::new)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_backoff: Duration::from_millis(self.retry.base_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }
}
