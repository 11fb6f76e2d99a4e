use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки разбора и преобразования топиков.
///
/// Любая из них фатальна для одного вызова публикации: обновление отклоняется
/// целиком до какой-либо отправки в транспорт.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic is empty")]
    Empty,

    #[error("topic '{topic}' has an empty path segment at position {position}")]
    EmptySegment { topic: String, position: usize },

    #[error("topic '{topic}' has an empty namespace component")]
    EmptyNamespace { topic: String },

    #[error("topic '{topic}' contains forbidden character {ch:?}")]
    InvalidCharacter { topic: String, ch: char },

    #[error("topic '{topic}' already carries a namespace other than '{expected}'")]
    ForeignNamespace { topic: String, expected: String },

    #[error("invalid scope identifier '{scope}'")]
    InvalidScope { scope: String },

    #[error("invalid topic kind '{kind}'")]
    InvalidKind { kind: String },
}

impl TopicError {
    /// Топик, на котором произошла ошибка (если применимо).
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::EmptySegment { topic, .. }
            | Self::EmptyNamespace { topic }
            | Self::InvalidCharacter { topic, .. }
            | Self::ForeignNamespace { topic, .. } => Some(topic),
            Self::Empty | Self::InvalidScope { .. } | Self::InvalidKind { .. } => None,
        }
    }
}

impl ErrorExt for TopicError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ForeignNamespace { .. } => StatusCode::ForeignNamespace,
            Self::InvalidScope { .. } | Self::InvalidKind { .. } => StatusCode::InvalidScope,
            _ => StatusCode::InvalidTopic,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "topic".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Some(topic) = self.topic() {
            tags.push(("topic", topic.to_string()));
        }
        tags
    }
}
