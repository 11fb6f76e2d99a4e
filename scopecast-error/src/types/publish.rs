use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode, TopicError};

/// Ошибки публикации обновления целиком.
///
/// Ошибки отдельных каналов сюда не попадают: они собираются в результат
/// публикации по каждому каналу.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("update rejected: {0}")]
    InvalidTopic(#[from] TopicError),

    #[error("update serialization failed: {reason}")]
    Serialization { reason: String },
}

impl ErrorExt for PublishError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidTopic(err) => err.status_code(),
            Self::Serialization { .. } => StatusCode::EncodingError,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::InvalidTopic(err) => format!("Invalid topic: {err}"),
            Self::Serialization { .. } => "Update format error".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", "publish".to_string()),
            ("status_code", self.status_code().to_string()),
        ]
    }
}

/// Ошибки транспортного адаптера при отправке в один канал.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport channel '{channel}' is closed")]
    Closed { channel: String },

    #[error("delivery to '{channel}' failed: {reason}")]
    Delivery { channel: String, reason: String },

    #[error("delivery to '{channel}' timed out")]
    Timeout { channel: String },
}

impl TransportError {
    pub fn channel(&self) -> &str {
        match self {
            Self::Closed { channel }
            | Self::Delivery { channel, .. }
            | Self::Timeout { channel } => channel,
        }
    }

    /// Имеет ли смысл повторить отправку.
    pub fn is_retryable(&self) -> bool {
        self.status_code().is_retryable()
    }
}

impl ErrorExt for TransportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Closed { .. } => StatusCode::ConnectionClosed,
            Self::Delivery { .. } => StatusCode::DeliveryFailed,
            Self::Timeout { .. } => StatusCode::Timeout,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", "transport".to_string()),
            ("status_code", self.status_code().to_string()),
            ("channel", self.channel().to_string()),
        ]
    }
}
