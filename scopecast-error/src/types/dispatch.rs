use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки применения одной записи обновления на стороне клиента.
///
/// Не прерывают обработку соседних записей того же обновления.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("entry from '{url}' carries no inline data")]
    NoInlineData { url: String },

    #[error("destination '{dst_path}' rejected the entry: {reason}")]
    Rejected { dst_path: String, reason: String },
}

impl ErrorExt for ApplyError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoInlineData { .. } => StatusCode::InvalidData,
            Self::Rejected { .. } => StatusCode::ApplyRejected,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ошибка декодирования сообщения, пришедшего из транспорта.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed update payload on '{channel}': {reason}")]
pub struct DecodeError {
    pub channel: String,
    pub reason: String,
}

impl ErrorExt for DecodeError {
    fn status_code(&self) -> StatusCode {
        StatusCode::DecodingError
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", "decode".to_string()),
            ("status_code", self.status_code().to_string()),
            ("channel", self.channel.clone()),
        ]
    }
}
