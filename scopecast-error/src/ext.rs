use std::{any::Any, error::Error};

use crate::StatusCode;

/// Расширение для ошибок библиотеки (object-safe).
///
/// Предоставляет вспомогательные методы для работы с ошибками:
/// - извлечение статус-кода,
/// - безопасное сообщение для клиента,
/// - детализированное сообщение для логов,
/// - формирование тегов для метрик.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Статус ошибки. По умолчанию [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Возвращает ошибку как [`Any`](std::any::Any) для downcast.
    fn as_any(&self) -> &dyn Any;

    /// Безопасное сообщение для клиента.
    ///
    /// Для внутренних ошибок возвращает `"Internal server error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Детализированное сообщение для логов.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Набор тегов для метрик.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Имя типа ошибки (для метрик или логирования).
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, DecodeError, TransportError};

    /// Ошибка с произвольным кодом для проверки поведения по умолчанию.
    #[derive(Debug, thiserror::Error)]
    #[error("{message}")]
    struct Coded {
        code: StatusCode,
        message: &'static str,
    }

    impl ErrorExt for Coded {
        fn status_code(&self) -> StatusCode {
            self.code
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_internal_errors_are_masked_for_clients() {
        let err = Coded {
            code: StatusCode::Internal,
            message: "pool exhausted at 0x7f",
        };
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.log_message().contains("pool exhausted"));
    }

    #[test]
    fn test_client_errors_keep_message() {
        let err = ConfigError::invalid("scope", "must not contain ':'");
        assert_eq!(err.client_message(), err.to_string());
    }

    #[test]
    fn test_default_metrics_tags() {
        let err = TransportError::Timeout {
            channel: "svc:data:x".to_string(),
        };
        let tags = ErrorExt::metrics_tags(&err);
        assert!(tags.iter().any(|(k, _)| *k == "status_code"));

        let err = Coded {
            code: StatusCode::Timeout,
            message: "slow",
        };
        let tags = err.metrics_tags();
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "error_type" && v == "Coded"));
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "status_code" && v.contains("6002")));
    }

    #[test]
    fn test_downcast_through_as_any() {
        let err: Box<dyn ErrorExt> = Box::new(DecodeError {
            channel: "c".to_string(),
            reason: "eof".to_string(),
        });
        assert!(err.as_any().downcast_ref::<DecodeError>().is_some());
    }
}
