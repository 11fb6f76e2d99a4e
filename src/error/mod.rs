//! Ошибки крейта.
//!
//! Доменные ошибки (топики, публикация, применение, конфигурация) живут в
//! `scopecast-error` вместе с [`StatusCode`]. Здесь переэкспорт и локальные
//! ошибки приёма сообщений из брокера.

pub mod pubsub;

pub use pubsub::{RecvError, TryRecvError};
pub use scopecast_error::{
    ApplyError, ConfigError, DecodeError, ErrorExt, PublishError, StatusCode, TopicError,
    TransportError,
};
