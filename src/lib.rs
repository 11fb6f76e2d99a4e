//! Рассылка обновлений данных по иерархическим топикам с областями.
//!
//! Публикатор один раз прогоняет топики обновления через конвейер
//! (пространство имён, затем раскрытие иерархии) и рассылает обновление
//! ровно в те каналы, которые записаны в его теле. Клиент строит свой набор
//! подписок тем же пространством имён и применяет только записи, чьи топики
//! с ним пересекаются.

/// Клиент: набор подписок, диспетчер, применение, цикл приёма.
pub mod client;
/// Загрузка настроек.
pub mod config;
/// Типы ошибок.
pub mod error;
/// Логирование (фильтры, форматирование, вывод).
pub mod logging;
/// Транспорт pub/sub и публикация.
pub mod pubsub;
/// Топики: грамматика, иерархия, пространства имён, конвейер.
pub mod topic;
/// Модель обновления и сетевое представление.
pub mod update;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use client::{
    ApplyEngine, DataStore, DispatchReport, DispatchStats, EntryOutcome, ListenerHandle,
    SubscriptionSet, UpdateDispatcher, UpdateListener,
};
pub use config::Settings;
pub use error::{
    ApplyError, ConfigError, DecodeError, PublishError, StatusCode, TopicError, TransportError,
};
pub use pubsub::{
    Broker, ChannelOutcome, DispatchStatus, FanoutPublisher, Message, PublishResult,
    RetryPolicy, RetryingTransport, Subscription, Transport, UpdatePublisher,
};
pub use topic::{
    channel_set_of, expand, namespace, ChannelSet, LegacyTopicMode, Namespacer, RoutedUpdate,
    ScopeId, ScopeMode, Topic, TopicPath, TopicTransform,
};
pub use update::{mask_credentials, DataSourceEntry, DataUpdate};
