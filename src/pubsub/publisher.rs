//! Публикация обновлений: преобразование топиков и рассылка по каналам.
//!
//! [`UpdatePublisher`] — единственное место, где вызывается
//! [`TopicTransform::apply`]. [`FanoutPublisher`] принимает только
//! [`RoutedUpdate`], поэтому набор каналов нельзя вычислить из другого
//! представления топиков, чем то, что лежит в теле сообщения.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Transport;
use crate::{
    error::{ErrorExt, PublishError, TransportError},
    topic::{channel_set_of, RoutedUpdate, ScopeMode, Topic, TopicTransform},
    update::DataUpdate,
};

/// Итог отправки в один канал.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Транспорт принял сообщение.
    Delivered { receivers: usize },
    /// Отправка не удалась (после повторов адаптера, если они есть).
    Failed { reason: String },
    /// Отправка запланирована, результат не ожидался.
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    pub channel: Topic,
    #[serde(flatten)]
    pub status: DispatchStatus,
}

/// Результат одной публикации, по каналу на запись.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub outcomes: Vec<ChannelOutcome>,
}

/// Рассылка готового обновления по его набору каналов.
#[derive(Clone)]
pub struct FanoutPublisher {
    transport: Arc<dyn Transport>,
}

/// Оркестратор публикации: конвейер топиков, затем рассылка.
#[derive(Clone)]
pub struct UpdatePublisher {
    transform: TopicTransform,
    fanout: FanoutPublisher,
}

////////////////////////////////////////////////////////////////////////////////
// PublishResult
////////////////////////////////////////////////////////////////////////////////

impl PublishResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn delivered(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DispatchStatus::Delivered { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DispatchStatus::Failed { .. }))
    }

    /// Все каналы подтвердили доставку.
    pub fn is_complete_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.status, DispatchStatus::Delivered { .. }))
    }

    pub fn outcome(
        &self,
        channel: &str,
    ) -> Option<&DispatchStatus> {
        self.outcomes
            .iter()
            .find(|o| o.channel.as_str() == channel)
            .map(|o| &o.status)
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Delivered { receivers } => write!(f, "delivered to {receivers} receiver(s)"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::Scheduled => f.write_str("scheduled"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// FanoutPublisher
////////////////////////////////////////////////////////////////////////////////

type Dispatch = (Topic, JoinHandle<Result<usize, TransportError>>);

impl FanoutPublisher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Рассылает обновление в каждый канал набора ровно один раз.
    ///
    /// Тело кодируется один раз, все каналы получают одни и те же байты.
    /// Отправки независимы: ошибка одного канала не мешает остальным. При
    /// `wait_for_completion` дожидается всех отправок, иначе возвращает
    /// `Scheduled` сразу после постановки задач.
    pub async fn publish(
        &self,
        routed: RoutedUpdate,
        wait_for_completion: bool,
    ) -> Result<PublishResult, PublishError> {
        let (update, channels) = routed.into_parts();
        debug_assert_eq!(
            channels,
            channel_set_of(&update),
            "channel set diverged from payload topics"
        );

        if channels.is_empty() {
            warn!(reason = %update.reason, "Update has no routable topics, nothing published");
            return Ok(PublishResult::default());
        }

        let payload = update.encode()?;
        let dispatches: Vec<Dispatch> = channels
            .iter()
            .map(|channel| (channel.clone(), self.spawn_send(channel, payload.clone())))
            .collect();

        debug!(
            reason = %update.reason,
            channels = dispatches.len(),
            bytes = payload.len(),
            "Update dispatched"
        );

        if wait_for_completion {
            let outcomes = collect_outcomes(dispatches).await;
            return Ok(PublishResult { outcomes });
        }

        let outcomes = dispatches
            .iter()
            .map(|(channel, _)| ChannelOutcome {
                channel: channel.clone(),
                status: DispatchStatus::Scheduled,
            })
            .collect();
        tokio::spawn(async move {
            collect_outcomes(dispatches).await;
        });
        Ok(PublishResult { outcomes })
    }

    fn spawn_send(
        &self,
        channel: &Topic,
        payload: Bytes,
    ) -> JoinHandle<Result<usize, TransportError>> {
        let transport = Arc::clone(&self.transport);
        let channel = channel.clone();
        tokio::spawn(async move { transport.send(channel.as_str(), payload).await })
    }
}

/// Барьер над независимыми отправками; неудачи логируются по каналам.
async fn collect_outcomes(dispatches: Vec<Dispatch>) -> Vec<ChannelOutcome> {
    let mut outcomes = Vec::with_capacity(dispatches.len());
    for (channel, handle) in dispatches {
        let status = match handle.await {
            Ok(Ok(receivers)) => DispatchStatus::Delivered { receivers },
            Ok(Err(err)) => {
                warn!(
                    channel = %channel,
                    code = %err.status_code(),
                    error = %err,
                    "Channel dispatch failed"
                );
                DispatchStatus::Failed {
                    reason: err.to_string(),
                }
            }
            Err(join) => {
                warn!(channel = %channel, error = %join, "Channel dispatch task aborted");
                DispatchStatus::Failed {
                    reason: join.to_string(),
                }
            }
        };
        outcomes.push(ChannelOutcome { channel, status });
    }
    outcomes
}

////////////////////////////////////////////////////////////////////////////////
// UpdatePublisher
////////////////////////////////////////////////////////////////////////////////

impl UpdatePublisher {
    pub fn new(
        transform: TopicTransform,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transform,
            fanout: FanoutPublisher::new(transport),
        }
    }

    pub fn transform(&self) -> &TopicTransform {
        &self.transform
    }

    /// Публикует обновление с сырыми топиками в области публикатора.
    pub async fn publish(
        &self,
        update: DataUpdate,
        wait_for_completion: bool,
    ) -> Result<PublishResult, PublishError> {
        self.publish_with(&self.transform, update, wait_for_completion)
            .await
    }

    /// Публикует обновление в указанной области (вид данных и старый режим
    /// берутся у публикатора).
    pub async fn publish_for_scope(
        &self,
        scope: &ScopeMode,
        update: DataUpdate,
        wait_for_completion: bool,
    ) -> Result<PublishResult, PublishError> {
        let transform = self.transform.for_scope(scope.clone());
        self.publish_with(&transform, update, wait_for_completion)
            .await
    }

    async fn publish_with(
        &self,
        transform: &TopicTransform,
        update: DataUpdate,
        wait_for_completion: bool,
    ) -> Result<PublishResult, PublishError> {
        let reason = update.reason.clone();
        let routed = transform.apply(update).map_err(|err| {
            error!(
                scope = %transform.namespacer().mode(),
                reason = %reason,
                code = %err.status_code(),
                error = %err,
                "Publish aborted: malformed topic"
            );
            PublishError::from(err)
        })?;

        let result = self.fanout.publish(routed, wait_for_completion).await?;
        info!(
            scope = %transform.namespacer().mode(),
            reason = %reason,
            channels = result.len(),
            failed = result.failed().count(),
            "Update published"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        pubsub::{Broker, Subscription},
        topic::{LegacyTopicMode, Namespacer},
        update::DataSourceEntry,
    };

    /// Транспорт, отклоняющий один канал.
    struct RejectOne {
        broker: Broker,
        rejected: &'static str,
    }

    #[async_trait]
    impl Transport for RejectOne {
        async fn send(
            &self,
            channel: &str,
            payload: Bytes,
        ) -> Result<usize, TransportError> {
            if channel == self.rejected {
                return Err(TransportError::Delivery {
                    channel: channel.to_string(),
                    reason: "refused".to_string(),
                });
            }
            Transport::send(&self.broker, channel, payload).await
        }

        fn subscribe(
            &self,
            channel: &str,
        ) -> Subscription {
            self.broker.subscribe(channel)
        }
    }

    fn publisher(
        scope: &str,
        transport: Arc<dyn Transport>,
    ) -> UpdatePublisher {
        let mode = ScopeMode::from_scope_id(scope).unwrap();
        let ns = Namespacer::new(mode, "data", LegacyTopicMode::Bare).unwrap();
        UpdatePublisher::new(TopicTransform::new(ns), transport)
    }

    fn update(topics: &[&str]) -> DataUpdate {
        DataUpdate::new("test").with_entry(
            DataSourceEntry::new("https://src", "/dst").with_topics(topics.iter().copied()),
        )
    }

    #[tokio::test]
    async fn test_publish_reaches_every_channel_with_same_bytes() {
        let broker = Arc::new(Broker::new(8));
        let mut root = broker.subscribe("s:data:a");
        let mut leaf = broker.subscribe("s:data:a/b");

        let result = publisher("s", broker.clone())
            .publish(update(&["a/b"]), true)
            .await
            .unwrap();

        assert!(result.is_complete_success());
        assert_eq!(result.len(), 2);
        let m1 = root.recv().await.unwrap();
        let m2 = leaf.recv().await.unwrap();
        assert_eq!(m1.payload, m2.payload);

        let decoded = DataUpdate::decode(&m1.payload).unwrap();
        assert_eq!(
            decoded.entries[0].topics,
            vec![Topic::from("s:data:a"), Topic::from("s:data:a/b")]
        );
    }

    /// Проверяет, что отказ одного канала не мешает другим.
    #[tokio::test]
    async fn test_channel_failure_is_isolated() {
        let transport = Arc::new(RejectOne {
            broker: Broker::new(8),
            rejected: "s:data:a",
        });
        let mut leaf = transport.subscribe("s:data:a/b");

        let result = publisher("s", transport.clone())
            .publish(update(&["a/b"]), true)
            .await
            .unwrap();

        assert!(!result.is_complete_success());
        assert_eq!(result.failed().count(), 1);
        assert!(matches!(
            result.outcome("s:data:a"),
            Some(DispatchStatus::Failed { .. })
        ));
        assert_eq!(
            result.outcome("s:data:a/b"),
            Some(&DispatchStatus::Delivered { receivers: 1 })
        );
        assert!(leaf.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_no_wait_returns_scheduled() {
        let broker = Arc::new(Broker::new(8));
        let mut sub = broker.subscribe("s:data:x");

        let result = publisher("s", broker.clone())
            .publish(update(&["x"]), false)
            .await
            .unwrap();

        assert_eq!(result.outcome("s:data:x"), Some(&DispatchStatus::Scheduled));
        assert!(!result.is_complete_success());
        assert!(sub.recv().await.is_ok());
    }

    /// Проверяет, что некорректный топик отклоняет публикацию до отправки.
    #[tokio::test]
    async fn test_malformed_topic_publishes_nothing() {
        let broker = Arc::new(Broker::new(8));
        let mut sub = broker.subscribe("s:data:ok");

        let err = publisher("s", broker.clone())
            .publish(update(&["ok", "bad//x"]), true)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::InvalidTopic(_)));
        assert_eq!(broker.publish_count.load(std::sync::atomic::Ordering::Relaxed), 0);
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_for_scope_overrides_scope() {
        let broker = Arc::new(Broker::new(8));
        let mut sub = broker.subscribe("tenant9:data:x");

        publisher("default", broker.clone())
            .publish_for_scope(&ScopeMode::scoped("tenant9").unwrap(), update(&["x"]), true)
            .await
            .unwrap();

        assert!(sub.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_unroutable_update_publishes_nothing() {
        let broker = Arc::new(Broker::new(8));
        let result = publisher("s", broker.clone())
            .publish(update(&[]), true)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(broker.publish_count.load(std::sync::atomic::Ordering::Relaxed), 0);
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = ChannelOutcome {
            channel: Topic::from("s:data:x"),
            status: DispatchStatus::Delivered { receivers: 2 },
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"channel": "s:data:x", "status": "delivered", "receivers": 2})
        );
    }
}
