use std::sync::Arc;

use tokio::sync::broadcast;

use super::Message;
use crate::error::{RecvError, TryRecvError};

/// Подписка на конкретный канал по имени.
///
/// Отписка происходит автоматически при `Drop`.
pub struct Subscription {
    /// Название канала, на который подписаны.
    pub channel: Arc<str>,
    inner: broadcast::Receiver<Message>,
}

impl Subscription {
    pub(crate) fn new(
        channel: Arc<str>,
        inner: broadcast::Receiver<Message>,
    ) -> Self {
        Self { channel, inner }
    }

    /// Асинхронно ожидает следующее сообщение из канала.
    ///
    /// # Возвращает
    /// - `Ok(Message)` при успешном получении сообщения
    /// - `Err(RecvError::Closed)` если канал закрыт
    /// - `Err(RecvError::Lagged(n))` если приёмник отстал на `n` сообщений
    pub async fn recv(&mut self) -> Result<Message, RecvError> {
        self.inner.recv().await.map_err(Into::into)
    }

    /// Пытается получить сообщение без ожидания.
    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        self.inner.try_recv().map_err(Into::into)
    }

    /// Явно отписаться от канала. Аналогично `drop(self)`.
    pub fn unsubscribe(self) {}

    pub fn channel_name(&self) -> &Arc<str> {
        &self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::pubsub::Broker;

    /// Тест проверяет, что имя канала доступно и после удаления брокера.
    #[test]
    fn test_subscription_channel_name() {
        let sub = {
            let broker = Broker::new(10);
            broker.subscribe("mychan")
        };
        assert_eq!(&**sub.channel_name(), "mychan");
        assert!(sub.is_closed());
    }

    #[test]
    fn test_try_recv() {
        let broker = Broker::new(10);
        let mut sub = broker.subscribe("c");
        assert_eq!(sub.try_recv().unwrap_err(), TryRecvError::Empty);

        broker.publish("c", Bytes::from_static(b"1"));
        assert_eq!(sub.try_recv().unwrap().payload, Bytes::from_static(b"1"));
    }

    /// Тест проверяет, что отставший получатель видит `Lagged`.
    #[test]
    fn test_lagged_receiver() {
        let broker = Broker::new(2);
        let mut sub = broker.subscribe("c");
        for i in 0..4u8 {
            broker.publish("c", Bytes::from(vec![i]));
        }
        assert_eq!(sub.try_recv().unwrap_err(), TryRecvError::Lagged(2));
    }

    #[test]
    fn test_unsubscribe_drops_receiver() {
        let broker = Broker::new(10);
        let sub = broker.subscribe("c");
        sub.unsubscribe();
        assert_eq!(broker.publish("c", Bytes::from_static(b"x")), 0);
    }
}
