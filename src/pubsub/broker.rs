use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::{intern_channel, Message, Subscription};

type ChannelKey = Arc<str>;

/// Внутрипроцессный брокер: точные каналы поверх `tokio::sync::broadcast`.
///
/// Доставка упорядочена внутри канала для каждого получателя, между
/// каналами порядок не гарантируется.
pub struct Broker {
    /// Точные каналы → `Sender`
    channels: DashMap<ChannelKey, broadcast::Sender<Message>>,
    /// Ёмкость буфера каждого `broadcast::channel`
    default_capacity: usize,
    closed: AtomicBool,
    /// Общее количество вызовов `publish`
    pub publish_count: AtomicUsize,
    /// Количество публикаций без получателей
    pub send_error_count: AtomicUsize,
}

impl Broker {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            default_capacity: default_capacity.max(1),
            closed: AtomicBool::new(false),
            publish_count: AtomicUsize::new(0),
            send_error_count: AtomicUsize::new(0),
        }
    }

    /// Подписка на канал (точное совпадение имени).
    pub fn subscribe(
        &self,
        channel: &str,
    ) -> Subscription {
        let key = intern_channel(channel);
        let tx = self
            .channels
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.default_capacity).0)
            .clone();
        trace!(channel = %key, "Subscribed");
        Subscription::new(key, tx.subscribe())
    }

    /// Публикует сообщение в канал и возвращает число получателей.
    ///
    /// Канал без получателей удаляется, публикация в него даёт `0`.
    pub fn publish(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> usize {
        self.publish_count.fetch_add(1, Ordering::Relaxed);

        let Some(entry) = self.channels.get(channel) else {
            return 0;
        };
        let tx = entry.value().clone();
        let key = entry.key().clone();
        drop(entry);

        let receivers = match tx.send(Message::new(key.clone(), payload)) {
            Ok(n) => n,
            Err(_) => {
                self.send_error_count.fetch_add(1, Ordering::Relaxed);
                0
            }
        };

        if tx.receiver_count() == 0 {
            self.channels
                .remove_if(&*key, |_, sender| sender.receiver_count() == 0);
            debug!(channel = %key, "Removed channel without subscribers");
        }

        receivers
    }

    /// Удаляет канал вместе со всеми подписками.
    pub fn unsubscribe_all(
        &self,
        channel: &str,
    ) {
        self.channels.remove(channel);
    }

    /// Закрывает брокер: все подписки получают `Closed`, дальнейшие отправки
    /// через транспорт отклоняются.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.channels.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
