//! Транспортный адаптер: отправка тела в один канал и подписка на канал.
//!
//! Повторы неудачных отправок — забота адаптера ([`RetryingTransport`]), а не
//! публикатора.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use super::{Broker, Subscription};
use crate::error::TransportError;

/// Транспорт pub/sub с упорядоченной доставкой внутри канала.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Отправляет тело в канал. Возвращает число получателей.
    async fn send(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> Result<usize, TransportError>;

    /// Подписывается на канал.
    fn subscribe(
        &self,
        channel: &str,
    ) -> Subscription;
}

#[async_trait]
impl Transport for Broker {
    async fn send(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed {
                channel: channel.to_string(),
            });
        }
        Ok(self.publish(channel, payload))
    }

    fn subscribe(
        &self,
        channel: &str,
    ) -> Subscription {
        Broker::subscribe(self, channel)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> Result<usize, TransportError> {
        (**self).send(channel, payload).await
    }

    fn subscribe(
        &self,
        channel: &str,
    ) -> Subscription {
        (**self).subscribe(channel)
    }
}

/// Политика повторов: линейно растущая пауза с потолком.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Пауза перед попыткой номер `attempt + 1` (нумерация с 1).
    pub fn backoff(
        &self,
        attempt: u32,
    ) -> Duration {
        self.base_backoff
            .saturating_mul(attempt)
            .min(self.max_backoff)
    }
}

/// Обёртка, повторяющая отправку при временных ошибках транспорта.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(
        inner: T,
        policy: RetryPolicy,
    ) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(
        &self,
        channel: &str,
        payload: Bytes,
    ) -> Result<usize, TransportError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.send(channel, payload.clone()).await {
                Ok(receivers) => return Ok(receivers),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let backoff = self.policy.backoff(attempt);
                    warn!(
                        channel,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Transport send failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn subscribe(
        &self,
        channel: &str,
    ) -> Subscription {
        self.inner.subscribe(channel)
    }
}
