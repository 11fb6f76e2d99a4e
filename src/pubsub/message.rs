use std::sync::Arc;

use bytes::Bytes;

/// Сообщение транспорта: имя канала и неизменяемое тело.
///
/// Тело — `Bytes`, поэтому одна и та же полезная нагрузка раздаётся всем
/// каналам публикации без копирования.
#[derive(Debug, Clone)]
pub struct Message {
    pub channel: Arc<str>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(
        channel: impl Into<Arc<str>>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}
