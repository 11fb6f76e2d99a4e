use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

/// Пул `Arc<str>` для имён каналов. Набор каналов ограничен конфигурацией
/// топиков, поэтому пул не очищается.
static CHANNEL_INTERN: Lazy<DashMap<String, Arc<str>>> = Lazy::new(DashMap::new);

/// Возвращает общий `Arc<str>` для имени канала.
#[inline]
pub(crate) fn intern_channel<S: AsRef<str>>(chan: S) -> Arc<str> {
    let key = chan.as_ref();
    if let Some(existing) = CHANNEL_INTERN.get(key) {
        return existing.clone();
    }
    CHANNEL_INTERN
        .entry(key.to_string())
        .or_insert_with(|| Arc::from(key))
        .clone()
}
