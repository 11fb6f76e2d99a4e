//! Раскрытие иерархического топика во все его предки.
//!
//! `kind:a/b/c` → `[kind:a, kind:a/b, kind:a/b/c]`: по возрастанию
//! специфичности, пространство имён сохраняется в каждом элементе. Подписчик
//! на любой уровень иерархии получает обновление, опубликованное в лист.

use super::{Topic, TopicPath};
use crate::error::TopicError;

/// Раскрывает топик во все предки, включая сам топик.
///
/// Чистая детерминированная функция. Некорректный топик (пустой сегмент и
/// т.п.) возвращает ошибку и ничего не раскрывает.
pub fn expand(topic: &Topic) -> Result<Vec<Topic>, TopicError> {
    let path = topic.parse()?;
    Ok(expand_path(&path))
}

/// Раскрывает уже разобранный путь.
pub fn expand_path(path: &TopicPath) -> Vec<Topic> {
    (1..=path.depth())
        .filter_map(|depth| path.ancestor(depth))
        .map(Topic::from)
        .collect()
}

/// Максимальный (самый специфичный) элемент раскрытия.
pub fn leaf(expanded: &[Topic]) -> Option<&Topic> {
    expanded.last()
}
