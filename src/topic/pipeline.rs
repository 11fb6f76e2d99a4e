//! Единый конвейер преобразования топиков.
//!
//! Для каждого сырого топика записи: сначала пространство имён, затем
//! иерархическое раскрытие. Результат заменяет топики записи (это и есть
//! полезная нагрузка), и из того же значения вычисляется набор каналов.
//! [`RoutedUpdate`] можно получить только отсюда, поэтому набор каналов
//! всегда равен объединению топиков записей.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use super::{expand_path, Namespacer, ScopeMode, Topic};
use crate::{
    error::TopicError,
    update::{mask_credentials, DataSourceEntry, DataUpdate},
};

/// Набор каналов назначения одной публикации.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSet(BTreeSet<Topic>);

/// Обновление после преобразования топиков вместе с каналами доставки.
#[derive(Debug, Clone)]
pub struct RoutedUpdate {
    update: DataUpdate,
    channels: ChannelSet,
}

/// Конвейер: `Namespacer`, затем раскрытие иерархии.
#[derive(Debug, Clone)]
pub struct TopicTransform {
    namespacer: Namespacer,
}

////////////////////////////////////////////////////////////////////////////////
// ChannelSet
////////////////////////////////////////////////////////////////////////////////

impl ChannelSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(
        &self,
        topic: &str,
    ) -> bool {
        self.0.contains(topic)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ChannelSet {
    type Item = &'a Topic;
    type IntoIter = std::collections::btree_set::Iter<'a, Topic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Объединение топиков всех записей обновления.
pub fn channel_set_of(update: &DataUpdate) -> ChannelSet {
    ChannelSet(
        update
            .entries
            .iter()
            .flat_map(|entry| entry.topics.iter().cloned())
            .collect(),
    )
}

////////////////////////////////////////////////////////////////////////////////
// RoutedUpdate
////////////////////////////////////////////////////////////////////////////////

impl RoutedUpdate {
    pub fn update(&self) -> &DataUpdate {
        &self.update
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn into_parts(self) -> (DataUpdate, ChannelSet) {
        (self.update, self.channels)
    }
}

////////////////////////////////////////////////////////////////////////////////
// TopicTransform
////////////////////////////////////////////////////////////////////////////////

impl TopicTransform {
    pub fn new(namespacer: Namespacer) -> Self {
        Self { namespacer }
    }

    pub fn namespacer(&self) -> &Namespacer {
        &self.namespacer
    }

    /// Тот же конвейер для другой области.
    pub fn for_scope(
        &self,
        mode: ScopeMode,
    ) -> Self {
        Self {
            namespacer: self.namespacer.with_scope(mode),
        }
    }

    /// Преобразует набор сырых топиков одной записи.
    ///
    /// Результат — объединение раскрытий в порядке первого появления, без
    /// повторов.
    pub fn transform_topics(
        &self,
        raw: &[Topic],
    ) -> Result<Vec<Topic>, TopicError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for topic in raw {
            let namespaced = self.namespacer.apply(topic.as_str())?;
            let path = namespaced.parse()?;
            for variant in expand_path(&path) {
                if seen.insert(variant.clone()) {
                    out.push(variant);
                }
            }
        }

        Ok(out)
    }

    /// Преобразует обновление целиком.
    ///
    /// Один некорректный топик отклоняет всё обновление: частично
    /// преобразованная полезная нагрузка не создаётся. Записи без топиков
    /// сохраняются в обновлении, но не дают ни одного канала.
    pub fn apply(
        &self,
        update: DataUpdate,
    ) -> Result<RoutedUpdate, TopicError> {
        let DataUpdate { reason, entries } = update;

        let entries = entries
            .into_iter()
            .map(|entry| self.transform_entry(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let update = DataUpdate { reason, entries };
        let channels = channel_set_of(&update);

        debug!(
            scope = %self.namespacer.mode(),
            entries = update.entries.len(),
            channels = channels.len(),
            "Update topics transformed"
        );

        Ok(RoutedUpdate { update, channels })
    }

    fn transform_entry(
        &self,
        entry: DataSourceEntry,
    ) -> Result<DataSourceEntry, TopicError> {
        if entry.topics.is_empty() {
            warn!(
                url = %mask_credentials(&entry.url),
                dst_path = %entry.dst_path,
                "Entry has no topics and will not be routed to any channel"
            );
            return Ok(entry);
        }

        let topics = self.transform_topics(&entry.topics)?;
        Ok(DataSourceEntry { topics, ..entry })
    }
}
