use std::{collections::HashSet, sync::Arc};

use arc_swap::ArcSwap;

use crate::{
    error::TopicError,
    topic::{Namespacer, Topic},
};

/// Набор топиков, которыми клиент считает себя адресованным.
///
/// Строится тем же [`Namespacer`], что и у публикатора, без иерархического
/// раскрытия: подписка на `a/b` означает ровно `a/b`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    topics: HashSet<Topic>,
}

impl SubscriptionSet {
    pub fn build<I, S>(
        namespacer: &Namespacer,
        names: I,
    ) -> Result<Self, TopicError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let topics = names
            .into_iter()
            .map(|name| namespacer.apply(name.as_ref()))
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self { topics })
    }

    pub fn contains(
        &self,
        topic: &str,
    ) -> bool {
        self.topics.contains(topic)
    }

    /// Есть ли у топиков записи хотя бы один общий элемент с набором.
    pub fn overlaps(
        &self,
        topics: &[Topic],
    ) -> bool {
        topics.iter().any(|t| self.topics.contains(t))
    }

    /// Пересечение топиков записи с набором, в порядке записи.
    pub fn matching<'a>(
        &'a self,
        topics: &'a [Topic],
    ) -> impl Iterator<Item = &'a Topic> + 'a {
        topics.iter().filter(move |t| self.topics.contains(*t))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Текущий набор подписок с атомарной заменой целиком.
///
/// Читатели получают снимок и никогда не видят частично перестроенный набор.
#[derive(Debug)]
pub struct SubscriptionHandle {
    current: ArcSwap<SubscriptionSet>,
}

impl SubscriptionHandle {
    pub fn new(set: SubscriptionSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(set),
        }
    }

    pub fn load(&self) -> Arc<SubscriptionSet> {
        self.current.load_full()
    }

    /// Подменяет набор и возвращает предыдущий.
    pub fn replace(
        &self,
        set: SubscriptionSet,
    ) -> Arc<SubscriptionSet> {
        self.current.swap(Arc::new(set))
    }

    /// Строит новый набор и подменяет текущий. При ошибке текущий набор
    /// остаётся прежним.
    pub fn rebuild<I, S>(
        &self,
        namespacer: &Namespacer,
        names: I,
    ) -> Result<Arc<SubscriptionSet>, TopicError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = SubscriptionSet::build(namespacer, names)?;
        self.replace(set);
        Ok(self.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::{LegacyTopicMode, ScopeMode};

    fn ns(scope: &str) -> Namespacer {
        Namespacer::new(
            ScopeMode::from_scope_id(scope).unwrap(),
            "data",
            LegacyTopicMode::Bare,
        )
        .unwrap()
    }

    #[test]
    fn test_build_uses_publisher_namespacing() {
        let set = SubscriptionSet::build(&ns("service1"), ["policy_data"]).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("service1:data:policy_data"));
    }

    /// Тест проверяет, что подписка на лист не раскрывается в предков.
    #[test]
    fn test_build_does_not_expand() {
        let set = SubscriptionSet::build(&ns("s"), ["a/b"]).unwrap();
        assert!(set.contains("s:data:a/b"));
        assert!(!set.contains("s:data:a"));
    }

    #[test]
    fn test_overlap_is_exact() {
        let set = SubscriptionSet::build(&ns("service1"), ["policy_data"]).unwrap();
        assert!(set.overlaps(&[Topic::from("service1:data:policy_data")]));
        assert!(!set.overlaps(&[Topic::from("data:policy_data")]));
        assert!(!set.overlaps(&[Topic::from("service1:data:policy_data/users")]));
        assert!(!set.overlaps(&[]));
    }

    #[test]
    fn test_matching_keeps_entry_order() {
        let set = SubscriptionSet::build(&ns("s"), ["b", "a"]).unwrap();
        let topics = [
            Topic::from("s:data:a"),
            Topic::from("s:data:x"),
            Topic::from("s:data:b"),
        ];
        let matched: Vec<_> = set.matching(&topics).map(Topic::as_str).collect();
        assert_eq!(matched, ["s:data:a", "s:data:b"]);
    }

    #[test]
    fn test_build_rejects_malformed_name() {
        assert!(SubscriptionSet::build(&ns("s"), ["a//b"]).is_err());
    }

    /// Тест проверяет, что неудачная перестройка не трогает текущий набор.
    #[test]
    fn test_rebuild_swaps_whole_set() {
        let handle = SubscriptionHandle::new(SubscriptionSet::build(&ns("s"), ["a"]).unwrap());
        let before = handle.load();

        assert!(handle.rebuild(&ns("s"), ["bad//"]).is_err());
        assert_eq!(*handle.load(), *before);

        let after = handle.rebuild(&ns("s"), ["b", "c"]).unwrap();
        assert_eq!(after.len(), 2);
        assert!(!after.contains("s:data:a"));
        // старый снимок остаётся целым у тех, кто его держит
        assert!(before.contains("s:data:a"));
    }
}
