//! Проверка и раздача записей входящего обновления.
//!
//! Для каждой записи, в порядке получения:
//! 1. пустой список топиков — пропуск (некорректный вход);
//! 2. нет пересечения с набором подписок — пропуск с отдельным счётчиком;
//! 3. иначе запись передаётся в [`ApplyEngine`].
//!
//! Записи с одним путём назначения применяются последовательно под общей
//! блокировкой пути, записи с разными путями — параллельно.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};

use super::{ApplyEngine, SubscriptionHandle};
use crate::{
    error::ApplyError,
    update::{mask_credentials, DataSourceEntry, DataUpdate},
};

/// Счётчики диспетчера.
///
/// `topic_mismatch_skipped` — отдельный счётчик расхождения топиков: при
/// корректной работе публикатора он растёт только для записей, которые
/// действительно адресованы другим подписчикам.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    updates_received: AtomicU64,
    entries_applied: AtomicU64,
    topic_mismatch_skipped: AtomicU64,
    empty_topic_skipped: AtomicU64,
    apply_failed: AtomicU64,
    decode_failed: AtomicU64,
}

/// Снимок [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub updates_received: u64,
    pub entries_applied: u64,
    pub topic_mismatch_skipped: u64,
    pub empty_topic_skipped: u64,
    pub apply_failed: u64,
    pub decode_failed: u64,
}

/// Итог обработки одной записи.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Applied,
    SkippedEmptyTopics,
    SkippedTopicMismatch,
    Failed(ApplyError),
}

/// Итоги по записям обновления, в порядке записей.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<EntryOutcome>,
}

/// Диспетчер обновлений на стороне клиента.
#[derive(Clone)]
pub struct UpdateDispatcher {
    subscriptions: Arc<SubscriptionHandle>,
    engine: Arc<dyn ApplyEngine>,
    path_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    metrics: Arc<DispatchMetrics>,
}

type PathGroup = (String, Vec<(usize, DataSourceEntry)>);
type GroupResult = Vec<(usize, Result<(), ApplyError>)>;

////////////////////////////////////////////////////////////////////////////////
// DispatchMetrics / DispatchReport
////////////////////////////////////////////////////////////////////////////////

impl DispatchMetrics {
    pub fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            updates_received: self.updates_received.load(Ordering::Relaxed),
            entries_applied: self.entries_applied.load(Ordering::Relaxed),
            topic_mismatch_skipped: self.topic_mismatch_skipped.load(Ordering::Relaxed),
            empty_topic_skipped: self.empty_topic_skipped.load(Ordering::Relaxed),
            apply_failed: self.apply_failed.load(Ordering::Relaxed),
            decode_failed: self.decode_failed.load(Ordering::Relaxed),
        }
    }

    pub fn record_decode_failure(&self) {
        self.decode_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl DispatchReport {
    fn count(
        &self,
        pred: impl Fn(&EntryOutcome) -> bool,
    ) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Applied))
    }

    pub fn skipped_mismatch(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::SkippedTopicMismatch))
    }

    pub fn skipped_empty(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::SkippedEmptyTopics))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Failed(_)))
    }
}

////////////////////////////////////////////////////////////////////////////////
// UpdateDispatcher
////////////////////////////////////////////////////////////////////////////////

impl UpdateDispatcher {
    pub fn new(
        subscriptions: Arc<SubscriptionHandle>,
        engine: Arc<dyn ApplyEngine>,
    ) -> Self {
        Self {
            subscriptions,
            engine,
            path_locks: Arc::new(DashMap::new()),
            metrics: Arc::new(DispatchMetrics::default()),
        }
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionHandle> {
        &self.subscriptions
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Обрабатывает одно декодированное обновление.
    ///
    /// Исход одной записи не влияет на соседние. Для записей с одним путём
    /// назначения итоговое содержимое пути — результат последней из них.
    pub async fn dispatch(
        &self,
        update: DataUpdate,
    ) -> DispatchReport {
        DispatchMetrics::bump(&self.metrics.updates_received);

        let subscriptions = self.subscriptions.load();
        let mut outcomes: Vec<Option<EntryOutcome>> = vec![None; update.entries.len()];
        let mut groups: Vec<PathGroup> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for (idx, entry) in update.entries.into_iter().enumerate() {
            if entry.topics.is_empty() {
                debug!(
                    url = %mask_credentials(&entry.url),
                    dst_path = %entry.dst_path,
                    "Entry skipped: no topics in payload"
                );
                DispatchMetrics::bump(&self.metrics.empty_topic_skipped);
                outcomes[idx] = Some(EntryOutcome::SkippedEmptyTopics);
                continue;
            }

            if !subscriptions.overlaps(&entry.topics) {
                debug!(
                    url = %mask_credentials(&entry.url),
                    dst_path = %entry.dst_path,
                    topics = ?entry.topics,
                    "Entry skipped: topic mismatch"
                );
                DispatchMetrics::bump(&self.metrics.topic_mismatch_skipped);
                outcomes[idx] = Some(EntryOutcome::SkippedTopicMismatch);
                continue;
            }

            let slot = *group_index
                .entry(entry.dst_path.clone())
                .or_insert_with(|| {
                    groups.push((entry.dst_path.clone(), Vec::new()));
                    groups.len() - 1
                });
            groups[slot].1.push((idx, entry));
        }

        let tasks: Vec<(String, Vec<usize>, JoinHandle<GroupResult>)> = groups
            .into_iter()
            .map(|(dst_path, entries)| {
                let indices = entries.iter().map(|(idx, _)| *idx).collect();
                let handle = self.spawn_group(dst_path.clone(), entries);
                (dst_path, indices, handle)
            })
            .collect();

        for (dst_path, indices, handle) in tasks {
            match handle.await {
                Ok(results) => {
                    for (idx, result) in results {
                        outcomes[idx] = Some(self.record_apply(&dst_path, result));
                    }
                }
                Err(join) => {
                    for idx in indices {
                        let err = ApplyError::Rejected {
                            dst_path: dst_path.clone(),
                            reason: join.to_string(),
                        };
                        outcomes[idx] = Some(self.record_apply(&dst_path, Err(err)));
                    }
                }
            }
            self.path_locks
                .remove_if(&dst_path, |_, lock| Arc::strong_count(lock) == 1);
        }

        self.finish(outcomes)
    }

    /// Собирает отчёт. Запись без исхода считается неприменённой и попадает
    /// в `apply_failed`, а не в счётчик несовпадений топиков.
    fn finish(
        &self,
        outcomes: Vec<Option<EntryOutcome>>,
    ) -> DispatchReport {
        let outcomes = outcomes
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    warn!("Entry left without outcome, recording as failed");
                    let err = ApplyError::Rejected {
                        dst_path: String::new(),
                        reason: "entry was not dispatched".to_string(),
                    };
                    self.record_apply("", Err(err))
                })
            })
            .collect();
        DispatchReport { outcomes }
    }

    /// Применяет записи одного пути по порядку под блокировкой пути.
    fn spawn_group(
        &self,
        dst_path: String,
        entries: Vec<(usize, DataSourceEntry)>,
    ) -> JoinHandle<GroupResult> {
        let lock = self.path_locks.entry(dst_path).or_default().clone();
        let engine = Arc::clone(&self.engine);

        tokio::spawn(async move {
            let _guard = lock.lock().await;
            let mut results = Vec::with_capacity(entries.len());
            for (idx, entry) in entries {
                let result = engine.apply(&entry).await;
                if let Err(err) = &result {
                    warn!(
                        url = %mask_credentials(&entry.url),
                        dst_path = %entry.dst_path,
                        error = %err,
                        "Entry apply failed"
                    );
                }
                results.push((idx, result));
            }
            results
        })
    }

    fn record_apply(
        &self,
        dst_path: &str,
        result: Result<(), ApplyError>,
    ) -> EntryOutcome {
        match result {
            Ok(()) => {
                DispatchMetrics::bump(&self.metrics.entries_applied);
                EntryOutcome::Applied
            }
            Err(err) => {
                debug!(dst_path, "Apply failure recorded");
                DispatchMetrics::bump(&self.metrics.apply_failed);
                EntryOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        client::{DataStore, SubscriptionSet},
        topic::{LegacyTopicMode, Namespacer, ScopeMode},
    };

    fn dispatcher_with(engine: Arc<dyn ApplyEngine>) -> UpdateDispatcher {
        let ns = Namespacer::new(
            ScopeMode::scoped("service1").unwrap(),
            "data",
            LegacyTopicMode::Bare,
        )
        .unwrap();
        let set = SubscriptionSet::build(&ns, ["policy_data"]).unwrap();
        UpdateDispatcher::new(Arc::new(SubscriptionHandle::new(set)), engine)
    }

    fn entry(
        topics: &[&str],
        dst_path: &str,
        data: serde_json::Value,
    ) -> DataSourceEntry {
        DataSourceEntry::new("", dst_path)
            .with_topics(topics.iter().copied())
            .with_data(data)
    }

    #[tokio::test]
    async fn test_matching_entry_is_applied() {
        let store = Arc::new(DataStore::new());
        let dispatcher = dispatcher_with(store.clone());

        let report = dispatcher
            .dispatch(DataUpdate::new("r").with_entry(entry(
                &["service1:data:policy_data"],
                "/p",
                json!(1),
            )))
            .await;

        assert_eq!(report.outcomes, vec![EntryOutcome::Applied]);
        assert_eq!(store.get("/p"), Some(json!(1)));
        assert_eq!(dispatcher.metrics().snapshot().entries_applied, 1);
    }

    /// Тест проверяет, что запись без области пропускается, счётчик растёт,
    /// а содержимое пути не меняется.
    #[tokio::test]
    async fn test_mismatch_is_counted_and_has_no_effect() {
        let store = Arc::new(DataStore::new());
        let dispatcher = dispatcher_with(store.clone());

        let report = dispatcher
            .dispatch(DataUpdate::new("r").with_entry(entry(
                &["data:policy_data"],
                "/p",
                json!(1),
            )))
            .await;

        assert_eq!(report.outcomes, vec![EntryOutcome::SkippedTopicMismatch]);
        assert!(store.get("/p").is_none());
        let stats = dispatcher.metrics().snapshot();
        assert_eq!(stats.topic_mismatch_skipped, 1);
        assert_eq!(stats.entries_applied, 0);
    }

    #[tokio::test]
    async fn test_empty_topics_counted_separately() {
        let dispatcher = dispatcher_with(Arc::new(DataStore::new()));
        let report = dispatcher
            .dispatch(DataUpdate::new("r").with_entry(entry(&[], "/p", json!(1))))
            .await;

        assert_eq!(report.skipped_empty(), 1);
        let stats = dispatcher.metrics().snapshot();
        assert_eq!(stats.empty_topic_skipped, 1);
        assert_eq!(stats.topic_mismatch_skipped, 0);
    }

    /// Тест проверяет, что ошибка одной записи не мешает соседним.
    #[tokio::test]
    async fn test_failure_does_not_affect_siblings() {
        let store = Arc::new(DataStore::new());
        let dispatcher = dispatcher_with(store.clone());
        let topic = ["service1:data:policy_data"];

        let update = DataUpdate::new("r")
            .with_entry(DataSourceEntry::new("https://src", "/a").with_topics(topic))
            .with_entry(entry(&topic, "/b", json!("ok")));
        let report = dispatcher.dispatch(update).await;

        assert!(matches!(
            report.outcomes[0],
            EntryOutcome::Failed(ApplyError::NoInlineData { .. })
        ));
        assert_eq!(report.outcomes[1], EntryOutcome::Applied);
        assert_eq!(store.get("/b"), Some(json!("ok")));
        assert_eq!(dispatcher.metrics().snapshot().apply_failed, 1);
    }

    #[tokio::test]
    async fn test_same_path_last_write_wins() {
        let store = Arc::new(DataStore::new());
        let dispatcher = dispatcher_with(store.clone());
        let topic = ["service1:data:policy_data"];

        let update = (0..20).fold(DataUpdate::new("r"), |u, i| {
            u.with_entry(entry(&topic, "/same", json!(i)))
        });
        let report = dispatcher.dispatch(update).await;

        assert_eq!(report.applied(), 20);
        assert_eq!(store.get("/same"), Some(json!(19)));
        assert!(dispatcher.path_locks.is_empty());
    }

    /// Движок, который медленно применяет записи и запоминает порядок.
    struct Recording {
        log: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ApplyEngine for Recording {
        async fn apply(
            &self,
            entry: &DataSourceEntry,
        ) -> Result<(), ApplyError> {
            let tag = entry.data.as_ref().map(|v| v.to_string()).unwrap_or_default();
            self.log.lock().push(format!("start {}", tag));
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.log.lock().push(format!("end {}", tag));
            Ok(())
        }
    }

    /// Тест проверяет, что записи одного пути не перекрываются во времени.
    #[tokio::test(start_paused = true)]
    async fn test_same_path_is_serialized() {
        let engine = Arc::new(Recording {
            log: parking_lot::Mutex::new(Vec::new()),
        });
        let dispatcher = dispatcher_with(engine.clone());
        let topic = ["service1:data:policy_data"];

        let update = DataUpdate::new("r")
            .with_entry(entry(&topic, "/p", json!(1)))
            .with_entry(entry(&topic, "/p", json!(2)));
        dispatcher.dispatch(update).await;

        assert_eq!(
            *engine.log.lock(),
            vec!["start 1", "end 1", "start 2", "end 2"]
        );
    }

    /// Механизм применения, который падает с паникой.
    struct Panicking;

    #[async_trait]
    impl ApplyEngine for Panicking {
        async fn apply(
            &self,
            _entry: &DataSourceEntry,
        ) -> Result<(), ApplyError> {
            panic!("engine crashed");
        }
    }

    /// Тест проверяет, что упавшая задача применения даёт `Failed`, а счётчик
    /// несовпадений топиков не меняется.
    #[tokio::test]
    async fn test_panicking_engine_is_reported_as_failed() {
        let dispatcher = dispatcher_with(Arc::new(Panicking));
        let report = dispatcher
            .dispatch(DataUpdate::new("r").with_entry(entry(
                &["service1:data:policy_data"],
                "/p",
                json!(1),
            )))
            .await;

        assert!(matches!(
            report.outcomes.as_slice(),
            [EntryOutcome::Failed(ApplyError::Rejected { .. })]
        ));
        let stats = dispatcher.metrics().snapshot();
        assert_eq!(stats.apply_failed, 1);
        assert_eq!(stats.topic_mismatch_skipped, 0);
    }

    #[test]
    fn test_unfilled_slot_is_failure_not_mismatch() {
        let dispatcher = dispatcher_with(Arc::new(DataStore::new()));
        let report = dispatcher.finish(vec![Some(EntryOutcome::SkippedEmptyTopics), None]);

        assert_eq!(report.skipped_empty(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped_mismatch(), 0);
        let stats = dispatcher.metrics().snapshot();
        assert_eq!(stats.apply_failed, 1);
        assert_eq!(stats.topic_mismatch_skipped, 0);
    }

    #[test]
    fn test_record_decode_failure() {
        let metrics = DispatchMetrics::default();
        metrics.record_decode_failure();
        assert_eq!(metrics.snapshot().decode_failed, 1);
    }
}
