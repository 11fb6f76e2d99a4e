//! Клиентская сторона: набор подписок, проверка и применение обновлений.

pub mod apply;
pub mod dispatcher;
pub mod listener;
pub mod subscription;

pub use apply::{ApplyEngine, DataStore};
pub use dispatcher::{DispatchMetrics, DispatchReport, DispatchStats, EntryOutcome, UpdateDispatcher};
pub use listener::{ListenerHandle, UpdateListener};
pub use subscription::{SubscriptionHandle, SubscriptionSet};
