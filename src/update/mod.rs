//! Модель обновления данных и её сетевое представление.
//!
//! Обновление (`DataUpdate`) — набор записей плюс человекочитаемая причина.
//! Сериализуется в JSON один раз на публикацию; одни и те же байты уходят во
//! все каналы.

pub mod entry;
pub mod mask;

pub use entry::{DataSourceEntry, DataUpdate};
pub use mask::mask_credentials;
