//! Подсистема Publish–Subscribe.
//!
//! - `broker`: внутрипроцессный брокер точных каналов.
//! - `intern` (приватный): пул имён каналов.
//! - `message`: сообщение транспорта.
//! - `subscriber`: подписка на канал.
//! - `transport`: транспортный адаптер и повторы отправки.
//! - `publisher`: рассылка обновлений и единственная точка вызова конвейера
//!   топиков.

pub mod broker;
mod intern;
pub mod message;
pub mod publisher;
pub mod subscriber;
pub mod transport;

pub use broker::*;
pub(crate) use intern::intern_channel;
pub use message::*;
pub use publisher::*;
pub use subscriber::*;
pub use transport::*;
