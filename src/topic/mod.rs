//! Топики: разбор, иерархическое раскрытие, пространства имён тенантов и
//! единый конвейер преобразования.
//!
//! - `path`: грамматика `[<namespace>:]<segment>(/<segment>)*`.
//! - `hierarchy`: раскрытие топика во все предки, включая сам топик.
//! - `namespace`: префикс области (scope) и вида данных (kind).
//! - `pipeline`: единственная точка, где топики записей переписываются и
//!   из тех же значений вычисляется набор каналов доставки.

pub mod hierarchy;
pub mod namespace;
pub mod path;
pub mod pipeline;

pub use hierarchy::{expand, expand_path, leaf};
pub use namespace::{namespace, LegacyTopicMode, Namespacer, ScopeId, ScopeMode};
pub use path::{Topic, TopicPath};
pub use pipeline::{channel_set_of, ChannelSet, RoutedUpdate, TopicTransform};
