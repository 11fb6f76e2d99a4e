use std::{borrow::Borrow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TopicError;

/// Разделитель пространства имён и пути.
pub const NAMESPACE_SEPARATOR: char = ':';
/// Разделитель сегментов пути.
pub const SEGMENT_SEPARATOR: char = '/';

/// Топик в том виде, в котором он передаётся по сети и используется как имя
/// канала транспорта.
///
/// Непрозрачное значение: два топика равны тогда и только тогда, когда равны
/// их строки. Проверка грамматики выполняется через [`Topic::parse`], поэтому
/// десериализация входящих сообщений никогда не отбрасывает запись из-за
/// формы топика.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

/// Разобранный топик: необязательное пространство имён и непустые сегменты
/// пути.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPath {
    namespace: Option<String>,
    segments: Vec<String>,
}

////////////////////////////////////////////////////////////////////////////////
// Topic
////////////////////////////////////////////////////////////////////////////////

impl Topic {
    /// Оборачивает строку без проверки грамматики.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Разбирает топик по грамматике.
    pub fn parse(&self) -> Result<TopicPath, TopicError> {
        TopicPath::parse(&self.0)
    }

    /// Начинается ли топик ровно с данного префикса (без поиска подстроки).
    pub fn has_prefix(
        &self,
        prefix: &str,
    ) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for Topic {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<TopicPath> for Topic {
    fn from(path: TopicPath) -> Self {
        Self(path.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// TopicPath
////////////////////////////////////////////////////////////////////////////////

impl TopicPath {
    /// Разбирает строку вида `[<namespace>:]<segment>(/<segment>)*`.
    ///
    /// Пространство имён — всё до последнего `:`; оно само может состоять из
    /// нескольких компонентов (`scope:kind`). Пустые сегменты пути (двойной или
    /// завершающий `/`) и пустые компоненты пространства имён — ошибка
    /// конфигурации, а не повод молча схлопнуть путь.
    pub fn parse(raw: &str) -> Result<Self, TopicError> {
        if raw.is_empty() {
            return Err(TopicError::Empty);
        }

        if let Some(ch) = raw.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(TopicError::InvalidCharacter {
                topic: raw.to_string(),
                ch,
            });
        }

        let (namespace, path) = match raw.rsplit_once(NAMESPACE_SEPARATOR) {
            Some((ns, path)) => (Some(ns), path),
            None => (None, raw),
        };

        if let Some(ns) = namespace {
            for component in ns.split(NAMESPACE_SEPARATOR) {
                if component.is_empty() {
                    return Err(TopicError::EmptyNamespace {
                        topic: raw.to_string(),
                    });
                }
                if component.contains(SEGMENT_SEPARATOR) {
                    return Err(TopicError::InvalidCharacter {
                        topic: raw.to_string(),
                        ch: SEGMENT_SEPARATOR,
                    });
                }
            }
        }

        let mut segments = Vec::new();
        for (position, segment) in path.split(SEGMENT_SEPARATOR).enumerate() {
            if segment.is_empty() {
                return Err(TopicError::EmptySegment {
                    topic: raw.to_string(),
                    position,
                });
            }
            segments.push(segment.to_string());
        }

        Ok(Self {
            namespace: namespace.map(str::to_string),
            segments,
        })
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Количество сегментов пути.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Топик, составленный из первых `depth` сегментов с тем же
    /// пространством имён.
    pub fn ancestor(
        &self,
        depth: usize,
    ) -> Option<TopicPath> {
        if depth == 0 || depth > self.segments.len() {
            return None;
        }
        Some(Self {
            namespace: self.namespace.clone(),
            segments: self.segments[..depth].to_vec(),
        })
    }

    pub fn to_topic(&self) -> Topic {
        Topic(self.to_string())
    }
}

impl fmt::Display for TopicPath {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "{ns}{NAMESPACE_SEPARATOR}")?;
        }
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{SEGMENT_SEPARATOR}")?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for TopicPath {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
