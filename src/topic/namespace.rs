use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    path::{NAMESPACE_SEPARATOR, SEGMENT_SEPARATOR},
    Topic, TopicPath,
};
use crate::error::TopicError;

/// Зарезервированное значение области, означающее режим без префикса.
pub const DEFAULT_SCOPE: &str = "default";

/// Идентификатор области (тенанта/сервиса).
///
/// Значение `default` сюда не попадает: оно означает [`ScopeMode::Unscoped`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(String);

/// Режим пространства имён публикатора или подписчика.
///
/// Выбирается явно при построении и больше никогда не угадывается по
/// наличию полей у соседних объектов.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeMode {
    /// Старый режим без префикса области.
    Unscoped,
    /// Топики получают префикс `{scope}:`.
    Scoped(ScopeId),
}

/// Как выглядят топики в режиме без области.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyTopicMode {
    /// Топик не меняется: `policy_data`.
    #[default]
    Bare,
    /// Топик получает префикс вида: `data:policy_data`.
    KindPrefixed,
}

/// Функция пространства имён: `(scope, kind, topic) → topic`.
///
/// Один и тот же экземпляр (или эквивалентный ему) используется и
/// публикатором, и построителем набора подписок клиента.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespacer {
    mode: ScopeMode,
    kind: String,
    legacy: LegacyTopicMode,
    /// Целевой префикс с завершающим `:`, `None` для `Unscoped` + `Bare`.
    prefix: Option<String>,
}

////////////////////////////////////////////////////////////////////////////////
// ScopeId / ScopeMode
////////////////////////////////////////////////////////////////////////////////

fn validate_component(value: &str) -> bool {
    !value.is_empty()
        && !value.chars().any(|c| {
            c == NAMESPACE_SEPARATOR
                || c == SEGMENT_SEPARATOR
                || c.is_whitespace()
                || c.is_control()
        })
}

impl ScopeId {
    pub fn new(scope: impl Into<String>) -> Result<Self, TopicError> {
        let scope = scope.into();
        if scope == DEFAULT_SCOPE || !validate_component(&scope) {
            return Err(TopicError::InvalidScope { scope });
        }
        Ok(Self(scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ScopeMode {
    /// Единственное место, где строка области превращается в режим:
    /// `default` или пустая строка → `Unscoped`.
    pub fn from_scope_id(scope: &str) -> Result<Self, TopicError> {
        if scope.is_empty() || scope == DEFAULT_SCOPE {
            Ok(Self::Unscoped)
        } else {
            ScopeId::new(scope).map(Self::Scoped)
        }
    }

    pub fn scoped(scope: impl Into<String>) -> Result<Self, TopicError> {
        ScopeId::new(scope).map(Self::Scoped)
    }

    /// Строковое имя области (`default` для режима без области).
    pub fn scope_id(&self) -> &str {
        match self {
            Self::Unscoped => DEFAULT_SCOPE,
            Self::Scoped(id) => id.as_str(),
        }
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, Self::Scoped(_))
    }
}

impl fmt::Display for ScopeMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.scope_id())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Namespacer
////////////////////////////////////////////////////////////////////////////////

fn target_prefix(
    mode: &ScopeMode,
    kind: &str,
    legacy: LegacyTopicMode,
) -> Option<String> {
    match (mode, legacy) {
        (ScopeMode::Scoped(scope), _) => Some(format!("{scope}:{kind}:")),
        (ScopeMode::Unscoped, LegacyTopicMode::KindPrefixed) => Some(format!("{kind}:")),
        (ScopeMode::Unscoped, LegacyTopicMode::Bare) => None,
    }
}

impl Namespacer {
    pub fn new(
        mode: ScopeMode,
        kind: impl Into<String>,
        legacy: LegacyTopicMode,
    ) -> Result<Self, TopicError> {
        let kind = kind.into();
        if !validate_component(&kind) {
            return Err(TopicError::InvalidKind { kind });
        }

        let prefix = target_prefix(&mode, &kind, legacy);
        Ok(Self {
            mode,
            kind,
            legacy,
            prefix,
        })
    }

    pub fn mode(&self) -> &ScopeMode {
        &self.mode
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn legacy_mode(&self) -> LegacyTopicMode {
        self.legacy
    }

    /// Тот же вид данных и старый режим, но другая область.
    pub fn with_scope(
        &self,
        mode: ScopeMode,
    ) -> Self {
        let prefix = target_prefix(&mode, &self.kind, self.legacy);
        Self {
            mode,
            kind: self.kind.clone(),
            legacy: self.legacy,
            prefix,
        }
    }

    /// Целевой префикс, включая завершающий `:`.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Применяет пространство имён к сырому топику.
    ///
    /// Идемпотентна: топик, уже начинающийся ровно с целевого префикса, не
    /// получает его второй раз. Топик с любым другим пространством имён —
    /// ошибка конфигурации. В режиме `Unscoped` + `Bare` топик возвращается
    /// без изменений после проверки грамматики.
    pub fn apply(
        &self,
        raw: &str,
    ) -> Result<Topic, TopicError> {
        let Some(prefix) = self.prefix.as_deref() else {
            TopicPath::parse(raw)?;
            return Ok(Topic::new(raw));
        };

        let rest = raw.strip_prefix(prefix).unwrap_or(raw);
        if rest.contains(NAMESPACE_SEPARATOR) {
            return Err(TopicError::ForeignNamespace {
                topic: raw.to_string(),
                expected: prefix.trim_end_matches(NAMESPACE_SEPARATOR).to_string(),
            });
        }
        TopicPath::parse(rest)?;

        Ok(Topic::new(format!("{prefix}{rest}")))
    }
}

/// `namespace(scope, kind, topic)` для режима без области по умолчанию
/// ([`LegacyTopicMode::Bare`]).
pub fn namespace(
    scope: &ScopeMode,
    kind: &str,
    topic: &str,
) -> Result<Topic, TopicError> {
    Namespacer::new(scope.clone(), kind, LegacyTopicMode::default())?.apply(topic)
}
