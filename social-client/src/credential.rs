use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Clone, PartialEq, Eq)]
/// Bearer-токен текущей сессии.
pub struct Credential(String);

impl Credential {
    /// Создаёт токен из строки, обрезая пробелы.
    ///
    /// Пустая строка токеном не считается.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let token = raw.as_ref().trim();
        if token.is_empty() {
            return None;
        }
        Some(Self(token.to_string()))
    }

    /// Значение токена для заголовка `Authorization`.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Источник bearer-токена для исходящих запросов.
///
/// Клиент читает токен перед каждым запросом и никогда его не меняет.
pub trait CredentialProvider: Send + Sync {
    /// Текущий токен, если сессия открыта.
    fn bearer(&self) -> Option<Credential>;
}

#[derive(Debug, Clone, Default)]
/// Хранилище токена с жизненным циклом сессии.
///
/// Клоны разделяют одно состояние: закрытие сессии видно всем владельцам.
pub struct SessionCredentials {
    inner: Arc<RwLock<Option<Credential>>>,
}

impl SessionCredentials {
    /// Пустое хранилище (сессия не открыта).
    pub fn new() -> Self {
        Self::default()
    }

    /// Хранилище с уже открытой сессией.
    pub fn with_credential(credential: Credential) -> Self {
        let store = Self::new();
        store.start_session(credential);
        store
    }

    /// Открывает сессию с новым токеном, заменяя прежний.
    pub fn start_session(&self, credential: Credential) {
        *self.inner.write() = Some(credential);
    }

    /// Закрывает сессию (logout).
    pub fn end_session(&self) {
        *self.inner.write() = None;
    }

    /// Открыта ли сессия.
    pub fn is_active(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl CredentialProvider for SessionCredentials {
    fn bearer(&self) -> Option<Credential> {
        self.inner.read().clone()
    }
}
