use serde_json::Value;
use thiserror::Error;

/// Сообщение для пользователя при недоступности сервера.
pub const TRANSPORT_MESSAGE: &str = "Network error: unable to reach the server. Please try again.";

#[derive(Debug, Clone, PartialEq, Default)]
/// Тело неуспешного ответа сервера в том виде, в каком оно пришло.
pub enum ErrorPayload {
    /// Пустое тело.
    #[default]
    Empty,
    /// Текст, не являющийся JSON.
    Text(String),
    /// JSON-документ (в том числе JSON-строка).
    Json(Value),
}

impl ErrorPayload {
    /// Разбирает сырое тело ответа.
    pub fn from_body(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    /// Возвращает тело, если это простая строка (текст или JSON-строка).
    pub fn as_plain_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Json(Value::String(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Извлекает сообщение сервера: простая строка либо поле
    /// `errorMessage` / `error` / `message` JSON-объекта.
    pub fn message(&self) -> Option<String> {
        if let Some(text) = self.as_plain_str() {
            return non_blank(text);
        }
        let Self::Json(Value::Object(map)) = self else {
            return None;
        };
        ["errorMessage", "error", "message"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find_map(non_blank)
    }
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.to_string())
}

#[derive(Debug, Error)]
/// Ошибки клиентской библиотеки `social-client`.
pub enum SocialClientError {
    /// Не заполнено обязательное поле; запрос в сеть не отправлялся.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Предыдущий запрос ещё выполняется.
    #[error("another request is already in progress")]
    Busy,

    /// Сервер недоступен или соединение оборвалось.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Нет токена, либо сервер отклонил его.
    #[error("unauthorized")]
    Unauthorized,

    /// Запрошенный ресурс не найден.
    #[error("not found")]
    NotFound,

    /// Сервер ответил ошибкой (`success:false` или не-2xx статус).
    #[error("application error: {}", .message.as_deref().unwrap_or("request rejected"))]
    Application {
        /// HTTP-статус, если ошибка пришла не-2xx ответом.
        status: Option<u16>,
        /// Сообщение сервера, если оно есть.
        message: Option<String>,
        /// Исходное тело ответа.
        payload: ErrorPayload,
    },

    /// Ответ сервера не удалось разобрать.
    #[error("decode error: {0}")]
    Decode(String),

    /// Некорректный URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Результат операций `social-client`.
pub type SocialClientResult<T> = Result<T, SocialClientError>;

impl SocialClientError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn rejected(message: Option<String>) -> Self {
        Self::Application {
            status: None,
            message,
            payload: ErrorPayload::Empty,
        }
    }

    pub(crate) fn from_http_status(status: reqwest::StatusCode, payload: ErrorPayload) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Self::Unauthorized
            }
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            _ => Self::Application {
                status: Some(status.as_u16()),
                message: payload.message(),
                payload,
            },
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, ErrorPayload::Empty);
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Transport(err)
    }

    /// Можно ли повторить ту же операцию без изменений на стороне пользователя.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Busy)
    }

    /// Переводит ошибку в строку для показа пользователю.
    ///
    /// `fallback` используется, когда сервер не прислал своего сообщения.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Busy => "Please wait for the current request to finish.".to_string(),
            Self::Transport(_) => TRANSPORT_MESSAGE.to_string(),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
            Self::NotFound => "The requested item was not found.".to_string(),
            Self::Application { message, .. } => message
                .clone()
                .unwrap_or_else(|| fallback.to_string()),
            Self::Decode(_) | Self::InvalidUrl(_) => fallback.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_prefers_error_message_field() {
        let payload =
            ErrorPayload::from_body(r#"{"success":false,"errorMessage":"quota exceeded"}"#);
        assert_eq!(payload.message().as_deref(), Some("quota exceeded"));
        assert!(payload.as_plain_str().is_none());
    }

    #[test]
    fn payload_keeps_plain_text() {
        let payload = ErrorPayload::from_body("  already connected \n");
        assert_eq!(payload, ErrorPayload::Text("already connected".to_string()));
        assert_eq!(payload.as_plain_str(), Some("already connected"));
    }

    #[test]
    fn payload_treats_json_string_as_plain() {
        let payload = ErrorPayload::from_body(r#""token_exchange_failed""#);
        assert_eq!(payload.as_plain_str(), Some("token_exchange_failed"));
    }

    #[test]
    fn blank_body_is_empty() {
        assert_eq!(ErrorPayload::from_body("   "), ErrorPayload::Empty);
        assert!(ErrorPayload::Empty.message().is_none());
    }

    #[test]
    fn status_mapping_keeps_payload_for_application_errors() {
        let err = SocialClientError::from_http_status(
            reqwest::StatusCode::BAD_REQUEST,
            ErrorPayload::from_body(r#"{"error":"bad tone"}"#),
        );
        match err {
            SocialClientError::Application {
                status, message, ..
            } => {
                assert_eq!(status, Some(400));
                assert_eq!(message.as_deref(), Some("bad tone"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_mapping_recognizes_auth_and_missing() {
        assert!(matches!(
            SocialClientError::from_http_status(
                reqwest::StatusCode::FORBIDDEN,
                ErrorPayload::Empty
            ),
            SocialClientError::Unauthorized
        ));
        assert!(matches!(
            SocialClientError::from_http_status(
                reqwest::StatusCode::NOT_FOUND,
                ErrorPayload::Empty
            ),
            SocialClientError::NotFound
        ));
    }

    #[test]
    fn user_message_falls_back_when_server_is_silent() {
        let err = SocialClientError::rejected(None);
        assert_eq!(err.user_message("Failed to generate content"), "Failed to generate content");

        let err = SocialClientError::rejected(Some("model overloaded".to_string()));
        assert_eq!(err.user_message("Failed to generate content"), "model overloaded");
    }
}
