use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};
use url::{Url, form_urlencoded};

use crate::api::OAuthApi;
use crate::error::{SocialClientError, SocialClientResult};

/// Куда провайдер возвращает пользователя после успешного подключения.
pub const DEFAULT_SUCCESS_URL: &str = "http://localhost:3000/dashboard?linkedin_success=true";
/// Куда возвращать пользователя при ошибке подключения.
pub const DEFAULT_ERROR_URL: &str = "http://localhost:3000/dashboard";

const SUCCESS_PARAM: &str = "linkedin_success";
const ERROR_PARAM: &str = "linkedin_error";

/// Сообщение после успешного подключения аккаунта.
pub const CONNECTED_MESSAGE: &str = "LinkedIn account connected successfully!";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Код ошибки, который сервер кладёт в `linkedin_error`.
pub enum OAuthErrorToken {
    /// Аккаунт уже подключён.
    AlreadyConnected,
    /// Провайдер не вернул код.
    NoCode,
    /// Не удалось обменять код на токен.
    TokenExchangeFailed,
    /// Не удалось получить профиль.
    ProfileFetchFailed,
    /// Общая ошибка колбэка.
    CallbackError,
    /// Непредвиденная ошибка сервера.
    UnexpectedError,
    /// Незнакомый код.
    Unknown(String),
}

impl OAuthErrorToken {
    /// Разбирает значение параметра `linkedin_error`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "already_connected" => Self::AlreadyConnected,
            "no_code" => Self::NoCode,
            "token_exchange_failed" => Self::TokenExchangeFailed,
            "profile_fetch_failed" => Self::ProfileFetchFailed,
            "callback_error" => Self::CallbackError,
            "unexpected_error" => Self::UnexpectedError,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Значение в URL.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AlreadyConnected => "already_connected",
            Self::NoCode => "no_code",
            Self::TokenExchangeFailed => "token_exchange_failed",
            Self::ProfileFetchFailed => "profile_fetch_failed",
            Self::CallbackError => "callback_error",
            Self::UnexpectedError => "unexpected_error",
            Self::Unknown(raw) => raw,
        }
    }

    /// Текст для пользователя.
    pub fn message(&self) -> &'static str {
        match self {
            Self::AlreadyConnected => "This account is already connected.",
            Self::NoCode => "No authorization code returned.",
            Self::TokenExchangeFailed => "Failed to exchange authorization code for token.",
            Self::ProfileFetchFailed => "Failed to fetch provider profile.",
            Self::CallbackError => "OAuth callback reported an error.",
            Self::UnexpectedError | Self::Unknown(_) => "Connection failed.",
        }
    }

    /// Приводит произвольный текст ошибки к коду для URL.
    pub fn normalize(reason: &str) -> Self {
        let lowered = reason.trim().to_lowercase();
        let parsed = Self::parse(&lowered);
        if !matches!(parsed, Self::Unknown(_)) {
            return parsed;
        }
        if lowered.contains("already connected") {
            return Self::AlreadyConnected;
        }

        let mut slug = String::with_capacity(lowered.len());
        for ch in lowered.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch);
            } else if !slug.ends_with('_') {
                slug.push('_');
            }
        }
        let slug = slug.trim_matches('_');
        if slug.is_empty() {
            Self::CallbackError
        } else {
            Self::parse(slug)
        }
    }
}

impl fmt::Display for OAuthErrorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Фаза обработки колбэка.
pub enum CallbackPhase {
    #[default]
    /// Ничего не происходит.
    Idle,
    /// Код отправлен на обмен.
    ExchangePending,
    /// Обмен прошёл.
    ExchangeSucceeded,
    /// Обмен не удался.
    ExchangeFailed {
        /// Код ошибки для URL.
        reason: OAuthErrorToken,
    },
    /// Увидели результат в URL, адрес ещё не очищен.
    ResultObserved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Итог одного запуска обработчика.
pub enum CallbackOutcome {
    /// Аккаунт подключён.
    Connected,
    /// Подключение не удалось.
    Failed {
        /// Код ошибки.
        token: OAuthErrorToken,
    },
    /// Код обменян, страница уходит по новому адресу.
    Redirected {
        /// Адрес перехода.
        url: Url,
    },
    /// В адресе нет параметров колбэка.
    Nothing,
}

impl CallbackOutcome {
    /// Сообщение для пользователя, если оно есть.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::Connected => Some(CONNECTED_MESSAGE),
            Self::Failed { token } => Some(token.message()),
            Self::Redirected { .. } | Self::Nothing => None,
        }
    }
}

/// Адрес текущей страницы.
pub trait Location: Send + Sync {
    /// Текущий адрес.
    fn current(&self) -> Url;
    /// Меняет адрес без перезагрузки и без новой записи в истории.
    fn replace(&self, url: Url);
    /// Полный переход на другой адрес.
    fn navigate(&self, url: Url);
}

#[derive(Debug)]
struct MemoryLocationState {
    current: Url,
    replaced: Vec<Url>,
    navigated: Vec<Url>,
}

#[derive(Debug)]
/// [`Location`] в памяти: для CLI и тестов.
pub struct MemoryLocation {
    state: Mutex<MemoryLocationState>,
}

impl MemoryLocation {
    /// Начинает с адреса `current`.
    pub fn new(current: Url) -> Self {
        Self {
            state: Mutex::new(MemoryLocationState {
                current,
                replaced: Vec::new(),
                navigated: Vec::new(),
            }),
        }
    }

    /// Разбирает строку адреса.
    pub fn parse(current: &str) -> SocialClientResult<Self> {
        Ok(Self::new(Url::parse(current)?))
    }

    /// Адреса, переданные в [`Location::replace`].
    pub fn replaced(&self) -> Vec<Url> {
        self.state.lock().replaced.clone()
    }

    /// Адреса, переданные в [`Location::navigate`].
    pub fn navigated(&self) -> Vec<Url> {
        self.state.lock().navigated.clone()
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> Url {
        self.state.lock().current.clone()
    }

    fn replace(&self, url: Url) {
        let mut state = self.state.lock();
        state.replaced.push(url.clone());
        state.current = url;
    }

    fn navigate(&self, url: Url) {
        let mut state = self.state.lock();
        state.navigated.push(url.clone());
        state.current = url;
    }
}

#[async_trait]
/// Кого уведомить, когда аккаунт подключён.
pub trait ConnectionObserver: Send + Sync {
    /// Аккаунт подключён, данные дашборда устарели.
    async fn account_connected(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Канонические адреса возврата после обмена кода.
pub struct OAuthRedirects {
    /// Адрес после успеха.
    pub success_url: Url,
    /// Адрес после ошибки, к нему добавляется `linkedin_error`.
    pub error_url: Url,
}

impl OAuthRedirects {
    /// Разбирает оба адреса.
    pub fn parse(success_url: &str, error_url: &str) -> SocialClientResult<Self> {
        Ok(Self {
            success_url: Url::parse(success_url)?,
            error_url: Url::parse(error_url)?,
        })
    }

    /// Адреса локального фронтенда.
    pub fn local() -> SocialClientResult<Self> {
        Self::parse(DEFAULT_SUCCESS_URL, DEFAULT_ERROR_URL)
    }
}

struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    success: bool,
    error: Option<String>,
}

impl CallbackParams {
    fn from_url(url: &Url) -> Self {
        let mut params = Self {
            code: None,
            state: None,
            success: false,
            error: None,
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if !value.trim().is_empty() => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                SUCCESS_PARAM => params.success |= value == "true",
                ERROR_PARAM => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Обработчик возврата с OAuth-авторизации.
///
/// Запускается один раз при загрузке страницы. Код из адреса обменивается
/// не более одного раза за время жизни обработчика, даже при параллельных
/// запусках.
pub struct OAuthCallbackHandler<A> {
    api: Arc<A>,
    location: Arc<dyn Location>,
    redirects: OAuthRedirects,
    observer: Option<Arc<dyn ConnectionObserver>>,
    phase: Mutex<CallbackPhase>,
    consumed_codes: Mutex<HashSet<String>>,
}

impl<A: OAuthApi> OAuthCallbackHandler<A> {
    /// Создаёт обработчик.
    pub fn new(api: Arc<A>, location: Arc<dyn Location>, redirects: OAuthRedirects) -> Self {
        Self {
            api,
            location,
            redirects,
            observer: None,
            phase: Mutex::new(CallbackPhase::Idle),
            consumed_codes: Mutex::new(HashSet::new()),
        }
    }

    /// Подписывает наблюдателя на успешное подключение.
    pub fn with_observer(mut self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Текущая фаза.
    pub fn phase(&self) -> CallbackPhase {
        self.phase.lock().clone()
    }

    /// Разбирает текущий адрес и реагирует на параметры колбэка.
    pub async fn handle(&self) -> CallbackOutcome {
        let url = self.location.current();
        let params = CallbackParams::from_url(&url);

        if let Some(code) = params.code {
            return self.exchange(code, params.state).await;
        }

        let outcome = if let Some(raw) = params.error {
            let token = OAuthErrorToken::parse(&raw);
            warn!(token = %token, "provider connection failed");
            CallbackOutcome::Failed { token }
        } else if params.success {
            info!("provider account connected");
            CallbackOutcome::Connected
        } else {
            return CallbackOutcome::Nothing;
        };

        *self.phase.lock() = CallbackPhase::ResultObserved;
        self.scrub_result_params(url);

        if outcome == CallbackOutcome::Connected
            && let Some(observer) = &self.observer
        {
            observer.account_connected().await;
        }

        *self.phase.lock() = CallbackPhase::Idle;
        outcome
    }

    /// Получает адрес авторизации у сервера и уходит на него.
    pub async fn begin_connect(&self) -> SocialClientResult<Url> {
        let raw = self.api.linkedin_authorization_url().await?;
        let url = Url::parse(&raw)?;
        info!(host = url.host_str().unwrap_or_default(), "redirecting to provider");
        self.location.navigate(url.clone());
        Ok(url)
    }

    async fn exchange(&self, code: String, state: Option<String>) -> CallbackOutcome {
        if !self.consumed_codes.lock().insert(code.clone()) {
            info!("authorization code already exchanged");
            return CallbackOutcome::Nothing;
        }

        *self.phase.lock() = CallbackPhase::ExchangePending;
        let result = self
            .api
            .exchange_linkedin_code(&code, state.as_deref())
            .await;

        let target = match result {
            Ok(()) => {
                info!("authorization code exchanged");
                *self.phase.lock() = CallbackPhase::ExchangeSucceeded;
                self.redirects.success_url.clone()
            }
            Err(err) => {
                let reason = failure_reason(&err);
                warn!(error = %err, reason = %reason, "authorization code exchange failed");
                let mut target = self.redirects.error_url.clone();
                target
                    .query_pairs_mut()
                    .append_pair(ERROR_PARAM, reason.as_str());
                *self.phase.lock() = CallbackPhase::ExchangeFailed { reason };
                target
            }
        };

        self.location.navigate(target.clone());
        CallbackOutcome::Redirected { url: target }
    }

    fn scrub_result_params(&self, mut url: Url) {
        let Some(query) = url.query() else {
            return;
        };
        let segments: Vec<&str> = query.split('&').collect();
        let kept: Vec<&str> = segments
            .iter()
            .copied()
            .filter(|segment| !is_result_param(segment))
            .collect();
        if kept.len() == segments.len() {
            return;
        }

        // Остальные параметры переносятся байт в байт.
        let rest = kept.join("&");
        url.set_query((!rest.is_empty()).then_some(rest.as_str()));
        self.location.replace(url);
    }
}

fn is_result_param(segment: &str) -> bool {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .is_some_and(|(key, _)| key == SUCCESS_PARAM || key == ERROR_PARAM)
}

fn failure_reason(err: &SocialClientError) -> OAuthErrorToken {
    match err {
        SocialClientError::Application { payload, .. } => payload
            .as_plain_str()
            .map(OAuthErrorToken::normalize)
            .unwrap_or(OAuthErrorToken::CallbackError),
        _ => OAuthErrorToken::CallbackError,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use super::*;
    use crate::error::ErrorPayload;

    #[derive(Default)]
    struct FakeOAuthApi {
        exchanges: StdMutex<Vec<(String, Option<String>)>>,
        failure: Option<ErrorPayload>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeOAuthApi {
        fn exchanges(&self) -> Vec<(String, Option<String>)> {
            self.exchanges.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl OAuthApi for FakeOAuthApi {
        async fn linkedin_authorization_url(&self) -> SocialClientResult<String> {
            Ok("https://www.linkedin.com/oauth/v2/authorization?client_id=app".to_string())
        }

        async fn exchange_linkedin_code(
            &self,
            code: &str,
            state: Option<&str>,
        ) -> SocialClientResult<()> {
            self.exchanges
                .lock()
                .expect("lock")
                .push((code.to_string(), state.map(str::to_string)));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.failure {
                Some(payload) => Err(SocialClientError::Application {
                    status: Some(400),
                    message: payload.message(),
                    payload: payload.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionObserver for CountingObserver {
        async fn account_connected(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn handler(
        api: FakeOAuthApi,
        url: &str,
    ) -> (
        Arc<FakeOAuthApi>,
        Arc<MemoryLocation>,
        OAuthCallbackHandler<FakeOAuthApi>,
    ) {
        let api = Arc::new(api);
        let location = Arc::new(MemoryLocation::parse(url).expect("valid url"));
        let handler = OAuthCallbackHandler::new(
            api.clone(),
            location.clone(),
            OAuthRedirects::local().expect("valid redirects"),
        );
        (api, location, handler)
    }

    #[tokio::test]
    async fn code_is_exchanged_once_and_redirects_to_success() {
        let (api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/callback?code=abc123&state=s1",
        );

        let outcome = handler.handle().await;

        assert_eq!(
            api.exchanges(),
            vec![("abc123".to_string(), Some("s1".to_string()))]
        );
        assert_eq!(
            outcome,
            CallbackOutcome::Redirected {
                url: Url::parse(DEFAULT_SUCCESS_URL).expect("valid url")
            }
        );
        assert_eq!(location.navigated().len(), 1);
        assert_eq!(handler.phase(), CallbackPhase::ExchangeSucceeded);
    }

    #[tokio::test]
    async fn concurrent_runs_exchange_code_once() {
        let gate = Arc::new(Notify::new());
        let (api, _location, handler) = handler(
            FakeOAuthApi {
                gate: Some(gate.clone()),
                ..FakeOAuthApi::default()
            },
            "http://localhost:3000/callback?code=abc123&state=s1",
        );

        let (first, second) = tokio::join!(handler.handle(), async {
            tokio::task::yield_now().await;
            let outcome = handler.handle().await;
            gate.notify_one();
            outcome
        });

        assert!(matches!(first, CallbackOutcome::Redirected { .. }));
        assert_eq!(second, CallbackOutcome::Nothing);
        assert_eq!(api.exchanges().len(), 1);
    }

    #[tokio::test]
    async fn repeated_run_on_same_code_does_nothing() {
        let (api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/callback?code=abc123",
        );

        handler.handle().await;
        location.replace(Url::parse("http://localhost:3000/callback?code=abc123").expect("url"));
        let outcome = handler.handle().await;

        assert_eq!(outcome, CallbackOutcome::Nothing);
        assert_eq!(api.exchanges().len(), 1);
    }

    #[tokio::test]
    async fn failed_exchange_carries_normalized_reason() {
        let (_api, location, handler) = handler(
            FakeOAuthApi {
                failure: Some(ErrorPayload::Text(
                    "LinkedIn account already connected to another user".to_string(),
                )),
                ..FakeOAuthApi::default()
            },
            "http://localhost:3000/callback?code=abc123",
        );

        let outcome = handler.handle().await;

        let expected =
            Url::parse("http://localhost:3000/dashboard?linkedin_error=already_connected")
                .expect("url");
        assert_eq!(outcome, CallbackOutcome::Redirected { url: expected.clone() });
        assert_eq!(location.navigated(), vec![expected]);
        assert_eq!(
            handler.phase(),
            CallbackPhase::ExchangeFailed {
                reason: OAuthErrorToken::AlreadyConnected
            }
        );
    }

    #[tokio::test]
    async fn structured_failure_payload_falls_back_to_callback_error() {
        let (_api, location, handler) = handler(
            FakeOAuthApi {
                failure: Some(ErrorPayload::Json(
                    serde_json::json!({"error": "token_exchange_failed"}),
                )),
                ..FakeOAuthApi::default()
            },
            "http://localhost:3000/callback?code=abc123",
        );

        handler.handle().await;

        assert_eq!(
            location.navigated()[0].query(),
            Some("linkedin_error=callback_error")
        );
    }

    #[tokio::test]
    async fn code_takes_priority_over_result_params() {
        let (api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?code=abc123&linkedin_error=no_code",
        );

        let outcome = handler.handle().await;

        assert!(matches!(outcome, CallbackOutcome::Redirected { .. }));
        assert_eq!(api.exchanges().len(), 1);
        assert!(location.replaced().is_empty());
    }

    #[tokio::test]
    async fn success_param_notifies_observer_and_scrubs_url() {
        let observer = Arc::new(CountingObserver::default());
        let (_api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?tab=accounts&linkedin_success=true&page=2",
        );
        let handler = handler.with_observer(observer.clone());

        let outcome = handler.handle().await;

        assert_eq!(outcome, CallbackOutcome::Connected);
        assert_eq!(outcome.message(), Some("LinkedIn account connected successfully!"));
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            location.current().as_str(),
            "http://localhost:3000/dashboard?tab=accounts&page=2"
        );
        assert_eq!(handler.phase(), CallbackPhase::Idle);
    }

    #[tokio::test]
    async fn cleanup_keeps_other_params_byte_for_byte() {
        let (_api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?q=a%20b&debug&linkedin_success=true",
        );

        assert_eq!(handler.handle().await, CallbackOutcome::Connected);
        assert_eq!(
            location.current().as_str(),
            "http://localhost:3000/dashboard?q=a%20b&debug"
        );
    }

    #[tokio::test]
    async fn encoded_result_key_is_still_removed() {
        let (_api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?linkedin%5Ferror=invalid_state&tab=a+b",
        );

        let outcome = handler.handle().await;

        assert!(matches!(outcome, CallbackOutcome::Failed { .. }));
        assert_eq!(
            location.current().as_str(),
            "http://localhost:3000/dashboard?tab=a+b"
        );
    }

    #[tokio::test]
    async fn error_tokens_map_through_fixed_table() {
        let (_api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?linkedin_error=already_connected",
        );

        let outcome = handler.handle().await;

        assert_eq!(outcome.message(), Some("This account is already connected."));
        assert_eq!(location.current().as_str(), "http://localhost:3000/dashboard");

        let (_api, _location, handler) = handler_with_unknown();
        let outcome = handler.handle().await;
        assert_eq!(outcome.message(), Some("Connection failed."));
    }

    fn handler_with_unknown() -> (
        Arc<FakeOAuthApi>,
        Arc<MemoryLocation>,
        OAuthCallbackHandler<FakeOAuthApi>,
    ) {
        handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?linkedin_error=xyz",
        )
    }

    #[tokio::test]
    async fn error_wins_when_both_result_params_present() {
        let observer = Arc::new(CountingObserver::default());
        let (_api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?linkedin_success=true&linkedin_error=no_code",
        );
        let handler = handler.with_observer(observer.clone());

        let outcome = handler.handle().await;

        assert_eq!(
            outcome,
            CallbackOutcome::Failed {
                token: OAuthErrorToken::NoCode
            }
        );
        assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(location.current().query(), None);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (_api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?linkedin_success=true",
        );

        handler.handle().await;
        let second = handler.handle().await;

        assert_eq!(second, CallbackOutcome::Nothing);
        assert_eq!(location.replaced().len(), 1);
    }

    #[tokio::test]
    async fn url_without_params_is_left_alone() {
        let (api, location, handler) = handler(
            FakeOAuthApi::default(),
            "http://localhost:3000/dashboard?tab=posts",
        );

        assert_eq!(handler.handle().await, CallbackOutcome::Nothing);
        assert!(location.replaced().is_empty());
        assert!(api.exchanges().is_empty());
    }

    #[tokio::test]
    async fn begin_connect_navigates_to_provider() {
        let (_api, location, handler) =
            handler(FakeOAuthApi::default(), "http://localhost:3000/dashboard");

        let url = handler.begin_connect().await.expect("url parsed");

        assert_eq!(url.host_str(), Some("www.linkedin.com"));
        assert_eq!(location.navigated(), vec![url]);
    }

    #[test]
    fn normalize_slugifies_free_text() {
        assert_eq!(
            OAuthErrorToken::normalize("Token Exchange Failed"),
            OAuthErrorToken::TokenExchangeFailed
        );
        assert_eq!(
            OAuthErrorToken::normalize("Bad state: expired!"),
            OAuthErrorToken::Unknown("bad_state_expired".to_string())
        );
        assert_eq!(OAuthErrorToken::normalize("  !! "), OAuthErrorToken::CallbackError);
    }
}
