//! Клиентская библиотека контент-менеджера для соцсетей.
//!
//! Работает с REST API сервиса по HTTP (`reqwest`) и держит состояние
//! клиентских сценариев:
//! - генерация текста через ИИ (`AiOrchestrator`);
//! - возврат с OAuth-авторизации (`OAuthCallbackHandler`);
//! - редактор постов (`PostEditor`);
//! - данные дашборда (`DashboardAggregator`).
//!
//! `ContentStudio` собирает всё это над одним HTTP-клиентом и одним
//! списком постов.
#![warn(missing_docs)]

mod ai;
mod api;
mod credential;
mod dashboard;
mod editor;
mod error;
mod http_client;
mod models;
mod oauth;
mod posts;

use std::sync::Arc;

pub use ai::{AiOrchestrator, AiSnapshot, ContentListener, QUICK_PROMPTS, QuickAction};
pub use api::{AccountApi, AiApi, DashboardApi, OAuthApi, PostApi};
pub use credential::{Credential, CredentialProvider, SessionCredentials};
pub use dashboard::{DashboardAggregator, DashboardSnapshot, Resource};
pub use editor::{EditorMode, EditorSnapshot, PostDraft, PostEditor};
pub use error::{ErrorPayload, SocialClientError, SocialClientResult, TRANSPORT_MESSAGE};
pub use http_client::{ClientConfig, HttpApiClient};
pub use models::{
    ConnectAccountRequest, ContentType, DashboardStats, GenerationRequest, GenerationResult,
    Platform, Post, PostFilter, PostPayload, PostStatistics, PostStatus, SocialAccount,
    SocialPlatform, Tone, format_count,
};
pub use oauth::{
    CONNECTED_MESSAGE, CallbackOutcome, CallbackPhase, ConnectionObserver, DEFAULT_ERROR_URL,
    DEFAULT_SUCCESS_URL, Location, MemoryLocation, OAuthCallbackHandler, OAuthErrorToken,
    OAuthRedirects,
};
pub use posts::{LoadTicket, PostCollection};

/// Клиентские сценарии над одним HTTP-клиентом.
///
/// Редактор и дашборд видят один и тот же список постов, а текст,
/// сгенерированный ИИ, сразу попадает в черновик редактора.
pub struct ContentStudio {
    api: Arc<HttpApiClient>,
    credentials: SessionCredentials,
    ai: Arc<AiOrchestrator<HttpApiClient>>,
    editor: Arc<PostEditor<HttpApiClient>>,
    dashboard: Arc<DashboardAggregator<HttpApiClient>>,
}

impl ContentStudio {
    /// Создаёт клиент и связывает сценарии между собой.
    pub fn new(config: ClientConfig, credentials: SessionCredentials) -> SocialClientResult<Self> {
        let api = Arc::new(HttpApiClient::new(config, Arc::new(credentials.clone()))?);
        let posts = Arc::new(PostCollection::new());

        let ai = Arc::new(AiOrchestrator::new(api.clone()));
        let editor = Arc::new(PostEditor::new(api.clone(), posts.clone()));
        let dashboard = Arc::new(DashboardAggregator::new(api.clone(), posts));

        let target = editor.clone();
        ai.on_content_changed(move |content| target.apply_generated_content(content));

        Ok(Self {
            api,
            credentials,
            ai,
            editor,
            dashboard,
        })
    }

    /// HTTP-клиент для прямых вызовов API.
    pub fn api(&self) -> &Arc<HttpApiClient> {
        &self.api
    }

    /// Сессия пользователя.
    pub fn credentials(&self) -> &SessionCredentials {
        &self.credentials
    }

    /// Генерация текста.
    pub fn ai(&self) -> &Arc<AiOrchestrator<HttpApiClient>> {
        &self.ai
    }

    /// Редактор постов.
    pub fn editor(&self) -> &Arc<PostEditor<HttpApiClient>> {
        &self.editor
    }

    /// Дашборд.
    pub fn dashboard(&self) -> &Arc<DashboardAggregator<HttpApiClient>> {
        &self.dashboard
    }

    /// Обработчик OAuth-колбэка; после подключения аккаунта он
    /// перезагружает дашборд.
    pub fn oauth_handler(
        &self,
        location: Arc<dyn Location>,
        redirects: OAuthRedirects,
    ) -> OAuthCallbackHandler<HttpApiClient> {
        OAuthCallbackHandler::new(self.api.clone(), location, redirects)
            .with_observer(self.dashboard.clone())
    }
}
