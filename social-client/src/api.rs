//! Контракты backend-сервисов, с которыми работают оркестраторы.
//!
//! Каждая группа эндпоинтов описана отдельным трейтом, чтобы компоненты
//! зависели только от того, что вызывают. [`crate::HttpApiClient`]
//! реализует все трейты поверх REST API.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::SocialClientResult;
use crate::models::{
    ConnectAccountRequest, DashboardStats, GenerationRequest, Post, PostFilter, PostPayload,
    SocialAccount,
};

#[async_trait]
/// AI-эндпоинты `/api/ai/*`.
pub trait AiApi: Send + Sync {
    /// Генерирует текст по инструкции.
    async fn generate_content(&self, req: &GenerationRequest) -> SocialClientResult<String>;

    /// Улучшает существующий текст.
    async fn improve_content(&self, req: &GenerationRequest) -> SocialClientResult<String>;

    /// Подбирает хэштеги.
    async fn generate_hashtags(&self, req: &GenerationRequest) -> SocialClientResult<Vec<String>>;

    /// Генерирует варианты текста.
    async fn generate_variations(&self, req: &GenerationRequest)
    -> SocialClientResult<Vec<String>>;

    /// Состояние AI-сервиса.
    async fn ai_status(&self) -> SocialClientResult<String>;
}

#[async_trait]
/// CRUD и публикация постов `/api/posts/*`.
pub trait PostApi: Send + Sync {
    /// Список постов.
    async fn list_posts(&self, filter: PostFilter) -> SocialClientResult<Vec<Post>>;

    /// Пост по идентификатору.
    async fn get_post(&self, id: i64) -> SocialClientResult<Post>;

    /// Создаёт пост.
    async fn create_post(&self, payload: &PostPayload) -> SocialClientResult<Post>;

    /// Обновляет пост.
    async fn update_post(&self, id: i64, payload: &PostPayload) -> SocialClientResult<Post>;

    /// Удаляет пост.
    async fn delete_post(&self, id: i64) -> SocialClientResult<()>;

    /// Планирует публикацию.
    async fn schedule_post(
        &self,
        id: i64,
        scheduled_time: Option<NaiveDateTime>,
    ) -> SocialClientResult<Post>;

    /// Публикует пост сразу.
    async fn publish_post(&self, id: i64) -> SocialClientResult<Post>;
}

#[async_trait]
/// Статистика `/api/dashboard/*`.
pub trait DashboardApi: Send + Sync {
    /// Данные дашборда.
    async fn dashboard_stats(&self) -> SocialClientResult<DashboardStats>;

    /// Просит сервер пересчитать статистику аккаунтов.
    async fn refresh_dashboard(&self) -> SocialClientResult<()>;
}

#[async_trait]
/// Подключённые аккаунты `/api/social-media/*`.
pub trait AccountApi: Send + Sync {
    /// Активные аккаунты пользователя.
    async fn list_accounts(&self) -> SocialClientResult<Vec<SocialAccount>>;

    /// Подключает аккаунт вручную.
    async fn connect_account(&self, req: &ConnectAccountRequest)
    -> SocialClientResult<SocialAccount>;

    /// Отключает аккаунт.
    async fn disconnect_account(&self, id: i64) -> SocialClientResult<()>;

    /// Обновляет статистику одного аккаунта.
    async fn refresh_account(&self, id: i64) -> SocialClientResult<()>;
}

#[async_trait]
/// OAuth-эндпоинты LinkedIn `/api/oauth/linkedin/*`.
pub trait OAuthApi: Send + Sync {
    /// URL страницы авторизации провайдера.
    async fn linkedin_authorization_url(&self) -> SocialClientResult<String>;

    /// Обменивает одноразовый код на подключение аккаунта.
    async fn exchange_linkedin_code(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> SocialClientResult<()>;
}
