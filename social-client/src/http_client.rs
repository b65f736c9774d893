use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::api::{AccountApi, AiApi, DashboardApi, OAuthApi, PostApi};
use crate::credential::CredentialProvider;
use crate::error::{ErrorPayload, SocialClientError, SocialClientResult};
use crate::models::{
    ConnectAccountRequest, DashboardStats, GenerationRequest, GenerationResult, Platform, Post,
    PostFilter, PostPayload, SchedulePayload, SocialAccount,
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const NO_BODY: Option<&EmptyBody> = None;

#[derive(Debug, Serialize)]
struct EmptyBody {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HashtagRequestDto<'a> {
    prompt: &'a str,
    platform: Platform,
    existing_content: &'a str,
}

#[derive(Debug, Serialize)]
struct CodeExchangeDto<'a> {
    code: &'a str,
    state: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationUrlDto {
    authorization_url: String,
}

impl GenerationResult {
    fn into_success(self) -> SocialClientResult<Self> {
        if !self.success {
            return Err(SocialClientError::rejected(
                self.error_message.filter(|message| !message.trim().is_empty()),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
/// Параметры HTTP-клиента.
pub struct ClientConfig {
    /// Базовый URL сервера, например `http://localhost:8080`.
    pub base_url: String,
    /// Таймаут установки соединения.
    pub connect_timeout: Duration,
    /// Таймаут всего запроса.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Конфигурация с таймаутами по умолчанию.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone)]
/// HTTP-клиент для REST API сервиса.
///
/// Каждый запрос получает bearer-токен из [`CredentialProvider`]; если
/// сессия не открыта, запрос не отправляется и возвращается
/// [`SocialClientError::Unauthorized`].
pub struct HttpApiClient {
    base_url: String,
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl fmt::Debug for HttpApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpApiClient {
    /// Создаёт клиент с заданной конфигурацией и источником токена.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> SocialClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(SocialClientError::Transport)?;

        Ok(Self {
            base_url: config.base_url,
            client,
            credentials,
        })
    }

    /// Базовый URL сервера.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> SocialClientResult<RequestBuilder> {
        let credential = self
            .credentials
            .bearer()
            .ok_or(SocialClientError::Unauthorized)?;
        Ok(request.bearer_auth(credential.expose()))
    }

    async fn decode_error(response: Response) -> SocialClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        SocialClientError::from_http_status(status, ErrorPayload::from_body(&body))
    }

    /// отправляет запрос с токеном и превращает не-2xx ответ в ошибку
    async fn execute<TReq>(
        &self,
        method: Method,
        path: &str,
        body: Option<&TReq>,
    ) -> SocialClientResult<Response>
    where
        TReq: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        debug!(%method, %url, "sending request");

        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.authorize(request)?;

        let response = request.send().await.map_err(|err| {
            warn!(%method, path, error = %err, "request failed to complete");
            SocialClientError::from_reqwest(err)
        })?;
        if !response.status().is_success() {
            let status = response.status();
            let err = Self::decode_error(response).await;
            warn!(%method, path, %status, error = %err, "request rejected");
            return Err(err);
        }

        Ok(response)
    }

    async fn send_json<TReq, TRes>(
        &self,
        method: Method,
        path: &str,
        body: Option<&TReq>,
    ) -> SocialClientResult<TRes>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        self.execute(method, path, body)
            .await?
            .json::<TRes>()
            .await
            .map_err(SocialClientError::from_reqwest)
    }

    async fn send_ack<TReq>(
        &self,
        method: Method,
        path: &str,
        body: Option<&TReq>,
    ) -> SocialClientResult<()>
    where
        TReq: Serialize + ?Sized,
    {
        self.execute(method, path, body).await?;
        Ok(())
    }

    async fn generation<TReq>(
        &self,
        path: &str,
        body: &TReq,
    ) -> SocialClientResult<GenerationResult>
    where
        TReq: Serialize + ?Sized,
    {
        let result: GenerationResult = self.send_json(Method::POST, path, Some(body)).await?;
        result.into_success()
    }
}

fn require_content(result: GenerationResult) -> SocialClientResult<String> {
    result
        .generated_content
        .ok_or_else(|| SocialClientError::Decode("response has no generatedContent".to_string()))
}

#[async_trait]
impl AiApi for HttpApiClient {
    async fn generate_content(&self, req: &GenerationRequest) -> SocialClientResult<String> {
        require_content(self.generation("/api/ai/generate", req).await?)
    }

    async fn improve_content(&self, req: &GenerationRequest) -> SocialClientResult<String> {
        require_content(self.generation("/api/ai/improve", req).await?)
    }

    async fn generate_hashtags(&self, req: &GenerationRequest) -> SocialClientResult<Vec<String>> {
        let payload = HashtagRequestDto {
            prompt: &req.prompt,
            platform: req.platform,
            existing_content: &req.existing_content,
        };
        let result = self.generation("/api/ai/hashtags", &payload).await?;
        Ok(result.hashtags.unwrap_or_default())
    }

    async fn generate_variations(
        &self,
        req: &GenerationRequest,
    ) -> SocialClientResult<Vec<String>> {
        let result = self.generation("/api/ai/variations", req).await?;
        Ok(result.variations.unwrap_or_default())
    }

    async fn ai_status(&self) -> SocialClientResult<String> {
        self.execute(Method::GET, "/api/ai/status", NO_BODY)
            .await?
            .text()
            .await
            .map_err(SocialClientError::from_reqwest)
    }
}

#[async_trait]
impl PostApi for HttpApiClient {
    async fn list_posts(&self, filter: PostFilter) -> SocialClientResult<Vec<Post>> {
        self.send_json(Method::GET, filter.path(), NO_BODY).await
    }

    async fn get_post(&self, id: i64) -> SocialClientResult<Post> {
        self.send_json(Method::GET, &format!("/api/posts/{id}"), NO_BODY)
            .await
    }

    async fn create_post(&self, payload: &PostPayload) -> SocialClientResult<Post> {
        self.send_json(Method::POST, "/api/posts", Some(payload))
            .await
    }

    async fn update_post(&self, id: i64, payload: &PostPayload) -> SocialClientResult<Post> {
        self.send_json(Method::PUT, &format!("/api/posts/{id}"), Some(payload))
            .await
    }

    async fn delete_post(&self, id: i64) -> SocialClientResult<()> {
        self.send_ack(Method::DELETE, &format!("/api/posts/{id}"), NO_BODY)
            .await
    }

    async fn schedule_post(
        &self,
        id: i64,
        scheduled_time: Option<NaiveDateTime>,
    ) -> SocialClientResult<Post> {
        let payload = SchedulePayload { scheduled_time };
        self.send_json(
            Method::POST,
            &format!("/api/posts/{id}/schedule"),
            Some(&payload),
        )
        .await
    }

    async fn publish_post(&self, id: i64) -> SocialClientResult<Post> {
        self.send_json(
            Method::POST,
            &format!("/api/posts/{id}/publish"),
            Some(&EmptyBody {}),
        )
        .await
    }
}

#[async_trait]
impl DashboardApi for HttpApiClient {
    async fn dashboard_stats(&self) -> SocialClientResult<DashboardStats> {
        self.send_json(Method::GET, "/api/dashboard/stats", NO_BODY)
            .await
    }

    async fn refresh_dashboard(&self) -> SocialClientResult<()> {
        self.send_ack(Method::POST, "/api/dashboard/refresh", Some(&EmptyBody {}))
            .await
    }
}

#[async_trait]
impl AccountApi for HttpApiClient {
    async fn list_accounts(&self) -> SocialClientResult<Vec<SocialAccount>> {
        self.send_json(Method::GET, "/api/social-media/accounts", NO_BODY)
            .await
    }

    async fn connect_account(
        &self,
        req: &ConnectAccountRequest,
    ) -> SocialClientResult<SocialAccount> {
        self.send_json(Method::POST, "/api/social-media/connect", Some(req))
            .await
    }

    async fn disconnect_account(&self, id: i64) -> SocialClientResult<()> {
        self.send_ack(
            Method::DELETE,
            &format!("/api/social-media/accounts/{id}"),
            NO_BODY,
        )
        .await
    }

    async fn refresh_account(&self, id: i64) -> SocialClientResult<()> {
        self.send_ack(
            Method::POST,
            &format!("/api/social-media/accounts/{id}/refresh"),
            Some(&EmptyBody {}),
        )
        .await
    }
}

#[async_trait]
impl OAuthApi for HttpApiClient {
    async fn linkedin_authorization_url(&self) -> SocialClientResult<String> {
        let dto: AuthorizationUrlDto = self
            .send_json(Method::GET, "/api/oauth/linkedin/authorize", NO_BODY)
            .await?;
        Ok(dto.authorization_url)
    }

    async fn exchange_linkedin_code(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> SocialClientResult<()> {
        let payload = CodeExchangeDto { code, state };
        self.send_ack(
            Method::POST,
            "/api/oauth/linkedin/callback/frontend",
            Some(&payload),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::SessionCredentials;

    fn client(base_url: &str) -> HttpApiClient {
        HttpApiClient::new(ClientConfig::new(base_url), Arc::new(SessionCredentials::new()))
            .expect("client builds")
    }

    #[test]
    fn endpoint_normalizes_slashes() {
        let client = client("http://localhost:8080/");
        let full = client.endpoint("/api/posts");
        assert_eq!(full, "http://localhost:8080/api/posts");
    }

    #[test]
    fn hashtag_payload_is_a_subset() {
        let payload = HashtagRequestDto {
            prompt: "launch",
            platform: Platform::Twitter,
            existing_content: "We launched!",
        };
        let json = serde_json::to_value(&payload).expect("payload serializes");
        assert_eq!(
            json,
            serde_json::json!({
                "prompt": "launch",
                "platform": "twitter",
                "existingContent": "We launched!"
            })
        );
    }

    #[test]
    fn failed_generation_becomes_application_error() {
        let result = GenerationResult {
            success: false,
            error_message: Some("quota exceeded".to_string()),
            ..GenerationResult::default()
        };
        match result.into_success() {
            Err(SocialClientError::Application { message, .. }) => {
                assert_eq!(message.as_deref(), Some("quota exceeded"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn success_without_content_is_decode_error() {
        let result = GenerationResult {
            success: true,
            ..GenerationResult::default()
        };
        assert!(matches!(
            require_content(result),
            Err(SocialClientError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_sending() {
        // порт 9 (discard) не слушается; до него запрос дойти не должен
        let client = client("http://127.0.0.1:9");
        let err = client
            .get_post(1)
            .await
            .expect_err("request without credential must fail");
        assert!(matches!(err, SocialClientError::Unauthorized));
    }
}
