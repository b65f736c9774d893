use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_variant<T: Copy>(
    all: &[T],
    name: fn(T) -> &'static str,
    raw: &str,
    kind: &str,
) -> Result<T, String> {
    let raw = raw.trim();
    all.iter()
        .copied()
        .find(|value| name(*value).eq_ignore_ascii_case(raw))
        .ok_or_else(|| {
            let expected: Vec<&str> = all.iter().map(|value| name(*value)).collect();
            format!("unknown {kind} '{raw}', expected one of: {}", expected.join(", "))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Тон генерируемого текста.
pub enum Tone {
    /// Нейтральный.
    #[default]
    Neutral,
    /// Деловой.
    Professional,
    /// Разговорный.
    Casual,
    /// С юмором.
    Humorous,
    /// Вдохновляющий.
    Inspirational,
    /// Обучающий.
    Educational,
}

impl Tone {
    /// Все значения в порядке отображения.
    pub const ALL: [Tone; 6] = [
        Tone::Neutral,
        Tone::Professional,
        Tone::Casual,
        Tone::Humorous,
        Tone::Inspirational,
        Tone::Educational,
    ];

    /// Имя значения в API.
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Humorous => "humorous",
            Tone::Inspirational => "inspirational",
            Tone::Educational => "educational",
        }
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, Self::as_str, s, "tone")
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Площадка, под которую пишется текст.
pub enum Platform {
    /// Без привязки к площадке.
    #[default]
    General,
    /// Twitter.
    Twitter,
    /// Facebook.
    Facebook,
    /// Instagram.
    Instagram,
    /// LinkedIn.
    Linkedin,
    /// TikTok.
    Tiktok,
}

impl Platform {
    /// Все значения в порядке отображения.
    pub const ALL: [Platform; 6] = [
        Platform::General,
        Platform::Twitter,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Tiktok,
    ];

    /// Имя значения в API.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::General => "general",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Tiktok => "tiktok",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, Self::as_str, s, "platform")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Формат публикации.
pub enum ContentType {
    /// Обычный пост.
    #[default]
    Post,
    /// Подпись к медиа.
    Caption,
    /// История.
    Story,
    /// Тред.
    Thread,
}

impl ContentType {
    /// Все значения в порядке отображения.
    pub const ALL: [ContentType; 4] = [
        ContentType::Post,
        ContentType::Caption,
        ContentType::Story,
        ContentType::Thread,
    ];

    /// Имя значения в API.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Caption => "caption",
            ContentType::Story => "story",
            ContentType::Thread => "thread",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, Self::as_str, s, "content type")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Запрос к AI-сервису.
pub struct GenerationRequest {
    /// Инструкция или тема.
    pub prompt: String,
    /// Тон.
    pub tone: Tone,
    /// Площадка.
    pub platform: Platform,
    /// Формат публикации.
    pub content_type: ContentType,
    /// Уже написанный текст (может быть пустым).
    pub existing_content: String,
}

impl GenerationRequest {
    /// Запрос с заданной инструкцией и значениями по умолчанию.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Устанавливает уже написанный текст.
    pub fn existing(mut self, content: impl Into<String>) -> Self {
        self.existing_content = content.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Ответ AI-сервиса в формате API.
///
/// Клиент превращает `success:false` в [`crate::SocialClientError::Application`],
/// поэтому наружу попадает только полезная нагрузка.
pub struct GenerationResult {
    /// Признак успеха.
    pub success: bool,
    /// Сгенерированный текст.
    pub generated_content: Option<String>,
    /// Хэштеги в порядке выдачи.
    pub hashtags: Option<Vec<String>>,
    /// Варианты текста в порядке выдачи.
    pub variations: Option<Vec<String>>,
    /// Тон, с которым работала модель.
    pub tone: Option<String>,
    /// Площадка, под которую работала модель.
    pub platform: Option<String>,
    /// Время генерации на сервере.
    pub generated_at: Option<NaiveDateTime>,
    /// Сообщение об ошибке при `success == false`.
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Статус поста, назначается сервером.
pub enum PostStatus {
    /// Черновик.
    #[default]
    #[serde(alias = "draft")]
    Draft,
    /// Опубликован.
    #[serde(alias = "published")]
    Published,
    /// Запланирован.
    #[serde(alias = "scheduled")]
    Scheduled,
    /// Публикация не удалась.
    #[serde(alias = "failed")]
    Failed,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Сохранённый пост.
pub struct Post {
    /// Идентификатор, назначенный сервером.
    pub id: i64,
    /// Заголовок.
    #[serde(default)]
    pub title: Option<String>,
    /// Текст поста.
    pub content: String,
    /// Ссылки и источники.
    #[serde(default)]
    pub references: Option<String>,
    /// Картинка.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Статус.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PostStatus,
    /// Запланированное время публикации.
    #[serde(default)]
    pub scheduled_time: Option<NaiveDateTime>,
    /// Фактическое время публикации.
    #[serde(default)]
    pub published_at: Option<NaiveDateTime>,
    /// Время создания.
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    /// Время последнего изменения.
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    /// Суммарная вовлечённость.
    #[serde(default, deserialize_with = "null_as_default")]
    pub engagement_count: i64,
    /// Лайки.
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes_count: i64,
    /// Репосты.
    #[serde(default, deserialize_with = "null_as_default")]
    pub shares_count: i64,
    /// Комментарии.
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments_count: i64,
}

impl Post {
    /// Поля поста в виде тела запроса create/update.
    pub fn payload(&self) -> PostPayload {
        PostPayload {
            title: self.title.clone(),
            content: self.content.clone(),
            references: self.references.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Тело запросов создания и обновления поста.
///
/// Пустые необязательные поля передаются как `null`.
pub struct PostPayload {
    /// Заголовок.
    pub title: Option<String>,
    /// Текст поста.
    pub content: String,
    /// Ссылки и источники.
    pub references: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SchedulePayload {
    pub(crate) scheduled_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Какие посты запрашивать.
pub enum PostFilter {
    /// Все посты пользователя.
    #[default]
    All,
    /// Только черновики.
    Drafts,
    /// Только опубликованные.
    Published,
}

impl PostFilter {
    pub(crate) fn path(self) -> &'static str {
        match self {
            PostFilter::All => "/api/posts",
            PostFilter::Drafts => "/api/posts/drafts",
            PostFilter::Published => "/api/posts/published",
        }
    }
}

impl FromStr for PostFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "drafts" | "draft" => Ok(Self::Drafts),
            "published" => Ok(Self::Published),
            other => Err(format!(
                "unknown post filter '{other}', expected one of: all, drafts, published"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Социальная сеть подключённого аккаунта.
pub enum SocialPlatform {
    /// Twitter.
    Twitter,
    /// Facebook.
    Facebook,
    /// Instagram.
    Instagram,
    /// LinkedIn.
    Linkedin,
    /// YouTube.
    Youtube,
    /// TikTok.
    Tiktok,
}

impl SocialPlatform {
    /// Все значения.
    pub const ALL: [SocialPlatform; 6] = [
        SocialPlatform::Twitter,
        SocialPlatform::Facebook,
        SocialPlatform::Instagram,
        SocialPlatform::Linkedin,
        SocialPlatform::Youtube,
        SocialPlatform::Tiktok,
    ];

    /// Имя значения в API.
    pub fn as_str(self) -> &'static str {
        match self {
            SocialPlatform::Twitter => "TWITTER",
            SocialPlatform::Facebook => "FACEBOOK",
            SocialPlatform::Instagram => "INSTAGRAM",
            SocialPlatform::Linkedin => "LINKEDIN",
            SocialPlatform::Youtube => "YOUTUBE",
            SocialPlatform::Tiktok => "TIKTOK",
        }
    }
}

impl FromStr for SocialPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::ALL, Self::as_str, s, "social platform")
    }
}

impl fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Подключённый аккаунт социальной сети. Только для чтения.
pub struct SocialAccount {
    /// Идентификатор аккаунта.
    pub id: i64,
    /// Социальная сеть.
    pub platform: SocialPlatform,
    /// Отображаемое имя.
    pub account_name: String,
    /// Логин в сети.
    #[serde(default)]
    pub account_username: Option<String>,
    /// Аватар.
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// Подписчики.
    #[serde(default, deserialize_with = "null_as_default")]
    pub followers_count: i64,
    /// Подписки.
    #[serde(default, deserialize_with = "null_as_default")]
    pub following_count: i64,
    /// Количество публикаций.
    #[serde(default, deserialize_with = "null_as_default")]
    pub posts_count: i64,
    /// Активен ли аккаунт.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
/// Запрос на ручное подключение аккаунта.
pub struct ConnectAccountRequest {
    /// Социальная сеть.
    pub platform: SocialPlatform,
    /// Отображаемое имя.
    pub account_name: String,
    /// Логин в сети.
    pub account_username: Option<String>,
    /// Токен доступа, выданный сетью.
    pub access_token: String,
    /// Токен обновления.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Сводка по постам пользователя.
pub struct PostStatistics {
    /// Всего постов.
    #[serde(deserialize_with = "null_as_default")]
    pub total_posts: i64,
    /// Черновики.
    #[serde(deserialize_with = "null_as_default")]
    pub draft_posts: i64,
    /// Опубликованные.
    #[serde(deserialize_with = "null_as_default")]
    pub published_posts: i64,
    /// Запланированные.
    #[serde(deserialize_with = "null_as_default")]
    pub scheduled_posts: i64,
    /// Суммарная вовлечённость.
    #[serde(deserialize_with = "null_as_default")]
    pub total_engagement: i64,
    /// Лайки.
    #[serde(deserialize_with = "null_as_default")]
    pub total_likes: i64,
    /// Репосты.
    #[serde(deserialize_with = "null_as_default")]
    pub total_shares: i64,
    /// Комментарии.
    #[serde(deserialize_with = "null_as_default")]
    pub total_comments: i64,
}

impl PostStatistics {
    /// Доля `count` от общего числа постов в процентах.
    ///
    /// При `total_posts <= 0` возвращает 0.
    pub fn share(&self, count: i64) -> f64 {
        if self.total_posts <= 0 {
            return 0.0;
        }
        count as f64 / self.total_posts as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Данные дашборда.
pub struct DashboardStats {
    /// Подписчики по всем аккаунтам.
    #[serde(deserialize_with = "null_as_default")]
    pub total_followers: i64,
    /// Подписки по всем аккаунтам.
    #[serde(deserialize_with = "null_as_default")]
    pub total_following: i64,
    /// Сводка по постам.
    pub post_statistics: Option<PostStatistics>,
    /// Подключённые аккаунты.
    #[serde(deserialize_with = "null_as_default")]
    pub connected_accounts: Vec<SocialAccount>,
}

/// Форматирует счётчик: `999`, `1.5K`, `2.0M`.
pub fn format_count(value: i64) -> String {
    if value >= 1_000_000 {
        return format!("{:.1}M", value as f64 / 1_000_000.0);
    }
    if value >= 1_000 {
        return format!("{:.1}K", value as f64 / 1_000.0);
    }
    value.max(0).to_string()
}
