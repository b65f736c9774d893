//! Редактор поста: создание нового и правка существующего.
//!
//! Режимы: `Closed`, `CreatingNew`, `EditingExisting(id)`. Успешное создание
//! переводит редактор в `EditingExisting` с идентификатором от сервера, так
//! что повторное сохранение станет обновлением того же поста.
//!
//! Каждое открытие и закрытие увеличивает номер сессии. Запрос, начатый в
//! прошлой сессии, по завершении не трогает режим, черновик и ошибку.

use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::PostApi;
use crate::error::{SocialClientError, SocialClientResult};
use crate::models::{Post, PostFilter, PostPayload};
use crate::posts::PostCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Режим редактора.
pub enum EditorMode {
    /// Редактор закрыт.
    #[default]
    Closed,
    /// Новый пост, ещё не сохранённый.
    CreatingNew,
    /// Правка сохранённого поста.
    EditingExisting(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Несохранённые поля поста.
pub struct PostDraft {
    /// Заголовок.
    pub title: String,
    /// Текст.
    pub content: String,
    /// Ссылки и источники.
    pub references: String,
}

impl PostDraft {
    /// Черновик из сохранённого поста.
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone().unwrap_or_default(),
            content: post.content.clone(),
            references: post.references.clone().unwrap_or_default(),
        }
    }

    /// Тело запроса: поля обрезаны, пустые необязательные поля становятся
    /// `None`. Пустой текст поста является ошибкой валидации.
    pub fn to_payload(&self) -> SocialClientResult<PostPayload> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(SocialClientError::validation("Post content is required"));
        }
        Ok(PostPayload {
            title: optional(&self.title),
            content: content.to_string(),
            references: optional(&self.references),
        })
    }
}

fn optional(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Снимок состояния редактора.
pub struct EditorSnapshot {
    /// Режим.
    pub mode: EditorMode,
    /// Черновик.
    pub draft: PostDraft,
    /// Идёт загрузка поста для правки.
    pub loading: bool,
    /// Количество незавершённых сохранений.
    pub saving: usize,
    /// Последняя ошибка для показа пользователю.
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct EditorState {
    snapshot: EditorSnapshot,
    session: u64,
}

impl EditorState {
    fn reset(&mut self, mode: EditorMode) -> u64 {
        self.session += 1;
        let saving = self.snapshot.saving;
        self.snapshot = EditorSnapshot {
            mode,
            saving,
            ..EditorSnapshot::default()
        };
        self.session
    }
}

struct SavingGuard<'a> {
    state: &'a Mutex<EditorState>,
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.snapshot.saving = state.snapshot.saving.saturating_sub(1);
    }
}

/// Редактор поста поверх API постов и общего списка.
pub struct PostEditor<A: PostApi> {
    api: Arc<A>,
    posts: Arc<PostCollection>,
    state: Mutex<EditorState>,
}

impl<A: PostApi> PostEditor<A> {
    /// Создаёт закрытый редактор.
    pub fn new(api: Arc<A>, posts: Arc<PostCollection>) -> Self {
        Self {
            api,
            posts,
            state: Mutex::new(EditorState::default()),
        }
    }

    /// Общий список постов.
    pub fn posts(&self) -> &Arc<PostCollection> {
        &self.posts
    }

    /// Текущее состояние.
    pub fn snapshot(&self) -> EditorSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Текущий режим.
    pub fn mode(&self) -> EditorMode {
        self.state.lock().snapshot.mode
    }

    /// Открывает пустой черновик нового поста.
    pub fn open_new(&self) {
        self.state.lock().reset(EditorMode::CreatingNew);
        debug!("editor opened for a new post");
    }

    /// Загружает пост целиком и открывает его для правки.
    pub async fn open_existing(&self, id: i64) -> SocialClientResult<()> {
        let session = {
            let mut state = self.state.lock();
            let session = state.reset(EditorMode::Closed);
            state.snapshot.loading = true;
            session
        };

        let loaded = self.api.get_post(id).await;

        let mut state = self.state.lock();
        if state.session != session {
            debug!(id, "post loaded after the editor moved on, ignoring");
            return Ok(());
        }
        state.snapshot.loading = false;
        match loaded {
            Ok(post) => {
                state.snapshot.mode = EditorMode::EditingExisting(post.id);
                state.snapshot.draft = PostDraft::from_post(&post);
                debug!(id, "editor opened for an existing post");
                Ok(())
            }
            Err(err) => {
                warn!(id, error = %err, "failed to load post for editing");
                state.snapshot.error = Some(err.user_message("Failed to load post"));
                Err(err)
            }
        }
    }

    /// Закрывает редактор, отбрасывая несохранённые изменения.
    ///
    /// Незавершённые сохранения не отменяются.
    pub fn close(&self) {
        self.state.lock().reset(EditorMode::Closed);
    }

    /// Меняет заголовок. В закрытом редакторе ничего не делает.
    pub fn set_title(&self, title: impl Into<String>) {
        self.edit(|draft| draft.title = title.into());
    }

    /// Меняет текст поста. В закрытом редакторе ничего не делает.
    pub fn set_content(&self, content: impl Into<String>) {
        self.edit(|draft| draft.content = content.into());
    }

    /// Меняет ссылки. В закрытом редакторе ничего не делает.
    pub fn set_references(&self, references: impl Into<String>) {
        self.edit(|draft| draft.references = references.into());
    }

    /// Подставляет текст, полученный от AI.
    pub fn apply_generated_content(&self, content: &str) {
        self.set_content(content);
    }

    fn edit(&self, change: impl FnOnce(&mut PostDraft)) {
        let mut state = self.state.lock();
        if state.snapshot.mode == EditorMode::Closed {
            return;
        }
        change(&mut state.snapshot.draft);
    }

    /// Сохраняет черновик: обновление, если пост уже сохранён, иначе создание.
    pub async fn save(&self) -> SocialClientResult<Post> {
        let (target, payload, session) = {
            let mut state = self.state.lock();
            let target = match state.snapshot.mode {
                EditorMode::Closed => {
                    return Err(SocialClientError::validation("No post is open for editing"));
                }
                EditorMode::CreatingNew => None,
                EditorMode::EditingExisting(id) => Some(id),
            };
            let payload = match state.snapshot.draft.to_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    state.snapshot.error = Some(err.user_message(""));
                    return Err(err);
                }
            };
            state.snapshot.error = None;
            state.snapshot.saving += 1;
            (target, payload, state.session)
        };
        let _guard = SavingGuard { state: &self.state };

        let saved = match target {
            Some(id) => self.update(id, &payload, session).await,
            None => self.create(&payload, session).await,
        };

        if let Err(err) = &saved {
            warn!(?target, error = %err, "failed to save post");
            let mut state = self.state.lock();
            if state.session == session {
                state.snapshot.error = Some(err.user_message("Failed to save post"));
            }
        }
        saved
    }

    async fn update(
        &self,
        id: i64,
        payload: &PostPayload,
        session: u64,
    ) -> SocialClientResult<Post> {
        let updated = self.api.update_post(id, payload).await?;
        info!(id, "post updated");

        if let Err(err) = self.posts.reload(self.api.as_ref(), PostFilter::All).await {
            warn!(error = %err, "post saved but the list refresh failed");
            let mut state = self.state.lock();
            if state.session == session {
                state.snapshot.error =
                    Some(err.user_message("Post saved, but the list could not be refreshed"));
            }
        }
        Ok(updated)
    }

    async fn create(&self, payload: &PostPayload, session: u64) -> SocialClientResult<Post> {
        let created = self.api.create_post(payload).await?;
        info!(id = created.id, "post created");

        self.posts.prepend(created.clone());
        let mut state = self.state.lock();
        if state.session == session {
            state.snapshot.mode = EditorMode::EditingExisting(created.id);
        }
        Ok(created)
    }

    /// Публикует пост и обновляет его в списке.
    pub async fn publish(&self, id: i64) -> SocialClientResult<Post> {
        let published = self
            .surface(self.api.publish_post(id).await, "Failed to publish post")?;
        self.posts.replace_post(&published);
        Ok(published)
    }

    /// Планирует публикацию и обновляет пост в списке.
    pub async fn schedule(
        &self,
        id: i64,
        scheduled_time: Option<NaiveDateTime>,
    ) -> SocialClientResult<Post> {
        let scheduled = self.surface(
            self.api.schedule_post(id, scheduled_time).await,
            "Failed to schedule post",
        )?;
        self.posts.replace_post(&scheduled);
        Ok(scheduled)
    }

    /// Удаляет пост; если он открыт в редакторе, редактор закрывается.
    pub async fn delete(&self, id: i64) -> SocialClientResult<()> {
        self.surface(self.api.delete_post(id).await, "Failed to delete post")?;
        self.posts.remove(id);
        if self.mode() == EditorMode::EditingExisting(id) {
            self.close();
        }
        Ok(())
    }

    fn surface<T>(&self, result: SocialClientResult<T>, fallback: &str) -> SocialClientResult<T> {
        result.inspect_err(|err| {
            warn!(error = %err, "{fallback}");
            self.state.lock().snapshot.error = Some(err.user_message(fallback));
        })
    }
}
