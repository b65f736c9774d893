use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::api::PostApi;
use crate::error::SocialClientResult;
use crate::models::{Post, PostFilter};

#[derive(Debug, Default)]
struct CollectionState {
    posts: Arc<Vec<Post>>,
    issued: u64,
    applied: u64,
}

impl CollectionState {
    /// Локальная правка новее любой уже начатой загрузки.
    fn commit_local(&mut self, posts: Vec<Post>) {
        self.applied = self.issued;
        self.posts = Arc::new(posts);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Номер загрузки списка, выданный [`PostCollection::begin_load`].
pub struct LoadTicket(u64);

#[derive(Debug, Default)]
/// Список сохранённых постов, общий для редактора и дашборда.
///
/// Читатели получают неизменяемый снимок `Arc<Vec<Post>>`; любая запись
/// собирает новый вектор, поэтому ранее выданные снимки не меняются.
pub struct PostCollection {
    inner: RwLock<CollectionState>,
}

impl PostCollection {
    /// Пустой список.
    pub fn new() -> Self {
        Self::default()
    }

    /// Текущий снимок списка.
    pub fn snapshot(&self) -> Arc<Vec<Post>> {
        self.inner.read().posts.clone()
    }

    /// Пост по идентификатору из текущего снимка.
    pub fn find(&self, id: i64) -> Option<Post> {
        self.inner.read().posts.iter().find(|post| post.id == id).cloned()
    }

    /// Регистрирует начало загрузки списка с сервера.
    pub fn begin_load(&self) -> LoadTicket {
        let mut state = self.inner.write();
        state.issued += 1;
        LoadTicket(state.issued)
    }

    /// Применяет результат загрузки, если более поздняя загрузка ещё не
    /// была применена. Возвращает `false` для устаревшего результата.
    pub fn finish_load(&self, ticket: LoadTicket, posts: Vec<Post>) -> bool {
        let mut state = self.inner.write();
        if ticket.0 <= state.applied {
            debug!(ticket = ticket.0, applied = state.applied, "stale post list dropped");
            return false;
        }
        state.applied = ticket.0;
        state.posts = Arc::new(posts);
        true
    }

    /// Загружает список с сервера и применяет его.
    pub async fn reload<A>(&self, api: &A, filter: PostFilter) -> SocialClientResult<bool>
    where
        A: PostApi + ?Sized,
    {
        let ticket = self.begin_load();
        let posts = api.list_posts(filter).await?;
        Ok(self.finish_load(ticket, posts))
    }

    /// Добавляет пост в начало списка.
    pub fn prepend(&self, post: Post) {
        let mut state = self.inner.write();
        let mut next = Vec::with_capacity(state.posts.len() + 1);
        next.push(post);
        next.extend(state.posts.iter().cloned());
        state.commit_local(next);
    }

    /// Заменяет пост с тем же идентификатором.
    pub fn replace_post(&self, updated: &Post) {
        let mut state = self.inner.write();
        let next = state
            .posts
            .iter()
            .map(|post| {
                if post.id == updated.id {
                    updated.clone()
                } else {
                    post.clone()
                }
            })
            .collect();
        state.commit_local(next);
    }

    /// Убирает пост из списка.
    pub fn remove(&self, id: i64) {
        let mut state = self.inner.write();
        let next = state
            .posts
            .iter()
            .filter(|post| post.id != id)
            .cloned()
            .collect();
        state.commit_local(next);
    }
}

#[cfg(test)]
pub(crate) fn post(id: i64, content: &str) -> Post {
    Post {
        id,
        title: None,
        content: content.to_string(),
        references: None,
        image_url: None,
        status: Default::default(),
        scheduled_time: None,
        published_at: None,
        created_at: None,
        updated_at: None,
        engagement_count: 0,
        likes_count: 0,
        shares_count: 0,
        comments_count: 0,
    }
}
