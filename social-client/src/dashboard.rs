use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::api::{AccountApi, DashboardApi, PostApi};
use crate::error::SocialClientResult;
use crate::models::{ConnectAccountRequest, DashboardStats, Post, PostFilter, SocialAccount};
use crate::oauth::ConnectionObserver;
use crate::posts::PostCollection;

#[derive(Debug, Clone)]
/// Состояние одного загружаемого ресурса.
pub struct Resource<T> {
    /// Идёт загрузка.
    pub loading: bool,
    /// Последняя ошибка загрузки.
    pub error: Option<String>,
    /// Последние успешно загруженные данные.
    pub data: Option<Arc<T>>,
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self {
            loading: false,
            error: None,
            data: None,
        }
    }
}

#[derive(Debug, Clone)]
/// Снимок данных дашборда.
pub struct DashboardSnapshot {
    /// Статистика.
    pub stats: Resource<DashboardStats>,
    /// Состояние загрузки постов; сами посты лежат в `posts`.
    pub posts_state: Resource<()>,
    /// Список постов.
    pub posts: Arc<Vec<Post>>,
    /// Подключённые аккаунты.
    pub accounts: Resource<Vec<SocialAccount>>,
}

/// Данные дашборда: статистика, посты и аккаунты.
///
/// Каждый ресурс грузится независимо и хранит свой флаг загрузки и ошибку;
/// ошибка одного не затирает данные другого.
pub struct DashboardAggregator<A> {
    api: Arc<A>,
    posts: Arc<PostCollection>,
    stats: Mutex<Resource<DashboardStats>>,
    posts_state: Mutex<Resource<()>>,
    accounts: Mutex<Resource<Vec<SocialAccount>>>,
}

async fn load_into<T, F>(
    slot: &Mutex<Resource<T>>,
    fallback: &str,
    call: F,
) -> SocialClientResult<Arc<T>>
where
    F: Future<Output = SocialClientResult<T>>,
{
    {
        let mut state = slot.lock();
        state.loading = true;
        state.error = None;
    }
    let result = call.await;

    let mut state = slot.lock();
    state.loading = false;
    match result {
        Ok(data) => {
            let data = Arc::new(data);
            state.data = Some(data.clone());
            Ok(data)
        }
        Err(err) => {
            warn!(error = %err, "{fallback}");
            state.error = Some(err.user_message(fallback));
            Err(err)
        }
    }
}

impl<A> DashboardAggregator<A>
where
    A: DashboardApi + PostApi + AccountApi,
{
    /// Создаёт дашборд над общим списком постов.
    pub fn new(api: Arc<A>, posts: Arc<PostCollection>) -> Self {
        Self {
            api,
            posts,
            stats: Mutex::new(Resource::default()),
            posts_state: Mutex::new(Resource::default()),
            accounts: Mutex::new(Resource::default()),
        }
    }

    /// Общий список постов.
    pub fn posts(&self) -> &Arc<PostCollection> {
        &self.posts
    }

    /// Текущее состояние.
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            stats: self.stats.lock().clone(),
            posts_state: self.posts_state.lock().clone(),
            posts: self.posts.snapshot(),
            accounts: self.accounts.lock().clone(),
        }
    }

    /// Загружает статистику.
    pub async fn load_stats(&self) -> SocialClientResult<Arc<DashboardStats>> {
        load_into(
            &self.stats,
            "Failed to load dashboard data",
            self.api.dashboard_stats(),
        )
        .await
    }

    /// Загружает список постов в общий список.
    pub async fn load_posts(&self) -> SocialClientResult<()> {
        let api = self.api.as_ref();
        load_into(&self.posts_state, "Failed to load posts", async {
            self.posts.reload(api, PostFilter::All).await.map(|_| ())
        })
        .await
        .map(|_| ())
    }

    /// Загружает статистику и посты параллельно.
    pub async fn load_all(
        &self,
    ) -> (SocialClientResult<Arc<DashboardStats>>, SocialClientResult<()>) {
        tokio::join!(self.load_stats(), self.load_posts())
    }

    /// Просит сервер пересчитать статистику аккаунтов и перезагружает её.
    ///
    /// Если пересчёт не удался, статистика не перезагружается.
    pub async fn refresh_account_stats(&self) -> SocialClientResult<Arc<DashboardStats>> {
        if let Err(err) = self.api.refresh_dashboard().await {
            warn!(error = %err, "account stats refresh failed");
            self.stats.lock().error = Some(err.user_message("Failed to refresh account stats"));
            return Err(err);
        }
        info!("account stats recomputed, reloading");
        self.load_stats().await
    }

    /// Загружает подключённые аккаунты.
    pub async fn load_accounts(&self) -> SocialClientResult<Arc<Vec<SocialAccount>>> {
        load_into(
            &self.accounts,
            "Failed to load connected accounts",
            self.api.list_accounts(),
        )
        .await
    }

    /// Подключает аккаунт вручную и перезагружает список аккаунтов.
    pub async fn connect_account(
        &self,
        req: &ConnectAccountRequest,
    ) -> SocialClientResult<SocialAccount> {
        let account = self.surface_account_error(
            self.api.connect_account(req).await,
            "Failed to connect account",
        )?;
        self.load_accounts().await?;
        Ok(account)
    }

    /// Отключает аккаунт и перезагружает список аккаунтов.
    pub async fn disconnect_account(&self, id: i64) -> SocialClientResult<()> {
        self.surface_account_error(
            self.api.disconnect_account(id).await,
            "Failed to disconnect account",
        )?;
        self.load_accounts().await?;
        Ok(())
    }

    /// Обновляет статистику аккаунта и перезагружает список аккаунтов.
    pub async fn refresh_account(&self, id: i64) -> SocialClientResult<()> {
        self.surface_account_error(
            self.api.refresh_account(id).await,
            "Failed to refresh account",
        )?;
        self.load_accounts().await?;
        Ok(())
    }

    fn surface_account_error<T>(
        &self,
        result: SocialClientResult<T>,
        fallback: &str,
    ) -> SocialClientResult<T> {
        result.inspect_err(|err| {
            warn!(error = %err, "{fallback}");
            self.accounts.lock().error = Some(err.user_message(fallback));
        })
    }
}

#[async_trait]
impl<A> ConnectionObserver for DashboardAggregator<A>
where
    A: DashboardApi + PostApi + AccountApi,
{
    async fn account_connected(&self) {
        // ошибки уже лежат в состоянии ресурсов
        let _ = tokio::join!(self.load_stats(), self.load_accounts());
    }
}
