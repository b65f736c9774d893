mod logging;
mod settings;

use std::fs;
use std::io;
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand, ValueEnum};
use social_client::{
    CallbackOutcome, ConnectAccountRequest, ContentStudio, ContentType, Credential,
    DashboardStats, GenerationRequest, MemoryLocation, Platform, Post, PostApi, PostFilter,
    QuickAction, SessionCredentials, SocialAccount, SocialClientError, SocialPlatform, Tone,
    format_count,
};
use tracing::debug;

use crate::logging::init_logging;
use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "social-cli", version, about = "CLI клиент контент-менеджера для соцсетей")]
struct Cli {
    /// Адрес сервера (по умолчанию API_BASE_URL).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Токен для этого запуска вместо сохранённого.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Сохранённый токен.
    #[command(subcommand)]
    Token(TokenCommand),
    /// Генерация текста.
    #[command(subcommand)]
    Ai(AiCommand),
    /// Посты.
    #[command(subcommand)]
    Posts(PostsCommand),
    /// Статистика.
    #[command(subcommand)]
    Dashboard(DashboardCommand),
    /// Подключённые аккаунты.
    #[command(subcommand)]
    Accounts(AccountsCommand),
    /// Подключение LinkedIn через OAuth.
    #[command(subcommand)]
    Linkedin(LinkedinCommand),
}

#[derive(Debug, Subcommand)]
enum TokenCommand {
    /// Сохраняет токен.
    Set {
        #[arg(value_name = "TOKEN")]
        value: String,
    },
    /// Удаляет сохранённый токен.
    Clear,
    /// Показывает, сохранён ли токен.
    Show,
}

#[derive(Debug, Args)]
struct StyleArgs {
    #[arg(long, default_value_t = Tone::Neutral)]
    tone: Tone,
    #[arg(long, default_value_t = Platform::General)]
    platform: Platform,
    #[arg(long = "type", default_value_t = ContentType::Post)]
    content_type: ContentType,
}

impl StyleArgs {
    fn request(&self, prompt: Option<String>, content: Option<String>) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.unwrap_or_default(),
            tone: self.tone,
            platform: self.platform,
            content_type: self.content_type,
            existing_content: content.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QuickKind {
    Improve,
    Hashtags,
    Variations,
    Custom,
}

#[derive(Debug, Subcommand)]
enum AiCommand {
    /// Новый текст по инструкции.
    Generate {
        #[arg(long)]
        prompt: String,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Улучшение готового текста.
    Improve {
        #[arg(long)]
        content: String,
        #[arg(long)]
        prompt: Option<String>,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Хэштеги к тексту.
    Hashtags {
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Варианты текста.
    Variations {
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Быстрое действие панели редактора.
    Quick {
        #[arg(long, value_enum)]
        action: QuickKind,
        #[arg(long)]
        content: String,
        /// Инструкция для `--action custom`.
        #[arg(long)]
        prompt: Option<String>,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Состояние AI-сервиса.
    Status,
}

#[derive(Debug, Subcommand)]
enum PostsCommand {
    /// Список постов.
    List {
        #[arg(long, default_value = "all")]
        filter: PostFilter,
    },
    /// Пост по id.
    Get {
        #[arg(long)]
        id: i64,
    },
    /// Создание поста.
    Create {
        #[arg(long)]
        content: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        references: Option<String>,
    },
    /// Обновление поста.
    ///
    /// Непереданные поля остаются как были.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        references: Option<String>,
    },
    /// Удаление поста.
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Планирование публикации, например `--at 2026-11-01T09:00:00`.
    Schedule {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        at: Option<NaiveDateTime>,
    },
    /// Публикация поста.
    Publish {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DashboardCommand {
    /// Статистика аккаунтов и постов.
    Stats,
    /// Пересчёт статистики на сервере.
    Refresh,
}

#[derive(Debug, Subcommand)]
enum AccountsCommand {
    /// Список аккаунтов.
    List,
    /// Подключение аккаунта по готовому токену.
    Connect {
        #[arg(long)]
        platform: SocialPlatform,
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: Option<String>,
    },
    /// Отключение аккаунта.
    Disconnect {
        #[arg(long)]
        id: i64,
    },
    /// Обновление статистики аккаунта.
    Refresh {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum LinkedinCommand {
    /// Адрес страницы авторизации.
    Authorize,
    /// Обработка адреса, на который вернул провайдер.
    Callback {
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::from_env().context("failed to load settings")?;
    init_logging(&settings.log_level)?;

    if let Command::Token(command) = &cli.command {
        return run_token(command, &settings.token_file);
    }

    let credentials = SessionCredentials::new();
    let credential = match cli.token {
        Some(token) => Credential::new(token),
        None => load_token(&settings.token_file)
            .with_context(|| format!("failed to read {}", settings.token_file.display()))?,
    };
    if let Some(credential) = credential {
        credentials.start_session(credential);
    }

    let server = normalize_server(cli.server.unwrap_or_else(|| settings.api_base_url.clone()));
    debug!(%server, "using server");
    let studio = ContentStudio::new(settings.client_config(server), credentials)
        .map_err(|err| map_client_error(err, "failed to build HTTP client"))?;

    match cli.command {
        Command::Token(_) => {}
        Command::Ai(command) => run_ai(&studio, command).await?,
        Command::Posts(command) => run_posts(&studio, command).await?,
        Command::Dashboard(command) => run_dashboard(&studio, command).await?,
        Command::Accounts(command) => run_accounts(&studio, command).await?,
        Command::Linkedin(command) => run_linkedin(&studio, &settings, command).await?,
    }

    Ok(())
}

fn run_token(command: &TokenCommand, path: &Path) -> Result<()> {
    match command {
        TokenCommand::Set { value } => {
            let token = Credential::new(value).context("token must not be blank")?;
            fs::write(path, token.expose())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Token saved to {}", path.display());
        }
        TokenCommand::Clear => {
            if path.exists() {
                fs::remove_file(path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
            }
            println!("Token cleared");
        }
        TokenCommand::Show => match load_token(path)? {
            Some(token) => println!("Token is set ({} chars)", token.expose().chars().count()),
            None => println!("Token is not set"),
        },
    }
    Ok(())
}

async fn run_ai(studio: &ContentStudio, command: AiCommand) -> Result<()> {
    let ai = studio.ai();
    match command {
        AiCommand::Generate { prompt, style } => {
            let content = ai
                .generate(&style.request(Some(prompt), None))
                .await
                .map_err(|err| map_client_error(err, "Failed to generate content"))?;
            println!("{content}");
        }
        AiCommand::Improve {
            content,
            prompt,
            style,
        } => {
            let content = ai
                .improve(&style.request(prompt, Some(content)))
                .await
                .map_err(|err| map_client_error(err, "Failed to improve content"))?;
            println!("{content}");
        }
        AiCommand::Hashtags {
            content,
            prompt,
            style,
        } => {
            let hashtags = ai
                .extract_hashtags(&style.request(prompt, content))
                .await
                .map_err(|err| map_client_error(err, "Failed to generate hashtags"))?;
            println!("{}", hashtags.join(" "));
        }
        AiCommand::Variations {
            content,
            prompt,
            style,
        } => {
            let variations = ai
                .generate_variations(&style.request(prompt, content))
                .await
                .map_err(|err| map_client_error(err, "Failed to generate variations"))?;
            print_variations(&variations);
        }
        AiCommand::Quick {
            action,
            content,
            prompt,
            style,
        } => {
            let action = quick_action(action, prompt)?;
            // результат приходит в черновик редактора через обработчик оркестратора
            studio.editor().open_new();
            ai.run_quick_action(&action, &content, style.tone, style.platform)
                .await
                .map_err(|err| map_client_error(err, "Quick action failed"))?;
            match action {
                QuickAction::Variations => print_variations(&ai.snapshot().variations),
                _ => println!("{}", studio.editor().snapshot().draft.content),
            }
        }
        AiCommand::Status => {
            let status = ai
                .check_status()
                .await
                .map_err(|err| map_client_error(err, "AI service is unavailable"))?;
            println!("{status}");
        }
    }
    Ok(())
}

async fn run_posts(studio: &ContentStudio, command: PostsCommand) -> Result<()> {
    let editor = studio.editor();
    match command {
        PostsCommand::List { filter } => {
            editor
                .posts()
                .reload(studio.api().as_ref(), filter)
                .await
                .map_err(|err| map_client_error(err, "Failed to load posts"))?;
            print_posts(&editor.posts().snapshot());
        }
        PostsCommand::Get { id } => {
            let post = studio
                .api()
                .get_post(id)
                .await
                .map_err(|err| map_client_error(err, "Failed to load post"))?;
            print_post("Post", &post);
        }
        PostsCommand::Create {
            content,
            title,
            references,
        } => {
            editor.open_new();
            editor.set_content(content);
            editor.set_title(title.unwrap_or_default());
            editor.set_references(references.unwrap_or_default());
            let post = editor
                .save()
                .await
                .map_err(|err| map_client_error(err, "Failed to save post"))?;
            print_post("Post created", &post);
        }
        PostsCommand::Update {
            id,
            content,
            title,
            references,
        } => {
            editor
                .open_existing(id)
                .await
                .map_err(|err| map_client_error(err, "Failed to load post"))?;
            if let Some(content) = content {
                editor.set_content(content);
            }
            if let Some(title) = title {
                editor.set_title(title);
            }
            if let Some(references) = references {
                editor.set_references(references);
            }
            let post = editor
                .save()
                .await
                .map_err(|err| map_client_error(err, "Failed to save post"))?;
            print_post("Post updated", &post);
        }
        PostsCommand::Delete { id } => {
            editor
                .delete(id)
                .await
                .map_err(|err| map_client_error(err, "Failed to delete post"))?;
            println!("Post deleted: id={id}");
        }
        PostsCommand::Schedule { id, at } => {
            let post = editor
                .schedule(id, at)
                .await
                .map_err(|err| map_client_error(err, "Failed to schedule post"))?;
            print_post("Post scheduled", &post);
        }
        PostsCommand::Publish { id } => {
            let post = editor
                .publish(id)
                .await
                .map_err(|err| map_client_error(err, "Failed to publish post"))?;
            print_post("Post published", &post);
        }
    }
    Ok(())
}

async fn run_dashboard(studio: &ContentStudio, command: DashboardCommand) -> Result<()> {
    let dashboard = studio.dashboard();
    let stats = match command {
        DashboardCommand::Stats => dashboard.load_stats().await,
        DashboardCommand::Refresh => dashboard.refresh_account_stats().await,
    }
    .map_err(|err| map_client_error(err, "Failed to load dashboard data"))?;
    print_stats(&stats);
    Ok(())
}

async fn run_accounts(studio: &ContentStudio, command: AccountsCommand) -> Result<()> {
    let dashboard = studio.dashboard();
    match command {
        AccountsCommand::List => {
            dashboard
                .load_accounts()
                .await
                .map_err(|err| map_client_error(err, "Failed to load connected accounts"))?;
        }
        AccountsCommand::Connect {
            platform,
            name,
            username,
            access_token,
            refresh_token,
        } => {
            let req = ConnectAccountRequest {
                platform,
                account_name: name,
                account_username: username,
                access_token,
                refresh_token,
            };
            let account = dashboard
                .connect_account(&req)
                .await
                .map_err(|err| map_client_error(err, "Failed to connect account"))?;
            println!("Account connected: id={}", account.id);
        }
        AccountsCommand::Disconnect { id } => {
            dashboard
                .disconnect_account(id)
                .await
                .map_err(|err| map_client_error(err, "Failed to disconnect account"))?;
            println!("Account disconnected: id={id}");
        }
        AccountsCommand::Refresh { id } => {
            dashboard
                .refresh_account(id)
                .await
                .map_err(|err| map_client_error(err, "Failed to refresh account"))?;
            println!("Account refreshed: id={id}");
        }
    }

    let accounts = dashboard.snapshot().accounts.data.unwrap_or_default();
    print_accounts(&accounts);
    Ok(())
}

async fn run_linkedin(
    studio: &ContentStudio,
    settings: &Settings,
    command: LinkedinCommand,
) -> Result<()> {
    let redirects = settings.redirects()?;
    match command {
        LinkedinCommand::Authorize => {
            let location = Arc::new(MemoryLocation::new(redirects.error_url.clone()));
            let url = studio
                .oauth_handler(location, redirects)
                .begin_connect()
                .await
                .map_err(|err| map_client_error(err, "Failed to start LinkedIn connection"))?;
            println!("Open in a browser: {url}");
        }
        LinkedinCommand::Callback { url } => {
            let location = Arc::new(
                MemoryLocation::parse(&url)
                    .map_err(|err| map_client_error(err, "callback URL is not valid"))?,
            );
            let handler = studio.oauth_handler(location, redirects);

            let mut outcome = handler.handle().await;
            if let CallbackOutcome::Redirected { url } = &outcome {
                println!("Redirected to {url}");
                // так же поступает страница дашборда после перехода
                outcome = handler.handle().await;
            }
            match outcome.message() {
                Some(message) => println!("{message}"),
                None => println!("Nothing to process in this URL"),
            }
        }
    }
    Ok(())
}

fn quick_action(kind: QuickKind, prompt: Option<String>) -> Result<QuickAction> {
    Ok(match kind {
        QuickKind::Improve => QuickAction::Improve,
        QuickKind::Hashtags => QuickAction::Hashtags,
        QuickKind::Variations => QuickAction::Variations,
        QuickKind::Custom => {
            let prompt = prompt
                .filter(|prompt| !prompt.trim().is_empty())
                .context("--prompt is required for --action custom")?;
            QuickAction::CustomPrompt(prompt)
        }
    })
}

fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

/// Токен из файла; пустой файл считается отсутствием токена.
fn load_token(path: &Path) -> io::Result<Option<Credential>> {
    if !path.exists() {
        return Ok(None);
    }

    Ok(Credential::new(fs::read_to_string(path)?))
}

fn map_client_error(err: SocialClientError, fallback: &str) -> anyhow::Error {
    let message = match &err {
        SocialClientError::Unauthorized => {
            "authorization required: run `social-cli token set <TOKEN>` or pass --token"
                .to_string()
        }
        _ => err.user_message(fallback),
    };
    debug!(error = ?err, "command failed");
    anyhow::anyhow!(message)
}

fn print_post(title: &str, post: &Post) {
    println!("{title}");
    println!("id: {}", post.id);
    println!("status: {}", post.status);
    if let Some(title) = &post.title {
        println!("title: {title}");
    }
    println!("content: {}", post.content);
    if let Some(references) = &post.references {
        println!("references: {references}");
    }
    if let Some(scheduled) = post.scheduled_time {
        println!("scheduled_time: {scheduled}");
    }
    if let Some(published) = post.published_at {
        println!("published_at: {published}");
    }
    println!(
        "engagement: {} (likes={}, shares={}, comments={})",
        post.engagement_count, post.likes_count, post.shares_count, post.comments_count
    );
}

fn print_posts(posts: &[Post]) {
    println!("Posts: {}", posts.len());
    for post in posts {
        println!(
            "- [{}] {} ({})",
            post.id,
            post.title.as_deref().unwrap_or("(untitled)"),
            post.status
        );
    }
}

fn print_variations(variations: &[String]) {
    for (index, variation) in variations.iter().enumerate() {
        println!("#{index}: {variation}");
    }
}

fn print_stats(stats: &DashboardStats) {
    println!("followers: {}", format_count(stats.total_followers));
    println!("following: {}", format_count(stats.total_following));
    println!("connected accounts: {}", stats.connected_accounts.len());
    if let Some(posts) = &stats.post_statistics {
        println!("posts: {}", posts.total_posts);
        println!(
            "  drafts: {} ({:.0}%)",
            posts.draft_posts,
            posts.share(posts.draft_posts)
        );
        println!(
            "  published: {} ({:.0}%)",
            posts.published_posts,
            posts.share(posts.published_posts)
        );
        println!(
            "  scheduled: {} ({:.0}%)",
            posts.scheduled_posts,
            posts.share(posts.scheduled_posts)
        );
        println!(
            "engagement: {} (likes={}, shares={}, comments={})",
            format_count(posts.total_engagement),
            format_count(posts.total_likes),
            format_count(posts.total_shares),
            format_count(posts.total_comments)
        );
    }
}

fn print_accounts(accounts: &[SocialAccount]) {
    println!("Accounts: {}", accounts.len());
    for account in accounts {
        println!(
            "- [{}] {} {}{} followers={}{}",
            account.id,
            account.platform,
            account.account_name,
            account
                .account_username
                .as_deref()
                .map(|username| format!(" (@{username})"))
                .unwrap_or_default(),
            format_count(account.followers_count),
            if account.is_active { "" } else { " inactive" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_server_keeps_scheme() {
        let s = normalize_server("https://example.com:8080".to_string());
        assert_eq!(s, "https://example.com:8080");
    }

    #[test]
    fn normalize_server_adds_http_scheme() {
        let s = normalize_server("127.0.0.1:8080".to_string());
        assert_eq!(s, "http://127.0.0.1:8080");
    }

    fn token_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("social-cli-{}-{name}", process::id()));
        fs::write(&path, content).expect("temp file written");
        path
    }

    #[test]
    fn load_token_trims_file_content() {
        let path = token_file("trimmed", "  abc.def.ghi \n");

        let token = load_token(&path).expect("file readable");

        assert_eq!(token.as_ref().map(Credential::expose), Some("abc.def.ghi"));
        fs::remove_file(path).expect("temp file removed");
    }

    #[test]
    fn load_token_treats_blank_or_missing_file_as_unset() {
        let path = token_file("blank", "   \n");

        assert!(load_token(&path).expect("file readable").is_none());
        fs::remove_file(&path).expect("temp file removed");
        assert!(load_token(&path).expect("missing file is fine").is_none());
    }

    #[test]
    fn token_set_writes_trimmed_value_and_rejects_blank() {
        let path = std::env::temp_dir().join(format!("social-cli-{}-set", process::id()));
        let _ = fs::remove_file(&path);
        let set = |value: &str| TokenCommand::Set {
            value: value.to_string(),
        };

        assert!(run_token(&set("   "), &path).is_err());
        assert!(!path.exists());

        run_token(&set(" secret \n"), &path).expect("token saved");
        assert_eq!(fs::read_to_string(&path).expect("file readable"), "secret");
        run_token(&TokenCommand::Clear, &path).expect("token cleared");
        assert!(!path.exists());
    }

    #[test]
    fn custom_quick_action_requires_prompt() {
        assert!(quick_action(QuickKind::Custom, None).is_err());
        assert!(quick_action(QuickKind::Custom, Some("  ".to_string())).is_err());
        assert_eq!(
            quick_action(QuickKind::Custom, Some("Make it shorter".to_string())).ok(),
            Some(QuickAction::CustomPrompt("Make it shorter".to_string()))
        );
    }

    #[test]
    fn unauthorized_points_to_token_command() {
        let err = map_client_error(SocialClientError::Unauthorized, "ignored");
        assert!(err.to_string().contains("social-cli token set"));
    }

    #[test]
    fn cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "social-cli",
            "--server",
            "localhost:9000",
            "ai",
            "generate",
            "--prompt",
            "Launch",
            "--tone",
            "casual",
            "--platform",
            "twitter",
        ])
        .expect("arguments parse");

        assert_eq!(cli.server.as_deref(), Some("localhost:9000"));
        match cli.command {
            Command::Ai(AiCommand::Generate { prompt, style }) => {
                assert_eq!(prompt, "Launch");
                assert_eq!(style.tone, Tone::Casual);
                assert_eq!(style.platform, Platform::Twitter);
                assert_eq!(style.content_type, ContentType::Post);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn posts_list_filter_parses() {
        let cli = Cli::try_parse_from(["social-cli", "posts", "list", "--filter", "drafts"])
            .expect("arguments parse");
        assert!(matches!(
            cli.command,
            Command::Posts(PostsCommand::List {
                filter: PostFilter::Drafts
            })
        ));
    }
}
