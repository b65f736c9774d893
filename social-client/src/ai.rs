//! Оркестратор AI-операций над текстом поста.
//!
//! Четыре операции (generate, improve, hashtags, variations) делят один флаг
//! занятости и одно поле ошибки, а результаты пишут каждая в свой слот.
//! Пока запрос выполняется, новые операции отклоняются без обращения к сети.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::api::AiApi;
use crate::error::{SocialClientError, SocialClientResult};
use crate::models::{GenerationRequest, Platform, Tone};

const DEFAULT_IMPROVE_PROMPT: &str = "Improve this content";

/// Готовые инструкции для быстрого улучшения текста: `(название, инструкция)`.
pub const QUICK_PROMPTS: [(&str, &str); 6] = [
    (
        "Make it more engaging",
        "Make this content more engaging and attention-grabbing",
    ),
    (
        "Add emojis",
        "Add relevant emojis to this content to make it more visually appealing",
    ),
    (
        "Shorten it",
        "Make this content more concise while keeping the key message",
    ),
    (
        "Make it professional",
        "Rewrite this content in a more professional tone",
    ),
    (
        "Add call-to-action",
        "Add an effective call-to-action to this content",
    ),
    (
        "Make it casual",
        "Rewrite this content in a more casual, friendly tone",
    ),
];

/// Обработчик изменения текста; получает новый текст целиком.
pub type ContentListener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Быстрое действие панели инструментов редактора.
pub enum QuickAction {
    /// Улучшить текст.
    Improve,
    /// Дописать хэштеги в конец текста.
    Hashtags,
    /// Сгенерировать варианты текста.
    Variations,
    /// Улучшить текст по своей инструкции.
    CustomPrompt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Generate,
    Improve,
    Hashtags,
    Variations,
}

impl Operation {
    fn fallback_message(self) -> &'static str {
        match self {
            Operation::Generate => "Failed to generate content",
            Operation::Improve => "Failed to improve content",
            Operation::Hashtags => "Failed to generate hashtags",
            Operation::Variations => "Failed to generate variations",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Снимок состояния оркестратора.
pub struct AiSnapshot {
    /// Выполняется ли запрос.
    pub busy: bool,
    /// Последняя ошибка для показа пользователю.
    pub error: Option<String>,
    /// Слот текста (generate, improve, выбранный вариант).
    pub content: String,
    /// Слот хэштегов.
    pub hashtags: Vec<String>,
    /// Слот вариантов.
    pub variations: Vec<String>,
}

/// Сбрасывает флаг занятости при завершении операции, в том числе если
/// future был отброшен до завершения.
struct BusyGuard<'a> {
    state: &'a Mutex<AiSnapshot>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().busy = false;
    }
}

/// Оркестратор AI-операций.
pub struct AiOrchestrator<A: AiApi> {
    api: Arc<A>,
    state: Mutex<AiSnapshot>,
    listener: RwLock<Option<ContentListener>>,
}

impl<A: AiApi> AiOrchestrator<A> {
    /// Создаёт оркестратор поверх AI API.
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            state: Mutex::new(AiSnapshot::default()),
            listener: RwLock::new(None),
        }
    }

    /// Регистрирует обработчик изменения текста, заменяя прежний.
    pub fn on_content_changed(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        *self.listener.write() = Some(Arc::new(listener));
    }

    /// Текущее состояние.
    pub fn snapshot(&self) -> AiSnapshot {
        self.state.lock().clone()
    }

    /// Выполняется ли сейчас запрос.
    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Сбрасывает сообщение об ошибке.
    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    /// Генерирует новый текст по `prompt`.
    pub async fn generate(&self, req: &GenerationRequest) -> SocialClientResult<String> {
        if req.prompt.trim().is_empty() {
            return Err(self.reject(SocialClientError::validation("Please enter a prompt")));
        }

        let content = self
            .run(Operation::Generate, self.api.generate_content(req))
            .await?;
        self.store_content(&content);
        Ok(content)
    }

    /// Улучшает `existing_content`; пустой `prompt` заменяется стандартной
    /// инструкцией.
    pub async fn improve(&self, req: &GenerationRequest) -> SocialClientResult<String> {
        if req.existing_content.trim().is_empty() {
            return Err(self.reject(SocialClientError::validation("No content to improve")));
        }

        let mut outbound = req.clone();
        if outbound.prompt.trim().is_empty() {
            outbound.prompt = DEFAULT_IMPROVE_PROMPT.to_string();
        }

        let content = self
            .run(Operation::Improve, self.api.improve_content(&outbound))
            .await?;
        self.store_content(&content);
        Ok(content)
    }

    /// Подбирает хэштеги к тексту.
    ///
    /// Анализируется `existing_content`, при его отсутствии последний
    /// сгенерированный текст, при отсутствии обоих сам `prompt`.
    pub async fn extract_hashtags(
        &self,
        req: &GenerationRequest,
    ) -> SocialClientResult<Vec<String>> {
        let Some(content) = self.derive_content(req) else {
            return Err(self.reject(SocialClientError::validation(
                "Please provide content or a prompt for hashtag generation",
            )));
        };

        let mut outbound = req.clone();
        if outbound.prompt.trim().is_empty() {
            outbound.prompt = content.clone();
        }
        outbound.existing_content = content;

        let hashtags = self
            .run(Operation::Hashtags, self.api.generate_hashtags(&outbound))
            .await?;
        self.state.lock().hashtags = hashtags.clone();
        Ok(hashtags)
    }

    /// Генерирует варианты текста; источник текста выбирается так же, как в
    /// [`Self::extract_hashtags`].
    pub async fn generate_variations(
        &self,
        req: &GenerationRequest,
    ) -> SocialClientResult<Vec<String>> {
        let Some(content) = self.derive_content(req) else {
            return Err(self.reject(SocialClientError::validation(
                "Please provide content or a prompt for variations",
            )));
        };

        let mut outbound = req.clone();
        outbound.existing_content = content;

        let variations = self
            .run(
                Operation::Variations,
                self.api.generate_variations(&outbound),
            )
            .await?;
        self.state.lock().variations = variations.clone();
        Ok(variations)
    }

    /// Делает выбранный вариант текущим текстом. Запрос в сеть не отправляется.
    pub fn use_variation(&self, index: usize) -> SocialClientResult<String> {
        let variation = self.state.lock().variations.get(index).cloned();
        let Some(variation) = variation else {
            return Err(SocialClientError::validation(format!(
                "variation #{index} does not exist"
            )));
        };
        self.store_content(&variation);
        Ok(variation)
    }

    /// Выполняет быстрое действие над текстом редактора.
    ///
    /// Результат improve и custom-инструкции, а также текст с дописанными
    /// хэштегами уходят обработчику изменения текста. Варианты только
    /// попадают в свой слот.
    pub async fn run_quick_action(
        &self,
        action: &QuickAction,
        content: &str,
        tone: Tone,
        platform: Platform,
    ) -> SocialClientResult<()> {
        if content.trim().is_empty() {
            return Err(self.reject(SocialClientError::validation(
                "No content available for improvement",
            )));
        }

        let request = |prompt: &str| GenerationRequest {
            prompt: prompt.to_string(),
            tone,
            platform,
            existing_content: content.to_string(),
            ..GenerationRequest::default()
        };

        match action {
            QuickAction::Improve => {
                self.improve(&request("improve")).await?;
            }
            QuickAction::CustomPrompt(prompt) => {
                self.improve(&request(prompt)).await?;
            }
            QuickAction::Hashtags => {
                let hashtags = self.extract_hashtags(&request("hashtags")).await?;
                if !hashtags.is_empty() {
                    let tagged = format!("{content}\n\n{}", hashtags.join(" "));
                    self.notify(&tagged);
                }
            }
            QuickAction::Variations => {
                self.generate_variations(&request("variations")).await?;
            }
        }
        Ok(())
    }

    /// Состояние AI-сервиса. На общее состояние оркестратора не влияет.
    pub async fn check_status(&self) -> SocialClientResult<String> {
        self.api.ai_status().await
    }

    fn derive_content(&self, req: &GenerationRequest) -> Option<String> {
        if !req.existing_content.trim().is_empty() {
            return Some(req.existing_content.clone());
        }
        let generated = self.state.lock().content.clone();
        if !generated.trim().is_empty() {
            return Some(generated);
        }
        if !req.prompt.trim().is_empty() {
            return Some(req.prompt.clone());
        }
        None
    }

    async fn run<T, F>(&self, op: Operation, call: F) -> SocialClientResult<T>
    where
        F: Future<Output = SocialClientResult<T>>,
    {
        {
            let mut state = self.state.lock();
            if state.busy {
                debug!(?op, "ai request rejected: another one is in flight");
                return Err(SocialClientError::Busy);
            }
            state.busy = true;
            state.error = None;
        }
        let _guard = BusyGuard { state: &self.state };

        debug!(?op, "ai request started");
        call.await.inspect_err(|err| {
            warn!(?op, error = %err, "ai request failed");
            self.state.lock().error = Some(err.user_message(op.fallback_message()));
        })
    }

    fn reject(&self, err: SocialClientError) -> SocialClientError {
        let mut state = self.state.lock();
        if !state.busy {
            state.error = Some(err.user_message(""));
        }
        err
    }

    fn store_content(&self, content: &str) {
        self.state.lock().content = content.to_string();
        self.notify(content);
    }

    fn notify(&self, content: &str) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener(content);
        }
    }
}
