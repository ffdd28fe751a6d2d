//! Model interaction: the completion capability and its retry policy.
//!
//! The pipeline only ever needs `complete(system, user) -> text`. That is the
//! [`CompletionModel`] trait; [`ProviderModel`] implements it over any
//! `edgequake_llm` provider, and tests inject canned doubles.
//!
//! ## Retry Strategy
//!
//! Only rate-limit answers are retried. The wait is the server's
//! `retry-after` hint when present, otherwise `retry_backoff_ms * 2^attempt`:
//! with the 2 s default and 3 retries that is 2 s → 4 s → 8 s. Every retry
//! goes through the shared rate limiter again. Auth, transport and timeout
//! failures skip the item at once.

use crate::config::FlashcardConfig;
use crate::error::{ItemError, ModelCallError};
use crate::output::WorkItem;
use crate::pipeline::limiter::RateLimiter;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Text returned by a model call plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// The single model operation the pipeline depends on.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<Completion, ModelCallError>;
}

/// [`CompletionModel`] backed by an `edgequake_llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &FlashcardConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl CompletionModel for ProviderModel {
    async fn complete(&self, system: &str, user: &str) -> Result<Completion, ModelCallError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| map_llm_error(e, self.timeout_secs))?;
        Ok(Completion {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Map a provider error onto the retry classes.
///
/// Typed variants decide first; providers that report everything as
/// `ApiError` or `ProviderError` still embed the HTTP status in the message.
fn map_llm_error(err: LlmError, timeout_secs: u64) -> ModelCallError {
    match err {
        LlmError::RateLimited(msg) => match ModelCallError::classify(&msg) {
            limited @ ModelCallError::RateLimited { .. } => limited,
            _ => ModelCallError::RateLimited {
                retry_after_secs: None,
            },
        },
        LlmError::AuthError(msg) => ModelCallError::Auth(msg),
        LlmError::Timeout => ModelCallError::Timeout { secs: timeout_secs },
        LlmError::NetworkError(msg) => ModelCallError::Transport(msg),
        other => ModelCallError::classify(other.to_string()),
    }
}

/// Build `CompletionOptions` from the run config.
fn build_options(config: &FlashcardConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Retry and timeout settings for one model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Zero disables the timeout.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FlashcardConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    fn backoff(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << attempt.min(16))),
        }
    }
}

/// Call the model for `item`, throttled by `limiter` and retried per `policy`.
pub async fn call_with_retry(
    model: &dyn CompletionModel,
    limiter: &dyn RateLimiter,
    system: &str,
    user: &str,
    item: WorkItem,
    policy: &RetryPolicy,
) -> Result<Completion, ItemError> {
    let mut attempt = 0u32;
    loop {
        limiter.acquire().await;
        debug!("{}: sending request (attempt {})", item, attempt + 1);

        let result = if policy.timeout.is_zero() {
            model.complete(system, user).await
        } else {
            match timeout(policy.timeout, model.complete(system, user)).await {
                Ok(result) => result,
                Err(_) => Err(ModelCallError::Timeout {
                    secs: policy.timeout.as_secs(),
                }),
            }
        };

        match result {
            Ok(completion) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    item, completion.input_tokens, completion.output_tokens
                );
                return Ok(completion);
            }
            Err(ModelCallError::RateLimited { retry_after_secs }) if attempt < policy.max_retries => {
                let wait = policy.backoff(attempt, retry_after_secs);
                attempt += 1;
                warn!(
                    "{}: rate limited, retry {}/{} after {:?}",
                    item, attempt, policy.max_retries, wait
                );
                sleep(wait).await;
            }
            Err(ModelCallError::RateLimited { .. }) => {
                return Err(ItemError::RateLimited {
                    item,
                    retries: policy.max_retries,
                });
            }
            Err(ModelCallError::Timeout { secs }) => {
                warn!("{}: timed out after {}s", item, secs);
                return Err(ItemError::Timeout { item, secs });
            }
            Err(e) => {
                warn!("{}: model call failed: {}", item, e);
                return Err(ItemError::ModelFailed {
                    item,
                    detail: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::limiter::Unlimited;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct Scripted {
        replies: Mutex<VecDeque<Result<Completion, ModelCallError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Completion, ModelCallError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionModel for Scripted {
        async fn complete(&self, _system: &str, _user: &str) -> Result<Completion, ModelCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Completion::new("done")))
        }
    }

    struct Slow;

    #[async_trait]
    impl CompletionModel for Slow {
        async fn complete(&self, _system: &str, _user: &str) -> Result<Completion, ModelCallError> {
            sleep(Duration::from_secs(120)).await;
            Ok(Completion::new("late"))
        }
    }

    const ITEM: WorkItem = WorkItem::Chunk { index: 1 };

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_ms: 2000,
            timeout: Duration::from_secs(60),
        }
    }

    fn limited() -> Result<Completion, ModelCallError> {
        Err(ModelCallError::RateLimited {
            retry_after_secs: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_retried_with_backoff() {
        let model = Scripted::new(vec![limited(), limited(), Ok(Completion::new("ok"))]);
        let start = Instant::now();
        let got = call_with_retry(&model, &Unlimited, "s", "u", ITEM, &policy())
            .await
            .unwrap();
        assert_eq!(got.text, "ok");
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(2000 + 4000));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_exhausts_retries() {
        let model = Scripted::new(vec![limited(), limited(), limited(), limited(), limited()]);
        let err = call_with_retry(&model, &Unlimited, "s", "u", ITEM, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, ItemError::RateLimited { retries: 3, .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_hint_is_honoured() {
        let model = Scripted::new(vec![
            Err(ModelCallError::RateLimited {
                retry_after_secs: Some(30),
            }),
            Ok(Completion::new("ok")),
        ]);
        let start = Instant::now();
        call_with_retry(&model, &Unlimited, "s", "u", ITEM, &policy())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let model = Scripted::new(vec![Err(ModelCallError::Auth("bad key".into()))]);
        let err = call_with_retry(&model, &Unlimited, "s", "u", ITEM, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, ItemError::ModelFailed { .. }));
        assert!(err.to_string().contains("bad key"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let err = call_with_retry(&Slow, &Unlimited, "s", "u", ITEM, &policy())
            .await
            .unwrap_err();
        assert!(matches!(err, ItemError::Timeout { secs: 60, .. }));
    }

    #[test]
    fn backoff_doubles() {
        let p = policy();
        assert_eq!(p.backoff(0, None), Duration::from_millis(2000));
        assert_eq!(p.backoff(2, None), Duration::from_millis(8000));
        assert_eq!(p.backoff(5, Some(3)), Duration::from_secs(3));
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&FlashcardConfig::default());
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn provider_errors_map_by_variant_before_text() {
        assert_eq!(
            map_llm_error(LlmError::RateLimited("slow down".into()), 60),
            ModelCallError::RateLimited { retry_after_secs: None }
        );
        assert_eq!(
            map_llm_error(LlmError::RateLimited("retry after 7 seconds".into()), 60),
            ModelCallError::RateLimited { retry_after_secs: Some(7) }
        );
        assert_eq!(
            map_llm_error(LlmError::AuthError("key revoked".into()), 60),
            ModelCallError::Auth("key revoked".into())
        );
        assert_eq!(
            map_llm_error(LlmError::Timeout, 45),
            ModelCallError::Timeout { secs: 45 }
        );
        // Untyped provider errors fall back to the status code in the text.
        assert!(map_llm_error(LlmError::ApiError("HTTP 429".into()), 60).is_retryable());
        assert_eq!(
            map_llm_error(LlmError::NetworkError("connection reset".into()), 60),
            ModelCallError::Transport("connection reset".into())
        );
    }
}
