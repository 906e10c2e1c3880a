//! Rate-limit-aware request execution.
//!
//! Runs as an explicit state machine:
//! `Idle -> Requesting -> {Success | RateLimited -> (wait) -> Requesting | Failed}`.
//! Only rate-limit failures are retried, with a linearly growing wait. Every
//! other outcome terminates and is reported as text; nothing is raised past
//! this boundary.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::llm::{ModelClient, ModelError, ModelRequest};
use crate::notice::Notifier;

/// Suspension primitive used between attempts.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Wait before retrying after failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Requesting { attempt: u32 },
    RateLimited { attempt: u32, wait: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success { text: String, attempts: u32 },
    Failed { error: ModelError, attempt: u32, max_attempts: u32 },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    /// Displayable text; failures name the attempt, e.g.
    /// `Error (attempt 4/4): rate_limit (429): ...`.
    pub fn render(&self) -> String {
        match self {
            ExecutionOutcome::Success { text, .. } => text.clone(),
            ExecutionOutcome::Failed {
                error,
                attempt,
                max_attempts,
            } => format!("Error (attempt {attempt}/{max_attempts}): {error}"),
        }
    }
}

pub struct RetryingExecutor {
    client: Arc<dyn ModelClient>,
    policy: RetryPolicy,
    delay: Arc<dyn Delay>,
    notifier: Notifier,
}

impl RetryingExecutor {
    pub fn new(client: Arc<dyn ModelClient>, policy: RetryPolicy, delay: Arc<dyn Delay>, notifier: Notifier) -> Self {
        Self {
            client,
            policy,
            delay,
            notifier,
        }
    }

    pub async fn execute(&self, request: &ModelRequest) -> ExecutionOutcome {
        let mut state = RequestState::Idle;
        loop {
            state = match state {
                RequestState::Idle => RequestState::Requesting { attempt: 0 },
                RequestState::Requesting { attempt } => match self.client.complete(request.clone()).await {
                    Ok(text) => {
                        return ExecutionOutcome::Success {
                            text,
                            attempts: attempt + 1,
                        }
                    }
                    Err(e) if e.is_rate_limit() && attempt < self.policy.max_retries => {
                        let wait = self.policy.delay_for(attempt);
                        tracing::info!(attempt, wait_ms = wait.as_millis() as u64, error = %e, "rate limited; retrying");
                        RequestState::RateLimited { attempt, wait }
                    }
                    Err(error) => {
                        tracing::warn!(attempt, error = %error, "model request failed");
                        return ExecutionOutcome::Failed {
                            error,
                            attempt: attempt + 1,
                            max_attempts: self.policy.max_attempts(),
                        };
                    }
                },
                RequestState::RateLimited { attempt, wait } => {
                    (self.notifier)(&format!("Rate limited, retrying in {} seconds...", wait.as_secs()));
                    self.delay.wait(wait).await;
                    RequestState::Requesting { attempt: attempt + 1 }
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{collecting_notifier, silent_notifier};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted results, then succeeds.
    struct ScriptedClient {
        calls: AtomicU32,
        script: Mutex<VecDeque<Result<String, ModelError>>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn complete(&self, _request: ModelRequest) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Delay for RecordingDelay {
        async fn wait(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn rate_limited() -> Result<String, ModelError> {
        Err(ModelError::RateLimited {
            status: 429,
            message: "rate_limit_error: slow down".into(),
        })
    }

    fn request() -> ModelRequest {
        ModelRequest::single("m", 100, "hi")
    }

    #[tokio::test]
    async fn three_rate_limits_then_success() {
        let client = ScriptedClient::new(vec![rate_limited(), rate_limited(), rate_limited(), Ok("done".into())]);
        let delay = Arc::new(RecordingDelay::default());
        let (notifier, notices) = collecting_notifier();
        let exec = RetryingExecutor::new(client.clone(), RetryPolicy::default(), delay.clone(), notifier);

        let out = exec.execute(&request()).await;

        assert_eq!(out, ExecutionOutcome::Success { text: "done".into(), attempts: 4 });
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            *delay.waits.lock().unwrap(),
            vec![Duration::from_millis(2000), Duration::from_millis(4000), Duration::from_millis(6000)]
        );
        assert_eq!(
            *notices.lock().unwrap(),
            vec![
                "Rate limited, retrying in 2 seconds...",
                "Rate limited, retrying in 4 seconds...",
                "Rate limited, retrying in 6 seconds...",
            ]
        );
    }

    #[tokio::test]
    async fn exhausted_retries_name_attempt_four_of_four() {
        let client = ScriptedClient::new((0..10).map(|_| rate_limited()).collect());
        let delay = Arc::new(RecordingDelay::default());
        let exec = RetryingExecutor::new(client.clone(), RetryPolicy::default(), delay.clone(), silent_notifier());

        let out = exec.execute(&request()).await;

        assert!(!out.is_success());
        assert!(out.render().starts_with("Error (attempt 4/4): "), "{}", out.render());
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
        assert_eq!(delay.waits.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let client = ScriptedClient::new(vec![Err(ModelError::Api {
            status: 401,
            message: "authentication_error: bad key".into(),
        })]);
        let delay = Arc::new(RecordingDelay::default());
        let exec = RetryingExecutor::new(client.clone(), RetryPolicy::default(), delay.clone(), silent_notifier());

        let out = exec.execute(&request()).await;

        assert_eq!(out.render(), "Error (attempt 1/4): API error (401): authentication_error: bad key");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert!(delay.waits.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_delay_sleeps_for_the_policy_interval() {
        let client = ScriptedClient::new(vec![rate_limited(), Ok("ok".into())]);
        let exec = RetryingExecutor::new(client, RetryPolicy::default(), Arc::new(TokioDelay), silent_notifier());

        let started = tokio::time::Instant::now();
        let out = exec.execute(&request()).await;
        assert!(out.is_success());
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }

    #[test]
    fn delays_grow_linearly() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts(), 4);
        assert_eq!(p.delay_for(0), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(6));
    }
}
