//! The single owner of session state: context cache, conversation history,
//! watch flag. Every input line is resolved here to display text.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::context::ContextAggregator;
use crate::history::ConversationHistory;
use crate::llm::{AnthropicClient, ModelClient, ModelRequest};
use crate::notice::{prompting_notifier, stdout_notifier, Notifier};
use crate::probe::{ProbeRunner, ShellProbe};
use crate::prompts::build_prompt;
use crate::retry::{Delay, ExecutionOutcome, RetryPolicy, RetryingExecutor, TokioDelay};
use crate::router::{dispatch, route, Domain, MetaCommand, Route, BANNER, HELP_TEXT};
use crate::scanner::ScanFilter;
use crate::watcher::{ChangeAnalyst, ChangeWatcher};

/// What the caller should do with a handled line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nothing,
    Text(String),
    /// Clear the screen, then print the text.
    Clear(String),
    /// Print the text and end the session.
    Exit(String),
}

/// External collaborators, injectable for tests.
pub struct Services {
    pub client: Arc<dyn ModelClient>,
    pub probes: Arc<dyn ProbeRunner>,
    pub delay: Arc<dyn Delay>,
    /// Retry notices, shown while a request is in flight.
    pub notifier: Notifier,
    /// File-change notices, which can arrive while the user is at the prompt.
    pub watch_notifier: Notifier,
}

impl Services {
    /// `interactive` restores the input prompt after file-change notices.
    pub fn live(root: &std::path::Path, config: &Config, interactive: bool) -> Self {
        Self {
            client: Arc::new(AnthropicClient::from_config(&config.model)),
            probes: Arc::new(ShellProbe::new(root.to_path_buf(), config.context.probe_timeout())),
            delay: Arc::new(TokioDelay),
            notifier: stdout_notifier(),
            watch_notifier: if interactive { prompting_notifier() } else { stdout_notifier() },
        }
    }
}

pub struct Session {
    config: Config,
    aggregator: ContextAggregator,
    history: ConversationHistory,
    executor: RetryingExecutor,
    watcher: ChangeWatcher,
}

impl Session {
    pub fn new(root: PathBuf, config: Config, services: Services) -> Self {
        let Services {
            client,
            probes,
            delay,
            notifier,
            watch_notifier,
        } = services;

        let filter = ScanFilter::new(&config.scan.exclude_dir_names);
        let aggregator = ContextAggregator::new(root.clone(), config.context.clone(), filter, probes);
        let analyst = ChangeAnalyst::new(
            root.clone(),
            aggregator.invalidator(),
            client.clone(),
            config.model.model.clone(),
            config.model.analysis_max_tokens,
            config.watch.excerpt_chars,
            watch_notifier,
        );
        let watcher = ChangeWatcher::new(root, config.watch.roots.clone(), analyst);
        let executor = RetryingExecutor::new(client, RetryPolicy::from_config(&config.retry), delay, notifier);

        Self {
            history: ConversationHistory::new(config.history.capacity),
            config,
            aggregator,
            executor,
            watcher,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn aggregator(&self) -> &ContextAggregator {
        &self.aggregator
    }

    pub fn watcher(&self) -> &ChangeWatcher {
        &self.watcher
    }

    pub fn is_watching(&self) -> bool {
        self.watcher().is_watching()
    }

    /// Resolve one line of input. Never fails; errors are rendered as text.
    pub async fn handle_input(&mut self, input: &str) -> Reply {
        match route(input) {
            Route::Empty => Reply::Nothing,
            Route::Meta(meta) => self.handle_meta(meta),
            routed @ (Route::Canned { .. } | Route::Usage { .. }) => Reply::Text(self.run_route(routed).await),
            Route::Passthrough(text) => Reply::Text(self.ask(&text).await),
        }
    }

    /// One-shot domain command from already-split words.
    pub async fn run_domain(&mut self, domain: Domain, words: &[String]) -> String {
        self.run_route(dispatch(domain, words)).await
    }

    /// Domain dispatch always starts from a fresh snapshot.
    async fn run_route(&mut self, routed: Route) -> String {
        self.aggregator.invalidate();
        match routed {
            Route::Canned { invocation, prompt } => {
                tracing::debug!(domain = %invocation.domain, sub = ?invocation.subcommand, "canned prompt");
                self.ask(&prompt).await
            }
            Route::Usage { message, .. } => message.to_string(),
            Route::Passthrough(text) => self.ask(&text).await,
            Route::Empty | Route::Meta(_) => String::new(),
        }
    }

    fn handle_meta(&mut self, meta: MetaCommand) -> Reply {
        match meta {
            MetaCommand::Help => Reply::Text(HELP_TEXT.to_string()),
            MetaCommand::Clear => Reply::Clear(BANNER.to_string()),
            MetaCommand::Watch => Reply::Text(self.start_watching()),
            MetaCommand::Unwatch => Reply::Text(self.stop_watching()),
            MetaCommand::Exit => {
                self.watcher.stop();
                Reply::Exit("Marketing AI Terminal closed".to_string())
            }
        }
    }

    pub fn start_watching(&mut self) -> String {
        match self.watcher.start() {
            Ok(true) => "Starting file watcher...".to_string(),
            Ok(false) => "File watcher already running".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "watcher start failed");
                format!("Failed to start file watcher: {e:#}")
            }
        }
    }

    pub fn stop_watching(&mut self) -> String {
        if self.watcher.stop() {
            "File watcher stopped".to_string()
        } else {
            "File watcher is not running".to_string()
        }
    }

    /// Send `user_text` with the current snapshot and recent history. A
    /// successful reply is appended to the history.
    pub async fn ask(&mut self, user_text: &str) -> String {
        let context = self.aggregator.get_context().await;
        let history = self
            .history
            .render_recent(self.config.history.prompt_entries, self.config.history.excerpt_chars);
        let prompt = build_prompt(&context, &history, user_text);
        let request = ModelRequest::single(&self.config.model.model, self.config.model.max_tokens, prompt);

        let outcome = self.executor.execute(&request).await;
        if let ExecutionOutcome::Success { text, attempts } = &outcome {
            tracing::debug!(attempts, "model reply received");
            self.history.record(user_text, text.clone());
        }
        outcome.render()
    }
}
