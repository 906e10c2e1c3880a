//! Live file watching. A qualifying change drops the cached context and
//! triggers a short, unretried model call whose answer is printed on the
//! side channel.

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::context::CacheInvalidator;
use crate::llm::{ModelClient, ModelRequest};
use crate::notice::Notifier;
use crate::prompts::change_analysis_prompt;
use crate::reader::{excerpt, read_capped};

const IMPORTANT_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".json", ".md", ".sql", ".env"];
const IMPORTANT_NAMES: &[&str] = &["package.json", "vite.config.js", "server.js", "index.js"];
const IGNORED_COMPONENTS: &[&str] = &["node_modules", "dist", "build", "coverage"];

/// Source, config, markup, data and environment files, plus a few named
/// entry/config files.
pub fn is_important_file(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    IMPORTANT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) || IMPORTANT_NAMES.iter().any(|n| name.ends_with(n))
}

/// Paths under hidden or build/dependency directories never qualify.
pub fn is_ignored_path(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || IGNORED_COMPONENTS.contains(&&*part)
        }
        _ => false,
    })
}

/// Human label used in the analysis prompt.
pub fn file_type_label(path: &Path) -> &'static str {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let full = path.to_string_lossy();

    if name == "package.json" {
        "Package Configuration"
    } else if name.contains("server") || name.contains("app") {
        "Server/Application File"
    } else if ext == "jsx" || ext == "tsx" {
        "React Component"
    } else if ext == "js" && full.contains("frontend") {
        "Frontend JavaScript"
    } else if ext == "js" && full.contains("backend") {
        "Backend JavaScript"
    } else if ext == "json" {
        "Configuration File"
    } else if ext == "md" {
        "Documentation"
    } else if ext == "env" || name == ".env" {
        "Environment Configuration"
    } else {
        "Code File"
    }
}

/// Reacts to one changed file: invalidate, then ask for a brief impact note.
pub struct ChangeAnalyst {
    root: PathBuf,
    invalidator: CacheInvalidator,
    client: Arc<dyn ModelClient>,
    model: String,
    max_tokens: u32,
    excerpt_chars: usize,
    notifier: Notifier,
}

impl ChangeAnalyst {
    pub fn new(
        root: PathBuf,
        invalidator: CacheInvalidator,
        client: Arc<dyn ModelClient>,
        model: String,
        max_tokens: u32,
        excerpt_chars: usize,
        notifier: Notifier,
    ) -> Self {
        Self {
            root,
            invalidator,
            client,
            model,
            max_tokens,
            excerpt_chars,
            notifier,
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        if let Ok(rel) = path.strip_prefix(&self.root) {
            return rel.to_path_buf();
        }
        match self.root.canonicalize() {
            Ok(canon) => path.strip_prefix(&canon).unwrap_or(path).to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }

    /// Whether an event on `path` should be acted on at all.
    pub fn qualifies(&self, path: &Path) -> bool {
        is_important_file(path) && !is_ignored_path(&self.relative(path))
    }

    /// Handle a change to `path`. Returns the analysis text when one was
    /// produced; failures come back as `Analysis error: ...`, never as `Err`.
    pub async fn on_change(&self, path: &Path) -> Option<String> {
        if !self.qualifies(path) {
            tracing::trace!(path = %path.display(), "ignoring change");
            return None;
        }

        self.invalidator.invalidate();
        let shown = self.relative(path).to_string_lossy().replace('\\', "/");
        (self.notifier)(&format!("File changed: {shown}"));

        let read = read_capped(path);
        let content = read.content().filter(|c| !c.is_empty())?;
        let prompt = change_analysis_prompt(&shown, file_type_label(path), excerpt(content, self.excerpt_chars));
        let request = ModelRequest::single(&self.model, self.max_tokens, prompt);

        let text = match self.client.complete(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(path = %shown, error = %e, "change analysis failed");
                format!("Analysis error: {e}")
            }
        };
        (self.notifier)(&text);
        Some(text)
    }
}

struct ActiveWatch {
    // Dropping the watcher ends the subscription.
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

enum WatchState {
    Inactive,
    Watching(ActiveWatch),
}

pub struct ChangeWatcher {
    root: PathBuf,
    roots: Vec<PathBuf>,
    analyst: Arc<ChangeAnalyst>,
    state: WatchState,
}

impl ChangeWatcher {
    /// `roots` are relative to `root`.
    pub fn new(root: PathBuf, roots: Vec<PathBuf>, analyst: ChangeAnalyst) -> Self {
        Self {
            root,
            roots,
            analyst: Arc::new(analyst),
            state: WatchState::Inactive,
        }
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, WatchState::Watching(_))
    }

    /// Handler shared with the event task.
    pub fn analyst(&self) -> Arc<ChangeAnalyst> {
        self.analyst.clone()
    }

    /// Existing roots, canonicalised, with roots nested inside another root
    /// dropped (a recursive watch on the parent already covers them).
    pub fn effective_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .roots
            .iter()
            .filter_map(|r| self.root.join(r).canonicalize().ok())
            .collect();
        roots.sort();
        roots.dedup();
        let all = roots.clone();
        roots.retain(|r| !all.iter().any(|other| other != r && r.starts_with(other)));
        roots
    }

    /// Begin watching. Returns `Ok(false)` when already watching.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<bool> {
        if self.is_watching() {
            return Ok(false);
        }

        let roots = self.effective_roots();
        if roots.is_empty() {
            anyhow::bail!("none of the watch roots exist under {}", self.root.display());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_content_change(&event.kind) {
                    return;
                }
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        })
        .context("Failed to create filesystem watcher")?;

        for r in &roots {
            watcher
                .watch(r, RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch {}", r.display()))?;
        }
        tracing::info!(roots = ?roots, "file watcher started");

        let analyst = self.analyst();
        let task = tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                if !analyst.qualifies(&path) {
                    continue;
                }
                let analyst = analyst.clone();
                tokio::spawn(async move {
                    analyst.on_change(&path).await;
                });
            }
        });

        self.state = WatchState::Watching(ActiveWatch {
            _watcher: watcher,
            task,
        });
        Ok(true)
    }

    /// Tear down the subscription. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.state, WatchState::Inactive) {
            WatchState::Watching(active) => {
                active.task.abort();
                tracing::info!("file watcher stopped");
                true
            }
            WatchState::Inactive => false,
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(m) if !matches!(m, ModifyKind::Metadata(_)))
}
