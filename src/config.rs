use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = ".marketing-ai.json";

/// Environment variable that overrides `model.model` at load time.
pub const MODEL_OVERRIDE_ENV: &str = "MARKETING_AI_MODEL";

/// Settings for the remote Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    /// Token budget for regular assistant turns.
    pub max_tokens: u32,
    /// Token budget for the side-channel change analysis call.
    pub analysis_max_tokens: u32,
    pub api_url: String,
    /// Name of the environment variable holding the API credential.
    pub api_key_env: String,
    /// Ceiling on establishing the connection only.
    pub connect_timeout_secs: u64,
    /// Whole-request ceiling. Unset: a started call runs to completion or failure.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4000,
            analysis_max_tokens: 300,
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            connect_timeout_secs: 30,
            request_timeout_secs: None,
        }
    }
}

/// Controls how the context snapshot is gathered and how long it stays valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Snapshot lifetime. A cached snapshot older than this is rebuilt.
    pub ttl_secs: u64,
    /// Depth limit for the project tree.
    pub tree_depth: usize,
    /// Wall-clock ceiling for each shell probe.
    pub probe_timeout_ms: u64,
    /// How many component files are inspected per snapshot.
    pub component_sample: usize,
    /// Result cap for pattern-based file searches.
    pub find_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            tree_depth: 4,
            probe_timeout_ms: 5_000,
            component_sample: 10,
            find_limit: 20,
        }
    }
}

impl ModelConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl ContextConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Hard cap on stored exchanges; the oldest is evicted first.
    pub capacity: usize,
    /// Number of recent exchanges injected into each prompt.
    pub prompt_entries: usize,
    /// Model replies are cut to this many characters when injected.
    pub excerpt_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            prompt_entries: 3,
            excerpt_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = max_retries + 1.
    pub max_retries: u32,
    /// Wait before retry `n` (0-based) is `(n + 1) * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directories to watch, relative to the project root.
    pub roots: Vec<PathBuf>,
    /// Characters of the changed file sent along with the analysis request.
    pub excerpt_chars: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            roots: vec![
                PathBuf::from("backend"),
                PathBuf::from("frontend"),
                PathBuf::from("."),
            ],
            excerpt_chars: 1_000,
        }
    }
}

/// Controls workspace scanning behavior (what to skip).
///
/// Build output, dependency and VCS directories are always skipped; these are
/// additional hard skips for noisy project directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (e.g. "generated", "tmp").
    pub exclude_dir_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub context: ContextConfig,
    pub history: HistoryConfig,
    pub retry: RetryConfig,
    pub watch: WatchConfig,
    pub scan: ScanConfig,
}

fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

fn read_config_file(path: &Path) -> Option<Config> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Config>(&text) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config");
            None
        }
    }
}

/// Load `.marketing-ai.json` from the project root, falling back to the copy in
/// the home directory and then to defaults. Never fails.
pub fn load_config(project_root: &Path) -> Config {
    let mut cfg = read_config_file(&project_root.join(CONFIG_FILE_NAME))
        .or_else(|| global_config_path().and_then(|p| read_config_file(&p)))
        .unwrap_or_default();

    if let Ok(model) = std::env::var(MODEL_OVERRIDE_ENV) {
        if !model.trim().is_empty() {
            cfg.model.model = model.trim().to_string();
        }
    }

    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_limits() {
        let cfg = Config::default();
        assert_eq!(cfg.context.ttl(), Duration::from_secs(300));
        assert_eq!(cfg.context.tree_depth, 4);
        assert_eq!(cfg.context.find_limit, 20);
        assert_eq!(cfg.history.capacity, 10);
        assert_eq!(cfg.history.prompt_entries, 3);
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.retry.base_delay_ms, 2_000);
        assert_eq!(cfg.model.analysis_max_tokens, 300);
    }

    #[test]
    fn model_calls_have_no_overall_deadline_by_default() {
        let cfg = Config::default();
        assert_eq!(cfg.model.request_timeout(), None);
        assert_eq!(cfg.model.connect_timeout(), Duration::from_secs(30));

        let cfg: Config = serde_json::from_str(r#"{ "model": { "request_timeout_secs": 600 } }"#).unwrap();
        assert_eq!(cfg.model.request_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(cfg.model.max_tokens, 4000);
    }

    #[test]
    fn partial_project_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{ "context": { "ttl_secs": 60 }, "scan": { "exclude_dir_names": ["tmp"] } }"#,
        )
        .unwrap();

        let cfg = read_config_file(&tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(cfg.context.ttl_secs, 60);
        assert_eq!(cfg.context.tree_depth, 4, "unset keys keep defaults");
        assert_eq!(cfg.scan.exclude_dir_names, vec!["tmp".to_string()]);
        assert_eq!(cfg.history.capacity, 10);
    }

    #[test]
    fn invalid_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_config_file(&path).is_none());
    }
}
