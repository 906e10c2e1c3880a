//! Shell probes (version control, system health) with a per-command timeout,
//! and the tagged outcome type every best-effort I/O result is reported in.

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of a best-effort operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Probed<T> {
    Ready(T),
    /// A usable value with a caveat (e.g. the command also wrote to stderr).
    Degraded { value: T, note: String },
    Failed(String),
}

impl<T> Probed<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Probed::Ready(v) | Probed::Degraded { value: v, .. } => Some(v),
            Probed::Failed(_) => None,
        }
    }
}

impl<T: Serialize> Serialize for Probed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Probed::Ready(v) => v.serialize(serializer),
            Probed::Degraded { value, note } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("value", value)?;
                map.serialize_entry("note", note)?;
                map.end()
            }
            Probed::Failed(msg) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", msg)?;
                map.end()
            }
        }
    }
}

/// Runs one shell command line and reports its trimmed stdout.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run(&self, command: &str) -> Probed<String>;
}

/// `sh -c` runner bounded by a wall-clock timeout.
pub struct ShellProbe {
    cwd: PathBuf,
    timeout: Duration,
}

impl ShellProbe {
    pub fn new(cwd: PathBuf, timeout: Duration) -> Self {
        Self { cwd, timeout }
    }
}

#[async_trait]
impl ProbeRunner for ShellProbe {
    async fn run(&self, command: &str) -> Probed<String> {
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => return Probed::Failed(format!("Error: {e}")),
            Err(_) => {
                tracing::debug!(command, timeout_ms = self.timeout.as_millis() as u64, "probe timed out");
                return Probed::Failed("Error: Command timeout".to_string());
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let detail = if stderr.is_empty() { stdout } else { stderr };
            return Probed::Failed(format!("Error: Command failed ({}): {detail}", output.status));
        }
        if stderr.is_empty() {
            Probed::Ready(stdout)
        } else {
            let note = stderr.lines().next().unwrap_or_default().to_string();
            Probed::Degraded { value: stdout, note }
        }
    }
}

pub const GIT_STATUS: &str = "git status --porcelain";
pub const GIT_BRANCH: &str = "git branch --show-current";
pub const GIT_RECENT_COMMITS: &str = "git log --oneline -5";

pub const UPTIME: &str = "uptime";
pub const DISK_USAGE: &str = "df -h";
pub const MEMORY_USAGE: &str = "free -h";
pub const LISTENING_SOCKETS: &str = "netstat -tulpn | grep LISTEN | head -10";
pub const NODE_PROCESSES: &str = r#"ps aux | grep -E "(node|npm)" | grep -v grep"#;

pub const NODE_VERSION: &str = "node --version";
pub const NPM_VERSION: &str = "npm --version";
pub const PENDING_CHANGES: &str = "git status --porcelain | wc -l";
pub const LAST_COMMIT: &str = r#"git log -1 --format="%h %s %cr""#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitProbes {
    pub git_status: Probed<String>,
    pub git_branch: Probed<String>,
    pub recent_commits: Probed<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub uptime: Probed<String>,
    pub disk_usage: Probed<String>,
    pub memory_usage: Probed<String>,
    pub network_connections: Probed<String>,
    pub running_processes: Probed<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub node_version: Probed<String>,
    pub npm_version: Probed<String>,
    pub git_status: Probed<String>,
    pub last_commit: Probed<String>,
}

pub async fn git_probes(runner: &dyn ProbeRunner) -> GitProbes {
    let (git_status, git_branch, recent_commits) = tokio::join!(
        runner.run(GIT_STATUS),
        runner.run(GIT_BRANCH),
        runner.run(GIT_RECENT_COMMITS),
    );
    GitProbes { git_status, git_branch, recent_commits }
}

pub async fn system_health(runner: &dyn ProbeRunner) -> SystemHealth {
    let (uptime, disk_usage, memory_usage, network_connections, running_processes) = tokio::join!(
        runner.run(UPTIME),
        runner.run(DISK_USAGE),
        runner.run(MEMORY_USAGE),
        runner.run(LISTENING_SOCKETS),
        runner.run(NODE_PROCESSES),
    );
    SystemHealth {
        uptime,
        disk_usage,
        memory_usage,
        network_connections,
        running_processes,
    }
}

pub async fn performance_metrics(runner: &dyn ProbeRunner) -> PerformanceMetrics {
    let (node_version, npm_version, git_status, last_commit) = tokio::join!(
        runner.run(NODE_VERSION),
        runner.run(NPM_VERSION),
        runner.run(PENDING_CHANGES),
        runner.run(LAST_COMMIT),
    );
    PerformanceMetrics {
        node_version,
        npm_version,
        git_status,
        last_commit,
    }
}
