//! Context aggregation with a time-boxed cache.
//!
//! A snapshot is either served whole from the cache or rebuilt whole; there is
//! no partial refresh. Invalidation bumps a shared epoch, so a rebuild that was
//! already running when a file changed still answers its own request but is
//! never stored.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::config::ContextConfig;
use crate::discovery::Dependencies;
use crate::probe::{git_probes, performance_metrics, system_health, ProbeRunner};
use crate::reader::FileRead;
use crate::scanner::{ScanFilter, Tree};
use crate::snapshot::{
    collect_project_facts, AuditToolFiles, ConfigFiles, ContextSnapshot, DatabaseFiles, DatabaseInfo,
    FrontendFiles, KeyDirectories, PlatformContext, ProjectFacts, ProjectStructure,
};

/// Cheap handle that marks the cache stale from anywhere (e.g. the watcher
/// task).
#[derive(Debug, Clone, Default)]
pub struct CacheInvalidator {
    epoch: Arc<AtomicU64>,
}

impl CacheInvalidator {
    pub fn invalidate(&self) {
        let prev = self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(epoch = prev + 1, "context cache invalidated");
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    rendered: Arc<str>,
    expires_at: Instant,
    epoch: u64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: Instant, current_epoch: u64) -> bool {
        now < self.expires_at && self.epoch == current_epoch
    }
}

#[derive(Debug)]
pub struct ContextCache {
    entry: Option<CacheEntry>,
    ttl: Duration,
    invalidator: CacheInvalidator,
}

impl ContextCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: None,
            ttl,
            invalidator: CacheInvalidator::default(),
        }
    }

    pub fn invalidator(&self) -> CacheInvalidator {
        self.invalidator.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.invalidator.epoch()
    }

    pub fn get(&self, now: Instant) -> Option<Arc<str>> {
        self.entry
            .as_ref()
            .filter(|e| e.is_fresh(now, self.epoch()))
            .map(|e| e.rendered.clone())
    }

    /// Store a snapshot whose build started under `built_under`. Returns false
    /// (and stores nothing) when an invalidation happened in the meantime.
    pub fn store(&mut self, rendered: Arc<str>, built_under: u64, now: Instant) -> bool {
        if built_under != self.epoch() {
            self.entry = None;
            return false;
        }
        self.entry = Some(CacheEntry {
            rendered,
            expires_at: now + self.ttl,
            epoch: built_under,
        });
        true
    }

    pub fn clear(&mut self) {
        self.entry = None;
        self.invalidator.invalidate();
    }
}

pub struct ContextAggregator {
    root: PathBuf,
    cfg: ContextConfig,
    filter: ScanFilter,
    probes: Arc<dyn ProbeRunner>,
    cache: ContextCache,
    rebuilds: u64,
}

impl ContextAggregator {
    pub fn new(root: PathBuf, cfg: ContextConfig, filter: ScanFilter, probes: Arc<dyn ProbeRunner>) -> Self {
        let cache = ContextCache::new(cfg.ttl());
        Self {
            root,
            cfg,
            filter,
            probes,
            cache,
            rebuilds: 0,
        }
    }

    pub fn invalidator(&self) -> CacheInvalidator {
        self.cache.invalidator()
    }

    /// Drop the cached snapshot; the next [`get_context`](Self::get_context)
    /// rebuilds.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Number of full rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Serialised snapshot, from cache when still fresh.
    pub async fn get_context(&mut self) -> Arc<str> {
        if let Some(hit) = self.cache.get(Instant::now()) {
            tracing::debug!("context cache hit");
            return hit;
        }

        let started_under = self.cache.epoch();
        tracing::debug!(epoch = started_under, "context cache miss; rebuilding");
        let rendered: Arc<str> = self.build_snapshot().await.render().into();
        self.rebuilds += 1;

        if !self.cache.store(rendered.clone(), started_under, Instant::now()) {
            tracing::debug!("cache invalidated during rebuild; snapshot not stored");
        }
        rendered
    }

    /// Build a fresh snapshot. Filesystem work runs on the blocking pool while
    /// the shell probes run concurrently.
    pub async fn build_snapshot(&self) -> ContextSnapshot {
        let root = self.root.clone();
        let cfg = self.cfg.clone();
        let filter = self.filter.clone();
        let facts_task = tokio::task::spawn_blocking(move || {
            collect_project_facts(&root, &cfg, &filter, |name| std::env::var(name).ok())
        });

        let probes = self.probes.as_ref();
        let (facts, git, health, perf) = tokio::join!(
            facts_task,
            git_probes(probes),
            system_health(probes),
            performance_metrics(probes),
        );

        let facts = facts.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "project scan task failed");
            unavailable_facts(&self.root, &e.to_string())
        });

        ContextSnapshot::assemble(Utc::now(), facts, git, health, perf)
    }
}

fn unavailable_facts(root: &std::path::Path, reason: &str) -> ProjectFacts {
    let failed = || FileRead::Failed(format!("Error: {reason}"));
    ProjectFacts {
        current_directory: root.display().to_string(),
        project_structure: ProjectStructure {
            structure: Tree::Error { error: reason.to_string() },
            key_directories: KeyDirectories::detect(root),
            project_type: "Unknown".to_string(),
        },
        marketing_platform: PlatformContext {
            audit_tool: AuditToolFiles {
                backend: failed(),
                routes: Vec::new(),
                services: Vec::new(),
                models: Vec::new(),
            },
            frontend: FrontendFiles {
                main_app: failed(),
                components: Vec::new(),
                pages: Vec::new(),
                utils: Vec::new(),
            },
            config: ConfigFiles {
                package_json: failed(),
                env_example: failed(),
                readme: failed(),
                docker_file: failed(),
            },
            database: DatabaseFiles {
                migrations: Vec::new(),
                schemas: Vec::new(),
                seeders: Vec::new(),
            },
        },
        dependencies: Dependencies::default(),
        api_endpoints: Vec::new(),
        react_components: Vec::new(),
        database_info: DatabaseInfo {
            kind: "Unknown".to_string(),
            connection_string: "Unknown".to_string(),
            models: Vec::new(),
            migrations: Vec::new(),
        },
        environment: Default::default(),
    }
}
