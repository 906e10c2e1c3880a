//! The context snapshot: one read-only value describing the surrounding
//! project, serialised once per build and handed to every model request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ContextConfig;
use crate::discovery::{
    analyze_dependencies, detect_project_type, discover_components, discover_endpoints, discover_models,
    Dependencies, DiscoveredComponent, DiscoveredEndpoint, DiscoveredModel,
};
use crate::probe::{GitProbes, PerformanceMetrics, Probed, SystemHealth};
use crate::reader::{read_capped, FileRead};
use crate::scanner::{display_relative, find_files, find_in_dir_or_named, scan_tree, ScanFilter, Tree};

/// Environment variables surfaced in the snapshot. Everything else is hidden.
pub const ENV_ALLOW_LIST: &[&str] = &[
    "NODE_ENV",
    "PORT",
    "DATABASE_NAME",
    "PLATFORM_NAME",
    "MONGODB_URI",
    "LIGNA_API_KEY",
    "ANTHROPIC_API_KEY",
];

const MASK_VISIBLE_CHARS: usize = 10;
const SCRIPT_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyDirectories {
    pub has_backend: bool,
    pub has_frontend: bool,
    pub has_database: bool,
    pub has_tests: bool,
    pub has_documentation: bool,
}

impl KeyDirectories {
    pub fn detect(root: &Path) -> Self {
        let any = |names: &[&str]| names.iter().any(|n| root.join(n).exists());
        Self {
            has_backend: any(&["backend"]),
            has_frontend: any(&["frontend"]),
            has_database: any(&["database", "db"]),
            has_tests: any(&["tests", "test"]),
            has_documentation: any(&["docs", "README.md"]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructure {
    pub structure: Tree,
    pub key_directories: KeyDirectories,
    pub project_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditToolFiles {
    pub backend: FileRead,
    pub routes: Vec<String>,
    pub services: Vec<String>,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendFiles {
    pub main_app: FileRead,
    pub components: Vec<String>,
    pub pages: Vec<String>,
    pub utils: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFiles {
    pub package_json: FileRead,
    pub env_example: FileRead,
    pub readme: FileRead,
    pub docker_file: FileRead,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseFiles {
    pub migrations: Vec<String>,
    pub schemas: Vec<String>,
    pub seeders: Vec<String>,
}

/// Marketing-platform sub-scan: entry points, file inventories, config files.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformContext {
    pub audit_tool: AuditToolFiles,
    pub frontend: FrontendFiles,
    pub config: ConfigFiles,
    pub database: DatabaseFiles,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub connection_string: String,
    pub models: Vec<DiscoveredModel>,
    pub migrations: Vec<String>,
}

/// Everything in a snapshot that comes from the filesystem and environment.
/// Built synchronously; probes are gathered separately and joined in
/// [`ContextSnapshot::assemble`].
#[derive(Debug, Clone)]
pub struct ProjectFacts {
    pub current_directory: String,
    pub project_structure: ProjectStructure,
    pub marketing_platform: PlatformContext,
    pub dependencies: Dependencies,
    pub api_endpoints: Vec<DiscoveredEndpoint>,
    pub react_components: Vec<DiscoveredComponent>,
    pub database_info: DatabaseInfo,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub timestamp: DateTime<Utc>,
    pub current_directory: String,
    pub git_status: Probed<String>,
    pub git_branch: Probed<String>,
    pub recent_commits: Probed<String>,
    pub project_structure: ProjectStructure,
    pub marketing_platform: PlatformContext,
    pub dependencies: Dependencies,
    pub api_endpoints: Vec<DiscoveredEndpoint>,
    pub react_components: Vec<DiscoveredComponent>,
    pub database_info: DatabaseInfo,
    pub environment: BTreeMap<String, String>,
    pub system_health: SystemHealth,
    pub performance_metrics: PerformanceMetrics,
}

impl ContextSnapshot {
    pub fn assemble(
        timestamp: DateTime<Utc>,
        facts: ProjectFacts,
        git: GitProbes,
        system_health: SystemHealth,
        performance_metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            timestamp,
            current_directory: facts.current_directory,
            git_status: git.git_status,
            git_branch: git.git_branch,
            recent_commits: git.recent_commits,
            project_structure: facts.project_structure,
            marketing_platform: facts.marketing_platform,
            dependencies: facts.dependencies,
            api_endpoints: facts.api_endpoints,
            react_components: facts.react_components,
            database_info: facts.database_info,
            environment: facts.environment,
            system_health,
            performance_metrics,
        }
    }

    /// Pretty JSON, the form injected into prompts.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "snapshot serialisation failed");
            serde_json::json!({ "error": e.to_string() }).to_string()
        })
    }
}

/// `first 10 chars...***` for names implying a secret or connection string.
pub fn mask_env_value(name: &str, value: &str) -> String {
    if name.contains("KEY") || name.contains("URI") {
        let visible: String = value.chars().take(MASK_VISIBLE_CHARS).collect();
        format!("{visible}...***")
    } else {
        value.to_string()
    }
}

/// Allow-listed environment values, masked where needed. Unset or empty
/// variables are omitted.
pub fn masked_environment(lookup: impl Fn(&str) -> Option<String>) -> BTreeMap<String, String> {
    ENV_ALLOW_LIST
        .iter()
        .filter_map(|name| {
            let value = lookup(name).filter(|v| !v.is_empty())?;
            Some((name.to_string(), mask_env_value(name, &value)))
        })
        .collect()
}

/// First of `candidates` that exists, read through the capped reader.
fn read_first(candidates: &[PathBuf]) -> FileRead {
    for path in candidates {
        let read = read_capped(path);
        if read != FileRead::Missing {
            return read;
        }
    }
    FileRead::Missing
}

fn relative_all(paths: &[PathBuf], root: &Path) -> Vec<String> {
    paths.iter().map(|p| display_relative(p, root)).collect()
}

fn platform_context(root: &Path, limit: usize, filter: &ScanFilter) -> PlatformContext {
    let backend = root.join("backend");
    let src = root.join("frontend").join("src");
    let in_backend = |dir: &str| find_in_dir_or_named(&backend, dir, SCRIPT_EXTENSIONS, dir, limit, filter);
    let in_src = |dir: &str| find_in_dir_or_named(&src, dir, SCRIPT_EXTENSIONS, dir, limit, filter);
    let named = |hint: &str| find_files(root, &[hint], limit, filter);

    PlatformContext {
        audit_tool: AuditToolFiles {
            backend: read_first(&[backend.join("server.js"), backend.join("index.js")]),
            routes: relative_all(&in_backend("routes"), root),
            services: relative_all(&in_backend("services"), root),
            models: relative_all(&in_backend("models"), root),
        },
        frontend: FrontendFiles {
            main_app: read_first(&[src.join("App.js"), src.join("App.jsx")]),
            components: relative_all(&in_src("components"), root),
            pages: relative_all(&in_src("pages"), root),
            utils: relative_all(&in_src("utils"), root),
        },
        config: ConfigFiles {
            package_json: read_capped(&root.join("package.json")),
            env_example: read_capped(&root.join(".env.example")),
            readme: read_capped(&root.join("README.md")),
            docker_file: read_capped(&root.join("Dockerfile")),
        },
        database: DatabaseFiles {
            migrations: relative_all(&named("migrations"), root),
            schemas: relative_all(&named("schema"), root),
            seeders: relative_all(&named("seeds"), root),
        },
    }
}

/// Gather every filesystem-derived part of the snapshot. Never fails; each
/// unreadable piece degrades to an empty list, `null`, or an error entry.
pub fn collect_project_facts(
    root: &Path,
    cfg: &ContextConfig,
    filter: &ScanFilter,
    env: impl Fn(&str) -> Option<String>,
) -> ProjectFacts {
    let limit = cfg.find_limit;
    let backend = root.join("backend");

    let project_structure = ProjectStructure {
        structure: scan_tree(root, cfg.tree_depth, 0, filter),
        key_directories: KeyDirectories::detect(root),
        project_type: detect_project_type(root).to_string(),
    };

    let marketing_platform = platform_context(root, limit, filter);

    let route_files = find_in_dir_or_named(&backend, "routes", SCRIPT_EXTENSIONS, "routes", limit, filter);
    let api_endpoints = discover_endpoints(&route_files, root);

    let component_files = find_files(&root.join("frontend").join("src"), &[".jsx", ".js"], limit, filter);
    let react_components = discover_components(&component_files, root, cfg.component_sample);

    let model_files = find_in_dir_or_named(&backend, "models", SCRIPT_EXTENSIONS, "models", limit, filter);
    let database_info = DatabaseInfo {
        kind: "Unknown".to_string(),
        connection_string: if env("MONGODB_URI").is_some_and(|v| !v.is_empty()) {
            "MongoDB".to_string()
        } else {
            "Unknown".to_string()
        },
        models: discover_models(&model_files, root),
        migrations: marketing_platform.database.migrations.clone(),
    };

    ProjectFacts {
        current_directory: root.display().to_string(),
        project_structure,
        marketing_platform,
        dependencies: analyze_dependencies(root),
        api_endpoints,
        react_components,
        database_info,
        environment: masked_environment(&env),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, content).unwrap();
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn secrets_are_masked_plain_values_are_not() {
        let env = |name: &str| match name {
            "ANTHROPIC_API_KEY" => Some("sk-ant-0123456789abcdef".to_string()),
            "MONGODB_URI" => Some("mongodb://user:pw@host/db".to_string()),
            "NODE_ENV" => Some("production".to_string()),
            "PORT" => Some(String::new()),
            "HOME" => Some("/root".to_string()),
            _ => None,
        };
        let vars = masked_environment(env);
        assert_eq!(vars.get("ANTHROPIC_API_KEY").unwrap(), "sk-ant-012...***");
        assert_eq!(vars.get("MONGODB_URI").unwrap(), "mongodb://...***");
        assert_eq!(vars.get("NODE_ENV").unwrap(), "production");
        assert!(!vars.contains_key("PORT"), "empty values are omitted");
        assert!(!vars.contains_key("HOME"), "only allow-listed names");
    }

    #[test]
    fn facts_cover_platform_layout() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "backend/server.js", "const app = express();");
        write(root, "backend/routes/audit.js", "router.get('/audits', h);\nrouter.post('/audits', h);");
        write(root, "backend/models/Client.js", "const ClientSchema = new Schema({ name: { required: true } });");
        write(root, "frontend/src/App.jsx", "export default function App() { return null; }");
        write(root, "frontend/src/components/Card.jsx", "const Card = (props) => props.title;");
        write(root, "README.md", "# Platform");

        let facts = collect_project_facts(root, &ContextConfig::default(), &ScanFilter::new(&[]), no_env);

        assert!(facts.project_structure.key_directories.has_backend);
        assert!(facts.project_structure.key_directories.has_documentation);
        assert!(!facts.project_structure.key_directories.has_tests);
        assert_eq!(facts.api_endpoints.len(), 2);
        assert_eq!(facts.api_endpoints[0].file, "backend/routes/audit.js");
        assert_eq!(facts.database_info.models.len(), 1);
        assert_eq!(facts.database_info.connection_string, "Unknown");
        assert_eq!(facts.marketing_platform.audit_tool.routes, vec!["backend/routes/audit.js"]);
        assert!(matches!(facts.marketing_platform.audit_tool.backend, FileRead::Full(_)));
        assert!(matches!(facts.marketing_platform.frontend.main_app, FileRead::Full(_)));
        assert_eq!(facts.marketing_platform.config.docker_file, FileRead::Missing);
        assert!(facts.react_components.iter().any(|c| c.name == "Card"));
        assert!(facts.environment.is_empty());
    }

    #[test]
    fn empty_root_degrades_to_empty_facts() {
        let tmp = TempDir::new().unwrap();
        let facts = collect_project_facts(tmp.path(), &ContextConfig::default(), &ScanFilter::new(&[]), no_env);
        assert!(facts.api_endpoints.is_empty());
        assert!(facts.react_components.is_empty());
        assert_eq!(facts.project_structure.project_type, "Node.js Project");
        assert!(facts.dependencies.root.is_none());
    }

    #[test]
    fn rendered_snapshot_uses_camel_case_keys() {
        let tmp = TempDir::new().unwrap();
        let facts = collect_project_facts(tmp.path(), &ContextConfig::default(), &ScanFilter::new(&[]), no_env);
        let failed = || Probed::<String>::Failed("Error: Command timeout".to_string());
        let snapshot = ContextSnapshot::assemble(
            Utc::now(),
            facts,
            GitProbes { git_status: failed(), git_branch: Probed::Ready("main".into()), recent_commits: failed() },
            SystemHealth {
                uptime: failed(),
                disk_usage: failed(),
                memory_usage: failed(),
                network_connections: failed(),
                running_processes: failed(),
            },
            PerformanceMetrics {
                node_version: failed(),
                npm_version: failed(),
                git_status: failed(),
                last_commit: failed(),
            },
        );
        let v: serde_json::Value = serde_json::from_str(&snapshot.render()).unwrap();
        assert_eq!(v["gitBranch"], "main");
        assert_eq!(v["gitStatus"]["error"], "Error: Command timeout");
        assert!(v["projectStructure"]["keyDirectories"]["hasBackend"].is_boolean());
        assert_eq!(v["databaseInfo"]["type"], "Unknown");
        assert!(v["marketingPlatform"]["config"]["packageJson"].is_null());
    }
}
