//! Heuristic facts pulled out of project files: HTTP routes, UI components,
//! schema models, manifest summaries.
//!
//! None of this is a parser. Results may be incomplete or contain false
//! positives; they only need to be stable for identical input and bounded in
//! size.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::reader::{read_capped, read_json};
use crate::scanner::display_relative;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiscoveredEndpoint {
    pub method: String,
    pub path: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredComponent {
    pub name: String,
    pub file: String,
    pub has_hooks: bool,
    pub has_props: bool,
    pub lines_of_code: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredModel {
    pub file: String,
    pub name: String,
    pub has_validation: bool,
}

fn route_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `.get('/path'`, `.post("/path"`, ... with any quote style.
    RE.get_or_init(|| Regex::new(r#"\.(get|post|put|delete|patch)\s*\(\s*['"`]([^'"`]+)['"`]"#).unwrap())
}

/// All verb-plus-quoted-path declarations in `content`, in source order.
pub fn extract_endpoints(file: &str, content: &str) -> Vec<DiscoveredEndpoint> {
    route_regex()
        .captures_iter(content)
        .map(|caps| DiscoveredEndpoint {
            method: caps[1].to_ascii_uppercase(),
            path: caps[2].to_string(),
            file: file.to_string(),
        })
        .collect()
}

pub fn discover_endpoints(files: &[PathBuf], root: &Path) -> Vec<DiscoveredEndpoint> {
    let mut out = Vec::new();
    for f in files {
        let read = read_capped(f);
        let Some(content) = read.content() else { continue };
        out.extend(extract_endpoints(&display_relative(f, root), content));
    }
    out
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Component facts for one file, or `None` when nothing declaration-like is
/// present.
pub fn inspect_component(file: &str, path: &Path, content: &str) -> Option<DiscoveredComponent> {
    if !(content.contains("function ") || content.contains("const ") || content.contains("class ")) {
        return None;
    }
    Some(DiscoveredComponent {
        name: file_stem(path),
        file: file.to_string(),
        has_hooks: content.contains("useState") || content.contains("useEffect"),
        has_props: content.contains("props.") || (content.contains('{') && content.contains('}')),
        lines_of_code: content.split('\n').count(),
    })
}

/// Inspect at most `sample` of `files`.
pub fn discover_components(files: &[PathBuf], root: &Path, sample: usize) -> Vec<DiscoveredComponent> {
    files
        .iter()
        .take(sample)
        .filter_map(|f| {
            let read = read_capped(f);
            let content = read.content()?;
            inspect_component(&display_relative(f, root), f, content)
        })
        .collect()
}

pub fn inspect_model(file: &str, path: &Path, content: &str) -> Option<DiscoveredModel> {
    if !content.contains("Schema") {
        return None;
    }
    Some(DiscoveredModel {
        file: file.to_string(),
        name: file_stem(path),
        has_validation: content.contains("required:") || content.contains("validate:"),
    })
}

pub fn discover_models(files: &[PathBuf], root: &Path) -> Vec<DiscoveredModel> {
    files
        .iter()
        .filter_map(|f| {
            let read = read_capped(f);
            let content = read.content()?;
            inspect_model(&display_relative(f, root), f, content)
        })
        .collect()
}

fn manifest_mentions(path: &Path, needle: &str) -> bool {
    read_capped(path)
        .content()
        .map(|c| c.contains(needle))
        .unwrap_or(false)
}

/// Coarse architecture label from manifest contents.
pub fn detect_project_type(root: &Path) -> &'static str {
    let frontend = root.join("frontend").join("package.json");
    let backend = root.join("backend").join("package.json");

    let has_react = manifest_mentions(&frontend, "react");
    let has_express = manifest_mentions(&backend, "express");
    let has_vite = manifest_mentions(&frontend, "vite");
    let has_next = manifest_mentions(&root.join("package.json"), "next");

    if has_react && has_express {
        "Full-Stack React + Express"
    } else if has_next {
        "Next.js Application"
    } else if has_react && has_vite {
        "React + Vite Application"
    } else if has_express {
        "Express API Server"
    } else if has_react {
        "React Application"
    } else {
        "Node.js Project"
    }
}

/// Key lists from a manifest; versions and script bodies are discarded.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DependencySummary {
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    pub scripts: Vec<String>,
}

fn object_keys(v: &serde_json::Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(|o| o.as_object())
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default()
}

pub fn summarize_package_json(path: &Path) -> Option<DependencySummary> {
    let v = read_json(path)?;
    Some(DependencySummary {
        dependencies: object_keys(&v, "dependencies"),
        dev_dependencies: object_keys(&v, "devDependencies"),
        scripts: object_keys(&v, "scripts"),
    })
}

fn table_keys(v: &toml::Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(|t| t.as_table())
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

/// Same summary for a Cargo manifest: `[dependencies]`, `[dev-dependencies]`,
/// and `[[bin]]` target names standing in for scripts.
pub fn summarize_cargo_toml(path: &Path) -> Option<DependencySummary> {
    let text = std::fs::read_to_string(path).ok()?;
    let value: toml::Value = text.parse().ok()?;
    let scripts = value
        .get("bin")
        .and_then(|b| b.as_array())
        .map(|bins| {
            bins.iter()
                .filter_map(|b| b.get("name").and_then(|n| n.as_str()).map(String::from))
                .collect()
        })
        .unwrap_or_default();
    Some(DependencySummary {
        dependencies: table_keys(&value, "dependencies"),
        dev_dependencies: table_keys(&value, "dev-dependencies"),
        scripts,
    })
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Dependencies {
    pub backend: Option<DependencySummary>,
    pub frontend: Option<DependencySummary>,
    pub root: Option<DependencySummary>,
    pub cargo: Option<DependencySummary>,
}

pub fn analyze_dependencies(root: &Path) -> Dependencies {
    Dependencies {
        backend: summarize_package_json(&root.join("backend").join("package.json")),
        frontend: summarize_package_json(&root.join("frontend").join("package.json")),
        root: summarize_package_json(&root.join("package.json")),
        cargo: summarize_cargo_toml(&root.join("Cargo.toml")),
    }
}
