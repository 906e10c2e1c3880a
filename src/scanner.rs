use anyhow::Result;
use chrono::{DateTime, Utc};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Build output, dependency and VCS directories, skipped by exact name.
pub const SKIPPED_DIR_NAMES: &[&str] = &["node_modules", "dist", "build", ".git", "coverage", "target"];

/// Hidden entries that are still worth describing.
pub const ALLOWED_DOTFILES: &[&str] = &[".gitignore", ".env.example", ".env"];

/// Name-based skip rules shared by the tree scan and the file finder.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    exclude_dir_names: Vec<String>,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl ScanFilter {
    pub fn new(extra_exclude_dir_names: &[String]) -> Self {
        let mut exclude_dir_names: Vec<String> = SKIPPED_DIR_NAMES.iter().map(|s| s.to_string()).collect();
        for d in extra_exclude_dir_names {
            let d = d.trim().trim_matches('/');
            if !d.is_empty() && !exclude_dir_names.iter().any(|x| x == d) {
                exclude_dir_names.push(d.to_string());
            }
        }
        Self { exclude_dir_names }
    }

    pub fn is_excluded_name(&self, name: &str) -> bool {
        self.exclude_dir_names.iter().any(|d| d == name)
    }

    /// Tree-scan rule: hidden entries are dropped unless allow-listed.
    pub fn skips_tree_entry(&self, name: &str) -> bool {
        if name.starts_with('.') && !ALLOWED_DOTFILES.contains(&name) {
            return true;
        }
        self.is_excluded_name(name)
    }

    fn overrides(&self, root: &Path) -> Result<Override> {
        let mut ob = OverrideBuilder::new(root);
        // Directory patterns need both the entry and its descendants, otherwise
        // the walker may still descend.
        for d in &self.exclude_dir_names {
            ob.add(&format!("!**/{d}"))?;
            ob.add(&format!("!**/{d}/**"))?;
        }
        Ok(ob.build()?)
    }
}

/// Metadata recorded for a file in the project tree.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileLeaf {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_executable: bool,
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    Dir(Tree),
    File(FileLeaf),
}

/// One level of the project tree. A level that could not be listed is kept as
/// an error placeholder instead of aborting the scan.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Tree {
    Entries(BTreeMap<String, TreeNode>),
    Error { error: String },
}

impl Tree {
    pub fn empty() -> Self {
        Tree::Entries(BTreeMap::new())
    }

    pub fn entries(&self) -> Option<&BTreeMap<String, TreeNode>> {
        match self {
            Tree::Entries(map) => Some(map),
            Tree::Error { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries().map(|m| m.is_empty()).unwrap_or(false)
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

fn file_leaf(name: &str, meta: &std::fs::Metadata) -> FileLeaf {
    FileLeaf {
        size: meta.len(),
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
        is_executable: is_executable(meta),
        extension: extension_of(name),
    }
}

/// Describe `dir` as a nested map, descending until `current_depth` reaches
/// `max_depth`. The level at `max_depth` is an empty map, so `max_depth == 0`
/// always yields an empty tree.
pub fn scan_tree(dir: &Path, max_depth: usize, current_depth: usize, filter: &ScanFilter) -> Tree {
    if current_depth >= max_depth {
        return Tree::empty();
    }

    let read = match std::fs::read_dir(dir) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(path = %dir.display(), error = %e, "tree scan: unreadable directory");
            return Tree::Error { error: e.to_string() };
        }
    };

    let mut out = BTreeMap::new();
    for item in read {
        let dent = match item {
            Ok(d) => d,
            Err(e) => return Tree::Error { error: e.to_string() },
        };
        let name = dent.file_name().to_string_lossy().to_string();
        if filter.skips_tree_entry(&name) {
            continue;
        }

        let path = dent.path();
        let is_dir = dent.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        if is_dir {
            out.insert(name, TreeNode::Dir(scan_tree(&path, max_depth, current_depth + 1, filter)));
            continue;
        }

        match std::fs::metadata(&path) {
            Ok(meta) => {
                let leaf = file_leaf(&name, &meta);
                out.insert(name, TreeNode::File(leaf));
            }
            Err(e) => return Tree::Error { error: e.to_string() },
        }
    }

    Tree::Entries(out)
}

fn name_matches(name: &str, patterns: &[&str]) -> bool {
    patterns
        .iter()
        .any(|p| !p.is_empty() && (name.contains(p) || name.ends_with(p)))
}

/// Find files under `dir` whose file name contains (or ends with) any of
/// `patterns`, at any depth, returning at most `limit` paths in walk order.
///
/// A missing root is not an error: the result is simply empty.
pub fn find_files(dir: &Path, patterns: &[&str], limit: usize, filter: &ScanFilter) -> Vec<PathBuf> {
    if limit == 0 || !dir.exists() {
        return Vec::new();
    }

    let overrides = match filter.overrides(dir) {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!(error = %e, "file finder: bad skip patterns");
            return Vec::new();
        }
    };

    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .hidden(true) // dot-entries are never searched
        .overrides(overrides)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut found = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(error = %e, "file finder: skipping entry");
                continue;
            }
        };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let name = dent.file_name().to_string_lossy().to_string();
        if !name_matches(&name, patterns) {
            continue;
        }
        found.push(dent.into_path());
        if found.len() >= limit {
            break;
        }
    }

    found
}

/// Union of the files under `base/subdir` with one of `extensions` and
/// the files anywhere under `base` whose name mentions `name_hint`, deduplicated
/// and capped.
pub fn find_in_dir_or_named(
    base: &Path,
    subdir: &str,
    extensions: &[&str],
    name_hint: &str,
    limit: usize,
    filter: &ScanFilter,
) -> Vec<PathBuf> {
    let mut out = find_files(&base.join(subdir), extensions, limit, filter);
    for p in find_files(base, &[name_hint], limit, filter) {
        if out.len() >= limit {
            break;
        }
        if !out.contains(&p) {
            out.push(p);
        }
    }
    out.truncate(limit);
    out
}

/// Display form of `path` relative to `base` when possible.
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, "x").unwrap();
    }

    #[test]
    fn depth_zero_is_always_empty() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.js");
        touch(tmp.path(), "src/b.js");
        let tree = scan_tree(tmp.path(), 0, 0, &ScanFilter::default());
        assert_eq!(tree, Tree::empty());
    }

    #[test]
    fn recursion_stops_at_max_depth() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "one/two/three/deep.js");

        let tree = scan_tree(tmp.path(), 2, 0, &ScanFilter::default());
        let top = tree.entries().unwrap();
        let Some(TreeNode::Dir(one)) = top.get("one") else { panic!("one should be a dir: {top:?}") };
        let Some(TreeNode::Dir(two)) = one.entries().unwrap().get("two") else { panic!("two should be a dir") };
        assert!(two.is_empty(), "level at max depth must be an empty map");
    }

    #[test]
    fn hidden_and_build_entries_are_filtered() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), ".secret");
        touch(tmp.path(), ".gitignore");
        touch(tmp.path(), ".env.example");
        touch(tmp.path(), "node_modules/pkg/index.js");
        touch(tmp.path(), "dist/bundle.js");
        touch(tmp.path(), "generated/out.js");
        touch(tmp.path(), "server.js");

        let filter = ScanFilter::new(&["generated".to_string()]);
        let tree = scan_tree(tmp.path(), 3, 0, &filter);
        let names: Vec<&String> = tree.entries().unwrap().keys().collect();
        assert_eq!(names, vec![".env.example", ".gitignore", "server.js"]);
    }

    #[test]
    fn file_leaf_records_extension_and_size() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("App.jsx"), "hello").unwrap();
        let tree = scan_tree(tmp.path(), 1, 0, &ScanFilter::default());
        let Some(TreeNode::File(leaf)) = tree.entries().unwrap().get("App.jsx") else { panic!("missing leaf") };
        assert_eq!(leaf.size, 5);
        assert_eq!(leaf.extension, ".jsx");
        assert!(leaf.modified.is_some());
    }

    #[test]
    fn unreadable_root_becomes_error_placeholder() {
        let tmp = TempDir::new().unwrap();
        let tree = scan_tree(&tmp.path().join("missing"), 3, 0, &ScanFilter::default());
        assert!(matches!(tree, Tree::Error { .. }));
        let json = serde_json::to_value(&tree).unwrap();
        assert!(json.get("error").is_some());
    }

    #[test]
    fn finder_caps_results() {
        let tmp = TempDir::new().unwrap();
        for i in 0..30 {
            touch(tmp.path(), &format!("nested/level{}/file{i}.js", i % 4));
        }
        let found = find_files(tmp.path(), &[".js"], 20, &ScanFilter::default());
        assert_eq!(found.len(), 20);
    }

    #[test]
    fn finder_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let found = find_files(&tmp.path().join("nope"), &[".js"], 20, &ScanFilter::default());
        assert!(found.is_empty());
    }

    #[test]
    fn finder_matches_names_and_skips_noise() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "routes.js");
        touch(tmp.path(), "api/userRoutes.ts");
        touch(tmp.path(), "node_modules/express/routes.js");
        touch(tmp.path(), ".cache/routes.js");
        touch(tmp.path(), "server.js");

        let found = find_files(tmp.path(), &["routes", "Routes"], 20, &ScanFilter::default());
        let rel: Vec<String> = found.iter().map(|p| display_relative(p, tmp.path())).collect();
        assert_eq!(rel, vec!["api/userRoutes.ts".to_string(), "routes.js".to_string()]);
    }

    #[test]
    fn dir_or_named_union_is_deduplicated() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "routes/audit.js");
        touch(tmp.path(), "routes/payment.js");
        touch(tmp.path(), "legacyRoutes.js");

        let found = find_in_dir_or_named(tmp.path(), "routes", &[".js"], "outes", 20, &ScanFilter::default());
        let rel: Vec<String> = found.iter().map(|p| display_relative(p, tmp.path())).collect();
        assert_eq!(rel, vec!["routes/audit.js", "routes/payment.js", "legacyRoutes.js"]);
    }
}
