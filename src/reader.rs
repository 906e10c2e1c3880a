use serde::{Serialize, Serializer};
use std::path::Path;

pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

const DOC_LIMIT: usize = 10_000;
const DATA_LIMIT: usize = 3_000;
const SOURCE_LIMIT: usize = 8_000;
const DEFAULT_LIMIT: usize = 5_000;

/// Character ceiling for a file, chosen by extension.
pub fn limit_for(path: &Path) -> usize {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "md" | "txt" => DOC_LIMIT,
        "json" => DATA_LIMIT,
        "js" | "jsx" | "ts" | "tsx" => SOURCE_LIMIT,
        _ => DEFAULT_LIMIT,
    }
}

/// Result of a capped read. Serialises to the text (or `null` when missing).
#[derive(Debug, Clone, PartialEq)]
pub enum FileRead {
    Missing,
    Full(String),
    /// First `limit` characters followed by [`TRUNCATION_MARKER`].
    Truncated(String),
    /// Formatted error text; still displayable.
    Failed(String),
}

impl FileRead {
    pub fn text(&self) -> Option<&str> {
        match self {
            FileRead::Missing => None,
            FileRead::Full(s) | FileRead::Truncated(s) | FileRead::Failed(s) => Some(s),
        }
    }

    /// Text only when the file was actually read.
    pub fn content(&self) -> Option<&str> {
        match self {
            FileRead::Full(s) | FileRead::Truncated(s) => Some(s),
            FileRead::Missing | FileRead::Failed(_) => None,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, FileRead::Truncated(_))
    }
}

impl Serialize for FileRead {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.text().serialize(serializer)
    }
}

/// Cut `content` to `limit` characters, appending the marker when anything was
/// dropped. Cuts on a char boundary.
pub fn cap_text(content: String, limit: usize) -> FileRead {
    match content.char_indices().nth(limit) {
        None => FileRead::Full(content),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&content[..cut]);
            out.push_str(TRUNCATION_MARKER);
            FileRead::Truncated(out)
        }
    }
}

/// Read a file as text under its extension's size ceiling. Never fails: a
/// missing file is [`FileRead::Missing`], any other I/O error is a formatted
/// [`FileRead::Failed`]. Invalid UTF-8 is replaced rather than rejected.
pub fn read_capped(path: &Path) -> FileRead {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FileRead::Missing,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "capped read failed");
            return FileRead::Failed(format!("Error reading {}: {e}", path.display()));
        }
    };
    let content = String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).to_string());
    cap_text(content, limit_for(path))
}

/// Parse a JSON file, returning `None` when it is absent or malformed.
pub fn read_json(path: &Path) -> Option<serde_json::Value> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// First `max_chars` characters of `s`.
pub fn excerpt(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => &s[..cut],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn large_json_is_cut_to_data_limit() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("package.json");
        std::fs::write(&path, "a".repeat(20_000)).unwrap();

        let read = read_capped(&path);
        assert!(read.is_truncated());
        let text = read.text().unwrap();
        let body = text.strip_suffix(TRUNCATION_MARKER).expect("marker suffix");
        assert_eq!(body.chars().count(), 3_000);
    }

    #[test]
    fn small_markdown_is_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("README.md");
        let content = "# Title\n".repeat(62) + "abcd";
        assert_eq!(content.len(), 500);
        std::fs::write(&path, &content).unwrap();

        assert_eq!(read_capped(&path), FileRead::Full(content));
    }

    #[test]
    fn limits_follow_extension() {
        assert_eq!(limit_for(Path::new("notes.txt")), 10_000);
        assert_eq!(limit_for(Path::new("a/App.tsx")), 8_000);
        assert_eq!(limit_for(Path::new("data.JSON")), 3_000);
        assert_eq!(limit_for(Path::new("Dockerfile")), 5_000);
    }

    #[test]
    fn missing_file_is_null() {
        let tmp = TempDir::new().unwrap();
        let read = read_capped(&tmp.path().join("absent.js"));
        assert_eq!(read, FileRead::Missing);
        assert_eq!(serde_json::to_value(&read).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn directory_read_is_formatted_error() {
        let tmp = TempDir::new().unwrap();
        let read = read_capped(tmp.path());
        let FileRead::Failed(msg) = read else { panic!("expected failure, got {read:?}") };
        assert!(msg.starts_with("Error reading "));
    }

    #[test]
    fn multibyte_content_cuts_on_char_boundary() {
        let read = cap_text("é".repeat(10), 4);
        assert_eq!(read, FileRead::Truncated(format!("éééé{TRUNCATION_MARKER}")));
        assert_eq!(excerpt("héllo", 2), "hé");
    }
}
