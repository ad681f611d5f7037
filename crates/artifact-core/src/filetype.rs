//! Filetype classification.
//!
//! Filetypes are MIME-like strings (`text/*`, `application/vnd.*`). They pick
//! whether an artifact is executed in the sandbox or only shown as source,
//! and which language the source view uses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewKind {
    /// Rendered by running the code in the sandbox.
    Sandbox,
    /// No live preview; show the source.
    Source,
    Unsupported,
}

const SANDBOX_FILETYPES: &[&str] = &[
    "text/html",
    "application/vnd.ant.html",
    "application/vnd.ant.react",
    "application/vnd.ant.tsx",
    "application/vnd.ant.jsx",
    "application/vnd.ant.mermaid",
    "image/svg+xml",
    "application/javascript",
    "text/javascript",
    "application/typescript",
];

pub fn preview_kind(filetype: &str) -> PreviewKind {
    let filetype = filetype.trim().to_ascii_lowercase();
    if SANDBOX_FILETYPES.contains(&filetype.as_str()) {
        PreviewKind::Sandbox
    } else if filetype.starts_with("text/") || filetype.starts_with("application/") {
        PreviewKind::Source
    } else {
        PreviewKind::Unsupported
    }
}

fn language_from_filetype(filetype: &str) -> Option<&'static str> {
    Some(match filetype {
        "application/javascript" | "text/javascript" => "javascript",
        "application/typescript" => "typescript",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/yaml" => "yaml",
        "application/vnd.ant.react" | "application/vnd.ant.tsx" => "tsx",
        "application/vnd.ant.jsx" => "jsx",
        "application/vnd.ant.mermaid" => "mermaid",
        "application/vnd.ant.html" | "text/html" => "html",
        "application/vnd.ant.css" | "text/css" => "css",
        "application/vnd.ant.md" | "text/markdown" => "markdown",
        "application/vnd.ant.sh" => "bash",
        _ => return None,
    })
}

fn language_from_extension(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(match ext.to_ascii_lowercase().as_str() {
        "js" => "javascript",
        "jsx" => "jsx",
        "ts" => "typescript",
        "tsx" => "tsx",
        "py" => "python",
        "rb" => "ruby",
        "java" => "java",
        "go" => "go",
        "rs" => "rust",
        "c" => "c",
        "cpp" => "cpp",
        "cs" => "csharp",
        "php" => "php",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "md" => "markdown",
        "sh" => "bash",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        "sql" => "sql",
        _ => return None,
    })
}

/// Source-view language: filetype first, then the filename extension.
pub fn language_for(filetype: &str, filename: &str) -> Option<&'static str> {
    language_from_filetype(&filetype.trim().to_ascii_lowercase())
        .or_else(|| language_from_extension(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_preview_kinds() {
        assert_eq!(preview_kind("application/vnd.ant.html"), PreviewKind::Sandbox);
        assert_eq!(preview_kind("application/vnd.ant.react"), PreviewKind::Sandbox);
        assert_eq!(preview_kind("Text/HTML"), PreviewKind::Sandbox);
        assert_eq!(preview_kind("application/json"), PreviewKind::Source);
        assert_eq!(preview_kind("text/x-python"), PreviewKind::Source);
        assert_eq!(preview_kind("image/png"), PreviewKind::Unsupported);
        assert_eq!(preview_kind(""), PreviewKind::Unsupported);
    }

    #[test]
    fn language_prefers_filetype_then_extension() {
        assert_eq!(language_for("application/vnd.ant.react", "x.js"), Some("tsx"));
        assert_eq!(language_for("text/plain", "main.rs"), Some("rust"));
        assert_eq!(language_for("text/plain", "Makefile"), None);
    }
}
