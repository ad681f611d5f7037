use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(alias = "error", alias = "ERROR")]
    Error,
    #[serde(alias = "warning", alias = "WARNING", alias = "warn", alias = "Warn")]
    Warning,
    #[serde(alias = "info", alias = "INFO", alias = "advice", alias = "Advice")]
    Info,
    #[serde(alias = "hint", alias = "HINT")]
    Hint,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Info => write!(f, "Info"),
            Severity::Hint => write!(f, "Hint"),
        }
    }
}

/// A source span attached to a diagnostic. Offsets are into the artifact's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub message: String,
    pub start: usize,
    pub end: usize,
}

/// One compile-time or runtime message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub codeframe: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            labels: Vec::new(),
            codeframe: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Ok,
    Error,
}

/// Outcome of a sandboxed run, in one shape regardless of where a failure
/// came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub status: ReportStatus,
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
    #[serde(rename = "canSendBack", default)]
    pub can_send_back: bool,
}

impl DiagnosticReport {
    pub fn ok() -> Self {
        Self {
            status: ReportStatus::Ok,
            errors: Vec::new(),
            can_send_back: false,
        }
    }

    /// Wrap an unstructured failure (channel error, sandbox crash, handshake
    /// timeout) as a single error diagnostic that may be sent back.
    pub fn from_failure(message: impl Into<String>) -> Self {
        Self {
            status: ReportStatus::Error,
            errors: vec![Diagnostic::error(message)],
            can_send_back: true,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ReportStatus::Error
    }

    /// Severities in order; two runs of the same code should agree on this.
    pub fn shape(&self) -> Vec<Severity> {
        self.errors.iter().map(|d| d.severity).collect()
    }

    /// Render every diagnostic as a numbered block suitable for handing back
    /// to a code generator.
    pub fn format_for_send_back(&self) -> String {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, diagnostic)| format_diagnostic(i + 1, diagnostic))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

const INDENT: &str = "   ";

fn format_diagnostic(index: usize, diagnostic: &Diagnostic) -> String {
    let mut lines = vec![format!(
        "{index}. {}: {}",
        diagnostic.severity, diagnostic.message
    )];

    for label in &diagnostic.labels {
        lines.push(format!(
            "{INDENT}• {} (position: {}-{})",
            label.message, label.start, label.end
        ));
    }

    if !diagnostic.codeframe.is_empty() {
        lines.push(format!("{INDENT}Code snippet:"));
        lines.extend(
            diagnostic
                .codeframe
                .lines()
                .map(|line| format!("{INDENT}{line}")),
        );
    }

    lines.join("\n")
}
