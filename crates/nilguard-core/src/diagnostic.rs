//! Diagnostic type and output formatting.
//!
//! A finding is one line of text; all formatters consume the same
//! struct. Paths always use forward slashes, whatever the host.

use serde::{Deserialize, Serialize};

/// One "may be nil" finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// `<package path>/<file basename>`, forward slashes.
    pub path: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub col: u32,
    /// Re-serialized selector expression, e.g. `gt.N`.
    pub selector: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{} {} may be nil",
            self.path, self.line, self.col, self.selector
        )
    }
}

/// The default line-per-finding output.
pub fn format_lines(diags: &[Diagnostic]) -> String {
    let mut out = String::new();
    for d in diags {
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}

/// Machine-readable output for `--format json`.
pub fn format_json(diags: &[Diagnostic]) -> String {
    let mut s = serde_json::to_string_pretty(diags).expect("diagnostics serialize");
    s.push('\n');
    s
}
