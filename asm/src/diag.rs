use color_print::cprintln;
use thiserror::Error;

use crate::lexer::{Pos, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One collected diagnostic, anchored to the tokens that caused it.
#[derive(Debug, Clone)]
pub struct Diag {
    pub severity: Severity,
    pub message: String,
    pub pos: Option<Pos>,
}

impl Diag {
    /// Print with the offending source line, rustc-arrow style.
    pub fn print(&self, file: &str, lines: &[String]) {
        match self.severity {
            Severity::Error => cprintln!("<red,bold>error</>: {}", self.message),
            Severity::Warning => cprintln!("<yellow,bold>warning</>: {}", self.message),
        }
        let Some(pos) = self.pos else { return };
        let line_num = pos.line + 1;
        cprintln!("     <blue>--></> <underline>{}:{}:{}</>", file, line_num, pos.col + 1);
        cprintln!("      <blue>|</>");
        let content = lines.get(pos.line).map(|s| s.as_str()).unwrap_or("");
        cprintln!(" <blue>{:>4} |</> {}", line_num, content);
        cprintln!("      <blue>|</>");
    }
}

/// Diagnostic accumulator threaded through every pass; phases append and
/// never abort, so one compile yields every independent finding.
#[derive(Debug, Default)]
pub struct DiagSink {
    pub diags: Vec<Diag>,
}

impl DiagSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>, token: Option<&Token>) {
        self.diags.push(Diag {
            severity: Severity::Error,
            message: message.into(),
            pos: token.map(|t| t.pos),
        });
    }

    pub fn warning(&mut self, message: impl Into<String>, token: Option<&Token>) {
        self.diags.push(Diag {
            severity: Severity::Warning,
            message: message.into(),
            pos: token.map(|t| t.pos),
        });
    }

    pub fn error_at(&mut self, message: impl Into<String>, pos: Pos) {
        self.diags.push(Diag {
            severity: Severity::Error,
            message: message.into(),
            pos: Some(pos),
        });
    }

    pub fn warning_at(&mut self, message: impl Into<String>, pos: Pos) {
        self.diags.push(Diag {
            severity: Severity::Warning,
            message: message.into(),
            pos: Some(pos),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diags
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diag> {
        self.diags.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diag> {
        self.diags
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

/// Hard failures outside the collected-diagnostic pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to read file: {0}")]
    FileRead(String, #[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}
