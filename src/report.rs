use crate::config::ReportFormat;
use crate::error::{ErrorKind, Severity, SynthError};
use crate::span::Span;
use crate::resolver::{Collision, CollisionSource};
use crate::rewriter::FileOutcome;
use crate::timing::PhaseTiming;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Marker attached to every finding that a human has to settle.
pub const MANUAL_RESOLUTION: &str = "NEEDS MANUAL RESOLUTION";

pub const EXIT_CLEAN: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_WARNINGS: i32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub modules_scanned: usize,
    pub units_scanned: usize,
    pub directives_found: usize,
    pub directives_rewritten: usize,
    pub files_changed: usize,
    pub files_written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveStatus {
    Rewritten,
    /// Dry run, or the file was not written because of an interrupt or error.
    WouldRewrite,
    Pinned,
    Ambiguous,
    Unresolved,
    Cycle,
    Incomplete,
}

impl DirectiveStatus {
    fn label(self) -> &'static str {
        match self {
            DirectiveStatus::Rewritten => "rewritten",
            DirectiveStatus::WouldRewrite => "would rewrite",
            DirectiveStatus::Pinned => "pinned",
            DirectiveStatus::Ambiguous => "ambiguous",
            DirectiveStatus::Unresolved => "unresolved",
            DirectiveStatus::Cycle => "cycle",
            DirectiveStatus::Incomplete => "incomplete",
        }
    }
}

/// One re-export directive and what became of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveRecord {
    pub manifest: PathBuf,
    pub module: String,
    pub line: usize,
    pub span: Span,
    pub target: String,
    pub status: DirectiveStatus,
    /// Names in the explicit list, rewritten or pinned.
    pub names: Vec<String>,
    /// Names left out of the rewritten list because they collide.
    pub withheld: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub before: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionRecord {
    /// Fully qualified, e.g. `crate::table::list_field`.
    pub name: String,
    pub module: String,
    pub resolution: &'static str,
    pub contributors: Vec<CollisionSource>,
}

impl From<&Collision> for CollisionRecord {
    fn from(collision: &Collision) -> Self {
        CollisionRecord {
            name: collision.qualified_name(),
            module: collision.module.clone(),
            resolution: MANUAL_RESOLUTION,
            contributors: collision.contributors.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

/// Everything a run found and did. Always emitted, whatever the exit code.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub dry_run: bool,
    pub fail_on_collision: bool,
    pub interrupted: bool,
    pub stats: RunStats,
    pub collisions: Vec<CollisionRecord>,
    pub directives: Vec<DirectiveRecord>,
    pub files: Vec<FileRecord>,
    pub errors: Vec<ErrorRecord>,
    pub timings: Vec<PhaseTiming>,
}

impl RunReport {
    pub fn new(root: &Path, dry_run: bool, fail_on_collision: bool) -> Self {
        RunReport {
            root: root.to_path_buf(),
            dry_run,
            fail_on_collision,
            interrupted: false,
            stats: RunStats::default(),
            collisions: Vec::new(),
            directives: Vec::new(),
            files: Vec::new(),
            errors: Vec::new(),
            timings: Vec::new(),
        }
    }

    pub fn push_error(&mut self, err: &SynthError) {
        self.errors.push(ErrorRecord {
            kind: err.kind(),
            severity: err.severity(self.fail_on_collision),
            path: err.path().cloned(),
            line: err.line(),
            message: err.to_string(),
        });
    }

    /// Record a collision both as a finding and as an error.
    pub fn push_collision(&mut self, collision: &Collision) {
        self.collisions.push(CollisionRecord::from(collision));
        self.push_error(&collision.to_error());
    }

    pub fn has_failures(&self) -> bool {
        self.interrupted || self.errors.iter().any(|e| e.severity == Severity::Failure)
    }

    /// `0` clean, `3` warnings only, `1` anything failed.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            EXIT_FAILURE
        } else if self.errors.is_empty() {
            EXIT_CLEAN
        } else {
            EXIT_WARNINGS
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(self),
            ReportFormat::Text => Ok(self.render_text()),
        }
    }

    /// Write the report to `destination`, or stdout when there is none.
    pub fn emit(&self, format: ReportFormat, destination: Option<&Path>) -> io::Result<()> {
        let mut rendered = self.render(format).map_err(io::Error::other)?;
        if !rendered.ends_with('\n') {
            rendered.push('\n');
        }
        match destination {
            Some(path) => fs::write(path, rendered),
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(rendered.as_bytes())?;
                stdout.flush()
            }
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };
        let _ = writeln!(out, "export-synth report for {}{mode}", self.root.display());
        let stats = &self.stats;
        let _ = writeln!(out, "  modules scanned:      {}", stats.modules_scanned);
        let _ = writeln!(out, "  units scanned:        {}", stats.units_scanned);
        let _ = writeln!(out, "  directives found:     {}", stats.directives_found);
        let _ = writeln!(out, "  directives rewritten: {}", stats.directives_rewritten);
        let _ = writeln!(out, "  files changed:        {}", stats.files_changed);
        let _ = writeln!(out, "  files written:        {}", stats.files_written);

        if !self.directives.is_empty() {
            let _ = writeln!(out, "\ndirectives:");
            for record in &self.directives {
                let _ = write!(
                    out,
                    "  {}:{} `{}` {}",
                    record.manifest.display(),
                    record.line,
                    record.target,
                    record.status.label()
                );
                match record.status {
                    DirectiveStatus::Rewritten | DirectiveStatus::WouldRewrite | DirectiveStatus::Pinned => {
                        let _ = write!(out, " {{{}}}", record.names.join(", "));
                    }
                    _ => {}
                }
                if let Some(reason) = &record.reason {
                    let _ = write!(out, ": {reason}");
                }
                let _ = writeln!(out);
                if !record.withheld.is_empty() {
                    let _ = writeln!(out, "    withheld {} ({MANUAL_RESOLUTION})", record.withheld.join(", "));
                }
            }
        }

        if !self.collisions.is_empty() {
            let _ = writeln!(out, "\ncollisions:");
            for collision in &self.collisions {
                let _ = writeln!(out, "  {} {}", collision.name, collision.resolution);
                for source in &collision.contributors {
                    let _ = writeln!(out, "    {}:{} via {}", source.origin.display(), source.line, source.via);
                }
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nerrors:");
            for error in &self.errors {
                let severity = match error.severity {
                    Severity::Warning => "warning",
                    Severity::Failure => "failure",
                };
                let _ = writeln!(out, "  {severity}: {}", error.message);
            }
        }

        if !self.timings.is_empty() {
            let _ = writeln!(out, "\ntimings:");
            for timing in &self.timings {
                let _ = writeln!(out, "  {timing}");
            }
        }

        if self.interrupted {
            let _ = writeln!(out, "\ninterrupted: remaining files were not written");
        }
        out
    }
}
