use crate::error::SynthError;
use crate::span::{line_of, Span};
use crate::symbol::ident_text;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const DEFAULT_MAX_WIDTH: usize = 100;

/// Replace the `*` at `glob` with an explicit list of `names`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub glob: Span,
    pub names: Vec<String>,
}

/// What happened to one manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    /// The planned text equals the current text.
    Unchanged,
    /// Dry run: the file would have been rewritten.
    WouldChange,
    Written,
    /// An interrupt arrived before the write.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedText {
    pub text: String,
    /// Rendered list per edit, in the order the edits were given.
    pub rendered: Vec<String>,
}

/// Edit positions that no longer hold a `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleEdit {
    pub offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions {
    pub dry_run: bool,
    pub max_width: usize,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        RewriteOptions { dry_run: false, max_width: DEFAULT_MAX_WIDTH }
    }
}

/// Applies wildcard replacements to manifests on disk.
pub struct ManifestRewriter {
    options: RewriteOptions,
    interrupted: Arc<AtomicBool>,
}

impl ManifestRewriter {
    pub fn new(options: RewriteOptions) -> Self {
        ManifestRewriter { options, interrupted: Arc::new(AtomicBool::new(false)) }
    }

    /// Share an interrupt flag; once it is set no further file is written.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Rewrite `path`, whose content was `analysed` when it was scanned.
    pub fn apply(&self, path: &Path, analysed: &str, edits: &[Edit]) -> Result<(FileOutcome, PlannedText), SynthError> {
        let planned = plan(analysed, edits, self.options.max_width).map_err(|stale| SynthError::AmbiguousDirective {
            path: path.to_path_buf(),
            line: line_of(analysed, stale.offset),
            directive: "*".to_string(),
            reason: "re-export no longer holds a wildcard".to_string(),
        })?;

        if planned.text.as_bytes() == analysed.as_bytes() {
            return Ok((FileOutcome::Unchanged, planned));
        }
        if self.options.dry_run {
            return Ok((FileOutcome::WouldChange, planned));
        }
        if self.is_interrupted() {
            return Ok((FileOutcome::Interrupted, planned));
        }

        let on_disk = fs::read_to_string(path).map_err(|e| write_failure(path, e))?;
        if on_disk != analysed {
            return Err(SynthError::WriteFailure {
                path: path.to_path_buf(),
                message: "file changed on disk since it was scanned".to_string(),
            });
        }
        replace_atomically(path, &planned.text)?;
        Ok((FileOutcome::Written, planned))
    }
}

/// Compute the new text without touching the filesystem.
///
/// Only the bytes of each `*` change. Edits are applied from the end of the
/// text backwards so earlier spans stay valid.
pub fn plan(text: &str, edits: &[Edit], max_width: usize) -> Result<PlannedText, StaleEdit> {
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut rendered = vec![String::new(); edits.len()];
    let mut order: Vec<usize> = (0..edits.len()).collect();
    order.sort_by(|&a, &b| edits[b].glob.start.cmp(&edits[a].glob.start));

    let mut out = text.to_string();
    for index in order {
        let Edit { glob, names } = &edits[index];
        if text.get(glob.start..glob.end) != Some("*") {
            return Err(StaleEdit { offset: glob.start.min(text.len()) });
        }
        let list = render_list(text, *glob, names, max_width, newline);
        out.replace_range(glob.start..glob.end, &list);
        rendered[index] = list;
    }
    Ok(PlannedText { text: out, rendered })
}

/// `{a, b}` if it fits on the line, otherwise one name per line.
fn render_list(text: &str, glob: Span, names: &[String], max_width: usize, newline: &str) -> String {
    let names: Vec<_> = names.iter().map(|name| ident_text(name)).collect();
    let single = format!("{{{}}}", names.join(", "));

    let line_start = text[..glob.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[glob.end..].find('\n').map_or(text.len(), |i| glob.end + i);
    let head = &text[line_start..glob.start];
    let tail = text[glob.end..line_end].trim_end_matches('\r');
    let width = head.chars().count() + single.chars().count() + tail.chars().count();
    if names.is_empty() || width <= max_width {
        return single;
    }

    let indent: String = head.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
    let mut list = String::from("{");
    list.push_str(newline);
    for name in &names {
        list.push_str(&indent);
        list.push_str("    ");
        list.push_str(name);
        list.push(',');
        list.push_str(newline);
    }
    list.push_str(&indent);
    list.push('}');
    list
}

fn write_failure(path: &Path, err: impl ToString) -> SynthError {
    SynthError::WriteFailure { path: path.to_path_buf(), message: err.to_string() }
}

/// Write to a sibling temp file, then rename it over `path`.
fn replace_atomically(path: &Path, content: &str) -> Result<(), SynthError> {
    let parent: PathBuf = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let permissions = fs::metadata(path).map_err(|e| write_failure(path, e))?.permissions();

    let mut temp = NamedTempFile::new_in(&parent).map_err(|e| write_failure(path, e))?;
    temp.write_all(content.as_bytes()).map_err(|e| write_failure(path, e))?;
    temp.as_file().sync_all().map_err(|e| write_failure(path, e))?;
    fs::set_permissions(temp.path(), permissions).map_err(|e| write_failure(path, e))?;
    temp.persist(path).map_err(|e| write_failure(path, e.error))?;
    Ok(())
}
