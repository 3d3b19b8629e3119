//! The pipeline: walk, resolve, rewrite, report.

use crate::config::SynthConfig;
use crate::error::SynthError;
use crate::extractor::{DirectiveForm, ReexportDirective};
use crate::file_walker::{FileWalker, ModuleBoundary};
use crate::module::{Module, ModuleTree};
use crate::processor::Processor;
use crate::report::{DirectiveRecord, DirectiveStatus, FileRecord, RunReport};
use crate::resolver::{self, DirectivePlan, PlanStatus};
use crate::rewriter::{Edit, FileOutcome, ManifestRewriter, PlannedText, RewriteOptions};
use crate::timing::Timer;
use glob::Pattern;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs one synthesis over a source tree.
pub struct Synthesizer {
    config: SynthConfig,
    boundary: Option<Arc<dyn ModuleBoundary>>,
    interrupted: Arc<AtomicBool>,
    progress: bool,
}

impl Synthesizer {
    pub fn new(config: SynthConfig) -> Self {
        Synthesizer {
            config,
            boundary: None,
            interrupted: Arc::new(AtomicBool::new(false)),
            progress: false,
        }
    }

    pub fn with_boundary(mut self, boundary: impl ModuleBoundary + 'static) -> Self {
        self.boundary = Some(Arc::new(boundary));
        self
    }

    /// Flag checked before every write; set it to stop writing.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Print phase lines to stderr.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn log(&self, message: impl AsRef<str>) {
        if self.progress {
            eprintln!("{}", message.as_ref());
        }
    }

    /// Run the pipeline. Only a bad root or a bad pattern is an `Err`; every
    /// other problem is recorded in the report.
    pub fn run(&self) -> Result<RunReport, SynthError> {
        let config = &self.config;
        let include = config.include_patterns()?;
        let exclude = config.exclude_patterns()?;
        let mut report = RunReport::new(&config.root, config.dry_run, config.fail_on_collision);

        let timer = Timer::new("walk");
        let processor = match config.jobs {
            Some(jobs) => Processor::new().with_threads(jobs),
            None => Processor::new(),
        };
        let mut walker = FileWalker::new().with_exclude(exclude).with_processor(processor);
        if let Some(depth) = config.max_depth {
            walker = walker.with_max_depth(depth);
        }
        if let Some(boundary) = &self.boundary {
            walker = walker.with_shared_boundary(Arc::clone(boundary));
        }
        let outcome = walker.build_tree(&config.root)?;
        let tree = outcome.tree;
        report.stats.modules_scanned = tree.len();
        report.stats.units_scanned = outcome.units_scanned;
        for err in &outcome.errors {
            report.push_error(err);
        }
        self.log(format!(
            "Found {} modules in {} units ({} unreadable)",
            tree.len(),
            outcome.units_scanned,
            outcome.errors.len()
        ));
        report.timings.push(timer.finish());

        let timer = Timer::new("resolve");
        let resolution = resolver::resolve(&tree);
        report.timings.push(timer.finish());

        let timer = Timer::new("rewrite");
        let rewriter = ManifestRewriter::new(RewriteOptions {
            dry_run: config.dry_run,
            max_width: config.max_width,
        })
        .with_interrupt(Arc::clone(&self.interrupted));

        for id in tree.post_order() {
            let module = tree.get(id);
            if !in_scope(&tree, module, &include) {
                continue;
            }
            let resolved = resolution.get(id);
            for collision in &resolved.collisions {
                report.push_collision(collision);
            }
            for shadowing in &resolved.shadowed {
                report.push_error(&shadowing.to_error());
            }
            report.stats.directives_found += module.directives.len();
            self.rewrite_module(module, &resolved.plans, &rewriter, &mut report);
        }
        report.interrupted = self.interrupted.load(Ordering::SeqCst);
        report.timings.push(timer.finish());

        self.log(format!(
            "Rewrote {} directives in {} files ({} written), {} collisions",
            report.stats.directives_rewritten,
            report.stats.files_changed,
            report.stats.files_written,
            report.collisions.len()
        ));
        Ok(report)
    }

    fn rewrite_module(
        &self,
        module: &Module,
        plans: &[DirectivePlan],
        rewriter: &ManifestRewriter,
        report: &mut RunReport,
    ) {
        let (Some(manifest), Some(source)) = (&module.manifest, &module.source) else {
            return;
        };

        let mut edits = Vec::new();
        for plan in plans {
            let directive = &module.directives[plan.index];
            if let Some(err) = plan.diagnostic(directive) {
                report.push_error(&err);
            }
            if let (PlanStatus::Rewrite { names, .. }, DirectiveForm::Wildcard { glob, .. }) =
                (&plan.status, &directive.form)
            {
                edits.push(Edit { glob: *glob, names: names.clone() });
            }
        }

        let mut applied: Option<(FileOutcome, PlannedText)> = None;
        let mut failure = None;
        if !edits.is_empty() {
            match rewriter.apply(manifest, source, &edits) {
                Ok(result) => applied = Some(result),
                Err(err) => {
                    report.push_error(&err);
                    failure = Some(err.to_string());
                }
            }
        }

        if let Some((outcome, _)) = &applied {
            match outcome {
                FileOutcome::Written => {
                    report.stats.files_written += 1;
                    report.stats.files_changed += 1;
                    report.stats.directives_rewritten += edits.len();
                    self.log(format!("Rewrote {}", manifest.display()));
                }
                FileOutcome::WouldChange => {
                    report.stats.files_changed += 1;
                    report.stats.directives_rewritten += edits.len();
                }
                FileOutcome::Interrupted => {
                    report.stats.files_changed += 1;
                    report.interrupted = true;
                }
                FileOutcome::Unchanged => {}
            }
            report.files.push(FileRecord { path: manifest.clone(), outcome: *outcome });
        }

        let mut edit_index = 0;
        for plan in plans {
            let directive = &module.directives[plan.index];
            let before = source[directive.span.start..directive.span.end].to_string();
            let mut record = DirectiveRecord {
                manifest: manifest.clone(),
                module: module.qualified_name(),
                line: directive.line,
                span: directive.span,
                target: directive.tree.clone(),
                status: DirectiveStatus::Pinned,
                names: Vec::new(),
                withheld: Vec::new(),
                reason: None,
                before,
                after: None,
            };

            match &plan.status {
                PlanStatus::Rewrite { names, withheld } => {
                    record.names = names.clone();
                    record.withheld = withheld.clone();
                    record.status = match &applied {
                        Some((FileOutcome::Written, _)) => DirectiveStatus::Rewritten,
                        _ => DirectiveStatus::WouldRewrite,
                    };
                    if let Some((outcome, planned)) = &applied {
                        record.after = Some(rendered_directive(source, directive, &planned.rendered[edit_index]));
                        if *outcome == FileOutcome::Interrupted {
                            record.reason = Some("interrupted before the file was written".to_string());
                        }
                    }
                    if let Some(message) = &failure {
                        record.reason = Some(message.clone());
                    }
                    edit_index += 1;
                }
                PlanStatus::Pinned { names } => record.names = names.clone(),
                PlanStatus::Ambiguous { reason } => {
                    record.status = DirectiveStatus::Ambiguous;
                    record.reason = Some(reason.clone());
                }
                PlanStatus::Unresolved => record.status = DirectiveStatus::Unresolved,
                PlanStatus::Cycle => record.status = DirectiveStatus::Cycle,
                PlanStatus::Incomplete { reason } => {
                    record.status = DirectiveStatus::Incomplete;
                    record.reason = Some(reason.clone());
                }
            }
            report.directives.push(record);
        }
    }
}

/// Whether `module` is selected by the include patterns.
fn in_scope(tree: &ModuleTree, module: &Module, include: &[Pattern]) -> bool {
    if include.is_empty() {
        return true;
    }
    let qualified = module.qualified_name();
    let relative = module
        .manifest
        .as_deref()
        .map(|manifest| manifest.strip_prefix(tree.root_dir()).unwrap_or(manifest));
    include.iter().any(|pattern| {
        pattern.matches(&qualified) || relative.is_some_and(|path| pattern.matches_path(path))
    })
}

/// The directive's text with its `*` replaced by `list`.
fn rendered_directive(source: &str, directive: &ReexportDirective, list: &str) -> String {
    let span = directive.span;
    match &directive.form {
        DirectiveForm::Wildcard { glob, .. } => format!(
            "{}{}{}",
            &source[span.start..glob.start],
            list,
            &source[glob.end..span.end]
        ),
        _ => source[span.start..span.end].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config(root: &Path) -> SynthConfig {
        SynthConfig { root: root.to_path_buf(), ..SynthConfig::default() }
    }

    #[test]
    fn test_include_scope_limits_rewrites() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(&root.join("lib.rs"), "pub mod a;\npub mod b;\npub use a::*;\n");
        write(&root.join("a/mod.rs"), "pub mod x;\npub use x::*;\n");
        write(&root.join("a/x.rs"), "pub fn from_x() {}\n");
        write(&root.join("b/mod.rs"), "pub mod y;\npub use y::*;\n");
        write(&root.join("b/y.rs"), "pub fn from_y() {}\n");

        let mut cfg = config(root);
        cfg.include = vec!["crate::b".to_string()];
        let report = Synthesizer::new(cfg).run().unwrap();

        assert_eq!(report.stats.files_written, 1);
        assert_eq!(fs::read_to_string(root.join("b/mod.rs")).unwrap(), "pub mod y;\npub use y::{from_y};\n");
        assert_eq!(fs::read_to_string(root.join("a/mod.rs")).unwrap(), "pub mod x;\npub use x::*;\n");
        assert_eq!(fs::read_to_string(root.join("lib.rs")).unwrap(), "pub mod a;\npub mod b;\npub use a::*;\n");

        let mut cfg = config(root);
        cfg.include = vec!["a/*.rs".to_string()];
        let report = Synthesizer::new(cfg).run().unwrap();
        assert_eq!(report.stats.files_written, 1);
        assert_eq!(fs::read_to_string(root.join("a/mod.rs")).unwrap(), "pub mod x;\npub use x::{from_x};\n");
    }

    #[test]
    fn test_interrupt_stops_writes() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(&root.join("lib.rs"), "pub mod a;\npub use a::*;\n");
        write(&root.join("a.rs"), "pub fn f() {}\n");

        let flag = Arc::new(AtomicBool::new(true));
        let report = Synthesizer::new(config(root)).with_interrupt(flag).run().unwrap();

        assert!(report.interrupted);
        assert_eq!(report.stats.files_written, 0);
        assert_eq!(report.exit_code(), crate::report::EXIT_FAILURE);
        assert_eq!(fs::read_to_string(root.join("lib.rs")).unwrap(), "pub mod a;\npub use a::*;\n");
    }

    #[test]
    fn test_custom_boundary() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(&root.join("lib.rs"), "pub mod api;\npub use api::*;\n");
        write(&root.join("api/mod.rs"), "pub fn call() {}\n");
        write(&root.join("fixtures/mod.rs"), "pub fn fixture() {}\n");

        let report = Synthesizer::new(config(root))
            .with_boundary(|dir: &Path| !dir.ends_with("fixtures"))
            .run()
            .unwrap();
        assert_eq!(report.stats.modules_scanned, 2);
        assert_eq!(report.directives[0].after.as_deref(), Some("pub use api::{call};"));
    }

    #[test]
    fn test_bad_pattern_aborts() {
        let mut cfg = SynthConfig::default();
        cfg.exclude = vec!["[".to_string()];
        assert!(matches!(Synthesizer::new(cfg).run(), Err(SynthError::InvalidPattern { .. })));
    }
}
