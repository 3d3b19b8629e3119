use export_synth::config::{load_config, ReportFormat, SynthConfig, DEFAULT_CONFIG_FILE};
use export_synth::error::SynthError;
use export_synth::report::{RunReport, EXIT_FAILURE};
use export_synth::Synthesizer;

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rewrite `pub use path::*;` into explicit export lists", long_about = None)]
struct Cli {
    /// Directory holding the root manifest (lib.rs, main.rs or mod.rs)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report without writing any file
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Only rewrite manifests (relative path) or modules (crate::a::b) matching these globs
    #[arg(short, long)]
    include: Vec<String>,

    /// Leave paths matching these globs out of the tree entirely
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Exit with failure when any collision is found
    #[arg(long)]
    fail_on_collision: bool,

    /// Wrap explicit lists longer than this
    #[arg(long)]
    max_width: Option<usize>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<ReportFormat>,

    /// Write the report to this file instead of stdout
    #[arg(long)]
    report: Option<PathBuf>,

    /// Directory levels below the root to descend into
    #[arg(long)]
    max_depth: Option<usize>,

    /// Number of extraction threads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// No progress output on stderr
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Flags win over the file; list flags extend it.
    fn merge_into(&self, mut config: SynthConfig) -> SynthConfig {
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        config.dry_run |= self.dry_run;
        config.fail_on_collision |= self.fail_on_collision;
        config.include.extend(self.include.iter().cloned());
        config.exclude.extend(self.exclude.iter().cloned());
        if let Some(max_width) = self.max_width {
            config.max_width = max_width;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.report.is_some() {
            config.report = self.report.clone();
        }
        if self.jobs.is_some() {
            config.jobs = self.jobs;
        }
        if self.max_depth.is_some() {
            config.max_depth = self.max_depth;
        }
        config
    }
}

/// Load the configuration file, apply the flags and validate the result.
fn settle_config(cli: &Cli) -> Result<SynthConfig, SynthError> {
    let config_path = cli.config_path();
    if cli.config.is_some() && !config_path.exists() {
        return Err(SynthError::Config { path: config_path, message: "does not exist".to_string() });
    }
    let config = cli.merge_into(load_config(&config_path)?);
    config.validate(&config_path)?;
    Ok(config)
}

/// Report for a run that could not start, built from the flags alone.
fn failure_report(cli: &Cli, err: &SynthError) -> RunReport {
    let defaults = SynthConfig::default();
    let root = cli.root.as_deref().unwrap_or(&defaults.root);
    let mut report = RunReport::new(root, cli.dry_run, cli.fail_on_collision);
    report.push_error(err);
    report
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(EXIT_FAILURE);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let quiet = cli.quiet;
    let config = match settle_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            let report = failure_report(&cli, &err);
            emit(&report, cli.format.unwrap_or_default(), cli.report.as_deref())?;
            return Err(err.into());
        }
    };
    let config_path = cli.config_path();
    if !quiet && config_path.exists() {
        eprintln!("Loaded configuration from '{}'", config_path.display());
    }
    let format = config.format;
    let destination = config.report.clone();

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)).context("installing the interrupt handler")?;

    if !quiet {
        let mode = if config.dry_run { " (dry run)" } else { "" };
        eprintln!("Synthesizing exports under {}{mode}", config.root.display());
    }

    let root = config.root.clone();
    let (dry_run, fail_on_collision) = (config.dry_run, config.fail_on_collision);
    let report = match Synthesizer::new(config).with_interrupt(interrupted).with_progress(!quiet).run() {
        Ok(report) => report,
        Err(err) => {
            // fatal before anything ran; still emit a report
            let mut report = RunReport::new(&root, dry_run, fail_on_collision);
            report.push_error(&err);
            emit(&report, format, destination.as_deref())?;
            return Err(err.into());
        }
    };

    emit(&report, format, destination.as_deref())?;
    if !quiet {
        for timing in &report.timings {
            eprintln!("  {timing}");
        }
    }
    Ok(report.exit_code())
}

fn emit(report: &RunReport, format: ReportFormat, destination: Option<&Path>) -> anyhow::Result<()> {
    report.emit(format, destination).with_context(|| match destination {
        Some(path) => format!("writing the report to {}", path.display()),
        None => "writing the report to stdout".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_synth::error::ErrorKind;
    use std::fs;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("export-synth").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("synth.toml");
        fs::write(&path, "root = \"crates/api/src\"\nexclude = [\"gen/**\"]\nmax_width = 80\njobs = 2\n").unwrap();
        let config_arg = path.to_str().unwrap();

        let config = settle_config(&cli(&["-c", config_arg])).unwrap();
        assert_eq!(config.root, PathBuf::from("crates/api/src"));
        assert_eq!(config.max_width, 80);
        assert_eq!(config.max_depth, None);

        let args = ["-c", config_arg, "-r", "lib/src", "-e", "tests/**", "--max-width", "60", "--max-depth", "3", "-n"];
        let config = settle_config(&cli(&args)).unwrap();
        assert_eq!(config.root, PathBuf::from("lib/src"));
        assert_eq!(config.exclude, vec!["gen/**".to_string(), "tests/**".to_string()]);
        assert_eq!(config.max_width, 60);
        assert_eq!(config.max_depth, Some(3));
        assert_eq!(config.jobs, Some(2));
        assert!(config.dry_run);
    }

    #[test]
    fn test_missing_explicit_config_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = settle_config(&cli(&["--config", path.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, SynthError::Config { .. }));
        assert_eq!(err.path(), Some(&path));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("synth.toml");
        fs::write(&path, "jobs = 0\n").unwrap();
        let err = settle_config(&cli(&["-c", path.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, SynthError::Config { .. }));

        fs::write(&path, "").unwrap();
        let err = settle_config(&cli(&["-c", path.to_str().unwrap(), "-e", "["])).unwrap_err();
        assert!(matches!(err, SynthError::InvalidPattern { .. }));
    }

    #[test]
    fn test_failure_report_carries_the_error() {
        let args = cli(&["-r", "crates/api/src", "-n", "--fail-on-collision"]);
        let err = SynthError::InvalidPattern { pattern: "[".to_string(), message: "unclosed".to_string() };
        let report = failure_report(&args, &err);
        assert_eq!(report.exit_code(), EXIT_FAILURE);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ErrorKind::InvalidPattern);
        assert!(report.dry_run);

        let report = failure_report(&cli(&[]), &err);
        assert_eq!(report.root, PathBuf::from("src"));
    }
}
