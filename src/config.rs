use crate::error::SynthError;
use crate::rewriter::DEFAULT_MAX_WIDTH;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "export-synth.toml";

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

/// Run configuration, loaded from `export-synth.toml`.
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SynthConfig {
    /// Report without writing.
    pub dry_run: bool,
    /// Directory holding the root manifest.
    pub root: PathBuf,
    /// Restrict rewriting to manifests (relative path) or modules
    /// (`crate::a::b`) matching one of these. Empty means everything.
    pub include: Vec<String>,
    /// Removed from traversal altogether.
    pub exclude: Vec<String>,
    /// Any collision makes the run fail.
    pub fail_on_collision: bool,
    pub max_width: usize,
    pub format: ReportFormat,
    /// Write the report here instead of stdout.
    pub report: Option<PathBuf>,
    /// Extraction threads; rayon decides when unset.
    pub jobs: Option<usize>,
    /// Directory levels below the root to descend into.
    pub max_depth: Option<usize>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            dry_run: false,
            root: PathBuf::from("src"),
            include: Vec::new(),
            exclude: Vec::new(),
            fail_on_collision: false,
            max_width: DEFAULT_MAX_WIDTH,
            format: ReportFormat::Json,
            report: None,
            jobs: None,
            max_depth: None,
        }
    }
}

impl SynthConfig {
    pub fn include_patterns(&self) -> Result<Vec<Pattern>, SynthError> {
        compile_patterns(&self.include)
    }

    pub fn exclude_patterns(&self) -> Result<Vec<Pattern>, SynthError> {
        compile_patterns(&self.exclude)
    }

    /// Reject values that would make the run meaningless.
    pub fn validate(&self, source: &Path) -> Result<(), SynthError> {
        if self.max_width == 0 {
            return Err(SynthError::Config {
                path: source.to_path_buf(),
                message: "max_width must be at least 1".to_string(),
            });
        }
        if self.jobs == Some(0) {
            return Err(SynthError::Config {
                path: source.to_path_buf(),
                message: "jobs must be at least 1".to_string(),
            });
        }
        self.include_patterns()?;
        self.exclude_patterns()?;
        Ok(())
    }
}

pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, SynthError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| SynthError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Loads configuration from the specified TOML file path.
/// If the file does not exist, it returns the default configuration.
/// Errors during reading or parsing are propagated.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SynthConfig, SynthError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).map_err(|e| SynthError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SynthConfig::default()),
        Err(e) => Err(SynthError::Config { path: path.to_path_buf(), message: e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(dir.path().join("export-synth.toml")).unwrap();
        assert_eq!(config, SynthConfig::default());
        assert_eq!(config.max_width, 100);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export-synth.toml");
        std::fs::write(
            &path,
            r#"
root = "crates/api/src"
include = ["table/**", "crate::docs::*"]
fail_on_collision = true
format = "text"
max_depth = 4
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("crates/api/src"));
        assert_eq!(config.include.len(), 2);
        assert!(config.fail_on_collision);
        assert_eq!(config.format, ReportFormat::Text);
        assert!(!config.dry_run);
        assert_eq!(config.jobs, None);
        assert_eq!(config.max_depth, Some(4));
    }

    #[test]
    fn test_bad_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export-synth.toml");
        std::fs::write(&path, "dry_run = \"sometimes\"\n").unwrap();
        assert!(matches!(load_config(&path), Err(SynthError::Config { .. })));

        std::fs::write(&path, "unknown_option = 1\n").unwrap();
        assert!(matches!(load_config(&path), Err(SynthError::Config { .. })));
    }

    #[test]
    fn test_validate() {
        let config = SynthConfig { include: vec!["[unclosed".to_string()], ..SynthConfig::default() };
        assert!(matches!(
            config.validate(Path::new("export-synth.toml")),
            Err(SynthError::InvalidPattern { .. })
        ));

        let config = SynthConfig { jobs: Some(0), ..SynthConfig::default() };
        assert!(matches!(config.validate(Path::new("x.toml")), Err(SynthError::Config { .. })));
        assert!(SynthConfig::default().validate(Path::new("x.toml")).is_ok());
    }
}
