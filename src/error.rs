use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong during a synthesis run.
///
/// Most variants are per-unit or per-directive findings that get collected
/// and reported at the end of the run. Only `InvalidRoot`, `InvalidPattern`
/// and `Config` abort a run before it starts.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("cannot read {}: {source}", path.display())]
    UnreadableUnit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    UnterminatedToken {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{line}: ambiguous re-export `{directive}`: {reason}", path.display())]
    AmbiguousDirective {
        path: PathBuf,
        line: usize,
        directive: String,
        reason: String,
    },

    #[error("`{name}` is contributed by {} sources in {module}", contributors.len())]
    Collision {
        module: String,
        name: String,
        contributors: Vec<PathBuf>,
    },

    #[error("`{name}` in {module} shadows {} glob-imported item(s)", hidden.len())]
    ShadowedName {
        module: String,
        name: String,
        hidden: Vec<PathBuf>,
    },

    #[error("cannot write {}: {message}", path.display())]
    WriteFailure { path: PathBuf, message: String },

    #[error("{} links back to {}, skipping", path.display(), target.display())]
    CyclicLink { path: PathBuf, target: PathBuf },

    #[error("{}:{line}: re-export target `{target}` is not a module of this tree", path.display())]
    UnresolvedTarget {
        path: PathBuf,
        line: usize,
        target: String,
    },

    #[error("{}:{line}: re-export of `{target}` loops back to a module still being resolved", path.display())]
    ReexportCycle {
        path: PathBuf,
        line: usize,
        target: String,
    },

    #[error("{}:{line}: exports of `{target}` are incomplete ({reason}), directive left as is", path.display())]
    IncompleteTarget {
        path: PathBuf,
        line: usize,
        target: String,
        reason: String,
    },

    #[error("root {} is not a readable directory", path.display())]
    InvalidRoot { path: PathBuf },

    #[error("invalid glob pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

/// Stable, machine-readable name of an error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnreadableUnit,
    UnterminatedToken,
    AmbiguousDirective,
    Collision,
    ShadowedName,
    WriteFailure,
    CyclicLink,
    UnresolvedTarget,
    ReexportCycle,
    IncompleteTarget,
    InvalidRoot,
    InvalidPattern,
    Config,
}

/// How much an error weighs on the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Failure,
}

impl SynthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SynthError::UnreadableUnit { .. } => ErrorKind::UnreadableUnit,
            SynthError::UnterminatedToken { .. } => ErrorKind::UnterminatedToken,
            SynthError::AmbiguousDirective { .. } => ErrorKind::AmbiguousDirective,
            SynthError::Collision { .. } => ErrorKind::Collision,
            SynthError::ShadowedName { .. } => ErrorKind::ShadowedName,
            SynthError::WriteFailure { .. } => ErrorKind::WriteFailure,
            SynthError::CyclicLink { .. } => ErrorKind::CyclicLink,
            SynthError::UnresolvedTarget { .. } => ErrorKind::UnresolvedTarget,
            SynthError::ReexportCycle { .. } => ErrorKind::ReexportCycle,
            SynthError::IncompleteTarget { .. } => ErrorKind::IncompleteTarget,
            SynthError::InvalidRoot { .. } => ErrorKind::InvalidRoot,
            SynthError::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            SynthError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Collisions are only failures when the caller asks for it.
    pub fn severity(&self, fail_on_collision: bool) -> Severity {
        match self.kind() {
            ErrorKind::Collision if fail_on_collision => Severity::Failure,
            ErrorKind::Collision
            | ErrorKind::ShadowedName
            | ErrorKind::AmbiguousDirective
            | ErrorKind::CyclicLink
            | ErrorKind::UnresolvedTarget
            | ErrorKind::ReexportCycle
            | ErrorKind::IncompleteTarget => Severity::Warning,
            ErrorKind::UnreadableUnit
            | ErrorKind::UnterminatedToken
            | ErrorKind::WriteFailure
            | ErrorKind::InvalidRoot
            | ErrorKind::InvalidPattern
            | ErrorKind::Config => Severity::Failure,
        }
    }

    /// The file the error is about, if there is one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            SynthError::UnreadableUnit { path, .. }
            | SynthError::UnterminatedToken { path, .. }
            | SynthError::AmbiguousDirective { path, .. }
            | SynthError::WriteFailure { path, .. }
            | SynthError::CyclicLink { path, .. }
            | SynthError::UnresolvedTarget { path, .. }
            | SynthError::ReexportCycle { path, .. }
            | SynthError::IncompleteTarget { path, .. }
            | SynthError::InvalidRoot { path }
            | SynthError::Config { path, .. } => Some(path),
            SynthError::Collision { .. }
            | SynthError::ShadowedName { .. }
            | SynthError::InvalidPattern { .. } => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            SynthError::UnterminatedToken { line, .. }
            | SynthError::AmbiguousDirective { line, .. }
            | SynthError::UnresolvedTarget { line, .. }
            | SynthError::ReexportCycle { line, .. }
            | SynthError::IncompleteTarget { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_severity_follows_flag() {
        let err = SynthError::Collision {
            module: "crate::table".to_string(),
            name: "list_field".to_string(),
            contributors: vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")],
        };
        assert_eq!(err.severity(false), Severity::Warning);
        assert_eq!(err.severity(true), Severity::Failure);
        assert_eq!(err.kind(), ErrorKind::Collision);
        assert!(err.path().is_none());
    }

    #[test]
    fn test_shadowed_name_is_always_a_warning() {
        let err = SynthError::ShadowedName {
            module: "crate".to_string(),
            name: "run".to_string(),
            hidden: vec![PathBuf::from("src/x.rs")],
        };
        assert_eq!(err.severity(true), Severity::Warning);
        assert_eq!(err.kind(), ErrorKind::ShadowedName);
        assert_eq!(err.to_string(), "`run` in crate shadows 1 glob-imported item(s)");
    }

    #[test]
    fn test_unterminated_token_is_failure_with_location() {
        let err = SynthError::UnterminatedToken {
            path: PathBuf::from("src/lib.rs"),
            line: 7,
            message: "unterminated block comment".to_string(),
        };
        assert_eq!(err.severity(false), Severity::Failure);
        assert_eq!(err.line(), Some(7));
        assert_eq!(err.to_string(), "src/lib.rs:7: unterminated block comment");
    }
}
