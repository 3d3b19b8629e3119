use crate::error::SynthError;
use crate::extractor::{DeclarationExtractor, UnitScan};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads source units and runs the extractor over them, in parallel.
pub struct Processor {
    threads: Option<usize>,
}

impl Processor {
    /// Create a Processor that uses rayon's global pool
    pub fn new() -> Self {
        Processor { threads: None }
    }

    /// Run extraction on a dedicated pool of `threads` workers
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    /// Read and scan a single unit
    pub fn process_file<P: AsRef<Path>>(&self, file_path: P) -> Result<UnitScan, SynthError> {
        let file_path = file_path.as_ref();
        let content = fs::read_to_string(file_path).map_err(|source| SynthError::UnreadableUnit {
            path: file_path.to_path_buf(),
            source,
        })?;
        DeclarationExtractor::extract_from_file(file_path, &content)
    }

    /// Scan many units; results come back in input order, one per path.
    pub fn process_files(&self, file_paths: &[PathBuf]) -> Vec<Result<UnitScan, SynthError>> {
        let run = || -> Vec<Result<UnitScan, SynthError>> {
            file_paths
                .par_iter()
                .map(|file_path| self.process_file(file_path))
                .collect()
        };

        match self.threads {
            Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(run),
                Err(_) => run(),
            },
            None => run(),
        }
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}
