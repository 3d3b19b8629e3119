pub mod span;
pub mod symbol;
pub mod extractor;
pub mod module;
pub mod file_walker;
pub mod processor;
pub mod resolver;
pub mod rewriter;
pub mod report;
pub mod config;
pub mod error;
pub mod timing;
pub mod synthesizer;

// Re-export commonly used types for convenience
pub use config::{load_config, ReportFormat, SynthConfig};
pub use error::SynthError;
pub use extractor::{DeclarationExtractor, ReexportDirective};
pub use file_walker::{FileWalker, ModuleBoundary};
pub use module::{Module, ModuleId, ModuleTree};
pub use processor::Processor;
pub use report::RunReport;
pub use resolver::{ExportResolver, ExportSet};
pub use symbol::{Symbol, SymbolKind};
pub use synthesizer::Synthesizer;
