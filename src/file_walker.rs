use crate::error::SynthError;
use crate::module::{ModuleId, ModuleTree};
use crate::processor::Processor;
use glob::Pattern;
use regex::Regex;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use walkdir::WalkDir;

/// Decides whether a directory is a module at all.
///
/// Implemented for plain closures so callers can plug in their own layout
/// conventions without touching the walker.
pub trait ModuleBoundary: Send + Sync {
    fn is_module_dir(&self, dir: &Path) -> bool;
}

impl<F> ModuleBoundary for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_module_dir(&self, dir: &Path) -> bool {
        self(dir)
    }
}

/// Default boundary: any directory whose name is a Rust identifier.
pub struct IdentifierDirs;

impl ModuleBoundary for IdentifierDirs {
    fn is_module_dir(&self, dir: &Path) -> bool {
        dir.file_name().and_then(OsStr::to_str).is_some_and(is_identifier)
    }
}

pub fn is_identifier(name: &str) -> bool {
    static IDENT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());
    name != "_" && re.as_ref().is_some_and(|re| re.is_match(name))
}

const ROOT_MANIFESTS: [&str; 3] = ["lib.rs", "main.rs", "mod.rs"];

/// Output of a walk: the populated tree and whatever went wrong on the way.
#[derive(Debug)]
pub struct WalkOutcome {
    pub tree: ModuleTree,
    pub errors: Vec<SynthError>,
    pub units_scanned: usize,
}

/// A module found on disk before it is placed in the arena.
struct Discovered {
    name: String,
    dir: Option<PathBuf>,
    manifest: Option<PathBuf>,
    children: Vec<Discovered>,
}

/// State of one traversal.
struct Walk<'a> {
    root: &'a Path,
    /// Canonical directories on the current path, for cycle detection.
    ancestors: Vec<PathBuf>,
    errors: Vec<SynthError>,
}

/// Directory listing split into subdirectories and `.rs` files (by stem).
struct Listing {
    dirs: Vec<PathBuf>,
    files: Vec<(String, PathBuf)>,
}

/// A struct to configure module tree discovery
pub struct FileWalker {
    boundary: Arc<dyn ModuleBoundary>,
    exclude: Vec<Pattern>,
    max_depth: Option<usize>,
    processor: Processor,
}

impl FileWalker {
    /// Create a new FileWalker with default settings
    pub fn new() -> Self {
        FileWalker {
            boundary: Arc::new(IdentifierDirs),
            exclude: Vec::new(),
            max_depth: None,
            processor: Processor::new(),
        }
    }

    /// Replace the predicate deciding which directories are modules
    pub fn with_boundary(mut self, boundary: impl ModuleBoundary + 'static) -> Self {
        self.boundary = Arc::new(boundary);
        self
    }

    /// Same as `with_boundary`, for a predicate shared across runs
    pub fn with_shared_boundary(mut self, boundary: Arc<dyn ModuleBoundary>) -> Self {
        self.boundary = boundary;
        self
    }

    /// Paths (relative to the root) matching any of these are never visited
    pub fn with_exclude(mut self, patterns: Vec<Pattern>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Set the maximum directory depth to traverse
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = processor;
        self
    }

    /// Discover the module tree under `root_dir` and scan every manifest.
    ///
    /// Only an unusable root is fatal; everything else ends up in
    /// `WalkOutcome::errors`.
    pub fn build_tree<P: AsRef<Path>>(&self, root_dir: P) -> Result<WalkOutcome, SynthError> {
        let root_dir = root_dir.as_ref();
        let canonical_root = fs::canonicalize(root_dir)
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| SynthError::InvalidRoot { path: root_dir.to_path_buf() })?;

        let mut walk = Walk { root: root_dir, ancestors: vec![canonical_root], errors: Vec::new() };
        let mut listing = self.list_dir(root_dir, &mut walk);
        let manifest = ROOT_MANIFESTS
            .iter()
            .map(|name| root_dir.join(name))
            .find(|candidate| listing.files.iter().any(|(_, path)| path == candidate));
        // the other crate-root names never become child modules
        listing.files.retain(|(stem, _)| stem != "lib" && stem != "main");
        let children = self.discover_children(listing, manifest.as_deref(), 1, &mut walk);

        let mut tree = ModuleTree::new(root_dir, manifest);
        let root = tree.root();
        for child in children {
            place(&mut tree, root, child);
        }

        let mut errors = walk.errors;
        let units_scanned = self.scan_units(&mut tree, &mut errors);
        Ok(WalkOutcome { tree, errors, units_scanned })
    }

    fn list_dir(&self, dir: &Path, walk: &mut Walk) -> Listing {
        let mut listing = Listing { dirs: Vec::new(), files: Vec::new() };
        let walker = WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true).sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                    let error = match err.loop_ancestor() {
                        Some(target) => SynthError::CyclicLink { path, target: target.to_path_buf() },
                        None => SynthError::UnreadableUnit { path, source: err.into() },
                    };
                    walk.errors.push(error);
                    continue;
                }
            };
            let path = entry.path();
            if self.is_excluded(walk.root, path) {
                continue;
            }
            if entry.file_type().is_dir() {
                listing.dirs.push(path.to_path_buf());
            } else if path.extension().and_then(OsStr::to_str) == Some("rs") {
                if let Some(stem) = path.file_stem().and_then(OsStr::to_str) {
                    listing.files.push((stem.to_string(), path.to_path_buf()));
                }
            }
        }
        listing
    }

    /// Pair subdirectories with sibling files and recurse into the directories.
    fn discover_children(
        &self,
        listing: Listing,
        own_manifest: Option<&Path>,
        depth: usize,
        walk: &mut Walk,
    ) -> Vec<Discovered> {
        let mut plans: BTreeMap<String, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();

        if self.max_depth.is_none_or(|max| depth <= max) {
            for sub in listing.dirs {
                if !self.boundary.is_module_dir(&sub) {
                    continue;
                }
                if let Some(name) = sub.file_name().and_then(OsStr::to_str) {
                    plans.entry(name.to_string()).or_default().0 = Some(sub.clone());
                }
            }
        }

        for (stem, path) in listing.files {
            if own_manifest == Some(path.as_path()) || stem == "mod" || !is_identifier(&stem) {
                continue;
            }
            plans.entry(stem).or_default().1 = Some(path);
        }

        let mut children = Vec::new();
        for (name, (sub_dir, sibling_file)) in plans {
            let Some(sub_dir) = sub_dir else {
                children.push(Discovered { name, dir: None, manifest: sibling_file, children: Vec::new() });
                continue;
            };

            let canonical = match fs::canonicalize(&sub_dir) {
                Ok(canonical) => canonical,
                Err(source) => {
                    walk.errors.push(SynthError::UnreadableUnit { path: sub_dir, source });
                    continue;
                }
            };
            if walk.ancestors.contains(&canonical) {
                walk.errors.push(SynthError::CyclicLink { path: sub_dir, target: canonical });
                continue;
            }

            walk.ancestors.push(canonical);
            let sub_listing = self.list_dir(&sub_dir, walk);
            let mod_rs = sub_listing.files.iter().find(|(stem, _)| stem == "mod").map(|(_, path)| path.clone());
            let manifest = mod_rs.or(sibling_file);
            let grandchildren = self.discover_children(sub_listing, manifest.as_deref(), depth + 1, walk);
            walk.ancestors.pop();

            // a directory without a manifest only matters if something below it does
            if manifest.is_none() && grandchildren.is_empty() {
                continue;
            }
            children.push(Discovered { name, dir: Some(sub_dir), manifest, children: grandchildren });
        }
        children
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        self.exclude.iter().any(|pattern| pattern.matches_path(relative))
    }

    /// Extract every manifest and attach the results to its module.
    fn scan_units(&self, tree: &mut ModuleTree, errors: &mut Vec<SynthError>) -> usize {
        let units: Vec<(ModuleId, PathBuf)> = tree
            .iter()
            .filter_map(|module| module.manifest.clone().map(|manifest| (module.id, manifest)))
            .collect();
        let paths: Vec<PathBuf> = units.iter().map(|(_, path)| path.clone()).collect();
        let results = self.processor.process_files(&paths);

        for ((id, _), result) in units.iter().zip(results) {
            let module = tree.get_mut(*id);
            match result {
                Ok(scan) => {
                    module.own_symbols = scan.symbols;
                    module.directives = scan.directives;
                    module.source = Some(scan.source);
                }
                Err(err) => {
                    module.scan_failed = true;
                    errors.push(err);
                }
            }
        }
        units.len()
    }
}

impl Default for FileWalker {
    fn default() -> Self {
        Self::new()
    }
}

fn place(tree: &mut ModuleTree, parent: ModuleId, discovered: Discovered) {
    let id = tree.add_child(parent, &discovered.name, discovered.dir, discovered.manifest);
    for child in discovered.children {
        place(tree, id, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap().write_all(content.as_bytes()).unwrap();
    }

    fn names(tree: &ModuleTree) -> Vec<String> {
        tree.post_order().into_iter().map(|id| tree.get(id).qualified_name()).collect()
    }

    fn segs(path: &str) -> Vec<String> {
        path.split("::").map(String::from).collect()
    }

    #[test]
    fn test_build_tree_maps_layouts() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();

        write(&root.join("lib.rs"), "pub mod table;\npub use table::field::*;\n");
        write(&root.join("table/mod.rs"), "pub mod field;\npub mod form;\n");
        write(&root.join("table/field.rs"), "pub fn create_field() {}\npub fn list_field() {}\n");
        write(&root.join("table/form.rs"), "pub fn patch_form_question() {}\n");
        // manifest next to its directory
        write(&root.join("docs.rs"), "pub mod wiki;\n");
        write(&root.join("docs/wiki.rs"), "pub struct Page;\n");
        // not modules
        write(&root.join("assets/logo.txt"), "png");
        write(&root.join(".hidden/x.rs"), "pub fn x() {}\n");
        write(&root.join("not-a-module.rs"), "pub fn y() {}\n");

        let outcome = FileWalker::new().build_tree(root).unwrap();
        let tree = &outcome.tree;

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(
            names(tree),
            vec![
                "crate::docs::wiki",
                "crate::docs",
                "crate::table::field",
                "crate::table::form",
                "crate::table",
                "crate",
            ]
        );
        assert_eq!(outcome.units_scanned, 6);

        let root_module = tree.get(tree.root());
        assert_eq!(root_module.manifest, Some(root.join("lib.rs")));
        assert_eq!(root_module.directives.len(), 1);

        let docs = tree.resolve_path(tree.root(), &segs("docs")).unwrap();
        assert_eq!(tree.get(docs).manifest, Some(root.join("docs.rs")));
        assert_eq!(tree.get(docs).dir, Some(root.join("docs")));

        let field = tree.resolve_path(tree.root(), &segs("table::field")).unwrap();
        let symbols: Vec<&str> = tree.get(field).own_symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(symbols, vec!["create_field", "list_field"]);
    }

    #[test]
    fn test_manifestless_dir_kept_only_with_descendants() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write(&root.join("lib.rs"), "");
        write(&root.join("outer/inner.rs"), "pub fn deep() {}\n");
        write(&root.join("empty/readme.md"), "nothing here");

        let outcome = FileWalker::new().build_tree(root).unwrap();
        assert_eq!(names(&outcome.tree), vec!["crate::outer::inner", "crate::outer", "crate"]);
        let outer = outcome.tree.resolve_path(outcome.tree.root(), &segs("outer")).unwrap();
        assert_eq!(outcome.tree.get(outer).manifest, None);
    }

    #[test]
    fn test_custom_boundary_exclude_and_depth() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write(&root.join("mod.rs"), "");
        write(&root.join("service/mod.rs"), "pub fn serve() {}\n");
        write(&root.join("service/deep/mod.rs"), "pub fn deeper() {}\n");
        write(&root.join("generated/mod.rs"), "pub fn gen() {}\n");
        write(&root.join("vendor/mod.rs"), "pub fn vendored() {}\n");

        let outcome = FileWalker::new()
            .with_boundary(|dir: &Path| !dir.ends_with("vendor"))
            .with_exclude(vec![Pattern::new("generated").unwrap()])
            .with_max_depth(1)
            .build_tree(root)
            .unwrap();

        assert_eq!(names(&outcome.tree), vec!["crate::service", "crate"]);
    }

    #[test]
    fn test_unscannable_unit_is_reported_and_flagged() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write(&root.join("lib.rs"), "pub mod broken;\n");
        write(&root.join("broken.rs"), "pub fn a() { \"unterminated }\n");

        let outcome = FileWalker::new().build_tree(root).unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(outcome.errors[0], SynthError::UnterminatedToken { .. }));

        let broken = outcome.tree.resolve_path(outcome.tree.root(), &segs("broken")).unwrap();
        assert!(outcome.tree.get(broken).scan_failed);
        assert!(outcome.tree.get(broken).own_symbols.is_empty());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp_dir = tempdir().unwrap();
        let err = FileWalker::new().build_tree(temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, SynthError::InvalidRoot { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        write(&root.join("lib.rs"), "");
        write(&root.join("outer/mod.rs"), "pub fn outer() {}\n");
        std::os::unix::fs::symlink(root.join("outer"), root.join("outer/again")).unwrap();

        let outcome = FileWalker::new().build_tree(root).unwrap();
        assert_eq!(names(&outcome.tree), vec!["crate::outer", "crate"]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(outcome.errors[0], SynthError::CyclicLink { .. }));
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("table"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier("_"));
        assert!(!is_identifier("not-a-module"));
        assert!(!is_identifier(".git"));
        assert!(!is_identifier("1st"));
    }
}
