use crate::extractor::ReexportDirective;
use crate::symbol::Symbol;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Index of a module in its `ModuleTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModuleId(pub usize);

/// A node of the module hierarchy.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    /// Last path segment; `crate` for the root.
    pub name: String,
    /// Segments from the root, empty for the root itself.
    pub segments: Vec<String>,
    /// Directory holding the module's children, if it has one.
    pub dir: Option<PathBuf>,
    /// The unit that defines what the module exposes.
    pub manifest: Option<PathBuf>,
    pub parent: Option<ModuleId>,
    /// Sorted by name.
    pub children: Vec<ModuleId>,
    pub own_symbols: Vec<Symbol>,
    pub directives: Vec<ReexportDirective>,
    /// Manifest text as it was scanned.
    pub source: Option<String>,
    /// The manifest could not be read or parsed.
    pub scan_failed: bool,
}

impl Module {
    /// `crate::a::b` style path.
    pub fn qualified_name(&self) -> String {
        let mut name = String::from("crate");
        for segment in &self.segments {
            name.push_str("::");
            name.push_str(segment);
        }
        name
    }
}

/// Arena of modules owned by one synthesis run. Index 0 is the root.
#[derive(Debug, Clone)]
pub struct ModuleTree {
    root_dir: PathBuf,
    modules: Vec<Module>,
}

impl ModuleTree {
    pub fn new<P: AsRef<Path>>(root_dir: P, manifest: Option<PathBuf>) -> Self {
        let root_dir = root_dir.as_ref().to_path_buf();
        let root = Module {
            id: ModuleId(0),
            name: "crate".to_string(),
            segments: Vec::new(),
            dir: Some(root_dir.clone()),
            manifest,
            parent: None,
            children: Vec::new(),
            own_symbols: Vec::new(),
            directives: Vec::new(),
            source: None,
            scan_failed: false,
        };
        ModuleTree { root_dir, modules: vec![root] }
    }

    pub fn root(&self) -> ModuleId {
        ModuleId(0)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn add_child(&mut self, parent: ModuleId, name: &str, dir: Option<PathBuf>, manifest: Option<PathBuf>) -> ModuleId {
        let id = ModuleId(self.modules.len());
        let mut segments = self.modules[parent.0].segments.clone();
        segments.push(name.to_string());
        self.modules.push(Module {
            id,
            name: name.to_string(),
            segments,
            dir,
            manifest,
            parent: Some(parent),
            children: Vec::new(),
            own_symbols: Vec::new(),
            directives: Vec::new(),
            source: None,
            scan_failed: false,
        });
        let at = self.modules[parent.0]
            .children
            .iter()
            .position(|sibling| self.modules[sibling.0].name.as_str() > name)
            .unwrap_or(self.modules[parent.0].children.len());
        self.modules[parent.0].children.insert(at, id);
        id
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn child(&self, parent: ModuleId, name: &str) -> Option<ModuleId> {
        self.get(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.get(child).name == name)
    }

    /// Whether `ancestor` sits strictly above `id`.
    pub fn is_ancestor(&self, ancestor: ModuleId, id: ModuleId) -> bool {
        let mut current = self.get(id).parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.get(parent).parent;
        }
        false
    }

    /// Children before parents, siblings in name order.
    pub fn post_order(&self) -> Vec<ModuleId> {
        let mut order = Vec::with_capacity(self.modules.len());
        let mut stack = vec![(self.root(), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.get(id).children.iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }

    /// Resolve a `use` path written inside module `from` to a module of the tree.
    ///
    /// Leading `crate`, `self` and `super` are honoured; every other segment
    /// must name a child module.
    pub fn resolve_path(&self, from: ModuleId, segments: &[String]) -> Option<ModuleId> {
        let mut current = from;
        let mut rest = segments;

        match rest.first().map(String::as_str) {
            Some("crate") => {
                current = self.root();
                rest = &rest[1..];
            }
            Some("self") => rest = &rest[1..],
            _ => {}
        }
        while rest.first().is_some_and(|s| s == "super") {
            current = self.get(current).parent?;
            rest = &rest[1..];
        }
        for segment in rest {
            current = self.child(current, segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ModuleTree, ModuleId, ModuleId, ModuleId) {
        let mut tree = ModuleTree::new("src", Some(PathBuf::from("src/lib.rs")));
        let table = tree.add_child(tree.root(), "table", Some(PathBuf::from("src/table")), None);
        let form = tree.add_child(table, "form", None, Some(PathBuf::from("src/table/form.rs")));
        let field = tree.add_child(table, "field", None, Some(PathBuf::from("src/table/field.rs")));
        (tree, table, field, form)
    }

    fn segs(path: &str) -> Vec<String> {
        path.split("::").map(String::from).collect()
    }

    #[test]
    fn test_children_are_sorted_and_named() {
        let (tree, table, field, form) = sample();
        assert_eq!(tree.get(table).children, vec![field, form]);
        assert_eq!(tree.get(field).qualified_name(), "crate::table::field");
        assert_eq!(tree.get(tree.root()).qualified_name(), "crate");
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let (tree, table, field, form) = sample();
        assert_eq!(tree.post_order(), vec![field, form, table, tree.root()]);
    }

    #[test]
    fn test_resolve_path() {
        let (tree, table, field, form) = sample();
        let root = tree.root();
        assert_eq!(tree.resolve_path(root, &segs("table::field")), Some(field));
        assert_eq!(tree.resolve_path(root, &segs("self::table")), Some(table));
        assert_eq!(tree.resolve_path(field, &segs("super::form")), Some(form));
        assert_eq!(tree.resolve_path(field, &segs("super::super::table")), Some(table));
        assert_eq!(tree.resolve_path(form, &segs("crate::table::field")), Some(field));
        assert_eq!(tree.resolve_path(root, &segs("std::collections")), None);
        assert_eq!(tree.resolve_path(root, &segs("super::table")), None);
    }

    #[test]
    fn test_is_ancestor() {
        let (tree, table, field, form) = sample();
        let root = tree.root();
        assert!(tree.is_ancestor(root, field));
        assert!(tree.is_ancestor(table, form));
        assert!(!tree.is_ancestor(field, field));
        assert!(!tree.is_ancestor(form, field));
        assert!(!tree.is_ancestor(field, root));
    }
}
