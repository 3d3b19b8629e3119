use crate::error::SynthError;
use crate::span::{line_of, LineIndex, Span};
use crate::symbol::{Symbol, SymbolKind};
use serde::Serialize;
use std::path::{Path, PathBuf};
use syn::ext::IdentExt;

/// A name listed by an explicit re-export (`pub use a::{b, c as d};`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinnedName {
    pub path: Vec<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl PinnedName {
    /// The name this import makes visible; `as _` makes none.
    pub fn exported_name(&self) -> Option<&str> {
        match self.alias.as_deref() {
            Some("_") => None,
            Some(alias) => Some(alias),
            None if self.name == "self" => self.path.last().map(String::as_str),
            None => Some(&self.name),
        }
    }

    /// The path of the item itself, with `self` folded into its module.
    pub fn item_path(&self) -> Vec<String> {
        let mut path = self.path.clone();
        if self.name != "self" {
            path.push(self.name.clone());
        }
        path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum DirectiveForm {
    /// `pub use path::*;`
    Wildcard { path: Vec<String>, glob: Span },
    /// No glob anywhere in the tree.
    Explicit { names: Vec<PinnedName> },
    /// Neither a clean wildcard nor a clean explicit list.
    Ambiguous { reason: String },
}

/// A `pub use` item found in a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReexportDirective {
    pub unit: PathBuf,
    /// The use tree as written, e.g. `table::field::*`.
    pub tree: String,
    /// The whole item, from `pub` through `;`.
    pub span: Span,
    pub line: usize,
    /// The tree starts with `::`.
    pub absolute: bool,
    pub form: DirectiveForm,
}

impl ReexportDirective {
    pub fn is_wildcard(&self) -> bool {
        matches!(self.form, DirectiveForm::Wildcard { .. })
    }
}

/// Everything the extractor learned about one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitScan {
    pub path: PathBuf,
    /// The text that was analysed; spans index into it.
    pub source: String,
    pub symbols: Vec<Symbol>,
    pub directives: Vec<ReexportDirective>,
}

/// Extracts top-level visible declarations and re-export directives.
pub struct DeclarationExtractor;

/// A use tree flattened into its leaves, in source order.
#[derive(Default)]
struct UseLeaves {
    names: Vec<PinnedName>,
    /// Path before the glob, the `*` location, and whether it sits in a group.
    globs: Vec<(Vec<String>, proc_macro2::Span, bool)>,
}

impl DeclarationExtractor {
    /// Scan one unit. A unit that does not parse is skipped as a whole.
    pub fn extract_from_file<P: AsRef<Path>>(file_path: P, content: &str) -> Result<UnitScan, SynthError> {
        let path = file_path.as_ref().to_path_buf();
        // syn drops a leading BOM; locations are relative to the text after it
        let (bom, text) = match content.strip_prefix('\u{feff}') {
            Some(rest) => ('\u{feff}'.len_utf8(), rest),
            None => (0, content),
        };

        let file = syn::parse_file(text).map_err(|err| SynthError::UnterminatedToken {
            path: path.clone(),
            line: err.span().start().line.max(1),
            message: err.to_string(),
        })?;

        let index = LineIndex::new(text);
        let mut scan = UnitScan { path: path.clone(), source: content.to_string(), ..UnitScan::default() };
        for item in &file.items {
            Self::extract_item(&path, text, &index, bom, item, &mut scan);
        }
        Ok(scan)
    }

    fn extract_item(path: &Path, text: &str, index: &LineIndex, bom: usize, item: &syn::Item, scan: &mut UnitScan) {
        let (vis, ident, kind) = match item {
            syn::Item::Fn(i) => (&i.vis, &i.sig.ident, SymbolKind::Function),
            syn::Item::Struct(i) => (&i.vis, &i.ident, SymbolKind::CompositeType),
            syn::Item::Union(i) => (&i.vis, &i.ident, SymbolKind::CompositeType),
            syn::Item::Trait(i) => (&i.vis, &i.ident, SymbolKind::Trait),
            syn::Item::TraitAlias(i) => (&i.vis, &i.ident, SymbolKind::Trait),
            syn::Item::Enum(i) => (&i.vis, &i.ident, SymbolKind::EnumeratedType),
            syn::Item::Type(i) => (&i.vis, &i.ident, SymbolKind::Alias),
            syn::Item::Mod(i) => (&i.vis, &i.ident, SymbolKind::Submodule),
            syn::Item::Const(i) => (&i.vis, &i.ident, SymbolKind::Constant),
            syn::Item::Static(i) => (&i.vis, &i.ident, SymbolKind::Constant),
            syn::Item::Use(i) => {
                if let syn::Visibility::Public(pub_token) = &i.vis {
                    scan.directives.push(Self::directive(path, text, index, bom, pub_token.span, i));
                }
                return;
            }
            _ => return,
        };
        if !matches!(vis, syn::Visibility::Public(_)) {
            return;
        }

        let name = ident.unraw().to_string();
        if name != "_" {
            scan.symbols.push(Symbol::new(name, kind, path, ident.span().start().line));
        }
    }

    fn directive(
        path: &Path,
        text: &str,
        index: &LineIndex,
        bom: usize,
        pub_span: proc_macro2::Span,
        item: &syn::ItemUse,
    ) -> ReexportDirective {
        let start = index.offset(pub_span.start());
        let end = index.offset(item.semi_token.spans[0].end());
        let tree_start = index.offset(item.use_token.span.end());
        let tree_end = index.offset(item.semi_token.spans[0].start());
        let tree = text.get(tree_start..tree_end).unwrap_or_default().trim().to_string();

        let mut leaves = UseLeaves::default();
        collect_leaves(&item.tree, &mut Vec::new(), false, &mut leaves);

        let form = match (leaves.globs.as_slice(), leaves.names.is_empty()) {
            ([], _) => DirectiveForm::Explicit { names: leaves.names },
            ([(glob_path, star, false)], true) => {
                let star = index.span(*star);
                DirectiveForm::Wildcard {
                    path: glob_path.clone(),
                    glob: Span::new(bom + star.start, bom + star.end),
                }
            }
            (_, false) => DirectiveForm::Ambiguous { reason: "glob mixed with explicit names".to_string() },
            (_, true) => DirectiveForm::Ambiguous { reason: "glob inside a use group".to_string() },
        };

        ReexportDirective {
            unit: path.to_path_buf(),
            tree,
            span: Span::new(bom + start, bom + end),
            line: line_of(text, start),
            absolute: item.leading_colon.is_some(),
            form,
        }
    }
}

fn collect_leaves(tree: &syn::UseTree, prefix: &mut Vec<String>, grouped: bool, leaves: &mut UseLeaves) {
    match tree {
        syn::UseTree::Path(p) => {
            prefix.push(p.ident.unraw().to_string());
            collect_leaves(&p.tree, prefix, grouped, leaves);
            prefix.pop();
        }
        syn::UseTree::Name(n) => leaves.names.push(PinnedName {
            path: prefix.clone(),
            name: n.ident.unraw().to_string(),
            alias: None,
        }),
        syn::UseTree::Rename(r) => leaves.names.push(PinnedName {
            path: prefix.clone(),
            name: r.ident.unraw().to_string(),
            alias: Some(r.rename.unraw().to_string()),
        }),
        syn::UseTree::Glob(g) => leaves.globs.push((prefix.clone(), g.star_token.spans[0], grouped)),
        syn::UseTree::Group(g) => {
            for item in &g.items {
                collect_leaves(item, prefix, true, leaves);
            }
        }
    }
}
