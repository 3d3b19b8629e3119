use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

/// What a visible declaration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Function,
    /// `struct` and `union`
    CompositeType,
    Trait,
    /// `enum`
    EnumeratedType,
    /// `type`
    Alias,
    /// `const` and `static`
    Constant,
    /// `mod`; exported as a module reference, never as a value.
    Submodule,
    /// Re-exported from outside the tree, so the kind is unknown.
    Opaque,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolKind::Function => "function",
            SymbolKind::CompositeType => "composite-type",
            SymbolKind::Trait => "trait",
            SymbolKind::EnumeratedType => "enumerated-type",
            SymbolKind::Alias => "alias",
            SymbolKind::Constant => "constant",
            SymbolKind::Submodule => "submodule",
            SymbolKind::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

// Words that must be written `r#word` to be used as a name.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn", "else",
    "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "macro",
    "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "static", "struct", "trait",
    "true", "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// How `name` has to be spelled in source: keywords get the `r#` prefix.
///
/// Names are stored without the prefix so `r#foo` and `foo` compare equal.
pub fn ident_text(name: &str) -> Cow<'_, str> {
    if KEYWORDS.contains(&name) {
        Cow::Owned(format!("r#{name}"))
    } else {
        Cow::Borrowed(name)
    }
}

/// A named, externally visible declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// The source unit that declared it.
    pub origin: PathBuf,
    pub line: usize,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, origin: impl Into<PathBuf>, line: usize) -> Self {
        Symbol {
            name: name.into(),
            kind,
            origin: origin.into(),
            line,
        }
    }

    /// The same declaration seen under another name (`use a::b as c`).
    pub fn renamed(&self, name: &str) -> Self {
        Symbol {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn is_module(&self) -> bool {
        self.kind == SymbolKind::Submodule
    }
}
