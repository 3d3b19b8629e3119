//! Per-module export sets.
//!
//! A module exports its own visible declarations plus whatever its `pub use`
//! directives bring in. Sets are computed lazily, memoized, and shared by
//! every directive that targets the same module. Wildcard directives whose
//! target set is complete and collision-free get an explicit replacement
//! list; everything else is left alone and reported.

use crate::error::SynthError;
use crate::extractor::{DirectiveForm, PinnedName, ReexportDirective};
use crate::module::{ModuleId, ModuleTree};
use crate::symbol::{Symbol, SymbolKind};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// One name exported by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    pub symbol: Symbol,
    /// Reached from two distinct declarations, here or further down.
    pub ambiguous: bool,
    #[serde(skip)]
    identity: String,
}

/// Everything a module exports, keyed and ordered by name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSet {
    pub entries: BTreeMap<String, ExportEntry>,
    /// Why the set may be missing names; empty when it is complete.
    pub incomplete: Vec<String>,
}

impl ExportSet {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ExportEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionSource {
    pub origin: PathBuf,
    pub line: usize,
    /// `own` or the re-export tree that brought the name in.
    pub via: String,
}

/// A name that two different declarations compete for inside one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub module: String,
    pub name: String,
    /// Ordered by origin path.
    pub contributors: Vec<CollisionSource>,
}

impl Collision {
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }

    pub fn to_error(&self) -> SynthError {
        SynthError::Collision {
            module: self.module.clone(),
            name: self.name.clone(),
            contributors: self.contributors.iter().map(|c| c.origin.clone()).collect(),
        }
    }
}

/// A glob-imported item hidden behind a declaration or explicit import of
/// the same name. Legal, but the glob no longer brings that item in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shadowing {
    pub module: String,
    pub name: String,
    pub kept: CollisionSource,
    pub hidden: Vec<CollisionSource>,
}

impl Shadowing {
    pub fn to_error(&self) -> SynthError {
        SynthError::ShadowedName {
            module: self.module.clone(),
            name: self.name.clone(),
            hidden: self.hidden.iter().map(|c| c.origin.clone()).collect(),
        }
    }
}

/// What will happen to one directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanStatus {
    /// Wildcard to be replaced by `names`; `withheld` are names the target
    /// exports that need manual resolution first.
    Rewrite { names: Vec<String>, withheld: Vec<String> },
    /// Explicit list, never touched.
    Pinned { names: Vec<String> },
    Ambiguous { reason: String },
    Unresolved,
    Cycle,
    Incomplete { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectivePlan {
    pub module: ModuleId,
    /// Index into the module's directives.
    pub index: usize,
    pub status: PlanStatus,
}

impl DirectivePlan {
    pub fn is_rewrite(&self) -> bool {
        matches!(self.status, PlanStatus::Rewrite { .. })
    }

    /// The finding this plan represents, if it is not a clean outcome.
    pub fn diagnostic(&self, directive: &ReexportDirective) -> Option<SynthError> {
        let path = directive.unit.clone();
        let line = directive.line;
        let target = directive.tree.clone();
        match &self.status {
            PlanStatus::Rewrite { .. } | PlanStatus::Pinned { .. } => None,
            PlanStatus::Ambiguous { reason } => Some(SynthError::AmbiguousDirective {
                path,
                line,
                directive: target,
                reason: reason.clone(),
            }),
            PlanStatus::Unresolved => Some(SynthError::UnresolvedTarget { path, line, target }),
            PlanStatus::Cycle => Some(SynthError::ReexportCycle { path, line, target }),
            PlanStatus::Incomplete { reason } => Some(SynthError::IncompleteTarget {
                path,
                line,
                target,
                reason: reason.clone(),
            }),
        }
    }
}

/// Result for one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleResolution {
    pub exports: ExportSet,
    /// One per directive, in source order.
    pub plans: Vec<DirectivePlan>,
    pub collisions: Vec<Collision>,
    pub shadowed: Vec<Shadowing>,
}

/// Resolution of a whole tree, indexed like the tree.
#[derive(Debug, Clone)]
pub struct Resolution {
    modules: Vec<ModuleResolution>,
}

impl Resolution {
    pub fn get(&self, id: ModuleId) -> &ModuleResolution {
        &self.modules[id.0]
    }

    pub fn exports(&self, id: ModuleId) -> &ExportSet {
        &self.modules[id.0].exports
    }
}

enum State {
    Unvisited,
    InProgress,
    Done(ModuleResolution),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Via {
    Own,
    Pinned(usize),
    Glob(usize),
}

struct Contribution {
    symbol: Symbol,
    identity: String,
    ambiguous: bool,
    via: Via,
}

/// Memoizing resolver over a borrowed tree.
pub struct ExportResolver<'t> {
    tree: &'t ModuleTree,
    states: Vec<State>,
    /// Names being looked up, to stop `a::x` -> `b::x` -> `a::x` loops.
    pinning: Vec<(ModuleId, String)>,
}

impl<'t> ExportResolver<'t> {
    pub fn new(tree: &'t ModuleTree) -> Self {
        let states = (0..tree.len()).map(|_| State::Unvisited).collect();
        ExportResolver { tree, states, pinning: Vec::new() }
    }

    /// Resolve every module, leaves first.
    pub fn resolve_all(mut self) -> Resolution {
        for id in self.tree.post_order() {
            self.resolve(id);
        }
        let modules = self
            .states
            .into_iter()
            .map(|state| match state {
                State::Done(resolution) => resolution,
                State::Unvisited | State::InProgress => ModuleResolution::default(),
            })
            .collect();
        Resolution { modules }
    }

    /// Resolving `target` in full could come back to `from` while it is open.
    fn reentrant(&self, from: ModuleId, target: ModuleId) -> bool {
        target == from || self.tree.is_ancestor(target, from) || matches!(self.states[target.0], State::InProgress)
    }

    fn done(&self, id: ModuleId) -> Option<&ModuleResolution> {
        match &self.states[id.0] {
            State::Done(resolution) => Some(resolution),
            State::Unvisited | State::InProgress => None,
        }
    }

    fn resolve(&mut self, id: ModuleId) {
        if !matches!(self.states[id.0], State::Unvisited) {
            return;
        }
        self.states[id.0] = State::InProgress;

        let tree = self.tree;
        let module = tree.get(id);
        let mut incomplete = Vec::new();
        if module.scan_failed {
            let unit = module.manifest.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
            incomplete.push(format!("{unit} could not be scanned"));
        }

        let mut contributions: BTreeMap<String, Vec<Contribution>> = BTreeMap::new();
        for symbol in &module.own_symbols {
            contributions.entry(symbol.name.clone()).or_default().push(Contribution {
                identity: identity_of(symbol),
                symbol: symbol.clone(),
                ambiguous: false,
                via: Via::Own,
            });
        }

        let mut plans = Vec::with_capacity(module.directives.len());
        for (index, directive) in module.directives.iter().enumerate() {
            let status = match &directive.form {
                DirectiveForm::Ambiguous { reason } => {
                    incomplete.push(format!("ambiguous re-export at line {}", directive.line));
                    PlanStatus::Ambiguous { reason: reason.clone() }
                }
                DirectiveForm::Explicit { names } => {
                    let mut pinned = Vec::new();
                    for name in names {
                        if let Some(mut contribution) = self.pin(id, directive, name) {
                            contribution.via = Via::Pinned(index);
                            pinned.push(contribution.symbol.name.clone());
                            contributions.entry(contribution.symbol.name.clone()).or_default().push(contribution);
                        }
                    }
                    PlanStatus::Pinned { names: pinned }
                }
                DirectiveForm::Wildcard { path, .. } => {
                    self.expand(id, index, directive, path, &mut contributions, &mut incomplete)
                }
            };
            plans.push(DirectivePlan { module: id, index, status });
        }

        let qualified = module.qualified_name();
        let mut entries = BTreeMap::new();
        let mut collisions = Vec::new();
        let mut shadowed = Vec::new();
        for (name, routes) in &contributions {
            // declarations and explicit imports take precedence over glob imports
            let direct: Vec<&Contribution> = routes.iter().filter(|c| !matches!(c.via, Via::Glob(_))).collect();
            let all: BTreeSet<&str> = routes.iter().map(|c| c.identity.as_str()).collect();
            let winners: BTreeSet<&str> = direct.iter().map(|c| c.identity.as_str()).collect();

            let (first, ambiguous) = if direct.is_empty() {
                (&routes[0], all.len() > 1 || routes.iter().any(|c| c.ambiguous))
            } else {
                (direct[0], winners.len() > 1 || direct.iter().any(|c| c.ambiguous))
            };
            if winners.len() > 1 || (winners.is_empty() && all.len() > 1) {
                collisions.push(collision(&qualified, name, routes, &module.directives));
            } else if all.len() > winners.len() && !winners.is_empty() {
                let hidden = routes.iter().filter(|c| c.identity != first.identity);
                shadowed.push(Shadowing {
                    module: qualified.clone(),
                    name: name.clone(),
                    kept: source(first, &module.directives),
                    hidden: sources(hidden, &module.directives),
                });
            }
            entries.insert(
                name.clone(),
                ExportEntry { symbol: first.symbol.clone(), ambiguous, identity: first.identity.clone() },
            );
        }

        fill_rewrite_lists(&mut plans, &contributions, &entries);

        self.states[id.0] = State::Done(ModuleResolution {
            exports: ExportSet { entries, incomplete },
            plans,
            collisions,
            shadowed,
        });
    }

    /// Pull a wildcard target's exports into `contributions`.
    fn expand(
        &mut self,
        id: ModuleId,
        index: usize,
        directive: &ReexportDirective,
        path: &[String],
        contributions: &mut BTreeMap<String, Vec<Contribution>>,
        incomplete: &mut Vec<String>,
    ) -> PlanStatus {
        let target = if directive.absolute { None } else { self.tree.resolve_path(id, path) };
        let Some(target) = target else {
            incomplete.push(format!("`{}` is not a module of this tree", directive.tree));
            return PlanStatus::Unresolved;
        };
        if target == id || matches!(self.states[target.0], State::InProgress) {
            incomplete.push(format!("re-export cycle through `{}`", directive.tree));
            return PlanStatus::Cycle;
        }

        self.resolve(target);
        let Some(resolved) = self.done(target) else {
            incomplete.push(format!("re-export cycle through `{}`", directive.tree));
            return PlanStatus::Cycle;
        };

        let exports = &resolved.exports;
        for (name, entry) in &exports.entries {
            contributions.entry(name.clone()).or_default().push(Contribution {
                symbol: entry.symbol.clone(),
                identity: entry.identity.clone(),
                ambiguous: entry.ambiguous,
                via: Via::Glob(index),
            });
        }

        match exports.incomplete.first() {
            Some(first) => {
                let reason = format!("{}: {first}", self.tree.get(target).qualified_name());
                incomplete.push(reason.clone());
                PlanStatus::Incomplete { reason }
            }
            None => PlanStatus::Rewrite { names: Vec::new(), withheld: Vec::new() },
        }
    }

    /// Work out what an explicitly listed name refers to.
    fn pin(&mut self, id: ModuleId, directive: &ReexportDirective, pinned: &PinnedName) -> Option<Contribution> {
        let name = pinned.exported_name()?.to_string();
        let item_path = pinned.item_path();
        let external = || {
            let path = item_path.join("::");
            Contribution {
                symbol: Symbol::new(name.as_str(), SymbolKind::Opaque, directive.unit.clone(), directive.line),
                identity: format!("extern {path}"),
                ambiguous: false,
                via: Via::Own,
            }
        };
        if directive.absolute {
            return Some(external());
        }
        let Some((last, parent_path)) = item_path.split_last() else {
            return Some(external());
        };

        if let Some(parent) = self.tree.resolve_path(id, parent_path) {
            if let Some((symbol, identity, ambiguous)) = self.lookup(id, parent, last) {
                return Some(Contribution { symbol: symbol.renamed(&name), identity, ambiguous, via: Via::Own });
            }
        }

        if let Some(module_id) = self.tree.resolve_path(id, &item_path) {
            let module = self.tree.get(module_id);
            let origin = module.manifest.clone().or_else(|| module.dir.clone()).unwrap_or_default();
            return Some(Contribution {
                symbol: Symbol::new(name.as_str(), SymbolKind::Submodule, origin, 1),
                identity: format!("mod {}", module.qualified_name()),
                ambiguous: false,
                via: Via::Own,
            });
        }

        Some(external())
    }

    /// What `name` refers to inside `parent`, looked up on behalf of `from`.
    ///
    /// A finished module answers from its export set. Otherwise own
    /// declarations come first, then explicit re-exports, then wildcard
    /// targets that can be resolved without re-entering `from`. Only a module
    /// that is neither `from` nor one of its ancestors is resolved in full.
    fn lookup(&mut self, from: ModuleId, parent: ModuleId, name: &str) -> Option<(Symbol, String, bool)> {
        let key = (parent, name.to_string());
        if self.pinning.contains(&key) {
            return None;
        }
        self.pinning.push(key);
        let found = self.find(from, parent, name);
        self.pinning.pop();
        found
    }

    fn find(&mut self, from: ModuleId, parent: ModuleId, name: &str) -> Option<(Symbol, String, bool)> {
        if let Some(resolved) = self.done(parent) {
            return resolved
                .exports
                .get(name)
                .map(|entry| (entry.symbol.clone(), entry.identity.clone(), entry.ambiguous));
        }

        let tree = self.tree;
        let module = tree.get(parent);
        if let Some(symbol) = module.own_symbols.iter().find(|symbol| symbol.name == name) {
            return Some((symbol.clone(), identity_of(symbol), false));
        }

        for directive in &module.directives {
            let DirectiveForm::Explicit { names } = &directive.form else { continue };
            for pinned in names.iter().filter(|pinned| pinned.exported_name() == Some(name)) {
                if let Some(found) = self.pin(parent, directive, pinned) {
                    return Some((found.symbol, found.identity, found.ambiguous));
                }
            }
        }

        for directive in &module.directives {
            let DirectiveForm::Wildcard { path, .. } = &directive.form else { continue };
            if directive.absolute {
                continue;
            }
            let Some(target) = tree.resolve_path(parent, path) else { continue };
            if target == parent || self.reentrant(from, target) {
                continue;
            }
            self.resolve(target);
            if let Some(entry) = self.done(target).and_then(|resolved| resolved.exports.get(name)) {
                return Some((entry.symbol.clone(), entry.identity.clone(), entry.ambiguous));
            }
        }

        if self.reentrant(from, parent) {
            return None;
        }
        self.resolve(parent);
        self.done(parent)
            .and_then(|resolved| resolved.exports.get(name))
            .map(|entry| (entry.symbol.clone(), entry.identity.clone(), entry.ambiguous))
    }
}

/// Resolve a whole tree.
pub fn resolve(tree: &ModuleTree) -> Resolution {
    ExportResolver::new(tree).resolve_all()
}

fn identity_of(symbol: &Symbol) -> String {
    format!("{}#{}", symbol.origin.display(), symbol.name)
}

fn sources<'c>(
    routes: impl IntoIterator<Item = &'c Contribution>,
    directives: &[ReexportDirective],
) -> Vec<CollisionSource> {
    let mut seen = BTreeSet::new();
    let mut contributors: Vec<CollisionSource> = routes
        .into_iter()
        .filter(|c| seen.insert(c.identity.clone()))
        .map(|c| source(c, directives))
        .collect();
    contributors.sort_by(|a, b| a.origin.cmp(&b.origin).then(a.line.cmp(&b.line)));
    contributors
}

fn source(route: &Contribution, directives: &[ReexportDirective]) -> CollisionSource {
    CollisionSource {
        origin: route.symbol.origin.clone(),
        line: route.symbol.line,
        via: match route.via {
            Via::Own => "own".to_string(),
            Via::Pinned(index) | Via::Glob(index) => directives[index].tree.clone(),
        },
    }
}

fn collision(module: &str, name: &str, routes: &[Contribution], directives: &[ReexportDirective]) -> Collision {
    Collision { module: module.to_string(), name: name.to_string(), contributors: sources(routes, directives) }
}

/// Decide which directive lists each wildcard-imported name.
///
/// A name is listed once, by the first wildcard that reaches it, and only if
/// it is unambiguous and not already declared or pinned by the module.
fn fill_rewrite_lists(
    plans: &mut [DirectivePlan],
    contributions: &BTreeMap<String, Vec<Contribution>>,
    entries: &BTreeMap<String, ExportEntry>,
) {
    for (name, routes) in contributions {
        let Some(first_glob) = routes.iter().find_map(|c| match c.via {
            Via::Glob(index) => Some(index),
            _ => None,
        }) else {
            continue;
        };
        let ambiguous = entries.get(name).is_some_and(|entry| entry.ambiguous);
        let shadowed = routes.iter().any(|c| !matches!(c.via, Via::Glob(_)));

        for route in routes {
            let Via::Glob(index) = route.via else { continue };
            let PlanStatus::Rewrite { names, withheld } = &mut plans[index].status else {
                continue;
            };
            if ambiguous {
                if withheld.last() != Some(name) {
                    withheld.push(name.clone());
                }
            } else if !shadowed && index == first_glob && names.last() != Some(name) {
                names.push(name.clone());
            }
        }
    }
}
