//! Symbol and namespace store.
//!
//! Every module compiles into a namespace keyed by its dotted import path;
//! the entry program is the root namespace. A namespace owns one symbol
//! table (constants, functions and macros share it) plus a configuration
//! map that extensions use for their own settings. Operations act on the
//! *current* namespace, which the compiler moves with `enter_namespace` /
//! `restore_namespace` (or the scoped `with_namespace`).

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDef;
use crate::extension::Macro;
use crate::value::Value;

/// Separator used when mangling namespaced names into labels.
pub const MANGLE_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NamespacePath(Vec<String>);

impl NamespacePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// `"a.b"` → `[a, b]`; the empty string is the root.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        Self(dotted.split('.').map(str::to_string).collect())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Label text for `bare` inside this namespace.
    pub fn mangle(&self, bare: &str) -> String {
        if self.is_root() {
            return bare.to_string();
        }
        let mut out = self.0.join(MANGLE_SEPARATOR);
        out.push_str(MANGLE_SEPARATOR);
        out.push_str(bare);
        out
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Function lifecycle: bodies are emitted at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitState {
    Declared,
    Emitted,
}

#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    /// Mangled, program-unique label.
    pub label: String,
    pub params: Vec<String>,
    /// Number of values left on the stack by `return`; fixed once known.
    pub returns: Option<usize>,
    pub def: Rc<FunctionDef>,
    pub namespace: NamespacePath,
    pub file: Option<String>,
    pub state: EmitState,
}

impl FunctionSymbol {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone)]
pub enum Symbol {
    Constant(Value),
    Function(FunctionSymbol),
    Macro(Macro),
}

impl Symbol {
    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Constant(_) => "constant",
            Symbol::Function(_) => "function",
            Symbol::Macro(_) => "macro",
        }
    }
}

#[derive(Debug, Default)]
pub struct Namespace {
    symbols: HashMap<String, Symbol>,
    config: HashMap<String, Value>,
}

#[derive(Debug)]
pub struct SymbolStore {
    namespaces: HashMap<NamespacePath, Namespace>,
    current: NamespacePath,
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolStore {
    pub fn new() -> Self {
        let mut namespaces = HashMap::new();
        namespaces.insert(NamespacePath::root(), Namespace::default());
        Self {
            namespaces,
            current: NamespacePath::root(),
        }
    }

    pub fn current(&self) -> &NamespacePath {
        &self.current
    }

    /// Switch to `path`, creating it on first use. Returns the namespace to
    /// hand back to `restore_namespace`.
    pub fn enter_namespace(&mut self, path: NamespacePath) -> NamespacePath {
        self.namespaces.entry(path.clone()).or_default();
        std::mem::replace(&mut self.current, path)
    }

    pub fn restore_namespace(&mut self, previous: NamespacePath) {
        self.current = previous;
    }

    /// Run `f` with `path` as the current namespace.
    pub fn with_namespace<R>(&mut self, path: NamespacePath, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.enter_namespace(path);
        let result = f(self);
        self.restore_namespace(previous);
        result
    }

    pub fn has_namespace(&self, path: &NamespacePath) -> bool {
        self.namespaces.contains_key(path)
    }

    pub fn expand_name(&self, bare: &str) -> String {
        self.current.mangle(bare)
    }

    pub fn define_constant(&mut self, name: impl Into<String>, value: Value) {
        self.current_mut()
            .symbols
            .insert(name.into(), Symbol::Constant(value));
    }

    pub fn get_constant(&self, name: &str) -> Option<&Value> {
        self.constant_in(&self.current, name)
    }

    pub fn constant_in(&self, path: &NamespacePath, name: &str) -> Option<&Value> {
        match self.lookup(path, name)? {
            Symbol::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn define_function(&mut self, name: impl Into<String>, function: FunctionSymbol) {
        self.current_mut()
            .symbols
            .insert(name.into(), Symbol::Function(function));
    }

    pub fn get_function(&self, name: &str) -> Option<&FunctionSymbol> {
        self.function_in(&self.current, name)
    }

    pub fn function_in(&self, path: &NamespacePath, name: &str) -> Option<&FunctionSymbol> {
        match self.lookup(path, name)? {
            Symbol::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn function_in_mut(
        &mut self,
        path: &NamespacePath,
        name: &str,
    ) -> Option<&mut FunctionSymbol> {
        match self.namespaces.get_mut(path)?.symbols.get_mut(name)? {
            Symbol::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn define_macro(&mut self, name: impl Into<String>, mac: Macro) {
        self.current_mut()
            .symbols
            .insert(name.into(), Symbol::Macro(mac));
    }

    pub fn get_macro(&self, name: &str) -> Option<&Macro> {
        match self.lookup(&self.current, name)? {
            Symbol::Macro(mac) => Some(mac),
            _ => None,
        }
    }

    pub fn set_config(&mut self, key: impl Into<String>, value: Value) {
        self.current_mut().config.insert(key.into(), value);
    }

    pub fn get_config(&self, key: &str) -> Option<&Value> {
        self.namespaces.get(&self.current)?.config.get(key)
    }

    /// Any symbol named `name` in the namespace at `path`.
    pub fn lookup(&self, path: &NamespacePath, name: &str) -> Option<&Symbol> {
        self.namespaces.get(path)?.symbols.get(name)
    }

    fn current_mut(&mut self) -> &mut Namespace {
        self.namespaces.entry(self.current.clone()).or_default()
    }
}
