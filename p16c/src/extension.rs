//! Native extensions: code-generation hooks linked into the compiler.
//!
//! An extension is registered under a dotted module name. Importing that
//! name installs its macros, constants and data labels into the module's
//! namespace and runs its init hook once.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::emit::Emitter;
use crate::error::MacroError;
use crate::symbols::SymbolStore;
use crate::value::Value;

pub type MacroFn =
    dyn Fn(&mut Emitter, &mut SymbolStore, &[Value], &IndexMap<String, Value>) -> Result<(), MacroError>;

pub type InitFn = dyn Fn(&mut Emitter, &mut SymbolStore) -> Result<(), MacroError>;

/// A named callback invoked in place of a subroutine call.
#[derive(Clone)]
pub struct Macro {
    name: String,
    callback: Rc<MacroFn>,
}

impl Macro {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut Emitter, &mut SymbolStore, &[Value], &IndexMap<String, Value>) -> Result<(), MacroError>
            + 'static,
    {
        Self {
            name: name.into(),
            callback: Rc::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `symbols` must already be scoped to the macro's namespace.
    pub fn invoke(
        &self,
        emitter: &mut Emitter,
        symbols: &mut SymbolStore,
        args: &[Value],
        kwargs: &IndexMap<String, Value>,
    ) -> Result<(), MacroError> {
        (self.callback)(emitter, symbols, args, kwargs)
    }
}

impl fmt::Debug for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Macro").field("name", &self.name).finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct NativeModule {
    macros: Vec<Macro>,
    constants: Vec<(String, Value)>,
    data_labels: Vec<String>,
    init: Option<Rc<InitFn>>,
}

impl NativeModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_macro<F>(mut self, name: &str, callback: F) -> Self
    where
        F: Fn(&mut Emitter, &mut SymbolStore, &[Value], &IndexMap<String, Value>) -> Result<(), MacroError>
            + 'static,
    {
        self.macros.push(Macro::new(name, callback));
        self
    }

    pub fn with_constant(mut self, name: &str, value: Value) -> Self {
        self.constants.push((name.to_string(), value));
        self
    }

    /// A constant whose value is the namespaced label of a storage word.
    /// The extension is responsible for emitting the word itself.
    pub fn with_data_label(mut self, name: &str) -> Self {
        self.data_labels.push(name.to_string());
        self
    }

    pub fn with_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Emitter, &mut SymbolStore) -> Result<(), MacroError> + 'static,
    {
        self.init = Some(Rc::new(hook));
        self
    }

    /// Install into the current namespace of `symbols`, then run the init hook.
    pub fn install(&self, emitter: &mut Emitter, symbols: &mut SymbolStore) -> Result<(), MacroError> {
        for mac in &self.macros {
            symbols.define_macro(mac.name(), mac.clone());
        }
        for (name, value) in &self.constants {
            symbols.define_constant(name.as_str(), value.clone());
        }
        for name in &self.data_labels {
            let label = symbols.expand_name(name);
            symbols.define_constant(name.as_str(), Value::Label(label));
        }
        match &self.init {
            Some(hook) => hook(emitter, symbols),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("macros", &self.macros.iter().map(Macro::name).collect::<Vec<_>>())
            .field("constants", &self.constants.len())
            .field("data_labels", &self.data_labels)
            .field("init", &self.init.is_some())
            .finish()
    }
}

/// Statically linked extensions keyed by dotted module name.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    modules: BTreeMap<String, NativeModule>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the bundled `mem` and `dev.*` extensions.
    pub fn with_stdlib() -> Self {
        let mut registry = Self::new();
        crate::stdlib::register(&mut registry);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, module: NativeModule) {
        self.modules.insert(name.into(), module);
    }

    pub fn get(&self, name: &str) -> Option<&NativeModule> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}
