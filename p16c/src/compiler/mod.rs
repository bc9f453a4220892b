//! Lowering from the P16 AST to assembly.
//!
//! The compiler walks the AST once, depth first, and writes through a single
//! [`Emitter`]. Statements are lowered independently: an error is recorded
//! as a [`Diagnostic`] and only that statement's code is skipped.
//!
//! State that a construct changes (namespace, source file, loop stack,
//! parameter aliases, enclosing function) lives in a [`Frame`] and is swapped
//! in and out around the construct, so every exit path restores it.
//!
//! - `stmt`: assignments, loops, loop control, imports.
//! - `call`: function definitions, call sites, `return`.
//! - `eval`: operand resolution and macro argument evaluation.
//! - `builtins`: the reserved `builtin_*` call forms.

mod builtins;
mod call;
mod eval;
mod stmt;

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::ast::{Module, Stmt};
use crate::emit::{Emitter, Register};
use crate::error::{CompileError, Diagnostic, ParseError};
use crate::extension::ExtensionRegistry;
use crate::loader::{stdlib_root, ModuleLoader};
use crate::parser::parse_module;
use crate::symbols::{NamespacePath, SymbolStore};

pub use builtins::Builtin;

/// Host-side configuration for one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Module search roots, in lookup order.
    pub roots: Vec<PathBuf>,
    pub registry: ExtensionRegistry,
    /// Name of the entry file, used in diagnostics.
    pub file: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            roots: vec![stdlib_root()],
            registry: ExtensionRegistry::with_stdlib(),
            file: None,
        }
    }
}

impl CompileOptions {
    /// No search roots and no extensions.
    pub fn empty() -> Self {
        Self {
            roots: Vec::new(),
            registry: ExtensionRegistry::new(),
            file: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn with_registry(mut self, registry: ExtensionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

#[derive(Debug)]
pub struct CompileOutput {
    pub assembly: String,
    pub diagnostics: Vec<Diagnostic>,
    /// At least one error-severity diagnostic was recorded.
    pub failed: bool,
}

impl CompileOutput {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| diag.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| !diag.is_error())
    }
}

/// Compile a parsed module against `roots` with the bundled extensions.
pub fn compile(module: &Module, roots: &[PathBuf]) -> CompileOutput {
    let options = CompileOptions {
        roots: roots.to_vec(),
        ..CompileOptions::default()
    };
    let mut compiler = Compiler::new(options);
    compiler.compile_module(module);
    compiler.finish()
}

pub fn compile_source(source: &str, options: CompileOptions) -> Result<CompileOutput, ParseError> {
    let module = parse_module(source)?;
    let mut compiler = Compiler::new(options);
    compiler.compile_module(&module);
    Ok(compiler.finish())
}

#[derive(Debug, Clone)]
struct LoopContext {
    start: String,
    end: String,
}

/// The function whose body is being lowered.
#[derive(Debug, Clone)]
struct FunctionScope {
    namespace: NamespacePath,
    name: String,
}

#[derive(Debug, Default)]
struct Frame {
    namespace: NamespacePath,
    file: Option<String>,
    loops: Vec<LoopContext>,
    aliases: HashMap<String, Register>,
    function: Option<FunctionScope>,
}

pub struct Compiler {
    emitter: Emitter,
    symbols: SymbolStore,
    loader: ModuleLoader,
    registry: ExtensionRegistry,
    diagnostics: Vec<Diagnostic>,
    file: Option<String>,
    loops: Vec<LoopContext>,
    aliases: HashMap<String, Register>,
    function: Option<FunctionScope>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            emitter: Emitter::new(),
            symbols: SymbolStore::new(),
            loader: ModuleLoader::new(options.roots),
            registry: options.registry,
            diagnostics: Vec::new(),
            file: options.file,
            loops: Vec::new(),
            aliases: HashMap::new(),
            function: None,
        }
    }

    /// Lower `module` into the root namespace. May be called more than once;
    /// later modules see the symbols of earlier ones.
    pub fn compile_module(&mut self, module: &Module) {
        debug!(file = ?self.file, statements = module.body.len(), "compiling module");
        self.lower_block(&module.body);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn symbols(&self) -> &SymbolStore {
        &self.symbols
    }

    pub fn finish(self) -> CompileOutput {
        let failed = self.diagnostics.iter().any(Diagnostic::is_error);
        CompileOutput {
            assembly: self.emitter.assemble(),
            diagnostics: self.diagnostics,
            failed,
        }
    }

    fn lower_block(&mut self, body: &[Stmt]) {
        for stmt in body {
            trace!(line = stmt.span().line, "lowering statement");
            if let Err(err) = self.lower_stmt(stmt) {
                self.report(err);
            }
        }
    }

    fn report(&mut self, error: CompileError) {
        debug!(error = %error, line = error.span().line, "diagnostic");
        self.diagnostics.push(Diagnostic::new(error, self.file.clone()));
    }

    fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|diag| diag.is_error()).count()
    }

    /// Run `f` with `frame` installed, then put the previous frame back.
    fn with_frame<R>(&mut self, frame: Frame, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.swap_frame(frame);
        let result = f(self);
        self.swap_frame(previous);
        result
    }

    fn swap_frame(&mut self, frame: Frame) -> Frame {
        Frame {
            namespace: self.symbols.enter_namespace(frame.namespace),
            file: std::mem::replace(&mut self.file, frame.file),
            loops: std::mem::replace(&mut self.loops, frame.loops),
            aliases: std::mem::replace(&mut self.aliases, frame.aliases),
            function: std::mem::replace(&mut self.function, frame.function),
        }
    }
}
