pub mod ast;
pub mod compiler;
pub mod emit;
pub mod error;
pub mod extension;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod stdlib;
pub mod symbols;
pub mod value;

pub use ast::Module;
pub use compiler::{compile, compile_source, Builtin, CompileOptions, CompileOutput, Compiler};
pub use emit::{Emitter, Opcode, Operand, Register};
pub use error::{CompileError, Diagnostic, ErrorKind, MacroError, ParseError, Severity};
pub use extension::{ExtensionRegistry, Macro, NativeModule};
pub use loader::{load_module_from_path, stdlib_root};
pub use parser::parse_module;
pub use symbols::{NamespacePath, SymbolStore};
pub use value::Value;
