use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{Module, Span};
use crate::error::ParseError;
use crate::parser::parse_module;
use crate::symbols::NamespacePath;

pub const SOURCE_EXTENSION: &str = "p16";

pub fn stdlib_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../stdlib")
}

pub fn load_module_from_path(path: &Path) -> Result<Module, ParseError> {
    let source = fs::read_to_string(path).map_err(|err| {
        ParseError::new(
            format!("failed to read {}: {err}", path.display()),
            Span::default(),
        )
    })?;
    parse_module(&source).map_err(|err| err.with_context(path.display().to_string()))
}

/// `<root>/a/b.p16` for module `a.b`.
pub fn module_file(root: &Path, name: &NamespacePath) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in name.segments() {
        path.push(segment);
    }
    path.set_extension(SOURCE_EXTENSION);
    path
}

/// Search roots plus the set of module names already resolved in this
/// compilation.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    roots: Vec<PathBuf>,
    imported: HashSet<String>,
}

impl ModuleLoader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            imported: HashSet::new(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Records `name` as resolved. Returns `false` if it already was.
    pub fn mark_imported(&mut self, name: &str) -> bool {
        self.imported.insert(name.to_string())
    }

    pub fn is_imported(&self, name: &str) -> bool {
        self.imported.contains(name)
    }

    /// First root holding a source file for `name`.
    pub fn find_source(&self, name: &NamespacePath) -> Option<PathBuf> {
        if name.is_root() {
            return None;
        }
        self.roots
            .iter()
            .map(|root| module_file(root, name))
            .find(|path| path.is_file())
    }
}
