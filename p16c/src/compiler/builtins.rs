use super::stmt::LoopJump;
use super::Compiler;
use crate::ast::{CallExpr, Expr};
use crate::emit::HALT_LABEL;
use crate::error::{CompileError, ErrorKind};
use crate::value::Value;

/// Reserved call forms handled by the compiler itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Halt,
    Memset,
    Continue,
    Break,
    DefineEnumerate,
}

impl Builtin {
    pub const PREFIX: &'static str = "builtin_";

    pub const ALL: [Builtin; 5] = [
        Builtin::Halt,
        Builtin::Memset,
        Builtin::Continue,
        Builtin::Break,
        Builtin::DefineEnumerate,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Halt => "builtin_halt",
            Builtin::Memset => "builtin_memset",
            Builtin::Continue => "builtin_continue",
            Builtin::Break => "builtin_break",
            Builtin::DefineEnumerate => "builtin_define_enumerate",
        }
    }

    /// Fixed positional argument count, if the builtin has one.
    fn arity(self) -> Option<usize> {
        match self {
            Builtin::Halt | Builtin::Continue | Builtin::Break => Some(0),
            Builtin::Memset => Some(2),
            Builtin::DefineEnumerate => None,
        }
    }
}

impl Compiler {
    pub(super) fn lower_builtin(&mut self, builtin: Builtin, call: &CallExpr) -> Result<(), CompileError> {
        if let Some(keyword) = call.keywords.first() {
            return Err(CompileError::new(
                ErrorKind::UnsupportedSyntax(format!(
                    "keyword argument `{}` to `{}`",
                    keyword.name.item,
                    builtin.name()
                )),
                keyword.span,
            ));
        }
        if let Some(expected) = builtin.arity() {
            if call.args.len() != expected {
                return Err(CompileError::new(
                    ErrorKind::ArityMismatch {
                        name: builtin.name().to_string(),
                        what: "arguments",
                        expected,
                        found: call.args.len(),
                    },
                    call.span,
                ));
            }
        }

        match builtin {
            Builtin::Halt => {
                self.emitter.goto(HALT_LABEL);
                Ok(())
            }
            Builtin::Continue => self.loop_jump(LoopJump::Continue, call.span),
            Builtin::Break => self.loop_jump(LoopJump::Break, call.span),
            Builtin::Memset => {
                let location = self.address(&call.args[0])?;
                let value = self.operand(&call.args[1])?;
                self.emitter.set(location, value);
                Ok(())
            }
            Builtin::DefineEnumerate => {
                let mut names = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    match arg {
                        Expr::Name(ident) => names.push(ident.item.as_str()),
                        other => {
                            return Err(CompileError::new(
                                ErrorKind::InvalidOperand(format!(
                                    "`{}` expects names, found {}",
                                    builtin.name(),
                                    other.kind()
                                )),
                                other.span(),
                            ))
                        }
                    }
                }
                for (value, name) in names.into_iter().enumerate() {
                    self.symbols.define_constant(name, Value::Number(value as i64));
                }
                Ok(())
            }
        }
    }
}
