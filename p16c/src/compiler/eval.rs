use indexmap::IndexMap;

use super::Compiler;
use crate::ast::{BinaryOp, CallExpr, Expr, UnaryOp};
use crate::emit::{Operand, Register};
use crate::error::{CompileError, ErrorKind};
use crate::symbols::NamespacePath;
use crate::value::{word, Value};

impl Compiler {
    /// Register bound to `name`: a parameter alias first, then a register name.
    pub(super) fn register_named(&self, name: &str) -> Option<Register> {
        self.aliases
            .get(name)
            .copied()
            .or_else(|| Register::from_name(name))
    }

    pub(super) fn resolve_target(&self, target: &Expr) -> Result<Register, CompileError> {
        match target {
            Expr::Name(ident) => self.register_named(&ident.item).ok_or_else(|| {
                CompileError::new(
                    ErrorKind::InvalidTarget(format!("`{}` is not a register or parameter", ident.item)),
                    ident.span,
                )
            }),
            other => Err(CompileError::new(
                ErrorKind::InvalidTarget(format!("cannot assign to {}", other.kind())),
                other.span(),
            )),
        }
    }

    /// A register, parameter, numeric literal or constant as an instruction operand.
    pub(super) fn operand(&self, expr: &Expr) -> Result<Operand, CompileError> {
        match expr {
            Expr::Number(num) => literal(num.value, expr),
            Expr::Unary(unary) if unary.op == UnaryOp::Neg => match unary.operand.as_ref() {
                Expr::Number(num) => literal(-num.value, expr),
                other => Err(invalid_operand(other)),
            },
            Expr::Name(ident) => {
                if let Some(register) = self.register_named(&ident.item) {
                    return Ok(Operand::Reg(register));
                }
                let value = self.symbols.get_constant(&ident.item).ok_or_else(|| {
                    CompileError::new(ErrorKind::UndefinedName(ident.item.clone()), ident.span)
                })?;
                constant_operand(value, expr)
            }
            Expr::Attribute(_) => {
                let value = self.qualified_constant(expr)?;
                constant_operand(&value, expr)
            }
            other => Err(invalid_operand(other)),
        }
    }

    /// Compile-time value of a macro argument, resolved in the current namespace.
    pub(super) fn eval_value(&self, expr: &Expr) -> Result<Value, CompileError> {
        match expr {
            Expr::Number(num) => Ok(Value::Number(num.value)),
            Expr::Unary(unary) if unary.op == UnaryOp::Neg => match unary.operand.as_ref() {
                Expr::Number(num) => Ok(Value::Number(-num.value)),
                other => Err(invalid_operand(other)),
            },
            Expr::Str(s) => Ok(Value::Text(s.value.clone())),
            Expr::Tuple(seq) => Ok(Value::Tuple(self.eval_all(&seq.elts)?)),
            Expr::List(seq) => Ok(Value::List(self.eval_all(&seq.elts)?)),
            Expr::Dict(dict) => {
                let mut entries = Vec::with_capacity(dict.entries.len());
                for (key, value) in &dict.entries {
                    entries.push((self.eval_value(key)?, self.eval_value(value)?));
                }
                Ok(Value::Map(entries))
            }
            Expr::Name(ident) => {
                if let Some(register) = self.register_named(&ident.item) {
                    return Ok(Value::Register(register));
                }
                self.symbols
                    .get_constant(&ident.item)
                    .cloned()
                    .ok_or_else(|| CompileError::new(ErrorKind::UndefinedName(ident.item.clone()), ident.span))
            }
            Expr::Attribute(_) => self.qualified_constant(expr),
            other => Err(invalid_operand(other)),
        }
    }

    pub(super) fn eval_arguments(
        &self,
        call: &CallExpr,
    ) -> Result<(Vec<Value>, IndexMap<String, Value>), CompileError> {
        let args = self.eval_all(&call.args)?;
        let mut kwargs = IndexMap::new();
        for keyword in &call.keywords {
            kwargs.insert(keyword.name.item.clone(), self.eval_value(&keyword.value)?);
        }
        Ok((args, kwargs))
    }

    /// Split a callee into the namespace it lives in and its bare name.
    /// Bare names resolve in the current namespace, dotted names from the root.
    pub(super) fn resolve_callee(&self, func: &Expr) -> Result<(NamespacePath, String), CompileError> {
        match func {
            Expr::Name(ident) => Ok((self.symbols.current().clone(), ident.item.clone())),
            Expr::Attribute(_) => split_path(func),
            other => Err(CompileError::new(
                ErrorKind::InvalidOperand(format!("cannot call {}", other.kind())),
                other.span(),
            )),
        }
    }

    /// `a.b.c` names constant `c` of module `a.b`.
    fn qualified_constant(&self, expr: &Expr) -> Result<Value, CompileError> {
        let (namespace, name) = split_path(expr)?;
        self.symbols
            .constant_in(&namespace, &name)
            .cloned()
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::UndefinedName(format!("{namespace}.{name}")),
                    expr.span(),
                )
            })
    }

    fn eval_all(&self, exprs: &[Expr]) -> Result<Vec<Value>, CompileError> {
        exprs.iter().map(|expr| self.eval_value(expr)).collect()
    }

    /// Address expression for memory writes: an operand, or `base + offset`
    /// with at most one register, which is placed first.
    pub(super) fn address(&self, expr: &Expr) -> Result<Operand, CompileError> {
        let Expr::Binary(binary) = expr else {
            return Ok(Operand::mem(self.operand(expr)?));
        };
        if binary.op != BinaryOp::Add {
            return Err(CompileError::new(
                ErrorKind::UnsupportedOperator(binary.op.symbol().to_string()),
                binary.span,
            ));
        }
        let left = self.operand(&binary.left)?;
        let right = self.operand(&binary.right)?;
        match (left, right) {
            (Operand::Reg(_), Operand::Reg(_)) => Err(CompileError::new(
                ErrorKind::InvalidOperand("cannot add two registers in an address".to_string()),
                binary.span,
            )),
            (Operand::Lit(a), Operand::Lit(b)) => {
                let folded = a as u32 + b as u32;
                u16::try_from(folded)
                    .map(|addr| Operand::mem(Operand::Lit(addr)))
                    .map_err(|_| {
                        CompileError::new(
                            ErrorKind::InvalidOperand(format!("address {folded:#x} is out of range")),
                            binary.span,
                        )
                    })
            }
            (base, offset @ Operand::Reg(_)) => Ok(Operand::mem_offset(offset, base)),
            (base, offset) => Ok(Operand::mem_offset(base, offset)),
        }
    }
}

fn split_path(expr: &Expr) -> Result<(NamespacePath, String), CompileError> {
    let path = expr.to_path().ok_or_else(|| invalid_operand(expr))?;
    let mut segments: Vec<String> = path.segments().map(str::to_string).collect();
    let name = segments.pop().unwrap_or_default();
    Ok((NamespacePath::from_segments(segments), name))
}

fn literal(value: i64, expr: &Expr) -> Result<Operand, CompileError> {
    word(value).map(Operand::Lit).ok_or_else(|| {
        CompileError::new(
            ErrorKind::InvalidOperand(format!("literal {value} does not fit in a word")),
            expr.span(),
        )
    })
}

fn constant_operand(value: &Value, expr: &Expr) -> Result<Operand, CompileError> {
    value.to_operand().ok_or_else(|| {
        CompileError::new(
            ErrorKind::InvalidOperand(format!("{} constant {value} is not a word", value.kind())),
            expr.span(),
        )
    })
}

fn invalid_operand(expr: &Expr) -> CompileError {
    CompileError::new(
        ErrorKind::InvalidOperand(format!("{} cannot be used here", expr.kind())),
        expr.span(),
    )
}
