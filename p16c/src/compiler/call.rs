//! Subroutines and the stack calling convention.
//!
//! Callers push arguments in order and `JSR`. The callee pops its return
//! address into `J`, pops the arguments into `A B C X Y Z I` (last parameter
//! first) and returns by pushing its results and jumping through `J`. The
//! caller then pops the results into its targets in reverse order.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use super::{Builtin, Compiler, Frame, FunctionScope};
use crate::ast::{CallExpr, Expr, FunctionDef, ReturnStmt};
use crate::emit::{Register, Segment, Special};
use crate::error::{CompileError, ErrorKind};
use crate::extension::Macro;
use crate::symbols::{EmitState, FunctionSymbol, NamespacePath, Symbol};

const EXPORT_DECORATOR: &str = "export";

impl Compiler {
    /// Register a function in the current namespace. Its body is emitted on
    /// first call, or right away when decorated with `@export`.
    pub(super) fn define_function(&mut self, def: &FunctionDef) -> Result<(), CompileError> {
        let name = def.name.item.as_str();
        let invalid = |message: String| CompileError::new(ErrorKind::InvalidFunction(message), def.name.span);

        if self.function.is_some() {
            return Err(invalid(format!("`{name}` is nested in another function")));
        }
        if name.starts_with(Builtin::PREFIX) {
            return Err(invalid(format!(
                "`{name}` uses the reserved `{}` prefix",
                Builtin::PREFIX
            )));
        }
        if def.params.len() > Register::ARGUMENTS.len() {
            return Err(invalid(format!(
                "`{name}` takes {} parameters, at most {} are supported",
                def.params.len(),
                Register::ARGUMENTS.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = def.params.iter().find(|param| !seen.insert(param.item.as_str())) {
            return Err(CompileError::new(
                ErrorKind::InvalidFunction(format!("duplicate parameter `{}`", dup.item)),
                dup.span,
            ));
        }
        if let Some(existing) = self.symbols.lookup(self.symbols.current(), name) {
            return Err(invalid(format!("`{name}` is already defined as a {}", existing.kind())));
        }
        let export = exported(def)?;

        let namespace = self.symbols.current().clone();
        let function = FunctionSymbol {
            label: self.symbols.expand_name(name),
            params: def.params.iter().map(|param| param.item.clone()).collect(),
            returns: None,
            def: Rc::new(def.clone()),
            namespace: namespace.clone(),
            file: self.file.clone(),
            state: EmitState::Declared,
        };
        self.symbols.define_function(name, function);

        if export {
            self.ensure_emitted(&namespace, name);
        } else {
            // Uncalled functions are never lowered, so they produce no diagnostics.
            debug!(function = %name, namespace = %namespace, "deferred until first call");
        }
        Ok(())
    }

    /// Emit the body of a declared function once.
    fn ensure_emitted(&mut self, namespace: &NamespacePath, name: &str) {
        let Some(function) = self.symbols.function_in_mut(namespace, name) else {
            return;
        };
        if function.state == EmitState::Emitted {
            return;
        }
        // Marked before lowering so recursive calls do not emit it again.
        function.state = EmitState::Emitted;
        let function = function.clone();
        debug!(label = %function.label, "emitting function body");

        let aliases: HashMap<String, Register> = function
            .params
            .iter()
            .cloned()
            .zip(Register::ARGUMENTS)
            .collect();
        let frame = Frame {
            namespace: function.namespace.clone(),
            file: function.file.clone(),
            loops: Vec::new(),
            aliases,
            function: Some(FunctionScope {
                namespace: namespace.clone(),
                name: name.to_string(),
            }),
        };

        // Callees first reached from this body are placed after it.
        let outer = self.emitter.open_block();
        let previous = self.emitter.switch_segment(Segment::Footer);
        self.with_frame(frame, |compiler| {
            compiler.emitter.write_label(&function.label);
            compiler.emitter.pop(Register::RETURN);
            for register in Register::ARGUMENTS[..function.arity()].iter().rev() {
                compiler.emitter.pop(*register);
            }
            compiler.lower_block(&function.def.body);
            compiler.emitter.set(Special::Pc, Register::RETURN);
        });
        self.emitter.switch_segment(previous);
        self.emitter.close_block(outer);

        if let Some(function) = self.symbols.function_in_mut(namespace, name) {
            if function.returns.is_none() {
                function.returns = Some(0);
            }
        }
    }

    /// Lower a call whose results are popped into `targets` (none for an
    /// expression statement).
    pub(super) fn lower_call(&mut self, call: &CallExpr, targets: &[Expr]) -> Result<(), CompileError> {
        if let Expr::Name(ident) = call.func.as_ref() {
            if ident.item.starts_with(Builtin::PREFIX) {
                let builtin = Builtin::from_name(&ident.item).ok_or_else(|| {
                    CompileError::new(ErrorKind::UndefinedName(ident.item.clone()), ident.span)
                })?;
                reject_targets(&ident.item, targets)?;
                return self.lower_builtin(builtin, call);
            }
        }

        let (namespace, name) = self.resolve_callee(&call.func)?;
        let qualified = if namespace == *self.symbols.current() {
            name.clone()
        } else {
            format!("{namespace}.{name}")
        };
        match self.symbols.lookup(&namespace, &name).cloned() {
            Some(Symbol::Macro(mac)) => {
                reject_targets(&qualified, targets)?;
                self.invoke_macro(&mac, namespace, &qualified, call)
            }
            Some(Symbol::Function(function)) => {
                self.call_function(&namespace, &name, &qualified, function, call, targets)
            }
            Some(Symbol::Constant(_)) => Err(CompileError::new(
                ErrorKind::InvalidOperand(format!("constant `{qualified}` is not callable")),
                call.func.span(),
            )),
            None => Err(CompileError::new(
                ErrorKind::UndefinedName(qualified),
                call.func.span(),
            )),
        }
    }

    /// Arguments are evaluated here; the callback runs inside the macro's
    /// own namespace.
    fn invoke_macro(
        &mut self,
        mac: &Macro,
        namespace: NamespacePath,
        qualified: &str,
        call: &CallExpr,
    ) -> Result<(), CompileError> {
        let (args, kwargs) = self.eval_arguments(call)?;
        debug!(name = %qualified, args = args.len(), "invoking macro");
        let previous = self.symbols.enter_namespace(namespace);
        let result = mac.invoke(&mut self.emitter, &mut self.symbols, &args, &kwargs);
        self.symbols.restore_namespace(previous);
        result.map_err(|err| {
            CompileError::new(
                ErrorKind::Macro {
                    name: qualified.to_string(),
                    message: err.to_string(),
                },
                call.span,
            )
        })
    }

    fn call_function(
        &mut self,
        namespace: &NamespacePath,
        name: &str,
        qualified: &str,
        function: FunctionSymbol,
        call: &CallExpr,
        targets: &[Expr],
    ) -> Result<(), CompileError> {
        if let Some(keyword) = call.keywords.first() {
            return Err(CompileError::new(
                ErrorKind::UnsupportedSyntax(format!(
                    "keyword argument `{}` in call to function `{qualified}`",
                    keyword.name.item
                )),
                keyword.span,
            ));
        }
        if call.args.len() != function.arity() {
            return Err(CompileError::new(
                ErrorKind::ArityMismatch {
                    name: qualified.to_string(),
                    what: "arguments",
                    expected: function.arity(),
                    found: call.args.len(),
                },
                call.span,
            ));
        }
        let arguments = call
            .args
            .iter()
            .map(|arg| self.operand(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let registers = targets
            .iter()
            .map(|target| self.resolve_target(target))
            .collect::<Result<Vec<_>, _>>()?;

        self.ensure_emitted(namespace, name);
        if let Some(function) = self.symbols.function_in_mut(namespace, name) {
            // Still unknown only for a recursive call reached before any `return`.
            let returns = *function.returns.get_or_insert(registers.len());
            if returns != registers.len() {
                return Err(CompileError::new(
                    ErrorKind::ArityMismatch {
                        name: qualified.to_string(),
                        what: "return values",
                        expected: returns,
                        found: registers.len(),
                    },
                    call.span,
                ));
            }
        }

        let nested = self.function.is_some();
        if nested {
            self.emitter.push(Register::RETURN);
        }
        for argument in arguments {
            self.emitter.push(argument);
        }
        self.emitter.jsr(&function.label);
        for register in registers.iter().rev() {
            self.emitter.pop(*register);
        }
        if nested {
            self.emitter.pop(Register::RETURN);
        }
        Ok(())
    }

    pub(super) fn lower_return(&mut self, stmt: &ReturnStmt) -> Result<(), CompileError> {
        let Some(scope) = self.function.clone() else {
            return Err(CompileError::new(ErrorKind::ReturnOutsideFunction, stmt.span));
        };
        let values: Vec<&Expr> = match &stmt.value {
            None => Vec::new(),
            Some(Expr::Tuple(seq)) => seq.elts.iter().collect(),
            Some(value) => vec![value],
        };
        let operands = values
            .iter()
            .map(|value| self.operand(value))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(function) = self.symbols.function_in_mut(&scope.namespace, &scope.name) {
            let returns = *function.returns.get_or_insert(operands.len());
            if returns != operands.len() {
                return Err(CompileError::new(
                    ErrorKind::ArityMismatch {
                        name: scope.name,
                        what: "return values",
                        expected: returns,
                        found: operands.len(),
                    },
                    stmt.span,
                ));
            }
        }

        for operand in operands {
            self.emitter.push(operand);
        }
        self.emitter.set(Special::Pc, Register::RETURN);
        Ok(())
    }
}

/// `true` for `@export`; any other decorator, or more than one, is an error.
fn exported(def: &FunctionDef) -> Result<bool, CompileError> {
    match def.decorators.as_slice() {
        [] => Ok(false),
        [Expr::Name(ident)] if ident.item == EXPORT_DECORATOR => Ok(true),
        [other] => Err(CompileError::new(
            ErrorKind::InvalidDecorator(format!("only `@{EXPORT_DECORATOR}` is supported")),
            other.span(),
        )),
        [_, extra, ..] => Err(CompileError::new(
            ErrorKind::InvalidDecorator("at most one decorator is allowed".to_string()),
            extra.span(),
        )),
    }
}

fn reject_targets(name: &str, targets: &[Expr]) -> Result<(), CompileError> {
    match targets.first() {
        Some(target) => Err(CompileError::new(
            ErrorKind::InvalidTarget(format!("`{name}` produces no value to assign")),
            target.span(),
        )),
        None => Ok(()),
    }
}
