use std::slice;

use tracing::debug;

use super::{Compiler, Frame, LoopContext};
use crate::ast::{
    AssignStmt, AugAssignStmt, BinaryOp, CmpOp, Expr, ExprStmt, ImportName, ImportStmt, Span, Stmt,
    WhileStmt,
};
use crate::emit::Opcode;
use crate::error::{CompileError, ErrorKind};
use crate::loader::load_module_from_path;
use crate::symbols::NamespacePath;

/// Which way a loop-control jump goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LoopJump {
    Break,
    Continue,
}

impl LoopJump {
    fn verb(self) -> &'static str {
        match self {
            LoopJump::Break => "break",
            LoopJump::Continue => "continue",
        }
    }
}

impl Compiler {
    pub(super) fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Import(import) => {
                self.lower_import(import);
                Ok(())
            }
            Stmt::Assign(assign) => self.lower_assign(assign),
            Stmt::AugAssign(aug) => self.lower_aug_assign(aug),
            Stmt::Expr(expr) => self.lower_expr_stmt(expr),
            Stmt::FunctionDef(def) => self.define_function(def),
            Stmt::Return(ret) => self.lower_return(ret),
            Stmt::While(stmt) => self.lower_while(stmt),
            Stmt::Break(span) => self.loop_jump(LoopJump::Break, *span),
            Stmt::Continue(span) => self.loop_jump(LoopJump::Continue, *span),
            Stmt::Pass(_) => Ok(()),
            Stmt::Unsupported(stmt) => Err(CompileError::new(
                ErrorKind::UnsupportedNode(stmt.kind.to_string()),
                stmt.span,
            )),
        }
    }

    fn lower_assign(&mut self, stmt: &AssignStmt) -> Result<(), CompileError> {
        let [target] = stmt.targets.as_slice() else {
            return Err(CompileError::new(
                ErrorKind::UnsupportedSyntax("chained assignment".to_string()),
                stmt.span,
            ));
        };
        match (target, &stmt.value) {
            (Expr::Tuple(seq) | Expr::List(seq), Expr::Call(call)) => self.lower_call(call, &seq.elts),
            (target, Expr::Call(call)) => self.lower_call(call, slice::from_ref(target)),
            (Expr::Tuple(seq) | Expr::List(seq), _) => Err(CompileError::new(
                ErrorKind::InvalidTarget(
                    "several targets need a function call on the right".to_string(),
                ),
                seq.span,
            )),
            (target, value) => {
                let register = self.resolve_target(target)?;
                let value = self.operand(value)?;
                self.emitter.set(register, value);
                Ok(())
            }
        }
    }

    fn lower_aug_assign(&mut self, stmt: &AugAssignStmt) -> Result<(), CompileError> {
        let op = match stmt.op {
            BinaryOp::Add => Opcode::Add,
            BinaryOp::Sub => Opcode::Sub,
            BinaryOp::Mul => Opcode::Mul,
            BinaryOp::Div => Opcode::Div,
            BinaryOp::Shl => Opcode::Shl,
            BinaryOp::Shr => Opcode::Shr,
            BinaryOp::BitOr => Opcode::Bor,
            BinaryOp::BitAnd => Opcode::And,
            BinaryOp::BitXor => Opcode::Xor,
            other => {
                return Err(CompileError::new(
                    ErrorKind::UnsupportedOperator(format!("{}=", other.symbol())),
                    stmt.span,
                ))
            }
        };
        let register = self.resolve_target(&stmt.target)?;
        let value = self.operand(&stmt.value)?;
        self.emitter.binary(op, register, value);
        Ok(())
    }

    fn lower_expr_stmt(&mut self, stmt: &ExprStmt) -> Result<(), CompileError> {
        match &stmt.expr {
            Expr::Call(call) => self.lower_call(call, &[]),
            // docstring
            Expr::Str(_) => Ok(()),
            other => Err(CompileError::new(
                ErrorKind::UnsupportedNode(other.kind().to_string()),
                other.span(),
            )),
        }
    }

    /// `while l OP r:` lowers to
    ///
    /// ```text
    /// :start
    /// <skip unless l OP r>
    /// SET PC, end
    /// <body>
    /// SET PC, start
    /// :end
    /// ```
    ///
    /// There is no single "skip if not greater" instruction, so `>` and `<`
    /// branch into the body explicitly through a third label.
    fn lower_while(&mut self, stmt: &WhileStmt) -> Result<(), CompileError> {
        let Expr::Compare(test) = &stmt.test else {
            return Err(CompileError::new(
                ErrorKind::UnsupportedSyntax(format!(
                    "loop condition must be a comparison, found {}",
                    stmt.test.kind()
                )),
                stmt.test.span(),
            ));
        };
        let ([op], [right]) = (test.ops.as_slice(), test.comparators.as_slice()) else {
            return Err(CompileError::new(
                ErrorKind::UnsupportedSyntax("chained comparison in loop condition".to_string()),
                test.span,
            ));
        };
        let left = self.operand(&test.left)?;
        let right = self.operand(right)?;
        let (skip, left, right) = match op {
            CmpOp::NotEq => (Opcode::Ife, left, right),
            CmpOp::Eq => (Opcode::Ifn, left, right),
            CmpOp::Gt => (Opcode::Ifg, left, right),
            CmpOp::Lt => (Opcode::Ifg, right, left),
            other => {
                return Err(CompileError::new(
                    ErrorKind::UnsupportedOperator(other.symbol().to_string()),
                    test.span,
                ))
            }
        };

        let n = self.emitter.next_counter("loop");
        let start = self.symbols.expand_name(&format!("builtin_loop_{n}_start"));
        let end = self.symbols.expand_name(&format!("builtin_loop_{n}_end"));

        self.emitter.write_label(&start);
        if skip == Opcode::Ifg {
            let body = self.symbols.expand_name(&format!("builtin_loop_{n}_body"));
            self.emitter.binary(skip, left, right);
            self.emitter.goto(&body);
            self.emitter.goto(&end);
            self.emitter.write_label(&body);
        } else {
            self.emitter.binary(skip, left, right);
            self.emitter.goto(&end);
        }

        self.loops.push(LoopContext {
            start: start.clone(),
            end: end.clone(),
        });
        self.lower_block(&stmt.body);
        self.loops.pop();

        self.emitter.goto(&start);
        self.emitter.write_label(&end);
        Ok(())
    }

    pub(super) fn loop_jump(&mut self, jump: LoopJump, span: Span) -> Result<(), CompileError> {
        let Some(context) = self.loops.last() else {
            return Err(CompileError::new(
                ErrorKind::LoopControlOutsideLoop(jump.verb()),
                span,
            ));
        };
        let label = match jump {
            LoopJump::Break => context.end.clone(),
            LoopJump::Continue => context.start.clone(),
        };
        self.emitter.goto(&label);
        Ok(())
    }

    fn lower_import(&mut self, stmt: &ImportStmt) {
        for name in &stmt.names {
            if let Err(err) = self.import(name) {
                self.report(err);
            }
        }
    }

    /// Resolve one imported name: install a native extension registered
    /// under it, compile a source module found under a search root, or both.
    fn import(&mut self, import: &ImportName) -> Result<(), CompileError> {
        let dotted = import.path.to_string();
        if let Some(alias) = &import.alias {
            return Err(CompileError::new(
                ErrorKind::UnsupportedSyntax(format!("import {dotted} as {}", alias.item)),
                import.span,
            ));
        }
        if self.loader.is_imported(&dotted) {
            debug!(module = %dotted, "already imported");
            return Ok(());
        }
        let namespace = NamespacePath::parse(&dotted);
        let extension = self.registry.get(&dotted).cloned();
        let source = self.loader.find_source(&namespace);
        if extension.is_none() && source.is_none() {
            return Err(CompileError::new(
                ErrorKind::ModuleNotFound {
                    name: dotted,
                    reason: None,
                },
                import.span,
            ));
        }
        // Marked before the body compiles so circular imports terminate.
        self.loader.mark_imported(&dotted);
        let errors_before = self.error_count();

        if let Some(extension) = extension {
            debug!(module = %dotted, "installing native extension");
            let previous = self.symbols.enter_namespace(namespace.clone());
            let installed = extension.install(&mut self.emitter, &mut self.symbols);
            self.symbols.restore_namespace(previous);
            installed.map_err(|err| {
                CompileError::new(
                    ErrorKind::Macro {
                        name: dotted.clone(),
                        message: err.to_string(),
                    },
                    import.span,
                )
            })?;
        }

        if let Some(path) = source {
            debug!(module = %dotted, path = %path.display(), "compiling source module");
            let module = load_module_from_path(&path).map_err(|err| {
                CompileError::new(
                    ErrorKind::ModuleNotFound {
                        name: dotted.clone(),
                        reason: Some(err.message().to_string()),
                    },
                    import.span,
                )
            })?;
            let frame = Frame {
                namespace,
                file: Some(path.display().to_string()),
                ..Frame::default()
            };
            self.with_frame(frame, |compiler| compiler.lower_block(&module.body));
        }

        if self.error_count() > errors_before {
            return Err(CompileError::new(ErrorKind::ImportFailed(dotted), import.span));
        }
        Ok(())
    }
}
