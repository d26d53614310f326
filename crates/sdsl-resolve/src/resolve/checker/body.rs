//! Function bodies and statements.

use super::{lookup_type, MixinInfo};
use crate::error::{CompileError, ErrorKind};
use crate::resolve::symbols::{Symbol, SymbolKind, SymbolTable};
use crate::resolve::typed::{LocalVar, TypedExpr, TypedFunction, TypedStmt};
use crate::resolve::types::SymbolType;
use indexmap::IndexMap;
use sdsl_ast::{AssignOp, Block, Expr, FunctionDecl, Span, Stmt, VariableDecl};

/// Checking state for one mixin's initializers and function bodies.
pub(super) struct Body<'a> {
    pub(super) mixins: &'a IndexMap<String, MixinInfo>,
    pub(super) errors: &'a mut Vec<CompileError>,
    /// Mixin whose members are being checked
    pub(super) mixin: &'a str,
    /// Ancestors of `mixin`, nearest first
    pub(super) ancestors: &'a [String],
    pub(super) locals: Vec<LocalVar>,
    pub(super) return_type: SymbolType,
    loop_depth: u32,
}

impl<'a> Body<'a> {
    pub(super) fn new(
        mixins: &'a IndexMap<String, MixinInfo>,
        errors: &'a mut Vec<CompileError>,
        mixin: &'a str,
        ancestors: &'a [String],
    ) -> Self {
        Self {
            mixins,
            errors,
            mixin,
            ancestors,
            locals: Vec::new(),
            return_type: SymbolType::Void,
            loop_depth: 0,
        }
    }

    pub(super) fn error(&mut self, kind: ErrorKind, span: Span, message: String) {
        self.errors.push(CompileError::new(kind, span, message));
    }

    /// Check a global initializer against the declared type.
    pub(super) fn global_initializer(
        &mut self,
        table: &SymbolTable,
        name: &str,
        init: &Expr,
        ty: &SymbolType,
    ) -> TypedExpr {
        let value = self.expr(table, init);
        let value = self.coerce(value, ty, "initializer");
        if !value.ty.is_unknown() && !value.is_constant() {
            self.error(
                ErrorKind::TypeMismatch,
                init.span,
                format!("initializer of global '{}' must be a constant expression", name),
            );
        }
        value
    }

    /// Check one function. `symbol` carries the signature resolved by the
    /// interface pass.
    pub(super) fn check_function(
        &mut self,
        table: &mut SymbolTable,
        decl: &FunctionDecl,
        symbol: &Symbol,
    ) -> TypedFunction {
        let (ret, params) = match &symbol.ty {
            SymbolType::Function { ret, params } => ((**ret).clone(), params.clone()),
            _ => (SymbolType::Unknown, vec![SymbolType::Unknown; decl.params.len()]),
        };

        self.locals.clear();
        self.loop_depth = 0;
        self.return_type = ret.clone();

        let mut scope = table.scope();
        for (param, ty) in decl.params.iter().zip(params) {
            self.declare_local(&mut scope, &param.name, ty, param.span);
        }
        let param_count = self.locals.len();

        let body = decl
            .body
            .as_ref()
            .map(|block| self.statements(&mut scope, &block.statements));

        TypedFunction {
            name: decl.name.clone(),
            return_type: ret,
            param_count,
            locals: std::mem::take(&mut self.locals),
            semantic: decl.semantic.clone(),
            body,
            is_override: decl.modifiers.override_,
            span: decl.span,
        }
    }

    fn declare_local(
        &mut self,
        table: &mut SymbolTable,
        name: &str,
        ty: SymbolType,
        span: Span,
    ) -> u32 {
        let slot = self.locals.len() as u32;
        self.locals.push(LocalVar {
            name: name.to_string(),
            ty: ty.clone(),
        });
        let symbol = Symbol::new(name, SymbolKind::Variable, ty)
            .with_slot(slot)
            .at(span);
        if let Err(existing) = table.declare(symbol) {
            let first = existing.span;
            self.errors.push(
                CompileError::new(
                    ErrorKind::DuplicateName,
                    span,
                    format!("duplicate definition of '{}'", name),
                )
                .with_label(first, "first defined here".to_string()),
            );
        }
        slot
    }

    fn statements(&mut self, table: &mut SymbolTable, statements: &[Stmt]) -> Vec<TypedStmt> {
        statements
            .iter()
            .filter(|stmt| !matches!(stmt, Stmt::Error(_)))
            .map(|stmt| self.stmt(table, stmt))
            .collect()
    }

    fn block(&mut self, table: &mut SymbolTable, block: &Block) -> TypedStmt {
        let mut scope = table.scope();
        TypedStmt::Block(self.statements(&mut scope, &block.statements))
    }

    /// Statement used as the body of a control-flow construct; gets its own
    /// scope so declarations do not leak.
    fn nested(&mut self, table: &mut SymbolTable, stmt: &Stmt) -> Box<TypedStmt> {
        let mut scope = table.scope();
        Box::new(self.stmt(&mut scope, stmt))
    }

    fn loop_body(&mut self, table: &mut SymbolTable, stmt: &Stmt) -> Box<TypedStmt> {
        self.loop_depth += 1;
        let body = self.nested(table, stmt);
        self.loop_depth -= 1;
        body
    }

    fn stmt(&mut self, table: &mut SymbolTable, stmt: &Stmt) -> TypedStmt {
        match stmt {
            Stmt::Block(block) => self.block(table, block),
            Stmt::Declare(var) => self.local_declaration(table, var),
            Stmt::Expr(expr) => TypedStmt::Expr(self.expr(table, expr)),
            Stmt::Assign {
                target, op, value, ..
            } => self.assignment(table, target, *op, value),
            Stmt::Return { value, span } => self.return_stmt(table, value.as_ref(), *span),
            Stmt::If {
                condition,
                then,
                otherwise,
                ..
            } => {
                let condition = self.condition(table, condition);
                let then = self.nested(table, then);
                let otherwise = otherwise.as_ref().map(|stmt| self.nested(table, stmt));
                TypedStmt::If {
                    condition,
                    then,
                    otherwise,
                }
            }
            Stmt::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                let mut scope = table.scope();
                let init = init.as_ref().map(|stmt| Box::new(self.stmt(&mut scope, stmt)));
                let condition = condition
                    .as_ref()
                    .map(|condition| self.condition(&scope, condition));
                let step = step.as_ref().map(|stmt| Box::new(self.stmt(&mut scope, stmt)));
                let body = self.loop_body(&mut scope, body);
                TypedStmt::For {
                    init,
                    condition,
                    step,
                    body,
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                let condition = self.condition(table, condition);
                let body = self.loop_body(table, body);
                TypedStmt::While { condition, body }
            }
            Stmt::DoWhile {
                body, condition, ..
            } => {
                let body = self.loop_body(table, body);
                let condition = self.condition(table, condition);
                TypedStmt::DoWhile { body, condition }
            }
            Stmt::Break(span) => {
                self.require_loop("break", *span);
                TypedStmt::Break
            }
            Stmt::Continue(span) => {
                self.require_loop("continue", *span);
                TypedStmt::Continue
            }
            Stmt::Discard(_) => TypedStmt::Discard,
            Stmt::Error(_) => TypedStmt::Block(Vec::new()),
        }
    }

    fn require_loop(&mut self, keyword: &str, span: Span) {
        if self.loop_depth == 0 {
            self.error(
                ErrorKind::Syntax,
                span,
                format!("'{}' outside of a loop", keyword),
            );
        }
    }

    fn local_declaration(&mut self, table: &mut SymbolTable, var: &VariableDecl) -> TypedStmt {
        let ty = self.local_type(table, var);
        let init = var.initializer.as_ref().map(|init| {
            let value = self.expr(table, init);
            self.coerce(value, &ty, "initializer")
        });
        let slot = self.declare_local(table, &var.name, ty, var.span);
        TypedStmt::Local { slot, init }
    }

    fn local_type(&mut self, table: &SymbolTable, var: &VariableDecl) -> SymbolType {
        let element = match lookup_type(table, &var.ty.name) {
            Some(SymbolType::Mixin { .. }) | None => {
                self.error(
                    ErrorKind::UnknownType,
                    var.ty.span,
                    format!("unknown type '{}'", var.ty.name),
                );
                return SymbolType::Unknown;
            }
            Some(ty) => ty,
        };
        match &var.array_size {
            None => element,
            Some(size) => match super::array_length(size) {
                Some(length) => SymbolType::Array {
                    element: Box::new(element),
                    length: Some(length),
                },
                None => {
                    self.error(
                        ErrorKind::TypeMismatch,
                        size.span,
                        format!(
                            "array size of '{}' must be a positive integer literal",
                            var.name
                        ),
                    );
                    SymbolType::Unknown
                }
            },
        }
    }

    fn assignment(
        &mut self,
        table: &SymbolTable,
        target: &Expr,
        op: AssignOp,
        value: &Expr,
    ) -> TypedStmt {
        let target = self.expr(table, target);
        if !target.is_lvalue() {
            self.error(
                ErrorKind::TypeMismatch,
                target.span,
                "left side of assignment is not assignable".to_string(),
            );
        }

        let value = self.expr(table, value);
        let value = match op.binary() {
            None => value,
            Some(binary) => {
                let span = target.span.merge(&value.span);
                self.binary(binary, target.clone(), value, span)
            }
        };
        let value = self.coerce(value, &target.ty, "assignment");
        TypedStmt::Assign { target, value }
    }

    fn return_stmt(&mut self, table: &SymbolTable, value: Option<&Expr>, span: Span) -> TypedStmt {
        let expected = self.return_type.clone();
        match value {
            Some(value) => {
                let value = self.expr(table, value);
                if expected.is_void() {
                    self.error(
                        ErrorKind::TypeMismatch,
                        value.span,
                        "void function cannot return a value".to_string(),
                    );
                    return TypedStmt::Return(None);
                }
                TypedStmt::Return(Some(self.coerce(value, &expected, "return value")))
            }
            None => {
                if !expected.is_void() && !expected.is_unknown() {
                    self.error(
                        ErrorKind::TypeMismatch,
                        span,
                        format!("function must return a value of type '{}'", expected),
                    );
                }
                TypedStmt::Return(None)
            }
        }
    }

    /// Expression used as a condition; must be a scalar `bool`.
    pub(super) fn condition(&mut self, table: &SymbolTable, expr: &Expr) -> TypedExpr {
        let value = self.expr(table, expr);
        if value.ty != SymbolType::BOOL && !value.ty.is_unknown() {
            self.error(
                ErrorKind::TypeMismatch,
                value.span,
                format!("condition must be 'bool', found '{}'", value.ty),
            );
            return TypedExpr::error(value.span);
        }
        value
    }
}
