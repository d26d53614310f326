//! Streams an entry point touches, through every call it can make.

use super::LinkPlan;
use indexmap::IndexSet;
use sdsl_resolve::typed::{Callee, TypedExpr, TypedExprKind, TypedMixin, TypedStmt};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamUsage {
    /// Streams whose value is read somewhere
    pub reads: IndexSet<String>,
    /// Streams assigned somewhere, whole or in part
    pub writes: IndexSet<String>,
}

/// Usage of streams by function `index` of `mixin` and everything it
/// calls, with virtual calls resolved through `plan`.
pub fn stream_usage(
    mixins: &[&TypedMixin],
    plan: &LinkPlan,
    mixin: &str,
    index: usize,
) -> StreamUsage {
    let mut walker = Walker {
        mixins,
        plan,
        visited: HashSet::new(),
        usage: StreamUsage::default(),
    };
    walker.function(mixin, index);
    walker.usage
}

struct Walker<'a> {
    mixins: &'a [&'a TypedMixin],
    plan: &'a LinkPlan,
    visited: HashSet<(String, usize)>,
    usage: StreamUsage,
}

impl Walker<'_> {
    fn function(&mut self, mixin: &str, index: usize) {
        if !self.visited.insert((mixin.to_string(), index)) {
            return;
        }
        let mixins = self.mixins;
        let body = mixins
            .iter()
            .find(|candidate| candidate.name == mixin)
            .and_then(|mixin| mixin.functions.get(index))
            .and_then(|function| function.body.as_ref());
        for stmt in body.into_iter().flatten() {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &TypedStmt) {
        match stmt {
            TypedStmt::Block(stmts) => {
                for stmt in stmts {
                    self.statement(stmt);
                }
            }
            TypedStmt::Local { init, .. } => {
                if let Some(init) = init {
                    self.read(init);
                }
            }
            TypedStmt::Expr(expr) => self.read(expr),
            TypedStmt::Assign { target, value } => {
                self.write(target);
                self.read(value);
            }
            TypedStmt::Return(value) => {
                if let Some(value) = value {
                    self.read(value);
                }
            }
            TypedStmt::If {
                condition,
                then,
                otherwise,
            } => {
                self.read(condition);
                self.statement(then);
                if let Some(otherwise) = otherwise {
                    self.statement(otherwise);
                }
            }
            TypedStmt::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.statement(init);
                }
                if let Some(condition) = condition {
                    self.read(condition);
                }
                if let Some(step) = step {
                    self.statement(step);
                }
                self.statement(body);
            }
            TypedStmt::While { condition, body } | TypedStmt::DoWhile { body, condition } => {
                self.read(condition);
                self.statement(body);
            }
            TypedStmt::Break | TypedStmt::Continue | TypedStmt::Discard => {}
        }
    }

    /// Assignment target: the root stream is written, indices are read.
    fn write(&mut self, target: &TypedExpr) {
        match &target.kind {
            TypedExprKind::Global {
                name, stream: true, ..
            } => {
                self.usage.writes.insert(name.clone());
            }
            TypedExprKind::Swizzle { value, .. } | TypedExprKind::Field { value, .. } => {
                self.write(value);
            }
            TypedExprKind::Index { value, index } => {
                self.write(value);
                self.read(index);
            }
            _ => {}
        }
    }

    fn read(&mut self, expr: &TypedExpr) {
        match &expr.kind {
            TypedExprKind::Global {
                name, stream: true, ..
            } => {
                self.usage.reads.insert(name.clone());
            }
            TypedExprKind::Step { target, .. } => {
                self.read(target);
                self.write(target);
            }
            TypedExprKind::Unary { operand, .. } => self.read(operand),
            TypedExprKind::Binary { left, right, .. } => {
                self.read(left);
                self.read(right);
            }
            TypedExprKind::Ternary {
                condition,
                then,
                otherwise,
            } => {
                self.read(condition);
                self.read(then);
                self.read(otherwise);
            }
            TypedExprKind::Call { callee, args } => {
                for arg in args {
                    self.read(arg);
                }
                if let Callee::Function {
                    mixin, index, base, ..
                } = callee
                {
                    let (owner, index) = if *base {
                        (mixin.as_str(), *index)
                    } else {
                        self.plan.implementation(mixin, *index)
                    };
                    let owner = owner.to_string();
                    self.function(&owner, index);
                }
            }
            TypedExprKind::Construct(args) => {
                for arg in args {
                    self.read(arg);
                }
            }
            TypedExprKind::Convert(value)
            | TypedExprKind::Swizzle { value, .. }
            | TypedExprKind::Field { value, .. } => self.read(value),
            TypedExprKind::Index { value, index } => {
                self.read(value);
                self.read(index);
            }
            TypedExprKind::Constant(_)
            | TypedExprKind::Local(_)
            | TypedExprKind::Global { .. }
            | TypedExprKind::MixinRef(_)
            | TypedExprKind::Error => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdsl_ast::Span;
    use sdsl_resolve::typed::TypedFunction;
    use sdsl_resolve::SymbolType;

    fn stream(name: &str) -> TypedExpr {
        TypedExpr::new(
            TypedExprKind::Global {
                mixin: "Base".to_string(),
                name: name.to_string(),
                stream: true,
            },
            SymbolType::FLOAT,
            Span::zero(0),
        )
    }

    fn call(mixin: &str, index: usize, base: bool) -> TypedExpr {
        TypedExpr::new(
            TypedExprKind::Call {
                callee: Callee::Function {
                    mixin: mixin.to_string(),
                    name: "Shade".to_string(),
                    index,
                    base,
                },
                args: Vec::new(),
            },
            SymbolType::Void,
            Span::zero(0),
        )
    }

    fn function(body: Vec<TypedStmt>) -> TypedFunction {
        TypedFunction {
            name: "Shade".to_string(),
            return_type: SymbolType::Void,
            param_count: 0,
            locals: Vec::new(),
            semantic: None,
            body: Some(body),
            is_override: false,
            span: Span::zero(0),
        }
    }

    fn mixin(name: &str, functions: Vec<TypedFunction>) -> TypedMixin {
        TypedMixin {
            name: name.to_string(),
            bases: Vec::new(),
            compositions: Vec::new(),
            structs: Vec::new(),
            globals: Vec::new(),
            functions,
            implicit: false,
            span: Span::zero(0),
        }
    }

    #[test]
    fn test_reads_and_writes_follow_calls() {
        let base = mixin(
            "Base",
            vec![function(vec![TypedStmt::Assign {
                target: stream("Color"),
                value: stream("Position"),
            }])],
        );
        let main = mixin(
            "Main",
            vec![function(vec![
                TypedStmt::Expr(call("Base", 0, true)),
                TypedStmt::Expr(call("Main", 0, false)),
            ])],
        );
        let mixins = [&base, &main];
        let usage = stream_usage(&mixins, &LinkPlan::default(), "Main", 0);

        assert_eq!(
            usage.reads.iter().collect::<Vec<_>>(),
            vec!["Position"]
        );
        assert_eq!(usage.writes.iter().collect::<Vec<_>>(), vec!["Color"]);
    }

    #[test]
    fn test_unknown_function_is_empty() {
        let usage = stream_usage(&[], &LinkPlan::default(), "Missing", 3);
        assert_eq!(usage, StreamUsage::default());
    }
}
