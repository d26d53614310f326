//! Statement lowering into structured control flow.
//!
//! Selections and loops use the usual merge/continue layout: a loop header
//! declares `OpLoopMerge`, the body falls into the continue block, and the
//! continue block branches back to the header.

use super::{Lowerer, LoopTargets};
use sdsl_resolve::typed::{Constant, TypedExpr, TypedStmt};
use sdsl_resolve::ScalarKind;
use sdsl_spirv::spirv::{LoopControl, SelectionControl};
use sdsl_spirv::Id;

impl Lowerer<'_> {
    pub(super) fn statement(&mut self, stmt: &TypedStmt) {
        // Code after a terminator is unreachable.
        if self.function.terminated {
            return;
        }

        match stmt {
            TypedStmt::Block(stmts) => {
                for stmt in stmts {
                    self.statement(stmt);
                }
            }
            TypedStmt::Local { slot, init } => {
                let Some(init) = init else {
                    return;
                };
                let Some(value) = self.value(init) else {
                    return;
                };
                if let Some(Some(pointer)) = self.function.locals.get(*slot as usize).copied() {
                    self.code().store(pointer, value);
                }
            }
            TypedStmt::Expr(expr) => self.effect(expr),
            TypedStmt::Assign { target, value } => {
                let Some(place) = self.place(target) else {
                    return;
                };
                if let Some(value) = self.value(value) {
                    let _ = self.store(&place, value);
                }
            }
            TypedStmt::Return(value) => {
                match value.as_ref().map(|value| self.value(value)) {
                    Some(Some(value)) => self.code().ret_value(value),
                    Some(None) => self.code().unreachable(),
                    None => self.code().ret(),
                }
                self.function.terminated = true;
            }
            TypedStmt::If {
                condition,
                then,
                otherwise,
            } => self.selection(condition, then, otherwise.as_deref()),
            TypedStmt::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.statement(init);
                }
                self.while_loop(condition.as_ref(), body, step.as_deref());
            }
            TypedStmt::While { condition, body } => self.while_loop(Some(condition), body, None),
            TypedStmt::DoWhile { body, condition } => self.do_while(body, condition),
            TypedStmt::Break => self.jump(|targets| targets.merge, "break"),
            TypedStmt::Continue => self.jump(|targets| targets.continue_target, "continue"),
            TypedStmt::Discard => {
                self.code().kill();
                self.function.terminated = true;
            }
        }
    }

    /// Condition value, or `false` after an error so the block structure
    /// stays well formed.
    fn condition(&mut self, condition: &TypedExpr) -> Id {
        match self.value(condition) {
            Some(id) => id,
            None => self.scalar_constant(ScalarKind::Bool, Constant::Bool(false)),
        }
    }

    /// Start block `label`, which is reachable again.
    fn begin(&mut self, label: Id) {
        self.code().label_with_id(label);
        self.function.terminated = false;
    }

    /// Branch to `target` unless the current block already ended.
    fn fall_through(&mut self, target: Id) {
        if !self.function.terminated {
            self.code().branch(target);
            self.function.terminated = true;
        }
    }

    fn selection(&mut self, condition: &TypedExpr, then: &TypedStmt, otherwise: Option<&TypedStmt>) {
        let condition = self.condition(condition);
        let then_label = self.code().reserve_id();
        let merge = self.code().reserve_id();
        let else_label = match otherwise {
            Some(_) => self.code().reserve_id(),
            None => merge,
        };

        self.code().selection_merge(merge, SelectionControl::NONE);
        self.code().branch_conditional(condition, then_label, else_label);

        self.begin(then_label);
        self.statement(then);
        self.fall_through(merge);

        if let Some(otherwise) = otherwise {
            self.begin(else_label);
            self.statement(otherwise);
            self.fall_through(merge);
        }

        self.begin(merge);
    }

    /// `while` and `for`: the condition is tested in its own block after
    /// the header, and `step` runs in the continue block.
    fn while_loop(&mut self, condition: Option<&TypedExpr>, body: &TypedStmt, step: Option<&TypedStmt>) {
        let header = self.code().reserve_id();
        let test = self.code().reserve_id();
        let body_label = self.code().reserve_id();
        let continue_target = self.code().reserve_id();
        let merge = self.code().reserve_id();

        self.code().branch(header);
        self.begin(header);
        self.code()
            .loop_merge(merge, continue_target, LoopControl::NONE);
        self.code().branch(test);

        self.begin(test);
        match condition {
            Some(condition) => {
                let condition = self.condition(condition);
                self.code().branch_conditional(condition, body_label, merge);
            }
            None => self.code().branch(body_label),
        }

        self.loop_body(body_label, body, merge, continue_target);

        self.begin(continue_target);
        if let Some(step) = step {
            self.statement(step);
        }
        self.fall_through(header);

        self.begin(merge);
    }

    fn do_while(&mut self, body: &TypedStmt, condition: &TypedExpr) {
        let header = self.code().reserve_id();
        let body_label = self.code().reserve_id();
        let continue_target = self.code().reserve_id();
        let merge = self.code().reserve_id();

        self.code().branch(header);
        self.begin(header);
        self.code()
            .loop_merge(merge, continue_target, LoopControl::NONE);
        self.code().branch(body_label);

        self.loop_body(body_label, body, merge, continue_target);

        self.begin(continue_target);
        let condition = self.condition(condition);
        self.code().branch_conditional(condition, header, merge);

        self.begin(merge);
    }

    fn loop_body(&mut self, label: Id, body: &TypedStmt, merge: Id, continue_target: Id) {
        self.begin(label);
        self.function.loops.push(LoopTargets {
            merge,
            continue_target,
        });
        self.statement(body);
        self.function.loops.pop();
        self.fall_through(continue_target);
    }

    fn jump(&mut self, target: impl Fn(&LoopTargets) -> Id, keyword: &str) {
        let Some(targets) = self.function.loops.last().copied() else {
            let _: Option<()> = self.internal(format!("'{}' outside of a loop", keyword));
            return;
        };
        self.code().branch(target(&targets));
        self.function.terminated = true;
    }
}
