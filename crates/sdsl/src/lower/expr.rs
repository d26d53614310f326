//! Expression lowering.
//!
//! Every `value` call returns the id of an SSA value, or `None` after a
//! diagnostic has been recorded. Lvalues are first resolved to a [`Place`]
//! and then loaded or stored.

use super::Lowerer;
use crate::link::function_symbol;
use sdsl_ast::{BinaryOp, OperatorBucket, UnaryOp};
use sdsl_resolve::typed::{Callee, Constant, TypedExpr, TypedExprKind};
use sdsl_resolve::{ErrorKind, ScalarKind, SymbolType};
use sdsl_spirv::spirv::{Op, StorageClass};
use sdsl_spirv::Id;

/// Storage location of an lvalue.
pub(super) enum Place {
    /// Pointer to the whole value
    Memory {
        pointer: Id,
        storage: StorageClass,
        ty: SymbolType,
    },
    /// Swizzled components of a vector in memory
    Components {
        pointer: Id,
        storage: StorageClass,
        vector: SymbolType,
        components: Vec<u32>,
    },
}

impl Lowerer<'_> {
    pub(super) fn place(&mut self, expr: &TypedExpr) -> Option<Place> {
        self.span = expr.span;
        match &expr.kind {
            TypedExprKind::Local(slot) => {
                match self.function.locals.get(*slot as usize).copied() {
                    Some(Some(pointer)) => Some(Place::Memory {
                        pointer,
                        storage: StorageClass::Function,
                        ty: expr.ty.clone(),
                    }),
                    Some(None) => None,
                    None => self.internal(format!("local slot {} is out of range", slot)),
                }
            }
            TypedExprKind::Global { mixin, name, stream } => {
                if let Some(member) = self.plan.uniform_index(mixin, name).filter(|_| !*stream) {
                    let block = self.uniform_block()?;
                    let value = self.type_id(&expr.ty)?;
                    let pointer_ty = self.pointer_type(StorageClass::Uniform, value);
                    let member = self.constant_u32(member);
                    let pointer = self.code().access_chain(pointer_ty, block, &[member]);
                    return Some(Place::Memory {
                        pointer,
                        storage: StorageClass::Uniform,
                        ty: expr.ty.clone(),
                    });
                }
                let pointer = self.global(mixin, name, *stream, &expr.ty)?;
                Some(Place::Memory {
                    pointer,
                    storage: StorageClass::Private,
                    ty: expr.ty.clone(),
                })
            }
            TypedExprKind::Field { value, index } => {
                let index = self.constant_u32(*index);
                self.element_place(value, index, &expr.ty)
            }
            TypedExprKind::Index { value, index } => {
                let index = self.value(index)?;
                self.element_place(value, index, &expr.ty)
            }
            TypedExprKind::Swizzle { value, components } => match self.place(value)? {
                Place::Memory {
                    pointer,
                    storage,
                    ty,
                } => Some(Place::Components {
                    pointer,
                    storage,
                    vector: ty,
                    components: components.clone(),
                }),
                Place::Components {
                    pointer,
                    storage,
                    vector,
                    components: outer,
                } => {
                    let mut composed = Vec::with_capacity(components.len());
                    for &component in components {
                        match outer.get(component as usize) {
                            Some(&inner) => composed.push(inner),
                            None => return self.internal("swizzle component out of range"),
                        }
                    }
                    Some(Place::Components {
                        pointer,
                        storage,
                        vector,
                        components: composed,
                    })
                }
            },
            _ => self.internal("expression is not assignable"),
        }
    }

    /// Access chain into a struct member, array element, vector component
    /// or matrix row.
    fn element_place(&mut self, base: &TypedExpr, index: Id, ty: &SymbolType) -> Option<Place> {
        let Place::Memory {
            pointer, storage, ..
        } = self.place(base)?
        else {
            return self.unsupported("indexing into a swizzle");
        };
        let element = self.type_id(ty)?;
        let pointer_ty = self.pointer_type(storage, element);
        let pointer = self.code().access_chain(pointer_ty, pointer, &[index]);
        Some(Place::Memory {
            pointer,
            storage,
            ty: ty.clone(),
        })
    }

    pub(super) fn load(&mut self, place: &Place) -> Option<Id> {
        match place {
            Place::Memory { pointer, ty, .. } => {
                let ty = self.type_id(ty)?;
                Some(self.code().load(ty, *pointer))
            }
            Place::Components {
                pointer,
                vector,
                components,
                ..
            } => {
                let vector_ty = self.type_id(vector)?;
                let whole = self.code().load(vector_ty, *pointer);
                let kind = vector.scalar_kind()?;
                self.swizzle(whole, kind, components)
            }
        }
    }

    pub(super) fn store(&mut self, place: &Place, value: Id) -> Option<()> {
        let (Place::Memory { storage, .. } | Place::Components { storage, .. }) = place;
        if *storage == StorageClass::Uniform {
            self.error(
                ErrorKind::TypeMismatch,
                "cannot assign to a uniform global; declare it 'static' to make it writable"
                    .to_string(),
            );
            return None;
        }
        match place {
            Place::Memory { pointer, .. } => {
                self.code().store(*pointer, value);
            }
            Place::Components {
                pointer,
                vector,
                components,
                ..
            } => {
                let vector_ty = self.type_id(vector)?;
                let size = vector.component_count()?;
                let old = self.code().load(vector_ty, *pointer);
                let merged = if let [component] = components.as_slice() {
                    self.code()
                        .composite_insert(vector_ty, value, old, &[*component])
                } else {
                    // Lanes of `value` follow the `size` lanes of `old`.
                    let lanes: Vec<u32> = (0..size)
                        .map(|lane| {
                            components
                                .iter()
                                .position(|&component| component == lane)
                                .map_or(lane, |source| size + source as u32)
                        })
                        .collect();
                    self.code().vector_shuffle(vector_ty, old, value, &lanes)
                };
                self.code().store(*pointer, merged);
            }
        }
        Some(())
    }

    /// `components` of the vector `whole`, as a scalar or a smaller vector.
    fn swizzle(&mut self, whole: Id, kind: ScalarKind, components: &[u32]) -> Option<Id> {
        let ty = self.type_id(&SymbolType::vector(kind, components.len() as u32))?;
        Some(if let [component] = components {
            self.code().composite_extract(ty, whole, &[*component])
        } else {
            self.code().vector_shuffle(ty, whole, whole, components)
        })
    }

    pub(super) fn value(&mut self, expr: &TypedExpr) -> Option<Id> {
        self.span = expr.span;
        match &expr.kind {
            TypedExprKind::Constant(value) => match expr.ty.scalar_kind() {
                Some(kind) => Some(self.scalar_constant(kind, *value)),
                None => self.internal(format!("constant of type '{}'", expr.ty)),
            },
            TypedExprKind::Local(_) | TypedExprKind::Global { .. } => {
                let place = self.place(expr)?;
                self.load(&place)
            }
            TypedExprKind::Unary { op, operand } => self.unary(*op, operand, &expr.ty),
            TypedExprKind::Step {
                target,
                increment,
                prefix,
            } => self.step(target, *increment, *prefix),
            TypedExprKind::Binary { op, left, right } => {
                let l = self.value(left)?;
                let r = self.value(right)?;
                self.span = expr.span;
                self.binary(*op, (l, &left.ty), (r, &right.ty), &expr.ty)
            }
            TypedExprKind::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.value(condition)?;
                let then = self.value(then)?;
                let otherwise = self.value(otherwise)?;
                let ty = self.type_id(&expr.ty)?;
                Some(self.code().select(ty, condition, then, otherwise))
            }
            TypedExprKind::Call { callee, args } => {
                if expr.ty.is_void() {
                    return self.internal("void call used as a value");
                }
                self.call(callee, args, &expr.ty)
            }
            TypedExprKind::Construct(args) => self.construct(args, &expr.ty),
            TypedExprKind::Convert(inner) => {
                let value = self.value(inner)?;
                self.span = expr.span;
                self.convert(value, &inner.ty, &expr.ty)
            }
            TypedExprKind::Swizzle { value, components } => {
                let whole = self.value(value)?;
                let kind = value.ty.scalar_kind()?;
                self.swizzle(whole, kind, components)
            }
            TypedExprKind::Field { value, index } => {
                let composite = self.value(value)?;
                let ty = self.type_id(&expr.ty)?;
                Some(self.code().composite_extract(ty, composite, &[*index]))
            }
            TypedExprKind::Index { value, index } => {
                if value.is_lvalue() {
                    let place = self.place(expr)?;
                    return self.load(&place);
                }
                let TypedExprKind::Constant(constant) = &index.kind else {
                    return self.unsupported("dynamic indexing of a temporary value");
                };
                let composite = self.value(value)?;
                let ty = self.type_id(&expr.ty)?;
                let index = match *constant {
                    Constant::Int(index) => index as u32,
                    Constant::UInt(index) => index as u32,
                    _ => return self.internal("non-integer index"),
                };
                Some(self.code().composite_extract(ty, composite, &[index]))
            }
            TypedExprKind::MixinRef(name) => {
                self.internal(format!("mixin '{}' used as a value", name))
            }
            TypedExprKind::Error => self.internal("erroneous expression reached lowering"),
        }
    }

    /// Evaluate an expression statement, allowing void calls.
    pub(super) fn effect(&mut self, expr: &TypedExpr) {
        if let (true, TypedExprKind::Call { callee, args }) = (expr.ty.is_void(), &expr.kind) {
            self.span = expr.span;
            let _ = self.call(callee, args, &expr.ty);
        } else {
            let _ = self.value(expr);
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &TypedExpr, ty: &SymbolType) -> Option<Id> {
        let value = self.value(operand)?;
        let kind = ty.scalar_kind()?;
        let opcode = match op {
            UnaryOp::Plus => return Some(value),
            UnaryOp::Neg if kind.is_floating() => Op::FNegate,
            UnaryOp::Neg => Op::SNegate,
            UnaryOp::Not => Op::LogicalNot,
            UnaryOp::BitNot => Op::Not,
            UnaryOp::PreIncrement | UnaryOp::PreDecrement => {
                return self.internal("increment was not desugared");
            }
        };

        if let SymbolType::Matrix { base, rows, cols } = ty {
            let column_ty = SymbolType::vector(*base, *cols);
            let column_id = self.type_id(&column_ty)?;
            let matrix_id = self.type_id(ty)?;
            let mut columns = Vec::with_capacity(*rows as usize);
            for row in 0..*rows {
                let column = self.code().composite_extract(column_id, value, &[row]);
                columns.push(self.code().unary(opcode, column_id, column));
            }
            return Some(self.code().composite_construct(matrix_id, &columns));
        }

        let ty = self.type_id(ty)?;
        Some(self.code().unary(opcode, ty, value))
    }

    /// `++x`, `x--` and friends: the stored value changes, the result is
    /// the new value for prefix forms and the old one otherwise.
    fn step(&mut self, target: &TypedExpr, increment: bool, prefix: bool) -> Option<Id> {
        let place = self.place(target)?;
        let old = self.load(&place)?;
        let one = self.one(&target.ty)?;
        let kind = target.ty.scalar_kind()?;
        let opcode = match (increment, kind.is_floating()) {
            (true, true) => Op::FAdd,
            (true, false) => Op::IAdd,
            (false, true) => Op::FSub,
            (false, false) => Op::ISub,
        };
        let ty = self.type_id(&target.ty)?;
        let new = self.code().binary(opcode, ty, old, one);
        self.store(&place, new)?;
        Some(if prefix { new } else { old })
    }

    /// `left op right`, with both operands already of the operator's
    /// element kind.
    pub(super) fn binary(
        &mut self,
        op: BinaryOp,
        (l, lt): (Id, &SymbolType),
        (r, rt): (Id, &SymbolType),
        ty: &SymbolType,
    ) -> Option<Id> {
        use SymbolType::{Matrix, Scalar, Vector};

        if op.bucket() == OperatorBucket::Logical {
            let bool_ty = self.scalar_type(ScalarKind::Bool);
            let opcode = if op == BinaryOp::LogicalAnd {
                Op::LogicalAnd
            } else {
                Op::LogicalOr
            };
            return Some(self.code().binary(opcode, bool_ty, l, r));
        }

        match (lt, rt) {
            (Matrix { .. }, _) | (_, Matrix { .. }) => self.matrix_binary(op, (l, lt), (r, rt), ty),
            (Vector { base, .. }, Scalar(_)) if op == BinaryOp::Mul && base.is_floating() => {
                let ty = self.type_id(ty)?;
                Some(self.code().binary(Op::VectorTimesScalar, ty, l, r))
            }
            (Scalar(_), Vector { base, .. }) if op == BinaryOp::Mul && base.is_floating() => {
                let ty = self.type_id(ty)?;
                Some(self.code().binary(Op::VectorTimesScalar, ty, r, l))
            }
            (Vector { size, .. }, Scalar(kind)) => {
                let r = self.splat(r, *kind, *size)?;
                self.componentwise(op, l, r, lt)
            }
            (Scalar(kind), Vector { size, .. }) => {
                let l = self.splat(l, *kind, *size)?;
                self.componentwise(op, l, r, rt)
            }
            _ => self.componentwise(op, l, r, lt),
        }
    }

    /// Same-shape scalar or vector operation. Comparisons of vectors are
    /// reduced to one `bool`: `!=` holds if any lane differs, every other
    /// comparison if all lanes hold.
    fn componentwise(&mut self, op: BinaryOp, l: Id, r: Id, operand_ty: &SymbolType) -> Option<Id> {
        let kind = operand_ty.scalar_kind()?;
        let opcode = component_op(op, kind);
        match op.bucket() {
            OperatorBucket::Comparison | OperatorBucket::Equality => {
                let lanes = operand_ty.component_count()?;
                let result_ty = self.type_id(&SymbolType::vector(ScalarKind::Bool, lanes))?;
                let compared = self.code().binary(opcode, result_ty, l, r);
                if lanes == 1 {
                    return Some(compared);
                }
                let bool_ty = self.scalar_type(ScalarKind::Bool);
                let reduce = if op == BinaryOp::Ne { Op::Any } else { Op::All };
                Some(self.code().unary(reduce, bool_ty, compared))
            }
            _ => {
                let ty = self.type_id(operand_ty)?;
                Some(self.code().binary(opcode, ty, l, r))
            }
        }
    }

    fn matrix_binary(
        &mut self,
        op: BinaryOp,
        (l, lt): (Id, &SymbolType),
        (r, rt): (Id, &SymbolType),
        ty: &SymbolType,
    ) -> Option<Id> {
        use SymbolType::{Matrix, Scalar, Vector};

        if op == BinaryOp::Mul {
            let result = self.type_id(ty)?;
            let (opcode, first, second) = match (lt, rt) {
                (Matrix { .. }, Matrix { .. }) => (Op::MatrixTimesMatrix, r, l),
                (Matrix { .. }, Vector { .. }) => (Op::VectorTimesMatrix, r, l),
                (Vector { .. }, Matrix { .. }) => (Op::MatrixTimesVector, r, l),
                (Matrix { .. }, Scalar(_)) => (Op::MatrixTimesScalar, l, r),
                (Scalar(_), Matrix { .. }) => (Op::MatrixTimesScalar, r, l),
                _ => return self.internal(format!("'{}' * '{}'", lt, rt)),
            };
            return Some(self.code().binary(opcode, result, first, second));
        }

        let matrix_ty = if matches!(lt, Matrix { .. }) { lt } else { rt };
        let (base, rows, cols) = match matrix_ty {
            Matrix { base, rows, cols } => (*base, *rows, *cols),
            _ => return self.internal("matrix operation without a matrix"),
        };
        let column_ty = SymbolType::vector(base, cols);
        let column_id = self.type_id(&column_ty)?;

        // Scalars take part in every row.
        let lhs = self.matrix_operand(l, lt, base, cols)?;
        let rhs = self.matrix_operand(r, rt, base, cols)?;
        let mut rows_out = Vec::with_capacity(rows as usize);
        for row in 0..rows {
            let a = lhs.row(self, column_id, row);
            let b = rhs.row(self, column_id, row);
            rows_out.push(self.componentwise(op, a, b, &column_ty)?);
        }

        match op.bucket() {
            OperatorBucket::Equality => {
                let combine = if op == BinaryOp::Ne {
                    Op::LogicalOr
                } else {
                    Op::LogicalAnd
                };
                let bool_ty = self.scalar_type(ScalarKind::Bool);
                let mut rows_out = rows_out.into_iter();
                let first = rows_out.next()?;
                Some(rows_out.fold(first, |acc, row| {
                    self.code().binary(combine, bool_ty, acc, row)
                }))
            }
            OperatorBucket::Arithmetic => {
                let matrix_id = self.type_id(matrix_ty)?;
                Some(self.code().composite_construct(matrix_id, &rows_out))
            }
            _ => self.internal(format!("operator '{}' on '{}'", op, matrix_ty)),
        }
    }

    fn matrix_operand(
        &mut self,
        value: Id,
        ty: &SymbolType,
        base: ScalarKind,
        cols: u32,
    ) -> Option<MatrixOperand> {
        match ty {
            SymbolType::Matrix { .. } => Some(MatrixOperand::Matrix(value)),
            SymbolType::Scalar(_) => Some(MatrixOperand::Row(self.splat(value, base, cols)?)),
            _ => self.internal(format!("'{}' in a matrix operation", ty)),
        }
    }

    /// Vector of `size` copies of a scalar.
    pub(super) fn splat(&mut self, scalar: Id, kind: ScalarKind, size: u32) -> Option<Id> {
        let ty = self.type_id(&SymbolType::vector(kind, size))?;
        let parts = vec![scalar; size as usize];
        Some(self.code().composite_construct(ty, &parts))
    }

    /// A void call still yields a result id, which nothing reads.
    fn call(&mut self, callee: &Callee, args: &[TypedExpr], ty: &SymbolType) -> Option<Id> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.value(arg)?);
        }

        let (mixin, name, index, base) = match callee {
            Callee::Intrinsic { name, number } => {
                return self.intrinsic(name, *number, &values, args, ty);
            }
            Callee::Function {
                mixin,
                name,
                index,
                base,
            } => (mixin, name, *index, *base),
        };

        let plan = self.plan;
        let (owner, index) = if base {
            (mixin.as_str(), index)
        } else {
            plan.implementation(mixin, index)
        };
        let defined_here = owner == self.mixin.name
            && self
                .mixin
                .functions
                .get(index)
                .is_some_and(|function| function.body.is_some());
        let function = if defined_here {
            match self.functions.get(index) {
                Some(&function) => function,
                None => return self.internal(format!("function '{}' has no id", name)),
            }
        } else {
            let params: Vec<SymbolType> = args.iter().map(|arg| arg.ty.clone()).collect();
            self.import_function(function_symbol(owner, name, index), ty, &params)?
        };
        let ty = self.type_id(ty)?;
        Some(self.code().function_call(ty, function, &values))
    }

    fn intrinsic(
        &mut self,
        name: &str,
        number: u32,
        values: &[Id],
        args: &[TypedExpr],
        ty: &SymbolType,
    ) -> Option<Id> {
        match (name, values, args) {
            ("mul", &[l, r], [left, right]) => {
                self.binary(BinaryOp::Mul, (l, &left.ty), (r, &right.ty), ty)
            }
            ("dot", &[l, r], _) => {
                let ty = self.type_id(ty)?;
                Some(self.code().binary(Op::Dot, ty, l, r))
            }
            ("transpose", &[m], _) => {
                let ty = self.type_id(ty)?;
                Some(self.code().unary(Op::Transpose, ty, m))
            }
            _ => {
                let set = self.glsl();
                let ty = self.type_id(ty)?;
                Some(self.code().ext_inst(ty, set, number, values))
            }
        }
    }

    fn construct(&mut self, args: &[TypedExpr], ty: &SymbolType) -> Option<Id> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.value(arg)?);
        }
        let ty_id = self.type_id(ty)?;

        match ty {
            SymbolType::Vector { base, size } => {
                if let ([value], [arg]) = (values.as_slice(), args) {
                    if matches!(arg.ty, SymbolType::Scalar(_)) {
                        return self.splat(*value, *base, *size);
                    }
                }
                Some(self.code().composite_construct(ty_id, &values))
            }
            SymbolType::Matrix { base, rows, cols } => {
                let row_ty = SymbolType::vector(*base, *cols);
                let row_id = self.type_id(&row_ty)?;
                if args.len() == *rows as usize && args.iter().all(|arg| arg.ty == row_ty) {
                    return Some(self.code().composite_construct(ty_id, &values));
                }

                let mut scalars = Vec::new();
                for (value, arg) in values.iter().zip(args) {
                    self.flatten(*value, &arg.ty, &mut scalars)?;
                }
                let count = (rows * cols) as usize;
                if scalars.len() == 1 {
                    scalars = vec![scalars[0]; count];
                }
                if scalars.len() != count {
                    return self.internal(format!("wrong component count for '{}'", ty));
                }
                let rows: Vec<Id> = scalars
                    .chunks(*cols as usize)
                    .map(|row| self.code().composite_construct(row_id, row))
                    .collect();
                Some(self.code().composite_construct(ty_id, &rows))
            }
            SymbolType::Struct { .. } | SymbolType::Array { .. } => {
                Some(self.code().composite_construct(ty_id, &values))
            }
            _ => self.internal(format!("constructor of '{}'", ty)),
        }
    }

    /// Push the scalar components of `value`, in source order.
    fn flatten(&mut self, value: Id, ty: &SymbolType, out: &mut Vec<Id>) -> Option<()> {
        match ty {
            SymbolType::Scalar(_) => out.push(value),
            SymbolType::Vector { base, size } => {
                let scalar = self.scalar_type(*base);
                for lane in 0..*size {
                    out.push(self.code().composite_extract(scalar, value, &[lane]));
                }
            }
            SymbolType::Matrix { base, rows, cols } => {
                let scalar = self.scalar_type(*base);
                for row in 0..*rows {
                    for col in 0..*cols {
                        out.push(self.code().composite_extract(scalar, value, &[row, col]));
                    }
                }
            }
            _ => return self.internal(format!("'{}' has no components", ty)),
        }
        Some(())
    }

    /// Convert `value` from `from` to `to`. Scalars broadcast into vectors.
    fn convert(&mut self, value: Id, from: &SymbolType, to: &SymbolType) -> Option<Id> {
        if from == to {
            return Some(value);
        }
        let (Some(source), Some(target)) = (from.scalar_kind(), to.scalar_kind()) else {
            return self.unsupported(format!("conversion from '{}' to '{}'", from, to));
        };

        match (from, to) {
            (SymbolType::Scalar(_), SymbolType::Vector { size, .. }) => {
                let scalar = self.convert(value, from, &SymbolType::Scalar(target))?;
                self.splat(scalar, target, *size)
            }
            (SymbolType::Matrix { rows, cols, .. }, SymbolType::Matrix { .. }) => {
                let from_row = SymbolType::vector(source, *cols);
                let to_row = SymbolType::vector(target, *cols);
                let from_row_id = self.type_id(&from_row)?;
                let matrix_id = self.type_id(to)?;
                let mut converted = Vec::with_capacity(*rows as usize);
                for row in 0..*rows {
                    let part = self.code().composite_extract(from_row_id, value, &[row]);
                    converted.push(self.convert(part, &from_row, &to_row)?);
                }
                Some(self.code().composite_construct(matrix_id, &converted))
            }
            _ if from.component_count() == to.component_count() => {
                self.convert_elements(value, from, source, target)
            }
            _ => self.unsupported(format!("conversion from '{}' to '{}'", from, to)),
        }
    }

    /// Element kind change of a scalar or vector.
    fn convert_elements(
        &mut self,
        value: Id,
        shape: &SymbolType,
        source: ScalarKind,
        target: ScalarKind,
    ) -> Option<Id> {
        if source == ScalarKind::Bool || target == ScalarKind::Bool {
            return self.unsupported(format!(
                "conversion between '{}' and '{}'",
                source.name(),
                target.name()
            ));
        }
        let to = self.type_id(&shape.with_base(target))?;

        if source.is_floating() || target.is_floating() {
            let opcode = match (source.is_floating(), target.is_floating()) {
                (true, true) => Op::FConvert,
                (true, false) if target.is_signed() => Op::ConvertFToS,
                (true, false) => Op::ConvertFToU,
                (false, _) if source.is_signed() => Op::ConvertSToF,
                (false, _) => Op::ConvertUToF,
            };
            return Some(self.code().unary(opcode, to, value));
        }

        // Integers change width first, keeping the source signedness, then
        // reinterpret.
        let mut value = value;
        let mut current = source;
        if source.bit_width() != target.bit_width() {
            current = integer_kind(source.is_signed(), target.bit_width());
            let widened = self.type_id(&shape.with_base(current))?;
            let opcode = if source.is_signed() {
                Op::SConvert
            } else {
                Op::UConvert
            };
            value = self.code().unary(opcode, widened, value);
        }
        if current != target {
            value = self.code().unary(Op::Bitcast, to, value);
        }
        Some(value)
    }
}

/// Operand of a row-by-row matrix operation.
enum MatrixOperand {
    Matrix(Id),
    /// Same row for every row index
    Row(Id),
}

impl MatrixOperand {
    fn row(&self, lowerer: &mut Lowerer<'_>, row_ty: Id, row: u32) -> Id {
        match self {
            MatrixOperand::Matrix(matrix) => lowerer.code().composite_extract(row_ty, *matrix, &[row]),
            MatrixOperand::Row(value) => *value,
        }
    }
}

fn integer_kind(signed: bool, width: u32) -> ScalarKind {
    match (signed, width) {
        (true, 64) => ScalarKind::Long,
        (true, _) => ScalarKind::Int,
        (false, 64) => ScalarKind::ULong,
        (false, _) => ScalarKind::UInt,
    }
}

/// Opcode for a scalar or vector operation on elements of `kind`.
pub(crate) fn component_op(op: BinaryOp, kind: ScalarKind) -> Op {
    let float = kind.is_floating();
    let signed = kind.is_signed();
    let boolean = kind == ScalarKind::Bool;
    match op {
        BinaryOp::Add if float => Op::FAdd,
        BinaryOp::Add => Op::IAdd,
        BinaryOp::Sub if float => Op::FSub,
        BinaryOp::Sub => Op::ISub,
        BinaryOp::Mul if float => Op::FMul,
        BinaryOp::Mul => Op::IMul,
        BinaryOp::Div if float => Op::FDiv,
        BinaryOp::Div if signed => Op::SDiv,
        BinaryOp::Div => Op::UDiv,
        BinaryOp::Mod if float => Op::FRem,
        BinaryOp::Mod if signed => Op::SRem,
        BinaryOp::Mod => Op::UMod,
        BinaryOp::Shl => Op::ShiftLeftLogical,
        BinaryOp::Shr if signed => Op::ShiftRightArithmetic,
        BinaryOp::Shr => Op::ShiftRightLogical,
        BinaryOp::BitAnd => Op::BitwiseAnd,
        BinaryOp::BitOr => Op::BitwiseOr,
        BinaryOp::BitXor => Op::BitwiseXor,
        BinaryOp::Lt if float => Op::FOrdLessThan,
        BinaryOp::Lt if signed => Op::SLessThan,
        BinaryOp::Lt => Op::ULessThan,
        BinaryOp::Le if float => Op::FOrdLessThanEqual,
        BinaryOp::Le if signed => Op::SLessThanEqual,
        BinaryOp::Le => Op::ULessThanEqual,
        BinaryOp::Gt if float => Op::FOrdGreaterThan,
        BinaryOp::Gt if signed => Op::SGreaterThan,
        BinaryOp::Gt => Op::UGreaterThan,
        BinaryOp::Ge if float => Op::FOrdGreaterThanEqual,
        BinaryOp::Ge if signed => Op::SGreaterThanEqual,
        BinaryOp::Ge => Op::UGreaterThanEqual,
        BinaryOp::Eq if boolean => Op::LogicalEqual,
        BinaryOp::Eq if float => Op::FOrdEqual,
        BinaryOp::Eq => Op::IEqual,
        BinaryOp::Ne if boolean => Op::LogicalNotEqual,
        BinaryOp::Ne if float => Op::FOrdNotEqual,
        BinaryOp::Ne => Op::INotEqual,
        BinaryOp::LogicalAnd => Op::LogicalAnd,
        BinaryOp::LogicalOr => Op::LogicalOr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_op_follows_element_kind() {
        assert_eq!(component_op(BinaryOp::Div, ScalarKind::Float), Op::FDiv);
        assert_eq!(component_op(BinaryOp::Div, ScalarKind::Int), Op::SDiv);
        assert_eq!(component_op(BinaryOp::Div, ScalarKind::UInt), Op::UDiv);
        assert_eq!(component_op(BinaryOp::Mod, ScalarKind::Double), Op::FRem);
        assert_eq!(component_op(BinaryOp::Shr, ScalarKind::Long), Op::ShiftRightArithmetic);
        assert_eq!(component_op(BinaryOp::Shr, ScalarKind::ULong), Op::ShiftRightLogical);
        assert_eq!(component_op(BinaryOp::Lt, ScalarKind::UInt), Op::ULessThan);
        assert_eq!(component_op(BinaryOp::Eq, ScalarKind::Bool), Op::LogicalEqual);
        assert_eq!(component_op(BinaryOp::Ne, ScalarKind::Float), Op::FOrdNotEqual);
    }

    #[test]
    fn test_integer_kind() {
        assert_eq!(integer_kind(true, 64), ScalarKind::Long);
        assert_eq!(integer_kind(false, 32), ScalarKind::UInt);
    }
}
