//! Expression typing.

use super::body::Body;
use super::lookup_type;
use crate::error::ErrorKind;
use crate::resolve::operators::{binary_operation_resulting_type, operand_kind};
use crate::resolve::symbols::{Symbol, SymbolKind, SymbolTable};
use crate::resolve::typed::{Callee, Constant, TypedExpr, TypedExprKind};
use crate::resolve::types::{ScalarKind, SymbolType};
use sdsl_ast::{
    BinaryOp, Expr, ExprKind, FloatSuffix, IntSuffix, Literal, Span, UnaryOp,
};

/// Swizzle component sets; letters from different sets cannot mix.
const SWIZZLE_SETS: [&str; 2] = ["xyzw", "rgba"];

impl Body<'_> {
    pub(super) fn expr(&mut self, table: &SymbolTable, expr: &Expr) -> TypedExpr {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(literal) => self.literal(literal, span),
            ExprKind::Identifier(name) => self.identifier(table, name, span),
            ExprKind::Unary { op, operand } => {
                let operand = self.expr(table, operand);
                self.unary(*op, operand, span)
            }
            ExprKind::PostIncrement { operand, decrement } => {
                let operand = self.expr(table, operand);
                self.step(operand, !decrement, false, span)
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.expr(table, left);
                let right = self.expr(table, right);
                self.binary(*op, left, right, span)
            }
            ExprKind::Ternary {
                condition,
                then,
                otherwise,
            } => self.ternary(table, condition, then, otherwise, span),
            ExprKind::Call {
                qualifier,
                name,
                args,
            } => {
                let args: Vec<TypedExpr> = args.iter().map(|arg| self.expr(table, arg)).collect();
                self.call(table, qualifier.as_deref(), name, args, span)
            }
            ExprKind::Member { object, member } => self.member(table, object, member, span),
            ExprKind::Index { object, index } => {
                let value = self.expr(table, object);
                let index = self.expr(table, index);
                self.index(value, index, span)
            }
            ExprKind::Error => TypedExpr::error(span),
        }
    }

    fn literal(&mut self, literal: &Literal, span: Span) -> TypedExpr {
        let (constant, ty) = match literal {
            Literal::Bool(value) => (Constant::Bool(*value), SymbolType::BOOL),
            Literal::Int { value, suffix } => {
                let value = *value;
                let (constant, ty, max) = match suffix {
                    // Past `int`, an unsuffixed literal keeps its bits as `uint`.
                    IntSuffix::None if value <= i32::MAX as u64 => {
                        (Constant::Int(value as i64), SymbolType::INT, u64::MAX)
                    }
                    IntSuffix::None => {
                        (Constant::UInt(value), SymbolType::UINT, u64::from(u32::MAX))
                    }
                    IntSuffix::Unsigned => {
                        (Constant::UInt(value), SymbolType::UINT, u64::from(u32::MAX))
                    }
                    IntSuffix::Long => (
                        Constant::Int(value as i64),
                        SymbolType::Scalar(ScalarKind::Long),
                        i64::MAX as u64,
                    ),
                    IntSuffix::UnsignedLong => (
                        Constant::UInt(value),
                        SymbolType::Scalar(ScalarKind::ULong),
                        u64::MAX,
                    ),
                };
                if value > max {
                    let target = if *suffix == IntSuffix::None {
                        "int".to_string()
                    } else {
                        ty.to_string()
                    };
                    self.error(
                        ErrorKind::TypeMismatch,
                        span,
                        format!("literal {} out of range for {}", value, target),
                    );
                    return TypedExpr::error(span);
                }
                (constant, ty)
            }
            Literal::Float { value, suffix } => match suffix {
                FloatSuffix::Double => (
                    Constant::Float(*value),
                    SymbolType::Scalar(ScalarKind::Double),
                ),
                FloatSuffix::None | FloatSuffix::Float => {
                    (Constant::Float(*value), SymbolType::FLOAT)
                }
            },
            Literal::String(_) => {
                self.error(
                    ErrorKind::TypeMismatch,
                    span,
                    "string literals cannot be used as values".to_string(),
                );
                return TypedExpr::error(span);
            }
        };
        TypedExpr::new(TypedExprKind::Constant(constant), ty, span)
    }

    /// Typed reference to a variable, composition or mixin symbol.
    fn reference(symbol: &Symbol, span: Span) -> TypedExpr {
        let kind = match (symbol.kind, symbol.slot, &symbol.mixin) {
            (SymbolKind::Variable, Some(slot), _) => TypedExprKind::Local(slot),
            (SymbolKind::Variable, None, Some(mixin)) => TypedExprKind::Global {
                mixin: mixin.clone(),
                name: symbol.name.clone(),
                stream: false,
            },
            (_, _, _) => match &symbol.ty {
                SymbolType::Mixin { name } => TypedExprKind::MixinRef(name.clone()),
                _ => TypedExprKind::Error,
            },
        };
        TypedExpr::new(kind, symbol.ty.clone(), span)
    }

    fn identifier(&mut self, table: &SymbolTable, name: &str, span: Span) -> TypedExpr {
        if let Some(symbol) = table.try_find(name, SymbolKind::Variable) {
            return Self::reference(symbol, span);
        }
        if let Some(symbol) = table.try_find(name, SymbolKind::Composition) {
            return Self::reference(symbol, span);
        }
        if self.mixins.contains_key(name) {
            return TypedExpr::new(
                TypedExprKind::MixinRef(name.to_string()),
                SymbolType::Mixin {
                    name: name.to_string(),
                },
                span,
            );
        }

        let message = match name {
            "streams" => "'streams' can only be used to access a stream member".to_string(),
            "base" => "'base' can only be used to call an inherited method".to_string(),
            _ => format!("undefined name '{}'", name),
        };
        self.error(ErrorKind::UndefinedName, span, message);
        TypedExpr::error(span)
    }

    fn unary(&mut self, op: UnaryOp, operand: TypedExpr, span: Span) -> TypedExpr {
        if operand.ty.is_unknown() {
            return TypedExpr::new(
                TypedExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                SymbolType::Unknown,
                span,
            );
        }

        let kind = operand.ty.scalar_kind();
        let legal = match op {
            UnaryOp::Neg | UnaryOp::Plus => kind.is_some_and(ScalarKind::is_numeric),
            UnaryOp::Not => kind == Some(ScalarKind::Bool)
                && !matches!(operand.ty, SymbolType::Matrix { .. }),
            UnaryOp::BitNot => kind.is_some_and(ScalarKind::is_integral),
            UnaryOp::PreIncrement => return self.step(operand, true, true, span),
            UnaryOp::PreDecrement => return self.step(operand, false, true, span),
        };
        if !legal {
            self.error(
                ErrorKind::InvalidOperator,
                span,
                format!("operator '{}' cannot be applied to '{}'", op, operand.ty),
            );
            return TypedExpr::error(span);
        }
        if op == UnaryOp::Plus {
            return operand;
        }

        let ty = operand.ty.clone();
        TypedExpr::new(
            TypedExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            span,
        )
    }

    fn step(&mut self, target: TypedExpr, increment: bool, prefix: bool, span: Span) -> TypedExpr {
        let numeric = target.ty.is_unknown()
            || (target.ty.scalar_kind().is_some_and(ScalarKind::is_numeric)
                && !matches!(target.ty, SymbolType::Matrix { .. }));
        if !numeric {
            self.error(
                ErrorKind::InvalidOperator,
                span,
                format!(
                    "operator '{}' cannot be applied to '{}'",
                    if increment { "++" } else { "--" },
                    target.ty
                ),
            );
            return TypedExpr::error(span);
        }
        if !target.is_lvalue() {
            self.error(
                ErrorKind::TypeMismatch,
                target.span,
                "operand of increment or decrement is not assignable".to_string(),
            );
        }

        let ty = target.ty.clone();
        TypedExpr::new(
            TypedExprKind::Step {
                target: Box::new(target),
                increment,
                prefix,
            },
            ty,
            span,
        )
    }

    /// Type `left op right`, converting both operands to the operator's
    /// element kind.
    pub(super) fn binary(
        &mut self,
        op: BinaryOp,
        left: TypedExpr,
        right: TypedExpr,
        span: Span,
    ) -> TypedExpr {
        let Some(ty) = binary_operation_resulting_type(&left.ty, &right.ty, op) else {
            self.error(
                ErrorKind::InvalidOperator,
                span,
                format!(
                    "operator '{}' cannot be applied to '{}' and '{}'",
                    op, left.ty, right.ty
                ),
            );
            return TypedExpr::error(span);
        };

        let (left, right) = match operand_kind(&left.ty, &right.ty, op) {
            Some(kind) => {
                let left_ty = left.ty.with_base(kind);
                let right_ty = right.ty.with_base(kind);
                (convert(left, left_ty), convert(right, right_ty))
            }
            None => (left, right),
        };

        TypedExpr::new(
            TypedExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
            span,
        )
    }

    fn ternary(
        &mut self,
        table: &SymbolTable,
        condition: &Expr,
        then: &Expr,
        otherwise: &Expr,
        span: Span,
    ) -> TypedExpr {
        let condition = self.condition(table, condition);
        let then = self.expr(table, then);
        let otherwise = self.expr(table, otherwise);

        let ty = if then.ty.is_unknown() || otherwise.ty.is_unknown() {
            SymbolType::Unknown
        } else if then.ty == otherwise.ty || then.ty.converts_to(&otherwise.ty) {
            otherwise.ty.clone()
        } else if otherwise.ty.converts_to(&then.ty) {
            then.ty.clone()
        } else {
            self.error(
                ErrorKind::TypeMismatch,
                span,
                format!(
                    "branches of '?:' have incompatible types '{}' and '{}'",
                    then.ty, otherwise.ty
                ),
            );
            return TypedExpr::error(span);
        };

        let then = convert(then, ty.clone());
        let otherwise = convert(otherwise, ty.clone());
        TypedExpr::new(
            TypedExprKind::Ternary {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            ty,
            span,
        )
    }

    /// Convert `value` to `target`, reporting a mismatch.
    pub(super) fn coerce(&mut self, value: TypedExpr, target: &SymbolType, context: &str) -> TypedExpr {
        if value.ty.converts_to(target) {
            return convert(value, target.clone());
        }
        self.error(
            ErrorKind::TypeMismatch,
            value.span,
            format!(
                "cannot convert '{}' to '{}' in {}",
                value.ty, target, context
            ),
        );
        TypedExpr::error(value.span)
    }

    fn call(
        &mut self,
        table: &SymbolTable,
        qualifier: Option<&str>,
        name: &str,
        args: Vec<TypedExpr>,
        span: Span,
    ) -> TypedExpr {
        let candidates: Vec<Symbol> = match qualifier {
            None => {
                if let Some(ty) = lookup_type(table, name).filter(|ty| !matches!(ty, SymbolType::Mixin { .. })) {
                    return self.construct(ty, name, args, span);
                }
                table.find_functions(name).into_iter().cloned().collect()
            }
            Some("base") => {
                let found = self.inherited_functions(self.ancestors, name);
                if found.is_empty() {
                    self.error(
                        ErrorKind::UndefinedName,
                        span,
                        format!(
                            "no base mixin of '{}' defines a method '{}'",
                            self.mixin, name
                        ),
                    );
                    return TypedExpr::error(span);
                }
                found
            }
            Some(qualifier) => {
                let Some(mixin) = self.qualifier_mixin(table, qualifier, span) else {
                    return TypedExpr::error(span);
                };
                let found = self.mixin_functions(&mixin, name);
                if found.is_empty() {
                    self.error(
                        ErrorKind::UndefinedName,
                        span,
                        format!("mixin '{}' has no method '{}'", mixin, name),
                    );
                    return TypedExpr::error(span);
                }
                found
            }
        };

        if candidates.is_empty() {
            self.error(
                ErrorKind::UndefinedName,
                span,
                format!("undefined function '{}'", name),
            );
            return TypedExpr::error(span);
        }

        let Some(symbol) = self.select_overload(name, &candidates, &args, span) else {
            return TypedExpr::error(span);
        };
        let Some((ret, params)) = symbol.signature() else {
            return TypedExpr::error(span);
        };

        let args = args
            .into_iter()
            .zip(params)
            .map(|(arg, param)| self.coerce(arg, param, "argument"))
            .collect();

        let callee = match (symbol.intrinsic, &symbol.mixin) {
            (Some(number), _) => Callee::Intrinsic {
                name: symbol.name.clone(),
                number,
            },
            (None, Some(mixin)) => Callee::Function {
                mixin: mixin.clone(),
                name: symbol.name.clone(),
                index: symbol.slot.unwrap_or_default() as usize,
                base: qualifier == Some("base"),
            },
            (None, None) => {
                self.error(
                    ErrorKind::Internal,
                    span,
                    format!("function '{}' has no owner", name),
                );
                return TypedExpr::error(span);
            }
        };

        TypedExpr::new(TypedExprKind::Call { callee, args }, ret.clone(), span)
    }

    /// Pick the overload matching `args`: exact match first, then the
    /// first candidate every argument converts to.
    fn select_overload<'s>(
        &mut self,
        name: &str,
        candidates: &'s [Symbol],
        args: &[TypedExpr],
        span: Span,
    ) -> Option<&'s Symbol> {
        let arity: Vec<&Symbol> = candidates
            .iter()
            .filter(|symbol| symbol.signature().is_some_and(|(_, p)| p.len() == args.len()))
            .collect();

        if arity.is_empty() {
            let message = match candidates {
                [single] => format!(
                    "'{}' expects {} argument(s), got {}",
                    name,
                    single.signature().map_or(0, |(_, p)| p.len()),
                    args.len()
                ),
                _ => format!("no overload of '{}' takes {} argument(s)", name, args.len()),
            };
            self.error(ErrorKind::WrongArgCount, span, message);
            return None;
        }

        let exact = arity.iter().find(|symbol| {
            params_of(symbol)
                .iter()
                .zip(args)
                .all(|(param, arg)| arg.ty.is_unknown() || &arg.ty == param)
        });
        let chosen = exact.or_else(|| {
            arity.iter().find(|symbol| {
                params_of(symbol)
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| arg.ty.converts_to(param))
            })
        });

        if chosen.is_none() {
            let found: Vec<String> = args.iter().map(|arg| arg.ty.to_string()).collect();
            self.error(
                ErrorKind::TypeMismatch,
                span,
                format!(
                    "no overload of '{}' accepts ({})",
                    name,
                    found.join(", ")
                ),
            );
        }
        chosen.copied()
    }

    /// Mixin named by a call or member qualifier.
    fn qualifier_mixin(&mut self, table: &SymbolTable, qualifier: &str, span: Span) -> Option<String> {
        if let Some(symbol) = table.try_find(qualifier, SymbolKind::Composition) {
            if let SymbolType::Mixin { name } = &symbol.ty {
                return Some(name.clone());
            }
        }
        if self.mixins.contains_key(qualifier) {
            return Some(qualifier.to_string());
        }
        if table.try_find(qualifier, SymbolKind::Variable).is_some() {
            self.error(
                ErrorKind::InvalidMember,
                span,
                format!("'{}' is not a mixin or composition", qualifier),
            );
        } else {
            self.error(
                ErrorKind::UnresolvedMixin,
                span,
                format!("unknown mixin '{}' referenced from '{}'", qualifier, self.mixin),
            );
        }
        None
    }

    /// Functions named `name` in the first of `mixins` that declares any.
    fn inherited_functions(&self, mixins: &[String], name: &str) -> Vec<Symbol> {
        mixins
            .iter()
            .filter_map(|mixin| self.mixins.get(mixin))
            .map(|info| {
                info.functions
                    .iter()
                    .filter(|f| f.name == name)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    /// Functions of `mixin` or, failing that, of its nearest ancestor.
    fn mixin_functions(&self, mixin: &str, name: &str) -> Vec<Symbol> {
        let (ancestors, _) = super::ancestors(self.mixins, mixin);
        let mut chain = vec![mixin.to_string()];
        chain.extend(ancestors);
        self.inherited_functions(&chain, name)
    }

    /// `float4(...)`, `float(x)`, `Light(...)`.
    fn construct(&mut self, ty: SymbolType, name: &str, args: Vec<TypedExpr>, span: Span) -> TypedExpr {
        if args.iter().any(|arg| arg.ty.is_unknown()) {
            return TypedExpr::new(TypedExprKind::Construct(args), ty, span);
        }

        if let SymbolType::Struct { fields, .. } = &ty {
            if fields.len() != args.len() {
                self.error(
                    ErrorKind::WrongArgCount,
                    span,
                    format!(
                        "constructor of '{}' expects {} argument(s), got {}",
                        name,
                        fields.len(),
                        args.len()
                    ),
                );
                return TypedExpr::error(span);
            }
            let args = args
                .into_iter()
                .zip(fields)
                .map(|(arg, (_, field))| self.coerce(arg, field, "constructor argument"))
                .collect();
            return TypedExpr::new(TypedExprKind::Construct(args), ty, span);
        }

        let (Some(base), Some(expected)) = (ty.scalar_kind(), ty.component_count()) else {
            self.error(
                ErrorKind::TypeMismatch,
                span,
                format!("type '{}' cannot be constructed", name),
            );
            return TypedExpr::error(span);
        };

        let mut provided = 0;
        for arg in &args {
            let compatible = match arg.ty.scalar_kind() {
                Some(kind) => (kind == ScalarKind::Bool) == (base == ScalarKind::Bool),
                None => false,
            };
            if !compatible {
                self.error(
                    ErrorKind::TypeMismatch,
                    arg.span,
                    format!("cannot use '{}' to construct '{}'", arg.ty, ty),
                );
                return TypedExpr::error(span);
            }
            provided += arg.ty.component_count().unwrap_or(0);
        }

        let splat = args.len() == 1 && provided == 1;
        if !splat && provided != expected {
            self.error(
                ErrorKind::WrongArgCount,
                span,
                format!(
                    "constructor of '{}' expects {} component(s), got {}",
                    ty, expected, provided
                ),
            );
            return TypedExpr::error(span);
        }

        // Scalar casts are plain conversions.
        if matches!(ty, SymbolType::Scalar(_)) {
            let mut args = args;
            if let Some(arg) = args.pop() {
                let mut converted = convert(arg, ty);
                converted.span = span;
                return converted;
            }
            return TypedExpr::error(span);
        }

        let args = args
            .into_iter()
            .map(|arg| {
                let target = arg.ty.with_base(base);
                convert(arg, target)
            })
            .collect();
        TypedExpr::new(TypedExprKind::Construct(args), ty, span)
    }

    fn member(&mut self, table: &SymbolTable, object: &Expr, member: &str, span: Span) -> TypedExpr {
        if object.as_identifier() == Some("streams")
            && table.try_find("streams", SymbolKind::Variable).is_none()
        {
            return self.stream(table, member, span);
        }

        let value = self.expr(table, object);
        match &value.ty {
            SymbolType::Unknown => TypedExpr::error(span),
            SymbolType::Vector { base, size } => {
                let (base, size) = (*base, *size);
                match swizzle(member, size) {
                    Some(components) => {
                        let ty = SymbolType::vector(base, components.len() as u32);
                        TypedExpr::new(
                            TypedExprKind::Swizzle {
                                value: Box::new(value),
                                components,
                            },
                            ty,
                            span,
                        )
                    }
                    None => {
                        self.error(
                            ErrorKind::InvalidMember,
                            span,
                            format!("invalid swizzle '{}' on '{}'", member, value.ty),
                        );
                        TypedExpr::error(span)
                    }
                }
            }
            SymbolType::Struct { .. } => match value.ty.field(member) {
                Some((index, field_ty)) => {
                    let field_ty = field_ty.clone();
                    TypedExpr::new(
                        TypedExprKind::Field {
                            value: Box::new(value),
                            index: index as u32,
                        },
                        field_ty,
                        span,
                    )
                }
                None => {
                    self.error(
                        ErrorKind::InvalidMember,
                        span,
                        format!("struct '{}' has no field '{}'", value.ty, member),
                    );
                    TypedExpr::error(span)
                }
            },
            SymbolType::Mixin { name } => {
                let mixin = name.clone();
                self.mixin_member(&mixin, member, span)
            }
            other => {
                self.error(
                    ErrorKind::InvalidMember,
                    span,
                    format!("type '{}' has no member '{}'", other, member),
                );
                TypedExpr::error(span)
            }
        }
    }

    /// `streams.X`
    fn stream(&mut self, table: &SymbolTable, member: &str, span: Span) -> TypedExpr {
        let Some(symbol) = table.find_stream(member) else {
            self.error(
                ErrorKind::UndefinedName,
                span,
                format!("undefined stream '{}'", member),
            );
            return TypedExpr::error(span);
        };

        // A mixin declaring the stream itself owns its own copy.
        let declares_own = self
            .mixins
            .get(self.mixin)
            .is_some_and(|info| info.streams.iter().any(|s| s == member));
        let owner = if declares_own {
            self.mixin.to_string()
        } else {
            symbol.mixin.clone().unwrap_or_default()
        };

        TypedExpr::new(
            TypedExprKind::Global {
                mixin: owner,
                name: member.to_string(),
                stream: true,
            },
            symbol.ty.clone(),
            span,
        )
    }

    /// `Mixin.X` or `composition.X`: a global of that mixin or its ancestors.
    fn mixin_member(&mut self, mixin: &str, member: &str, span: Span) -> TypedExpr {
        let mixins = self.mixins;
        let (ancestors, _) = super::ancestors(mixins, mixin);
        let found = std::iter::once(mixin.to_string())
            .chain(ancestors)
            .filter_map(|name| mixins.get(&name))
            .find_map(|info| info.globals.get(member));

        match found {
            Some(symbol) => Self::reference(symbol, span),
            None => {
                self.error(
                    ErrorKind::InvalidMember,
                    span,
                    format!("mixin '{}' has no member '{}'", mixin, member),
                );
                TypedExpr::error(span)
            }
        }
    }

    fn index(&mut self, value: TypedExpr, index: TypedExpr, span: Span) -> TypedExpr {
        if !index.ty.is_unknown()
            && !matches!(&index.ty, SymbolType::Scalar(kind) if kind.is_integral())
        {
            self.error(
                ErrorKind::TypeMismatch,
                index.span,
                format!("index must be an integer, found '{}'", index.ty),
            );
            return TypedExpr::error(span);
        }

        let ty = match &value.ty {
            SymbolType::Unknown => SymbolType::Unknown,
            SymbolType::Array { element, .. } => (**element).clone(),
            SymbolType::Vector { base, .. } => SymbolType::Scalar(*base),
            SymbolType::Matrix { base, cols, .. } => SymbolType::vector(*base, *cols),
            other => {
                self.error(
                    ErrorKind::TypeMismatch,
                    span,
                    format!("type '{}' cannot be indexed", other),
                );
                return TypedExpr::error(span);
            }
        };

        TypedExpr::new(
            TypedExprKind::Index {
                value: Box::new(value),
                index: Box::new(index),
            },
            ty,
            span,
        )
    }
}

fn params_of(symbol: &Symbol) -> &[SymbolType] {
    match symbol.signature() {
        Some((_, params)) => params,
        None => &[],
    }
}

/// Wrap `value` in a conversion node unless it already has type `target`.
fn convert(value: TypedExpr, target: SymbolType) -> TypedExpr {
    if value.ty == target || value.ty.is_unknown() || target.is_unknown() {
        return value;
    }
    let span = value.span;
    TypedExpr::new(TypedExprKind::Convert(Box::new(value)), target, span)
}

/// Component indices of a swizzle on a vector of `size` elements.
fn swizzle(member: &str, size: u32) -> Option<Vec<u32>> {
    if member.is_empty() || member.len() > 4 {
        return None;
    }
    SWIZZLE_SETS.iter().find_map(|set| {
        member
            .chars()
            .map(|c| set.find(c).map(|i| i as u32).filter(|&i| i < size))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swizzle_components() {
        assert_eq!(swizzle("xyz", 4), Some(vec![0, 1, 2]));
        assert_eq!(swizzle("rgba", 4), Some(vec![0, 1, 2, 3]));
        assert_eq!(swizzle("wx", 4), Some(vec![3, 0]));
        assert_eq!(swizzle("z", 2), None);
        assert_eq!(swizzle("xg", 4), None);
        assert_eq!(swizzle("xxxxx", 4), None);
        assert_eq!(swizzle("q", 4), None);
    }

    #[test]
    fn test_convert_skips_identity() {
        let value = TypedExpr::new(
            TypedExprKind::Constant(Constant::Int(1)),
            SymbolType::INT,
            Span::zero(0),
        );
        assert_eq!(convert(value.clone(), SymbolType::INT), value);
        let converted = convert(value, SymbolType::FLOAT);
        assert_eq!(converted.ty, SymbolType::FLOAT);
        assert!(matches!(converted.kind, TypedExprKind::Convert(_)));
    }
}
