//! Types, pointers and constants, each declared once per mixin.

use super::Lowerer;
use sdsl_ast::UnaryOp;
use sdsl_resolve::typed::{Constant, TypedExpr, TypedExprKind};
use sdsl_resolve::{ScalarKind, SymbolType};
use sdsl_spirv::spirv::{Capability, StorageClass};
use sdsl_spirv::Id;

impl Lowerer<'_> {
    /// Id of `ty`, declaring it (and its parts) on first use.
    ///
    /// `floatRxC` becomes a matrix of `R` columns of `floatC`, so that a
    /// source row is a SPIR-V column and `m[i]` is a single access.
    pub(super) fn type_id(&mut self, ty: &SymbolType) -> Option<Id> {
        if let Some(&id) = self.types.get(ty) {
            return Some(id);
        }

        let id = match ty {
            SymbolType::Void => self.decl().type_void(),
            SymbolType::Scalar(kind) => return Some(self.scalar_type(*kind)),
            SymbolType::Vector { base, size } => {
                let component = self.scalar_type(*base);
                self.decl().type_vector(component, *size)
            }
            SymbolType::Matrix { base, rows, cols } => {
                if !base.is_floating() || *rows < 2 || *cols < 2 {
                    return self.unsupported(format!("matrix type '{}'", ty));
                }
                let column = self.type_id(&SymbolType::vector(*base, *cols))?;
                self.decl().type_matrix(column, *rows)
            }
            SymbolType::Struct { name, fields } => {
                let mut members = Vec::with_capacity(fields.len());
                for (_, field) in fields {
                    members.push(self.type_id(field)?);
                }
                let id = self.decl().type_struct(&members);
                self.decl().name(id, name);
                for (index, (field, _)) in fields.iter().enumerate() {
                    self.decl().member_name(id, index as u32, field);
                }
                id
            }
            SymbolType::Array {
                element,
                length: Some(length),
            } => {
                let element = self.type_id(element)?;
                let length = self.constant_u32(*length);
                self.decl().type_array(element, length)
            }
            SymbolType::Array { length: None, .. } => {
                return self.unsupported(format!("unsized array '{}'", ty));
            }
            SymbolType::Function { .. } | SymbolType::Mixin { .. } | SymbolType::Unknown => {
                return self.internal(format!("type '{}' has no runtime representation", ty));
            }
        };

        self.types.insert(ty.clone(), id);
        Some(id)
    }

    pub(super) fn scalar_type(&mut self, kind: ScalarKind) -> Id {
        let key = SymbolType::Scalar(kind);
        if let Some(&id) = self.types.get(&key) {
            return id;
        }

        let id = match kind {
            ScalarKind::Bool => self.decl().type_bool(),
            ScalarKind::Int => self.decl().type_int(32, true),
            ScalarKind::UInt => self.decl().type_int(32, false),
            ScalarKind::Long => {
                self.require(Capability::Int64);
                self.decl().type_int(64, true)
            }
            ScalarKind::ULong => {
                self.require(Capability::Int64);
                self.decl().type_int(64, false)
            }
            ScalarKind::Float => self.decl().type_float(32),
            ScalarKind::Double => {
                self.require(Capability::Float64);
                self.decl().type_float(64)
            }
        };
        self.types.insert(key, id);
        id
    }

    pub(super) fn pointer_type(&mut self, storage: StorageClass, pointee: Id) -> Id {
        let key = (storage as u32, pointee);
        if let Some(&id) = self.pointers.get(&key) {
            return id;
        }
        let id = self.decl().type_pointer(storage, pointee);
        self.pointers.insert(key, id);
        id
    }

    pub(super) fn function_type(&mut self, ret: Id, params: &[Id]) -> Id {
        let key = (ret, params.to_vec());
        if let Some(&id) = self.function_types.get(&key) {
            return id;
        }
        let id = self.decl().type_function(ret, params);
        self.function_types.insert(key, id);
        id
    }

    /// Scalar constant of `kind`; `value` is converted to it first.
    pub(super) fn scalar_constant(&mut self, kind: ScalarKind, value: Constant) -> Id {
        let ty = self.scalar_type(kind);
        let bits = constant_bits(kind, value);
        if let Some(&id) = self.constants.get(&(ty, bits)) {
            return id;
        }

        let id = match kind {
            ScalarKind::Bool if bits != 0 => self.decl().constant_true(ty),
            ScalarKind::Bool => self.decl().constant_false(ty),
            ScalarKind::Int | ScalarKind::UInt => self.decl().constant_u32(ty, bits as u32),
            ScalarKind::Long | ScalarKind::ULong => self.decl().constant_u64(ty, bits),
            ScalarKind::Float => self.decl().constant_f32(ty, f32::from_bits(bits as u32)),
            ScalarKind::Double => self.decl().constant_f64(ty, f64::from_bits(bits)),
        };
        self.constants.insert((ty, bits), id);
        id
    }

    pub(super) fn constant_u32(&mut self, value: u32) -> Id {
        self.scalar_constant(ScalarKind::UInt, Constant::UInt(u64::from(value)))
    }

    pub(super) fn composite_constant(&mut self, ty: Id, parts: Vec<Id>) -> Id {
        let key = (ty, parts);
        if let Some(&id) = self.composites.get(&key) {
            return id;
        }
        let id = self.decl().constant_composite(ty, &key.1);
        self.composites.insert(key, id);
        id
    }

    /// Constant of scalar, vector or matrix type `ty` from its components
    /// in source order. A single component is replicated.
    pub(super) fn shaped_constant(&mut self, ty: &SymbolType, components: &[Constant]) -> Option<Id> {
        let Some(kind) = ty.scalar_kind() else {
            return self.internal(format!("'{}' is not a numeric type", ty));
        };
        let count = ty.component_count().unwrap_or(1) as usize;
        let component = |index: usize| -> Option<Constant> {
            match components.len() {
                1 => Some(components[0]),
                len if len == count => Some(components[index]),
                _ => None,
            }
        };

        match ty {
            SymbolType::Scalar(_) => {
                let value = component(0)?;
                Some(self.scalar_constant(kind, value))
            }
            SymbolType::Vector { size, .. } => {
                let mut parts = Vec::with_capacity(*size as usize);
                for index in 0..*size as usize {
                    let value = component(index)?;
                    parts.push(self.scalar_constant(kind, value));
                }
                let ty = self.type_id(ty)?;
                Some(self.composite_constant(ty, parts))
            }
            SymbolType::Matrix { base, rows, cols } => {
                let row_ty = SymbolType::vector(*base, *cols);
                let mut columns = Vec::with_capacity(*rows as usize);
                for row in 0..*rows as usize {
                    let mut values = Vec::with_capacity(*cols as usize);
                    for col in 0..*cols as usize {
                        values.push(component(row * *cols as usize + col)?);
                    }
                    columns.push(self.shaped_constant(&row_ty, &values)?);
                }
                let ty = self.type_id(ty)?;
                Some(self.composite_constant(ty, columns))
            }
            _ => self.internal(format!("'{}' is not a numeric type", ty)),
        }
    }

    /// `1` of every component of `ty`, for increments.
    pub(super) fn one(&mut self, ty: &SymbolType) -> Option<Id> {
        self.shaped_constant(ty, &[Constant::Int(1)])
    }

    /// Constant for a global initializer.
    pub(super) fn constant_expr(&mut self, expr: &TypedExpr) -> Option<Id> {
        self.span = expr.span;
        if let (SymbolType::Struct { .. }, TypedExprKind::Construct(args)) = (&expr.ty, &expr.kind) {
            let mut parts = Vec::with_capacity(args.len());
            for arg in args {
                parts.push(self.constant_expr(arg)?);
            }
            let ty = self.type_id(&expr.ty)?;
            return Some(self.composite_constant(ty, parts));
        }

        match fold_components(expr) {
            Some(components) => self.shaped_constant(&expr.ty, &components),
            None => self.unsupported("global initializer that is not a constant expression"),
        }
    }
}

/// Scalar components of a constant expression, in source order and
/// converted to the expression's element kind.
pub(crate) fn fold_components(expr: &TypedExpr) -> Option<Vec<Constant>> {
    let kind = expr.ty.scalar_kind()?;
    let count = expr.ty.component_count()? as usize;

    let components = match &expr.kind {
        TypedExprKind::Constant(value) => vec![*value],
        TypedExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => fold_components(operand)?
            .into_iter()
            .map(negate)
            .collect::<Option<Vec<_>>>()?,
        TypedExprKind::Convert(inner) => fold_components(inner)?,
        TypedExprKind::Construct(args) => {
            let mut components = Vec::with_capacity(count);
            for arg in args {
                components.extend(fold_components(arg)?);
            }
            components
        }
        _ => return None,
    };

    let components: Vec<Constant> = components
        .into_iter()
        .map(|value| convert_constant(value, kind))
        .collect();
    match components.len() {
        1 if count > 1 => Some(vec![components[0]; count]),
        len if len == count => Some(components),
        _ => None,
    }
}

fn negate(value: Constant) -> Option<Constant> {
    match value {
        Constant::Int(value) => Some(Constant::Int(value.wrapping_neg())),
        Constant::UInt(value) => Some(Constant::UInt(value.wrapping_neg())),
        Constant::Float(value) => Some(Constant::Float(-value)),
        Constant::Bool(_) => None,
    }
}

/// Value of `value` as a constant of `kind`, with C cast semantics.
pub(crate) fn convert_constant(value: Constant, kind: ScalarKind) -> Constant {
    match kind {
        ScalarKind::Bool => Constant::Bool(match value {
            Constant::Bool(value) => value,
            Constant::Int(value) => value != 0,
            Constant::UInt(value) => value != 0,
            Constant::Float(value) => value != 0.0,
        }),
        ScalarKind::Int | ScalarKind::Long => Constant::Int(match value {
            Constant::Bool(value) => i64::from(value),
            Constant::Int(value) => value,
            Constant::UInt(value) => value as i64,
            Constant::Float(value) => value as i64,
        }),
        ScalarKind::UInt | ScalarKind::ULong => Constant::UInt(match value {
            Constant::Bool(value) => u64::from(value),
            Constant::Int(value) => value as u64,
            Constant::UInt(value) => value,
            Constant::Float(value) => value as u64,
        }),
        ScalarKind::Float | ScalarKind::Double => Constant::Float(match value {
            Constant::Bool(value) => f64::from(u8::from(value)),
            Constant::Int(value) => value as f64,
            Constant::UInt(value) => value as f64,
            Constant::Float(value) => value,
        }),
    }
}

/// Bit pattern of `value` as stored in a constant of `kind`.
fn constant_bits(kind: ScalarKind, value: Constant) -> u64 {
    match (kind, convert_constant(value, kind)) {
        (_, Constant::Bool(value)) => u64::from(value),
        (ScalarKind::Int, Constant::Int(value)) => u64::from(value as i32 as u32),
        (_, Constant::Int(value)) => value as u64,
        (ScalarKind::UInt, Constant::UInt(value)) => u64::from(value as u32),
        (_, Constant::UInt(value)) => value,
        (ScalarKind::Float, Constant::Float(value)) => u64::from((value as f32).to_bits()),
        (_, Constant::Float(value)) => value.to_bits(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdsl_ast::Span;

    fn constant(value: Constant, ty: SymbolType) -> TypedExpr {
        TypedExpr::new(TypedExprKind::Constant(value), ty, Span::zero(0))
    }

    #[test]
    fn test_convert_constant_truncates_like_a_cast() {
        assert_eq!(
            convert_constant(Constant::Float(2.75), ScalarKind::Int),
            Constant::Int(2)
        );
        assert_eq!(
            convert_constant(Constant::Int(-1), ScalarKind::UInt),
            Constant::UInt(u64::MAX)
        );
        assert_eq!(
            convert_constant(Constant::Int(3), ScalarKind::Float),
            Constant::Float(3.0)
        );
        assert_eq!(
            convert_constant(Constant::UInt(0), ScalarKind::Bool),
            Constant::Bool(false)
        );
    }

    #[test]
    fn test_constant_bits() {
        assert_eq!(constant_bits(ScalarKind::Int, Constant::Int(-1)), 0xffff_ffff);
        assert_eq!(constant_bits(ScalarKind::Long, Constant::Int(-1)), u64::MAX);
        assert_eq!(
            constant_bits(ScalarKind::Float, Constant::Float(1.0)),
            u64::from(1.0f32.to_bits())
        );
        assert_eq!(constant_bits(ScalarKind::Bool, Constant::Bool(true)), 1);
    }

    #[test]
    fn test_fold_splat_construct() {
        let float4 = SymbolType::vector(ScalarKind::Float, 4);
        let arg = constant(Constant::Float(0.5), SymbolType::FLOAT);
        let construct = TypedExpr::new(
            TypedExprKind::Construct(vec![arg]),
            float4,
            Span::zero(0),
        );
        assert_eq!(
            fold_components(&construct),
            Some(vec![Constant::Float(0.5); 4])
        );
    }

    #[test]
    fn test_fold_negated_conversion() {
        let int = constant(Constant::Int(2), SymbolType::INT);
        let convert = TypedExpr::new(
            TypedExprKind::Convert(Box::new(int)),
            SymbolType::FLOAT,
            Span::zero(0),
        );
        let negated = TypedExpr::new(
            TypedExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(convert),
            },
            SymbolType::FLOAT,
            Span::zero(0),
        );
        assert_eq!(fold_components(&negated), Some(vec![Constant::Float(-2.0)]));
    }

    #[test]
    fn test_fold_rejects_non_constants() {
        let local = TypedExpr::new(TypedExprKind::Local(0), SymbolType::FLOAT, Span::zero(0));
        assert_eq!(fold_components(&local), None);
    }
}
