//! Word buffer: encoding and module I/O.
//!
//! A [`WordBuffer`] owns the instruction words of one module or mixin plus
//! its id bound. Every instruction goes through [`WordBuffer::try_encode`],
//! which checks the arguments against the instruction table before any
//! word is written. The typed helpers (`type_float`, `load`, `binary`, ...)
//! are thin wrappers that panic on misuse, since a bad layout there is a
//! bug in the caller and not in the shader being compiled.
//!
//! # Ids
//!
//! Ids start at 1. The bound is always the next free id: it grows by one
//! for every result the buffer hands out, whether through an instruction
//! or [`WordBuffer::reserve_id`]. Every id operand written is checked to be
//! below the bound.

use crate::error::{EncodingError, Result};
use crate::group::{self, InstructionGroup};
use crate::info::{op_info, OperandInfo, OperandKind, Quantifier};
use crate::instruction::{Instruction, Instructions};
use crate::{Id, Word};
use spirv::{
    AddressingModel, Capability, Decoration, ExecutionMode, ExecutionModel, FunctionControl,
    LinkageType, LoopControl, MemoryModel, Op, SelectionControl, StorageClass,
};
use tracing::trace;

/// Generator magic written into module headers.
pub const GENERATOR: Word = 0;

/// Argument to [`WordBuffer::try_encode`]. Result ids are never passed;
/// the buffer allocates them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Id(Id),
    /// Several ids for a repeated operand
    Ids(&'a [Id]),
    Literal(u32),
    /// Several literals for a repeated operand
    Literals(&'a [u32]),
    /// 64-bit number, written low word first
    Literal64(u64),
    Str(&'a str),
    /// Enum or mask value
    Enum(u32),
}

impl Arg<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Arg::Id(_) | Arg::Ids(_) => "an id",
            Arg::Literal(_) | Arg::Literals(_) | Arg::Literal64(_) => "a literal",
            Arg::Str(_) => "a string",
            Arg::Enum(_) => "an enum",
        }
    }
}

/// Module header: magic, version, generator, bound, schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: Word,
    pub generator: Word,
    pub bound: Word,
    pub schema: Word,
}

impl Header {
    pub const WORDS: usize = 5;

    pub fn new(bound: Word) -> Self {
        Self {
            version: default_version(),
            generator: GENERATOR,
            bound,
            schema: 0,
        }
    }

    pub fn to_words(&self) -> [Word; Self::WORDS] {
        [
            spirv::MAGIC_NUMBER,
            self.version,
            self.generator,
            self.bound,
            self.schema,
        ]
    }

    pub fn from_words(words: &[Word]) -> Result<Self> {
        let Some(header) = words.get(..Self::WORDS) else {
            return Err(EncodingError::BadHeader(format!(
                "expected {} header words, found {}",
                Self::WORDS,
                words.len()
            )));
        };
        if header[0] != spirv::MAGIC_NUMBER {
            return Err(EncodingError::BadHeader(format!(
                "magic number {:#010x}",
                header[0]
            )));
        }
        if header[3] == 0 {
            return Err(EncodingError::BadHeader("bound is zero".to_string()));
        }
        Ok(Self {
            version: header[1],
            generator: header[2],
            bound: header[3],
            schema: header[4],
        })
    }

    /// `(major, minor)` from the version word.
    pub fn version(&self) -> (u32, u32) {
        ((self.version >> 16) & 0xff, (self.version >> 8) & 0xff)
    }
}

fn default_version() -> Word {
    (u32::from(spirv::MAJOR_VERSION) << 16) | (u32::from(spirv::MINOR_VERSION) << 8)
}

/// Owned instruction words with an id bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBuffer {
    words: Vec<Word>,
    bound: Word,
    count: usize,
    version: Word,
    generator: Word,
}

impl Default for WordBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl WordBuffer {
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            bound: 1,
            count: 0,
            version: default_version(),
            generator: GENERATOR,
        }
    }

    /// Next free id; every id in the buffer is below it.
    pub fn bound(&self) -> Word {
        self.bound
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Instruction words, without a header.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn instructions(&self) -> Instructions<'_> {
        Instructions::new(&self.words)
    }

    /// Hand out a fresh id for a forward reference.
    pub fn reserve_id(&mut self) -> Id {
        let id = self.bound;
        self.bound += 1;
        id
    }

    /// Raise the bound to at least `bound`. Lets several buffers that are
    /// later [appended](Self::append) share one id space.
    pub fn extend_bound(&mut self, bound: Word) {
        self.bound = self.bound.max(bound);
    }

    /// Append every instruction of `other`; the bound becomes the larger
    /// of the two.
    pub fn append(&mut self, other: &WordBuffer) {
        self.words.extend_from_slice(&other.words);
        self.count += other.count;
        self.extend_bound(other.bound);
    }

    /// Append one already encoded instruction, such as a renumbered
    /// [`GraphInstruction`](crate::GraphInstruction). Ids of recognized
    /// opcodes must be below the bound.
    pub fn push_words(&mut self, words: &[Word]) -> Result<()> {
        let instruction = Instruction::new(words)?;
        if instruction.info().is_some() {
            for index in instruction.id_positions()? {
                let id = words[index];
                if id == 0 || id >= self.bound {
                    return Err(EncodingError::IdOutOfBounds {
                        id,
                        bound: self.bound,
                    });
                }
            }
        }
        self.words.extend_from_slice(words);
        self.count += 1;
        Ok(())
    }

    /// Encode `op` with a freshly allocated result id (if the opcode
    /// defines one). Returns that id.
    pub fn try_encode(&mut self, op: Op, args: &[Arg<'_>]) -> Result<Option<Id>> {
        self.try_encode_with(op, None, args)
    }

    /// Encode `op`, using `result` (from [`reserve_id`](Self::reserve_id))
    /// as its result id instead of allocating one.
    pub fn try_encode_with(
        &mut self,
        op: Op,
        result: Option<Id>,
        args: &[Arg<'_>],
    ) -> Result<Option<Id>> {
        let (words, result_id) = self.assemble(op, result, args)?;
        self.words.extend_from_slice(&words);
        self.count += 1;
        if result.is_none() && result_id.is_some() {
            self.bound += 1;
        }
        trace!(op = ?op, words = words.len(), "encoded instruction");
        Ok(result_id)
    }

    /// [`try_encode`](Self::try_encode) for callers that construct
    /// layouts statically.
    ///
    /// # Panics
    /// Panics when the arguments do not match the layout of `op`.
    pub fn encode(&mut self, op: Op, args: &[Arg<'_>]) -> Option<Id> {
        match self.try_encode(op, args) {
            Ok(id) => id,
            Err(err) => panic!("invalid encoding: {}", err),
        }
    }

    fn encode_result(&mut self, op: Op, result: Option<Id>, args: &[Arg<'_>]) -> Id {
        match self.try_encode_with(op, result, args) {
            Ok(Some(id)) => id,
            Ok(None) => panic!("Op{:?} defines no result", op),
            Err(err) => panic!("invalid encoding: {}", err),
        }
    }

    fn encode_void(&mut self, op: Op, args: &[Arg<'_>]) {
        if let Err(err) = self.try_encode(op, args) {
            panic!("invalid encoding: {}", err);
        }
    }

    fn check_id(&self, op: Op, id: Id) -> Result<()> {
        if id == 0 || id >= self.bound {
            trace!(op = ?op, id, bound = self.bound, "id out of bounds");
            return Err(EncodingError::IdOutOfBounds {
                id,
                bound: self.bound,
            });
        }
        Ok(())
    }

    /// Build the words of one instruction without touching the buffer.
    fn assemble(
        &self,
        op: Op,
        result: Option<Id>,
        args: &[Arg<'_>],
    ) -> Result<(Vec<Word>, Option<Id>)> {
        let mismatch = |message: String| EncodingError::ArgumentMismatch { op, message };
        let info = op_info(op)
            .ok_or_else(|| mismatch("opcode is not in the instruction table".to_string()))?;

        let mut words = vec![0];
        let mut result_id = None;
        let mut args = args.iter();

        for operand in info.operands {
            if operand.kind == OperandKind::IdResult {
                let id = match result {
                    Some(id) => {
                        self.check_id(op, id)?;
                        id
                    }
                    None => self.bound,
                };
                words.push(id);
                result_id = Some(id);
                continue;
            }
            match operand.quantifier {
                Quantifier::One => {
                    let arg = args
                        .next()
                        .ok_or_else(|| mismatch(format!("missing operand '{}'", operand.name)))?;
                    self.push_arg(op, operand, arg, &mut words)?;
                }
                Quantifier::Optional => {
                    if let Some(arg) = args.next() {
                        self.push_arg(op, operand, arg, &mut words)?;
                    }
                }
                Quantifier::Many => {
                    for arg in args.by_ref() {
                        self.push_arg(op, operand, arg, &mut words)?;
                    }
                }
            }
        }

        if args.next().is_some() {
            return Err(mismatch("too many operands".to_string()));
        }
        if result.is_some() && result_id.is_none() {
            return Err(mismatch("opcode defines no result id".to_string()));
        }
        if words.len() > 0xffff {
            return Err(EncodingError::TooLong {
                op,
                words: words.len(),
            });
        }

        words[0] = ((words.len() as Word) << 16) | op as Word;
        Ok((words, result_id))
    }

    fn push_arg(
        &self,
        op: Op,
        operand: &OperandInfo,
        arg: &Arg<'_>,
        words: &mut Vec<Word>,
    ) -> Result<()> {
        let many = operand.quantifier == Quantifier::Many;
        match (operand.kind, arg) {
            (OperandKind::IdRef | OperandKind::IdResultType, Arg::Id(id)) => {
                self.check_id(op, *id)?;
                words.push(*id);
            }
            (OperandKind::IdRef, Arg::Ids(ids)) if many => {
                for id in ids.iter() {
                    self.check_id(op, *id)?;
                    words.push(*id);
                }
            }
            (
                OperandKind::LiteralInteger
                | OperandKind::LiteralExtInstInteger
                | OperandKind::LiteralContextDependentNumber,
                Arg::Literal(value),
            ) => words.push(*value),
            (OperandKind::LiteralInteger, Arg::Literals(values)) if many => {
                words.extend_from_slice(values)
            }
            (OperandKind::LiteralContextDependentNumber, Arg::Literal64(value)) => {
                words.push(*value as Word);
                words.push((*value >> 32) as Word);
            }
            (OperandKind::LiteralString, Arg::Str(text)) => {
                if text.contains('\0') {
                    return Err(EncodingError::ArgumentMismatch {
                        op,
                        message: format!("string operand '{}' contains a nul byte", operand.name),
                    });
                }
                encode_string(text, words);
            }
            (kind, Arg::Enum(value)) if kind.is_enum() || kind.is_mask() => words.push(*value),
            (kind, arg) => {
                return Err(EncodingError::WrongOperandKind {
                    op,
                    name: operand.name,
                    actual: kind,
                    expected: arg.describe(),
                })
            }
        }
        Ok(())
    }

    // === Module setup ===

    pub fn capability(&mut self, capability: Capability) {
        self.encode_void(Op::Capability, &[Arg::Enum(capability as u32)]);
    }

    pub fn extension(&mut self, name: &str) {
        self.encode_void(Op::Extension, &[Arg::Str(name)]);
    }

    pub fn ext_inst_import(&mut self, name: &str) -> Id {
        self.encode_result(Op::ExtInstImport, None, &[Arg::Str(name)])
    }

    pub fn memory_model(&mut self, addressing: AddressingModel, memory: MemoryModel) {
        self.encode_void(
            Op::MemoryModel,
            &[Arg::Enum(addressing as u32), Arg::Enum(memory as u32)],
        );
    }

    pub fn entry_point(
        &mut self,
        model: ExecutionModel,
        function: Id,
        name: &str,
        interface: &[Id],
    ) {
        self.encode_void(
            Op::EntryPoint,
            &[
                Arg::Enum(model as u32),
                Arg::Id(function),
                Arg::Str(name),
                Arg::Ids(interface),
            ],
        );
    }

    pub fn execution_mode(&mut self, function: Id, mode: ExecutionMode, operands: &[u32]) {
        self.encode_void(
            Op::ExecutionMode,
            &[Arg::Id(function), Arg::Enum(mode as u32), Arg::Literals(operands)],
        );
    }

    // === Debug and annotations ===

    pub fn name(&mut self, target: Id, name: &str) {
        self.encode_void(Op::Name, &[Arg::Id(target), Arg::Str(name)]);
    }

    pub fn member_name(&mut self, ty: Id, member: u32, name: &str) {
        self.encode_void(
            Op::MemberName,
            &[Arg::Id(ty), Arg::Literal(member), Arg::Str(name)],
        );
    }

    pub fn decorate(&mut self, target: Id, decoration: Decoration, values: &[u32]) {
        self.encode_void(
            Op::Decorate,
            &[
                Arg::Id(target),
                Arg::Enum(decoration as u32),
                Arg::Literals(values),
            ],
        );
    }

    pub fn member_decorate(&mut self, ty: Id, member: u32, decoration: Decoration, values: &[u32]) {
        self.encode_void(
            Op::MemberDecorate,
            &[
                Arg::Id(ty),
                Arg::Literal(member),
                Arg::Enum(decoration as u32),
                Arg::Literals(values),
            ],
        );
    }

    /// `LinkageAttributes "name" kind` on `target`.
    pub fn decorate_linkage(&mut self, target: Id, name: &str, kind: LinkageType) {
        let mut values = Vec::new();
        encode_string(name, &mut values);
        values.push(kind as u32);
        self.decorate(target, Decoration::LinkageAttributes, &values);
    }

    // === Types ===

    pub fn type_void(&mut self) -> Id {
        self.encode_result(Op::TypeVoid, None, &[])
    }

    pub fn type_bool(&mut self) -> Id {
        self.encode_result(Op::TypeBool, None, &[])
    }

    pub fn type_int(&mut self, width: u32, signed: bool) -> Id {
        self.encode_result(
            Op::TypeInt,
            None,
            &[Arg::Literal(width), Arg::Literal(u32::from(signed))],
        )
    }

    pub fn type_float(&mut self, width: u32) -> Id {
        self.encode_result(Op::TypeFloat, None, &[Arg::Literal(width)])
    }

    pub fn type_vector(&mut self, component: Id, count: u32) -> Id {
        self.encode_result(
            Op::TypeVector,
            None,
            &[Arg::Id(component), Arg::Literal(count)],
        )
    }

    pub fn type_matrix(&mut self, column: Id, count: u32) -> Id {
        self.encode_result(Op::TypeMatrix, None, &[Arg::Id(column), Arg::Literal(count)])
    }

    /// `length` is the id of a constant.
    pub fn type_array(&mut self, element: Id, length: Id) -> Id {
        self.encode_result(Op::TypeArray, None, &[Arg::Id(element), Arg::Id(length)])
    }

    pub fn type_struct(&mut self, members: &[Id]) -> Id {
        self.encode_result(Op::TypeStruct, None, &[Arg::Ids(members)])
    }

    pub fn type_pointer(&mut self, storage: StorageClass, pointee: Id) -> Id {
        self.encode_result(
            Op::TypePointer,
            None,
            &[Arg::Enum(storage as u32), Arg::Id(pointee)],
        )
    }

    pub fn type_function(&mut self, ret: Id, params: &[Id]) -> Id {
        self.encode_result(Op::TypeFunction, None, &[Arg::Id(ret), Arg::Ids(params)])
    }

    // === Constants ===

    pub fn constant_true(&mut self, ty: Id) -> Id {
        self.encode_result(Op::ConstantTrue, None, &[Arg::Id(ty)])
    }

    pub fn constant_false(&mut self, ty: Id) -> Id {
        self.encode_result(Op::ConstantFalse, None, &[Arg::Id(ty)])
    }

    pub fn constant_u32(&mut self, ty: Id, value: u32) -> Id {
        self.encode_result(Op::Constant, None, &[Arg::Id(ty), Arg::Literal(value)])
    }

    pub fn constant_u64(&mut self, ty: Id, value: u64) -> Id {
        self.encode_result(Op::Constant, None, &[Arg::Id(ty), Arg::Literal64(value)])
    }

    pub fn constant_f32(&mut self, ty: Id, value: f32) -> Id {
        self.constant_u32(ty, value.to_bits())
    }

    pub fn constant_f64(&mut self, ty: Id, value: f64) -> Id {
        self.constant_u64(ty, value.to_bits())
    }

    pub fn constant_composite(&mut self, ty: Id, constituents: &[Id]) -> Id {
        self.encode_result(
            Op::ConstantComposite,
            None,
            &[Arg::Id(ty), Arg::Ids(constituents)],
        )
    }

    pub fn undef(&mut self, ty: Id) -> Id {
        self.encode_result(Op::Undef, None, &[Arg::Id(ty)])
    }

    // === Memory ===

    /// `pointer_type` must be a pointer type in `storage`.
    pub fn variable(
        &mut self,
        pointer_type: Id,
        storage: StorageClass,
        initializer: Option<Id>,
    ) -> Id {
        match initializer {
            Some(init) => self.encode_result(
                Op::Variable,
                None,
                &[
                    Arg::Id(pointer_type),
                    Arg::Enum(storage as u32),
                    Arg::Id(init),
                ],
            ),
            None => self.encode_result(
                Op::Variable,
                None,
                &[Arg::Id(pointer_type), Arg::Enum(storage as u32)],
            ),
        }
    }

    pub fn load(&mut self, ty: Id, pointer: Id) -> Id {
        self.encode_result(Op::Load, None, &[Arg::Id(ty), Arg::Id(pointer)])
    }

    pub fn store(&mut self, pointer: Id, object: Id) {
        self.encode_void(Op::Store, &[Arg::Id(pointer), Arg::Id(object)]);
    }

    pub fn access_chain(&mut self, ty: Id, base: Id, indexes: &[Id]) -> Id {
        self.encode_result(
            Op::AccessChain,
            None,
            &[Arg::Id(ty), Arg::Id(base), Arg::Ids(indexes)],
        )
    }

    // === Functions ===

    pub fn function(&mut self, ret: Id, control: FunctionControl, ty: Id) -> Id {
        self.encode_result(
            Op::Function,
            None,
            &[Arg::Id(ret), Arg::Enum(control.bits()), Arg::Id(ty)],
        )
    }

    /// Begin a function whose id was reserved earlier.
    pub fn function_with_id(&mut self, id: Id, ret: Id, control: FunctionControl, ty: Id) -> Id {
        self.encode_result(
            Op::Function,
            Some(id),
            &[Arg::Id(ret), Arg::Enum(control.bits()), Arg::Id(ty)],
        )
    }

    pub fn function_parameter(&mut self, ty: Id) -> Id {
        self.encode_result(Op::FunctionParameter, None, &[Arg::Id(ty)])
    }

    pub fn function_end(&mut self) {
        self.encode_void(Op::FunctionEnd, &[]);
    }

    pub fn function_call(&mut self, ty: Id, function: Id, args: &[Id]) -> Id {
        self.encode_result(
            Op::FunctionCall,
            None,
            &[Arg::Id(ty), Arg::Id(function), Arg::Ids(args)],
        )
    }

    pub fn ext_inst(&mut self, ty: Id, set: Id, instruction: u32, args: &[Id]) -> Id {
        self.encode_result(
            Op::ExtInst,
            None,
            &[
                Arg::Id(ty),
                Arg::Id(set),
                Arg::Literal(instruction),
                Arg::Ids(args),
            ],
        )
    }

    // === Values ===

    /// Any opcode with a `result type, result, operand` layout
    /// (negations, conversions, `OpAll`, ...).
    pub fn unary(&mut self, op: Op, ty: Id, operand: Id) -> Id {
        self.encode_result(op, None, &[Arg::Id(ty), Arg::Id(operand)])
    }

    /// Any opcode with a `result type, result, left, right` layout.
    pub fn binary(&mut self, op: Op, ty: Id, left: Id, right: Id) -> Id {
        self.encode_result(op, None, &[Arg::Id(ty), Arg::Id(left), Arg::Id(right)])
    }

    pub fn select(&mut self, ty: Id, condition: Id, accept: Id, reject: Id) -> Id {
        self.encode_result(
            Op::Select,
            None,
            &[
                Arg::Id(ty),
                Arg::Id(condition),
                Arg::Id(accept),
                Arg::Id(reject),
            ],
        )
    }

    pub fn composite_construct(&mut self, ty: Id, constituents: &[Id]) -> Id {
        self.encode_result(
            Op::CompositeConstruct,
            None,
            &[Arg::Id(ty), Arg::Ids(constituents)],
        )
    }

    pub fn composite_extract(&mut self, ty: Id, composite: Id, indexes: &[u32]) -> Id {
        self.encode_result(
            Op::CompositeExtract,
            None,
            &[Arg::Id(ty), Arg::Id(composite), Arg::Literals(indexes)],
        )
    }

    pub fn composite_insert(&mut self, ty: Id, object: Id, composite: Id, indexes: &[u32]) -> Id {
        self.encode_result(
            Op::CompositeInsert,
            None,
            &[
                Arg::Id(ty),
                Arg::Id(object),
                Arg::Id(composite),
                Arg::Literals(indexes),
            ],
        )
    }

    pub fn vector_shuffle(&mut self, ty: Id, first: Id, second: Id, components: &[u32]) -> Id {
        self.encode_result(
            Op::VectorShuffle,
            None,
            &[
                Arg::Id(ty),
                Arg::Id(first),
                Arg::Id(second),
                Arg::Literals(components),
            ],
        )
    }

    // === Control flow ===

    pub fn label(&mut self) -> Id {
        self.encode_result(Op::Label, None, &[])
    }

    /// Place a label whose id was reserved earlier.
    pub fn label_with_id(&mut self, id: Id) -> Id {
        self.encode_result(Op::Label, Some(id), &[])
    }

    pub fn branch(&mut self, target: Id) {
        self.encode_void(Op::Branch, &[Arg::Id(target)]);
    }

    pub fn branch_conditional(&mut self, condition: Id, accept: Id, reject: Id) {
        self.encode_void(
            Op::BranchConditional,
            &[Arg::Id(condition), Arg::Id(accept), Arg::Id(reject)],
        );
    }

    pub fn selection_merge(&mut self, merge: Id, control: SelectionControl) {
        self.encode_void(
            Op::SelectionMerge,
            &[Arg::Id(merge), Arg::Enum(control.bits())],
        );
    }

    pub fn loop_merge(&mut self, merge: Id, continue_target: Id, control: LoopControl) {
        self.encode_void(
            Op::LoopMerge,
            &[
                Arg::Id(merge),
                Arg::Id(continue_target),
                Arg::Enum(control.bits()),
            ],
        );
    }

    pub fn ret(&mut self) {
        self.encode_void(Op::Return, &[]);
    }

    pub fn ret_value(&mut self, value: Id) {
        self.encode_void(Op::ReturnValue, &[Arg::Id(value)]);
    }

    pub fn kill(&mut self) {
        self.encode_void(Op::Kill, &[]);
    }

    pub fn unreachable(&mut self) {
        self.encode_void(Op::Unreachable, &[]);
    }

    // === Layout ===

    /// Canonical section of every instruction, in buffer order.
    pub fn groups(&self) -> Vec<InstructionGroup> {
        group::classify(self.instructions())
    }

    /// Copy of this buffer with instructions in canonical section order.
    /// Instructions of the same section keep their relative order.
    pub fn sorted(&self) -> WordBuffer {
        let instructions: Vec<Instruction<'_>> = self.instructions().collect();
        let order = group::sorted_order(&self.groups());

        let mut words = Vec::with_capacity(self.words.len());
        for index in order {
            words.extend_from_slice(instructions[index].words());
        }
        WordBuffer {
            words,
            ..self.clone()
        }
    }

    /// Check that every opcode is recognized and sections appear in order.
    pub fn validate_layout(&self) -> Result<()> {
        let groups = self.groups();
        let mut position = 0;
        let mut previous = InstructionGroup::Capability;
        for (index, (instruction, group)) in self.instructions().zip(&groups).enumerate() {
            if *group == InstructionGroup::Unrecognized {
                return Err(EncodingError::UnrecognizedOpcode {
                    opcode: instruction.opcode_number(),
                    position,
                });
            }
            if *group < previous {
                return Err(EncodingError::OutOfOrder {
                    op: instruction.opcode().unwrap_or(Op::Nop),
                    index,
                });
            }
            previous = *group;
            position += instruction.word_count();
        }
        Ok(())
    }

    // === Module I/O ===

    pub fn header(&self) -> Header {
        Header {
            version: self.version,
            generator: self.generator,
            bound: self.bound,
            schema: 0,
        }
    }

    /// Header followed by the instruction words.
    pub fn to_words(&self) -> Vec<Word> {
        let mut words = Vec::with_capacity(Header::WORDS + self.words.len());
        words.extend_from_slice(&self.header().to_words());
        words.extend_from_slice(&self.words);
        words
    }

    /// Little-endian bytes of [`to_words`](Self::to_words).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words()
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect()
    }

    /// Parse a module: header plus instructions.
    ///
    /// Every instruction must fit, and the ids of recognized opcodes must
    /// be below the header bound.
    pub fn from_words(words: &[Word]) -> Result<WordBuffer> {
        let header = Header::from_words(words)?;
        let body = &words[Header::WORDS..];

        let mut count = 0;
        let mut position = 0;
        while position < body.len() {
            let word_count = (body[position] >> 16) as usize;
            let available = body.len() - position;
            if word_count == 0 || word_count > available {
                return Err(EncodingError::Truncated {
                    position: Header::WORDS + position,
                    needed: word_count.max(1),
                    available,
                });
            }
            let instruction = Instruction::new(&body[position..position + word_count])?;
            if instruction.info().is_some() {
                for index in instruction.id_positions()? {
                    let id = instruction.words()[index];
                    if id == 0 || id >= header.bound {
                        return Err(EncodingError::IdOutOfBounds {
                            id,
                            bound: header.bound,
                        });
                    }
                }
            }
            position += word_count;
            count += 1;
        }

        Ok(WordBuffer {
            words: body.to_vec(),
            bound: header.bound,
            count,
            version: header.version,
            generator: header.generator,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<WordBuffer> {
        if bytes.len() % 4 != 0 {
            return Err(EncodingError::ByteLength(bytes.len()));
        }
        let words: Vec<Word> = bytes
            .chunks_exact(4)
            .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::from_words(&words)
    }

    /// Buffer from already well-formed instruction words.
    pub(crate) fn from_parts(words: Vec<Word>, bound: Word, count: usize) -> WordBuffer {
        WordBuffer {
            words,
            bound,
            count,
            ..WordBuffer::new()
        }
    }
}

/// Append a nul-terminated string, padded to a whole word.
pub(crate) fn encode_string(text: &str, words: &mut Vec<Word>) {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    words.extend(
        bytes
            .chunks_exact(4)
            .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_grows_once_per_result() {
        let mut buffer = WordBuffer::new();
        assert_eq!(buffer.bound(), 1);
        let float = buffer.type_float(32);
        assert_eq!(float, 1);
        assert_eq!(buffer.bound(), 2);

        buffer.capability(Capability::Shader);
        assert_eq!(buffer.bound(), 2);

        let reserved = buffer.reserve_id();
        assert_eq!(reserved, 2);
        assert_eq!(buffer.bound(), 3);

        let label = buffer.label_with_id(reserved);
        assert_eq!(label, reserved);
        assert_eq!(buffer.bound(), 3);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_push_words_checks_ids() {
        let mut source = WordBuffer::new();
        let float = source.type_float(32);
        let vector = source.type_vector(float, 4);
        let words: Vec<Word> = source.words().to_vec();
        let (first, second) = words.split_at(3);

        let mut target = WordBuffer::new();
        assert!(matches!(
            target.push_words(second),
            Err(EncodingError::IdOutOfBounds { .. })
        ));
        target.extend_bound(source.bound());
        target.push_words(first).unwrap();
        target.push_words(second).unwrap();
        assert_eq!(target.len(), 2);
        assert_eq!(target.instructions().nth(1).unwrap().result_id(), Some(vector));
    }

    #[test]
    fn test_linkage_decoration() {
        let mut buffer = WordBuffer::new();
        let float = buffer.type_float(32);
        let ptr = buffer.type_pointer(StorageClass::Private, float);
        let var = buffer.variable(ptr, StorageClass::Private, None);
        buffer.decorate_linkage(var, "Base.Gain", LinkageType::Import);

        let decoration = buffer.instructions().last().unwrap();
        assert_eq!(
            decoration.linkage(),
            Some((var, "Base.Gain".to_string(), LinkageType::Import))
        );
        assert_eq!(buffer.instructions().nth(1).unwrap().linkage(), None);
    }

    #[test]
    fn test_append_shares_id_space() {
        let mut decls = WordBuffer::new();
        let mut code = WordBuffer::new();
        let float = decls.type_float(32);

        code.extend_bound(decls.bound());
        let ptr = code.type_pointer(StorageClass::Private, float);
        assert_eq!(ptr, 2);

        decls.append(&code);
        assert_eq!(decls.len(), 2);
        assert_eq!(decls.bound(), 3);
    }

    #[test]
    fn test_instruction_words() {
        let mut buffer = WordBuffer::new();
        let float = buffer.type_float(32);
        let one = buffer.constant_f32(float, 1.0);
        assert_eq!(one, 2);
        assert_eq!(
            buffer.words(),
            &[
                (3 << 16) | Op::TypeFloat as u32,
                1,
                32,
                (4 << 16) | Op::Constant as u32,
                1,
                2,
                1.0f32.to_bits(),
            ]
        );
    }

    #[test]
    fn test_string_padding() {
        let mut words = Vec::new();
        encode_string("main", &mut words);
        assert_eq!(words.len(), 2);
        assert_eq!(words[1], 0);

        let mut words = Vec::new();
        encode_string("abc", &mut words);
        assert_eq!(words, vec![u32::from_le_bytes(*b"abc\0")]);
    }

    #[test]
    fn test_try_encode_rejects_bad_arguments() {
        let mut buffer = WordBuffer::new();
        let float = buffer.type_float(32);

        let err = buffer
            .try_encode(Op::TypeVector, &[Arg::Literal(4), Arg::Literal(4)])
            .unwrap_err();
        assert!(matches!(err, EncodingError::WrongOperandKind { name: "component type", .. }));

        let err = buffer.try_encode(Op::TypeVector, &[Arg::Id(float)]).unwrap_err();
        assert!(matches!(err, EncodingError::ArgumentMismatch { .. }));

        let err = buffer
            .try_encode(Op::TypeVector, &[Arg::Id(7), Arg::Literal(4)])
            .unwrap_err();
        assert_eq!(err, EncodingError::IdOutOfBounds { id: 7, bound: 2 });

        let err = buffer
            .try_encode(Op::TypeFloat, &[Arg::Literal(32), Arg::Literal(0)])
            .unwrap_err();
        assert!(matches!(err, EncodingError::ArgumentMismatch { .. }));

        // Nothing was written by the failed attempts.
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.bound(), 2);
    }

    #[test]
    #[should_panic(expected = "invalid encoding")]
    fn test_encode_panics_on_misuse() {
        let mut buffer = WordBuffer::new();
        buffer.encode(Op::TypeFloat, &[]);
    }

    #[test]
    fn test_header_round_trip() {
        let header = Header::new(42);
        let parsed = Header::from_words(&header.to_words()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.version(), (1, u32::from(spirv::MINOR_VERSION)));

        let mut words = header.to_words();
        words[0] = 0xdeadbeef;
        assert!(matches!(
            Header::from_words(&words),
            Err(EncodingError::BadHeader(_))
        ));
    }

    #[test]
    fn test_from_words_rejects_truncation() {
        let mut buffer = WordBuffer::new();
        buffer.type_float(32);
        let mut words = buffer.to_words();
        words.pop();
        assert!(matches!(
            WordBuffer::from_words(&words),
            Err(EncodingError::Truncated { .. })
        ));
    }

    #[test]
    fn test_from_bytes_rejects_partial_words() {
        assert_eq!(
            WordBuffer::from_bytes(&[0, 1, 2]),
            Err(EncodingError::ByteLength(3))
        );
    }
}
