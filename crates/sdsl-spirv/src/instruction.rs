//! Borrowed views over encoded instructions.
//!
//! An [`Instruction`] is a slice of words starting at an instruction
//! header. Operand access goes through the instruction table, so callers
//! ask for operands by name and kind instead of word offsets.

use crate::error::{EncodingError, Result};
use crate::info::{opcode_info, OpInfo, OperandInfo, OperandKind, Quantifier};
use crate::{Id, Word};
use spirv::{Decoration, LinkageType, Op};
use std::fmt;

/// One encoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    words: &'a [Word],
}

impl<'a> Instruction<'a> {
    /// View `words` as one instruction. The header word count must match
    /// the slice length.
    pub fn new(words: &'a [Word]) -> Result<Self> {
        let Some(&header) = words.first() else {
            return Err(EncodingError::Truncated {
                position: 0,
                needed: 1,
                available: 0,
            });
        };
        let count = (header >> 16) as usize;
        if count == 0 || count != words.len() {
            return Err(EncodingError::Truncated {
                position: 0,
                needed: count.max(1),
                available: words.len(),
            });
        }
        Ok(Self { words })
    }

    pub(crate) fn new_unchecked(words: &'a [Word]) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &'a [Word] {
        self.words
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Raw opcode from the header word.
    pub fn opcode_number(&self) -> u32 {
        self.words[0] & 0xffff
    }

    /// Opcode, if it names any instruction the `spirv` crate knows.
    pub fn opcode(&self) -> Option<Op> {
        Op::from_u32(self.opcode_number())
    }

    /// Table entry, if this opcode is recognized.
    pub fn info(&self) -> Option<&'static OpInfo> {
        opcode_info(self.opcode_number())
    }

    pub fn result_id(&self) -> Option<Id> {
        let index = self.info()?.result_word()?;
        self.words.get(index).copied()
    }

    pub fn result_type(&self) -> Option<Id> {
        let index = self.info()?.result_type_word()?;
        self.words.get(index).copied()
    }

    /// `(target, name, kind)` of a `LinkageAttributes` decoration.
    pub fn linkage(&self) -> Option<(Id, String, LinkageType)> {
        if self.opcode() != Some(Op::Decorate)
            || self.words.get(2) != Some(&(Decoration::LinkageAttributes as u32))
        {
            return None;
        }
        let (kind, name) = self.words.get(3..)?.split_last()?;
        let bytes: Vec<u8> = name
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .take_while(|byte| *byte != 0)
            .collect();
        let name = String::from_utf8(bytes).ok()?;
        Some((self.words[1], name, LinkageType::from_u32(*kind)?))
    }

    /// Split the words into operands following the table layout. Repeated
    /// operands produce one entry per element.
    pub fn operands(&self) -> Result<Vec<Operand<'a>>> {
        let info = self.info().ok_or(EncodingError::UnrecognizedOpcode {
            opcode: self.opcode_number(),
            position: 0,
        })?;

        let end = self.words.len();
        let mut position = 1;
        let mut operands = Vec::new();
        for operand in info.operands {
            match operand.quantifier {
                Quantifier::One => {
                    if position >= end {
                        return Err(self.malformed(
                            info.op,
                            position,
                            format!("missing operand '{}'", operand.name),
                        ));
                    }
                    position = self.take(info.op, operand, position, &mut operands)?;
                }
                Quantifier::Optional => {
                    if position < end {
                        position = self.take(info.op, operand, position, &mut operands)?;
                    }
                }
                Quantifier::Many => {
                    while position < end {
                        position = self.take(info.op, operand, position, &mut operands)?;
                    }
                }
            }
        }
        if position != end {
            return Err(self.malformed(info.op, position, "trailing words".to_string()));
        }
        Ok(operands)
    }

    /// First operand called `name`.
    pub fn operand(&self, name: &str) -> Result<Operand<'a>> {
        let op = self.known_op()?;
        self.operands()?
            .into_iter()
            .find(|operand| operand.name() == name)
            .ok_or_else(|| EncodingError::UnknownOperand {
                op,
                name: name.to_string(),
            })
    }

    /// Word indices holding ids (result, result type and references).
    pub fn id_positions(&self) -> Result<Vec<usize>> {
        let mut positions = Vec::new();
        let mut index = 1;
        for operand in self.operands()? {
            if operand.kind().is_id() {
                positions.push(index);
            }
            index += operand.words().len();
        }
        Ok(positions)
    }

    /// Copy of the words with every id shifted by `offset`. Unrecognized
    /// instructions are copied unchanged.
    pub fn renumbered(&self, offset: u32) -> Vec<Word> {
        let mut words = self.words.to_vec();
        if offset == 0 {
            return words;
        }
        if let Ok(positions) = self.id_positions() {
            for index in positions {
                words[index] += offset;
            }
        }
        words
    }

    fn known_op(&self) -> Result<Op> {
        self.info()
            .map(|info| info.op)
            .ok_or(EncodingError::UnrecognizedOpcode {
                opcode: self.opcode_number(),
                position: 0,
            })
    }

    fn take(
        &self,
        op: Op,
        info: &'static OperandInfo,
        position: usize,
        operands: &mut Vec<Operand<'a>>,
    ) -> Result<usize> {
        let len = match info.kind {
            OperandKind::LiteralString => self.words[position..]
                .iter()
                .position(|word| word.to_le_bytes().contains(&0))
                .map(|index| index + 1)
                .ok_or_else(|| {
                    self.malformed(op, position, "unterminated string".to_string())
                })?,
            OperandKind::LiteralContextDependentNumber => self.words.len() - position,
            _ => 1,
        };
        operands.push(Operand {
            op,
            info,
            words: &self.words[position..position + len],
        });
        Ok(position + len)
    }

    fn malformed(&self, op: Op, position: usize, message: String) -> EncodingError {
        EncodingError::Malformed {
            op,
            position,
            message,
        }
    }

    /// Render with constants of float type `float_width` shown as floats.
    pub(crate) fn write(&self, f: &mut impl fmt::Write, float_width: Option<u32>) -> fmt::Result {
        let operands = match self.operands() {
            Ok(operands) => operands,
            Err(_) => {
                match self.opcode() {
                    Some(op) => write!(f, "Op{:?}", op)?,
                    None => write!(f, "Op<{}>", self.opcode_number())?,
                }
                for word in &self.words[1..] {
                    write!(f, " {:#x}", word)?;
                }
                return Ok(());
            }
        };

        if let Some(result) = operands
            .iter()
            .find(|operand| operand.kind() == OperandKind::IdResult)
        {
            write!(f, "%{} = ", result.words()[0])?;
        }
        match self.opcode() {
            Some(op) => write!(f, "Op{:?}", op)?,
            None => write!(f, "Op<{}>", self.opcode_number())?,
        }
        for operand in &operands {
            match operand.kind() {
                OperandKind::IdResult => {}
                OperandKind::LiteralContextDependentNumber if float_width.is_some() => {
                    match (float_width, operand.words()) {
                        (Some(32), [bits]) => write!(f, " {:?}", f32::from_bits(*bits))?,
                        (Some(64), [low, high]) => write!(
                            f,
                            " {:?}",
                            f64::from_bits(u64::from(*low) | (u64::from(*high) << 32))
                        )?,
                        _ => write!(f, " {}", operand)?,
                    }
                }
                _ => write!(f, " {}", operand)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, None)
    }
}

/// One operand of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand<'a> {
    op: Op,
    info: &'static OperandInfo,
    words: &'a [Word],
}

impl<'a> Operand<'a> {
    pub fn kind(&self) -> OperandKind {
        self.info.kind
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn words(&self) -> &'a [Word] {
        self.words
    }

    fn wrong(&self, expected: &'static str) -> EncodingError {
        EncodingError::WrongOperandKind {
            op: self.op,
            name: self.info.name,
            actual: self.info.kind,
            expected,
        }
    }

    pub fn as_id(&self) -> Result<Id> {
        if !self.kind().is_id() {
            return Err(self.wrong("an id"));
        }
        Ok(self.words[0])
    }

    /// Single-word literal.
    pub fn as_u32(&self) -> Result<u32> {
        match (self.kind(), self.words) {
            (
                OperandKind::LiteralInteger
                | OperandKind::LiteralExtInstInteger
                | OperandKind::LiteralContextDependentNumber,
                [value],
            ) => Ok(*value),
            _ => Err(self.wrong("a one-word literal")),
        }
    }

    /// Numeric literal of one or two words, low word first.
    pub fn as_u64(&self) -> Result<u64> {
        match (self.kind(), self.words) {
            (OperandKind::LiteralContextDependentNumber, [low, high]) => {
                Ok(u64::from(*low) | (u64::from(*high) << 32))
            }
            _ => self.as_u32().map(u64::from),
        }
    }

    pub fn as_f32(&self) -> Result<f32> {
        match (self.kind(), self.words) {
            (OperandKind::LiteralContextDependentNumber, [bits]) => Ok(f32::from_bits(*bits)),
            _ => Err(self.wrong("a 32-bit number")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match (self.kind(), self.words) {
            (OperandKind::LiteralContextDependentNumber, [_, _]) => {
                self.as_u64().map(f64::from_bits)
            }
            _ => Err(self.wrong("a 64-bit number")),
        }
    }

    pub fn as_str(&self) -> Result<String> {
        if self.kind() != OperandKind::LiteralString {
            return Err(self.wrong("a string"));
        }
        let bytes: Vec<u8> = self
            .words
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .take_while(|byte| *byte != 0)
            .collect();
        String::from_utf8(bytes).map_err(|_| EncodingError::Malformed {
            op: self.op,
            position: 0,
            message: format!("operand '{}' is not valid UTF-8", self.info.name),
        })
    }

    /// Enum or mask value.
    pub fn as_enum(&self) -> Result<u32> {
        if !self.kind().is_enum() && !self.kind().is_mask() {
            return Err(self.wrong("an enum"));
        }
        Ok(self.words[0])
    }
}

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        if kind.is_id() {
            return write!(f, "%{}", self.words[0]);
        }
        if kind == OperandKind::LiteralString {
            return match self.as_str() {
                Ok(text) => write!(f, "{:?}", text),
                Err(_) => write!(f, "<invalid string>"),
            };
        }
        if kind.is_mask() {
            return match self.words[0] {
                0 => write!(f, "None"),
                bits => write!(f, "{:#x}", bits),
            };
        }
        if kind.is_enum() {
            let value = self.words[0];
            return match kind.enum_name(value) {
                Some(name) => write!(f, "{}", name),
                None => write!(f, "{}", value),
            };
        }
        match self.as_u64() {
            Ok(value) => write!(f, "{}", value),
            Err(_) => write!(f, "{:?}", self.words),
        }
    }
}

/// Iterator over the instructions in a run of well-formed words.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    words: &'a [Word],
    position: usize,
}

impl<'a> Instructions<'a> {
    pub(crate) fn new(words: &'a [Word]) -> Self {
        Self { words, position: 0 }
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = *self.words.get(self.position)?;
        let count = ((header >> 16) as usize).max(1);
        let end = (self.position + count).min(self.words.len());
        let instruction = Instruction::new_unchecked(&self.words[self.position..end]);
        self.position = end;
        Some(instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::WordBuffer;
    use spirv::{Capability, StorageClass};

    fn sample() -> WordBuffer {
        let mut buffer = WordBuffer::new();
        buffer.capability(Capability::Shader);
        let float = buffer.type_float(32);
        let ptr = buffer.type_pointer(StorageClass::Private, float);
        let half = buffer.constant_f32(float, 0.5);
        let var = buffer.variable(ptr, StorageClass::Private, Some(half));
        buffer.name(var, "Exposure");
        buffer
    }

    #[test]
    fn test_result_ids() {
        let buffer = sample();
        let results: Vec<_> = buffer.instructions().map(|i| i.result_id()).collect();
        assert_eq!(results, vec![None, Some(1), Some(2), Some(3), Some(4), None]);

        let constant = buffer.instructions().nth(3).unwrap();
        assert_eq!(constant.result_type(), Some(1));
        assert_eq!(constant.opcode(), Some(Op::Constant));
    }

    #[test]
    fn test_operands_by_name() {
        let buffer = sample();
        let variable = buffer.instructions().nth(4).unwrap();
        assert_eq!(variable.operand("storage class").unwrap().as_enum().unwrap(), 6);
        assert_eq!(variable.operand("initializer").unwrap().as_id().unwrap(), 3);

        let name = buffer.instructions().nth(5).unwrap();
        assert_eq!(name.operand("name").unwrap().as_str().unwrap(), "Exposure");

        let constant = buffer.instructions().nth(3).unwrap();
        assert_eq!(constant.operand("value").unwrap().as_f32().unwrap(), 0.5);
    }

    #[test]
    fn test_wrong_operand_kind() {
        let buffer = sample();
        let name = buffer.instructions().nth(5).unwrap();
        let err = name.operand("target").unwrap().as_str().unwrap_err();
        assert!(matches!(
            err,
            EncodingError::WrongOperandKind {
                name: "target",
                actual: OperandKind::IdRef,
                ..
            }
        ));
        assert!(matches!(
            name.operand("missing"),
            Err(EncodingError::UnknownOperand { .. })
        ));
    }

    #[test]
    fn test_renumbered_shifts_only_ids() {
        let buffer = sample();
        let variable = buffer.instructions().nth(4).unwrap();
        let shifted = variable.renumbered(10);
        assert_eq!(&shifted[1..], &[12, 14, 6, 13]);

        let float = buffer.instructions().nth(1).unwrap();
        assert_eq!(&float.renumbered(10)[1..], &[11, 32]);
    }

    #[test]
    fn test_display() {
        let buffer = sample();
        let lines: Vec<String> = buffer.instructions().map(|i| i.to_string()).collect();
        assert_eq!(lines[0], "OpCapability Shader");
        assert_eq!(lines[2], "%2 = OpTypePointer Private %1");
        assert_eq!(lines[4], "%4 = OpVariable %2 Private %3");
        assert_eq!(lines[5], "OpName %4 \"Exposure\"");
    }

    #[test]
    fn test_new_checks_length() {
        let words = [(3 << 16) | Op::TypeFloat as u32, 1];
        assert!(matches!(
            Instruction::new(&words),
            Err(EncodingError::Truncated { .. })
        ));
    }
}
