//! Compiled mixin: a named, immutable word buffer.

use crate::buffer::WordBuffer;
use crate::group::{classify, InstructionGroup};
use crate::instruction::Instruction;
use crate::Word;

/// One mixin's instructions with their own id space starting at 1.
///
/// Built once, then shared read-only (usually behind an `Arc`) by every
/// graph that composes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mixin {
    name: String,
    buffer: WordBuffer,
    starts: Vec<usize>,
    groups: Vec<InstructionGroup>,
}

impl Mixin {
    pub fn new(name: impl Into<String>, buffer: WordBuffer) -> Self {
        let mut starts = Vec::with_capacity(buffer.len());
        let mut position = 0;
        for instruction in buffer.instructions() {
            starts.push(position);
            position += instruction.word_count();
        }
        let groups = classify(buffer.instructions());
        Self {
            name: name.into(),
            buffer,
            starts,
            groups,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &WordBuffer {
        &self.buffer
    }

    pub fn bound(&self) -> Word {
        self.buffer.bound()
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Instruction at `index`, or `None` past the end.
    pub fn instruction(&self, index: usize) -> Option<Instruction<'_>> {
        let start = *self.starts.get(index)?;
        let end = self
            .starts
            .get(index + 1)
            .copied()
            .unwrap_or(self.buffer.words().len());
        Some(Instruction::new_unchecked(&self.buffer.words()[start..end]))
    }

    pub fn instructions(&self) -> impl Iterator<Item = Instruction<'_>> + '_ {
        self.buffer.instructions()
    }

    /// Section of the instruction at `index`.
    pub fn group(&self, index: usize) -> Option<InstructionGroup> {
        self.groups.get(index).copied()
    }

    pub fn groups(&self) -> &[InstructionGroup] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spirv::{Capability, Op};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_mixin_is_shareable() {
        assert_send_sync::<Mixin>();
    }

    #[test]
    fn test_random_access() {
        let mut buffer = WordBuffer::new();
        buffer.capability(Capability::Shader);
        let float = buffer.type_float(32);
        buffer.name(float, "float");
        let mixin = Mixin::new("Base", buffer);

        assert_eq!(mixin.name(), "Base");
        assert_eq!(mixin.len(), 3);
        assert_eq!(mixin.bound(), 2);
        assert_eq!(mixin.instruction(1).unwrap().opcode(), Some(Op::TypeFloat));
        assert_eq!(mixin.instruction(2).unwrap().opcode(), Some(Op::Name));
        assert!(mixin.instruction(3).is_none());
        assert_eq!(mixin.group(2), Some(InstructionGroup::Debug));
    }
}
