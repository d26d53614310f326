//! Text disassembly, one instruction per line.

use crate::buffer::WordBuffer;
use crate::error::Result;
use crate::instruction::Instruction;
use crate::{Id, Word};
use spirv::Op;
use std::collections::HashMap;
use std::fmt::Write;

/// Stateful line renderer. Remembers float type declarations so that
/// constants of those types print as floats instead of raw bits.
#[derive(Debug, Default)]
pub struct Disassembler {
    float_widths: HashMap<Id, u32>,
}

impl Disassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one instruction. Float types must be seen before the
    /// constants that use them.
    pub fn line(&mut self, instruction: &Instruction<'_>) -> String {
        if instruction.opcode() == Some(Op::TypeFloat) {
            if let (Some(id), Some(&width)) = (instruction.result_id(), instruction.words().get(2))
            {
                self.float_widths.insert(id, width);
            }
        }

        let float_width = match instruction.opcode() {
            Some(Op::Constant) => instruction
                .result_type()
                .and_then(|ty| self.float_widths.get(&ty).copied()),
            _ => None,
        };

        let mut line = String::new();
        // Writing to a String cannot fail.
        let _ = instruction.write(&mut line, float_width);
        line
    }

    pub fn disassemble<'a>(
        &mut self,
        instructions: impl IntoIterator<Item = Instruction<'a>>,
    ) -> String {
        let mut text = String::new();
        for instruction in instructions {
            text.push_str(&self.line(&instruction));
            text.push('\n');
        }
        text
    }
}

/// Disassemble a whole module, header included.
pub fn disassemble_module(words: &[Word]) -> Result<String> {
    let buffer = WordBuffer::from_words(words)?;
    let header = buffer.header();
    let (major, minor) = header.version();

    let mut text = String::new();
    let _ = writeln!(text, "; SPIR-V");
    let _ = writeln!(text, "; Version: {}.{}", major, minor);
    let _ = writeln!(text, "; Generator: {:#x}", header.generator);
    let _ = writeln!(text, "; Bound: {}", header.bound);
    let _ = writeln!(text, "; Schema: {}", header.schema);
    text.push_str(&Disassembler::new().disassemble(buffer.instructions()));
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_constants() {
        let mut buffer = WordBuffer::new();
        let float = buffer.type_float(32);
        let int = buffer.type_int(32, true);
        buffer.constant_f32(float, 1.5);
        buffer.constant_u32(int, 7);

        let text = Disassembler::new().disassemble(buffer.instructions());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "%1 = OpTypeFloat 32",
                "%2 = OpTypeInt 32 1",
                "%3 = OpConstant %1 1.5",
                "%4 = OpConstant %2 7",
            ]
        );
    }

    #[test]
    fn test_module_header() {
        let mut buffer = WordBuffer::new();
        buffer.type_void();
        let text = disassemble_module(&buffer.to_words()).unwrap();
        assert!(text.starts_with("; SPIR-V\n"));
        assert!(text.contains("; Bound: 2\n"));
        assert!(text.ends_with("%1 = OpTypeVoid\n"));
    }
}
