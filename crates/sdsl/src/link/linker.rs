//! Graph materialization with import resolution and declaration merging.

use sdsl_ast::Span;
use sdsl_resolve::{CompileError, ErrorKind};
use sdsl_spirv::spirv::{Capability, ExecutionModel, LinkageType, Op, StorageClass};
use sdsl_spirv::{EncodingError, Id, Instruction, MixinGraph, Word, WordBuffer};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// One renumbered instruction and the mixin it came from.
struct Linked<'g> {
    mixin: &'g str,
    words: Vec<Word>,
}

/// Materialize `graph` as one linked module.
///
/// - every `Import` resolves to the `Export` of the same name, and the
///   import declaration disappears; the first export of a name wins, so
///   a stream declared by several mixins becomes one variable
/// - structurally identical types, constants and extended instruction
///   imports are merged (structs also by name)
/// - linkage decorations and the `Linkage` capability are dropped, and
///   capabilities are listed once
/// - the entry point interface lists every module-scope variable
pub fn link(graph: &MixinGraph) -> Result<WordBuffer, Vec<CompileError>> {
    let instructions: Vec<Linked<'_>> = graph
        .sorted()
        .map(|instruction| Linked {
            mixin: instruction.mixin().name(),
            words: instruction.words(),
        })
        .collect();

    let mut linker = Linker::default();
    let errors = linker.resolve_linkage(&instructions);
    if !errors.is_empty() {
        return Err(errors);
    }
    linker.merge_declarations(&instructions);

    let mut output = WordBuffer::new();
    output.extend_bound(graph.bound());
    linker
        .emit(&instructions, &mut output)
        .map_err(|error| vec![internal(error)])?;

    debug!(
        instructions = output.len(),
        merged = linker.removed.len(),
        bound = output.bound(),
        "linked module"
    );
    Ok(output)
}

fn internal(error: EncodingError) -> CompileError {
    CompileError::new(
        ErrorKind::Internal,
        Span::zero(0),
        format!("linking produced an invalid instruction: {}", error),
    )
}

#[derive(Default)]
struct Linker {
    /// Dropped id → the id that replaces it
    remap: HashMap<Id, Id>,
    /// Ids whose declaring instruction is dropped
    removed: HashSet<Id>,
    names: HashMap<Id, String>,
    /// Module-scope variables that survive, for the entry point
    interface: Vec<Id>,
}

impl Linker {
    fn resolve(&self, mut id: Id) -> Id {
        while let Some(&next) = self.remap.get(&id) {
            id = next;
        }
        id
    }

    fn replace(&mut self, id: Id, with: Id) {
        self.remap.insert(id, with);
        self.removed.insert(id);
    }

    /// Pair imports with exports; returns the unresolved imports.
    fn resolve_linkage(&mut self, instructions: &[Linked<'_>]) -> Vec<CompileError> {
        let mut exports: HashMap<String, Id> = HashMap::new();
        let mut imports = Vec::new();

        for linked in instructions {
            let Ok(instruction) = Instruction::new(&linked.words) else {
                continue;
            };
            match instruction.opcode() {
                Some(Op::Name) => {
                    if let (Ok(target), Ok(name)) = (
                        instruction.operand("target").and_then(|op| op.as_id()),
                        instruction.operand("name").and_then(|op| op.as_str()),
                    ) {
                        self.names.insert(target, name);
                    }
                }
                Some(Op::Decorate) => match instruction.linkage() {
                    Some((target, name, LinkageType::Export)) => match exports.entry(name) {
                        Entry::Occupied(first) => {
                            trace!(symbol = %first.key(), "merged duplicate export");
                            let first = *first.get();
                            self.replace(target, first);
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(target);
                        }
                    },
                    Some((target, name, _)) => imports.push((target, name, linked.mixin)),
                    None => {}
                },
                _ => {}
            }
        }

        let mut errors = Vec::new();
        for (target, name, mixin) in imports {
            match exports.get(&name) {
                Some(&export) => self.replace(target, export),
                None => {
                    let symbol = name.split('#').next().unwrap_or(&name);
                    errors.push(CompileError::new(
                        ErrorKind::UndefinedName,
                        Span::zero(0),
                        format!(
                            "'{}' used by mixin '{}' is not defined by any mixin in the module",
                            symbol, mixin
                        ),
                    ));
                }
            }
        }
        errors
    }

    /// Merge duplicate types, constants and instruction set imports, and
    /// drop the parameters of removed function declarations.
    fn merge_declarations(&mut self, instructions: &[Linked<'_>]) {
        let mut seen: HashMap<(Vec<Word>, Option<String>), Id> = HashMap::new();
        let mut dropping_function = false;

        for linked in instructions {
            let Ok(instruction) = Instruction::new(&linked.words) else {
                continue;
            };
            let Some(op) = instruction.opcode() else {
                continue;
            };
            let result = instruction.result_id();

            match op {
                Op::Function => {
                    dropping_function = result.is_some_and(|id| self.removed.contains(&id));
                    continue;
                }
                Op::FunctionParameter if dropping_function => {
                    if let Some(id) = result {
                        self.removed.insert(id);
                    }
                    continue;
                }
                Op::FunctionEnd => {
                    dropping_function = false;
                    continue;
                }
                Op::Variable => {
                    let storage = instruction
                        .operand("storage class")
                        .and_then(|op| op.as_enum());
                    if let (Some(id), Ok(storage)) = (result, storage) {
                        if storage != StorageClass::Function as u32 && !self.removed.contains(&id) {
                            self.interface.push(id);
                        }
                    }
                    continue;
                }
                _ if !mergeable(op) => continue,
                _ => {}
            }

            let (Some(result), Some(result_word), Ok(positions)) = (
                result,
                instruction.info().and_then(|info| info.result_word()),
                instruction.id_positions(),
            ) else {
                continue;
            };
            let mut key = linked.words.clone();
            for position in positions {
                key[position] = self.resolve(key[position]);
            }
            key[result_word] = 0;
            let name = if op == Op::TypeStruct {
                self.names.get(&result).cloned()
            } else {
                None
            };

            match seen.entry((key, name)) {
                Entry::Occupied(first) => {
                    let first = *first.get();
                    self.replace(result, first);
                }
                Entry::Vacant(slot) => {
                    slot.insert(result);
                }
            }
        }
    }

    fn emit(&self, instructions: &[Linked<'_>], output: &mut WordBuffer) -> Result<(), EncodingError> {
        let mut capabilities = HashSet::new();
        let mut skipping_function = false;

        for linked in instructions {
            let instruction = Instruction::new(&linked.words)?;
            let op = instruction.opcode();
            if skipping_function {
                skipping_function = op != Some(Op::FunctionEnd);
                continue;
            }
            let removed = |id: Option<Id>| id.is_some_and(|id| self.removed.contains(&id));

            match op {
                Some(Op::Capability) => {
                    let capability = linked.words[1];
                    if capability == Capability::Linkage as u32 || !capabilities.insert(capability) {
                        continue;
                    }
                }
                Some(Op::Decorate) if instruction.linkage().is_some() => continue,
                Some(Op::Name | Op::MemberName | Op::Decorate | Op::MemberDecorate)
                    if removed(linked.words.get(1).copied()) =>
                {
                    continue;
                }
                Some(Op::Function) if removed(instruction.result_id()) => {
                    skipping_function = true;
                    continue;
                }
                Some(Op::EntryPoint) => {
                    self.entry_point(&instruction, output)?;
                    continue;
                }
                _ if removed(instruction.result_id()) => continue,
                _ => {}
            }

            let mut words = linked.words.clone();
            if instruction.info().is_some() {
                for position in instruction.id_positions()? {
                    words[position] = self.resolve(words[position]);
                }
            }
            output.push_words(&words)?;
        }
        Ok(())
    }

    /// Re-encode an entry point with the linked interface.
    fn entry_point(&self, instruction: &Instruction<'_>, output: &mut WordBuffer) -> Result<(), EncodingError> {
        let model = instruction.operand("execution model")?.as_enum()?;
        let function = self.resolve(instruction.operand("entry point")?.as_id()?);
        let name = instruction.operand("name")?.as_str()?;
        let Some(model) = ExecutionModel::from_u32(model) else {
            return Err(EncodingError::Malformed {
                op: Op::EntryPoint,
                position: 1,
                message: format!("unknown execution model {}", model),
            });
        };
        output.entry_point(model, function, &name, &self.interface);
        Ok(())
    }
}

/// Declarations that are equal whenever their words are.
fn mergeable(op: Op) -> bool {
    matches!(
        op,
        Op::ExtInstImport
            | Op::TypeVoid
            | Op::TypeBool
            | Op::TypeInt
            | Op::TypeFloat
            | Op::TypeVector
            | Op::TypeMatrix
            | Op::TypeArray
            | Op::TypeRuntimeArray
            | Op::TypeStruct
            | Op::TypePointer
            | Op::TypeFunction
            | Op::ConstantTrue
            | Op::ConstantFalse
            | Op::Constant
            | Op::ConstantComposite
            | Op::ConstantNull
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdsl_spirv::spirv::FunctionControl;
    use sdsl_spirv::Mixin;
    use std::sync::Arc;

    fn count(buffer: &WordBuffer, op: Op) -> usize {
        buffer
            .instructions()
            .filter(|instruction| instruction.opcode() == Some(op))
            .count()
    }

    /// `float Shade()` defined and exported.
    fn owner() -> Mixin {
        let mut buffer = WordBuffer::new();
        buffer.capability(Capability::Linkage);
        let float = buffer.type_float(32);
        let fn_ty = buffer.type_function(float, &[]);
        let one = buffer.constant_f32(float, 1.0);
        let function = buffer.reserve_id();
        buffer.name(function, "Shade");
        buffer.decorate_linkage(function, "Base.Shade#0", LinkageType::Export);
        buffer.function_with_id(function, float, FunctionControl::NONE, fn_ty);
        buffer.label();
        buffer.ret_value(one);
        buffer.function_end();
        Mixin::new("Base", buffer.sorted())
    }

    /// Calls the imported `Shade` and keeps the result in a private.
    fn user(symbol: &str) -> Mixin {
        let mut buffer = WordBuffer::new();
        buffer.capability(Capability::Shader);
        buffer.capability(Capability::Linkage);
        let void = buffer.type_void();
        let float = buffer.type_float(32);
        let main_ty = buffer.type_function(void, &[]);
        let shade_ty = buffer.type_function(float, &[]);
        let ptr = buffer.type_pointer(StorageClass::Private, float);
        let var = buffer.variable(ptr, StorageClass::Private, None);

        let shade = buffer.function(float, FunctionControl::NONE, shade_ty);
        buffer.function_end();
        buffer.decorate_linkage(shade, symbol, LinkageType::Import);

        let main = buffer.function(void, FunctionControl::NONE, main_ty);
        buffer.label();
        let value = buffer.function_call(float, shade, &[]);
        buffer.store(var, value);
        buffer.ret();
        buffer.function_end();
        buffer.entry_point(ExecutionModel::Fragment, main, "main", &[]);
        Mixin::new("User", buffer.sorted())
    }

    #[test]
    fn test_imports_resolve_and_types_merge() {
        let graph = MixinGraph::new(vec![Arc::new(owner()), Arc::new(user("Base.Shade#0"))]);
        let linked = link(&graph).unwrap();
        linked.validate_layout().unwrap();

        assert_eq!(count(&linked, Op::TypeFloat), 1);
        assert_eq!(count(&linked, Op::TypeVoid), 1);
        assert_eq!(count(&linked, Op::Function), 2);
        assert_eq!(count(&linked, Op::Capability), 1);

        let shade = linked
            .instructions()
            .find(|i| i.opcode() == Some(Op::Function))
            .and_then(|i| i.result_id())
            .unwrap();
        let call = linked
            .instructions()
            .find(|i| i.opcode() == Some(Op::FunctionCall))
            .unwrap();
        assert_eq!(call.operand("function").unwrap().as_id().unwrap(), shade);

        let entry = linked
            .instructions()
            .find(|i| i.opcode() == Some(Op::EntryPoint))
            .unwrap();
        let interface: Vec<_> = entry
            .operands()
            .unwrap()
            .into_iter()
            .filter(|operand| operand.name() == "interface")
            .collect();
        assert_eq!(interface.len(), 1);
        assert!(linked.instructions().all(|i| i.linkage().is_none()));
    }

    #[test]
    fn test_unresolved_import_is_reported() {
        let graph = MixinGraph::new(vec![Arc::new(owner()), Arc::new(user("Base.Missing#3"))]);
        let errors = link(&graph).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::UndefinedName);
        assert!(errors[0].message.contains("'Base.Missing'"));
        assert!(errors[0].message.contains("'User'"));
    }

    #[test]
    fn test_duplicate_exports_share_one_definition() {
        let stream = |name: &str| {
            let mut buffer = WordBuffer::new();
            let float = buffer.type_float(32);
            let ptr = buffer.type_pointer(StorageClass::Private, float);
            let var = buffer.variable(ptr, StorageClass::Private, None);
            buffer.name(var, "streams.Depth");
            buffer.decorate_linkage(var, "streams.Depth", LinkageType::Export);
            Mixin::new(name, buffer.sorted())
        };
        let graph = MixinGraph::new(vec![Arc::new(stream("A")), Arc::new(stream("B"))]);
        let linked = link(&graph).unwrap();
        assert_eq!(count(&linked, Op::Variable), 1);
        assert_eq!(count(&linked, Op::Name), 1);
        assert_eq!(count(&linked, Op::TypePointer), 1);
    }
}
