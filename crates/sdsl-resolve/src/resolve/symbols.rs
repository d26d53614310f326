//! Symbol table.
//!
//! Lexical scopes are a stack of frames on top of a root frame. Two more
//! frames sit beside the stack: the stream frame holding every `stream`
//! variable (reached only through `streams.X`) and the imported frame
//! holding symbols merged from external [`SymbolProvider`]s.
//!
//! # Lookup order
//!
//! innermost frame → ... → root frame → imported frame
//!
//! # Scopes
//!
//! [`SymbolTable::scope`] returns a guard that pops its frame when dropped,
//! so a scope opened while checking a block is closed on every exit path.
//! `push`/`pop` remain available for callers that manage frames manually.

use super::types::SymbolType;
use indexmap::IndexMap;
use sdsl_ast::Span;
use std::ops::{Deref, DerefMut};

/// What a name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Function,
    Type,
    StreamInput,
    Composition,
}

/// Resolved symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: SymbolType,
    /// Scope depth at which the symbol was declared (0 = root)
    pub depth: usize,
    /// Mixin that owns the symbol; `None` for locals and imported built-ins
    pub mixin: Option<String>,
    /// Extended instruction number for built-in intrinsics
    pub intrinsic: Option<u32>,
    /// Slot of a local variable or parameter inside its function
    pub slot: Option<u32>,
    pub span: Span,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: SymbolType) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            depth: 0,
            mixin: None,
            intrinsic: None,
            slot: None,
            span: Span::zero(0),
        }
    }

    pub fn in_mixin(mut self, mixin: impl Into<String>) -> Self {
        self.mixin = Some(mixin.into());
        self
    }

    pub fn with_intrinsic(mut self, number: u32) -> Self {
        self.intrinsic = Some(number);
        self
    }

    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Parameter types and return type of a function symbol.
    pub fn signature(&self) -> Option<(&SymbolType, &[SymbolType])> {
        match &self.ty {
            SymbolType::Function { ret, params } => Some((ret, params)),
            _ => None,
        }
    }
}

/// External source of root symbols and types (built-in intrinsics).
pub trait SymbolProvider {
    fn symbols(&self) -> &[Symbol];
    fn types(&self) -> &[(String, SymbolType)];
}

/// One lexical scope. A name may map to several symbols: a type and a
/// variable can share a name, and functions overload.
#[derive(Debug, Clone, Default)]
pub struct SymbolFrame {
    symbols: IndexMap<String, Vec<Symbol>>,
}

impl SymbolFrame {
    fn find(&self, name: &str, kind: SymbolKind) -> Option<&Symbol> {
        self.symbols
            .get(name)?
            .iter()
            .find(|symbol| symbol.kind == kind)
    }

    fn find_any(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)?.first()
    }

    fn all(&self, name: &str, kind: SymbolKind) -> Vec<&Symbol> {
        self.symbols
            .get(name)
            .map(|symbols| symbols.iter().filter(|s| s.kind == kind).collect())
            .unwrap_or_default()
    }

    fn insert(&mut self, symbol: Symbol) {
        self.symbols
            .entry(symbol.name.clone())
            .or_default()
            .push(symbol);
    }

    /// Existing symbol that `symbol` would clash with.
    fn conflict(&self, symbol: &Symbol) -> Option<&Symbol> {
        self.symbols.get(&symbol.name)?.iter().find(|existing| {
            if existing.kind != symbol.kind {
                return false;
            }
            match (&existing.ty, &symbol.ty) {
                (
                    SymbolType::Function { params: a, .. },
                    SymbolType::Function { params: b, .. },
                ) => a == b,
                _ => true,
            }
        })
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.symbols.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped symbol table used by the checker.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    root: SymbolFrame,
    frames: Vec<SymbolFrame>,
    streams: SymbolFrame,
    imported: SymbolFrame,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open frames above the root.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self) {
        self.frames.push(SymbolFrame::default());
    }

    /// Close the innermost frame.
    ///
    /// # Panics
    /// Panics when only the root frame is left; that is an unpaired pop.
    pub fn pop(&mut self) {
        self.frames
            .pop()
            .expect("BUG: SymbolTable::pop without matching push");
    }

    /// Open a frame that is closed when the guard drops.
    pub fn scope(&mut self) -> ScopeGuard<'_> {
        self.push();
        ScopeGuard { table: self }
    }

    fn current_mut(&mut self) -> &mut SymbolFrame {
        self.frames.last_mut().unwrap_or(&mut self.root)
    }

    fn current(&self) -> &SymbolFrame {
        self.frames.last().unwrap_or(&self.root)
    }

    /// Declare a symbol in the innermost frame.
    ///
    /// Fails with the existing symbol when the frame already holds a symbol
    /// of the same name and kind. Functions only clash when their parameter
    /// types are identical.
    pub fn declare(&mut self, mut symbol: Symbol) -> Result<(), &Symbol> {
        symbol.depth = self.depth();
        if self.current().conflict(&symbol).is_some() {
            return Err(self
                .current()
                .conflict(&symbol)
                .expect("BUG: conflict vanished between lookups"));
        }
        self.current_mut().insert(symbol);
        Ok(())
    }

    /// Declare a symbol in the root frame regardless of open scopes.
    pub fn declare_root(&mut self, mut symbol: Symbol) -> Result<(), &Symbol> {
        symbol.depth = 0;
        if self.root.conflict(&symbol).is_some() {
            return Err(self
                .root
                .conflict(&symbol)
                .expect("BUG: conflict vanished between lookups"));
        }
        self.root.insert(symbol);
        Ok(())
    }

    /// Declare a stream variable.
    pub fn declare_stream(&mut self, mut symbol: Symbol) -> Result<(), &Symbol> {
        symbol.kind = SymbolKind::StreamInput;
        if self.streams.conflict(&symbol).is_some() {
            return Err(self
                .streams
                .conflict(&symbol)
                .expect("BUG: conflict vanished between lookups"));
        }
        self.streams.insert(symbol);
        Ok(())
    }

    fn lookup_chain(&self) -> impl Iterator<Item = &SymbolFrame> {
        self.frames
            .iter()
            .rev()
            .chain(std::iter::once(&self.root))
            .chain(std::iter::once(&self.imported))
    }

    /// Innermost symbol of `kind` named `name`.
    pub fn try_find(&self, name: &str, kind: SymbolKind) -> Option<&Symbol> {
        self.lookup_chain().find_map(|frame| frame.find(name, kind))
    }

    /// Innermost symbol of any kind named `name`.
    pub fn try_find_any(&self, name: &str) -> Option<&Symbol> {
        self.lookup_chain().find_map(|frame| frame.find_any(name))
    }

    /// Every overload of `name` from the innermost frame declaring it.
    pub fn find_functions(&self, name: &str) -> Vec<&Symbol> {
        self.lookup_chain()
            .map(|frame| frame.all(name, SymbolKind::Function))
            .find(|overloads| !overloads.is_empty())
            .unwrap_or_default()
    }

    /// Stream variable named `name`.
    pub fn find_stream(&self, name: &str) -> Option<&Symbol> {
        self.streams.find_any(name)
    }

    pub fn streams(&self) -> &SymbolFrame {
        &self.streams
    }

    /// Merge a provider's symbols and types into the imported frame.
    ///
    /// Names already present in the root or imported frame keep their
    /// existing meaning; overloads supplied by one provider are kept
    /// together. Returns the number of symbols added.
    pub fn import(&mut self, provider: &dyn SymbolProvider) -> usize {
        let taken = |table: &SymbolTable, name: &str, kind: SymbolKind| {
            table.root.find(name, kind).is_some() || table.imported.find(name, kind).is_some()
        };

        let mut added = Vec::new();
        for (name, ty) in provider.types() {
            if !taken(self, name, SymbolKind::Type) {
                added.push(Symbol::new(name.clone(), SymbolKind::Type, ty.clone()));
            }
        }
        for symbol in provider.symbols() {
            if !taken(self, &symbol.name, symbol.kind) {
                added.push(symbol.clone());
            }
        }

        let count = added.len();
        for mut symbol in added {
            symbol.depth = 0;
            self.imported.insert(symbol);
        }
        count
    }
}

/// Frame guard returned by [`SymbolTable::scope`].
pub struct ScopeGuard<'a> {
    table: &'a mut SymbolTable,
}

impl Deref for ScopeGuard<'_> {
    type Target = SymbolTable;

    fn deref(&self) -> &SymbolTable {
        self.table
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut SymbolTable {
        self.table
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.table.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(name: &str, ty: SymbolType) -> Symbol {
        Symbol::new(name, SymbolKind::Variable, ty)
    }

    struct Builtins {
        symbols: Vec<Symbol>,
        types: Vec<(String, SymbolType)>,
    }

    impl SymbolProvider for Builtins {
        fn symbols(&self) -> &[Symbol] {
            &self.symbols
        }
        fn types(&self) -> &[(String, SymbolType)] {
            &self.types
        }
    }

    fn function(name: &str, params: Vec<SymbolType>) -> Symbol {
        Symbol::new(
            name,
            SymbolKind::Function,
            SymbolType::Function {
                ret: Box::new(SymbolType::FLOAT),
                params,
            },
        )
    }

    #[test]
    fn test_innermost_frame_wins() {
        let mut table = SymbolTable::new();
        table.declare(variable("x", SymbolType::FLOAT)).unwrap();
        {
            let mut scope = table.scope();
            scope.declare(variable("x", SymbolType::INT)).unwrap();
            assert_eq!(scope.try_find("x", SymbolKind::Variable).unwrap().ty, SymbolType::INT);
            assert_eq!(scope.try_find("x", SymbolKind::Variable).unwrap().depth, 1);
        }
        assert_eq!(table.depth(), 0);
        assert_eq!(table.try_find("x", SymbolKind::Variable).unwrap().ty, SymbolType::FLOAT);
    }

    #[test]
    fn test_kind_filtering() {
        let mut table = SymbolTable::new();
        table
            .declare(Symbol::new(
                "Light",
                SymbolKind::Type,
                SymbolType::Struct {
                    name: "Light".into(),
                    fields: vec![],
                },
            ))
            .unwrap();
        table.declare(variable("Light", SymbolType::FLOAT)).unwrap();

        assert!(matches!(
            table.try_find("Light", SymbolKind::Type).unwrap().ty,
            SymbolType::Struct { .. }
        ));
        assert_eq!(table.try_find("Light", SymbolKind::Variable).unwrap().ty, SymbolType::FLOAT);
        assert_eq!(table.try_find_any("Light").unwrap().kind, SymbolKind::Type);
        assert!(table.try_find("Light", SymbolKind::Function).is_none());
    }

    #[test]
    fn test_duplicates_and_overloads() {
        let mut table = SymbolTable::new();
        table.declare(variable("x", SymbolType::FLOAT)).unwrap();
        let existing = table.declare(variable("x", SymbolType::INT)).unwrap_err();
        assert_eq!(existing.ty, SymbolType::FLOAT);

        table.declare(function("f", vec![SymbolType::FLOAT])).unwrap();
        table.declare(function("f", vec![SymbolType::INT])).unwrap();
        assert!(table.declare(function("f", vec![SymbolType::INT])).is_err());
        assert_eq!(table.find_functions("f").len(), 2);
    }

    #[test]
    fn test_scope_guard_pops_on_early_exit() {
        fn fails(table: &mut SymbolTable) -> Result<(), ()> {
            let mut scope = table.scope();
            scope.declare(variable("tmp", SymbolType::FLOAT)).unwrap();
            Err(())
        }

        let mut table = SymbolTable::new();
        assert!(fails(&mut table).is_err());
        assert_eq!(table.depth(), 0);
        assert!(table.try_find_any("tmp").is_none());
    }

    #[test]
    #[should_panic(expected = "without matching push")]
    fn test_unpaired_pop_panics() {
        SymbolTable::new().pop();
    }

    #[test]
    fn test_import_first_writer_wins() {
        let mut table = SymbolTable::new();
        table.declare_root(function("dot", vec![SymbolType::INT])).unwrap();

        let first = Builtins {
            symbols: vec![
                function("dot", vec![SymbolType::FLOAT]),
                function("lerp", vec![SymbolType::FLOAT]),
                function("lerp", vec![SymbolType::builtin("float3").unwrap()]),
            ],
            types: vec![("Texture2D".into(), SymbolType::Unknown)],
        };
        let second = Builtins {
            symbols: vec![function("lerp", vec![SymbolType::INT])],
            types: vec![("Texture2D".into(), SymbolType::FLOAT)],
        };

        assert_eq!(table.import(&first), 3);
        assert_eq!(table.import(&second), 0);

        // Root definition of `dot` is kept.
        let dots = table.find_functions("dot");
        assert_eq!(dots.len(), 1);
        assert_eq!(dots[0].signature().unwrap().1, &[SymbolType::INT]);

        assert_eq!(table.find_functions("lerp").len(), 2);
        assert_eq!(
            table.try_find("Texture2D", SymbolKind::Type).unwrap().ty,
            SymbolType::Unknown
        );
    }

    #[test]
    fn test_stream_frame_is_separate() {
        let mut table = SymbolTable::new();
        table
            .declare_stream(variable("Color", SymbolType::builtin("float4").unwrap()).in_mixin("A"))
            .unwrap();
        assert!(table.try_find_any("Color").is_none());
        let stream = table.find_stream("Color").unwrap();
        assert_eq!(stream.kind, SymbolKind::StreamInput);
        assert_eq!(stream.mixin.as_deref(), Some("A"));
        assert!(table
            .declare_stream(variable("Color", SymbolType::FLOAT))
            .is_err());
    }
}
