//! Effect composition: which mixins end up in a module, in which order.

use sdsl_resolve::typed::{EffectItem, Program, TypedEffect, TypedMixin};
use sdsl_resolve::{CompileError, ErrorKind};
use std::collections::HashSet;
use tracing::trace;

/// Mixins to lower for `effect`, bases before their dependents.
///
/// The implicit module mixin always comes first. Without an effect every
/// mixin is used in declaration order; with one, its statements are walked
/// in order with `child` effects inlined depth-first. A mixin appears once.
pub fn select_mixins<'p>(
    program: &'p Program,
    effect: Option<&str>,
) -> Result<Vec<&'p TypedMixin>, CompileError> {
    let mut selection = Selection {
        program,
        mixins: Vec::new(),
        seen: HashSet::new(),
        effects: Vec::new(),
    };

    for mixin in program.mixins.iter().filter(|mixin| mixin.implicit) {
        selection.add(&mixin.name, mixin.span)?;
    }

    match effect {
        None => {
            for mixin in &program.mixins {
                selection.add(&mixin.name, mixin.span)?;
            }
        }
        Some(name) => {
            let Some(effect) = program.effect(name) else {
                return Err(CompileError::new(
                    ErrorKind::UnresolvedMixin,
                    sdsl_ast::Span::zero(0),
                    format!("effect '{}' is not defined", name),
                ));
            };
            selection.effect(effect)?;
        }
    }

    Ok(selection.mixins)
}

/// Index of the mixin that owns entry function `name`: the last selected
/// mixin defining it with a body, so overrides win.
pub fn entry_owner(mixins: &[&TypedMixin], name: &str) -> Option<usize> {
    mixins.iter().rposition(|mixin| {
        mixin
            .functions
            .iter()
            .any(|function| function.name == name && function.body.is_some())
    })
}

struct Selection<'p> {
    program: &'p Program,
    mixins: Vec<&'p TypedMixin>,
    seen: HashSet<&'p str>,
    /// Effects being expanded, innermost last
    effects: Vec<&'p str>,
}

impl<'p> Selection<'p> {
    fn effect(&mut self, effect: &'p TypedEffect) -> Result<(), CompileError> {
        if self.effects.contains(&effect.name.as_str()) {
            return Err(CompileError::new(
                ErrorKind::UnresolvedMixin,
                effect.span,
                format!(
                    "effect '{}' includes itself through {}",
                    effect.name,
                    self.effects.join(" -> ")
                ),
            ));
        }
        self.effects.push(&effect.name);

        for item in &effect.items {
            match item {
                EffectItem::Mixin(name) => self.add(name, effect.span)?,
                EffectItem::Compose { slot, mixin } => {
                    trace!(slot = %slot, mixin = %mixin, "composing");
                    self.add(mixin, effect.span)?;
                }
                EffectItem::Child(name) => {
                    let program = self.program;
                    let Some(child) = program.effect(name) else {
                        return Err(CompileError::new(
                            ErrorKind::UnresolvedMixin,
                            effect.span,
                            format!("effect '{}' includes unknown effect '{}'", effect.name, name),
                        ));
                    };
                    self.effect(child)?;
                }
            }
        }

        self.effects.pop();
        Ok(())
    }

    fn add(&mut self, name: &str, span: sdsl_ast::Span) -> Result<(), CompileError> {
        if self.seen.contains(name) {
            return Ok(());
        }
        let program = self.program;
        let Some(mixin) = program.mixin(name) else {
            return Err(CompileError::new(
                ErrorKind::UnresolvedMixin,
                span,
                format!("mixin '{}' is not defined", name),
            ));
        };

        // Marked before the bases so an inheritance cycle terminates.
        self.seen.insert(&mixin.name);
        for base in &mixin.bases {
            self.add(base, mixin.span)?;
        }
        self.mixins.push(mixin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdsl_ast::Span;
    use sdsl_resolve::typed::TypedFunction;
    use sdsl_resolve::SymbolType;

    fn mixin(name: &str, bases: &[&str]) -> TypedMixin {
        TypedMixin {
            name: name.to_string(),
            bases: bases.iter().map(|base| base.to_string()).collect(),
            compositions: Vec::new(),
            structs: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            implicit: false,
            span: Span::zero(0),
        }
    }

    fn effect(name: &str, items: Vec<EffectItem>) -> TypedEffect {
        TypedEffect {
            name: name.to_string(),
            items,
            span: Span::zero(0),
        }
    }

    fn names(mixins: &[&TypedMixin]) -> Vec<String> {
        mixins.iter().map(|mixin| mixin.name.clone()).collect()
    }

    fn program() -> Program {
        let mut globals = mixin("ModuleGlobals", &[]);
        globals.implicit = true;
        Program {
            mixins: vec![
                mixin("Base", &[]),
                mixin("Lit", &["Base"]),
                mixin("Shadowed", &["Lit"]),
                globals,
            ],
            effects: vec![
                effect(
                    "Main",
                    vec![
                        EffectItem::Mixin("Shadowed".to_string()),
                        EffectItem::Child("Extra".to_string()),
                    ],
                ),
                effect(
                    "Extra",
                    vec![EffectItem::Compose {
                        slot: "light".to_string(),
                        mixin: "Lit".to_string(),
                    }],
                ),
                effect("Loop", vec![EffectItem::Child("Loop".to_string())]),
            ],
        }
    }

    #[test]
    fn test_without_effect_uses_every_mixin() {
        let program = program();
        let selected = select_mixins(&program, None).unwrap();
        assert_eq!(
            names(&selected),
            vec!["ModuleGlobals", "Base", "Lit", "Shadowed"]
        );
    }

    #[test]
    fn test_effect_pulls_bases_first_and_skips_duplicates() {
        let program = program();
        let selected = select_mixins(&program, Some("Main")).unwrap();
        assert_eq!(
            names(&selected),
            vec!["ModuleGlobals", "Base", "Lit", "Shadowed"]
        );
    }

    #[test]
    fn test_unknown_effect() {
        let program = program();
        let error = select_mixins(&program, Some("Missing")).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnresolvedMixin);
    }

    #[test]
    fn test_effect_cycle_is_reported() {
        let program = program();
        let error = select_mixins(&program, Some("Loop")).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnresolvedMixin);
        assert!(error.message.contains("Loop"));
    }

    #[test]
    fn test_entry_owner_prefers_the_last_definition() {
        let function = TypedFunction {
            name: "main".to_string(),
            return_type: SymbolType::Void,
            param_count: 0,
            locals: Vec::new(),
            semantic: None,
            body: Some(Vec::new()),
            is_override: false,
            span: Span::zero(0),
        };
        let mut base = mixin("Base", &[]);
        base.functions.push(function.clone());
        let mut derived = mixin("Derived", &["Base"]);
        derived.functions.push(function);
        let other = mixin("Other", &[]);

        let mixins = [&base, &derived, &other];
        assert_eq!(entry_owner(&mixins, "main"), Some(1));
        assert_eq!(entry_owner(&mixins, "missing"), None);
    }
}
