//! Fluent construction of module definitions.
//!
//! The compiler normally produces definitions; the builder exists so tests,
//! demos and tooling can assemble small modules in code.

use std::collections::BTreeMap;

use crate::errors::ModuleError;

use super::element::{ActionDef, ActionType, BlockEntry, ElementDef, ElementKind};
use super::operation::{Block, FunctionDef, Operation};
use super::trigger::TriggerKey;
use super::{Module, ModuleDefinition, WORLD_IDENTITY};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ElementDef {
    pub fn new(identity: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            identity: identity.into(),
            kind,
            parent: None,
            archetype: false,
            blocks: Vec::new(),
            functions: Vec::new(),
            names: Vec::new(),
            determiners: Vec::new(),
            tags: Vec::new(),
            action: None,
        }
    }

    pub fn world() -> Self {
        Self::new(WORLD_IDENTITY, ElementKind::World)
    }

    pub fn player(identity: impl Into<String>) -> Self {
        Self::new(identity, ElementKind::Player)
    }

    pub fn room(identity: impl Into<String>) -> Self {
        Self::new(identity, ElementKind::Room)
    }

    pub fn object(identity: impl Into<String>) -> Self {
        Self::new(identity, ElementKind::Object)
    }

    pub fn container(identity: impl Into<String>) -> Self {
        Self::new(identity, ElementKind::Container)
    }

    /// Action element selected by any of `names`.
    pub fn action(identity: impl Into<String>, action_type: ActionType, names: &[&str]) -> Self {
        let mut def = Self::new(identity, ElementKind::Action);
        def.action = Some(ActionDef {
            action_type,
            names: strings(names),
            extra_strings: Vec::new(),
            strict: false,
            reversed: false,
        });
        def
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn archetype(mut self) -> Self {
        self.archetype = true;
        self
    }

    /// Bind a block to `trigger`.
    pub fn on(mut self, trigger: TriggerKey, ops: Vec<Operation>) -> Self {
        self.blocks.push(BlockEntry {
            trigger,
            block: Block::new(ops),
        });
        self
    }

    pub fn function(mut self, name: &str, arguments: &[&str], ops: Vec<Operation>) -> Self {
        self.functions.push(FunctionDef {
            name: name.to_string(),
            arguments: strings(arguments),
            block: Block::new(ops),
        });
        self
    }

    pub fn names(mut self, names: &[&str]) -> Self {
        self.names.extend(strings(names));
        self
    }

    pub fn determiners(mut self, determiners: &[&str]) -> Self {
        self.determiners.extend(strings(determiners));
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags.extend(strings(tags));
        self
    }

    /// Modes of a modal action.
    pub fn modes(self, modes: &[&str]) -> Self {
        self.with_extra_strings(modes)
    }

    /// Conjunctions of a ditransitive action.
    pub fn conjunctions(self, conjunctions: &[&str]) -> Self {
        self.with_extra_strings(conjunctions)
    }

    pub fn strict(mut self) -> Self {
        if let Some(action) = self.action.as_mut() {
            action.strict = true;
        }
        self
    }

    pub fn reversed(mut self) -> Self {
        if let Some(action) = self.action.as_mut() {
            action.reversed = true;
        }
        self
    }

    fn with_extra_strings(mut self, items: &[&str]) -> Self {
        if let Some(action) = self.action.as_mut() {
            action.extra_strings.extend(strings(items));
        }
        self
    }
}

/// Collects header entries and elements, then links them.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    header: BTreeMap<String, String>,
    elements: Vec<ElementDef>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.header.insert(key.to_string(), value.to_string());
        self
    }

    pub fn element(mut self, def: ElementDef) -> Self {
        self.elements.push(def);
        self
    }

    pub fn definition(self) -> ModuleDefinition {
        ModuleDefinition {
            header: self.header,
            elements: self.elements,
        }
    }

    pub fn build(self) -> Result<Module, ModuleError> {
        Module::new(self.definition())
    }
}
