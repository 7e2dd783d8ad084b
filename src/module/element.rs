//! Compiled element definitions.
//!
//! An [`ElementDef`] is the serializable form produced by the compiler. Once a
//! module is linked each definition becomes an [`Element`] with its parent
//! resolved to an [`ElementId`] and its block/function tables indexed.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::operation::{Block, FunctionDef};
use super::trigger::TriggerKey;

/// Index of an element inside its module's element arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl ElementId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    World,
    Player,
    Room,
    Object,
    Container,
    Action,
}

impl ElementKind {
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::World => "world",
            ElementKind::Player => "player",
            ElementKind::Room => "room",
            ElementKind::Object => "object",
            ElementKind::Container => "container",
            ElementKind::Action => "action",
        }
    }

    /// Kinds that may appear as the owner side of the ownership map.
    pub fn can_own_objects(self) -> bool {
        matches!(
            self,
            ElementKind::World | ElementKind::Player | ElementKind::Room | ElementKind::Container
        )
    }

    /// Kinds that get a runtime context (actions are pure definitions).
    pub fn has_context(self) -> bool {
        self != ElementKind::Action
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// "look"
    General,
    /// "say <anything>"
    Open,
    /// "go <mode>"
    Modal,
    /// "take <object>"
    Transitive,
    /// "put <object> in <object>"
    Ditransitive,
}

/// Command-side data carried by action elements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionDef {
    pub action_type: ActionType,
    /// Command words that select this action ("take", "pick up").
    pub names: Vec<String>,
    /// Modes for modal actions, conjunctions for ditransitive ones.
    #[serde(default)]
    pub extra_strings: Vec<String>,
    /// Ditransitive commands missing their second object are incomplete
    /// instead of falling back to the transitive form.
    #[serde(default)]
    pub strict: bool,
    /// Swap the two objects of a ditransitive command before dispatch.
    #[serde(default)]
    pub reversed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockEntry {
    pub trigger: TriggerKey,
    pub block: Block,
}

/// Serializable element definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDef {
    pub identity: String,
    pub kind: ElementKind,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub archetype: bool,
    #[serde(default)]
    pub blocks: Vec<BlockEntry>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    /// Object names registered in the name overlay at context creation.
    #[serde(default)]
    pub names: Vec<String>,
    /// Object determiners ("the", "a", "the red") combined with every name.
    #[serde(default)]
    pub determiners: Vec<String>,
    /// Object tags registered in the tag overlay at context creation.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub action: Option<ActionDef>,
}

/// A linked element: its definition plus resolved parent and lookup tables.
#[derive(Debug, Clone)]
pub struct Element {
    id: ElementId,
    def: ElementDef,
    parent: Option<ElementId>,
    block_index: HashMap<TriggerKey, usize>,
    function_index: HashMap<String, usize>,
}

impl Element {
    pub(crate) fn new(
        id: ElementId,
        def: ElementDef,
        parent: Option<ElementId>,
        block_index: HashMap<TriggerKey, usize>,
        function_index: HashMap<String, usize>,
    ) -> Self {
        Self {
            id,
            def,
            parent,
            block_index,
            function_index,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.def.identity
    }

    pub fn kind(&self) -> ElementKind {
        self.def.kind
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn is_archetype(&self) -> bool {
        self.def.archetype
    }

    /// Block bound directly on this element (no inheritance).
    pub fn own_block(&self, trigger: &TriggerKey) -> Option<&Block> {
        self.block_index
            .get(trigger)
            .map(|&i| &self.def.blocks[i].block)
    }

    /// Function declared directly on this element (no inheritance).
    pub fn own_function(&self, name: &str) -> Option<&FunctionDef> {
        self.function_index
            .get(name)
            .map(|&i| &self.def.functions[i])
    }

    /// Block table in declaration order.
    pub fn blocks(&self) -> &[BlockEntry] {
        &self.def.blocks
    }

    /// Function table in declaration order.
    pub fn functions(&self) -> &[FunctionDef] {
        &self.def.functions
    }

    pub fn names(&self) -> &[String] {
        &self.def.names
    }

    pub fn determiners(&self) -> &[String] {
        &self.def.determiners
    }

    pub fn tags(&self) -> &[String] {
        &self.def.tags
    }

    pub fn action(&self) -> Option<&ActionDef> {
        self.def.action.as_ref()
    }

    pub fn definition(&self) -> &ElementDef {
        &self.def
    }
}
