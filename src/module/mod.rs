//! Static module model.
//!
//! A [`ModuleDefinition`] is what the compiler hands over (JSON or bincode).
//! [`Module::new`] validates it and links it into an immutable arena of
//! [`Element`]s addressed by [`ElementId`]. Nothing in a linked module is
//! mutated afterwards, so one `Arc<Module>` can back any number of running
//! contexts.

pub mod builder;
pub mod element;
pub mod loader;
pub mod operation;
pub mod trigger;

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{EngineError, ModuleError};

pub use builder::ModuleBuilder;
pub use element::{ActionDef, ActionType, BlockEntry, Element, ElementDef, ElementId, ElementKind};
pub use operation::{Block, Builtin, FunctionDef, Literal, Operation};
pub use trigger::TriggerKey;

/// Identity reserved for the world element.
pub const WORLD_IDENTITY: &str = "world";

/// Upper bound on parent-chain walks.
pub const MAX_INHERITANCE_DEPTH: usize = 64;

/// Compiler output: header metadata plus element definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    pub elements: Vec<ElementDef>,
}

/// A validated, linked module.
#[derive(Debug)]
pub struct Module {
    header: BTreeMap<String, String>,
    elements: Vec<Element>,
    by_identity: HashMap<String, ElementId>,
    world: ElementId,
    digest: [u8; 32],
}

impl Module {
    /// Validate and link a definition.
    pub fn new(definition: ModuleDefinition) -> Result<Self, ModuleError> {
        let digest = Self::compute_digest(&definition)?;
        let ModuleDefinition { header, elements } = definition;

        let mut by_identity = HashMap::with_capacity(elements.len());
        for (index, def) in elements.iter().enumerate() {
            if by_identity
                .insert(def.identity.clone(), ElementId(index as u32))
                .is_some()
            {
                return Err(ModuleError::DuplicateIdentity(def.identity.clone()));
            }
        }

        let worlds: Vec<&ElementDef> = elements
            .iter()
            .filter(|e| e.kind == ElementKind::World)
            .collect();
        if worlds.len() != 1 {
            return Err(ModuleError::WorldCount(worlds.len()));
        }
        if worlds[0].identity != WORLD_IDENTITY {
            return Err(ModuleError::WorldIdentity(worlds[0].identity.clone()));
        }
        let world = by_identity[WORLD_IDENTITY];

        let mut parents = Vec::with_capacity(elements.len());
        for def in &elements {
            parents.push(link_parent(def, &elements, &by_identity)?);
        }
        check_cycles(&elements, &parents)?;

        let mut linked = Vec::with_capacity(elements.len());
        for (index, def) in elements.into_iter().enumerate() {
            validate_data(&def)?;
            let block_index = index_blocks(&def, &by_identity)?;
            let function_index = index_functions(&def)?;
            for entry in &def.blocks {
                check_literals(&def.identity, &entry.block, &by_identity)?;
            }
            for function in &def.functions {
                check_literals(&def.identity, &function.block, &by_identity)?;
            }
            linked.push(Element::new(
                ElementId(index as u32),
                def,
                parents[index],
                block_index,
                function_index,
            ));
        }
        // Trigger targets are checked against kinds once every element is linked.
        for element in &linked {
            check_trigger_targets(element, &linked, &by_identity)?;
        }

        debug!(
            "linked module with {} elements (digest {})",
            linked.len(),
            hex(&digest)
        );
        Ok(Self {
            header,
            elements: linked,
            by_identity,
            world,
            digest,
        })
    }

    fn compute_digest(definition: &ModuleDefinition) -> Result<[u8; 32], ModuleError> {
        let bytes = bincode::serialize(definition)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hasher.finalize().into())
    }

    pub fn header(&self) -> &BTreeMap<String, String> {
        &self.header
    }

    /// Header value, empty when absent.
    pub fn header_value(&self, key: &str) -> &str {
        self.header.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn title(&self) -> &str {
        self.header_value("title")
    }

    /// SHA-256 of the canonical bincode encoding of the definition.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex(&self.digest)
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.index())
    }

    /// Identity string for `id`; unknown ids print as `?`.
    pub fn identity(&self, id: ElementId) -> &str {
        self.get(id).map(Element::identity).unwrap_or("?")
    }

    pub fn find(&self, identity: &str) -> Option<ElementId> {
        self.by_identity.get(identity).copied()
    }

    pub fn kind(&self, id: ElementId) -> ElementKind {
        self.element(id).kind()
    }

    pub fn world(&self) -> ElementId {
        self.world
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements of one kind in module order.
    pub fn elements_of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &Element> + '_ {
        self.elements.iter().filter(move |e| e.kind() == kind)
    }

    /// Non-archetype elements that get a runtime context.
    pub fn instances(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements
            .iter()
            .filter(|e| e.kind().has_context() && !e.is_archetype())
    }

    /// Find the block bound to `trigger` on `id` or its nearest ancestor.
    pub fn resolve_block(
        &self,
        id: ElementId,
        trigger: &TriggerKey,
    ) -> Result<Option<(ElementId, &Block)>, EngineError> {
        let mut current = Some(id);
        let mut depth = 0;
        while let Some(element_id) = current {
            if depth > MAX_INHERITANCE_DEPTH {
                return Err(self.depth_error(id));
            }
            let element = self.checked(element_id)?;
            if let Some(block) = element.own_block(trigger) {
                return Ok(Some((element_id, block)));
            }
            current = element.parent();
            depth += 1;
        }
        Ok(None)
    }

    /// Find a function by name on `id` or its nearest ancestor.
    pub fn resolve_function(
        &self,
        id: ElementId,
        name: &str,
    ) -> Result<Option<&FunctionDef>, EngineError> {
        let mut current = Some(id);
        let mut depth = 0;
        while let Some(element_id) = current {
            if depth > MAX_INHERITANCE_DEPTH {
                return Err(self.depth_error(id));
            }
            let element = self.checked(element_id)?;
            if let Some(function) = element.own_function(name) {
                return Ok(Some(function));
            }
            current = element.parent();
            depth += 1;
        }
        Ok(None)
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: ElementId) -> Result<Vec<ElementId>, EngineError> {
        let mut out = Vec::new();
        let mut current = self.checked(id)?.parent();
        while let Some(parent) = current {
            if out.len() >= MAX_INHERITANCE_DEPTH {
                return Err(self.depth_error(id));
            }
            out.push(parent);
            current = self.checked(parent)?.parent();
        }
        Ok(out)
    }

    /// True when `id` is `ancestor` or inherits from it.
    pub fn is_instance_of(&self, id: ElementId, ancestor: ElementId) -> Result<bool, EngineError> {
        if id == ancestor {
            return Ok(true);
        }
        Ok(self.ancestors(id)?.contains(&ancestor))
    }

    /// Rebuild the definition this module was linked from.
    pub fn definition(&self) -> ModuleDefinition {
        ModuleDefinition {
            header: self.header.clone(),
            elements: self
                .elements
                .iter()
                .map(|e| e.definition().clone())
                .collect(),
        }
    }

    fn checked(&self, id: ElementId) -> Result<&Element, EngineError> {
        self.get(id)
            .ok_or_else(|| EngineError::Module(format!("no element with index {}", id.0)))
    }

    fn depth_error(&self, id: ElementId) -> EngineError {
        EngineError::Module(format!(
            "inheritance chain from '{}' exceeds {} levels",
            self.identity(id),
            MAX_INHERITANCE_DEPTH
        ))
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn link_parent(
    def: &ElementDef,
    elements: &[ElementDef],
    by_identity: &HashMap<String, ElementId>,
) -> Result<Option<ElementId>, ModuleError> {
    let Some(parent) = &def.parent else {
        return Ok(None);
    };
    let parent_id = by_identity
        .get(parent)
        .copied()
        .ok_or_else(|| ModuleError::UnknownElement {
            identity: parent.clone(),
            context: format!("parent of '{}'", def.identity),
        })?;
    if elements[parent_id.index()].kind != def.kind {
        return Err(ModuleError::ParentKindMismatch {
            child: def.identity.clone(),
            parent: parent.clone(),
        });
    }
    Ok(Some(parent_id))
}

fn check_cycles(elements: &[ElementDef], parents: &[Option<ElementId>]) -> Result<(), ModuleError> {
    for start in 0..elements.len() {
        let mut seen = HashSet::new();
        let mut current = Some(ElementId(start as u32));
        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(ModuleError::InheritanceCycle(
                    elements[start].identity.clone(),
                ));
            }
            current = parents[id.index()];
        }
    }
    Ok(())
}

fn validate_data(def: &ElementDef) -> Result<(), ModuleError> {
    let has_object_data =
        !def.names.is_empty() || !def.determiners.is_empty() || !def.tags.is_empty();
    if has_object_data {
        if def.archetype {
            return Err(ModuleError::ArchetypeData {
                identity: def.identity.clone(),
                what: "names, determiners or tags",
            });
        }
        if def.kind != ElementKind::Object {
            return Err(ModuleError::MisplacedData {
                identity: def.identity.clone(),
                what: "names, determiners or tags",
            });
        }
    }
    match (def.kind, &def.action) {
        (ElementKind::Action, None) => Err(ModuleError::MissingActionData(def.identity.clone())),
        (ElementKind::Action, Some(_)) | (_, None) => Ok(()),
        (_, Some(_)) => Err(ModuleError::MisplacedData {
            identity: def.identity.clone(),
            what: "action data",
        }),
    }
}

fn index_blocks(
    def: &ElementDef,
    by_identity: &HashMap<String, ElementId>,
) -> Result<HashMap<TriggerKey, usize>, ModuleError> {
    let mut index = HashMap::with_capacity(def.blocks.len());
    for (position, entry) in def.blocks.iter().enumerate() {
        if !entry.trigger.is_legal_for(def.kind) {
            return Err(ModuleError::IllegalTrigger {
                identity: def.identity.clone(),
                kind: def.kind.name(),
                trigger: entry.trigger.to_string(),
            });
        }
        let referenced = entry
            .trigger
            .action()
            .into_iter()
            .chain(entry.trigger.object())
            .chain(match &entry.trigger {
                TriggerKey::OnElementBrowse(owner) => Some(owner.as_str()),
                _ => None,
            });
        for identity in referenced {
            if !by_identity.contains_key(identity) {
                return Err(ModuleError::UnknownElement {
                    identity: identity.to_string(),
                    context: format!("trigger {} on '{}'", entry.trigger, def.identity),
                });
            }
        }
        if index.insert(entry.trigger.clone(), position).is_some() {
            return Err(ModuleError::DuplicateTrigger {
                identity: def.identity.clone(),
                trigger: entry.trigger.to_string(),
            });
        }
    }
    Ok(index)
}

fn index_functions(def: &ElementDef) -> Result<HashMap<String, usize>, ModuleError> {
    let mut index = HashMap::with_capacity(def.functions.len());
    for (position, function) in def.functions.iter().enumerate() {
        if index.insert(function.name.clone(), position).is_some() {
            return Err(ModuleError::DuplicateFunction {
                identity: def.identity.clone(),
                name: function.name.clone(),
            });
        }
    }
    Ok(index)
}

fn check_literals(
    owner: &str,
    block: &Block,
    by_identity: &HashMap<String, ElementId>,
) -> Result<(), ModuleError> {
    for op in block.operations() {
        if let Operation::Push(Literal::Element(identity)) = op {
            if !by_identity.contains_key(identity) {
                return Err(ModuleError::UnknownElement {
                    identity: identity.clone(),
                    context: format!("a block of '{}'", owner),
                });
            }
        }
        for child in op.child_blocks() {
            check_literals(owner, child, by_identity)?;
        }
    }
    Ok(())
}

fn check_trigger_targets(
    element: &Element,
    linked: &[Element],
    by_identity: &HashMap<String, ElementId>,
) -> Result<(), ModuleError> {
    let kind_of = |identity: &str| by_identity.get(identity).map(|id| linked[id.index()].kind());
    let mismatch = |trigger: &TriggerKey, expected: &'static str, target: &str| {
        ModuleError::TriggerTargetKind {
            identity: element.identity().to_string(),
            trigger: trigger.to_string(),
            expected,
            target: target.to_string(),
        }
    };
    for entry in element.blocks() {
        let trigger = &entry.trigger;
        if let Some(action) = trigger.action() {
            if kind_of(action) != Some(ElementKind::Action) {
                return Err(mismatch(trigger, "action", action));
            }
        }
        if let Some(object) = trigger.object() {
            if kind_of(object) != Some(ElementKind::Object) {
                return Err(mismatch(trigger, "object", object));
            }
        }
        if let TriggerKey::OnElementBrowse(owner) = trigger {
            if !kind_of(owner).map_or(false, ElementKind::can_own_objects) {
                return Err(mismatch(trigger, "container-capable element", owner));
            }
        }
    }
    Ok(())
}
