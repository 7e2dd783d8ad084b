//! Mutable runtime state for one game session.
//!
//! A [`ModuleContext`] pairs a shared, immutable [`Module`] with everything a
//! running game changes: one [`ElementContext`] per element instance, the
//! [`OwnershipMap`], and the [`ValueHeap`] holding list values. Contexts are
//! not shared between sessions; `&mut` access serializes requests.

pub mod ownership;
pub mod persist;
pub mod storage;

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::EngineConfig;
use crate::errors::{EngineError, StateError};
use crate::module::{ElementId, ElementKind, Module};
use crate::runtime::pattern::PatternCache;
use crate::value::{Value, ValueHeap};

pub use ownership::OwnershipMap;
pub use storage::{SaveMetadata, SaveStore};

/// Named variables of one element, listed in first-assignment order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableBank {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl VariableBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        match self.index.get(name) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), value));
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runtime counterpart of one element instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementContext {
    element: ElementId,
    variables: VariableBank,
}

impl ElementContext {
    pub fn new(element: ElementId) -> Self {
        Self {
            element,
            variables: VariableBank::new(),
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn variables(&self) -> &VariableBank {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableBank {
        &mut self.variables
    }
}

/// Per-context helpers that are not part of the saved state.
#[derive(Debug)]
pub struct RuntimeState {
    pub config: EngineConfig,
    pub patterns: PatternCache,
    pub rng: StdRng,
}

impl RuntimeState {
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            patterns: PatternCache::new(),
            rng,
        }
    }
}

#[derive(Debug)]
pub struct ModuleContext {
    module: Arc<Module>,
    contexts: Vec<Option<ElementContext>>,
    ownership: OwnershipMap,
    heap: ValueHeap,
    runtime: RuntimeState,
}

impl ModuleContext {
    pub fn new(module: Arc<Module>) -> Self {
        Self::with_config(module, EngineConfig::default())
    }

    /// Fresh state: an empty context per instance and the declared object
    /// names and tags registered in the overlays.
    pub fn with_config(module: Arc<Module>, config: EngineConfig) -> Self {
        let mut ownership = OwnershipMap::new();
        for element in module.elements_of_kind(ElementKind::Object) {
            if element.is_archetype() {
                continue;
            }
            for name in element.names() {
                ownership.add_object_name(element.id(), name, element.determiners());
            }
            for tag in element.tags() {
                ownership.add_object_tag(element.id(), tag);
            }
        }
        let contexts = Self::empty_contexts(&module);
        debug!(
            "created context for module '{}' ({} element contexts)",
            module.title(),
            contexts.iter().flatten().count()
        );
        Self {
            module,
            contexts,
            ownership,
            heap: ValueHeap::new(),
            runtime: RuntimeState::new(config),
        }
    }

    pub(crate) fn empty_contexts(module: &Module) -> Vec<Option<ElementContext>> {
        let mut contexts: Vec<Option<ElementContext>> = vec![None; module.len()];
        for element in module.instances() {
            contexts[element.id().index()] = Some(ElementContext::new(element.id()));
        }
        contexts
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn ownership(&self) -> &OwnershipMap {
        &self.ownership
    }

    pub fn ownership_mut(&mut self) -> &mut OwnershipMap {
        &mut self.ownership
    }

    pub fn heap(&self) -> &ValueHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ValueHeap {
        &mut self.heap
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut RuntimeState {
        &mut self.runtime
    }

    pub fn config(&self) -> &EngineConfig {
        &self.runtime.config
    }

    pub fn context(&self, id: ElementId) -> Option<&ElementContext> {
        self.contexts.get(id.index()).and_then(Option::as_ref)
    }

    pub fn context_mut(&mut self, id: ElementId) -> Option<&mut ElementContext> {
        self.contexts.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Live contexts in module order.
    pub fn contexts(&self) -> impl Iterator<Item = &ElementContext> {
        self.contexts.iter().flatten()
    }

    /// Look up an element by identity.
    pub fn find(&self, identity: &str) -> Option<ElementId> {
        self.module.find(identity)
    }

    /// Variable of an element; unset variables read as `false`.
    pub fn variable(&self, id: ElementId, name: &str) -> Result<Value, EngineError> {
        let context = self.context(id).ok_or_else(|| self.no_context(id))?;
        Ok(context
            .variables()
            .get(name)
            .cloned()
            .unwrap_or(Value::Boolean(false)))
    }

    pub fn set_variable(&mut self, id: ElementId, name: &str, value: Value) -> Result<(), EngineError> {
        if let Some(context) = self.context_mut(id) {
            context.variables_mut().set(name, value);
            return Ok(());
        }
        Err(self.no_context(id))
    }

    fn no_context(&self, id: ElementId) -> EngineError {
        EngineError::Module(format!(
            "element '{}' has no runtime context",
            self.module.identity(id)
        ))
    }

    /// Register a name on an object, expanded with its declared determiners.
    pub fn add_object_name(&mut self, object: ElementId, name: &str) {
        let determiners = self.module.element(object).determiners();
        self.ownership.add_object_name(object, name, determiners);
    }

    pub fn remove_object_name(&mut self, object: ElementId, name: &str) {
        let determiners = self.module.element(object).determiners();
        self.ownership.remove_object_name(object, name, determiners);
    }

    /// Printable form of a value.
    pub fn format(&self, value: &Value) -> String {
        value.as_string(&self.heap, &self.module)
    }

    /// Free lists unreachable from any variable bank or from `extra` roots.
    pub fn collect_garbage<'a>(&mut self, extra: impl IntoIterator<Item = &'a Value>) -> usize {
        let mut roots: Vec<&Value> = extra.into_iter().collect();
        roots.extend(
            self.contexts
                .iter()
                .flatten()
                .flat_map(|c| c.variables().values()),
        );
        self.heap.collect(roots)
    }

    /// Encode the full mutable state.
    pub fn save_state(&self) -> Result<Vec<u8>, StateError> {
        persist::write_state(self)
    }

    /// Replace the mutable state with a decoded save. On error nothing changes.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let restored = persist::read_state(&self.module, bytes)?;
        self.ownership = restored.ownership;
        self.contexts = restored.contexts;
        self.heap = restored.heap;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ElementDef, ModuleBuilder};

    fn module() -> Arc<Module> {
        Arc::new(
            ModuleBuilder::new()
                .element(ElementDef::world())
                .element(ElementDef::object("thing").archetype())
                .element(
                    ElementDef::object("key")
                        .parent("thing")
                        .names(&["key"])
                        .determiners(&["the"])
                        .tags(&["small"]),
                )
                .element(ElementDef::room("hall"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn contexts_exist_for_instances_only() {
        let ctx = ModuleContext::new(module());
        let ids: Vec<&str> = ctx
            .contexts()
            .map(|c| ctx.module().identity(c.element()))
            .collect();
        assert_eq!(ids, vec!["world", "key", "hall"]);
        let thing = ctx.find("thing").unwrap();
        assert!(ctx.variable(thing, "x").is_err());
    }

    #[test]
    fn declared_names_and_tags_are_registered() {
        let ctx = ModuleContext::new(module());
        let key = ctx.find("key").unwrap();
        assert!(ctx.ownership().object_has_name(key, "the key"));
        assert!(ctx.ownership().object_has_tag(key, "small"));
    }

    #[test]
    fn unset_variables_read_false_and_keep_order() {
        let mut ctx = ModuleContext::new(module());
        let hall = ctx.find("hall").unwrap();
        assert_eq!(ctx.variable(hall, "lit").unwrap(), Value::Boolean(false));
        ctx.set_variable(hall, "b", Value::Integer(1)).unwrap();
        ctx.set_variable(hall, "a", Value::Integer(2)).unwrap();
        ctx.set_variable(hall, "b", Value::Integer(3)).unwrap();
        let names: Vec<&str> = ctx.context(hall).unwrap().variables().iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(ctx.variable(hall, "b").unwrap(), Value::Integer(3));
    }

    #[test]
    fn garbage_collection_keeps_variable_lists() {
        let mut ctx = ModuleContext::new(module());
        let hall = ctx.find("hall").unwrap();
        let kept = Value::new_list(ctx.heap_mut()).unwrap();
        let _dropped = Value::new_list(ctx.heap_mut()).unwrap();
        ctx.set_variable(hall, "items", kept.clone()).unwrap();
        assert_eq!(ctx.collect_garbage(None::<&Value>), 1);
        assert_eq!(ctx.heap().live_count(), 1);
        assert!(ctx.heap().contains(kept.as_list().unwrap()));

        // a caller-held root survives alongside the variable banks
        let held = Value::new_list(ctx.heap_mut()).unwrap();
        assert_eq!(ctx.collect_garbage([&held]), 0);
        assert_eq!(ctx.heap().live_count(), 2);
    }
}
