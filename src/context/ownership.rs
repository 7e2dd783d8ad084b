//! Runtime containment graph.
//!
//! Tracks which element owns which objects (ordered), where each player is
//! (a stack of rooms, top is current), the current player, and the dynamic
//! name/tag overlays used to resolve objects from command text.
//!
//! Invariants kept by every mutator:
//! - an object has at most one owner, and `owner_of` mirrors `owned` exactly;
//! - no entry in `owned`, `room_stacks`, `names` or `tags` holds an empty
//!   collection.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::module::ElementId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnershipMap {
    owned: BTreeMap<ElementId, Vec<ElementId>>,
    owner_of: HashMap<ElementId, ElementId>,
    room_stacks: BTreeMap<ElementId, Vec<ElementId>>,
    current_player: Option<ElementId>,
    names: BTreeMap<ElementId, BTreeSet<String>>,
    tags: BTreeMap<ElementId, BTreeSet<String>>,
}

/// Lowercase and collapse runs of whitespace into single spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// Every form under which `name` is registered for an object.
fn name_forms(name: &str, determiners: &[String]) -> Vec<String> {
    let base = normalize_name(name);
    if base.is_empty() {
        return Vec::new();
    }
    let mut forms = vec![base.clone()];
    for determiner in determiners {
        let determiner = normalize_name(determiner);
        if !determiner.is_empty() {
            forms.push(format!("{} {}", determiner, base));
        }
    }
    forms
}

impl OwnershipMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ---- objects ---------------------------------------------------------

    /// Move `object` to the end of `owner`'s queue, detaching it from any
    /// previous owner first.
    pub fn add_object_to_element(&mut self, object: ElementId, owner: ElementId) {
        self.remove_object(object);
        self.owned.entry(owner).or_default().push(object);
        self.owner_of.insert(object, owner);
    }

    /// Detach `object` from its owner. No-op when unowned.
    pub fn remove_object(&mut self, object: ElementId) {
        let Some(owner) = self.owner_of.remove(&object) else {
            return;
        };
        if let Some(queue) = self.owned.get_mut(&owner) {
            queue.retain(|o| *o != object);
            if queue.is_empty() {
                self.owned.remove(&owner);
            }
        }
    }

    /// Move every object of `from` to `to`, keeping queue order.
    pub fn move_objects(&mut self, from: ElementId, to: ElementId) {
        if from == to {
            return;
        }
        for object in self.objects_owned_by(from) {
            self.add_object_to_element(object, to);
        }
    }

    pub fn element_has_object(&self, owner: ElementId, object: ElementId) -> bool {
        self.owner_of.get(&object) == Some(&owner)
    }

    pub fn object_has_no_owner(&self, object: ElementId) -> bool {
        !self.owner_of.contains_key(&object)
    }

    pub fn owner_of(&self, object: ElementId) -> Option<ElementId> {
        self.owner_of.get(&object).copied()
    }

    /// Snapshot of `owner`'s queue.
    pub fn objects_owned_by(&self, owner: ElementId) -> Vec<ElementId> {
        self.owned.get(&owner).cloned().unwrap_or_default()
    }

    pub fn object_count(&self, owner: ElementId) -> usize {
        self.owned.get(&owner).map_or(0, Vec::len)
    }

    // ---- players and rooms -----------------------------------------------

    pub fn current_player(&self) -> Option<ElementId> {
        self.current_player
    }

    pub fn set_current_player(&mut self, player: Option<ElementId>) {
        self.current_player = player;
    }

    /// Replace the player's whole stack with `room`.
    pub fn add_player_to_room(&mut self, player: ElementId, room: ElementId) {
        self.room_stacks.insert(player, vec![room]);
    }

    pub fn push_room_onto_player(&mut self, player: ElementId, room: ElementId) {
        self.room_stacks.entry(player).or_default().push(room);
    }

    /// Pop the player's top room; the entry disappears once the stack is empty.
    pub fn pop_room_from_player(&mut self, player: ElementId) -> Option<ElementId> {
        let stack = self.room_stacks.get_mut(&player)?;
        let room = stack.pop();
        if stack.is_empty() {
            self.room_stacks.remove(&player);
        }
        room
    }

    /// Pop then push: replace the top of the stack.
    pub fn swap_room_on_player(&mut self, player: ElementId, room: ElementId) {
        self.pop_room_from_player(player);
        self.push_room_onto_player(player, room);
    }

    pub fn current_room_of(&self, player: ElementId) -> Option<ElementId> {
        self.room_stacks.get(&player).and_then(|s| s.last().copied())
    }

    /// Current room of the current player.
    pub fn current_room(&self) -> Option<ElementId> {
        self.current_player.and_then(|p| self.current_room_of(p))
    }

    /// Whether `room` is anywhere in the player's stack.
    pub fn player_is_in_room(&self, player: ElementId, room: ElementId) -> bool {
        self.room_stacks
            .get(&player)
            .map_or(false, |stack| stack.contains(&room))
    }

    /// Players whose current room is `room`.
    pub fn players_in_room(&self, room: ElementId) -> Vec<ElementId> {
        self.room_stacks
            .iter()
            .filter(|(_, stack)| stack.last() == Some(&room))
            .map(|(player, _)| *player)
            .collect()
    }

    /// Bottom-first stack of a player.
    pub fn room_stack(&self, player: ElementId) -> &[ElementId] {
        self.room_stacks.get(&player).map_or(&[], Vec::as_slice)
    }

    pub fn has_room_stack(&self, player: ElementId) -> bool {
        self.room_stacks.contains_key(&player)
    }

    // ---- name and tag overlays -------------------------------------------

    /// Register `name` and every `determiner + name` form.
    pub fn add_object_name(&mut self, object: ElementId, name: &str, determiners: &[String]) {
        let forms = name_forms(name, determiners);
        if forms.is_empty() {
            return;
        }
        self.names.entry(object).or_default().extend(forms);
    }

    /// Remove `name` and all of its determiner forms.
    pub fn remove_object_name(&mut self, object: ElementId, name: &str, determiners: &[String]) {
        let forms = name_forms(name, determiners);
        if let Some(set) = self.names.get_mut(&object) {
            for form in &forms {
                set.remove(form);
            }
            if set.is_empty() {
                self.names.remove(&object);
            }
        }
    }

    pub fn object_has_name(&self, object: ElementId, name: &str) -> bool {
        self.names
            .get(&object)
            .map_or(false, |set| set.contains(&normalize_name(name)))
    }

    /// Objects among `candidates` answering to `name`, in candidate order.
    pub fn objects_with_name(&self, candidates: &[ElementId], name: &str) -> Vec<ElementId> {
        let wanted = normalize_name(name);
        candidates
            .iter()
            .copied()
            .filter(|o| self.names.get(o).map_or(false, |set| set.contains(&wanted)))
            .collect()
    }

    pub fn add_object_tag(&mut self, object: ElementId, tag: &str) {
        self.tags.entry(object).or_default().insert(tag.to_string());
    }

    pub fn remove_object_tag(&mut self, object: ElementId, tag: &str) {
        if let Some(set) = self.tags.get_mut(&object) {
            set.remove(tag);
            if set.is_empty() {
                self.tags.remove(&object);
            }
        }
    }

    pub fn object_has_tag(&self, object: ElementId, tag: &str) -> bool {
        self.tags.get(&object).map_or(false, |set| set.contains(tag))
    }

    // ---- raw views for the state codec -------------------------------------

    pub(crate) fn owned_entries(&self) -> &BTreeMap<ElementId, Vec<ElementId>> {
        &self.owned
    }

    pub(crate) fn room_stack_entries(&self) -> &BTreeMap<ElementId, Vec<ElementId>> {
        &self.room_stacks
    }

    pub(crate) fn name_entries(&self) -> &BTreeMap<ElementId, BTreeSet<String>> {
        &self.names
    }

    pub(crate) fn tag_entries(&self) -> &BTreeMap<ElementId, BTreeSet<String>> {
        &self.tags
    }

    /// Store an already-normalized name form verbatim.
    pub(crate) fn insert_name_form(&mut self, object: ElementId, form: String) {
        self.names.entry(object).or_default().insert(form);
    }
}
