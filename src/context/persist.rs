//! Binary save-state codec.
//!
//! Layout, little-endian throughout; strings are `u32` length plus UTF-8,
//! counts are `u32`:
//!
//! ```text
//! digest        u32 len, SHA-256 of the module
//! ownership     count, { owner, count, { object } }
//! player        u8 flag, [identity]
//! room stacks   count, { player, depth, { room } }    bottom of stack first
//! names         count, { object, count, { name } }
//! tags          count, { object, count, { tag } }
//! contexts      count, { identity, count, { name, value } }
//! ```
//!
//! Values carry a tag byte: 0 boolean, 1 integer, 2 float (bits),
//! 3 string, 4 element (identity), 5 list definition (`u64` ref, `u32` len,
//! items), 6 list back-reference (`u64` ref). One reference table spans the
//! whole context section, so a list reachable from several variables (or
//! from itself) is written once and restored as a single shared instance.

use std::collections::HashMap;
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use log::{debug, info};

use crate::errors::StateError;
use crate::module::{ElementId, ElementKind, Module};
use crate::value::{ListId, Value, ValueHeap};

use super::{ElementContext, ModuleContext, OwnershipMap};

const TAG_BOOLEAN: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_ELEMENT: u8 = 4;
const TAG_LIST: u8 = 5;
const TAG_LIST_REF: u8 = 6;

/// Decoded state, swapped into a context only once fully read.
pub(crate) struct RestoredState {
    pub ownership: OwnershipMap,
    pub contexts: Vec<Option<ElementContext>>,
    pub heap: ValueHeap,
}

struct StateWriter<'a> {
    buf: BytesMut,
    module: &'a Module,
    heap: &'a ValueHeap,
    refs: HashMap<ListId, u64>,
    next_ref: u64,
}

impl<'a> StateWriter<'a> {
    fn count(&mut self, n: usize) -> Result<(), StateError> {
        let n = u32::try_from(n)
            .map_err(|_| StateError::Invalid(format!("{} entries exceed the u32 count field", n)))?;
        self.buf.put_u32_le(n);
        Ok(())
    }

    fn string(&mut self, s: &str) -> Result<(), StateError> {
        self.count(s.len())?;
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn element(&mut self, id: ElementId) -> Result<(), StateError> {
        let module = self.module;
        self.string(module.identity(id))
    }

    fn elements(&mut self, ids: &[ElementId]) -> Result<(), StateError> {
        self.count(ids.len())?;
        for id in ids {
            self.element(*id)?;
        }
        Ok(())
    }

    /// Write a value in pre-order. Nested lists are walked with an explicit
    /// stack of item iterators, so nesting depth is bounded by memory only.
    fn value(&mut self, root: &Value) -> Result<(), StateError> {
        let mut pending: Vec<std::slice::Iter<'a, Value>> = Vec::new();
        if let Some(items) = self.one(root)? {
            pending.push(items.iter());
        }
        while let Some(items) = pending.last_mut() {
            match items.next() {
                Some(item) => {
                    if let Some(children) = self.one(item)? {
                        pending.push(children.iter());
                    }
                }
                None => {
                    pending.pop();
                }
            }
        }
        Ok(())
    }

    /// Write one value. A list met for the first time writes its header and
    /// returns the items still to be written.
    fn one(&mut self, value: &Value) -> Result<Option<&'a [Value]>, StateError> {
        match value {
            Value::Boolean(b) => {
                self.buf.put_u8(TAG_BOOLEAN);
                self.buf.put_u8(u8::from(*b));
            }
            Value::Integer(i) => {
                self.buf.put_u8(TAG_INTEGER);
                self.buf.put_i64_le(*i);
            }
            Value::Float(f) => {
                self.buf.put_u8(TAG_FLOAT);
                self.buf.put_u64_le(f.to_bits());
            }
            Value::String(s) => {
                self.buf.put_u8(TAG_STRING);
                self.string(s)?;
            }
            Value::Element(id) => {
                self.buf.put_u8(TAG_ELEMENT);
                self.element(*id)?;
            }
            Value::List(list) => {
                if let Some(&reference) = self.refs.get(list) {
                    self.buf.put_u8(TAG_LIST_REF);
                    self.buf.put_u64_le(reference);
                    return Ok(None);
                }
                self.next_ref += 1;
                let reference = self.next_ref;
                self.refs.insert(*list, reference);
                self.buf.put_u8(TAG_LIST);
                self.buf.put_u64_le(reference);
                let heap = self.heap;
                let items = heap.items(*list);
                self.count(items.len())?;
                return Ok(Some(items));
            }
        }
        Ok(None)
    }
}

/// Encode every piece of mutable state in `ctx`.
pub fn write_state(ctx: &ModuleContext) -> Result<Vec<u8>, StateError> {
    let module: &Module = ctx.module();
    let ownership = ctx.ownership();
    let mut w = StateWriter {
        buf: BytesMut::with_capacity(4096),
        module,
        heap: ctx.heap(),
        refs: HashMap::new(),
        next_ref: 0,
    };

    w.count(module.digest().len())?;
    w.buf.put_slice(module.digest());

    let owned = ownership.owned_entries();
    w.count(owned.len())?;
    for (owner, objects) in owned {
        w.element(*owner)?;
        w.elements(objects)?;
    }

    match ownership.current_player() {
        Some(player) => {
            w.buf.put_u8(1);
            w.element(player)?;
        }
        None => w.buf.put_u8(0),
    }

    let stacks = ownership.room_stack_entries();
    w.count(stacks.len())?;
    for (player, rooms) in stacks {
        w.element(*player)?;
        w.elements(rooms)?;
    }

    for overlay in [ownership.name_entries(), ownership.tag_entries()] {
        w.count(overlay.len())?;
        for (object, set) in overlay {
            w.element(*object)?;
            w.count(set.len())?;
            for entry in set {
                w.string(entry)?;
            }
        }
    }

    let contexts: Vec<&ElementContext> = ctx.contexts().collect();
    w.count(contexts.len())?;
    for context in contexts {
        w.element(context.element())?;
        let variables = context.variables();
        w.count(variables.len())?;
        for (name, value) in variables.iter() {
            w.string(name)?;
            w.value(value)?;
        }
    }

    debug!("encoded save state: {} bytes, {} shared lists", w.buf.len(), w.next_ref);
    Ok(w.buf.to_vec())
}

struct StateReader<'a> {
    buf: &'a [u8],
    module: &'a Module,
    heap: ValueHeap,
    refs: HashMap<u64, ListId>,
}

fn truncated() -> StateError {
    StateError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "save state ended early",
    ))
}

impl<'a> StateReader<'a> {
    fn need(&self, n: usize) -> Result<(), StateError> {
        if self.buf.remaining() < n {
            Err(truncated())
        } else {
            Ok(())
        }
    }

    fn u8(&mut self) -> Result<u8, StateError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn count(&mut self) -> Result<usize, StateError> {
        self.need(4)?;
        Ok(self.buf.get_u32_le() as usize)
    }

    fn u64(&mut self) -> Result<u64, StateError> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    fn bytes(&mut self) -> Result<Vec<u8>, StateError> {
        let len = self.count()?;
        self.need(len)?;
        let out = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(out)
    }

    fn string(&mut self) -> Result<String, StateError> {
        Ok(String::from_utf8(self.bytes()?)?)
    }

    fn element(&mut self) -> Result<ElementId, StateError> {
        let identity = self.string()?;
        self.module
            .find(&identity)
            .ok_or(StateError::MissingElement(identity))
    }

    fn element_of(&mut self, accept: fn(ElementKind) -> bool, expected: &'static str) -> Result<ElementId, StateError> {
        let id = self.element()?;
        let element = self.module.element(id);
        if !accept(element.kind()) || element.is_archetype() {
            return Err(StateError::WrongKind {
                identity: element.identity().to_string(),
                expected,
            });
        }
        Ok(id)
    }

    /// Read one value. Lists still being filled sit on an explicit stack,
    /// so a deeply nested (or hostile) save cannot exhaust the native stack.
    fn value(&mut self) -> Result<Value, StateError> {
        let mut open: Vec<(ListId, usize)> = Vec::new();
        loop {
            let mut value = match self.u8()? {
                TAG_LIST => {
                    let reference = self.u64()?;
                    if self.refs.contains_key(&reference) {
                        return Err(StateError::DuplicateReference(reference));
                    }
                    // Registered before the items so nested back-references resolve.
                    let list = self
                        .heap
                        .new_list()
                        .map_err(|e| StateError::Invalid(e.to_string()))?;
                    self.refs.insert(reference, list);
                    let len = self.count()?;
                    if len > 0 {
                        open.push((list, len));
                        continue;
                    }
                    Value::List(list)
                }
                tag => self.scalar(tag)?,
            };
            loop {
                let Some((list, remaining)) = open.last_mut() else {
                    return Ok(value);
                };
                self.heap.list_add(*list, value);
                *remaining -= 1;
                if *remaining > 0 {
                    break;
                }
                value = Value::List(*list);
                open.pop();
            }
        }
    }

    fn scalar(&mut self, tag: u8) -> Result<Value, StateError> {
        match tag {
            TAG_BOOLEAN => Ok(Value::Boolean(self.u8()? != 0)),
            TAG_INTEGER => {
                self.need(8)?;
                Ok(Value::Integer(self.buf.get_i64_le()))
            }
            TAG_FLOAT => Ok(Value::Float(f64::from_bits(self.u64()?))),
            TAG_STRING => Ok(Value::String(self.string()?)),
            TAG_ELEMENT => Ok(Value::Element(self.element()?)),
            TAG_LIST_REF => {
                let reference = self.u64()?;
                self.refs
                    .get(&reference)
                    .map(|&list| Value::List(list))
                    .ok_or(StateError::UndefinedReference(reference))
            }
            other => Err(StateError::UnknownTag(other)),
        }
    }
}

fn is_object(kind: ElementKind) -> bool {
    kind == ElementKind::Object
}

fn is_player(kind: ElementKind) -> bool {
    kind == ElementKind::Player
}

fn is_room(kind: ElementKind) -> bool {
    kind == ElementKind::Room
}

fn has_context(kind: ElementKind) -> bool {
    kind.has_context()
}

/// Decode a save produced by [`write_state`] for the same module.
pub(crate) fn read_state(module: &Module, bytes: &[u8]) -> Result<RestoredState, StateError> {
    let mut r = StateReader {
        buf: bytes,
        module,
        heap: ValueHeap::new(),
        refs: HashMap::new(),
    };

    if r.bytes()?.as_slice() != module.digest().as_slice() {
        return Err(StateError::ModuleMismatch);
    }

    let mut ownership = OwnershipMap::new();
    for _ in 0..r.count()? {
        let owner = r.element_of(ElementKind::can_own_objects, "container-capable element")?;
        let members = r.count()?;
        if members == 0 {
            return Err(StateError::Invalid(format!(
                "empty object queue for '{}'",
                module.identity(owner)
            )));
        }
        for _ in 0..members {
            let object = r.element_of(is_object, "object")?;
            if !ownership.object_has_no_owner(object) {
                return Err(StateError::Invalid(format!(
                    "object '{}' has more than one owner",
                    module.identity(object)
                )));
            }
            ownership.add_object_to_element(object, owner);
        }
    }

    if r.u8()? != 0 {
        let player = r.element_of(is_player, "player")?;
        ownership.set_current_player(Some(player));
    }

    for _ in 0..r.count()? {
        let player = r.element_of(is_player, "player")?;
        let depth = r.count()?;
        if depth == 0 {
            return Err(StateError::Invalid(format!(
                "empty room stack for '{}'",
                module.identity(player)
            )));
        }
        for _ in 0..depth {
            let room = r.element_of(is_room, "room")?;
            ownership.push_room_onto_player(player, room);
        }
    }

    for _ in 0..r.count()? {
        let object = r.element_of(is_object, "object")?;
        for _ in 0..r.count()? {
            let name = r.string()?;
            ownership.insert_name_form(object, name);
        }
    }
    for _ in 0..r.count()? {
        let object = r.element_of(is_object, "object")?;
        for _ in 0..r.count()? {
            let tag = r.string()?;
            ownership.add_object_tag(object, &tag);
        }
    }

    let mut contexts = ModuleContext::empty_contexts(module);
    for _ in 0..r.count()? {
        let id = r.element_of(has_context, "element with runtime context")?;
        let mut context = ElementContext::new(id);
        for _ in 0..r.count()? {
            let name = r.string()?;
            let value = r.value()?;
            context.variables_mut().set(&name, value);
        }
        contexts[id.index()] = Some(context);
    }

    if r.buf.has_remaining() {
        return Err(StateError::TrailingBytes(r.buf.remaining()));
    }
    info!(
        "restored save state: {} bytes, {} lists",
        bytes.len(),
        r.heap.live_count()
    );
    Ok(RestoredState {
        ownership,
        contexts,
        heap: r.heap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ElementDef, ModuleBuilder};
    use std::sync::Arc;

    fn module(extra_room: &str) -> Arc<Module> {
        Arc::new(
            ModuleBuilder::new()
                .element(ElementDef::world())
                .element(ElementDef::player("hero"))
                .element(ElementDef::room("hall"))
                .element(ElementDef::room(extra_room))
                .element(ElementDef::object("lamp").names(&["lamp"]).determiners(&["the"]))
                .build()
                .unwrap(),
        )
    }

    fn populated() -> ModuleContext {
        let mut ctx = ModuleContext::new(module("cellar"));
        let hero = ctx.find("hero").unwrap();
        let hall = ctx.find("hall").unwrap();
        let cellar = ctx.find("cellar").unwrap();
        let lamp = ctx.find("lamp").unwrap();
        ctx.ownership_mut().add_object_to_element(lamp, hero);
        ctx.ownership_mut().set_current_player(Some(hero));
        ctx.ownership_mut().push_room_onto_player(hero, hall);
        ctx.ownership_mut().push_room_onto_player(hero, cellar);
        ctx.ownership_mut().add_object_tag(lamp, "lit");
        ctx.set_variable(hall, "visits", Value::Integer(3)).unwrap();
        ctx.set_variable(hall, "ratio", Value::Float(0.5)).unwrap();
        ctx.set_variable(hall, "where", Value::Element(cellar)).unwrap();
        ctx
    }

    #[test]
    fn round_trip_restores_ownership_and_variables() {
        let source = populated();
        let bytes = source.save_state().unwrap();
        let mut target = ModuleContext::new(Arc::clone(source.module()));
        target.load_state(&bytes).unwrap();

        assert_eq!(target.ownership(), source.ownership());
        let hall = target.find("hall").unwrap();
        assert_eq!(target.variable(hall, "visits").unwrap(), Value::Integer(3));
        assert_eq!(target.variable(hall, "ratio").unwrap(), Value::Float(0.5));
        assert_eq!(
            target.variable(hall, "where").unwrap(),
            Value::Element(target.find("cellar").unwrap())
        );
        // Writing the restored state yields the same bytes.
        assert_eq!(target.save_state().unwrap(), bytes);
    }

    #[test]
    fn shared_and_cyclic_lists_stay_shared() {
        let mut ctx = populated();
        let hall = ctx.find("hall").unwrap();
        let world = ctx.module().world();
        let list = ctx.heap_mut().new_list().unwrap();
        ctx.heap_mut().list_add(list, Value::Integer(1));
        ctx.heap_mut().list_add(list, Value::List(list));
        ctx.set_variable(hall, "a", Value::List(list)).unwrap();
        ctx.set_variable(world, "b", Value::List(list)).unwrap();

        let bytes = ctx.save_state().unwrap();
        let mut restored = ModuleContext::new(Arc::clone(ctx.module()));
        restored.load_state(&bytes).unwrap();

        let a = restored.variable(hall, "a").unwrap().as_list().unwrap();
        let b = restored.variable(world, "b").unwrap().as_list().unwrap();
        assert_eq!(a, b);
        assert_eq!(restored.heap().items(a)[1], Value::List(a));
        restored.heap_mut().list_add(a, Value::Integer(2));
        assert_eq!(restored.heap().len(b), 3);
    }

    #[test]
    fn digest_mismatch_is_rejected_and_state_untouched() {
        let bytes = populated().save_state().unwrap();
        let mut other = ModuleContext::new(module("attic"));
        let hall = other.find("hall").unwrap();
        other.set_variable(hall, "keep", Value::Boolean(true)).unwrap();
        assert!(matches!(
            other.load_state(&bytes),
            Err(StateError::ModuleMismatch)
        ));
        assert_eq!(other.variable(hall, "keep").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn truncated_and_trailing_input_fail() {
        let source = populated();
        let bytes = source.save_state().unwrap();
        let mut target = ModuleContext::new(Arc::clone(source.module()));
        assert!(matches!(
            target.load_state(&bytes[..bytes.len() - 3]),
            Err(StateError::Io(_))
        ));
        let mut longer = bytes.clone();
        longer.push(0);
        assert!(matches!(
            target.load_state(&longer),
            Err(StateError::TrailingBytes(1))
        ));
        assert!(target.ownership().current_player().is_none());
    }

    #[test]
    fn unknown_identity_is_missing_element() {
        let ctx = ModuleContext::new(module("cellar"));
        let digest = ctx.module().digest();
        let mut buf = BytesMut::new();
        buf.put_u32_le(digest.len() as u32);
        buf.put_slice(digest);
        // one ownership entry owned by a ghost
        buf.put_u32_le(1);
        buf.put_u32_le(5);
        buf.put_slice(b"ghost");
        let mut target = ModuleContext::new(Arc::clone(ctx.module()));
        assert!(matches!(
            target.load_state(&buf),
            Err(StateError::MissingElement(name)) if name == "ghost"
        ));
    }

    #[test]
    fn value_tags_have_fixed_encoding() {
        let ctx = ModuleContext::new(module("cellar"));
        let mut w = StateWriter {
            buf: BytesMut::new(),
            module: ctx.module(),
            heap: ctx.heap(),
            refs: HashMap::new(),
            next_ref: 0,
        };
        w.value(&Value::Boolean(true)).unwrap();
        w.value(&Value::Integer(-2)).unwrap();
        w.value(&Value::string("ab")).unwrap();
        let mut expected = vec![0u8, 1, 1];
        expected.extend_from_slice(&(-2i64).to_le_bytes());
        expected.extend_from_slice(&[3, 2, 0, 0, 0, b'a', b'b']);
        assert_eq!(w.buf.to_vec(), expected);
    }

    fn nested_chain(ctx: &mut ModuleContext, depth: usize) -> ListId {
        let root = ctx.heap_mut().new_list().unwrap();
        let mut tail = root;
        for _ in 0..depth {
            let next = ctx.heap_mut().new_list().unwrap();
            ctx.heap_mut().list_add(tail, Value::List(next));
            tail = next;
        }
        ctx.heap_mut().list_add(tail, Value::string("core"));
        root
    }

    #[test]
    fn deeply_nested_lists_round_trip() {
        let mut ctx = populated();
        let world = ctx.module().world();
        let root = nested_chain(&mut ctx, 50_000);
        ctx.set_variable(world, "deep", Value::List(root)).unwrap();

        let bytes = ctx.save_state().unwrap();
        let mut restored = ModuleContext::new(Arc::clone(ctx.module()));
        restored.load_state(&bytes).unwrap();
        assert_eq!(restored.heap().live_count(), 50_001);
        assert_eq!(restored.save_state().unwrap(), bytes);

        let text = restored.format(&restored.variable(world, "deep").unwrap());
        assert!(text.starts_with("[[[") && text.contains("[core]"));
    }

    /// A save holding one `world` variable whose value opens `depth` nested
    /// single-item lists.
    fn nested_blob(ctx: &ModuleContext, depth: u64) -> BytesMut {
        let digest = ctx.module().digest();
        let world = ctx.module().identity(ctx.module().world());
        let mut buf = BytesMut::new();
        buf.put_u32_le(digest.len() as u32);
        buf.put_slice(digest);
        buf.put_u32_le(0); // ownership
        buf.put_u8(0); // no player
        buf.put_u32_le(0); // room stacks
        buf.put_u32_le(0); // names
        buf.put_u32_le(0); // tags
        buf.put_u32_le(1);
        buf.put_u32_le(world.len() as u32);
        buf.put_slice(world.as_bytes());
        buf.put_u32_le(1);
        buf.put_u32_le(4);
        buf.put_slice(b"deep");
        for reference in 0..depth {
            buf.put_u8(TAG_LIST);
            buf.put_u64_le(reference);
            buf.put_u32_le(1);
        }
        buf
    }

    #[test]
    fn crafted_deep_nesting_decodes_or_fails_cleanly() {
        let ctx = ModuleContext::new(module("cellar"));
        let mut target = ModuleContext::new(Arc::clone(ctx.module()));

        let unterminated = nested_blob(&ctx, 100_000);
        assert!(matches!(
            target.load_state(&unterminated),
            Err(StateError::Io(_))
        ));

        let mut terminated = nested_blob(&ctx, 100_000);
        terminated.put_u8(TAG_INTEGER);
        terminated.put_i64_le(9);
        target.load_state(&terminated).unwrap();
        let world = target.module().world();
        assert!(matches!(target.variable(world, "deep").unwrap(), Value::List(_)));
        assert_eq!(target.heap().live_count(), 100_000);
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let ctx = ModuleContext::new(module("cellar"));
        let mut w = StateWriter {
            buf: BytesMut::new(),
            module: ctx.module(),
            heap: ctx.heap(),
            refs: HashMap::new(),
            next_ref: 0,
        };
        assert!(matches!(
            w.count(u32::MAX as usize + 1),
            Err(StateError::Invalid(_))
        ));
        assert!(w.buf.is_empty());
        w.count(u32::MAX as usize).unwrap();
        assert_eq!(w.buf.to_vec(), vec![0xff; 4]);
    }
}
