//! Runtime values and the list heap.
//!
//! Scalars (booleans, integers, floats, strings, element references) are
//! plain data and are copied freely. Lists are the only mutable values, so
//! they live in a [`ValueHeap`] arena and a [`Value::List`] only carries the
//! [`ListId`] of its slot. Two variables that hold the same `ListId` hold the
//! same list instance: a mutation through one is visible through the other,
//! and the save-state codec preserves that sharing.
//!
//! Arithmetic follows a fixed coercion table:
//!
//! ```text
//! numeric view   bool -> int (1/0), string -> int | float | NaN, list/element -> NaN
//! ADD            string on either side concatenates; bool+bool is OR
//! SUBTRACT       bool-bool is (a AND NOT b)
//! MULTIPLY       bool*bool is AND
//! DIVIDE         int/0 is NaN (0/0) or +/-Infinity; otherwise truncating int
//! MODULO         int%0 is NaN
//! POWER          always float
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::module::{ElementId, Module};

/// Handle to a list stored in a [`ValueHeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(pub(crate) u32);

impl ListId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A tagged runtime value. The derived equality is the strict one: same
/// kind and same payload, lists and elements by identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(ListId),
    Element(ElementId),
}

/// Arithmetic, logical and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Absolute,
    Negate,
    LogicalNot,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Equals,
    NotEquals,
    StrictEquals,
    StrictNotEquals,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ArithmeticOp {
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            ArithmeticOp::Absolute | ArithmeticOp::Negate | ArithmeticOp::LogicalNot
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::Integer(i),
            Num::Float(f) => Value::Float(f),
        }
    }
}

fn parse_number(s: &str) -> Option<Num> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Num::Int(i));
    }
    trimmed.parse::<f64>().ok().map(Num::Float)
}

fn numeric(v: &Value) -> Num {
    match v {
        Value::Boolean(b) => Num::Int(i64::from(*b)),
        Value::Integer(i) => Num::Int(*i),
        Value::Float(f) => Num::Float(*f),
        Value::String(s) => parse_number(s).unwrap_or(Num::Float(f64::NAN)),
        Value::List(_) | Value::Element(_) => Num::Float(f64::NAN),
    }
}

fn num_eq(a: Num, b: Num) -> bool {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x == y,
        _ => a.as_f64() == b.as_f64(),
    }
}

fn num_cmp(a: Num, b: Num) -> Option<Ordering> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Allocate a fresh empty list on `heap`.
    pub fn new_list(heap: &mut ValueHeap) -> Result<Self, EngineError> {
        Ok(Value::List(heap.new_list()?))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Element(_) => "element",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn as_list(&self) -> Option<ListId> {
        match self {
            Value::List(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<ElementId> {
        match self {
            Value::Element(id) => Some(*id),
            _ => None,
        }
    }

    /// Truthiness used by conditionals and logical operators.
    pub fn is_truthy(&self, heap: &ValueHeap) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(id) => heap.len(*id) > 0,
            Value::Element(_) => true,
        }
    }

    /// Integer view; NaN and non-numeric values become 0, floats truncate.
    pub fn as_integer(&self) -> i64 {
        match numeric(self) {
            Num::Int(i) => i,
            Num::Float(f) if f.is_nan() => 0,
            Num::Float(f) => f as i64,
        }
    }

    pub fn as_float(&self) -> f64 {
        numeric(self).as_f64()
    }

    /// Length of a list or string (in characters); scalars count as 1.
    pub fn length(&self, heap: &ValueHeap) -> usize {
        match self {
            Value::List(id) => heap.len(*id),
            Value::String(s) => s.chars().count(),
            _ => 1,
        }
    }

    pub fn is_empty(&self, heap: &ValueHeap) -> bool {
        match self {
            Value::List(id) => heap.len(*id) == 0,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Printable form. Element references print their identity; a list
    /// already being printed shows as `[...]`. Nested lists are walked with
    /// an explicit stack, so depth is bounded by memory only.
    pub fn as_string(&self, heap: &ValueHeap, module: &Module) -> String {
        let mut out = String::new();
        let mut open: Vec<(ListId, usize)> = Vec::new();
        let mut visiting: HashSet<ListId> = HashSet::new();
        let mut current: Option<&Value> = Some(self);
        loop {
            match current.take() {
                Some(Value::List(id)) if visiting.contains(id) => out.push_str("[...]"),
                Some(Value::List(id)) => {
                    out.push('[');
                    visiting.insert(*id);
                    open.push((*id, 0));
                }
                Some(scalar) => scalar.write_scalar(&mut out, module),
                None => {}
            }
            let Some((id, index)) = open.last_mut() else {
                return out;
            };
            let id = *id;
            let items = heap.items(id);
            if *index < items.len() {
                if *index > 0 {
                    out.push_str(", ");
                }
                current = Some(&items[*index]);
                *index += 1;
            } else {
                out.push(']');
                visiting.remove(&id);
                open.pop();
            }
        }
    }

    fn write_scalar(&self, out: &mut String, module: &Module) {
        match self {
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Integer(i) => {
                let _ = write!(out, "{}", i);
            }
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::String(s) => out.push_str(s),
            Value::Element(id) => out.push_str(module.identity(*id)),
            Value::List(_) => {}
        }
    }

    /// Loose equality: numbers compare numerically across kinds, numeric
    /// strings compare against numbers, lists and elements by identity.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Element(a), Value::Element(b)) => a == b,
            (Value::List(_) | Value::Element(_), _) | (_, Value::List(_) | Value::Element(_)) => {
                false
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::String(s), n) | (n, Value::String(s)) => parse_number(s)
                .map(|parsed| num_eq(parsed, numeric(n)))
                .unwrap_or(false),
            _ => num_eq(numeric(self), numeric(other)),
        }
    }

    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => num_cmp(numeric(self), numeric(other)),
        }
    }

    /// Apply a unary operator.
    pub fn unary(op: ArithmeticOp, value: &Value, heap: &ValueHeap, module: &Module) -> Value {
        match op {
            ArithmeticOp::LogicalNot => Value::Boolean(!value.is_truthy(heap)),
            ArithmeticOp::Negate => match value {
                Value::Boolean(b) => Value::Boolean(!b),
                other => match numeric(other) {
                    Num::Int(i) => Value::Integer(i.wrapping_neg()),
                    Num::Float(f) => Value::Float(-f),
                },
            },
            ArithmeticOp::Absolute => match numeric(value) {
                Num::Int(i) => Value::Integer(i.wrapping_abs()),
                Num::Float(f) => Value::Float(f.abs()),
            },
            // Binary operators applied to a single operand compare it with itself.
            other => Value::binary(other, value, value, heap, module),
        }
    }

    /// Apply a binary operator. Concatenation prints both sides the way
    /// [`Value::as_string`] does, which is why the module is needed.
    pub fn binary(op: ArithmeticOp, a: &Value, b: &Value, heap: &ValueHeap, module: &Module) -> Value {
        match op {
            ArithmeticOp::Add => match (a, b) {
                (Value::String(_), _) | (_, Value::String(_)) => {
                    let mut text = a.as_string(heap, module);
                    text.push_str(&b.as_string(heap, module));
                    Value::String(text)
                }
                (Value::Boolean(x), Value::Boolean(y)) => Value::Boolean(*x || *y),
                _ => match (numeric(a), numeric(b)) {
                    (Num::Int(x), Num::Int(y)) => Value::Integer(x.wrapping_add(y)),
                    (x, y) => Value::Float(x.as_f64() + y.as_f64()),
                },
            },
            ArithmeticOp::Subtract => match (a, b) {
                (Value::Boolean(x), Value::Boolean(y)) => Value::Boolean(*x && !*y),
                _ => match (numeric(a), numeric(b)) {
                    (Num::Int(x), Num::Int(y)) => Value::Integer(x.wrapping_sub(y)),
                    (x, y) => Value::Float(x.as_f64() - y.as_f64()),
                },
            },
            ArithmeticOp::Multiply => match (a, b) {
                (Value::Boolean(x), Value::Boolean(y)) => Value::Boolean(*x && *y),
                _ => match (numeric(a), numeric(b)) {
                    (Num::Int(x), Num::Int(y)) => Value::Integer(x.wrapping_mul(y)),
                    (x, y) => Value::Float(x.as_f64() * y.as_f64()),
                },
            },
            ArithmeticOp::Divide => match (numeric(a), numeric(b)) {
                (Num::Int(x), Num::Int(0)) => {
                    if x == 0 {
                        Value::Float(f64::NAN)
                    } else if x > 0 {
                        Value::Float(f64::INFINITY)
                    } else {
                        Value::Float(f64::NEG_INFINITY)
                    }
                }
                (Num::Int(x), Num::Int(y)) => Value::Integer(x.wrapping_div(y)),
                (x, y) => Value::Float(x.as_f64() / y.as_f64()),
            },
            ArithmeticOp::Modulo => match (numeric(a), numeric(b)) {
                (Num::Int(_), Num::Int(0)) => Value::Float(f64::NAN),
                (Num::Int(x), Num::Int(y)) => Value::Integer(x.wrapping_rem(y)),
                (x, y) => Value::Float(x.as_f64() % y.as_f64()),
            },
            ArithmeticOp::Power => Value::Float(numeric(a).as_f64().powf(numeric(b).as_f64())),
            ArithmeticOp::LogicalAnd => Value::Boolean(a.is_truthy(heap) && b.is_truthy(heap)),
            ArithmeticOp::LogicalOr => Value::Boolean(a.is_truthy(heap) || b.is_truthy(heap)),
            ArithmeticOp::LogicalXor => Value::Boolean(a.is_truthy(heap) ^ b.is_truthy(heap)),
            ArithmeticOp::Equals => Value::Boolean(a.loose_equals(b)),
            ArithmeticOp::NotEquals => Value::Boolean(!a.loose_equals(b)),
            ArithmeticOp::StrictEquals => Value::Boolean(a == b),
            ArithmeticOp::StrictNotEquals => Value::Boolean(a != b),
            ArithmeticOp::Less => Value::Boolean(a.compare(b) == Some(Ordering::Less)),
            ArithmeticOp::LessOrEqual => Value::Boolean(matches!(
                a.compare(b),
                Some(Ordering::Less | Ordering::Equal)
            )),
            ArithmeticOp::Greater => Value::Boolean(a.compare(b) == Some(Ordering::Greater)),
            ArithmeticOp::GreaterOrEqual => Value::Boolean(matches!(
                a.compare(b),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            unary => Value::unary(unary, a, heap, module),
        }
    }

    /// Numeric result of a numeric-only built-in, keeping integers integral.
    pub(crate) fn numeric_value(&self) -> Value {
        numeric(self).into_value()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Arena of list payloads addressed by [`ListId`].
///
/// Slots are reused after [`ValueHeap::collect`] frees lists that are no
/// longer reachable from any root. A heap holds at most `u32::MAX` slots.
#[derive(Debug, Clone)]
pub struct ValueHeap {
    slots: Vec<Option<Vec<Value>>>,
    free: Vec<u32>,
    limit: usize,
}

impl Default for ValueHeap {
    fn default() -> Self {
        Self::with_limit(u32::MAX as usize)
    }
}

impl ValueHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A heap that refuses to grow past `limit` slots.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            limit: limit.min(u32::MAX as usize),
        }
    }

    pub fn new_list(&mut self) -> Result<ListId, EngineError> {
        self.list_from(Vec::new())
    }

    pub fn list_from(&mut self, items: Vec<Value>) -> Result<ListId, EngineError> {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(items);
            return Ok(ListId(index));
        }
        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|&index| (index as usize) < self.limit)
            .ok_or(EngineError::HeapExhausted(self.limit))?;
        self.slots.push(Some(items));
        Ok(ListId(index))
    }

    pub fn contains(&self, id: ListId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    /// Items of a live list; a stale handle reads as empty.
    pub fn items(&self, id: ListId) -> &[Value] {
        match self.slots.get(id.index()) {
            Some(Some(items)) => items,
            _ => &[],
        }
    }

    fn items_mut(&mut self, id: ListId) -> Option<&mut Vec<Value>> {
        self.slots.get_mut(id.index()).and_then(|slot| slot.as_mut())
    }

    pub fn len(&self, id: ListId) -> usize {
        self.items(id).len()
    }

    pub fn list_add(&mut self, id: ListId, value: Value) -> bool {
        match self.items_mut(id) {
            Some(items) => {
                items.push(value);
                true
            }
            None => false,
        }
    }

    /// Insert at `index` (0..=len). Out-of-range indices leave the list alone.
    pub fn list_add_at(&mut self, id: ListId, index: i64, value: Value) -> bool {
        match self.items_mut(id) {
            Some(items) if index >= 0 && (index as usize) <= items.len() => {
                items.insert(index as usize, value);
                true
            }
            _ => false,
        }
    }

    /// Remove the first strictly-equal item.
    pub fn list_remove(&mut self, id: ListId, value: &Value) -> bool {
        match self.items_mut(id) {
            Some(items) => match items.iter().position(|v| v == value) {
                Some(pos) => {
                    items.remove(pos);
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    pub fn list_remove_at(&mut self, id: ListId, index: i64) -> Option<Value> {
        let items = self.items_mut(id)?;
        if index < 0 || index as usize >= items.len() {
            return None;
        }
        Some(items.remove(index as usize))
    }

    pub fn list_set(&mut self, id: ListId, index: i64, value: Value) -> bool {
        match self.items_mut(id) {
            Some(items) if index >= 0 && (index as usize) < items.len() => {
                items[index as usize] = value;
                true
            }
            _ => false,
        }
    }

    pub fn list_get(&self, id: ListId, index: i64) -> Option<Value> {
        if index < 0 {
            return None;
        }
        self.items(id).get(index as usize).cloned()
    }

    /// Index of the first strictly-equal item, or -1.
    pub fn list_index_of(&self, id: ListId, value: &Value) -> i64 {
        self.items(id)
            .iter()
            .position(|v| v == value)
            .map(|p| p as i64)
            .unwrap_or(-1)
    }

    pub fn list_contains(&self, id: ListId, value: &Value) -> bool {
        self.list_index_of(id, value) >= 0
    }

    /// Shallow copy into a new list instance.
    pub fn list_copy(&mut self, id: ListId) -> Result<ListId, EngineError> {
        let items = self.items(id).to_vec();
        self.list_from(items)
    }

    /// Number of live lists.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    /// Free every list not reachable from `roots`. Returns the number freed.
    pub fn collect<'a>(&mut self, roots: impl IntoIterator<Item = &'a Value>) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut pending: Vec<ListId> = roots.into_iter().filter_map(Value::as_list).collect();
        while let Some(id) = pending.pop() {
            let index = id.index();
            if index >= marked.len() || marked[index] {
                continue;
            }
            marked[index] = true;
            pending.extend(self.items(id).iter().filter_map(Value::as_list));
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !marked[index] {
                *slot = None;
                self.free.push(index as u32);
                freed += 1;
            }
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ArithmeticOp::*;

    fn heap() -> ValueHeap {
        ValueHeap::new()
    }

    fn module() -> Module {
        crate::module::ModuleBuilder::new()
            .element(crate::module::ElementDef::world())
            .element(crate::module::ElementDef::object("lamp"))
            .build()
            .unwrap()
    }

    fn s(text: &str) -> Value {
        Value::string(text)
    }

    fn check(op: ArithmeticOp, a: Value, b: Value, expected: Value) {
        let h = heap();
        let got = Value::binary(op, &a, &b, &h, &module());
        match (&got, &expected) {
            (Value::Float(x), Value::Float(y)) if x.is_nan() && y.is_nan() => {}
            _ => assert_eq!(got, expected, "{:?} {:?} {:?}", op, a, b),
        }
    }

    #[test]
    fn add_truth_table() {
        let rows = vec![
            (Value::Boolean(true), Value::Boolean(false), Value::Boolean(true)),
            (Value::Boolean(false), Value::Boolean(false), Value::Boolean(false)),
            (Value::Boolean(true), Value::Integer(2), Value::Integer(3)),
            (Value::Integer(2), Value::Integer(3), Value::Integer(5)),
            (Value::Integer(2), Value::Float(0.5), Value::Float(2.5)),
            (Value::Float(1.5), Value::Boolean(true), Value::Float(2.5)),
            (Value::Integer(i64::MAX), Value::Integer(1), Value::Integer(i64::MIN)),
            (s("a"), Value::Integer(1), s("a1")),
            (Value::Integer(1), s("a"), s("1a")),
            (s("x"), Value::Boolean(true), s("xtrue")),
            (s("x"), Value::Float(2.0), s("x2.0")),
            (s("1"), s("2"), s("12")),
        ];
        for (a, b, expected) in rows {
            check(Add, a, b, expected);
        }
    }

    #[test]
    fn subtract_multiply_truth_table() {
        check(Subtract, Value::Boolean(true), Value::Boolean(false), Value::Boolean(true));
        check(Subtract, Value::Boolean(true), Value::Boolean(true), Value::Boolean(false));
        check(Subtract, Value::Integer(5), Value::Integer(7), Value::Integer(-2));
        check(Subtract, s("10"), Value::Integer(4), Value::Integer(6));
        check(Subtract, s("2.5"), Value::Integer(1), Value::Float(1.5));
        check(Subtract, s("abc"), Value::Integer(1), Value::Float(f64::NAN));
        check(Multiply, Value::Boolean(true), Value::Boolean(false), Value::Boolean(false));
        check(Multiply, Value::Boolean(true), Value::Boolean(true), Value::Boolean(true));
        check(Multiply, Value::Integer(6), Value::Integer(7), Value::Integer(42));
        check(Multiply, Value::Integer(2), Value::Float(1.25), Value::Float(2.5));
        check(Multiply, Value::Boolean(true), Value::Integer(9), Value::Integer(9));
    }

    #[test]
    fn divide_and_modulo_edge_cases() {
        check(Divide, Value::Integer(7), Value::Integer(2), Value::Integer(3));
        check(Divide, Value::Integer(-7), Value::Integer(2), Value::Integer(-3));
        check(Divide, Value::Integer(1), Value::Integer(0), Value::Float(f64::INFINITY));
        check(Divide, Value::Integer(-1), Value::Integer(0), Value::Float(f64::NEG_INFINITY));
        check(Divide, Value::Integer(0), Value::Integer(0), Value::Float(f64::NAN));
        check(Divide, Value::Float(1.0), Value::Integer(0), Value::Float(f64::INFINITY));
        check(Divide, Value::Integer(i64::MIN), Value::Integer(-1), Value::Integer(i64::MIN));
        check(Modulo, Value::Integer(7), Value::Integer(3), Value::Integer(1));
        check(Modulo, Value::Integer(7), Value::Integer(0), Value::Float(f64::NAN));
        check(Modulo, Value::Float(7.5), Value::Integer(2), Value::Float(1.5));
        check(Power, Value::Integer(2), Value::Integer(10), Value::Float(1024.0));
    }

    #[test]
    fn unary_operators() {
        let h = heap();
        let m = module();
        assert_eq!(Value::unary(Negate, &Value::Integer(4), &h, &m), Value::Integer(-4));
        assert_eq!(Value::unary(Negate, &Value::Boolean(true), &h, &m), Value::Boolean(false));
        assert_eq!(Value::unary(Negate, &s("2.5"), &h, &m), Value::Float(-2.5));
        assert_eq!(Value::unary(Absolute, &Value::Integer(-4), &h, &m), Value::Integer(4));
        assert_eq!(Value::unary(Absolute, &Value::Float(-0.5), &h, &m), Value::Float(0.5));
        assert_eq!(Value::unary(LogicalNot, &s(""), &h, &m), Value::Boolean(true));
        assert_eq!(Value::unary(LogicalNot, &Value::Float(f64::NAN), &h, &m), Value::Boolean(true));
    }

    #[test]
    fn equality_and_comparison_truth_table() {
        check(Equals, Value::Integer(1), Value::Float(1.0), Value::Boolean(true));
        check(Equals, Value::Boolean(true), Value::Integer(1), Value::Boolean(true));
        check(Equals, s("3"), Value::Integer(3), Value::Boolean(true));
        check(Equals, Value::Float(3.0), s("3"), Value::Boolean(true));
        check(Equals, s("three"), Value::Integer(3), Value::Boolean(false));
        check(Equals, s("a"), s("a"), Value::Boolean(true));
        check(StrictEquals, Value::Integer(1), Value::Float(1.0), Value::Boolean(false));
        check(StrictEquals, s("a"), s("a"), Value::Boolean(true));
        check(StrictNotEquals, Value::Integer(1), Value::Integer(2), Value::Boolean(true));
        check(Less, s("apple"), s("banana"), Value::Boolean(true));
        check(Less, s("10"), Value::Integer(9), Value::Boolean(false));
        check(Greater, Value::Float(f64::NAN), Value::Integer(1), Value::Boolean(false));
        check(LessOrEqual, Value::Integer(2), Value::Float(2.0), Value::Boolean(true));
        check(GreaterOrEqual, Value::Boolean(false), Value::Integer(0), Value::Boolean(true));
    }

    #[test]
    fn lists_compare_by_identity() {
        let mut h = heap();
        let a = Value::new_list(&mut h).unwrap();
        let b = Value::new_list(&mut h).unwrap();
        assert!(a.loose_equals(&a.clone()));
        assert!(!a.loose_equals(&b));
        assert!(!a.loose_equals(&Value::Integer(0)));
        assert_eq!(Value::binary(LogicalAnd, &a, &Value::Boolean(true), &h, &module()), Value::Boolean(false));
    }

    #[test]
    fn list_mutation_operations() {
        let mut h = heap();
        let id = h.new_list().unwrap();
        assert!(h.list_add(id, Value::Integer(1)));
        assert!(h.list_add(id, Value::Integer(3)));
        assert!(h.list_add_at(id, 1, Value::Integer(2)));
        assert!(!h.list_add_at(id, 9, Value::Integer(9)));
        assert_eq!(h.items(id), &[Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(h.list_index_of(id, &Value::Integer(3)), 2);
        assert_eq!(h.list_index_of(id, &Value::Float(3.0)), -1);
        assert!(h.list_set(id, 0, s("one")));
        assert!(h.list_remove(id, &s("one")));
        assert_eq!(h.list_remove_at(id, 1), Some(Value::Integer(3)));
        assert_eq!(h.list_remove_at(id, 5), None);
        assert_eq!(h.len(id), 1);
        assert_eq!(Value::List(id).length(&h), 1);
        assert!(!Value::List(id).is_empty(&h));
    }

    #[test]
    fn collect_frees_unreachable_and_keeps_cycles_alive() {
        let mut h = heap();
        let kept = h.new_list().unwrap();
        let inner = h.new_list().unwrap();
        let dropped = h.new_list().unwrap();
        h.list_add(kept, Value::List(inner));
        h.list_add(inner, Value::List(kept));
        h.list_add(dropped, Value::List(dropped));

        let roots = vec![Value::List(kept)];
        assert_eq!(h.collect(roots.iter()), 1);
        assert!(h.contains(kept));
        assert!(h.contains(inner));
        assert!(!h.contains(dropped));
        let reused = h.new_list().unwrap();
        assert_eq!(reused, dropped);
    }

    #[test]
    fn concatenation_prints_lists_and_elements_in_full() {
        let m = module();
        let lamp = m.find("lamp").unwrap();
        let mut h = heap();
        let list = h.list_from(vec![Value::Integer(1), Value::Element(lamp)]).unwrap();
        h.list_add(list, Value::List(list));

        let text = Value::binary(Add, &s("got "), &Value::List(list), &h, &m);
        assert_eq!(text, s("got [1, lamp, [...]]"));
        let text = Value::binary(Add, &Value::Element(lamp), &s("!"), &h, &m);
        assert_eq!(text, s("lamp!"));
    }

    #[test]
    fn deeply_nested_lists_print_without_recursion() {
        let m = module();
        let mut h = heap();
        let root = h.new_list().unwrap();
        let mut tail = root;
        for _ in 0..100_000 {
            let next = h.new_list().unwrap();
            h.list_add(tail, Value::List(next));
            tail = next;
        }
        h.list_add(tail, Value::Integer(7));
        let text = Value::List(root).as_string(&h, &m);
        assert_eq!(text.len(), 2 * 100_001 + 1);
        assert!(text.starts_with("[[[") && text.contains("[7]"));
    }

    #[test]
    fn heap_refuses_to_grow_past_its_limit() {
        let mut h = ValueHeap::with_limit(2);
        let first = h.new_list().unwrap();
        h.new_list().unwrap();
        assert!(matches!(h.new_list(), Err(EngineError::HeapExhausted(2))));
        assert!(matches!(h.list_copy(first), Err(EngineError::HeapExhausted(2))));

        h.collect(std::iter::empty());
        assert!(h.new_list().is_ok());
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::Float(2.9).as_integer(), 2);
        assert_eq!(s("nope").as_integer(), 0);
        assert_eq!(s(" 12 ").as_integer(), 12);
        assert_eq!(Value::Boolean(true).as_float(), 1.0);
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(f64::NEG_INFINITY), "-Infinity");
    }
}
