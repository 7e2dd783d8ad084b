//! The fixed instruction set.
//!
//! Operations work against the request's value stack. Operands are pushed
//! in the order they are listed in each variant's doc comment and popped in
//! reverse, so `GiveObject` expects `[owner, object]` with the object on top.

use serde::{Deserialize, Serialize};

use crate::value::ArithmeticOp;

/// Compile-time constant pushed by [`Operation::Push`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Element reference by identity.
    Element(String),
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

/// Ordered sequence of operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(pub Vec<Operation>);

impl Block {
    pub fn new(ops: Vec<Operation>) -> Self {
        Block(ops)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<Operation>> for Block {
    fn from(ops: Vec<Operation>) -> Self {
        Block(ops)
    }
}

/// Named function: arguments become locals of the call frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Noop,

    // Stack and variables
    /// Push a constant.
    Push(Literal),
    /// Push a new empty list.
    PushList,
    /// Push the element whose block is running.
    PushThis,
    /// Push the current player, or `false` when there is none.
    PushCurrentPlayer,
    /// Push the current room, or `false` when there is none.
    PushCurrentRoom,
    Pop,
    Dup,
    /// Push a local, falling back to the `this` element's variable.
    Load(String),
    /// `[value]` -> into the local if declared, else the `this` element's variable.
    Store(String),
    /// `[value]` -> declare a local in the current frame.
    Local(String),
    /// `[element]` -> push the element's variable.
    LoadFrom(String),
    /// `[element, value]` -> set the element's variable.
    StoreTo(String),
    /// `[a, b]` or `[a]` for unary operators.
    Arithmetic(ArithmeticOp),

    // Control
    If {
        condition: Block,
        success: Block,
        #[serde(default)]
        failure: Block,
    },
    While {
        condition: Block,
        body: Block,
    },
    For {
        init: Block,
        condition: Block,
        step: Block,
        body: Block,
    },
    Break,
    Continue,
    End,
    Finish,
    Quit,
    /// `[args..]` -> call a function resolved on `this`; pushes its result.
    Call(String),
    /// `[args.., element]` -> call a function resolved on `element`.
    CallOn(String),
    /// `[value]` -> set the frame result and end the function.
    Return,

    // Cues
    /// `[value]`
    Text,
    /// `[value]`
    TextLn,
    /// `[value]` formatted text with inline markup.
    TextF,
    /// `[value]`
    TextFLn,
    Pause,
    /// `[milliseconds]`
    Wait,
    /// `[value]`
    Tip,
    /// `[value]`
    Info,
    /// `[value]` emitted only while tracing.
    Trace,
    /// `[value]` recoverable error raised by the author.
    Error,

    // Ownership
    /// `[owner, object]`
    GiveObject,
    /// `[object]`
    RemoveObject,
    /// `[from, to]` move every object, keeping order.
    MoveObjects,
    /// `[owner, object]` -> boolean
    HasObject,
    /// `[object]` -> boolean
    ObjectHasNoOwner,
    /// `[owner]` -> integer
    ObjectCount,
    /// `[owner]` -> list of objects
    ObjectsOf,
    /// `[object]` -> owner or `false`
    OwnerOf,
    /// `[player]`
    SetPlayer,
    ClearPlayer,
    /// `[room]` teleport the current player.
    SetRoom,
    /// `[room]`
    PushRoom,
    PopRoom,
    /// `[room]` replace the top of the current player's stack.
    SwapRoom,
    /// `[player]` -> boolean
    CurrentPlayerIs,
    NoCurrentPlayer,
    /// `[room]` -> boolean
    CurrentRoomIs,
    NoCurrentRoom,
    /// `[player, room]` -> boolean, checks the whole stack.
    PlayerIsInRoom,
    /// `[object, name]`
    AddObjectName,
    /// `[object, name]`
    RemoveObjectName,
    /// `[object, name]` -> boolean
    HasObjectName,
    /// `[object, tag]`
    AddObjectTag,
    /// `[object, tag]`
    RemoveObjectTag,
    /// `[object, tag]` -> boolean
    HasObjectTag,
    /// `[element]` run browse blocks of every owned object.
    Browse,

    // Element queries
    /// `[element]` -> identity string
    Identity,
    /// `[element, ancestor]` -> boolean
    InstanceOf,
    /// Push a header value (empty string when absent).
    Header(String),

    // Action queue
    /// `[action]`
    QueueAction,
    /// `[action, text]`
    QueueActionOpen,
    /// `[action, mode]`
    QueueActionModal,
    /// `[action, object]`
    QueueActionObject,
    /// `[action, object, object]`
    QueueActionObjects,

    /// Value built-ins.
    Builtin(Builtin),
}

impl Operation {
    /// Shorthand for pushing a constant.
    pub fn push(literal: impl Into<Literal>) -> Self {
        Operation::Push(literal.into())
    }

    /// Shorthand for pushing an element reference.
    pub fn element(identity: &str) -> Self {
        Operation::Push(Literal::Element(identity.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Noop => "noop",
            Operation::Push(_) => "push",
            Operation::PushList => "pushList",
            Operation::PushThis => "pushThis",
            Operation::PushCurrentPlayer => "pushCurrentPlayer",
            Operation::PushCurrentRoom => "pushCurrentRoom",
            Operation::Pop => "pop",
            Operation::Dup => "dup",
            Operation::Load(_) => "load",
            Operation::Store(_) => "store",
            Operation::Local(_) => "local",
            Operation::LoadFrom(_) => "loadFrom",
            Operation::StoreTo(_) => "storeTo",
            Operation::Arithmetic(_) => "arithmetic",
            Operation::If { .. } => "if",
            Operation::While { .. } => "while",
            Operation::For { .. } => "for",
            Operation::Break => "break",
            Operation::Continue => "continue",
            Operation::End => "end",
            Operation::Finish => "finish",
            Operation::Quit => "quit",
            Operation::Call(_) => "call",
            Operation::CallOn(_) => "callOn",
            Operation::Return => "return",
            Operation::Text => "text",
            Operation::TextLn => "textln",
            Operation::TextF => "textf",
            Operation::TextFLn => "textfln",
            Operation::Pause => "pause",
            Operation::Wait => "wait",
            Operation::Tip => "tip",
            Operation::Info => "info",
            Operation::Trace => "trace",
            Operation::Error => "error",
            Operation::GiveObject => "giveObject",
            Operation::RemoveObject => "removeObject",
            Operation::MoveObjects => "moveObjects",
            Operation::HasObject => "hasObject",
            Operation::ObjectHasNoOwner => "objectHasNoOwner",
            Operation::ObjectCount => "objectCount",
            Operation::ObjectsOf => "objectsOf",
            Operation::OwnerOf => "ownerOf",
            Operation::SetPlayer => "setPlayer",
            Operation::ClearPlayer => "clearPlayer",
            Operation::SetRoom => "setRoom",
            Operation::PushRoom => "pushRoom",
            Operation::PopRoom => "popRoom",
            Operation::SwapRoom => "swapRoom",
            Operation::CurrentPlayerIs => "currentPlayerIs",
            Operation::NoCurrentPlayer => "noCurrentPlayer",
            Operation::CurrentRoomIs => "currentRoomIs",
            Operation::NoCurrentRoom => "noCurrentRoom",
            Operation::PlayerIsInRoom => "playerIsInRoom",
            Operation::AddObjectName => "addObjectName",
            Operation::RemoveObjectName => "removeObjectName",
            Operation::HasObjectName => "hasObjectName",
            Operation::AddObjectTag => "addObjectTag",
            Operation::RemoveObjectTag => "removeObjectTag",
            Operation::HasObjectTag => "hasObjectTag",
            Operation::Browse => "browse",
            Operation::Identity => "identity",
            Operation::InstanceOf => "instanceOf",
            Operation::Header(_) => "header",
            Operation::QueueAction => "queueAction",
            Operation::QueueActionOpen => "queueActionOpen",
            Operation::QueueActionModal => "queueActionModal",
            Operation::QueueActionObject => "queueActionObject",
            Operation::QueueActionObjects => "queueActionObjects",
            Operation::Builtin(b) => b.name(),
        }
    }

    /// Nested blocks, for validation and exporters.
    pub fn child_blocks(&self) -> Vec<&Block> {
        match self {
            Operation::If {
                condition,
                success,
                failure,
            } => vec![condition, success, failure],
            Operation::While { condition, body } => vec![condition, body],
            Operation::For {
                init,
                condition,
                step,
                body,
            } => vec![init, condition, step, body],
            _ => Vec::new(),
        }
    }
}

/// Value built-ins. Argument order follows the stack convention above and
/// every built-in pushes exactly one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    /// `[value]`
    AsBoolean,
    AsInteger,
    AsFloat,
    AsString,
    /// `[value]` -> kind name
    TypeOf,
    Length,
    IsEmpty,

    /// `[string, needle]` -> index or -1
    StrIndexOf,
    /// `[string, start, end]`
    StrSubstring,
    StrUpper,
    StrLower,
    StrTrim,
    /// `[string, needle]`
    StrContains,
    StrStartsWith,
    StrEndsWith,
    /// `[string, from, to]`
    StrReplace,
    /// `[string, separator]` -> list
    StrSplit,
    /// `[list, separator]` -> string
    StrJoin,
    /// `[string, index]` -> single character string
    StrChar,

    /// `[pattern, string]` -> boolean
    RegexMatches,
    /// `[pattern, string]` -> first match or `false`
    RegexFind,
    /// `[pattern, string]` -> list of matches
    RegexFindAll,
    /// `[pattern, string, replacement]`
    RegexReplace,

    /// `[a, b]`
    Min,
    Max,
    /// `[value, low, high]`
    Clamp,
    Floor,
    Ceiling,
    Round,
    Sqrt,
    /// `[bound]` -> integer in `[0, bound)`
    RandomInt,
    /// `[bound]` -> float in `[0, bound)`
    RandomFloat,
    /// `[mean, deviation]`
    RandomGaussian,

    /// `[list, value]` -> whether the list changed
    ListAdd,
    /// `[list, index, value]`
    ListAddAt,
    /// `[list, value]`
    ListRemove,
    /// `[list, index]` -> removed value or `false`
    ListRemoveAt,
    /// `[list, index, value]` -> `false` when the index is out of range
    ListSet,
    /// `[list, index]` -> item or `false`
    ListGet,
    /// `[list, value]`
    ListIndexOf,
    ListContains,
    /// `[list]` -> new list with the same items
    ListCopy,
    /// `[list, list]` -> new list
    ListConcat,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::AsBoolean => "asBoolean",
            Builtin::AsInteger => "asInt",
            Builtin::AsFloat => "asFloat",
            Builtin::AsString => "asString",
            Builtin::TypeOf => "typeOf",
            Builtin::Length => "length",
            Builtin::IsEmpty => "isEmpty",
            Builtin::StrIndexOf => "strIndexOf",
            Builtin::StrSubstring => "strSubstring",
            Builtin::StrUpper => "strUpper",
            Builtin::StrLower => "strLower",
            Builtin::StrTrim => "strTrim",
            Builtin::StrContains => "strContains",
            Builtin::StrStartsWith => "strStartsWith",
            Builtin::StrEndsWith => "strEndsWith",
            Builtin::StrReplace => "strReplace",
            Builtin::StrSplit => "strSplit",
            Builtin::StrJoin => "strJoin",
            Builtin::StrChar => "strChar",
            Builtin::RegexMatches => "regexMatches",
            Builtin::RegexFind => "regexFind",
            Builtin::RegexFindAll => "regexFindAll",
            Builtin::RegexReplace => "regexReplace",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Clamp => "clamp",
            Builtin::Floor => "floor",
            Builtin::Ceiling => "ceiling",
            Builtin::Round => "round",
            Builtin::Sqrt => "sqrt",
            Builtin::RandomInt => "irandom",
            Builtin::RandomFloat => "frandom",
            Builtin::RandomGaussian => "grandom",
            Builtin::ListAdd => "listAdd",
            Builtin::ListAddAt => "listAddAt",
            Builtin::ListRemove => "listRemove",
            Builtin::ListRemoveAt => "listRemoveAt",
            Builtin::ListSet => "listSet",
            Builtin::ListGet => "listGet",
            Builtin::ListIndexOf => "listIndexOf",
            Builtin::ListContains => "listContains",
            Builtin::ListCopy => "listCopy",
            Builtin::ListConcat => "listConcat",
        }
    }
}
