use thiserror::Error;

/// Errors raised while linking or loading a module definition.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Two elements share the same identity.
    #[error("duplicate element identity: {0}")]
    DuplicateIdentity(String),

    /// The module has no world element, or more than one.
    #[error("module must declare exactly one world element (found {0})")]
    WorldCount(usize),

    /// The world element must use the reserved identity.
    #[error("world element must be named 'world', found '{0}'")]
    WorldIdentity(String),

    /// A reference names an element that does not exist.
    #[error("unknown element '{identity}' referenced from {context}")]
    UnknownElement { identity: String, context: String },

    /// Parent and child are of different kinds.
    #[error("element '{child}' cannot inherit from '{parent}': kinds differ")]
    ParentKindMismatch { child: String, parent: String },

    /// Following parents from this element leads back to it.
    #[error("inheritance cycle through element '{0}'")]
    InheritanceCycle(String),

    /// A block is bound to a trigger the element kind does not accept.
    #[error("trigger {trigger} is not legal on {kind} element '{identity}'")]
    IllegalTrigger {
        identity: String,
        kind: &'static str,
        trigger: String,
    },

    /// The same trigger is bound twice on one element.
    #[error("element '{identity}' binds trigger {trigger} more than once")]
    DuplicateTrigger { identity: String, trigger: String },

    /// Archetypes are templates and cannot hold instance data.
    #[error("archetype '{identity}' cannot declare {what}")]
    ArchetypeData { identity: String, what: &'static str },

    /// Names, determiners and tags only belong on objects; action data only on actions.
    #[error("element '{identity}' cannot declare {what}")]
    MisplacedData { identity: String, what: &'static str },

    /// A trigger key references an element of the wrong kind.
    #[error("trigger {trigger} on '{identity}' expects {expected} '{target}'")]
    TriggerTargetKind {
        identity: String,
        trigger: String,
        expected: &'static str,
        target: String,
    },

    /// An action element without its command data.
    #[error("action '{0}' is missing its action data")]
    MissingActionData(String),

    /// Two functions with the same name on one element.
    #[error("element '{identity}' declares function '{name}' more than once")]
    DuplicateFunction { identity: String, name: String },

    /// JSON decoding failure.
    #[error("module json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bincode decoding or encoding failure.
    #[error("module encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while writing or reading saved state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The save was produced by a different module.
    #[error("save state belongs to a different module (digest mismatch)")]
    ModuleMismatch,

    /// The save names an element the loaded module does not have.
    #[error("save state references missing element '{0}'")]
    MissingElement(String),

    /// An element in the save has the wrong kind for where it appears.
    #[error("save state places element '{identity}' where a {expected} is required")]
    WrongKind {
        identity: String,
        expected: &'static str,
    },

    /// A back-reference to a value id that was never defined.
    #[error("save state references undefined value #{0}")]
    UndefinedReference(u64),

    /// A value id was defined twice.
    #[error("save state redefines value #{0}")]
    DuplicateReference(u64),

    /// Structurally valid bytes describing an impossible state.
    #[error("invalid save state: {0}")]
    Invalid(String),

    /// Unknown value tag byte.
    #[error("save state contains unknown value tag {0}")]
    UnknownTag(u8),

    /// Bytes remained after the state was fully read.
    #[error("save state has {0} trailing bytes")]
    TrailingBytes(usize),

    /// String payload was not UTF-8.
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Save slot was not found in the store.
    #[error("save slot not found: {0}")]
    NotFound(String),

    /// Stored checksum does not match the blob on disk.
    #[error("checksum mismatch for save slot {0}")]
    Checksum(String),

    /// Metadata sidecar could not be decoded.
    #[error("save metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Wrapper around IO errors (including truncated input).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal faults that abort a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The module is inconsistent with what an operation needs.
    #[error("module consistency: {0}")]
    Module(String),

    /// Popped from an empty value stack.
    #[error("value stack underflow")]
    StackUnderflow,

    /// Value stack exceeded its configured depth.
    #[error("value stack overflow (limit {0})")]
    StackOverflow(usize),

    /// An operation received a value of the wrong type.
    #[error("{operation}: expected {expected}, found {found}")]
    UnexpectedValue {
        operation: &'static str,
        expected: &'static str,
        found: String,
    },

    /// Too many operations executed in one request.
    #[error("runaway request: more than {0} operations executed")]
    RunawayOperations(u64),

    /// Call depth exceeded.
    #[error("runaway request: call depth exceeded {0}")]
    RunawayDepth(usize),

    /// The list heap has no free slot left.
    #[error("list heap exhausted ({0} lists)")]
    HeapExhausted(usize),

    /// An interrupt escaped the construct that should have consumed it.
    #[error("{0} interrupt escaped its enclosing construct")]
    StrayInterrupt(&'static str),

    /// The runtime state itself is inconsistent.
    #[error("state error: {0}")]
    State(String),
}

/// Aggregate error for callers that cross module, state and engine layers.
#[derive(Debug, Error)]
pub enum TameError {
    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
