use std::fmt;

use serde::{Deserialize, Serialize};

use super::element::ElementKind;

/// Key under which an element binds an entry block.
///
/// Element references inside a key are identity strings so the key can be
/// written by the compiler and looked up at runtime without a separate
/// resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKey {
    Init,
    Start,
    AfterSuccessfulCommand,
    AfterFailedCommand,
    AfterEveryCommand,
    OnAction(String),
    OnModalAction { action: String, mode: String },
    OnActionWith { action: String, object: String },
    OnActionWithAncestor { action: String, object: String },
    OnActionWithOther(String),
    OnUnhandledAction(Option<String>),
    OnUnknownCommand,
    OnAmbiguousCommand(Option<String>),
    OnIncompleteCommand(Option<String>),
    OnMalformedCommand(Option<String>),
    OnRoomBrowse,
    OnPlayerBrowse,
    OnContainerBrowse,
    OnWorldBrowse,
    OnElementBrowse(String),
}

impl TriggerKey {
    /// Whether an element of `kind` may bind a block under this key.
    pub fn is_legal_for(&self, kind: ElementKind) -> bool {
        use ElementKind::*;
        match self {
            TriggerKey::Init => kind != Action,
            TriggerKey::Start => kind == World,
            TriggerKey::AfterSuccessfulCommand
            | TriggerKey::AfterFailedCommand
            | TriggerKey::AfterEveryCommand
            | TriggerKey::OnUnhandledAction(_)
            | TriggerKey::OnUnknownCommand
            | TriggerKey::OnAmbiguousCommand(_)
            | TriggerKey::OnIncompleteCommand(_)
            | TriggerKey::OnMalformedCommand(_) => matches!(kind, World | Player),
            TriggerKey::OnAction(_) => matches!(kind, World | Player | Room | Object),
            TriggerKey::OnModalAction { .. } => matches!(kind, World | Player | Room),
            TriggerKey::OnActionWith { .. }
            | TriggerKey::OnActionWithAncestor { .. }
            | TriggerKey::OnActionWithOther(_)
            | TriggerKey::OnRoomBrowse
            | TriggerKey::OnPlayerBrowse
            | TriggerKey::OnContainerBrowse
            | TriggerKey::OnWorldBrowse
            | TriggerKey::OnElementBrowse(_) => kind == Object,
        }
    }

    /// Action identity referenced by this key, if any.
    pub fn action(&self) -> Option<&str> {
        match self {
            TriggerKey::OnAction(a)
            | TriggerKey::OnActionWithOther(a)
            | TriggerKey::OnModalAction { action: a, .. }
            | TriggerKey::OnActionWith { action: a, .. }
            | TriggerKey::OnActionWithAncestor { action: a, .. } => Some(a.as_str()),
            TriggerKey::OnUnhandledAction(a)
            | TriggerKey::OnAmbiguousCommand(a)
            | TriggerKey::OnIncompleteCommand(a)
            | TriggerKey::OnMalformedCommand(a) => a.as_deref(),
            _ => None,
        }
    }

    /// Object identity referenced by this key, if any.
    pub fn object(&self) -> Option<&str> {
        match self {
            TriggerKey::OnActionWith { object, .. }
            | TriggerKey::OnActionWithAncestor { object, .. } => Some(object.as_str()),
            _ => None,
        }
    }

    /// Browse trigger used for objects owned by an element of `owner_kind`.
    pub fn browse_for(owner_kind: ElementKind) -> Option<TriggerKey> {
        match owner_kind {
            ElementKind::World => Some(TriggerKey::OnWorldBrowse),
            ElementKind::Player => Some(TriggerKey::OnPlayerBrowse),
            ElementKind::Room => Some(TriggerKey::OnRoomBrowse),
            ElementKind::Container => Some(TriggerKey::OnContainerBrowse),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt(a: &Option<String>) -> &str {
            a.as_deref().unwrap_or("*")
        }
        match self {
            TriggerKey::Init => write!(f, "init()"),
            TriggerKey::Start => write!(f, "start()"),
            TriggerKey::AfterSuccessfulCommand => write!(f, "afterSuccessfulCommand()"),
            TriggerKey::AfterFailedCommand => write!(f, "afterFailedCommand()"),
            TriggerKey::AfterEveryCommand => write!(f, "afterEveryCommand()"),
            TriggerKey::OnAction(a) => write!(f, "onAction({})", a),
            TriggerKey::OnModalAction { action, mode } => {
                write!(f, "onModalAction({}, \"{}\")", action, mode)
            }
            TriggerKey::OnActionWith { action, object } => {
                write!(f, "onActionWith({}, {})", action, object)
            }
            TriggerKey::OnActionWithAncestor { action, object } => {
                write!(f, "onActionWithAncestor({}, {})", action, object)
            }
            TriggerKey::OnActionWithOther(a) => write!(f, "onActionWithOther({})", a),
            TriggerKey::OnUnhandledAction(a) => write!(f, "onUnhandledAction({})", opt(a)),
            TriggerKey::OnUnknownCommand => write!(f, "onUnknownCommand()"),
            TriggerKey::OnAmbiguousCommand(a) => write!(f, "onAmbiguousCommand({})", opt(a)),
            TriggerKey::OnIncompleteCommand(a) => write!(f, "onIncompleteCommand({})", opt(a)),
            TriggerKey::OnMalformedCommand(a) => write!(f, "onMalformedCommand({})", opt(a)),
            TriggerKey::OnRoomBrowse => write!(f, "onRoomBrowse()"),
            TriggerKey::OnPlayerBrowse => write!(f, "onPlayerBrowse()"),
            TriggerKey::OnContainerBrowse => write!(f, "onContainerBrowse()"),
            TriggerKey::OnWorldBrowse => write!(f, "onWorldBrowse()"),
            TriggerKey::OnElementBrowse(e) => write!(f, "onElementBrowse({})", e),
        }
    }
}
