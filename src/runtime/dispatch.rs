//! Routing commands and queued actions to entry blocks.

use std::sync::Arc;

use log::debug;

use crate::errors::EngineError;
use crate::module::{ElementId, ElementKind, TriggerKey};
use crate::value::Value;

use super::exec::Engine;
use super::flow::Flow;
use super::parser::{self, Interpretation};
use super::request::{ActionTarget, QueuedAction};

/// Local bound to the remainder of an open action's input.
pub const OPEN_TEXT_LOCAL: &str = "text";

impl Engine<'_> {
    /// Run the block bound to `trigger` on `element` or its nearest
    /// ancestor. `None` when no block is bound; `Finish` is consumed here.
    pub(crate) fn pass(
        &mut self,
        element: ElementId,
        trigger: &TriggerKey,
        locals: Vec<(String, Value)>,
    ) -> Result<Option<Flow>, EngineError> {
        let module = Arc::clone(&self.module);
        let Some((owner, block)) = module.resolve_block(element, trigger)? else {
            return Ok(None);
        };
        self.trace(|| {
            format!(
                "{} on {} (from {})",
                trigger,
                module.identity(element),
                module.identity(owner)
            )
        });
        let flow = self.run_entry(element, block, locals)?;
        Ok(Some(match flow {
            Flow::Finish => Flow::Next,
            other => other,
        }))
    }

    /// Try `trigger` on each element in order; the first bound block runs.
    fn first_of(
        &mut self,
        elements: &[ElementId],
        trigger: &TriggerKey,
        locals: &[(String, Value)],
    ) -> Result<Option<Flow>, EngineError> {
        for &element in elements {
            if let Some(flow) = self.pass(element, trigger, locals.to_vec())? {
                return Ok(Some(flow));
            }
        }
        Ok(None)
    }

    /// Current room, current player and world, skipping what is unset.
    fn action_scope(&self) -> Vec<ElementId> {
        let ownership = self.ctx.ownership();
        ownership
            .current_room()
            .into_iter()
            .chain(ownership.current_player())
            .chain(Some(self.module.world()))
            .collect()
    }

    /// Current player then world.
    fn fallback_scope(&self) -> Vec<ElementId> {
        self.ctx
            .ownership()
            .current_player()
            .into_iter()
            .chain(Some(self.module.world()))
            .collect()
    }

    /// Run an action against its target. The flag is false when no handler
    /// was bound and the unhandled chain ran instead.
    pub(crate) fn dispatch_action(&mut self, queued: QueuedAction) -> Result<(Flow, bool), EngineError> {
        let action = self.identity(queued.action);
        debug!("dispatching action '{}'", action);
        let handled = match queued.target {
            ActionTarget::None => {
                let scope = self.action_scope();
                self.first_of(&scope, &TriggerKey::OnAction(action.clone()), &[])?
            }
            ActionTarget::Open(text) => {
                let scope = self.action_scope();
                let locals = [(OPEN_TEXT_LOCAL.to_string(), Value::String(text))];
                self.first_of(&scope, &TriggerKey::OnAction(action.clone()), &locals)?
            }
            ActionTarget::Modal(mode) => {
                let scope = self.action_scope();
                let trigger = TriggerKey::OnModalAction {
                    action: action.clone(),
                    mode,
                };
                self.first_of(&scope, &trigger, &[])?
            }
            ActionTarget::Object(object) => {
                self.pass(object, &TriggerKey::OnAction(action.clone()), Vec::new())?
            }
            ActionTarget::Objects(first, second) => self.dispatch_pair(&action, first, second)?,
        };
        match handled {
            Some(flow) => Ok((flow, true)),
            None => Ok((self.unhandled(&action)?, false)),
        }
    }

    fn dispatch_pair(
        &mut self,
        action: &str,
        first: ElementId,
        second: ElementId,
    ) -> Result<Option<Flow>, EngineError> {
        let with = TriggerKey::OnActionWith {
            action: action.to_string(),
            object: self.identity(second),
        };
        if let Some(flow) = self.pass(first, &with, Vec::new())? {
            return Ok(Some(flow));
        }
        for ancestor in self.module.ancestors(second)? {
            let trigger = TriggerKey::OnActionWithAncestor {
                action: action.to_string(),
                object: self.identity(ancestor),
            };
            if let Some(flow) = self.pass(first, &trigger, Vec::new())? {
                return Ok(Some(flow));
            }
        }
        self.pass(first, &TriggerKey::OnActionWithOther(action.to_string()), Vec::new())
    }

    fn unhandled(&mut self, action: &str) -> Result<Flow, EngineError> {
        let specific = TriggerKey::OnUnhandledAction(Some(action.to_string()));
        let general = TriggerKey::OnUnhandledAction(None);
        for element in self.fallback_scope() {
            for trigger in [&specific, &general] {
                if let Some(flow) = self.pass(element, trigger, Vec::new())? {
                    return Ok(flow);
                }
            }
        }
        self.script_error(format!("Nothing handled the action '{}'.", action));
        Ok(Flow::Next)
    }

    /// Fallback chain for input that selected no runnable action.
    fn bad_command(
        &mut self,
        make: fn(Option<String>) -> TriggerKey,
        action: Option<String>,
        message: String,
    ) -> Result<Flow, EngineError> {
        let mut triggers = Vec::with_capacity(2);
        if action.is_some() {
            triggers.push(make(action));
        }
        triggers.push(make(None));
        for element in self.fallback_scope() {
            for trigger in &triggers {
                if let Some(flow) = self.pass(element, trigger, Vec::new())? {
                    return Ok(flow);
                }
            }
        }
        self.script_error(message);
        Ok(Flow::Next)
    }

    fn dispatch_interpretation(&mut self, interpretation: Interpretation) -> Result<(Flow, bool), EngineError> {
        let target = match interpretation {
            Interpretation::Unknown => {
                let flow = self.bad_command(
                    |_| TriggerKey::OnUnknownCommand,
                    None,
                    "I don't understand that.".to_string(),
                )?;
                return Ok((flow, false));
            }
            Interpretation::Malformed(a) => {
                let identity = self.identity(a);
                let message = format!("That doesn't make sense with '{}'.", identity);
                let flow = self.bad_command(TriggerKey::OnMalformedCommand, Some(identity), message)?;
                return Ok((flow, false));
            }
            Interpretation::Incomplete(a) => {
                let identity = self.identity(a);
                let message = format!("'{}' needs more than that.", identity);
                let flow = self.bad_command(TriggerKey::OnIncompleteCommand, Some(identity), message)?;
                return Ok((flow, false));
            }
            Interpretation::Ambiguous(a) => {
                let identity = self.identity(a);
                let message = format!("Which one do you mean for '{}'?", identity);
                let flow = self.bad_command(TriggerKey::OnAmbiguousCommand, Some(identity), message)?;
                return Ok((flow, false));
            }
            Interpretation::General(a) => QueuedAction {
                action: a,
                target: ActionTarget::None,
            },
            Interpretation::Open(a, text) => QueuedAction {
                action: a,
                target: ActionTarget::Open(text),
            },
            Interpretation::Modal(a, mode) => QueuedAction {
                action: a,
                target: ActionTarget::Modal(mode),
            },
            Interpretation::Transitive(a, o) => QueuedAction {
                action: a,
                target: ActionTarget::Object(o),
            },
            Interpretation::Ditransitive(a, o1, o2) => QueuedAction {
                action: a,
                target: ActionTarget::Objects(o1, o2),
            },
        };
        self.dispatch_action(target)
    }

    /// Dispatch queued actions first in, first out.
    pub(crate) fn drain_queue(&mut self) -> Result<Flow, EngineError> {
        while let Some(queued) = self.request.dequeue() {
            let (flow, _) = self.dispatch_action(queued)?;
            if flow == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Next)
    }

    fn after_hooks(&mut self, success: bool) -> Result<Flow, EngineError> {
        let outcome = if success {
            TriggerKey::AfterSuccessfulCommand
        } else {
            TriggerKey::AfterFailedCommand
        };
        for trigger in [outcome, TriggerKey::AfterEveryCommand] {
            let mut scope = vec![self.module.world()];
            scope.extend(self.ctx.ownership().current_player());
            for element in scope {
                if self.pass(element, &trigger, Vec::new())? == Some(Flow::Quit) {
                    return Ok(Flow::Quit);
                }
            }
        }
        Ok(Flow::Next)
    }

    /// Start a new game: object, container, room and player init blocks in
    /// module order, then the world's init and start blocks, then the queue.
    pub(crate) fn run_init(&mut self) -> Result<Flow, EngineError> {
        let module = Arc::clone(&self.module);
        let kinds = [
            ElementKind::Object,
            ElementKind::Container,
            ElementKind::Room,
            ElementKind::Player,
        ];
        for kind in kinds {
            for element in module.elements_of_kind(kind).filter(|e| !e.is_archetype()) {
                if self.pass(element.id(), &TriggerKey::Init, Vec::new())? == Some(Flow::Quit) {
                    return Ok(Flow::Quit);
                }
            }
        }
        for trigger in [TriggerKey::Init, TriggerKey::Start] {
            if self.pass(module.world(), &trigger, Vec::new())? == Some(Flow::Quit) {
                return Ok(Flow::Quit);
            }
        }
        self.drain_queue()
    }

    /// Interpret and run one line of player input.
    pub(crate) fn run_command(&mut self, text: &str) -> Result<Flow, EngineError> {
        self.trace(|| format!("command: {}", text));
        let interpretation = parser::interpret(&self.module, self.ctx.ownership(), text);
        debug!("interpreted '{}' as {:?}", text, interpretation);
        let (flow, success) = self.dispatch_interpretation(interpretation)?;
        if flow == Flow::Quit {
            return Ok(Flow::Quit);
        }
        if self.drain_queue()? == Flow::Quit {
            return Ok(Flow::Quit);
        }
        self.after_hooks(success)
    }
}
