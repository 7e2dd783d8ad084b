//! Block interpreter.
//!
//! [`Engine`] runs operation blocks for one request against a borrowed
//! [`ModuleContext`]. Blocks, loops, calls and browses live on an explicit
//! task stack and hand a [`Flow`] to their parent when they finish; fatal
//! faults are `Err(EngineError)` and unwind straight to the request
//! boundary, where they become a single FATAL cue.

use std::sync::Arc;

use log::{error, info, warn};

use crate::context::ModuleContext;
use crate::errors::EngineError;
use crate::logutil::{escape_log, preview};
use crate::module::{Block, ElementId, ElementKind, Literal, Module, Operation, TriggerKey};
use crate::value::{ListId, Value};

use super::cue::{CueKind, Response};
use super::flow::Flow;
use super::request::{ActionTarget, Frame, QueuedAction, Request};

pub(crate) struct Engine<'c> {
    pub(crate) ctx: &'c mut ModuleContext,
    pub(crate) module: Arc<Module>,
    pub(crate) request: Request,
    pub(crate) response: Response,
    tracing: bool,
}

/// Pending work on the interpreter's task stack.
enum Task<'m> {
    Block {
        ops: &'m [Operation],
        pc: usize,
    },
    /// An `if` waiting on its condition.
    Branch {
        success: &'m Block,
        failure: &'m Block,
    },
    /// A `while` or `for`; `stage` names the part that is running.
    Loop {
        condition: &'m Block,
        body: &'m Block,
        step: Option<&'m Block>,
        stage: Stage,
    },
    /// Boundary of an entry block or function call. Owns the top frame.
    Invocation(Invocation),
    Browse {
        entries: std::vec::IntoIter<(ElementId, &'m Block)>,
    },
}

impl<'m> Task<'m> {
    fn block(block: &'m Block) -> Self {
        Task::Block {
            ops: block.operations(),
            pc: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    Condition,
    Body,
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Invocation {
    Entry,
    Function,
}

/// What the driver does after one step.
enum Outcome<'m> {
    Continue,
    Push(Task<'m>),
    /// Push a control task and start its first block.
    Enter(Task<'m>, &'m Block),
    /// Replace the top task with a block.
    Become(&'m Block),
    /// The top task finished with this flow.
    Done(Flow),
}

fn can_own(kind: ElementKind) -> bool {
    kind.can_own_objects()
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

fn is_action(kind: ElementKind) -> bool {
    kind == ElementKind::Action
}

fn with_context(kind: ElementKind) -> bool {
    kind.has_context()
}

impl<'c> Engine<'c> {
    pub(crate) fn new(ctx: &'c mut ModuleContext) -> Self {
        let module = Arc::clone(ctx.module());
        let request = Request::new(ctx.config());
        let tracing = ctx.config().trace;
        Self {
            ctx,
            module,
            request,
            response: Response::new(),
            tracing,
        }
    }

    /// Turn the outcome of a request into its response.
    pub(crate) fn finish(mut self, result: Result<Flow, EngineError>) -> Response {
        match result {
            Ok(Flow::Quit) => {
                info!("request ended with quit");
                self.response.add_cue(CueKind::Quit, "");
            }
            Ok(_) => {}
            Err(e) => {
                error!("fatal engine fault: {}", e);
                self.response.add_cue(CueKind::Fatal, e.to_string());
            }
        }
        let freed = self.ctx.collect_garbage(None::<&Value>);
        if freed > 0 {
            log::debug!("collected {} unreachable lists", freed);
        }
        let elapsed = self.request.started().elapsed();
        self.response.set_metrics(self.request.operations(), elapsed);
        self.response
    }

    pub(crate) fn trace(&mut self, message: impl FnOnce() -> String) {
        if self.tracing {
            let text = message();
            log::trace!("{}", escape_log(&text));
            self.response.add_cue(CueKind::Trace, text);
        }
    }

    /// Report a recoverable script fault and carry on.
    pub(crate) fn script_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("script error: {}", escape_log(&message));
        self.response.add_cue(CueKind::Error, message);
    }

    pub(crate) fn identity(&self, id: ElementId) -> String {
        self.module.identity(id).to_string()
    }

    // ---- invocation --------------------------------------------------------

    /// Run an entry block with `this` bound to `element`. `End` stops here;
    /// loop interrupts may not escape.
    pub(crate) fn run_entry(
        &mut self,
        element: ElementId,
        block: &Block,
        locals: Vec<(String, Value)>,
    ) -> Result<Flow, EngineError> {
        let mut frame = Frame::new(element);
        frame.locals.extend(locals);
        self.request.push_frame(frame)?;
        let module = Arc::clone(&self.module);
        self.drive(&module, vec![Task::Invocation(Invocation::Entry), Task::block(block)])
    }

    /// Run tasks until the stack empties. Nested blocks, loops, calls and
    /// browses are pushed as tasks, so script nesting never grows the native
    /// stack; `max_call_depth` is the only bound on recursion.
    fn drive<'m>(&mut self, module: &'m Module, mut tasks: Vec<Task<'m>>) -> Result<Flow, EngineError> {
        let mut finished: Option<Flow> = None;
        loop {
            let outcome = match (tasks.last_mut(), finished.take()) {
                (None, flow) => return Ok(flow.unwrap_or(Flow::Next)),
                (Some(task), Some(flow)) => self.resume(task, flow)?,
                (Some(task), None) => self.advance(module, task)?,
            };
            match outcome {
                Outcome::Continue => {}
                Outcome::Push(task) => tasks.push(task),
                Outcome::Enter(owner, block) => {
                    tasks.push(owner);
                    tasks.push(Task::block(block));
                }
                Outcome::Become(block) => {
                    tasks.pop();
                    tasks.push(Task::block(block));
                }
                Outcome::Done(flow) => {
                    tasks.pop();
                    finished = Some(flow);
                }
            }
        }
    }

    /// Give the top task its next piece of work.
    fn advance<'m>(&mut self, module: &'m Module, task: &mut Task<'m>) -> Result<Outcome<'m>, EngineError> {
        match task {
            Task::Block { ops, pc } => {
                let ops: &'m [Operation] = *ops;
                let Some(op) = ops.get(*pc) else {
                    return Ok(Outcome::Done(Flow::Next));
                };
                *pc += 1;
                self.execute(module, op)
            }
            Task::Browse { entries } => match entries.next() {
                Some((object, block)) => {
                    self.request.push_frame(Frame::new(object))?;
                    Ok(Outcome::Enter(Task::Invocation(Invocation::Entry), block))
                }
                None => Ok(Outcome::Done(Flow::Next)),
            },
            Task::Branch { .. } | Task::Loop { .. } | Task::Invocation(_) => {
                Err(EngineError::State("control task resumed without a result".into()))
            }
        }
    }

    /// Hand the flow a finished child produced to its parent task.
    fn resume<'m>(&mut self, task: &mut Task<'m>, flow: Flow) -> Result<Outcome<'m>, EngineError> {
        match task {
            Task::Block { .. } | Task::Browse { .. } => Ok(if flow.is_next() {
                Outcome::Continue
            } else {
                Outcome::Done(flow)
            }),
            Task::Branch { success, failure } => {
                if !flow.is_next() {
                    return Ok(Outcome::Done(flow));
                }
                let (success, failure) = (*success, *failure);
                Ok(Outcome::Become(if self.truth()? { success } else { failure }))
            }
            Task::Loop {
                condition,
                body,
                step,
                stage,
            } => {
                let (condition, body) = (*condition, *body);
                let next = match (*stage, flow) {
                    (Stage::Body, Flow::Break) => return Ok(Outcome::Done(Flow::Next)),
                    (Stage::Body, Flow::Next | Flow::Continue) => match *step {
                        Some(step) => (Stage::Step, step),
                        None => (Stage::Condition, condition),
                    },
                    (_, flow) if !flow.is_next() => return Ok(Outcome::Done(flow)),
                    (Stage::Condition, _) => {
                        if !self.truth()? {
                            return Ok(Outcome::Done(Flow::Next));
                        }
                        (Stage::Body, body)
                    }
                    (Stage::Init | Stage::Step | Stage::Body, _) => (Stage::Condition, condition),
                };
                *stage = next.0;
                Ok(Outcome::Push(Task::block(next.1)))
            }
            Task::Invocation(kind) => {
                let kind = *kind;
                let frame = self.request.pop_frame();
                match flow {
                    Flow::Next | Flow::End => {
                        if kind == Invocation::Function {
                            let result = frame
                                .and_then(|f| f.result)
                                .unwrap_or(Value::Boolean(false));
                            self.request.push(result)?;
                        }
                        Ok(Outcome::Done(Flow::Next))
                    }
                    stray @ (Flow::Break | Flow::Continue) => Err(EngineError::StrayInterrupt(stray.name())),
                    other => Ok(Outcome::Done(other)),
                }
            }
        }
    }

    fn call_function<'m>(
        &mut self,
        module: &'m Module,
        this: ElementId,
        name: &str,
    ) -> Result<Outcome<'m>, EngineError> {
        let function = module.resolve_function(this, name)?.ok_or_else(|| {
            EngineError::Module(format!(
                "no function '{}' on element '{}'",
                name,
                module.identity(this)
            ))
        })?;

        let mut args = Vec::with_capacity(function.arguments.len());
        for _ in 0..function.arguments.len() {
            args.push(self.request.pop()?);
        }
        args.reverse();
        let mut frame = Frame::new(this);
        for (param, value) in function.arguments.iter().zip(args) {
            frame.locals.insert(param.clone(), value);
        }

        self.trace(|| format!("call {}.{}()", module.identity(this), name));
        self.request.push_frame(frame)?;
        Ok(Outcome::Enter(Task::Invocation(Invocation::Function), &function.block))
    }

    /// Pop a condition result.
    fn truth(&mut self) -> Result<bool, EngineError> {
        let value = self.request.pop()?;
        Ok(value.is_truthy(self.ctx.heap()))
    }

    // ---- operand helpers -----------------------------------------------------

    fn push(&mut self, value: impl Into<Value>) -> Result<(), EngineError> {
        self.request.push(value.into())
    }

    pub(crate) fn pop(&mut self) -> Result<Value, EngineError> {
        self.request.pop()
    }

    pub(crate) fn unexpected(&self, operation: &'static str, expected: &'static str, found: &Value) -> EngineError {
        let text = preview(&self.ctx.format(found), 40);
        EngineError::UnexpectedValue {
            operation,
            expected,
            found: format!("{} {}", found.kind_name(), text),
        }
    }

    /// Printable form of the popped value.
    pub(crate) fn pop_text(&mut self) -> Result<String, EngineError> {
        let value = self.pop()?;
        Ok(self.ctx.format(&value))
    }

    pub(crate) fn pop_list(&mut self, operation: &'static str) -> Result<ListId, EngineError> {
        let value = self.pop()?;
        value
            .as_list()
            .ok_or_else(|| self.unexpected(operation, "list", &value))
    }

    fn pop_element(&mut self, operation: &'static str) -> Result<ElementId, EngineError> {
        let value = self.pop()?;
        value
            .as_element()
            .ok_or_else(|| self.unexpected(operation, "element", &value))
    }

    /// Pop an element instance whose kind passes `accept`.
    fn pop_instance(
        &mut self,
        operation: &'static str,
        accept: fn(ElementKind) -> bool,
        expected: &'static str,
    ) -> Result<ElementId, EngineError> {
        let id = self.pop_element(operation)?;
        let element = self.module.element(id);
        if !accept(element.kind()) || element.is_archetype() {
            return Err(EngineError::UnexpectedValue {
                operation,
                expected,
                found: format!("{} '{}'", element.kind(), element.identity()),
            });
        }
        Ok(id)
    }

    fn this(&self) -> Result<ElementId, EngineError> {
        Ok(self.request.frame()?.this)
    }

    fn emit(&mut self, kind: CueKind, suffix: &str) -> Result<(), EngineError> {
        let mut text = self.pop_text()?;
        text.push_str(suffix);
        self.response.add_cue(kind, text);
        Ok(())
    }

    fn current_player_or_error(&mut self, operation: &str) -> Option<ElementId> {
        let player = self.ctx.ownership().current_player();
        if player.is_none() {
            self.script_error(format!("{}: there is no current player", operation));
        }
        player
    }

    fn element_or_false(id: Option<ElementId>) -> Value {
        id.map(Value::Element).unwrap_or(Value::Boolean(false))
    }

    fn queue(&mut self, action: ElementId, target: ActionTarget) {
        let identity = self.identity(action);
        self.trace(|| format!("queue {}", identity));
        self.request.enqueue(QueuedAction { action, target });
    }

    // ---- the instruction set ---------------------------------------------------

    fn execute<'m>(&mut self, module: &'m Module, op: &'m Operation) -> Result<Outcome<'m>, EngineError> {
        self.request.tick()?;
        let name = op.name();
        match op {
            Operation::Noop => {}

            Operation::Push(literal) => {
                let value = match literal {
                    Literal::Boolean(b) => Value::Boolean(*b),
                    Literal::Integer(i) => Value::Integer(*i),
                    Literal::Float(f) => Value::Float(*f),
                    Literal::String(s) => Value::String(s.clone()),
                    Literal::Element(identity) => {
                        let id = self.module.find(identity).ok_or_else(|| {
                            EngineError::Module(format!("unknown element '{}'", identity))
                        })?;
                        Value::Element(id)
                    }
                };
                self.push(value)?;
            }
            Operation::PushList => {
                let list = Value::new_list(self.ctx.heap_mut())?;
                self.push(list)?;
            }
            Operation::PushThis => {
                let this = self.this()?;
                self.push(Value::Element(this))?;
            }
            Operation::PushCurrentPlayer => {
                let player = self.ctx.ownership().current_player();
                self.push(Self::element_or_false(player))?;
            }
            Operation::PushCurrentRoom => {
                let room = self.ctx.ownership().current_room();
                self.push(Self::element_or_false(room))?;
            }
            Operation::Pop => {
                self.pop()?;
            }
            Operation::Dup => {
                let top = self.request.peek()?.clone();
                self.push(top)?;
            }
            Operation::Load(var) => {
                let frame = self.request.frame()?;
                let value = match frame.locals.get(var) {
                    Some(value) => value.clone(),
                    None => self.ctx.variable(frame.this, var)?,
                };
                self.push(value)?;
            }
            Operation::Store(var) => {
                let value = self.pop()?;
                let frame = self.request.frame_mut()?;
                if let Some(slot) = frame.locals.get_mut(var) {
                    *slot = value;
                } else {
                    let this = frame.this;
                    self.ctx.set_variable(this, var, value)?;
                }
            }
            Operation::Local(var) => {
                let value = self.pop()?;
                self.request.frame_mut()?.locals.insert(var.clone(), value);
            }
            Operation::LoadFrom(var) => {
                let element = self.pop_instance(name, with_context, "element with variables")?;
                let value = self.ctx.variable(element, var)?;
                self.push(value)?;
            }
            Operation::StoreTo(var) => {
                let value = self.pop()?;
                let element = self.pop_instance(name, with_context, "element with variables")?;
                self.ctx.set_variable(element, var, value)?;
            }
            Operation::Arithmetic(op) => {
                let result = if op.is_unary() {
                    let a = self.pop()?;
                    Value::unary(*op, &a, self.ctx.heap(), &self.module)
                } else {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    Value::binary(*op, &a, &b, self.ctx.heap(), &self.module)
                };
                self.push(result)?;
            }

            Operation::If {
                condition,
                success,
                failure,
            } => return Ok(Outcome::Enter(Task::Branch { success, failure }, condition)),
            Operation::While { condition, body } => {
                let task = Task::Loop {
                    condition,
                    body,
                    step: None,
                    stage: Stage::Condition,
                };
                return Ok(Outcome::Enter(task, condition));
            }
            Operation::For {
                init,
                condition,
                step,
                body,
            } => {
                let task = Task::Loop {
                    condition,
                    body,
                    step: Some(step),
                    stage: Stage::Init,
                };
                return Ok(Outcome::Enter(task, init));
            }
            Operation::Break => return Ok(Outcome::Done(Flow::Break)),
            Operation::Continue => return Ok(Outcome::Done(Flow::Continue)),
            Operation::End => return Ok(Outcome::Done(Flow::End)),
            Operation::Finish => return Ok(Outcome::Done(Flow::Finish)),
            Operation::Quit => return Ok(Outcome::Done(Flow::Quit)),
            Operation::Call(function) => {
                let this = self.this()?;
                return self.call_function(module, this, function);
            }
            Operation::CallOn(function) => {
                let target = self.pop_element(name)?;
                return self.call_function(module, target, function);
            }
            Operation::Return => {
                let value = self.pop()?;
                self.request.frame_mut()?.result = Some(value);
                return Ok(Outcome::Done(Flow::End));
            }

            Operation::Text => self.emit(CueKind::Text, "")?,
            Operation::TextLn => self.emit(CueKind::Text, "\n")?,
            Operation::TextF => self.emit(CueKind::TextF, "")?,
            Operation::TextFLn => self.emit(CueKind::TextF, "\n")?,
            Operation::Pause => self.response.add_cue(CueKind::Pause, ""),
            Operation::Wait => {
                let millis = self.pop()?.as_integer().max(0);
                self.response.add_cue(CueKind::Wait, millis.to_string());
            }
            Operation::Tip => self.emit(CueKind::Tip, "")?,
            Operation::Info => self.emit(CueKind::Info, "")?,
            Operation::Trace => {
                let text = self.pop_text()?;
                self.trace(|| text);
            }
            Operation::Error => {
                let text = self.pop_text()?;
                self.script_error(text);
            }

            Operation::GiveObject => {
                let object = self.pop_instance(name, is_object, "object")?;
                let owner = self.pop_instance(name, can_own, "container-capable element")?;
                self.ctx.ownership_mut().add_object_to_element(object, owner);
            }
            Operation::RemoveObject => {
                let object = self.pop_instance(name, is_object, "object")?;
                self.ctx.ownership_mut().remove_object(object);
            }
            Operation::MoveObjects => {
                let to = self.pop_instance(name, can_own, "container-capable element")?;
                let from = self.pop_instance(name, can_own, "container-capable element")?;
                self.ctx.ownership_mut().move_objects(from, to);
            }
            Operation::HasObject => {
                let object = self.pop_instance(name, is_object, "object")?;
                let owner = self.pop_instance(name, can_own, "container-capable element")?;
                let has = self.ctx.ownership().element_has_object(owner, object);
                self.push(has)?;
            }
            Operation::ObjectHasNoOwner => {
                let object = self.pop_instance(name, is_object, "object")?;
                let free = self.ctx.ownership().object_has_no_owner(object);
                self.push(free)?;
            }
            Operation::ObjectCount => {
                let owner = self.pop_instance(name, can_own, "container-capable element")?;
                let count = self.ctx.ownership().object_count(owner) as i64;
                self.push(count)?;
            }
            Operation::ObjectsOf => {
                let owner = self.pop_instance(name, can_own, "container-capable element")?;
                let items = self
                    .ctx
                    .ownership()
                    .objects_owned_by(owner)
                    .into_iter()
                    .map(Value::Element)
                    .collect();
                let list = self.ctx.heap_mut().list_from(items)?;
                self.push(Value::List(list))?;
            }
            Operation::OwnerOf => {
                let object = self.pop_instance(name, is_object, "object")?;
                let owner = self.ctx.ownership().owner_of(object);
                self.push(Self::element_or_false(owner))?;
            }
            Operation::SetPlayer => {
                let player = self.pop_instance(name, is_player, "player")?;
                self.ctx.ownership_mut().set_current_player(Some(player));
            }
            Operation::ClearPlayer => self.ctx.ownership_mut().set_current_player(None),
            Operation::SetRoom => {
                let room = self.pop_instance(name, is_room, "room")?;
                if let Some(player) = self.current_player_or_error(name) {
                    self.ctx.ownership_mut().add_player_to_room(player, room);
                }
            }
            Operation::PushRoom => {
                let room = self.pop_instance(name, is_room, "room")?;
                if let Some(player) = self.current_player_or_error(name) {
                    self.ctx.ownership_mut().push_room_onto_player(player, room);
                }
            }
            Operation::PopRoom => {
                if let Some(player) = self.current_player_or_error(name) {
                    if self.ctx.ownership_mut().pop_room_from_player(player).is_none() {
                        let who = self.identity(player);
                        self.script_error(format!("popRoom: '{}' is not in any room", who));
                    }
                }
            }
            Operation::SwapRoom => {
                let room = self.pop_instance(name, is_room, "room")?;
                if let Some(player) = self.current_player_or_error(name) {
                    self.ctx.ownership_mut().swap_room_on_player(player, room);
                }
            }
            Operation::CurrentPlayerIs => {
                let player = self.pop_instance(name, is_player, "player")?;
                let is = self.ctx.ownership().current_player() == Some(player);
                self.push(is)?;
            }
            Operation::NoCurrentPlayer => {
                let none = self.ctx.ownership().current_player().is_none();
                self.push(none)?;
            }
            Operation::CurrentRoomIs => {
                let room = self.pop_instance(name, is_room, "room")?;
                let is = self.ctx.ownership().current_room() == Some(room);
                self.push(is)?;
            }
            Operation::NoCurrentRoom => {
                let none = self.ctx.ownership().current_room().is_none();
                self.push(none)?;
            }
            Operation::PlayerIsInRoom => {
                let room = self.pop_instance(name, is_room, "room")?;
                let player = self.pop_instance(name, is_player, "player")?;
                let inside = self.ctx.ownership().player_is_in_room(player, room);
                self.push(inside)?;
            }
            Operation::AddObjectName => {
                let text = self.pop_text()?;
                let object = self.pop_instance(name, is_object, "object")?;
                self.ctx.add_object_name(object, &text);
            }
            Operation::RemoveObjectName => {
                let text = self.pop_text()?;
                let object = self.pop_instance(name, is_object, "object")?;
                self.ctx.remove_object_name(object, &text);
            }
            Operation::HasObjectName => {
                let text = self.pop_text()?;
                let object = self.pop_instance(name, is_object, "object")?;
                let has = self.ctx.ownership().object_has_name(object, &text);
                self.push(has)?;
            }
            Operation::AddObjectTag => {
                let tag = self.pop_text()?;
                let object = self.pop_instance(name, is_object, "object")?;
                self.ctx.ownership_mut().add_object_tag(object, &tag);
            }
            Operation::RemoveObjectTag => {
                let tag = self.pop_text()?;
                let object = self.pop_instance(name, is_object, "object")?;
                self.ctx.ownership_mut().remove_object_tag(object, &tag);
            }
            Operation::HasObjectTag => {
                let tag = self.pop_text()?;
                let object = self.pop_instance(name, is_object, "object")?;
                let has = self.ctx.ownership().object_has_tag(object, &tag);
                self.push(has)?;
            }
            Operation::Browse => {
                let owner = self.pop_instance(name, can_own, "container-capable element")?;
                return self.browse(module, owner);
            }

            Operation::Identity => {
                let element = self.pop_element(name)?;
                let identity = self.identity(element);
                self.push(identity)?;
            }
            Operation::InstanceOf => {
                let ancestor = self.pop_element(name)?;
                let element = self.pop_element(name)?;
                let is = self.module.is_instance_of(element, ancestor)?;
                self.push(is)?;
            }
            Operation::Header(key) => {
                let value = self.module.header_value(key).to_string();
                self.push(value)?;
            }

            Operation::QueueAction => {
                let action = self.pop_instance(name, is_action, "action")?;
                self.queue(action, ActionTarget::None);
            }
            Operation::QueueActionOpen => {
                let text = self.pop_text()?;
                let action = self.pop_instance(name, is_action, "action")?;
                self.queue(action, ActionTarget::Open(text));
            }
            Operation::QueueActionModal => {
                let mode = self.pop_text()?;
                let action = self.pop_instance(name, is_action, "action")?;
                self.queue(action, ActionTarget::Modal(mode));
            }
            Operation::QueueActionObject => {
                let object = self.pop_instance(name, is_object, "object")?;
                let action = self.pop_instance(name, is_action, "action")?;
                self.queue(action, ActionTarget::Object(object));
            }
            Operation::QueueActionObjects => {
                let second = self.pop_instance(name, is_object, "object")?;
                let first = self.pop_instance(name, is_object, "object")?;
                let action = self.pop_instance(name, is_action, "action")?;
                self.queue(action, ActionTarget::Objects(first, second));
            }

            Operation::Builtin(builtin) => self.builtin(*builtin)?,
        }
        Ok(Outcome::Continue)
    }

    /// Queue the browse block of every object `owner` holds, in queue order.
    fn browse<'m>(&mut self, module: &'m Module, owner: ElementId) -> Result<Outcome<'m>, EngineError> {
        let specific = TriggerKey::OnElementBrowse(module.identity(owner).to_string());
        let general = TriggerKey::browse_for(module.kind(owner));
        let mut entries = Vec::new();
        for object in self.ctx.ownership().objects_owned_by(owner) {
            let mut found = module.resolve_block(object, &specific)?;
            if found.is_none() {
                if let Some(general) = &general {
                    found = module.resolve_block(object, general)?;
                }
            }
            if let Some((_, block)) = found {
                entries.push((object, block));
            }
        }
        Ok(Outcome::Push(Task::Browse {
            entries: entries.into_iter(),
        }))
    }
}
