//! Per-request execution state: operand stack, call frames, action queue
//! and the runaway counters.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::module::ElementId;
use crate::value::Value;

/// What a queued action is applied to.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionTarget {
    None,
    Open(String),
    Modal(String),
    Object(ElementId),
    Objects(ElementId, ElementId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAction {
    pub action: ElementId,
    pub target: ActionTarget,
}

/// One block or function invocation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub this: ElementId,
    pub locals: HashMap<String, Value>,
    pub result: Option<Value>,
}

impl Frame {
    pub fn new(this: ElementId) -> Self {
        Self {
            this,
            locals: HashMap::new(),
            result: None,
        }
    }
}

#[derive(Debug)]
pub struct Request {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    queue: VecDeque<QueuedAction>,
    operations: u64,
    max_operations: u64,
    max_depth: usize,
    max_stack: usize,
    started: Instant,
}

impl Request {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            queue: VecDeque::new(),
            operations: 0,
            max_operations: config.max_operations,
            max_depth: config.max_call_depth,
            max_stack: config.max_stack_depth,
            started: Instant::now(),
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn operations(&self) -> u64 {
        self.operations
    }

    /// Count one executed operation against the ceiling.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        self.operations += 1;
        if self.operations > self.max_operations {
            return Err(EngineError::RunawayOperations(self.max_operations));
        }
        Ok(())
    }

    pub fn push(&mut self, value: Value) -> Result<(), EngineError> {
        if self.stack.len() >= self.max_stack {
            return Err(EngineError::StackOverflow(self.max_stack));
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, EngineError> {
        self.stack.pop().ok_or(EngineError::StackUnderflow)
    }

    pub fn peek(&self) -> Result<&Value, EngineError> {
        self.stack.last().ok_or(EngineError::StackUnderflow)
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn push_frame(&mut self, frame: Frame) -> Result<(), EngineError> {
        if self.frames.len() >= self.max_depth {
            return Err(EngineError::RunawayDepth(self.max_depth));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn frame(&self) -> Result<&Frame, EngineError> {
        self.frames
            .last()
            .ok_or_else(|| EngineError::State("no active frame".into()))
    }

    pub fn frame_mut(&mut self) -> Result<&mut Frame, EngineError> {
        self.frames
            .last_mut()
            .ok_or_else(|| EngineError::State("no active frame".into()))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn enqueue(&mut self, action: QueuedAction) {
        self.queue.push_back(action);
    }

    pub fn dequeue(&mut self) -> Option<QueuedAction> {
        self.queue.pop_front()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Values still referenced by the request, for garbage collection.
    pub fn roots(&self) -> impl Iterator<Item = &Value> {
        self.stack
            .iter()
            .chain(self.frames.iter().flat_map(|f| f.locals.values().chain(f.result.iter())))
    }
}
