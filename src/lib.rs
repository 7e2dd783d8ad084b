//! # tame - runtime engine for text adventure modules
//!
//! A compiled adventure is a [`Module`](module::Module): an immutable graph
//! of elements (world, players, rooms, objects, containers, actions) whose
//! entry blocks hold the game logic as operation lists. Playing one needs a
//! mutable [`ModuleContext`](context::ModuleContext) holding variables,
//! object ownership, room stacks and the list heap.
//!
//! ## Features
//!
//! - **Value model**: booleans, integers, floats, strings, element
//!   references and heap-shared lists with cyclic structure.
//! - **Inheritance**: entry blocks and functions resolve through parent
//!   chains, with archetypes acting as abstract templates.
//! - **Ownership**: every object has at most one owner; players carry a
//!   stack of rooms.
//! - **Cues**: execution emits an ordered list of cues for a front end to
//!   read back, pausing and resuming as the player acknowledges.
//! - **Save/restore**: the full mutable state round-trips through a compact
//!   binary form that preserves list aliasing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tame::context::ModuleContext;
//! use tame::module::loader;
//! use tame::runtime::{handle_init, handle_request};
//!
//! fn main() -> anyhow::Result<()> {
//!     let module = Arc::new(loader::load("adventure.json")?);
//!     let mut ctx = ModuleContext::new(module);
//!     for cue in handle_init(&mut ctx).cues() {
//!         println!("{}", cue);
//!     }
//!     let response = handle_request(&mut ctx, "look");
//!     print!("{}", response.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`value`] - runtime values, coercions and the list heap
//! - [`module`] - element definitions, triggers, operations and loading
//! - [`context`] - mutable game state, ownership, saves
//! - [`runtime`] - command interpretation, execution and cues
//! - [`config`] - engine limits, logging and storage settings
//! - [`errors`] - error types for each layer

pub mod config;
pub mod context;
pub mod errors;
pub mod logutil;
pub mod module;
pub mod runtime;
pub mod value;

pub use context::ModuleContext;
pub use errors::{EngineError, ModuleError, StateError, TameError};
pub use module::Module;
pub use runtime::{handle_init, handle_request, Cue, CueKind, Response};
pub use value::Value;
