//! Execution engine.
//!
//! Two entry points drive a [`ModuleContext`]: [`handle_init`] starts a new
//! game and [`handle_request`] runs one line of player input. Both return a
//! [`Response`] holding the cues produced, in order. A fatal fault aborts the
//! request and leaves exactly one FATAL cue at the end; state changes made
//! before the fault are kept.

pub mod builtins;
pub mod cue;
pub mod dispatch;
pub mod exec;
pub mod flow;
pub mod parser;
pub mod pattern;
pub mod request;

pub use cue::{coalesce, Cue, CueKind, CueReader, Response};
pub use flow::Flow;
pub use parser::{interpret, Interpretation};
pub use pattern::PatternCache;

use log::info;

use crate::context::ModuleContext;
use exec::Engine;

/// Run the module's initialization blocks.
pub fn handle_init(ctx: &mut ModuleContext) -> Response {
    info!("initializing '{}'", ctx.module().title());
    let mut engine = Engine::new(ctx);
    let result = engine.run_init();
    engine.finish(result)
}

/// Interpret `input` and run whatever it selects.
pub fn handle_request(ctx: &mut ModuleContext, input: &str) -> Response {
    let mut engine = Engine::new(ctx);
    let result = engine.run_command(input);
    engine.finish(result)
}
