//! Client SSE engine (C6) and tool-call orchestrator (C7): the side of this
//! crate that calls out to other Poe bots.

mod engine;
mod toolcall;

pub use engine::{BotClient, BotEvent};
pub use toolcall::{ToolCallAssembler, ToolExecutables};
