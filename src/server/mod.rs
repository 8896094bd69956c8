//! Server dispatcher (C5) and settings sync (C9): the side of this crate
//! that serves a bot endpoint consumed by the Poe platform.

mod dispatcher;
mod pending_files;
mod settings_sync;

pub use dispatcher::{BotHost, PoeBot, RequestContext, ResponseElement};
pub use pending_files::PendingFileQueue;
pub use settings_sync::sync_settings;
