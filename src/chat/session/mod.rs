//! Session state: the active context, edit/rewind, naming and events.

pub mod context;
pub mod events;
pub mod naming;
pub mod rewind;

pub use context::{ContextEntry, SessionContext};
pub use events::{ChatEvent, ChatObserver, NoticeLevel, TracingObserver};
pub use naming::{clean_generated_title, heuristic_name, normalize_user_name, pending_name};
pub use rewind::{EditTarget, RewindOutcome, apply_edit};
