//! Chat engine orchestration module.

pub mod core;

pub use self::core::{ChatEngine, EditOutcome, Reply, ReplySource};
