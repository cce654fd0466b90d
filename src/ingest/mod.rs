//! Getting recordings into the input directory.
//!
//! - `collector`: one-shot copy of recent recordings from the system
//!   voice-memo store
//! - `watcher`: debounced watching of the input directory for watch mode

pub mod collector;
pub mod watcher;

pub use collector::{collect_recent, default_voice_memos_path, CollectReport};
pub use watcher::{InputWatcher, WatchHandle, WatcherConfig, WatcherError};
