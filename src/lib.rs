pub mod checkpoint;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod orchestrator;
pub mod phase;
pub mod prefs;
pub mod registry;
pub mod source;
pub mod task;
pub mod worktree;
