//! Core orchestration logic shared across CLI and API surfaces.

mod error;
pub mod model;
pub mod prompt;
pub mod scheduler;
pub mod task;
pub mod tool;
pub mod worktree;

pub use error::{Error, Result};
pub use prompt::{Prompt, PromptQueue};
pub use scheduler::Scheduler;
pub use task::{Task, TaskContext, TaskKind, run_to_completion};
pub use tool::{ToolInvocation, ToolRegistry};
pub use worktree::{Worktree, WorktreeRegistry};
