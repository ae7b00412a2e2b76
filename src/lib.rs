//! Cassi - autonomous coding-agent orchestrator.
//!
//! Given a natural-language request, Cassi isolates the work in its own
//! git worktree, drives a sequence of automated sub-steps through a uniform
//! tool-invocation seam, and pauses for human confirmation before
//! irreversible actions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐        ┌─────────────┐
//! │     CLI     │        │   HTTP API  │
//! └──────┬──────┘        └──────┬──────┘
//!        │                      │
//!        └──────────┬───────────┘
//!                   │
//!            ┌──────┴──────┐
//!            │    Core     │  task tree · tools · worktrees · prompts
//!            └─────────────┘
//! ```

pub mod api;
pub mod build_info;
pub mod cli;
pub mod config;
pub mod core;

pub use config::Config;
pub use core::{
    Error, Prompt, PromptQueue, Result, Scheduler, Task, TaskContext, TaskKind, ToolInvocation,
    ToolRegistry, Worktree, WorktreeRegistry,
};
