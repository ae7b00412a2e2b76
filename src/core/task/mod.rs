//! Hierarchical task tree and lifecycle.
//!
//! A task runs in two phases: its kind's `init` hook plans work (invoking
//! tools, appending subtasks), then the appended subtasks execute strictly
//! in insertion order. A failing subtask stops later siblings of the same
//! parent (fail-fast, not fail-all), while `finished_at` is set on every
//! exit path. Cleanup happens after `run` settles, regardless of outcome.

pub mod kinds;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::{Error, Result};
use super::model::Model;
use super::prompt::PromptQueue;
use super::tool::ToolRegistry;
use super::worktree::{DEFAULT_INSTALL_COMMAND, WorktreeRegistry};

/// Context-only reference to the parent task. Not ownership: used for
/// things like computing a branch target.
#[derive(Debug, Clone, Default)]
pub struct ParentInfo {
    /// Parent's task id, if it has one.
    pub task_id: Option<String>,
}

/// Shared handles and settings every task in a tree can reach.
#[derive(Clone)]
pub struct TaskContext {
    /// Tool registry all external effects go through.
    pub tools: Arc<ToolRegistry>,
    /// Bookkeeping map of active worktrees.
    pub worktrees: Arc<WorktreeRegistry>,
    /// Queue of pending human-approval requests.
    pub prompts: Arc<PromptQueue>,
    /// Origin repository directory.
    pub repository_dir: PathBuf,
    /// Dependency install command for fresh worktrees.
    pub install_command: String,
    /// Text generation backend, when configured.
    pub model: Option<Arc<dyn Model>>,
    /// The parent task, context only.
    pub parent: ParentInfo,
}

impl TaskContext {
    /// Create a context rooted at a repository with default settings.
    #[must_use]
    pub fn new(
        tools: Arc<ToolRegistry>,
        worktrees: Arc<WorktreeRegistry>,
        prompts: Arc<PromptQueue>,
        repository_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tools,
            worktrees,
            prompts,
            repository_dir: repository_dir.into(),
            install_command: DEFAULT_INSTALL_COMMAND.to_string(),
            model: None,
            parent: ParentInfo::default(),
        }
    }

    /// Attach a model backend.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    /// Override the dependency install command.
    #[must_use]
    pub fn with_install_command(mut self, command: impl Into<String>) -> Self {
        self.install_command = command.into();
        self
    }

    /// Derive the context subtasks of `parent_id` run under.
    #[must_use]
    pub fn child(&self, parent_id: Option<String>) -> Self {
        let mut ctx = self.clone();
        ctx.parent = ParentInfo { task_id: parent_id };
        ctx
    }

    /// Working directory for a task: its own worktree if one is registered,
    /// else the nearest ancestor's, else the origin repository.
    #[must_use]
    pub fn working_dir(&self, task_id: Option<&str>) -> PathBuf {
        task_id
            .and_then(|id| self.worktrees.get(id))
            .or_else(|| {
                self.parent
                    .task_id
                    .as_deref()
                    .and_then(|id| self.worktrees.get(id))
            })
            .map_or_else(
                || self.repository_dir.clone(),
                |wt| wt.worktree_dir().to_path_buf(),
            )
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("repository_dir", &self.repository_dir)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

/// Mutable surface of a task handed to its kind's hooks.
#[derive(Debug, Default)]
pub struct TaskState {
    task_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
    sub_tasks: Vec<Task>,
}

impl TaskState {
    /// The task's id, assigned only once the task is known to mutate files.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Assign a fresh id if the task has none, returning the id.
    pub fn assign_task_id(&mut self) -> &str {
        if self.task_id.is_none() {
            self.task_id = Some(uuid::Uuid::new_v4().to_string());
        }
        self.task_id.as_deref().unwrap_or_default()
    }

    /// When the task started running.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the task finished, successfully or not.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Terminal error, if the task failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Owned subtasks, in insertion (execution) order.
    #[must_use]
    pub fn sub_tasks(&self) -> &[Task] {
        &self.sub_tasks
    }

    /// Append a subtask. Subtasks appended during `init` run only after
    /// `init` fully resolves.
    pub fn add_subtask(&mut self, task: Task) {
        self.sub_tasks.push(task);
    }

    /// Invoke a tool on behalf of this task. Thin delegation to the
    /// registry; errors are never retried at this layer.
    ///
    /// # Errors
    ///
    /// Propagates registry and tool failures unchanged.
    pub async fn invoke(
        &self,
        ctx: &TaskContext,
        tool: &str,
        method: &str,
        tool_args: &[Value],
        method_args: &[Value],
    ) -> Result<Value> {
        ctx.tools
            .invoke(self.task_id(), tool, method, tool_args, method_args)
            .await
    }
}

/// Behavior of one concrete task variant.
#[async_trait::async_trait]
pub trait TaskKind: Send + Sync {
    /// Human-readable kind name, for logs.
    fn name(&self) -> &'static str;

    /// Plan phase: perform work, invoke tools, append subtasks.
    async fn init(&mut self, state: &mut TaskState, ctx: &TaskContext) -> Result<()>;

    /// Release task-owned resources. Runs after `run` settles regardless of
    /// outcome; errors are logged, never propagated.
    async fn cleanup(&mut self, state: &mut TaskState, ctx: &TaskContext) -> Result<()> {
        let _ = (state, ctx);
        Ok(())
    }
}

/// A unit of orchestrated work: lifecycle state plus its kind, owning zero
/// or more subtasks exclusively.
pub struct Task {
    state: TaskState,
    kind: Box<dyn TaskKind>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("kind", &self.kind.name())
            .field("state", &self.state)
            .finish()
    }
}

impl Task {
    /// Create a task of the given kind.
    #[must_use]
    pub fn new(kind: impl TaskKind + 'static) -> Self {
        Self {
            state: TaskState::default(),
            kind: Box::new(kind),
        }
    }

    /// Read access to lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &TaskState {
        &self.state
    }

    /// Kind name, for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Run the task: init phase, then subtasks in insertion order.
    ///
    /// An init failure is wrapped and stored as this task's error. A failing
    /// subtask's error is copied onto this task and later siblings never
    /// start. `finished_at` is set unconditionally on every exit path.
    pub fn run<'a>(
        &'a mut self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.state.started_at = Some(Utc::now());
            tracing::info!(task = %self.kind.name(), task_id = ?self.state.task_id, "task started");

            match self.kind.init(&mut self.state, ctx).await {
                Err(e) => {
                    let wrapped = Error::TaskInitError(e.to_string());
                    tracing::error!(task = %self.kind.name(), error = %wrapped, "task init failed");
                    self.state.error = Some(wrapped.to_string());
                }
                Ok(()) => {
                    let child_ctx = ctx.child(self.state.task_id.clone());
                    for sub_task in &mut self.state.sub_tasks {
                        sub_task.run(&child_ctx).await;
                        if let Some(error) = sub_task.state.error.clone() {
                            tracing::warn!(
                                task = %self.kind.name(),
                                failed = %sub_task.name(),
                                "subtask failed, stopping remaining siblings"
                            );
                            self.state.error = Some(error);
                            break;
                        }
                    }
                }
            }

            self.state.finished_at = Some(Utc::now());
            tracing::info!(
                task = %self.kind.name(),
                ok = self.state.error.is_none(),
                "task finished"
            );
        })
    }

    /// Run cleanup hooks over the whole tree, children before parents.
    /// Every hook runs; failures are logged as warnings and swallowed so one
    /// task's cleanup cannot block a sibling's.
    pub fn cleanup<'a>(
        &'a mut self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let child_ctx = ctx.child(self.state.task_id.clone());
            for sub_task in &mut self.state.sub_tasks {
                sub_task.cleanup(&child_ctx).await;
            }

            if let Err(e) = self.kind.cleanup(&mut self.state, ctx).await {
                tracing::warn!(
                    task = %self.kind.name(),
                    error = %e,
                    "cleanup failed, continuing"
                );
            }
        })
    }
}

/// Drive a root task to completion: run it, then clean up the whole tree
/// unconditionally.
pub async fn run_to_completion(task: &mut Task, ctx: &TaskContext) {
    task.run(ctx).await;
    task.cleanup(ctx).await;
}
