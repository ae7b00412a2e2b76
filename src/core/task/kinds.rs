//! Concrete task kinds built on the core lifecycle.

use std::sync::Arc;

use serde_json::json;

use super::{Task, TaskContext, TaskKind, TaskState};
use crate::core::error::{Error, Result};
use crate::core::model::GenerateRequest;
use crate::core::worktree::Worktree;

/// Suspends until a human confirms; denial aborts the surrounding tree.
#[derive(Debug)]
pub struct ConfirmTask {
    message: String,
}

impl ConfirmTask {
    /// Ask the human to confirm `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl TaskKind for ConfirmTask {
    fn name(&self) -> &'static str {
        "confirm"
    }

    async fn init(&mut self, _state: &mut TaskState, ctx: &TaskContext) -> Result<()> {
        let rx = ctx
            .prompts
            .add_prompt(crate::core::prompt::Prompt::confirmation(&self.message));

        // Literal suspension point: nothing proceeds until the queue
        // resolves this entry.
        let resolved = rx
            .await
            .map_err(|_| Error::Tool("prompt queue dropped before resolution".to_string()))?;

        if resolved.accepted() {
            Ok(())
        } else {
            Err(Error::UserAbort)
        }
    }
}

/// Runs one console command in the task's working directory.
#[derive(Debug)]
pub struct CommandTask {
    command: String,
}

impl CommandTask {
    /// Run `command` via the console tool.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait::async_trait]
impl TaskKind for CommandTask {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn init(&mut self, state: &mut TaskState, ctx: &TaskContext) -> Result<()> {
        let dir = ctx.working_dir(state.task_id());
        let output = state
            .invoke(
                ctx,
                "console",
                "exec",
                &[json!(dir.to_string_lossy())],
                &[json!(self.command)],
            )
            .await?;

        tracing::info!(
            command = %self.command,
            stdout = %output["stdout"].as_str().unwrap_or_default().trim_end(),
            "command completed"
        );
        Ok(())
    }
}

/// Root pipeline for one natural-language request: evaluates the request,
/// isolates the work in a fresh worktree, then gates the step commands
/// behind a human confirmation.
#[derive(Debug)]
pub struct RequestTask {
    request: String,
    steps: Vec<String>,
    model_ref: String,
    plan: Option<String>,
}

impl RequestTask {
    /// Orchestrate `request` with the given step commands.
    #[must_use]
    pub fn new(request: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            request: request.into(),
            steps,
            model_ref: "default".to_string(),
            plan: None,
        }
    }

    /// Model reference used for request evaluation.
    #[must_use]
    pub fn with_model_ref(mut self, model_ref: impl Into<String>) -> Self {
        self.model_ref = model_ref.into();
        self
    }

    /// The evaluation produced for the request, if a model was configured.
    #[must_use]
    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }
}

#[async_trait::async_trait]
impl TaskKind for RequestTask {
    fn name(&self) -> &'static str {
        "request"
    }

    async fn init(&mut self, state: &mut TaskState, ctx: &TaskContext) -> Result<()> {
        // Evaluate the request first, before any filesystem mutation.
        if let Some(model) = &ctx.model {
            let request = GenerateRequest {
                model: self.model_ref.clone(),
                system: Some("Summarize the change this request requires.".to_string()),
                input: self.request.clone(),
            };
            let plan = model.generate(request).await?;
            tracing::info!(plan = %plan, "request evaluated");
            self.plan = Some(plan);
        }

        // This task will mutate files, so it gets an id and its own
        // worktree. No file-mutating tool call may precede init completing.
        let task_id = state.assign_task_id().to_string();
        let mut worktree = Worktree::new(
            Arc::clone(&ctx.tools),
            ctx.repository_dir.clone(),
            Some(&task_id),
        )?
        .with_install_command(ctx.install_command.clone());
        worktree.init().await?;
        ctx.worktrees.add(Arc::new(worktree));

        state.add_subtask(Task::new(ConfirmTask::new(format!(
            "Apply \"{}\" in an isolated worktree?",
            self.request
        ))));
        for step in &self.steps {
            state.add_subtask(Task::new(CommandTask::new(step)));
        }
        Ok(())
    }

    async fn cleanup(&mut self, state: &mut TaskState, ctx: &TaskContext) -> Result<()> {
        let Some(task_id) = state.task_id() else {
            return Ok(());
        };
        // Map removal and physical release are decoupled on purpose; both
        // happen here on the error path and the success path alike.
        if let Some(worktree) = ctx.worktrees.remove(task_id) {
            worktree.delete().await?;
        }
        Ok(())
    }
}
