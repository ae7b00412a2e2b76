//! Per-task git worktree isolation.
//!
//! Every file-mutating task gets its own git working tree so tasks never
//! corrupt a shared checkout. Physical worktree management goes through the
//! tool registry; the bookkeeping map of active worktrees lives in
//! [`WorktreeRegistry`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;

use super::error::{Error, Result};
use super::tool::ToolRegistry;

/// Default command run to install dependencies inside a fresh worktree.
pub const DEFAULT_INSTALL_COMMAND: &str = "npm install";

/// An isolated git working tree bound to exactly one task.
#[derive(Debug)]
pub struct Worktree {
    task_id: String,
    repository_dir: PathBuf,
    worktree_dir: PathBuf,
    install_command: String,
    repository_branch: Option<String>,
    tools: Arc<ToolRegistry>,
}

impl Worktree {
    /// Bind a worktree to a task.
    ///
    /// The worktree directory is derived as
    /// `<repository_dir>/.cassi/worktrees/<task_id>` unless overridden with
    /// [`Self::with_worktree_dir`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorktreeCreationFailed`] if `task_id` is `None`;
    /// no I/O has happened at that point.
    pub fn new(
        tools: Arc<ToolRegistry>,
        repository_dir: impl Into<PathBuf>,
        task_id: Option<&str>,
    ) -> Result<Self> {
        let task_id = task_id.ok_or_else(|| {
            Error::WorktreeCreationFailed(
                "task id is required to create a worktree, got none".to_string(),
            )
        })?;

        let repository_dir = repository_dir.into();
        let worktree_dir = repository_dir
            .join(".cassi")
            .join("worktrees")
            .join(task_id);

        Ok(Self {
            task_id: task_id.to_string(),
            repository_dir,
            worktree_dir,
            install_command: DEFAULT_INSTALL_COMMAND.to_string(),
            repository_branch: None,
            tools,
        })
    }

    /// Override the derived worktree directory.
    #[must_use]
    pub fn with_worktree_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.worktree_dir = dir.into();
        self
    }

    /// Override the dependency install command.
    #[must_use]
    pub fn with_install_command(mut self, command: impl Into<String>) -> Self {
        self.install_command = command.into();
        self
    }

    /// The owning task's id.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Directory of the isolated working tree.
    #[must_use]
    pub fn worktree_dir(&self) -> &Path {
        &self.worktree_dir
    }

    /// Branch the origin repository was on when `init` ran, if captured.
    #[must_use]
    pub fn repository_branch(&self) -> Option<&str> {
        self.repository_branch.as_deref()
    }

    /// Create the physical worktree, install dependencies inside it, and
    /// capture the origin repository's current branch.
    ///
    /// # Errors
    ///
    /// Propagates tool failures, and returns
    /// [`Error::WorktreeCreationFailed`] if the origin repository's branch
    /// cannot be determined from git status.
    pub async fn init(&mut self) -> Result<()> {
        let repo = json!(self.repository_dir.to_string_lossy());
        let dir = json!(self.worktree_dir.to_string_lossy());

        self.tools
            .invoke(
                Some(&self.task_id),
                "git",
                "addWorktree",
                std::slice::from_ref(&repo),
                &[dir.clone(), json!(self.task_id)],
            )
            .await?;

        self.tools
            .invoke(
                Some(&self.task_id),
                "console",
                "exec",
                &[dir],
                &[json!(self.install_command)],
            )
            .await?;

        let status = self
            .tools
            .invoke(
                Some(&self.task_id),
                "git",
                "status",
                std::slice::from_ref(&repo),
                &[],
            )
            .await?;

        let branch = status
            .get("current")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                Error::WorktreeCreationFailed(
                    "could not determine repository branch from git status".to_string(),
                )
            })?;
        self.repository_branch = Some(branch.to_string());

        tracing::info!(
            task_id = %self.task_id,
            directory = %self.worktree_dir.display(),
            branch = %branch,
            "worktree initialized"
        );

        Ok(())
    }

    /// Remove the physical worktree. Idempotent: a worktree that is already
    /// gone is not an error, since error-path cleanup may delete twice.
    ///
    /// # Errors
    ///
    /// Propagates tool failures other than "already removed".
    pub async fn delete(&self) -> Result<()> {
        self.tools
            .invoke(
                Some(&self.task_id),
                "git",
                "remWorkTree",
                &[json!(self.repository_dir.to_string_lossy())],
                &[json!(self.worktree_dir.to_string_lossy())],
            )
            .await?;
        Ok(())
    }
}

/// Mutex-guarded map of active worktrees, keyed by task id.
///
/// Removing an entry is bookkeeping only; releasing the physical directory
/// is [`Worktree::delete`]'s job. The two are intentionally decoupled.
#[derive(Debug, Default)]
pub struct WorktreeRegistry {
    inner: parking_lot::Mutex<HashMap<String, Arc<Worktree>>>,
}

impl WorktreeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a worktree under its task id.
    pub fn add(&self, worktree: Arc<Worktree>) {
        self.inner
            .lock()
            .insert(worktree.task_id().to_string(), worktree);
    }

    /// Stop tracking the worktree for a task, returning it if present.
    pub fn remove(&self, task_id: &str) -> Option<Arc<Worktree>> {
        self.inner.lock().remove(task_id)
    }

    /// The tracked worktree for a task, if any.
    #[must_use]
    pub fn get(&self, task_id: &str) -> Option<Arc<Worktree>> {
        self.inner.lock().get(task_id).cloned()
    }

    /// Number of tracked worktrees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no worktrees are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tool::{ToolFactory, ToolInstance};
    use serde_json::Value;

    /// Records every invocation and answers git status with a fixed payload.
    struct Recording {
        calls: Arc<parking_lot::Mutex<Vec<(String, String, Vec<Value>, Vec<Value>)>>>,
        category: &'static str,
        status: Value,
    }

    struct RecordingInstance {
        calls: Arc<parking_lot::Mutex<Vec<(String, String, Vec<Value>, Vec<Value>)>>>,
        category: &'static str,
        tool_args: Vec<Value>,
        status: Value,
    }

    impl ToolFactory for Recording {
        fn category(&self) -> &'static str {
            self.category
        }

        fn implementation(&self) -> &'static str {
            "recording"
        }

        fn construct(&self, tool_args: &[Value]) -> Result<Box<dyn ToolInstance>> {
            Ok(Box::new(RecordingInstance {
                calls: Arc::clone(&self.calls),
                category: self.category,
                tool_args: tool_args.to_vec(),
                status: self.status.clone(),
            }))
        }
    }

    #[async_trait::async_trait]
    impl ToolInstance for RecordingInstance {
        fn methods(&self) -> &'static [&'static str] {
            &["addWorktree", "remWorkTree", "status", "exec"]
        }

        async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
            self.calls.lock().push((
                self.category.to_string(),
                method.to_string(),
                self.tool_args.clone(),
                args.to_vec(),
            ));
            if method == "status" {
                return Ok(self.status.clone());
            }
            Ok(Value::Null)
        }
    }

    type Calls = Arc<parking_lot::Mutex<Vec<(String, String, Vec<Value>, Vec<Value>)>>>;

    fn recording_registry(status: Value) -> (Arc<ToolRegistry>, Calls) {
        let calls: Calls = Arc::default();
        let mut registry = ToolRegistry::new();
        registry
            .register(Box::new(Recording {
                calls: Arc::clone(&calls),
                category: "git",
                status: status.clone(),
            }))
            .unwrap();
        registry
            .register(Box::new(Recording {
                calls: Arc::clone(&calls),
                category: "console",
                status,
            }))
            .unwrap();
        (Arc::new(registry), calls)
    }

    #[test]
    fn construction_without_task_id_fails_before_io() {
        let (registry, calls) = recording_registry(Value::Null);
        let err = Worktree::new(registry, "/repo", None).unwrap_err();

        assert!(err.to_string().contains("task id is required"));
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn worktree_dir_is_derived_from_repository_and_task() {
        let (registry, _) = recording_registry(Value::Null);
        let worktree = Worktree::new(registry, "/repo", Some("abc123")).unwrap();
        assert_eq!(
            worktree.worktree_dir(),
            Path::new("/repo/.cassi/worktrees/abc123")
        );
    }

    #[tokio::test]
    async fn init_issues_three_tool_calls_in_order() {
        let (registry, calls) = recording_registry(json!({ "current": "main" }));
        let mut worktree = Worktree::new(registry, "/repo", Some("abc123")).unwrap();

        worktree.init().await.unwrap();

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);

        let wt = "/repo/.cassi/worktrees/abc123";
        assert_eq!(
            calls[0],
            (
                "git".to_string(),
                "addWorktree".to_string(),
                vec![json!("/repo")],
                vec![json!(wt), json!("abc123")],
            )
        );
        assert_eq!(
            calls[1],
            (
                "console".to_string(),
                "exec".to_string(),
                vec![json!(wt)],
                vec![json!("npm install")],
            )
        );
        assert_eq!(
            calls[2],
            (
                "git".to_string(),
                "status".to_string(),
                vec![json!("/repo")],
                vec![],
            )
        );

        assert_eq!(worktree.repository_branch(), Some("main"));
    }

    #[tokio::test]
    async fn init_fails_when_branch_is_undeterminable() {
        let (registry, _) = recording_registry(json!({}));
        let mut worktree = Worktree::new(registry, "/repo", Some("abc123")).unwrap();

        let err = worktree.init().await.unwrap_err();
        assert!(
            err.to_string()
                .contains("could not determine repository branch")
        );
        assert_eq!(worktree.repository_branch(), None);
    }

    #[tokio::test]
    async fn custom_install_command_is_used() {
        let (registry, calls) = recording_registry(json!({ "current": "main" }));
        let mut worktree = Worktree::new(registry, "/repo", Some("abc123"))
            .unwrap()
            .with_install_command("cargo fetch");

        worktree.init().await.unwrap();
        assert_eq!(calls.lock()[1].3, vec![json!("cargo fetch")]);
    }

    #[tokio::test]
    async fn registry_tracks_and_releases_by_task_id() {
        let (tools, _) = recording_registry(Value::Null);
        let registry = WorktreeRegistry::new();
        let worktree = Arc::new(Worktree::new(tools, "/repo", Some("abc123")).unwrap());

        registry.add(Arc::clone(&worktree));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("abc123").is_some());

        let removed = registry.remove("abc123").unwrap();
        assert_eq!(removed.task_id(), "abc123");
        assert!(registry.is_empty());
        assert!(registry.remove("abc123").is_none());
    }
}
