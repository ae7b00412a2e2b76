//! Git tool: worktree lifecycle and repository status.
//!
//! An instance is bound to one repository directory, supplied as the single
//! constructor argument. All commands run against that repository.

use std::path::PathBuf;

use serde_json::{Value, json};
use tokio::process::Command;

use super::{ToolFactory, ToolInstance, str_arg};
use crate::core::error::{Error, Result};

/// Factory for the `git` category.
pub struct GitFactory;

impl ToolFactory for GitFactory {
    fn category(&self) -> &'static str {
        "git"
    }

    fn implementation(&self) -> &'static str {
        "git-cli"
    }

    fn construct(&self, tool_args: &[Value]) -> Result<Box<dyn ToolInstance>> {
        let repository_dir = str_arg(tool_args, 0, "repositoryDir")?;
        Ok(Box::new(GitTool {
            repository_dir: PathBuf::from(repository_dir),
        }))
    }
}

/// Git tool bound to a repository directory.
struct GitTool {
    repository_dir: PathBuf,
}

impl GitTool {
    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repository_dir)
            .output()
            .await
            .map_err(|e| Error::Tool(format!("failed to spawn git: {e}")))
    }

    /// `git worktree add -b <branch> <dir>` against the bound repository.
    async fn add_worktree(&self, args: &[Value]) -> Result<Value> {
        let worktree_dir = str_arg(args, 0, "worktreeDir")?;
        let branch = str_arg(args, 1, "branch")?;

        if let Some(parent) = std::path::Path::new(worktree_dir).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let output = self
            .run(&["worktree", "add", "-b", branch, worktree_dir])
            .await?;

        if !output.status.success() {
            return Err(Error::Tool(format!(
                "failed to create worktree: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        tracing::info!(
            branch = %branch,
            directory = %worktree_dir,
            "created worktree"
        );

        Ok(json!({ "worktree": worktree_dir, "branch": branch }))
    }

    /// `git worktree remove --force <dir>`. An already-removed worktree is
    /// not an error; repeated removal happens on error-path cleanup.
    async fn rem_worktree(&self, args: &[Value]) -> Result<Value> {
        let worktree_dir = str_arg(args, 0, "worktreeDir")?;

        let output = self
            .run(&["worktree", "remove", "--force", worktree_dir])
            .await?;

        if output.status.success() {
            tracing::info!(directory = %worktree_dir, "removed worktree");
            return Ok(json!({ "removed": true }));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("is not a working tree") || stderr.contains("No such file") {
            tracing::debug!(directory = %worktree_dir, "worktree already gone");
            return Ok(json!({ "removed": false }));
        }

        Err(Error::Tool(format!("failed to remove worktree: {stderr}")))
    }

    /// `git status --porcelain=v2 --branch`, reduced to the branch head.
    async fn status(&self) -> Result<Value> {
        let output = self.run(&["status", "--porcelain=v2", "--branch"]).await?;

        if !output.status.success() {
            return Err(Error::Tool(format!(
                "git status failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let current = stdout
            .lines()
            .find_map(|line| line.strip_prefix("# branch.head "))
            .map(str::trim)
            .filter(|head| *head != "(detached)");

        let mut status = serde_json::Map::new();
        if let Some(branch) = current {
            status.insert("current".to_string(), json!(branch));
        }
        Ok(Value::Object(status))
    }
}

#[async_trait::async_trait]
impl ToolInstance for GitTool {
    fn methods(&self) -> &'static [&'static str] {
        &["addWorktree", "remWorkTree", "status"]
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "addWorktree" => self.add_worktree(args).await,
            "remWorkTree" => self.rem_worktree(args).await,
            "status" => self.status().await,
            _ => Err(Error::MethodNotFound {
                tool: "git".to_string(),
                method: method.to_string(),
            }),
        }
    }
}
