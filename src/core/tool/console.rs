//! Console tool: shell command execution in a fixed working directory.

use std::path::PathBuf;
use std::process::Stdio;

use serde_json::{Value, json};
use tokio::process::Command;

use super::{ToolFactory, ToolInstance, str_arg};
use crate::core::error::{Error, Result};

/// Factory for the `console` category.
pub struct ConsoleFactory;

impl ToolFactory for ConsoleFactory {
    fn category(&self) -> &'static str {
        "console"
    }

    fn implementation(&self) -> &'static str {
        "console-sh"
    }

    fn construct(&self, tool_args: &[Value]) -> Result<Box<dyn ToolInstance>> {
        let working_dir = str_arg(tool_args, 0, "workingDir")?;
        Ok(Box::new(ConsoleTool {
            working_dir: PathBuf::from(working_dir),
        }))
    }
}

/// Console bound to one working directory for its lifetime.
struct ConsoleTool {
    working_dir: PathBuf,
}

impl ConsoleTool {
    async fn exec(&self, args: &[Value]) -> Result<Value> {
        let command = str_arg(args, 0, "command")?;

        tracing::debug!(
            command = %command,
            working_dir = %self.working_dir.display(),
            "executing command"
        );

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Tool(format!("failed to spawn '{command}': {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(Error::Tool(format!(
                "'{command}' exited with {}: {stderr}",
                output.status.code().unwrap_or(-1)
            )));
        }

        Ok(json!({
            "exitCode": output.status.code().unwrap_or(0),
            "stdout": stdout,
            "stderr": stderr,
        }))
    }
}

#[async_trait::async_trait]
impl ToolInstance for ConsoleTool {
    fn methods(&self) -> &'static [&'static str] {
        &["exec"]
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "exec" => self.exec(args).await,
            _ => Err(Error::MethodNotFound {
                tool: "console".to_string(),
                method: method.to_string(),
            }),
        }
    }
}
