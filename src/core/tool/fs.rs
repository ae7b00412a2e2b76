//! Filesystem tool: file reads and writes rooted at a base directory.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use super::{ToolFactory, ToolInstance, str_arg};
use crate::core::error::{Error, Result};

/// Factory for the `fs` category.
pub struct FsFactory;

impl ToolFactory for FsFactory {
    fn category(&self) -> &'static str {
        "fs"
    }

    fn implementation(&self) -> &'static str {
        "fs-local"
    }

    fn construct(&self, tool_args: &[Value]) -> Result<Box<dyn ToolInstance>> {
        let base_dir = str_arg(tool_args, 0, "baseDir")?;
        Ok(Box::new(FsTool {
            base_dir: PathBuf::from(base_dir),
        }))
    }
}

/// Filesystem access rooted at one directory.
struct FsTool {
    base_dir: PathBuf,
}

impl FsTool {
    /// Resolve a relative path under the base directory, rejecting escapes.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let candidate = Path::new(path);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::InvalidArguments(format!(
                "path '{path}' must be relative and stay inside the working directory"
            )));
        }
        Ok(self.base_dir.join(candidate))
    }

    async fn read_file(&self, args: &[Value]) -> Result<Value> {
        let path = str_arg(args, 0, "path")?;
        let resolved = self.resolve(path)?;
        let content = tokio::fs::read_to_string(&resolved).await?;
        Ok(json!(content))
    }

    async fn write_file(&self, args: &[Value]) -> Result<Value> {
        let path = str_arg(args, 0, "path")?;
        let content = str_arg(args, 1, "content")?;
        let resolved = self.resolve(path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;

        tracing::debug!(path = %resolved.display(), bytes = content.len(), "wrote file");
        Ok(Value::Null)
    }
}

#[async_trait::async_trait]
impl ToolInstance for FsTool {
    fn methods(&self) -> &'static [&'static str] {
        &["readFile", "writeFile"]
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "readFile" => self.read_file(args).await,
            "writeFile" => self.write_file(args).await,
            _ => Err(Error::MethodNotFound {
                tool: "fs".to_string(),
                method: method.to_string(),
            }),
        }
    }
}
