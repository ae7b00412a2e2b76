//! Tool registry and invocation.
//!
//! Tasks never import concrete I/O implementations. Every external effect
//! (git, filesystem, subprocess) goes through [`ToolRegistry::invoke`], which
//! resolves a category name to a registered factory, constructs a fresh
//! instance for the call, gates it through the invocation policy, and
//! dispatches by method name.

pub mod console;
pub mod fs;
pub mod git;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use super::error::{Error, Result};

/// A constructed tool ready to receive method calls.
#[async_trait::async_trait]
pub trait ToolInstance: Send + Sync {
    /// Method names this instance dispatches.
    fn methods(&self) -> &'static [&'static str];

    /// Dispatch a method call by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MethodNotFound`] for unknown method names, or the
    /// method's own failure.
    async fn call(&self, method: &str, args: &[Value]) -> Result<Value>;
}

/// Factory for one tool category.
///
/// A fresh instance is constructed per invocation so stateful tools (e.g. a
/// console bound to a working directory) are never shared across calls.
pub trait ToolFactory: Send + Sync {
    /// Category name this factory serves (e.g. `"git"`).
    fn category(&self) -> &'static str;

    /// Implementation name, for invocation records and logs.
    fn implementation(&self) -> &'static str;

    /// Construct an instance from per-call constructor arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArguments`] if the arguments do not match the
    /// tool's constructor shape.
    fn construct(&self, tool_args: &[Value]) -> Result<Box<dyn ToolInstance>>;
}

/// Record of one resolved tool call, passed through the policy hook before
/// dispatch. Transient; not persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolInvocation {
    /// Id of the owning task, if it has one.
    pub task_id: Option<String>,
    /// Tool category name.
    pub tool: String,
    /// Resolved implementation name.
    pub implementation: String,
    /// Method name.
    pub method: String,
    /// Constructor arguments.
    pub tool_args: Vec<Value>,
    /// Method arguments.
    pub method_args: Vec<Value>,
}

/// Authorization hook consulted before every dispatch.
///
/// The default policy allows everything; this is the seam for
/// approval-required commands, sandboxing, or rate limits.
pub trait InvocationPolicy: Send + Sync {
    /// Whether the invocation may proceed.
    fn allow(&self, invocation: &ToolInvocation) -> bool;
}

/// Policy that permits every invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl InvocationPolicy for AllowAll {
    fn allow(&self, _invocation: &ToolInvocation) -> bool {
        true
    }
}

/// Registry of tool factories, read-only after construction.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn ToolFactory>>,
    policy: Box<dyn InvocationPolicy>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry with the allow-all policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            policy: Box::new(AllowAll),
        }
    }

    /// Create a registry with the built-in git, console, and fs tools.
    #[must_use]
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        let builtins: [Box<dyn ToolFactory>; 3] = [
            Box::new(git::GitFactory),
            Box::new(console::ConsoleFactory),
            Box::new(fs::FsFactory),
        ];
        for factory in builtins {
            // Built-in categories are distinct; registration cannot collide.
            if let Err(e) = registry.register(factory) {
                tracing::error!(error = %e, "builtin tool registration failed");
            }
        }
        registry
    }

    /// Process-wide registry, built once on first access.
    pub fn global() -> &'static Arc<Self> {
        static REGISTRY: OnceLock<Arc<ToolRegistry>> = OnceLock::new();
        REGISTRY.get_or_init(|| Arc::new(Self::with_default_tools()))
    }

    /// Register a tool factory.
    ///
    /// Exactly one implementation is allowed per category; a second
    /// registration for the same category is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArguments`] if the category is already taken.
    pub fn register(&mut self, factory: Box<dyn ToolFactory>) -> Result<()> {
        let category = factory.category();
        if self.tools.contains_key(category) {
            return Err(Error::InvalidArguments(format!(
                "tool category '{category}' is already registered"
            )));
        }
        self.tools.insert(category, factory);
        Ok(())
    }

    /// Replace the invocation policy.
    pub fn set_policy(&mut self, policy: Box<dyn InvocationPolicy>) {
        self.policy = policy;
    }

    /// Registered category names.
    pub fn categories(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }

    /// Invoke `tool.method(method_args)` on a fresh instance constructed
    /// from `tool_args`, on behalf of the task identified by `task_id`.
    ///
    /// Resolution order: category, then construction, then the method name,
    /// then the policy. An unknown method is reported as such even when the
    /// policy would also have denied the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] for an unregistered category,
    /// [`Error::MethodNotFound`] for an unknown method,
    /// [`Error::InvocationDenied`] if the policy rejects the call, or the
    /// method's own failure.
    pub async fn invoke(
        &self,
        task_id: Option<&str>,
        tool: &str,
        method: &str,
        tool_args: &[Value],
        method_args: &[Value],
    ) -> Result<Value> {
        let factory = self
            .tools
            .get(tool)
            .ok_or_else(|| Error::ToolNotFound(tool.to_string()))?;

        let instance = factory.construct(tool_args)?;
        if !instance.methods().contains(&method) {
            return Err(Error::MethodNotFound {
                tool: tool.to_string(),
                method: method.to_string(),
            });
        }

        let invocation = ToolInvocation {
            task_id: task_id.map(str::to_string),
            tool: tool.to_string(),
            implementation: factory.implementation().to_string(),
            method: method.to_string(),
            tool_args: tool_args.to_vec(),
            method_args: method_args.to_vec(),
        };

        if !self.policy.allow(&invocation) {
            return Err(Error::InvocationDenied {
                tool: tool.to_string(),
                method: method.to_string(),
            });
        }

        tracing::debug!(
            task_id = ?invocation.task_id,
            tool = %tool,
            method = %method,
            "invoking tool"
        );

        instance.call(method, method_args).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("categories", &self.tools.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Extract a string argument at `index`, with a named error on mismatch.
pub(crate) fn str_arg<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArguments(format!("expected string argument '{name}'")))
}
