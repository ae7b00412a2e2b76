//! Error types for the core module.

/// Core error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No tool is registered under the requested category.
    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    /// The resolved tool has no such method.
    #[error("method '{method}' not found on tool '{tool}'")]
    MethodNotFound {
        /// Tool category name.
        tool: String,
        /// Requested method name.
        method: String,
    },

    /// The invocation policy rejected the call.
    #[error("invocation of '{tool}.{method}' denied by policy")]
    InvocationDenied {
        /// Tool category name.
        tool: String,
        /// Rejected method name.
        method: String,
    },

    /// A worktree could not be created or initialized.
    #[error("worktree creation failed: {0}")]
    WorktreeCreationFailed(String),

    /// A task's init hook failed.
    #[error("task init failed: {0}")]
    TaskInitError(String),

    /// A prompt response arrived while the queue was empty.
    #[error("no pending prompt")]
    NoPendingPrompt,

    /// A prompt resolution carried no response value.
    #[error("missing response field")]
    MissingResponse,

    /// The user declined a confirmation prompt.
    #[error("aborted by user")]
    UserAbort,

    /// A tool subprocess or plugin failed.
    #[error("tool execution failed: {0}")]
    Tool(String),

    /// A tool argument did not match the expected shape.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// Model generation failed.
    #[error("model error: {0}")]
    Model(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
