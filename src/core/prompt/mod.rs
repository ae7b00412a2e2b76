//! Human-in-the-loop prompt queue.
//!
//! A task that needs a human decision appends a prompt and awaits the
//! returned channel; the queue holds the send half until some other party
//! (HTTP handler or terminal reader) resolves the head entry. Queue order is
//! strictly FIFO.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use super::error::{Error, Result};

/// Shape of the response a prompt expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    /// A yes/no confirmation.
    Confirmation,
    /// Free-form text.
    Text,
}

/// A pending request for human input.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Prompt {
    /// Message shown to the human.
    pub message: String,
    /// Expected response shape.
    pub shape: ResponseShape,
    /// The supplied response; set by the resolver, `None` while pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl Prompt {
    /// A yes/no confirmation prompt.
    #[must_use]
    pub fn confirmation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            shape: ResponseShape::Confirmation,
            response: None,
        }
    }

    /// A free-form text prompt.
    #[must_use]
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            shape: ResponseShape::Text,
            response: None,
        }
    }

    /// Interpret the response as an affirmative answer.
    #[must_use]
    pub fn accepted(&self) -> bool {
        match &self.response {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => {
                matches!(s.trim().to_lowercase().as_str(), "y" | "yes" | "true")
            }
            _ => false,
        }
    }
}

/// One queued prompt plus the channel that resumes its owner.
struct PromptEntry {
    prompt: Prompt,
    tx: oneshot::Sender<Prompt>,
}

/// FIFO queue of pending prompts.
#[derive(Default)]
pub struct PromptQueue {
    inner: parking_lot::Mutex<VecDeque<PromptEntry>>,
}

impl PromptQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a prompt at the tail and return the channel its owner awaits.
    ///
    /// The receiver settles only when [`Self::resolve`] reaches this entry;
    /// awaiting it is the suspension point for the calling task.
    pub fn add_prompt(&self, prompt: Prompt) -> oneshot::Receiver<Prompt> {
        let (tx, rx) = oneshot::channel();
        tracing::debug!(message = %prompt.message, "prompt queued");
        self.inner.lock().push_back(PromptEntry { prompt, tx });
        rx
    }

    /// The head prompt without removing it. Safe to poll repeatedly.
    #[must_use]
    pub fn peek(&self) -> Option<Prompt> {
        self.inner.lock().front().map(|entry| entry.prompt.clone())
    }

    /// Remove the head entry, write `response` onto its payload, and resume
    /// the owner. Returns the resolved prompt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPendingPrompt`] if the queue is empty.
    pub fn resolve(&self, response: Value) -> Result<Prompt> {
        let entry = self
            .inner
            .lock()
            .pop_front()
            .ok_or(Error::NoPendingPrompt)?;

        let mut prompt = entry.prompt;
        prompt.response = Some(response);

        // The owner may have been dropped (task tree torn down); resolution
        // still counts as consuming the entry.
        if entry.tx.send(prompt.clone()).is_err() {
            tracing::warn!(message = %prompt.message, "prompt owner gone before resolution");
        }

        Ok(prompt)
    }

    /// Number of pending prompts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no prompts are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for PromptQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptQueue")
            .field("pending", &self.len())
            .finish()
    }
}
