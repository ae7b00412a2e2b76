//! Model contract consumed by concrete task kinds.
//!
//! The core only requires that generation be awaitable and return text;
//! concrete providers live outside this crate and plug in through this
//! trait.

use super::error::Result;

/// A text generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model reference understood by the provider.
    pub model: String,
    /// System instructions, if any.
    pub system: Option<String>,
    /// The prompt or input payload.
    pub input: String,
}

impl GenerateRequest {
    /// A request with no system instructions.
    #[must_use]
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            input: input.into(),
        }
    }
}

/// Text generation backend.
#[async_trait::async_trait]
pub trait Model: Send + Sync {
    /// Generate text for the request.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::Error::Model`] on provider failure.
    async fn generate(&self, request: GenerateRequest) -> Result<String>;
}

/// Model double that returns a fixed response. Useful in tests and dry
/// runs.
#[derive(Debug, Clone)]
pub struct StaticModel {
    response: String,
}

impl StaticModel {
    /// A model that always answers with `response`.
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait::async_trait]
impl Model for StaticModel {
    async fn generate(&self, _request: GenerateRequest) -> Result<String> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_model_echoes_its_response() {
        let model = StaticModel::new("plan: do the thing");
        let out = model
            .generate(GenerateRequest::new("test-model", "request"))
            .await
            .unwrap();
        assert_eq!(out, "plan: do the thing");
    }
}
