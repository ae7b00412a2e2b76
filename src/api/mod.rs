//! HTTP surface for the prompt queue.
//!
//! Exposes the pending-prompt head for polling and accepts human responses.
//! A failed request never takes the process down; errors come back as
//! structured JSON with 4xx status codes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::core::{Error, Prompt, PromptQueue};

/// Shared application state.
pub struct AppState {
    /// The prompt queue served by this process.
    pub queue: Arc<PromptQueue>,

    /// API token for authentication (if configured).
    pub token: Option<String>,
}

type SharedState = Arc<AppState>;

/// `OpenAPI` documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cassi API",
        description = "HTTP surface for pending human-approval prompts",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(health, get_prompt, resolve_prompt),
    components(schemas(Prompt, crate::core::prompt::ResponseShape, ResolveRequest))
)]
struct ApiDoc;

/// Authentication middleware.
///
/// Validates the `Authorization: Bearer <token>` header if a token is
/// configured.
async fn auth_middleware(
    State(state): State<SharedState>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    // If no token configured, allow all requests (localhost-only mode)
    let Some(ref expected_token) = state.token else {
        return next.run(request).await;
    };

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match auth_header {
        Some(token) if token == expected_token => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "Missing or invalid Authorization header. Use: Bearer <token>"
            })),
        )
            .into_response(),
    }
}

/// Build the router over shared state.
pub fn router(state: SharedState) -> Router {
    let protected_routes = Router::new()
        .route("/prompt", get(get_prompt).post(resolve_prompt))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public_routes = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP API server over an existing prompt queue.
///
/// # Errors
///
/// Returns an error if the server fails to bind or start.
pub async fn serve(
    host: &str,
    port: u16,
    queue: Arc<PromptQueue>,
    token: Option<String>,
) -> anyhow::Result<()> {
    let auth_enabled = token.is_some();
    let state: SharedState = Arc::new(AppState { queue, token });
    let app = router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if auth_enabled {
        tracing::info!(addr = %addr, "starting HTTP API server (auth enabled)");
    } else {
        tracing::warn!(addr = %addr, "starting HTTP API server (NO AUTH - localhost only recommended)");
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service healthy", body = String))
)]
async fn health() -> &'static str {
    "ok"
}

/// Request body for resolving the head prompt.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ResolveRequest {
    /// The human's response value.
    pub response: Option<serde_json::Value>,
}

/// Structured error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

fn bad_request(error: &Error) -> (StatusCode, Json<ErrorBody>) {
    let name = match error {
        Error::NoPendingPrompt => "no_pending_prompt",
        Error::MissingResponse => "missing_response",
        _ => "bad_request",
    };
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: name.to_string(),
            message: error.to_string(),
        }),
    )
}

/// Peek the head of the prompt queue without removing it.
#[utoipa::path(
    get,
    path = "/prompt",
    responses((status = 200, description = "Head prompt, or null when none pending", body = Option<Prompt>))
)]
async fn get_prompt(State(state): State<SharedState>) -> Json<Option<Prompt>> {
    Json(state.queue.peek())
}

/// Resolve the head prompt with a human response.
#[utoipa::path(
    post,
    path = "/prompt",
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Prompt resolved", body = Prompt),
        (status = 400, description = "No pending prompt, or missing response field")
    )
)]
async fn resolve_prompt(
    State(state): State<SharedState>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<Prompt>, (StatusCode, Json<ErrorBody>)> {
    let Some(response) = req.response else {
        return Err(bad_request(&Error::MissingResponse));
    };

    let resolved = state
        .queue
        .resolve(response)
        .map_err(|e| bad_request(&e))?;

    Ok(Json(resolved))
}
