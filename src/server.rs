use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::db::Repository;
use crate::digest::DigestSender;
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::ingest::Ingestor;

pub struct AppState {
    pub repo: Repository,
    pub fetcher: FeedFetcher,
    pub config: Config,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    success: bool,
    articles_found: i64,
    articles_filtered: i64,
    execution_log_id: i64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailRequest {
    user_id: String,
    #[serde(default)]
    is_test: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestEmailRequest {
    user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailResponse {
    success: bool,
    message: String,
    articles_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_id: Option<String>,
}

/// The dashboard calls these endpoints cross-origin, so CORS stays
/// permissive and pre-flight requests are answered for every route.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/process-rss", post(process_rss))
        .route("/send-email", post(send_email))
        .route("/test-email", post(test_email))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(state: SharedState, bind_addr: &str) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn error_response(error: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
        }),
    )
        .into_response()
}

async fn process_rss(State(state): State<SharedState>) -> Response {
    let ingestor = Ingestor::new(&state.repo, &state.fetcher);
    match ingestor.run().await {
        Ok(report) => Json(ProcessResponse {
            success: true,
            articles_found: report.articles_found,
            articles_filtered: report.articles_saved,
            execution_log_id: report.log_id,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Ingestion run failed: {}", e);
            error_response(e)
        }
    }
}

async fn send_email(
    State(state): State<SharedState>,
    Json(request): Json<EmailRequest>,
) -> Response {
    dispatch_email(state, request.user_id, request.is_test).await
}

async fn test_email(
    State(state): State<SharedState>,
    Json(request): Json<TestEmailRequest>,
) -> Response {
    dispatch_email(state, request.user_id, true).await
}

async fn dispatch_email(state: SharedState, user_id: String, is_test: bool) -> Response {
    let sender = DigestSender::new(&state.repo, &state.config);
    match sender.send(&user_id, is_test).await {
        Ok(outcome) => Json(EmailResponse {
            success: true,
            message: outcome.message,
            articles_count: outcome.articles_count,
            email_id: outcome.email_id,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Email send failed for {}: {}", user_id, e);
            error_response(e)
        }
    }
}
