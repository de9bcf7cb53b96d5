#![forbid(unsafe_code)]

use std::{env, net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use intake_adapter::{IntakeRuntime, SubmissionStatus};
use intake_contracts::schema::FormKind;
use intake_contracts::submission::SubmissionResult;
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("INTAKE_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime = Arc::new(IntakeRuntime::from_env());
    if !runtime.provider_configured() {
        eprintln!(
            "intake_http warning: INTAKE_EMAIL_API_KEY is unset, submissions will fail at dispatch"
        );
    }

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/contact", post(submit_contact))
        .route("/api/request-data", post(submit_data_request))
        .with_state(runtime.clone());

    println!(
        "intake_http listening on http://{addr} (default_language={} provider_configured={})",
        runtime.default_language().as_str(),
        runtime.provider_configured()
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    provider_configured: bool,
    default_language: &'static str,
}

async fn healthz(State(runtime): State<Arc<IntakeRuntime>>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            provider_configured: runtime.provider_configured(),
            default_language: runtime.default_language().as_str(),
        }),
    )
}

async fn submit_contact(
    State(runtime): State<Arc<IntakeRuntime>>,
    body: String,
) -> (StatusCode, Json<SubmissionResult>) {
    submit(&runtime, FormKind::Contact, &body)
}

async fn submit_data_request(
    State(runtime): State<Arc<IntakeRuntime>>,
    body: String,
) -> (StatusCode, Json<SubmissionResult>) {
    submit(&runtime, FormKind::DataRequest, &body)
}

// The body arrives as a raw string so malformed JSON reaches the
// pipeline and comes back in the one response shape clients parse,
// instead of the extractor's plain-text 400.
fn submit(
    runtime: &IntakeRuntime,
    form: FormKind,
    body: &str,
) -> (StatusCode, Json<SubmissionResult>) {
    let (status, result) = runtime.handle_submission(form, body);
    let code = match status {
        SubmissionStatus::Ok => StatusCode::OK,
        SubmissionStatus::BadRequest => StatusCode::BAD_REQUEST,
        SubmissionStatus::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(result))
}
