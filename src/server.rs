use std::sync::Arc;
use axum::{routing::{get, post}, Router, Json};
use axum::extract::{Query, State};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use tower_http::cors::{CorsLayer, Any};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use crate::construct::FactVector;
use crate::error::{Result, SfiError};
use crate::interface::{Envelope, FactInterface};
use crate::query::QueryCriteria;

#[derive(Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Deserialize)]
pub struct FilterRequest {
    pub criteria: QueryCriteria,
    #[serde(default)]
    pub details: bool,
}

// The vector stays raw JSON until the handler runs, so a malformed one is
// reported as an invalid vector in the usual envelope.
#[derive(Deserialize)]
pub struct DecodeRequest {
    pub vector: serde_json::Value,
}

fn vector_from(value: serde_json::Value) -> Result<FactVector> {
    match value {
        serde_json::Value::String(s) => s.parse(),
        other => serde_json::from_value(other)
            .map_err(|e| SfiError::InvalidVector(e.to_string())),
    }
}

#[derive(Deserialize)]
pub struct LookupRequest {
    pub category: Option<String>,
    pub value: Option<String>,
    pub prime: Option<u64>,
}

#[derive(Clone)]
struct AppState {
    interface: Arc<FactInterface>,
    default_count: usize,
}

pub fn status_of(e: &SfiError) -> StatusCode {
    match e {
        SfiError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_user_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Unreadable bodies and query strings get the same envelope as errors from the core.
fn rejected<T: Serialize>(rejection: impl std::fmt::Display) -> (StatusCode, Json<Envelope<T>>) {
    let e = SfiError::InvalidParameter(rejection.to_string());
    warn!(error = %e, "request rejected");
    (status_of(&e), Json(Envelope::from_result(Err(e))))
}

// The core is synchronous, so every request runs on a blocking thread.
async fn run<T, F>(state: AppState, operation: &'static str, work: F) -> (StatusCode, Json<Envelope<T>>)
where
    T: Serialize + Send + 'static,
    F: FnOnce(&FactInterface) -> Result<T> + Send + 'static,
{
    let started = std::time::Instant::now();
    let interface = Arc::clone(&state.interface);
    let outcome = tokio::task::spawn_blocking(move || work(&interface))
        .await
        .unwrap_or_else(|e| Err(SfiError::Lock(format!("worker failed: {e}"))));
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let status = match &outcome {
        Ok(_) => {
            info!(operation, ms = elapsed_ms, "request complete");
            StatusCode::OK
        }
        Err(e) => {
            let status = status_of(e);
            if e.is_fatal() {
                error!(operation, error = %e, "request hit a broken invariant");
            } else {
                warn!(operation, error = %e, code = %status.as_u16(), "request failed");
            }
            status
        }
    };
    (status, Json(Envelope::from_result(outcome)))
}

pub fn router(interface: Arc<FactInterface>, default_count: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);
    let state = AppState { interface, default_count };
    Router::new()
        .route("/primes", get(|State(state): State<AppState>| async move {
            run(state, "primes", |iface| iface.list_primes()).await
        }))
        .route("/generate", post(|State(state): State<AppState>, payload: std::result::Result<Json<GenerateRequest>, JsonRejection>| async move {
            let Json(req) = match payload {
                Ok(payload) => payload,
                Err(rejection) => return rejected(rejection),
            };
            let count = req.count.unwrap_or(state.default_count);
            run(state, "generate", move |iface| iface.generate(count, req.seed)).await
        }))
        .route("/filter", post(|State(state): State<AppState>, payload: std::result::Result<Json<FilterRequest>, JsonRejection>| async move {
            let Json(req) = match payload {
                Ok(payload) => payload,
                Err(rejection) => return rejected(rejection),
            };
            run(state, "filter", move |iface| iface.filter(&req.criteria, req.details)).await
        }))
        .route("/decode", post(|State(state): State<AppState>, payload: std::result::Result<Json<DecodeRequest>, JsonRejection>| async move {
            let Json(req) = match payload {
                Ok(payload) => payload,
                Err(rejection) => return rejected(rejection),
            };
            run(state, "decode", move |iface| iface.decode(&vector_from(req.vector)?)).await
        }))
        .route("/lookup", get(|State(state): State<AppState>, query: std::result::Result<Query<LookupRequest>, QueryRejection>| async move {
            let Query(req) = match query {
                Ok(query) => query,
                Err(rejection) => return rejected(rejection),
            };
            run(state, "lookup", move |iface| match (req.prime, req.category, req.value) {
                (Some(prime), _, _) => iface.lookup_prime(prime),
                (None, Some(category), Some(value)) => iface.lookup_value(&category, &value),
                _ => Err(SfiError::InvalidParameter(
                    "give either a prime, or both a category and a value".into(),
                )),
            }).await
        }))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(interface: Arc<FactInterface>, bind: &str, default_count: usize) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| SfiError::Config(format!("cannot bind {bind}: {e}")))?;
    info!(%bind, "listening");
    axum::serve(listener, router(interface, default_count))
        .await
        .map_err(|e| SfiError::Config(format!("server stopped: {e}")))
}
