use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dialogrs_config::ServerConfig;
use dialogrs_core::{DialogError, DialogRequest, DialogResponse, Dispatcher, ErrorBody};
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

/// A protocol failure rendered as `{ error, message }`.
#[derive(Debug)]
pub struct ApiError(pub DialogError);

impl From<DialogError> for ApiError {
    fn from(err: DialogError) -> Self {
        Self(err)
    }
}

#[must_use]
pub const fn status_for(err: &DialogError) -> StatusCode {
    match err {
        DialogError::UnknownMethod(_) | DialogError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        DialogError::DialogNotFound(_) | DialogError::InstanceNotFound(_) => StatusCode::NOT_FOUND,
        DialogError::InvalidTransition(_) => StatusCode::CONFLICT,
        DialogError::HandlerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!("Dialog request failed: {}", self.0);
        } else {
            info!("Dialog request rejected: {}", self.0);
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

/// Routes of the dialog engine.
pub fn router(dispatcher: Arc<Dispatcher>, cors: bool) -> Router {
    let router = Router::new()
        .route("/dialogs", post(dialogs))
        .route("/test", get(test))
        .with_state(AppState { dispatcher })
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(cors_layer())
    } else {
        router
    }
}

pub async fn serve(dispatcher: Arc<Dispatcher>, config: &ServerConfig) -> anyhow::Result<()> {
    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        "Serving dialogs {:?} on http://{address}",
        dispatcher.registry().names()
    );

    axum::serve(listener, router(dispatcher, config.cors)).await?;
    Ok(())
}

/// POST /dialogs
///
/// Body is an `activate` or `tryMatch` request selected by `method`.
async fn dialogs(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DialogResponse>, ApiError> {
    let Json(body) = body.map_err(|e| DialogError::InvalidRequest(e.body_text()))?;
    let request = DialogRequest::from_value(body)?;
    info!("{} {}", request.method(), request.name());

    let response = state.dispatcher.dispatch(request).await?;
    debug!("Dialog response: {response:?}");
    Ok(Json(response))
}

/// GET /test
async fn test() -> &'static str {
    "working!"
}
