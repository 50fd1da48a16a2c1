use crate::attachments::UPLOADS_ROUTE;
use crate::config::Listener as ListenerConfig;
use crate::errors::{IntakeError, SUCCESS_TEXT};
use crate::form::read_form;
use crate::handler::SubmissionHandler;
use crate::metrics_defs::SUBMISSIONS;
use crate::origin::request_origin;
use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use shared::admin_service::Readiness;
use shared::counter;
use std::io;
use std::sync::Arc;
use tokio::fs::File;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use url::Url;

#[derive(Clone)]
pub struct AppState {
    pub handler: SubmissionHandler,
    pub max_files: usize,
    pub public_base_url: Option<Arc<Url>>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/submit", post(submit))
        .route(&format!("{UPLOADS_ROUTE}/{{name}}"), get(download))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Binds the public listener and serves `app`, marking the service ready once bound.
pub async fn serve(listener: &ListenerConfig, app: Router, readiness: Readiness) -> io::Result<()> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Accepting submissions");

    readiness.set_ready(true);
    let result = axum::serve(listener, app).await;
    readiness.set_ready(false);
    result
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, IntakeError> {
    let result: Result<(), IntakeError> = async {
        let mut multipart = multipart.map_err(|e| IntakeError::MalformedForm(e.body_text()))?;
        let origin = request_origin(&headers, state.public_base_url.as_deref());
        let (submission, attachments) = read_form(
            &mut multipart,
            state.handler.store(),
            &origin,
            state.max_files,
        )
        .await?;
        state.handler.process(submission, attachments).await
    }
    .await;

    match result {
        Ok(()) => {
            counter!(SUBMISSIONS, "outcome" => "sent").increment(1);
            Ok(SUCCESS_TEXT)
        }
        Err(e) => {
            counter!(SUBMISSIONS, "outcome" => e.outcome()).increment(1);
            if e.status().is_server_error() {
                tracing::error!(error = %e, "Failed to relay submission");
            } else {
                tracing::warn!(error = %e, "Rejected submission");
            }
            Err(e)
        }
    }
}

async fn download(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(path) = state.handler.store().resolve(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to open upload");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}
