use axum::{
  extract::{Path, State, WebSocketUpgrade},
  http::{Method, StatusCode},
  response::{IntoResponse, Response},
  routing::{delete, get},
  Json, Router,
};
use serde::{Deserialize, Serialize};
use snake_grid_server::config::ServerConfig;
use snake_grid_server::session::registry::SessionRegistry;
use snake_grid_server::session::{SessionError, SessionSummary};
use snake_grid_server::transport::ws_session::handle_socket;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct OkResponse {
  ok: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
  ok: bool,
  error: String,
}

#[derive(Debug, Serialize)]
struct LobbyResponse {
  sessions: Vec<SessionSummary>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
  session_id: String,
  rows: Option<i32>,
  cols: Option<i32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let config = ServerConfig::from_env()?;
  let registry = Arc::new(SessionRegistry::new(config.world, config.tick_interval));
  if let Some(name) = &config.default_session {
    registry.create(name, None, None)?;
  }

  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET, Method::POST, Method::DELETE])
    .allow_headers(Any);

  let app: Router = Router::new()
    .route("/api/health", get(health))
    .route("/api/sessions", get(sessions_list).post(sessions_create))
    .route("/api/sessions/:session", delete(sessions_destroy))
    .route("/ws", get(ws_handler))
    .layer(cors)
    .with_state(Arc::clone(&registry));

  let address = format!("0.0.0.0:{}", config.port);
  tracing::info!(
    tick_ms = config.tick_interval.as_millis() as u64,
    rows = config.world.rows,
    cols = config.world.cols,
    "listening on {address}"
  );

  let listener = tokio::net::TcpListener::bind(&address).await?;
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  registry.shutdown_all().await;
  tracing::info!("server stopped");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(error) = tokio::signal::ctrl_c().await {
      tracing::warn!(%error, "failed to listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
      }
      Err(error) => {
        tracing::warn!(%error, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  tracing::info!("shutdown signal received");
}

async fn health() -> impl IntoResponse {
  Json(OkResponse { ok: true })
}

async fn sessions_list(State(registry): State<Arc<SessionRegistry>>) -> impl IntoResponse {
  Json(LobbyResponse {
    sessions: registry.list(),
  })
}

async fn sessions_create(
  State(registry): State<Arc<SessionRegistry>>,
  payload: Result<Json<CreateSessionRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
  let Ok(Json(payload)) = payload else {
    return error_response(StatusCode::BAD_REQUEST, "Invalid JSON".to_string());
  };
  match registry.create(&payload.session_id, payload.rows, payload.cols) {
    Ok(session) => (StatusCode::CREATED, Json(session.summary())).into_response(),
    Err(error) => session_error_response(error),
  }
}

async fn sessions_destroy(
  State(registry): State<Arc<SessionRegistry>>,
  Path(session): Path<String>,
) -> Response {
  match registry.destroy(&session).await {
    Ok(()) => Json(OkResponse { ok: true }).into_response(),
    Err(error) => session_error_response(error),
  }
}

async fn ws_handler(
  ws: WebSocketUpgrade,
  State(registry): State<Arc<SessionRegistry>>,
) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

fn session_error_response(error: SessionError) -> Response {
  let status = match &error {
    SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
    SessionError::AlreadyExists(_) | SessionError::Register(_) => StatusCode::CONFLICT,
    SessionError::Invalid(_) => StatusCode::BAD_REQUEST,
    SessionError::Closed(_) => StatusCode::GONE,
  };
  error_response(status, error.to_string())
}

fn error_response(status: StatusCode, error: String) -> Response {
  (status, Json(ErrorResponse { ok: false, error })).into_response()
}
