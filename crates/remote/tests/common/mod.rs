//! In-process fake of the remote API, served by axum on `127.0.0.1:0`.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pixelfleet_core::canvas::{CHUNK_CELLS, CHUNK_SIZE};

/// Request bodies received by the fake mutation endpoint.
#[derive(Clone, Default)]
pub struct Recorded(pub Arc<Mutex<Vec<serde_json::Value>>>);

impl Recorded {
    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.0.lock().unwrap().clone()
    }
}

/// Serve `router` on an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A mutation endpoint that answers every request with `status` / `body`.
pub async fn pixel_server(status: StatusCode, body: &'static str) -> (String, Recorded) {
    let recorded = Recorded::default();
    let router: Router = Router::new()
        .route(
            "/api/pixel",
            post(
                move |State(rec): State<Recorded>, Json(payload): Json<serde_json::Value>| async move {
                    rec.0.lock().unwrap().push(payload);
                    (status, body)
                },
            ),
        )
        .with_state(recorded.clone());
    (serve(router).await, recorded)
}

/// Chunk `(0, 0)` exists with cell `(1, 2)` set to color 9; `(5, 5)` fails
/// with a 500; `(7, 7)` returns a truncated payload; everything else is 404.
pub async fn chunk_server() -> String {
    let router = Router::new().route("/api/chunk/{cx}/{cy}", get(chunk_handler));
    serve(router).await
}

async fn chunk_handler(Path((cx, cy)): Path<(i32, i32)>) -> Response {
    match (cx, cy) {
        (0, 0) => {
            let mut bytes = vec![0u8; CHUNK_CELLS];
            bytes[2 * CHUNK_SIZE as usize + 1] = 9;
            (StatusCode::OK, bytes).into_response()
        }
        (5, 5) => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        (7, 7) => (StatusCode::OK, vec![1u8; 3]).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A solver endpoint at `/token` answering with `status` / `body`.
pub async fn token_server(status: StatusCode, body: &'static str) -> String {
    let router = Router::new().route("/token", get(move || async move { (status, body) }));
    serve(router).await
}

/// A solver endpoint at `/token` that never answers.
pub async fn stalled_token_server() -> String {
    let router = Router::new().route(
        "/token",
        get(|| async {
            std::future::pending::<()>().await;
            "never"
        }),
    );
    serve(router).await
}

/// A base URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
