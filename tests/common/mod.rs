//! Shared helpers: an in-process server on an ephemeral port.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chess_puzzler::{
    MemoryRepository, Pacing, ProgressStore, PuzzleCatalog, PuzzleEngine, UserProgress,
};
use reqwest::Client;
use serde_json::Value;
use server::db::progress::ProgressBackend;
use server::routes;
use server::state::AppState;

pub struct TestServer {
    pub base_url: String,
    pub repo: Arc<MemoryRepository>,
}

impl TestServer {
    /// Build a URL for an API endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Fast delays so scheduled transitions land within a test.
pub fn test_pacing() -> Pacing {
    Pacing {
        opponent_reply: Duration::from_millis(20),
        next_puzzle: Duration::from_millis(20),
        retry: Duration::from_millis(20),
    }
}

/// Start the full router on 127.0.0.1 with the bundled catalog, in-memory
/// progress storage and no Stockfish.
pub async fn spawn_server() -> TestServer {
    spawn_server_with(UserProgress::default()).await
}

pub async fn spawn_server_with(progress: UserProgress) -> TestServer {
    let repo = Arc::new(MemoryRepository::new());
    let catalog = Arc::new(PuzzleCatalog::bundled().expect("bundled catalog"));
    let trainer: PuzzleEngine =
        PuzzleEngine::new(catalog, ProgressStore::new(progress)).with_pacing(test_pacing());
    let backend = ProgressBackend::Local(repo.clone());
    let state = AppState::new(trainer, backend, chess_puzzler::PROGRESS_KEY, None);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, routes::router(state))
            .await
            .expect("test server crashed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        repo,
    }
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

pub async fn get_json(client: &Client, url: &str) -> Value {
    client
        .get(url)
        .send()
        .await
        .expect("GET failed")
        .json()
        .await
        .expect("GET returned invalid JSON")
}

/// Poll the puzzle status until `state` shows up or two seconds pass.
pub async fn wait_for_state(server: &TestServer, client: &Client, state: &str) -> Value {
    let mut last = Value::Null;
    for _ in 0..100 {
        last = get_json(client, &server.url("/api/puzzles/status")).await;
        if last["state"] == state {
            return last;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for state {state}; last status: {last}");
}
