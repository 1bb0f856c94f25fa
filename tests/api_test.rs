//! HTTP tests for the puzzle and free-play endpoints.
//!
//! Each test starts its own server in-process on an ephemeral port.

mod common;

use chess_puzzler::{ProgressRepository, UserProgress, PROGRESS_KEY};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use common::{client, get_json, spawn_server, spawn_server_with, wait_for_state, TestServer};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn post(client: &Client, server: &TestServer, path: &str, body: Value) -> reqwest::Response {
    client
        .post(server.url(path))
        .json(&body)
        .send()
        .await
        .expect("POST failed")
}

async fn play(client: &Client, server: &TestServer, from: &str, to: &str) -> reqwest::Response {
    post(client, server, "/api/puzzles/move", json!({ "from": from, "to": to })).await
}

async fn play_ok(client: &Client, server: &TestServer, from: &str, to: &str) -> Value {
    let resp = play(client, server, from, to).await;
    assert_eq!(resp.status(), StatusCode::OK, "move {from}{to} refused");
    resp.json().await.unwrap()
}

async fn detail(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["detail"].as_str().unwrap_or_default().to_string()
}

fn progress(rating: i32, solved: &[&str]) -> UserProgress {
    UserProgress {
        rating,
        solved: solved.iter().map(|s| s.to_string()).collect(),
        ..UserProgress::default()
    }
}

// ---------------------------------------------------------------------------
// Puzzle training
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health() {
    let server = spawn_server().await;
    let body = get_json(&client(), &server.url("/health")).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "local");
    assert_eq!(body["stockfish"], false);
    assert!(body["puzzles"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_next_puzzle_hides_solution() {
    let server = spawn_server().await;
    let body = get_json(&client(), &server.url("/api/puzzles/next")).await;

    assert_eq!(body["exhausted"], false);
    assert_eq!(body["state"], "awaiting_user_move");
    assert_eq!(body["puzzle"]["id"], "scholar-mate-in-one");
    assert_eq!(body["puzzle"]["solution_length"], 1);
    assert!(body["puzzle"].get("moves").is_none());
    assert_eq!(body["human_color"], "w");
    assert_eq!(body["level"]["id"], "iniciante_1");
    assert_eq!(body["status"]["current_move_index"], -1);
}

#[tokio::test]
async fn test_fail_retry_then_solve() {
    let server = spawn_server().await;
    let client = client();
    get_json(&client, &server.url("/api/puzzles/next")).await;

    let failed = play_ok(&client, &server, "c4", "f7").await;
    assert_eq!(failed["result"], "failed");
    assert_eq!(failed["expected"], "h5f7");
    assert_eq!(failed["rating_change"], -5);
    assert_eq!(failed["progress"]["rating"], 595);
    assert_eq!(failed["pending"]["action"], "retry_puzzle");

    let retried = wait_for_state(&server, &client, "awaiting_user_move").await;
    assert_eq!(retried["puzzle"]["id"], "scholar-mate-in-one");
    assert_eq!(retried["status"]["move_history"], json!([]));

    let solved = play_ok(&client, &server, "h5", "f7").await;
    assert_eq!(solved["result"], "solved");
    assert_eq!(solved["move"]["san"], "Qxf7#");
    assert_eq!(solved["rating_change"], 10);
    assert_eq!(solved["progress"]["rating"], 605);
    assert_eq!(solved["progress"]["currentStreak"], 1);

    let stored = server.repo.load(PROGRESS_KEY).unwrap().expect("progress saved");
    let stored: Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored["rating"], 605);
    assert_eq!(stored["solvedPuzzles"], json!(["scholar-mate-in-one"]));

    let next = wait_for_state(&server, &client, "awaiting_user_move").await;
    assert_eq!(next["puzzle"]["id"], "free-center-pawn");
}

#[tokio::test]
async fn test_stored_cursor_follows_next_puzzle() {
    let server = spawn_server().await;
    let client = client();
    get_json(&client, &server.url("/api/puzzles/next")).await;

    play_ok(&client, &server, "h5", "f7").await;
    wait_for_state(&server, &client, "awaiting_user_move").await;

    // The transition's save happens after it releases the engine
    let mut stored = Value::Null;
    for _ in 0..100 {
        if let Some(raw) = server.repo.load(PROGRESS_KEY).unwrap() {
            stored = serde_json::from_str(&raw).unwrap();
            if stored["currentPuzzleIndex"] == 1 {
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(stored["currentPuzzleIndex"], 1);
    assert_eq!(stored["currentLevel"], "iniciante_1");

    // Nothing older overwrites it afterwards
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let raw = server.repo.load(PROGRESS_KEY).unwrap().unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["currentPuzzleIndex"], 1);
}

#[tokio::test]
async fn test_computer_plays_opening_ply() {
    let server = spawn_server_with(progress(600, &["scholar-mate-in-one", "free-center-pawn"])).await;
    let client = client();

    let body = get_json(&client, &server.url("/api/puzzles/next")).await;
    assert_eq!(body["puzzle"]["id"], "scholar-punished");
    assert_eq!(body["status"]["move_history"][0]["san"], "Nf6");
    assert_eq!(body["status"]["turn"], "w");

    let solved = play_ok(&client, &server, "h5", "f7").await;
    assert_eq!(solved["result"], "solved");
    assert_eq!(solved["status"]["is_checkmate"], true);
}

#[tokio::test]
async fn test_multi_move_line_waits_for_reply() {
    let server = spawn_server_with(progress(1000, &[])).await;
    let client = client();

    let body = get_json(&client, &server.url("/api/puzzles/next")).await;
    assert_eq!(body["puzzle"]["id"], "doubled-rooks-back-rank");
    assert_eq!(body["level"]["id"], "iniciante_2");

    let first = play_ok(&client, &server, "e2", "e8").await;
    assert_eq!(first["result"], "continue");
    assert_eq!(first["pending"]["action"], "opponent_reply");

    let after_reply = wait_for_state(&server, &client, "awaiting_user_move").await;
    assert_eq!(after_reply["status"]["move_history"].as_array().unwrap().len(), 3);
    assert_eq!(after_reply["status"]["move_history"][2]["uci"], "b8e8");

    let solved = play_ok(&client, &server, "e1", "e8").await;
    assert_eq!(solved["result"], "solved");
    assert_eq!(solved["status"]["is_checkmate"], true);
}

#[tokio::test]
async fn test_rejected_moves() {
    let server = spawn_server().await;
    let client = client();

    let resp = play(&client, &server, "e2", "e4").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(resp).await, "No puzzle is loaded");

    get_json(&client, &server.url("/api/puzzles/next")).await;

    let resp = play(&client, &server, "e1", "e3").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(resp).await, "Illegal move");

    let resp = play(&client, &server, "z9", "e4").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let progress = get_json(&client, &server.url("/api/puzzles/progress")).await;
    assert_eq!(progress["rating"], 600);
}

#[tokio::test]
async fn test_history_review_blocks_moves() {
    let server = spawn_server_with(progress(1000, &[])).await;
    let client = client();
    get_json(&client, &server.url("/api/puzzles/next")).await;

    let resp = post(&client, &server, "/api/puzzles/navigate", json!({ "target": "start" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"]["current_move_index"], -1);

    let resp = play(&client, &server, "e2", "e8").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(resp).await, "Return to the latest position to move");

    post(&client, &server, "/api/puzzles/navigate", json!({ "target": "end" })).await;
    let body = play_ok(&client, &server, "e2", "e8").await;
    assert_eq!(body["result"], "continue");
}

#[tokio::test]
async fn test_level_and_reset() {
    let server = spawn_server_with(progress(650, &["scholar-mate-in-one"])).await;
    let client = client();
    get_json(&client, &server.url("/api/puzzles/next")).await;

    let level = get_json(&client, &server.url("/api/puzzles/level")).await;
    assert_eq!(level["id"], "iniciante_1");
    assert_eq!(level["rating_min"], 0);
    assert_eq!(level["rating_max"], 800);
    assert_eq!(level["total_puzzles"], 3);
    assert_eq!(level["solved"], 1);

    let resp = post(&client, &server, "/api/puzzles/reset", json!({})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["progress"]["rating"], 600);
    assert_eq!(body["progress"]["solvedPuzzles"], json!([]));

    let status = get_json(&client, &server.url("/api/puzzles/status")).await;
    assert_eq!(status["state"], "idle");
    assert!(status["puzzle"].is_null());

    let stored = server.repo.load(PROGRESS_KEY).unwrap().unwrap();
    assert!(stored.contains("\"rating\":600"));
}

#[tokio::test]
async fn test_exhausted_catalog() {
    let all = [
        "scholar-mate-in-one",
        "free-center-pawn",
        "scholar-punished",
        "doubled-rooks-back-rank",
        "central-break",
        "fools-mate-finish",
        "promotion-run",
    ];
    let server = spawn_server_with(progress(600, &all)).await;
    let body = get_json(&client(), &server.url("/api/puzzles/next")).await;
    assert_eq!(body["exhausted"], true);
    assert_eq!(body["state"], "exhausted");
    assert!(body["puzzle"].is_null());
}

// ---------------------------------------------------------------------------
// Free play
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_free_play_moves_and_navigation() {
    let server = spawn_server().await;
    let client = client();

    let status = get_json(&client, &server.url("/api/game/status")).await;
    assert_eq!(status["turn"], "w");
    assert_eq!(status["is_game_over"], false);

    let resp = post(&client, &server, "/api/game/move", json!({ "from": "e2", "to": "e4" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["move"]["san"], "e4");
    assert_eq!(body["status"]["current_move_index"], 0);

    let resp = post(&client, &server, "/api/game/move", json!({ "from": "e4", "to": "e6" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = post(&client, &server, "/api/game/navigate", json!({ "target": "previous" })).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["current_move_index"], -1);
    assert_eq!(body["move_history"].as_array().unwrap().len(), 1);

    // Branch from the start position
    let resp = post(&client, &server, "/api/game/move", json!({ "from": "d2", "to": "d4" })).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"]["move_history"].as_array().unwrap().len(), 1);
    assert_eq!(body["status"]["move_history"][0]["san"], "d4");

    let resp = post(&client, &server, "/api/game/reset", json!({})).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["move_history"], json!([]));
}

#[tokio::test]
async fn test_free_play_load_position() {
    let server = spawn_server().await;
    let client = client();

    let resp = post(&client, &server, "/api/game/load", json!({ "fen": "not a fen" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let fen = "8/8/4k3/8/8/3K4/8/8 w - - 0 1";
    let resp = post(&client, &server, "/api/game/load", json!({ "fen": fen })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["fen"], fen);
    assert_eq!(body["is_insufficient_material"], true);
    assert_eq!(body["is_game_over"], true);

    let resp = post(&client, &server, "/api/game/move", json!({ "from": "d3", "to": "d4" })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(resp).await, "Game is over");
}

#[tokio::test]
async fn test_free_play_legal_move_hints() {
    let server = spawn_server().await;
    let client = client();

    let body = get_json(&client, &server.url("/api/game/legal-moves")).await;
    assert_eq!(body["moves"].as_array().unwrap().len(), 20);

    let body = get_json(&client, &server.url("/api/game/legal-moves?from=e2")).await;
    let targets: Vec<&str> = body["moves"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["to"].as_str().unwrap())
        .collect();
    assert_eq!(targets.len(), 2);
    assert!(targets.contains(&"e3") && targets.contains(&"e4"));

    let resp = client
        .get(server.url("/api/game/legal-moves?from=j9"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_computer_move_without_engine() {
    let server = spawn_server().await;
    let client = client();

    let resp = post(&client, &server, "/api/game/computer-move", json!({ "difficulty": 30 })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = post(&client, &server, "/api/game/computer-move", json!({ "difficulty": 5 })).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(detail(resp).await, "No engine configured");
}
