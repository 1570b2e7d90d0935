use std::sync::Arc;

use calmquest_server::rewards::mock::{MemoryStore, RecordingNotifier};
use calmquest_server::rewards::RewardLedger;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::{Client, LocalRequest};
use rocket::serde::json::{json, Value};

async fn client() -> Client {
    let store = Arc::new(MemoryStore::default());
    let ledger = RewardLedger::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(RecordingNotifier::default()),
    );
    let rocket = rocket::build().manage(ledger).attach(super::stage());
    Client::tracked(rocket)
        .await
        .expect("valid rocket instance")
}

fn as_parent(request: LocalRequest<'_>) -> LocalRequest<'_> {
    request
        .header(Header::new("x-user-id", "parent-1"))
        .header(Header::new("x-user-role", "parent"))
}

async fn complete_game(client: &Client, body: Value) -> (Status, Value) {
    let response = as_parent(client.post("/api/parent/game/complete"))
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await;
    let status = response.status();
    let value = response.into_json::<Value>().await.expect("json body");
    (status, value)
}

async fn unlock_replay(client: &Client, game_id: &str) -> (Status, Value) {
    let response = as_parent(client.post(format!("/api/parent/game/unlock-replay/{game_id}")))
        .dispatch()
        .await;
    let status = response.status();
    let value = response.into_json::<Value>().await.expect("json body");
    (status, value)
}

#[rocket::async_test]
async fn complete_game_credits_and_reports_the_award() {
    let client = client().await;

    let (status, body) = complete_game(
        &client,
        json!({ "gameId": "parent-education-30", "gameIndex": 30, "totalLevels": 5, "score": 5 }),
    )
    .await;

    assert_eq!(status, Status::Ok);
    assert_eq!(body["success"], true);
    assert_eq!(body["calmCoinsEarned"], 10);
    assert_eq!(body["newBalance"], 10);
    assert_eq!(body["fullyCompleted"], true);
    assert_eq!(body["allAnswersCorrect"], true);
    assert_eq!(body["replayUnlocked"], false);
    assert_eq!(body["totalLevels"], 5);
}

#[rocket::async_test]
async fn client_completion_claims_are_ignored() {
    let client = client().await;

    // The isFullCompletion flag older clients send carries no weight,
    // completion is derived from the score alone
    let (status, body) = complete_game(
        &client,
        json!({
            "gameId": "parent-education-7",
            "totalLevels": 5,
            "score": 3,
            "isFullCompletion": true
        }),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["calmCoinsEarned"], 0);
    assert_eq!(body["fullyCompleted"], false);

    let (status, body) = complete_game(
        &client,
        json!({
            "gameId": "parent-education-8",
            "totalLevels": 5,
            "score": 5,
            "isFullCompletion": false
        }),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["calmCoinsEarned"], 5);
    assert_eq!(body["fullyCompleted"], true);
}

#[rocket::async_test]
async fn missing_session_headers_are_rejected() {
    let client = client().await;

    let response = client
        .post("/api/parent/game/complete")
        .header(ContentType::JSON)
        .body(json!({ "gameId": "parent-education-7", "totalLevels": 5 }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Forbidden);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "a parent session is required");
}

#[rocket::async_test]
async fn child_sessions_cannot_complete_games() {
    let client = client().await;

    let response = client
        .post("/api/parent/game/complete")
        .header(ContentType::JSON)
        .header(Header::new("x-user-id", "child-1"))
        .header(Header::new("x-user-role", "child"))
        .body(json!({ "gameId": "parent-education-7", "totalLevels": 5, "score": 5 }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Forbidden);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().expect("error text").contains("parents"));
}

#[rocket::async_test]
async fn wrong_total_levels_reports_the_received_value() {
    let client = client().await;

    let (status, body) = complete_game(
        &client,
        json!({ "gameId": "parent-education-7", "totalLevels": 4, "score": 4 }),
    )
    .await;

    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["success"], false);
    assert_eq!(body["received"], 4);
}

#[rocket::async_test]
async fn foreign_game_types_report_the_received_value() {
    let client = client().await;

    let (status, body) = complete_game(
        &client,
        json!({
            "gameId": "math-blitz-4",
            "gameType": "math-blitz",
            "totalLevels": 5,
            "score": 5
        }),
    )
    .await;

    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["success"], false);
    assert_eq!(body["received"], "math-blitz");
}

#[rocket::async_test]
async fn malformed_bodies_get_the_error_envelope() {
    let client = client().await;

    let response = as_parent(client.post("/api/parent/game/complete"))
        .header(ContentType::JSON)
        .body("not json")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["success"], false);

    // totalLevels is required at the wire level
    let response = as_parent(client.post("/api/parent/game/complete"))
        .header(ContentType::JSON)
        .body(json!({ "gameId": "parent-education-7" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["success"], false);
}

#[rocket::async_test]
async fn unlock_replay_end_to_end() {
    let client = client().await;

    complete_game(
        &client,
        json!({ "gameId": "parent-education-7", "totalLevels": 5, "score": 5 }),
    )
    .await;

    let (status, body) = unlock_replay(&client, "parent-education-7").await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["success"], true);
    assert_eq!(body["replayUnlocked"], true);
    assert_eq!(body["replayCost"], 2);
    assert_eq!(body["newBalance"], 3);
}

#[rocket::async_test]
async fn unlock_without_completion_is_not_found() {
    let client = client().await;

    let (status, body) = unlock_replay(&client, "parent-education-7").await;
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "no progress recorded for this game yet");
}

#[rocket::async_test]
async fn unlock_honors_an_explicit_game_index() {
    let client = client().await;

    // The id suffix is unparseable, only the query pins the tier
    complete_game(
        &client,
        json!({ "gameId": "parent-education-zen", "totalLevels": 5, "score": 5 }),
    )
    .await;

    let response = as_parent(
        client.post("/api/parent/game/unlock-replay/parent-education-zen?game_index=80"),
    )
    .dispatch()
    .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["required"], 8);
    assert_eq!(body["currentBalance"], 5);
}

#[rocket::async_test]
async fn insufficient_funds_report_the_shortfall() {
    let client = client().await;

    // A client supplied award of 1 coin leaves the wallet short of the
    // 2 coin replay price
    complete_game(
        &client,
        json!({ "gameId": "parent-education-3", "totalLevels": 5, "score": 5, "totalCoins": 1 }),
    )
    .await;

    let (status, body) = unlock_replay(&client, "parent-education-3").await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["success"], false);
    assert_eq!(body["required"], 2);
    assert_eq!(body["currentBalance"], 1);
}

#[rocket::async_test]
async fn progress_endpoint_returns_defaults() {
    let client = client().await;

    let response = as_parent(client.get("/api/parent/game/progress/parent-education-9"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["success"], true);
    assert_eq!(body["gameId"], "parent-education-9");
    assert_eq!(body["levelsCompleted"], 0);
    assert_eq!(body["totalLevels"], 5);
    assert_eq!(body["fullyCompleted"], false);
    assert_eq!(body["replayUnlocked"], false);
}

#[rocket::async_test]
async fn wallet_endpoint_lists_transactions() {
    let client = client().await;

    complete_game(
        &client,
        json!({ "gameId": "parent-education-7", "totalLevels": 5, "score": 5 }),
    )
    .await;
    unlock_replay(&client, "parent-education-7").await;

    let response = as_parent(client.get("/api/parent/wallet")).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["success"], true);
    assert_eq!(body["balance"], 3);
    let transactions = body["transactions"].as_array().expect("transactions");
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["kind"], "debit");
    assert_eq!(transactions[0]["amount"], 2);
    assert_eq!(transactions[1]["kind"], "credit");

    let response = as_parent(client.get("/api/parent/wallet?limit=1"))
        .dispatch()
        .await;
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["transactions"].as_array().expect("transactions").len(), 1);
}

#[rocket::async_test]
async fn unknown_routes_get_the_envelope() {
    let client = client().await;

    let response = client.get("/api/parent/nope").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["success"], false);
}

#[rocket::async_test]
async fn openapi_document_is_served() {
    let client = client().await;

    let response = client.get("/api-docs/openapi.json").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().await.expect("json body");
    assert!(body["paths"]["/api/parent/game/complete"].is_object());
}
