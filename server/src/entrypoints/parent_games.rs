use calmquest_server::auth::Session;
use calmquest_server::rewards::RewardLedger;
use rocket::{serde::json::Json, State};
use utoipa::OpenApi;

use super::types::{
    ApiError, CoinAwardResponse, CompleteGameRequest, ErrorBody, GameCompletionResponse,
    GameProgressResponse, ReplayUnlockResponse, TransactionResponse, WalletResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(complete_game, get_progress, unlock_replay, get_wallet),
    components(schemas(
        CompleteGameRequest,
        GameCompletionResponse,
        GameProgressResponse,
        CoinAwardResponse,
        ReplayUnlockResponse,
        WalletResponse,
        TransactionResponse,
        ErrorBody
    ))
)]
struct ApiDoc;

#[utoipa::path(context_path = "/api/parent", request_body = CompleteGameRequest, responses(
    (status = 200, description = "Record a finished run and credit any reward", body = GameCompletionResponse),
    (status = 400, description = "Validation failed", body = ErrorBody),
    (status = 403, description = "Not a parent session", body = ErrorBody)
))]
#[post("/game/complete", data = "<request>")]
async fn complete_game(
    session: Session,
    ledger: &State<RewardLedger>,
    request: Json<CompleteGameRequest>,
) -> Result<Json<GameCompletionResponse>, ApiError> {
    let completion = ledger
        .complete_game(&session, request.into_inner().into())
        .await?;
    Ok(Json(completion.into()))
}

#[utoipa::path(context_path = "/api/parent", responses(
    (status = 200, description = "Stored progress for one game, defaults when never played", body = GameProgressResponse),
    (status = 403, description = "Not a parent session", body = ErrorBody)
))]
#[get("/game/progress/<game_id>")]
async fn get_progress(
    session: Session,
    ledger: &State<RewardLedger>,
    game_id: &str,
) -> Result<Json<GameProgressResponse>, ApiError> {
    let record = ledger.get_progress(&session, game_id).await?;
    Ok(Json(record.into()))
}

#[utoipa::path(context_path = "/api/parent", responses(
    (status = 200, description = "Replay unlocked, or already unlocked", body = ReplayUnlockResponse),
    (status = 400, description = "Game not completed or not enough CalmCoins", body = ErrorBody),
    (status = 404, description = "Game never played", body = ErrorBody)
))]
#[post("/game/unlock-replay/<game_id>?<game_index>")]
async fn unlock_replay(
    session: Session,
    ledger: &State<RewardLedger>,
    game_id: &str,
    game_index: Option<i64>,
) -> Result<Json<ReplayUnlockResponse>, ApiError> {
    let unlock = ledger.unlock_replay(&session, game_id, game_index).await?;
    Ok(Json(unlock.into()))
}

#[utoipa::path(context_path = "/api/parent", responses(
    (status = 200, description = "Wallet balance with the most recent transactions", body = WalletResponse)
))]
#[get("/wallet?<limit>")]
async fn get_wallet(
    session: Session,
    ledger: &State<RewardLedger>,
    limit: Option<i64>,
) -> Result<Json<WalletResponse>, ApiError> {
    let view = ledger.get_wallet(&session, limit).await?;
    Ok(Json(view.into()))
}

#[get("/openapi.json")]
fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket
            .mount(
                "/api/parent",
                rocket::routes![complete_game, get_progress, unlock_replay, get_wallet],
            )
            .mount("/api-docs", rocket::routes![openapi_json])
    })
}
