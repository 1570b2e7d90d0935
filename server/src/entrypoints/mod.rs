use rocket::fairing::AdHoc;
use rocket::serde::json::Json;

pub mod parent_games;
pub mod types;

#[cfg(test)]
mod tests;

use types::ErrorBody;

#[catch(400)]
fn bad_request() -> Json<ErrorBody> {
    Json(ErrorBody::new("malformed request".to_string()))
}

#[catch(403)]
fn forbidden() -> Json<ErrorBody> {
    Json(ErrorBody::new("a parent session is required".to_string()))
}

#[catch(404)]
fn not_found() -> Json<ErrorBody> {
    Json(ErrorBody::new("resource not found".to_string()))
}

#[catch(422)]
fn unprocessable() -> Json<ErrorBody> {
    Json(ErrorBody::new(
        "request body failed to parse".to_string(),
    ))
}

#[catch(500)]
fn internal_error() -> Json<ErrorBody> {
    Json(ErrorBody::new("internal error".to_string()))
}

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket.attach(parent_games::stage()).register(
            "/",
            catchers![
                bad_request,
                forbidden,
                not_found,
                unprocessable,
                internal_error
            ],
        )
    })
}
