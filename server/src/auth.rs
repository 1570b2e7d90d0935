use std::str::FromStr;

use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
};

use shared::UserRole;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Caller identity forwarded by the API gateway. The gateway owns
/// authentication, this service only trusts its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: UserRole,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user_id = request.headers().get_one(USER_ID_HEADER).unwrap_or_default();
        let role = request
            .headers()
            .get_one(USER_ROLE_HEADER)
            .and_then(|value| UserRole::from_str(value).ok());

        match role {
            Some(role) if !user_id.is_empty() => Outcome::Success(Session {
                user_id: user_id.to_string(),
                role,
            }),
            _ => Outcome::Error((Status::Forbidden, ())),
        }
    }
}
