use crate::{
    auth::Auth,
    sso::handlers::{error_response, valid_email, valid_password},
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize)]
pub struct UserRegister {
    email: String,
    password: String,
}

impl fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRegister")
            .field("password", &"***")
            .finish_non_exhaustive()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub user_id: i64,
}

#[utoipa::path(
    post,
    path = "/user/register",
    request_body = UserRegister,
    responses(
        (status = 201, description = "Registration successful", body = RegisterResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload, invalid email or invalid password"),
        (status = 409, description = "User with the specified email already exists"),
        (status = 500, description = "Internal error"),
    ),
    tag = "register"
)]
#[instrument(skip_all)]
pub async fn register(
    auth: Extension<Arc<Auth>>,
    payload: Option<Json<UserRegister>>,
) -> Response {
    let Some(Json(user)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    if !valid_email(&user.email) {
        debug!("invalid email");
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    if !valid_password(&user.password) {
        debug!("invalid password");
        return (StatusCode::BAD_REQUEST, "Invalid password".to_string()).into_response();
    }

    let password = SecretString::from(user.password);
    match auth.register(&user.email, &password).await {
        Ok(user_id) => (StatusCode::CREATED, Json(RegisterResponse { user_id })).into_response(),
        Err(err) => error_response(&err),
    }
}
