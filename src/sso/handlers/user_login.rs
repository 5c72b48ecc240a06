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
pub struct UserLogin {
    email: String,
    password: String,
    app_id: i64,
}

impl fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLogin")
            .field("app_id", &self.app_id)
            .field("password", &"***")
            .finish_non_exhaustive()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/user/login",
    request_body = UserLogin,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse, content_type = "application/json"),
        (status = 400, description = "Invalid payload, invalid email or password, or unknown app"),
        (status = 429, description = "Too many failed login attempts"),
        (status = 500, description = "Internal error"),
    ),
    tag = "login"
)]
#[instrument(skip_all)]
pub async fn login(auth: Extension<Arc<Auth>>, payload: Option<Json<UserLogin>>) -> Response {
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

    if user.app_id <= 0 {
        return (StatusCode::BAD_REQUEST, "app_id is required".to_string()).into_response();
    }

    let password = SecretString::from(user.password);
    match auth.login(&user.email, &password, user.app_id).await {
        Ok(token) => (StatusCode::OK, Json(LoginResponse { token })).into_response(),
        Err(err) => error_response(&err),
    }
}
