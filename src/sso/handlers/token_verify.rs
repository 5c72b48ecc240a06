use crate::{
    auth::{Auth, AuthError},
    sso::handlers::error_response,
    token::Claims,
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize)]
pub struct TokenVerify {
    token: String,
}

#[utoipa::path(
    post,
    path = "/token/verify",
    request_body = TokenVerify,
    responses(
        (status = 200, description = "Token is valid for the app in its app_id claim", body = Claims, content_type = "application/json"),
        (status = 400, description = "Missing payload or unknown app"),
        (status = 401, description = "Token expired or invalid"),
        (status = 500, description = "Internal error"),
    ),
    tag = "token"
)]
#[instrument(skip_all)]
pub async fn verify(auth: Extension<Arc<Auth>>, payload: Option<Json<TokenVerify>>) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match auth.verify_token(&request.token).await {
        Ok(claims) => (StatusCode::OK, Json(claims)).into_response(),
        Err(AuthError::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            "token expired or invalid".to_string(),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}
