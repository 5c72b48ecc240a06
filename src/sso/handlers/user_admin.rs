use crate::{auth::Auth, sso::handlers::error_response};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AdminResponse {
    pub is_admin: bool,
}

#[utoipa::path(
    get,
    path = "/user/{id}/admin",
    params(
        ("id" = i64, Path, description = "User id"),
    ),
    responses(
        (status = 200, description = "Admin flag of the user", body = AdminResponse, content_type = "application/json"),
        (status = 400, description = "Invalid user id"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal error"),
    ),
    tag = "admin"
)]
#[instrument(skip(auth))]
pub async fn is_admin(auth: Extension<Arc<Auth>>, Path(id): Path<i64>) -> Response {
    if id <= 0 {
        return (StatusCode::BAD_REQUEST, "Invalid user id".to_string()).into_response();
    }

    match auth.is_admin(id).await {
        Ok(is_admin) => (StatusCode::OK, Json(AdminResponse { is_admin })).into_response(),
        Err(err) => error_response(&err),
    }
}
