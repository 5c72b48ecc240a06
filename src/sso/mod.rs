//! HTTP/JSON transport for the credential service.
//!
//! Every route delegates to [`Auth`]; handlers only validate input and map
//! [`crate::auth::AuthError`] onto status codes.

use crate::{auth::Auth, token::Claims};
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Json, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::{openapi::InfoBuilder, OpenApi};

pub mod handlers;

use handlers::{
    token_verify::TokenVerify,
    user_admin::AdminResponse,
    user_login::{LoginResponse, UserLogin},
    user_register::{RegisterResponse, UserRegister},
};

const REQUEST_ID: &str = "x-request-id";

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::user_register::register,
        handlers::user_login::login,
        handlers::user_admin::is_admin,
        handlers::token_verify::verify,
    ),
    components(schemas(
        UserRegister,
        RegisterResponse,
        UserLogin,
        LoginResponse,
        AdminResponse,
        TokenVerify,
        Claims,
    )),
    tags(
        (name = "health", description = "Liveness and build info"),
        (name = "register", description = "User registration"),
        (name = "login", description = "Credential check and token issuance"),
        (name = "admin", description = "Admin flag lookup"),
        (name = "token", description = "Session token verification"),
    )
)]
struct ApiDoc;

/// `OpenAPI` document with the info block taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let description = env!("CARGO_PKG_DESCRIPTION").trim();
    doc.info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description((!description.is_empty()).then_some(description))
        .build();
    doc
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

/// Build the application router. `request_timeout` bounds each request
/// end to end; an elapsed request is answered with `408`.
pub fn router(auth: Arc<Auth>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/openapi.json", get(openapi_json))
        .route("/user/register", post(handlers::register))
        .route("/user/login", post(handlers::login))
        .route("/user/:id/admin", get(handlers::is_admin))
        .route("/token/verify", post(handlers::verify))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(Extension(auth)),
        )
}

/// Serve `router` on `[::]:port` until SIGINT or SIGTERM, then drain in-flight
/// requests.
///
/// # Errors
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(port: u16, router: Router) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let method = request.method().as_str();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", method, path, request_id)
}
