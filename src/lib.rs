//! Client portal of an IPv6-over-IPv4 tunnel broker.

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod config;
pub mod error;
pub mod identity;
pub mod navigation;
pub mod state;

pub mod crypto {
    pub mod csrf;
    pub mod pkce;
}

pub mod models {
    pub mod session;
    pub mod tunnel;
    pub mod user;
}

pub mod repositories {
    pub mod tunnel;
}

pub mod services {
    pub mod auth;
    pub mod directory;
    pub mod provisioning;
}

pub mod handlers {
    pub mod auth;
    pub mod pages;
    pub mod render;
    pub mod tunnels;
}

pub mod middleware_layer {
    pub mod csrf;
    pub mod session_guard;
}

pub mod validation {
    pub mod tunnel;
}

use middleware_layer::{csrf::verify_csrf, session_guard::session_guard};
use state::AppState;

/// Builds the portal's router.
///
/// Every request passes the session guard. `CookieManagerLayer` is the
/// outermost layer so cookies written by the guard reach redirects too.
pub fn build_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/dashboard", get(handlers::tunnels::dashboard))
        .route(
            "/dashboard/tunnels/create",
            get(handlers::tunnels::create_page).post(handlers::tunnels::create_tunnel),
        )
        .route(
            "/dashboard/tunnels/{tunnel_id}",
            get(handlers::tunnels::tunnel_detail),
        )
        .route_layer(from_fn(verify_csrf))
        .with_state(state.clone());

    let sign_out_routes = Router::new()
        .route("/auth/sign-out", post(handlers::auth::sign_out))
        .route_layer(from_fn(verify_csrf))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/", get(handlers::pages::entry))
        .route("/register", get(handlers::pages::register))
        .route("/auth/sign-in", get(handlers::auth::sign_in))
        .route("/auth/callback", get(handlers::auth::callback))
        .route("/health", get(handlers::pages::health))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(sign_out_routes)
        .merge(protected_routes)
        .layer(from_fn_with_state(state, session_guard))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
}
