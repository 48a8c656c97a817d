use axum::{http::StatusCode, response::Response};
use serde::Serialize;

use crate::{
    error::Result,
    handlers::render,
    navigation::{ENTRY_PATH, REGISTER_PATH},
};

/// Path of the sign-in start surface.
pub const SIGN_IN_PATH: &str = "/auth/sign-in";

/// Descriptor of a page only shown to visitors without a session.
#[derive(Serialize)]
pub struct PageDescriptor {
    pub page: &'static str,
    pub sign_in_url: &'static str,
    pub alternate_url: &'static str,
}

/// Renders the entry page.
pub async fn entry() -> Result<Response> {
    render::json(
        StatusCode::OK,
        &PageDescriptor {
            page: "entry",
            sign_in_url: SIGN_IN_PATH,
            alternate_url: REGISTER_PATH,
        },
    )
}

/// Renders the registration page. Accounts are created by the identity
/// provider on first sign-in.
pub async fn register() -> Result<Response> {
    render::json(
        StatusCode::OK,
        &PageDescriptor {
            page: "register",
            sign_in_url: SIGN_IN_PATH,
            alternate_url: ENTRY_PATH,
        },
    )
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

/// Liveness probe.
pub async fn health() -> Result<Response> {
    render::json(
        StatusCode::OK,
        &Health {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
