//! Request activity recording

use crate::api::AppState;
use crate::models::ActivityEvent;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

/// Header naming the caller
pub const USER_HEADER: &str = "x-username";

/// Requests to this final path segment are not recorded
pub const ACTIVITY_ROUTE: &str = "activity";

pub const ANONYMOUS_USER: &str = "anonymous";

/// Caller identity resolved by [`record_activity`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUser(pub String);

/// `X-Username`, else the peer IP, else `anonymous`
pub fn resolve_user(req: &Request) -> String {
    if let Some(user) = req
        .headers()
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
    {
        return user.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS_USER.to_string())
}

pub fn is_activity_route(path: &str) -> bool {
    path.trim_end_matches('/').rsplit('/').next() == Some(ACTIVITY_ROUTE)
}

/// Record an [`ActivityEvent`] per request and expose the caller as [`RequestUser`]
pub async fn record_activity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = resolve_user(&req);

    if !is_activity_route(req.uri().path()) {
        state.catalog.record_activity(ActivityEvent::new(
            req.method().as_str(),
            req.uri().path(),
            user.as_str(),
        ));
    }

    req.extensions_mut().insert(RequestUser(user));
    next.run(req).await
}
