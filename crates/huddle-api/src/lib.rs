use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use huddle_core::AppState;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

pub mod error;
pub mod middleware;
pub mod routes;

const RATE_WINDOW_SECS: i64 = 15 * 60;
const AUTH_RATE_BUDGET: u32 = 100;
const ROOM_CREATE_RATE_BUDGET: u32 = 10;

pub fn build_router() -> Router<AppState> {
    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/login", post(routes::auth::login))
        .route("/me", get(routes::auth::me))
        .route_layer(from_fn(auth_rate_limit));

    let room_routes = Router::new()
        .route(
            "/create",
            post(routes::rooms::create_room).route_layer(from_fn(room_create_rate_limit)),
        )
        .route("/history", get(routes::rooms::history));

    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth_routes)
        .nest("/api/rooms", room_routes)
        .layer(build_cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn build_cors_layer() -> tower_http::cors::CorsLayer {
    tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "huddle" })),
    )
}

type WindowMap = Mutex<HashMap<String, (i64, u32)>>;

static AUTH_RATE_STATE: OnceLock<WindowMap> = OnceLock::new();
static ROOM_RATE_STATE: OnceLock<WindowMap> = OnceLock::new();

fn window_map(cell: &'static OnceLock<WindowMap>) -> &'static WindowMap {
    cell.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Clears all fixed-window counters. Test hook only.
pub fn reset_http_rate_limits() {
    for cell in [&AUTH_RATE_STATE, &ROOM_RATE_STATE] {
        if let Some(map) = cell.get() {
            match map.lock() {
                Ok(mut guard) => guard.clear(),
                Err(poisoned) => poisoned.into_inner().clear(),
            }
        }
    }
}

fn client_key(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("local")
        .to_string()
}

fn fixed_window_allow(state: &'static WindowMap, key: String, budget: u32) -> bool {
    let window = chrono::Utc::now().timestamp() / RATE_WINDOW_SECS;
    let mut map = match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let entry = map.entry(key).or_insert((window, 0));
    if entry.0 != window {
        *entry = (window, 0);
    }
    if entry.1 >= budget {
        false
    } else {
        entry.1 += 1;
        true
    }
}

async fn auth_rate_limit(req: Request, next: Next) -> Response {
    let key = client_key(&req);
    if !fixed_window_allow(window_map(&AUTH_RATE_STATE), key, AUTH_RATE_BUDGET) {
        return crate::error::ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

async fn room_create_rate_limit(req: Request, next: Next) -> Response {
    let key = client_key(&req);
    if !fixed_window_allow(window_map(&ROOM_RATE_STATE), key, ROOM_CREATE_RATE_BUDGET) {
        return crate::error::ApiError::RateLimited.into_response();
    }
    next.run(req).await
}
