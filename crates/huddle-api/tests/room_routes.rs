use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use huddle_core::{connections::ConnectionMap, registry::RoomRegistry, AppConfig, AppState};
use huddle_models::UserType;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

const GUEST_SESSION: &str = r#"{"type":"guest","sessionId":"guest-1","displayName":"Ada"}"#;

struct TestHarness {
    app: Router,
    state: AppState,
}

impl TestHarness {
    async fn new() -> anyhow::Result<Self> {
        let db = huddle_db::create_pool("sqlite::memory:", 1).await?;
        huddle_db::run_migrations(&db).await?;
        // Rate-limit buckets are process-global; tests stay isolated by
        // using a distinct x-forwarded-for address each.

        let state = AppState {
            db: db.clone(),
            config: AppConfig {
                jwt_secret: "integration-test-secret".to_string(),
                jwt_expiry_seconds: 3600,
                client_url: "http://localhost:5173".to_string(),
            },
            registry: RoomRegistry::new(db, Duration::from_secs(300)),
            connections: Arc::new(ConnectionMap::new()),
            shutdown: Arc::new(Notify::new()),
        };
        let app = huddle_api::build_router().with_state(state.clone());
        Ok(Self { app, state })
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn signup(&self, ip: &str, email: &str) -> anyhow::Result<String> {
        let (status, body) = self
            .request(
                "POST",
                "/api/auth/signup",
                Some(json!({"name": "Ada", "email": email, "password": "hunter22"})),
                &[("x-forwarded-for", ip)],
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "signup failed: {status}");
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }
}

#[tokio::test]
async fn guest_can_create_a_room() -> anyhow::Result<()> {
    let harness = TestHarness::new().await?;

    let (status, body) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "Friday standup"})),
            &[
                ("x-forwarded-for", "10.2.0.1"),
                ("x-guest-session", GUEST_SESSION),
            ],
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ownerType"], "guest");
    assert_eq!(body["roomName"], "Friday standup");

    let room_id = body["roomId"].as_str().expect("room id");
    assert_eq!(
        body["joinLink"],
        format!("http://localhost:5173/room/{room_id}")
    );

    let row = huddle_db::rooms::get_room(&harness.state.db, room_id)
        .await?
        .expect("room persisted");
    assert!(row.guest_created);
    assert!(row.is_active);
    Ok(())
}

#[tokio::test]
async fn room_creation_requires_credentials() -> anyhow::Result<()> {
    let harness = TestHarness::new().await?;

    let (status, _) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "standup"})),
            &[("x-forwarded-for", "10.2.0.2")],
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "standup"})),
            &[
                ("x-forwarded-for", "10.2.0.2"),
                ("x-guest-session", r#"{"type":"guest","sessionId":""}"#),
            ],
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn room_name_length_is_enforced() -> anyhow::Result<()> {
    let harness = TestHarness::new().await?;
    let headers = [
        ("x-forwarded-for", "10.2.0.3"),
        ("x-guest-session", GUEST_SESSION),
    ];

    let (status, _) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "x"})),
            &headers,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long_name = "x".repeat(101);
    let (status, _) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": long_name})),
            &headers,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Whitespace does not count toward the minimum.
    let (status, _) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "  a  "})),
            &headers,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn registered_creation_appears_in_history() -> anyhow::Result<()> {
    let harness = TestHarness::new().await?;
    let token = harness.signup("10.2.0.4", "ada@example.com").await?;
    let bearer = format!("Bearer {token}");

    let (status, body) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "Design review"})),
            &[("x-forwarded-for", "10.2.0.4"), ("authorization", &bearer)],
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ownerType"], "registered");

    let (status, body) = harness
        .request(
            "GET",
            "/api/rooms/history",
            None,
            &[("x-forwarded-for", "10.2.0.4"), ("authorization", &bearer)],
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let rooms = body["rooms"].as_array().expect("rooms array");
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["roomName"], "Design review");
    assert_eq!(rooms[0]["role"], "owner");
    assert_eq!(rooms[0]["isActive"], true);
    assert_eq!(rooms[0]["participantCount"], 0);
    Ok(())
}

#[tokio::test]
async fn history_is_registered_only_and_paginated() -> anyhow::Result<()> {
    let harness = TestHarness::new().await?;

    let (status, _) = harness
        .request(
            "GET",
            "/api/rooms/history",
            None,
            &[
                ("x-forwarded-for", "10.2.0.5"),
                ("x-guest-session", GUEST_SESSION),
            ],
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = harness.signup("10.2.0.5", "bo@example.com").await?;
    let bearer = format!("Bearer {token}");
    for name in ["one room", "two room", "three room"] {
        let (status, _) = harness
            .request(
                "POST",
                "/api/rooms/create",
                Some(json!({"roomName": name})),
                &[("x-forwarded-for", "10.2.0.5"), ("authorization", &bearer)],
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = harness
        .request(
            "GET",
            "/api/rooms/history?page=1&limit=2",
            None,
            &[("x-forwarded-for", "10.2.0.5"), ("authorization", &bearer)],
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["rooms"].as_array().map(Vec::len), Some(2));

    let (status, body) = harness
        .request(
            "GET",
            "/api/rooms/history?page=2&limit=2",
            None,
            &[("x-forwarded-for", "10.2.0.5"), ("authorization", &bearer)],
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rooms"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn history_reflects_live_participant_count() -> anyhow::Result<()> {
    let harness = TestHarness::new().await?;
    let token = harness.signup("10.2.0.6", "cy@example.com").await?;
    let bearer = format!("Bearer {token}");

    let (_, body) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "War room"})),
            &[("x-forwarded-for", "10.2.0.6"), ("authorization", &bearer)],
        )
        .await?;
    let room_id = body["roomId"].as_str().expect("room id").to_string();

    harness
        .state
        .registry
        .join_room("conn-1", &room_id, "guest-9", "drop-in", UserType::Guest)
        .await?;

    let (status, body) = harness
        .request(
            "GET",
            "/api/rooms/history",
            None,
            &[("x-forwarded-for", "10.2.0.6"), ("authorization", &bearer)],
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rooms"][0]["participantCount"], 1);
    Ok(())
}

#[tokio::test]
async fn room_creation_is_rate_limited_per_caller() -> anyhow::Result<()> {
    let harness = TestHarness::new().await?;
    let headers = [
        ("x-forwarded-for", "10.2.0.7"),
        ("x-guest-session", GUEST_SESSION),
    ];

    for n in 0..10 {
        let (status, _) = harness
            .request(
                "POST",
                "/api/rooms/create",
                Some(json!({"roomName": format!("room {n}")})),
                &headers,
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "one too many"})),
            &headers,
        )
        .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // A different caller is unaffected.
    let (status, _) = harness
        .request(
            "POST",
            "/api/rooms/create",
            Some(json!({"roomName": "fresh caller"})),
            &[
                ("x-forwarded-for", "10.2.0.99"),
                ("x-guest-session", GUEST_SESSION),
            ],
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}
