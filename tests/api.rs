use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use clubsite::application::auth::AdminAuthenticator;
use clubsite::cache::{CacheConfig, MemoryCacheStore, ResponseCache};
use clubsite::infra::http::{HttpState, build_router};
use clubsite::infra::memory::MemoryRepositories;

const ADMIN_TOKEN: &str = "club-admin-secret";

struct TestApp {
    router: Router,
    cache: ResponseCache,
}

impl TestApp {
    fn new() -> Self {
        let config = CacheConfig::default();
        let cache = ResponseCache::new(config.clone(), Arc::new(MemoryCacheStore::new(&config)));
        let state = HttpState::new(
            Arc::new(MemoryRepositories::default()),
            cache.clone(),
            AdminAuthenticator::new([ADMIN_TOKEN]),
        );
        Self {
            router: build_router(state),
            cache,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request should build"))
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, None).await
    }

    async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, body, Some(ADMIN_TOKEN)).await
    }

    async fn create(&self, uri: &str, body: Value) -> Value {
        let (status, value) = self.admin(Method::POST, uri, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create {uri}: {value}");
        value
    }
}

fn id_of(value: &Value) -> i64 {
    value["id"].as_i64().expect("record id")
}

/// One tag attached to a record in each of the five collections.
async fn seed_raspberry_pi(app: &TestApp) -> i64 {
    let tag = app
        .create("/api/tags-admin/", json!({ "name": "Raspberry Pi" }))
        .await;
    assert_eq!(tag["slug"], "raspberry-pi");
    let tag_id = id_of(&tag);

    app.create(
        "/api/blog/",
        json!({ "title": "Pi cluster", "summary": "Four boards, one rack", "tag_ids": [tag_id] }),
    )
    .await;
    app.create(
        "/api/projects/",
        json!({ "title": "Weather station", "description": "Pi with sensors", "tag_ids": [tag_id] }),
    )
    .await;
    app.create(
        "/api/events/",
        json!({
            "title": "Pi workshop",
            "summary": "Hands-on GPIO",
            "mode": "virtual",
            "meeting_link": "https://meet.example/pi",
            "tag_ids": [tag_id],
        }),
    )
    .await;
    app.create(
        "/api/roadmaps/",
        json!({
            "icon_name": "cpu",
            "title": "Embedded track",
            "description": "From blinking LEDs to kernels",
            "tag_ids": [tag_id],
        }),
    )
    .await;
    app.create(
        "/api/team/",
        json!({ "name": "Ada", "role": "Hardware lead", "position_rank": 1, "tag_ids": [tag_id] }),
    )
    .await;

    tag_id
}

#[tokio::test]
async fn tag_counts_cover_every_collection() {
    let app = TestApp::new();
    seed_raspberry_pi(&app).await;

    let (status, body) = app.get("/api/tags/?include_counts=true&type=all").await;
    assert_eq!(status, StatusCode::OK);
    let tag = body["tags"]
        .as_array()
        .expect("tags array")
        .iter()
        .find(|tag| tag["slug"] == "raspberry-pi")
        .expect("raspberry-pi listed");
    assert_eq!(tag["count"], 5);

    let (_, body) = app.get("/api/tags/?include_counts=true&type=events").await;
    assert_eq!(body["tags"][0]["count"], 1);
}

#[tokio::test]
async fn items_filter_by_tag_slug_across_types() {
    let app = TestApp::new();
    seed_raspberry_pi(&app).await;

    let (status, body) = app.get("/api/items/?tag=raspberry-pi&type=all").await;
    assert_eq!(status, StatusCode::OK);

    let items = body["items"].as_array().expect("items array");
    assert!(items.len() >= 5);
    let valid: HashSet<&str> = ["blogs", "projects", "events", "roadmaps", "team"]
        .into_iter()
        .collect();
    let seen: HashSet<&str> = items
        .iter()
        .map(|item| item["type"].as_str().expect("type field"))
        .collect();
    assert!(seen.is_subset(&valid));
    assert_eq!(seen.len(), 5);
    assert_eq!(body["pagination"]["total"], 5);
}

#[tokio::test]
async fn unknown_tag_reference_yields_an_empty_page() {
    let app = TestApp::new();
    seed_raspberry_pi(&app).await;

    let (status, body) = app.get("/api/items/?tag=does-not-exist&type=all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn short_search_returns_an_error_without_results() {
    let app = TestApp::new();
    seed_raspberry_pi(&app).await;

    let (status, body) = app.get("/api/search/?q=a").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["error"].is_string());
    for key in ["blogs", "projects", "team", "events", "roadmaps", "tags"] {
        assert_eq!(body[key], json!([]), "{key} should be empty");
    }
}

#[tokio::test]
async fn search_matches_case_insensitively() {
    let app = TestApp::new();
    seed_raspberry_pi(&app).await;

    let (status, body) = app.get("/api/search/?q=GPIO").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("error").is_none());
    assert_eq!(body["events"][0]["title"], "Pi workshop");
    assert_eq!(body["blogs"], json!([]));

    let (_, body) = app.get("/api/search/?q=raspberry").await;
    assert_eq!(body["tags"][0]["slug"], "raspberry-pi");
}

#[tokio::test]
async fn colliding_slugs_get_a_numeric_suffix() {
    let app = TestApp::new();

    let first = app
        .create("/api/tags-admin/", json!({ "name": "Robotics" }))
        .await;
    let second = app
        .create("/api/tags-admin/", json!({ "name": "Robotics!" }))
        .await;

    assert_eq!(first["slug"], "robotics");
    assert_eq!(second["slug"], "robotics-1");
}

#[tokio::test]
async fn duplicate_tag_names_conflict() {
    let app = TestApp::new();
    app.create("/api/tags-admin/", json!({ "name": "Robotics" }))
        .await;

    let (status, body) = app
        .admin(
            Method::POST,
            "/api/tags-admin/",
            Some(json!({ "name": "Robotics" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "duplicate");
}

#[tokio::test]
async fn unknown_tag_detail_is_a_cached_not_found() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/tags/missing/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not found." }));

    // Served from the cache the second time, status included.
    let (status, body) = app.get("/api/tags/missing/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not found.");
}

#[tokio::test]
async fn tag_detail_pages_one_collection() {
    let app = TestApp::new();
    let tag_id = seed_raspberry_pi(&app).await;
    app.create(
        "/api/blog/",
        json!({ "title": "Second post", "summary": "More Pi", "tag_ids": [tag_id] }),
    )
    .await;

    let (status, body) = app
        .get("/api/tags/raspberry-pi/?type=blogs&per_page=1&page=2")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tag"]["slug"], "raspberry-pi");
    assert_eq!(body["tag"]["count"], 2);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn writes_require_an_admin_token() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/tags-admin/",
            Some(json!({ "name": "Drones" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = app
        .send(
            Method::DELETE,
            "/api/blog/1/",
            None,
            Some("not-the-token"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/tags-admin/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn writes_invalidate_cached_reads() {
    let app = TestApp::new();
    let before = app.cache.generation().current().await.expect("generation");

    let (_, body) = app.get("/api/tags/").await;
    assert_eq!(body["tags"], json!([]));

    app.create("/api/tags-admin/", json!({ "name": "Drones" }))
        .await;
    let after = app.cache.generation().current().await.expect("generation");
    assert_ne!(before, after);

    let (_, body) = app.get("/api/tags/").await;
    assert_eq!(body["tags"][0]["name"], "Drones");
}

#[tokio::test]
async fn content_lifecycle_through_resource_endpoints() {
    let app = TestApp::new();
    let created = app
        .create(
            "/api/projects/",
            json!({ "title": "Rover", "description": "Six wheels" }),
        )
        .await;
    let id = id_of(&created);
    let member = format!("/api/projects/{id}/");

    let (status, body) = app
        .admin(
            Method::PATCH,
            &member,
            Some(json!({ "description": "Eight wheels" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Rover");
    assert_eq!(body["description"], "Eight wheels");

    let (status, body) = app
        .admin(
            Method::PUT,
            &member,
            Some(json!({ "title": "Rover II", "description": "Tracks" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Rover II");

    let (status, body) = app.get(&member).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Tracks");

    let (status, _) = app.admin(Method::DELETE, &member, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&member).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.admin(Method::DELETE, &member, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .admin(
            Method::POST,
            "/api/blog/",
            Some(json!({ "title": "", "summary": "Empty title" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, body) = app
        .admin(
            Method::POST,
            "/api/blog/",
            Some(json!({ "title": "Orphan", "summary": "Bad tag", "tag_ids": [999] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "unknown_reference");

    let (status, body) = app
        .admin(Method::POST, "/api/blog/", Some(json!("not an object")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn events_embed_their_speakers_in_order() {
    let app = TestApp::new();
    let grace = app
        .create(
            "/api/speakers/",
            json!({ "name": "Grace", "profile_image": "https://img.example/g.png", "bio": "Compilers" }),
        )
        .await;
    let linus = app
        .create(
            "/api/speakers/",
            json!({ "name": "Linus", "profile_image": "https://img.example/l.png", "bio": "Kernels" }),
        )
        .await;

    let event = app
        .create(
            "/api/events/",
            json!({
                "title": "Systems night",
                "summary": "Two talks",
                "speaker_ids": [id_of(&linus), id_of(&grace)],
            }),
        )
        .await;
    assert_eq!(event["speakers"][0]["name"], "Linus");
    assert_eq!(event["speakers"][1]["name"], "Grace");

    let (status, _) = app
        .admin(
            Method::DELETE,
            &format!("/api/speakers/{}/", id_of(&linus)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app
        .get(&format!("/api/events/{}/", id_of(&event)))
        .await;
    let speakers = body["speakers"].as_array().expect("speakers array");
    assert_eq!(speakers.len(), 1);
    assert_eq!(speakers[0]["name"], "Grace");
}

#[tokio::test]
async fn bootstrap_bundles_every_collection() {
    let app = TestApp::new();
    seed_raspberry_pi(&app).await;

    let (status, body) = app.get("/api/bootstrap/").await;
    assert_eq!(status, StatusCode::OK);
    for key in [
        "tags",
        "popular_tags",
        "events",
        "blogs",
        "projects",
        "roadmaps",
        "team",
    ] {
        assert!(body[key].is_array(), "{key} missing");
    }
    assert_eq!(body["popular_tags"][0]["slug"], "raspberry-pi");
    assert_eq!(body["popular_tags"][0]["count"], 5);
}

#[tokio::test]
async fn popular_tags_skip_unused_and_respect_the_limit() {
    let app = TestApp::new();
    seed_raspberry_pi(&app).await;
    let drones = app
        .create("/api/tags-admin/", json!({ "name": "Drones" }))
        .await;
    app.create("/api/tags-admin/", json!({ "name": "Unused" }))
        .await;
    app.create(
        "/api/blog/",
        json!({ "title": "First flight", "summary": "Quadcopter", "tag_ids": [id_of(&drones)] }),
    )
    .await;

    let (status, body) = app.get("/api/tags/popular/").await;
    assert_eq!(status, StatusCode::OK);
    let slugs: Vec<&str> = body["tags"]
        .as_array()
        .expect("tags array")
        .iter()
        .map(|tag| tag["slug"].as_str().expect("slug"))
        .collect();
    assert_eq!(slugs, vec!["raspberry-pi", "drones"]);

    let (_, body) = app.get("/api/tags/popular/?limit=1").await;
    assert_eq!(body["tags"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn health_and_ping_answer() {
    let app = TestApp::new();

    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get("/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("pong".to_string()));
}

#[tokio::test]
async fn repeated_query_keys_use_the_last_value() {
    let app = TestApp::new();
    seed_raspberry_pi(&app).await;

    let (status, body) = app.get("/api/items/?per_page=2&page=1&page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["per_page"], 2);

    let (status, body) = app.get("/api/items/?per_page=5&per_page=x").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["per_page"], 20);

    let (status, body) = app.get("/api/search/?q=ab&q=pi").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "pi");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn union_pages_keep_total_and_recency_order() {
    let app = TestApp::new();
    app.create(
        "/api/team/",
        json!({ "name": "Grace", "role": "Mentor", "position_rank": 2 }),
    )
    .await;
    app.create(
        "/api/team/",
        json!({ "name": "Ada", "role": "Lead", "position_rank": 1 }),
    )
    .await;
    app.create(
        "/api/blog/",
        json!({ "title": "March notes", "summary": "s", "published_date": "2024-03-01T10:00:00Z" }),
    )
    .await;
    app.create(
        "/api/projects/",
        json!({ "title": "Old rover", "description": "d", "published_date": "2023-01-01T10:00:00Z" }),
    )
    .await;
    app.create(
        "/api/events/",
        json!({
            "title": "Summer meetup",
            "summary": "s",
            "mode": "physical",
            "location_address": "Lab 2",
            "event_date": "2024-06-01T18:00:00Z",
        }),
    )
    .await;
    app.create(
        "/api/roadmaps/",
        json!({
            "icon_name": "map",
            "title": "Winter plan",
            "description": "d",
            "published_date": "2024-01-01T10:00:00Z",
        }),
    )
    .await;

    let mut titles = Vec::new();
    for page in 1..=3 {
        let (status, body) = app
            .get(&format!("/api/items/?type=all&per_page=2&page={page}"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 6, "page {page}");
        assert_eq!(body["pagination"]["page"], page);
        let items = body["items"].as_array().expect("items array");
        assert_eq!(items.len(), 2, "page {page}");
        titles.extend(
            items
                .iter()
                .map(|item| item["title"].as_str().expect("title").to_string()),
        );
    }
    assert_eq!(
        titles,
        vec![
            "Ada",
            "Grace",
            "Summer meetup",
            "March notes",
            "Winter plan",
            "Old rover"
        ]
    );

    let (_, body) = app.get("/api/items/?type=all&per_page=4&page=9").await;
    assert_eq!(body["pagination"]["total"], 6);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["items"].as_array().expect("items array").len(), 2);
}
