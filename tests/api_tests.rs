mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Local;
use common::*;
use http_body_util::BodyExt;
use tower::ServiceExt;

use strmarr::services::CadenceId;

fn spawn_app(h: &Harness) -> Router {
    let state = strmarr::api::create_app_state(h.state.clone(), None);
    strmarr::api::router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new(false);
    let app = spawn_app(&h);

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/system/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_sonarr_webhook_events() {
    let h = Harness::new(false);
    let show = series(3, "Hooked", h.root(), vec![season(1, false)]);
    h.series.add_series(show.clone(), vec![episode(1, 3, 1, 1, false)]);
    let app = spawn_app(&h);

    let (status, body) = send(
        &app,
        post_json("/api/webhooks/sonarr", &serde_json::json!({ "eventType": "Test" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["handled"], false);

    let (status, body) = send(
        &app,
        post_json(
            "/api/webhooks/sonarr",
            &serde_json::json!({ "eventType": "seriesAdd", "series": { "id": 3, "title": "Hooked" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"]["artifactsCreated"], 1);
    assert!(episode_artifact(&show, 1, 1).exists());
}

#[tokio::test]
async fn test_webhook_validation_errors() {
    let h = Harness::new(false);
    let app = spawn_app(&h);

    let (status, body) = send(
        &app,
        post_json("/api/webhooks/sonarr", &serde_json::json!({ "eventType": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        post_json("/api/webhooks/sonarr", &serde_json::json!({ "eventType": "seriesAdd" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Movies are not configured on this engine.
    let (status, body) = send(
        &app,
        post_json(
            "/api/webhooks/radarr",
            &serde_json::json!({ "eventType": "movieAdd", "movie": { "id": 1 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("movie"));

    let (status, _) = send(
        &app,
        post_json(
            "/api/webhooks/sonarr",
            &serde_json::json!({ "eventType": "seriesAdd", "series": { "id": 99 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_triggers() {
    let h = Harness::new(true);
    let show = series(1, "Show", h.root(), vec![season(1, true)]);
    let wanted = vec![episode(1, 1, 1, 1, true)];
    h.series.add_series(show, wanted.clone());
    h.series.set_wanted(wanted);
    let app = spawn_app(&h);

    let (status, body) = send(&app, post_empty("/api/tasks/wanted")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["episodes"]["artifactsCreated"], 1);
    assert_eq!(body["data"]["movies"]["itemsProcessed"], 0);

    let (status, body) = send(&app, post_empty("/api/tasks/wanted/movies")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["moviesProcessed"], 0);

    let (status, body) = send(&app, post_empty("/api/tasks/full-sweep?onlyMonitored=false")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["seriesProcessed"], 1);
    assert_eq!(body["data"]["validLinks"], 1);

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/system/status")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["moviesEnabled"], true);
    let cadences = body["data"]["cadences"].as_array().unwrap();
    assert_eq!(cadences.len(), 2);
    assert!(cadences.iter().all(|c| c["inFlight"] == false));
    assert!(cadences.iter().all(|c| c["lastOutcome"] == "succeeded"));
}

#[tokio::test]
async fn test_trigger_conflicts_with_running_cadence() {
    let h = Harness::new(false);
    let app = spawn_app(&h);

    assert!(h
        .state
        .schedule
        .try_begin(CadenceId::WantedSweep, Local::now(), |_| true));

    let (status, body) = send(&app, post_empty("/api/tasks/wanted")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, post_empty("/api/tasks/full-sweep")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_movie_trigger_without_radarr() {
    let h = Harness::new(false);
    let app = spawn_app(&h);

    let (status, _) = send(&app, post_empty("/api/tasks/wanted/movies")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let h = Harness::new(false);
    let app = spawn_app(&h);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("Metrics not enabled"));
}
