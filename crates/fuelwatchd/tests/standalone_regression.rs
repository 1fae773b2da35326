//! Standalone regression tests.
//!
//! Wires the store, decay scheduler, dispatch engine, and API router the
//! way the daemon does, then drives decay ticks by hand.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fuelwatch_api::{Anonymous, ApiState, build_router};
use fuelwatch_core::{DecayConfig, DispatchConfig, EARTH_MEAN_RADIUS_METERS, GeoPoint};
use fuelwatch_decay::{DecayCallback, DecayFuture, DecayScheduler};
use fuelwatch_state::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const ORIGIN: (f64, f64) = (77.5946, 12.9716);

fn north_of_origin(meters: f64) -> GeoPoint {
    let dlat = (meters / EARTH_MEAN_RADIUS_METERS).to_degrees();
    GeoPoint::new(ORIGIN.0, ORIGIN.1 + dlat).unwrap()
}

struct Standalone {
    store: StateStore,
    router: Router,
    decay: DecayScheduler,
}

fn standalone() -> Standalone {
    let store = StateStore::open_in_memory().unwrap();
    let state = ApiState::new(store.clone(), DispatchConfig::default(), Arc::new(Anonymous));

    let engine = Arc::clone(&state.engine);
    let callback: DecayCallback = Arc::new(move |vehicle: Vehicle| -> DecayFuture {
        let engine = Arc::clone(&engine);
        Box::pin(async move {
            engine.on_fuel_change(&vehicle).await;
        })
    });
    let decay =
        DecayScheduler::new(Arc::new(store.clone()), DecayConfig::default()).with_callback(callback);

    Standalone {
        store,
        router: build_router(state),
        decay,
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn register(router: &Router, name: &str, fuel: f64) -> u64 {
    let (status, body) = send(
        router,
        send_json(
            "POST",
            "/api/v1/vehicles",
            json!({ "name": name, "initial_fuel": fuel, "mileage": 15.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_u64().unwrap()
}

async fn report_origin(router: &Router, id: u64) {
    let (status, _) = send(
        router,
        send_json(
            "PUT",
            &format!("/api/v1/vehicles/{id}/position"),
            json!({ "longitude": ORIGIN.0, "latitude": ORIGIN.1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn standalone_healthz() {
    let s = standalone();
    let (status, body) = send(&s.router, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn standalone_decay_to_threshold_then_dispatch() {
    let s = standalone();
    s.store
        .add_station(&NewStation::new("near", "1 Main St", north_of_origin(1000.0)))
        .unwrap();
    s.store
        .add_station(&NewStation::new("far", "9 Ring Rd", north_of_origin(4000.0)))
        .unwrap();

    let id = register(&s.router, "courier", 22.0).await;
    report_origin(&s.router, id).await;
    let dispatch_uri = format!("/api/v1/vehicles/{id}/dispatch");

    // 22 → 21 → 20: at the threshold, nothing to do.
    s.decay.tick().await;
    s.decay.tick().await;
    let (status, body) = send(&s.router, get(&dispatch_uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "no_action_needed");
    assert_eq!(body["data"]["fuel_level"], 20.0);

    let (_, body) = send(&s.router, get("/api/v1/dispatches")).await;
    assert_eq!(body["data"], json!([]));

    // 20 → 19: crossing triggers a proactive search.
    s.decay.tick().await;
    let (status, body) = send(&s.router, get(&dispatch_uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "dispatched");
    assert_eq!(body["data"]["fuel_level"], 19.0);
    assert_eq!(body["data"]["candidates"][0]["station"]["name"], "near");
    assert_eq!(body["data"]["candidates"][1]["station"]["name"], "far");

    let (_, body) = send(&s.router, get("/api/v1/dispatches")).await;
    let recent = body["data"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["vehicle_id"], id);
    assert_eq!(recent[0]["fuel_level"], 19.0);
}

#[tokio::test]
async fn standalone_decay_stops_at_zero() {
    let s = standalone();
    let id = register(&s.router, "scooter", 2.0).await;

    for _ in 0..5 {
        s.decay.tick().await;
    }

    let (status, body) = send(&s.router, get(&format!("/api/v1/vehicles/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_fuel"], 0.0);
}

#[tokio::test]
async fn standalone_remote_vehicle_has_no_stations_in_range() {
    let s = standalone();
    s.store
        .add_station(&NewStation::new("remote", "", north_of_origin(25_000.0)))
        .unwrap();
    let id = register(&s.router, "tractor", 5.0).await;
    report_origin(&s.router, id).await;

    // Proactive search finds nothing; nothing is cached.
    s.decay.tick().await;
    let (_, body) = send(&s.router, get("/api/v1/dispatches")).await;
    assert_eq!(body["data"], json!([]));

    let (status, body) = send(&s.router, get(&format!("/api/v1/vehicles/{id}/dispatch"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "no_stations_in_range");
}

#[tokio::test]
async fn standalone_refuel_rearms_proactive_dispatch() {
    let s = standalone();
    s.store
        .add_station(&NewStation::new("near", "", north_of_origin(500.0)))
        .unwrap();
    let id = register(&s.router, "van", 20.0).await;
    report_origin(&s.router, id).await;

    s.decay.tick().await; // 19, dispatched
    let (_, body) = send(&s.router, get("/api/v1/dispatches")).await;
    assert_eq!(body["data"][0]["fuel_level"], 19.0);
    let (status, body) = send(
        &s.router,
        send_json(
            "POST",
            &format!("/api/v1/vehicles/{id}/refuel"),
            json!({ "liters": 10.5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_fuel"], 29.5);

    // Back above the threshold: the earlier dispatch is no longer current.
    let (_, body) = send(&s.router, get("/api/v1/dispatches")).await;
    assert_eq!(body["data"], json!([]));

    // 29.5 → 18.5; the second crossing happens at 19.5.
    for _ in 0..11 {
        s.decay.tick().await;
    }
    let (_, body) = send(&s.router, get("/api/v1/dispatches")).await;
    assert_eq!(body["data"][0]["fuel_level"], 19.5);
    assert_eq!(s.store.get_vehicle(id).unwrap().current_fuel, 18.5);
}

#[tokio::test]
async fn standalone_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fuelwatch.redb");

    let id = {
        let store = StateStore::open(&path).unwrap();
        let router = build_router(ApiState::new(
            store,
            DispatchConfig::default(),
            Arc::new(Anonymous),
        ));
        register(&router, "truck", 42.0).await
    };

    let store = StateStore::open(&path).unwrap();
    assert_eq!(store.get_vehicle(id).unwrap().current_fuel, 42.0);
}
