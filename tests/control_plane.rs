//! End-to-end tests: operator API, gateway push channel, snapshot pull.

use std::time::Duration;

use serde_json::{json, Value};

mod common;

use common::{start_server, OPERATOR_A, OPERATOR_B};

fn plain_route(name: &str) -> Value {
    json!({
        "name": name,
        "exposedUrl": format!("/{name}"),
        "targetUrl": "http://a",
        "method": "GET",
        "loadBalancing": { "enabled": false }
    })
}

fn balanced_route(name: &str, targets: &[&str]) -> Value {
    json!({
        "name": name,
        "exposedUrl": format!("/{name}"),
        "targetUrl": "http://a",
        "method": "GET",
        "loadBalancing": { "enabled": true, "algorithm": "round-robin", "targets": targets }
    })
}

#[tokio::test]
async fn test_create_plain_route_appears_in_snapshot() {
    let server = start_server().await;

    let res = server.create(OPERATOR_A, &plain_route("svc1")).await;
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert!(body["api"]["id"].as_i64().unwrap() > 0);
    assert_eq!(body["api"]["status"], "active");
    assert_eq!(body["api"]["user_id"], 1);

    let snapshot = server.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["exposed_url"], "/svc1");
    assert!(snapshot[0].get("load_balancing_targets").is_none());

    server.stop().await;
}

#[tokio::test]
async fn test_load_balanced_targets_keep_insertion_order() {
    let server = start_server().await;

    server.create_ok(&balanced_route("lb", &["http://b1", "http://b2"])).await;

    let snapshot = server.snapshot().await;
    assert_eq!(snapshot[0]["load_balancing_targets"], json!(["http://b1", "http://b2"]));
    assert_eq!(snapshot[0]["load_balancing_algorithm"], "round-robin");

    server.stop().await;
}

#[tokio::test]
async fn test_update_replaces_target_list() {
    let server = start_server().await;
    let id = server.create_ok(&balanced_route("lb", &["http://b1", "http://b2"])).await;

    let res = server.update(OPERATOR_A, id, &balanced_route("lb", &["http://b3"])).await;
    assert_eq!(res.status(), 200);

    let snapshot = server.snapshot().await;
    assert_eq!(snapshot[0]["load_balancing_targets"], json!(["http://b3"]));

    let detail: Value = server.get(OPERATOR_A, id).await.json().await.unwrap();
    assert_eq!(detail["api"]["load_balancing_targets"], json!(["http://b3"]));

    server.stop().await;
}

#[tokio::test]
async fn test_delete_reaches_connected_gateways_only() {
    let server = start_server().await;
    let id = server.create_ok(&plain_route("svc")).await;
    let keep = server.create_ok(&plain_route("other")).await;

    let mut gw1 = server.gateway().await;
    let mut gw2 = server.gateway().await;

    assert_eq!(server.delete(OPERATOR_A, id).await.status(), 200);

    for gw in [&mut gw1, &mut gw2] {
        let msg = gw.next_message().await.unwrap();
        assert_eq!(msg["type"], "config_update");
        assert_eq!(msg["operation"], "delete");
        assert_eq!(msg["apiId"], id);
    }

    // A late joiner gets no history, but its first pull already omits the route.
    let mut gw3 = server.gateway().await;
    gw3.expect_silence(Duration::from_millis(200)).await;
    let ids: Vec<i64> = server
        .snapshot()
        .await
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![keep]);

    server.stop().await;
}

#[tokio::test]
async fn test_missing_or_foreign_route_is_not_found_and_silent() {
    let server = start_server().await;
    let id = server.create_ok(&plain_route("mine")).await;
    let mut gw = server.gateway().await;

    assert_eq!(server.delete(OPERATOR_A, 9_999).await.status(), 404);
    assert_eq!(server.delete(OPERATOR_B, id).await.status(), 404);
    assert_eq!(server.update(OPERATOR_B, id, &plain_route("mine")).await.status(), 404);
    assert_eq!(server.get(OPERATOR_B, id).await.status(), 404);

    gw.expect_silence(Duration::from_millis(200)).await;
    assert_eq!(server.snapshot().await.len(), 1);
    assert_eq!(server.state.notifier.last_sequence(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_every_mutation_is_broadcast_in_order() {
    let server = start_server().await;
    let mut gw = server.gateway().await;

    let id = server.create_ok(&plain_route("svc")).await;
    server.update(OPERATOR_A, id, &plain_route("svc")).await;
    server.delete(OPERATOR_A, id).await;

    let mut seen = Vec::new();
    for _ in 0..3 {
        let msg = gw.next_message().await.unwrap();
        assert_eq!(msg["apiId"], id);
        seen.push((msg["operation"].as_str().unwrap().to_string(), msg["sequence"].as_u64().unwrap()));
    }
    assert_eq!(
        seen,
        vec![
            ("create".to_string(), 1u64),
            ("update".to_string(), 2),
            ("delete".to_string(), 3),
        ]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_over_length_target_is_rejected_and_changes_nothing() {
    let server = start_server().await;
    let id = server.create_ok(&balanced_route("lb", &["http://b1", "http://b2"])).await;
    let mut gw = server.gateway().await;

    let oversized = format!("http://b/{}", "x".repeat(300));
    let res = server
        .update(OPERATOR_A, id, &balanced_route("renamed", &["http://b3", &oversized]))
        .await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errors"][0], "load balancing target must be at most 255 characters");

    let res = server.create(OPERATOR_A, &balanced_route("fresh", &["http://c1", &oversized])).await;
    assert_eq!(res.status(), 400);

    let snapshot = server.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["name"], "lb");
    assert_eq!(snapshot[0]["load_balancing_targets"], json!(["http://b1", "http://b2"]));
    gw.expect_silence(Duration::from_millis(200)).await;

    server.stop().await;
}

#[tokio::test]
async fn test_dropped_gateway_does_not_affect_mutations() {
    let server = start_server().await;
    let mut healthy = server.gateway().await;
    let gone = server.gateway().await;
    server.wait_for_gateways(2).await;

    gone.close().await;
    server.wait_for_gateways(1).await;

    let id = server.create_ok(&plain_route("svc")).await;

    let msg = healthy.next_message().await.unwrap();
    assert_eq!(msg["apiId"], id);
    assert_eq!(server.state.channels.connected_count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_gateway_frames_are_ignored() {
    let server = start_server().await;
    let mut gw = server.gateway().await;

    gw.send_text(r#"{"type":"subscribe"}"#).await;
    gw.send_text("not json").await;

    let id = server.create_ok(&plain_route("svc")).await;
    assert_eq!(gw.next_message().await.unwrap()["apiId"], id);

    server.stop().await;
}

#[tokio::test]
async fn test_operator_token_required() {
    let server = start_server().await;

    let res = server
        .client
        .post(server.url("/api/routes"))
        .json(&plain_route("svc"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = server.create("wrong-token", &plain_route("svc")).await;
    assert_eq!(res.status(), 401);

    assert!(server.snapshot().await.is_empty());
    server.stop().await;
}

#[tokio::test]
async fn test_validation_errors_are_reported_together() {
    let server = start_server().await;
    let mut gw = server.gateway().await;

    let res = server.create(OPERATOR_A, &json!({ "name": "svc" })).await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.len() >= 3);

    let res = server
        .client
        .post(server.url("/api/routes"))
        .bearer_auth(OPERATOR_A)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    gw.expect_silence(Duration::from_millis(200)).await;
    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_endpoint_conflicts() {
    let server = start_server().await;
    server.create_ok(&plain_route("svc")).await;

    let res = server.create(OPERATOR_B, &plain_route("svc")).await;
    assert_eq!(res.status(), 409);

    server.stop().await;
}

#[tokio::test]
async fn test_list_is_scoped_to_operator() {
    let server = start_server().await;
    server.create_ok(&plain_route("a1")).await;
    server.create_ok(&plain_route("a2")).await;
    server.create(OPERATOR_B, &plain_route("b1")).await;

    let res = server
        .client
        .get(server.url("/api/routes"))
        .bearer_auth(OPERATOR_A)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let names: Vec<&str> = body["apis"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a2", "a1"]);

    server.stop().await;
}

#[tokio::test]
async fn test_deactivated_route_leaves_snapshot() {
    let server = start_server().await;
    let id = server.create_ok(&plain_route("svc")).await;

    let mut body = plain_route("svc");
    body["status"] = json!("inactive");
    assert_eq!(server.update(OPERATOR_A, id, &body).await.status(), 200);

    assert!(server.snapshot().await.is_empty());
    let detail: Value = server.get(OPERATOR_A, id).await.json().await.unwrap();
    assert_eq!(detail["api"]["status"], "inactive");

    server.stop().await;
}

#[tokio::test]
async fn test_health_reports_gateways() {
    let server = start_server().await;
    let _gw = server.gateway().await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["gateways"], 1);

    let res = server
        .client
        .get(server.url("/api/gateways"))
        .bearer_auth(OPERATOR_A)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["gateways"][0]["state"], "connected");

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_gateway_channels() {
    let server = start_server().await;
    let mut gw = server.gateway().await;
    let channels = server.state.channels.clone();

    server.stop().await;

    assert_eq!(gw.next_message().await, None);
    assert_eq!(channels.connected_count(), 0);
}
